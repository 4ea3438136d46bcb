use std::time::Duration;

use async_trait::async_trait;
use shared::{
    domain::TransactionId,
    error::LedgerError,
    protocol::{Commitment, SignatureStatus},
};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[async_trait]
pub trait SignatureStatusSource: Send + Sync {
    async fn get_signature_status(
        &self,
        signature: &TransactionId,
        search_history: bool,
    ) -> Result<Option<SignatureStatus>, LedgerError>;
}

/// Polls until the signature reaches `commitment`, lands with an error, or
/// `timeout` elapses. Poll failures are logged and retried until the deadline.
pub async fn await_signature_confirmation<S>(
    source: &S,
    signature: &TransactionId,
    timeout: Duration,
    commitment: Commitment,
    search_history: bool,
) -> Result<SignatureStatus, LedgerError>
where
    S: SignatureStatusSource + ?Sized,
{
    await_signature_confirmation_every(
        source,
        signature,
        timeout,
        commitment,
        search_history,
        DEFAULT_POLL_INTERVAL,
    )
    .await
}

pub async fn await_signature_confirmation_every<S>(
    source: &S,
    signature: &TransactionId,
    timeout: Duration,
    commitment: Commitment,
    search_history: bool,
    poll_interval: Duration,
) -> Result<SignatureStatus, LedgerError>
where
    S: SignatureStatusSource + ?Sized,
{
    let poll = async {
        loop {
            match source.get_signature_status(signature, search_history).await {
                Ok(Some(status)) if status.is_err() => {
                    debug!(%signature, slot = status.slot, "signature landed with error");
                    return status;
                }
                Ok(Some(status)) if status.reached(commitment) => {
                    debug!(%signature, slot = status.slot, %commitment, "signature confirmed");
                    return status;
                }
                Ok(_) => {
                    debug!(%signature, %commitment, "signature not yet confirmed");
                }
                Err(err) => {
                    warn!(%signature, error = %err, "signature status poll failed");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| LedgerError::ConfirmationTimeout {
            signature: signature.0.clone(),
            timeout_ms: timeout.as_millis() as u64,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Yields `None` for the first `pending_polls` calls, then `final_status`.
    struct ScriptedSource {
        calls: AtomicUsize,
        pending_polls: usize,
        fail_first: bool,
        final_status: Option<SignatureStatus>,
    }

    #[async_trait]
    impl SignatureStatusSource for ScriptedSource {
        async fn get_signature_status(
            &self,
            _signature: &TransactionId,
            _search_history: bool,
        ) -> Result<Option<SignatureStatus>, LedgerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(LedgerError::Transport("connection reset".into()));
            }
            if call < self.pending_polls {
                return Ok(None);
            }
            Ok(self.final_status.clone())
        }
    }

    fn confirmed() -> SignatureStatus {
        SignatureStatus {
            slot: 9,
            confirmations: Some(3),
            err: None,
            confirmation_status: Some(Commitment::Confirmed),
        }
    }

    #[tokio::test]
    async fn returns_once_commitment_is_reached() {
        let source = ScriptedSource {
            calls: AtomicUsize::new(0),
            pending_polls: 2,
            fail_first: true,
            final_status: Some(confirmed()),
        };
        let status = await_signature_confirmation_every(
            &source,
            &TransactionId("sig".into()),
            Duration::from_secs(2),
            Commitment::Confirmed,
            false,
            Duration::from_millis(5),
        )
        .await
        .expect("confirmed");
        assert_eq!(status, confirmed());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn default_interval_returns_immediately_on_first_confirmed_poll() {
        let source = ScriptedSource {
            calls: AtomicUsize::new(0),
            pending_polls: 0,
            fail_first: false,
            final_status: Some(confirmed()),
        };
        let status = await_signature_confirmation(
            &source,
            &TransactionId("sig".into()),
            Duration::from_millis(500),
            Commitment::Confirmed,
            true,
        )
        .await
        .expect("confirmed");
        assert_eq!(status.slot, 9);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_when_commitment_never_reached() {
        let source = ScriptedSource {
            calls: AtomicUsize::new(0),
            pending_polls: 0,
            fail_first: false,
            final_status: Some(confirmed()),
        };
        let err = await_signature_confirmation_every(
            &source,
            &TransactionId("sig".into()),
            Duration::from_millis(50),
            Commitment::Finalized,
            false,
            Duration::from_millis(5),
        )
        .await
        .expect_err("timeout");
        assert_eq!(
            err,
            LedgerError::ConfirmationTimeout {
                signature: "sig".into(),
                timeout_ms: 50,
            }
        );
    }
}
