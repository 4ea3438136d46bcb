use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{CollectionId, ConfigKey, Lamports, Pubkey, TransactionId, TreasuryKey},
    error::LedgerError,
    protocol::{Commitment, MintAttemptResult, Notification, SaleState, SignatureStatus},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

pub mod classify;
pub mod confirmation;
pub mod countdown;
pub mod error;
pub mod rpc;
pub mod simulated;
pub mod ui_state;
mod wallet;

pub use error::ControllerError;
pub use ui_state::{UiInputs, UiState};
pub use wallet::{AddressWallet, WalletAdapter, WalletSession};

use classify::{classify_confirmation, classify_failure, ClassifiedAttempt};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Reference to the on-chain mint program instance backing a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramHandle {
    pub program_id: Pubkey,
    pub collection_id: CollectionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleSnapshot {
    pub state: SaleState,
    pub program: ProgramHandle,
}

#[async_trait]
pub trait SaleStateQuery: Send + Sync {
    async fn query_state(
        &self,
        wallet: &WalletSession,
        collection_id: CollectionId,
    ) -> Result<SaleSnapshot, LedgerError>;
}

#[async_trait]
pub trait MintTransactions: Send + Sync {
    async fn submit_mint(
        &self,
        program: &ProgramHandle,
        config: ConfigKey,
        payer: Pubkey,
        treasury: TreasuryKey,
    ) -> Result<TransactionId, LedgerError>;

    async fn await_confirmation(
        &self,
        signature: &TransactionId,
        timeout: Duration,
        commitment: Commitment,
        search_history: bool,
    ) -> Result<SignatureStatus, LedgerError>;
}

#[async_trait]
pub trait BalanceQuery: Send + Sync {
    async fn get_balance(&self, public_key: &Pubkey) -> Result<Lamports, LedgerError>;
}

/// Stands in for the on-chain program client when none is wired up.
pub struct UnconfiguredProgramClient;

#[async_trait]
impl SaleStateQuery for UnconfiguredProgramClient {
    async fn query_state(
        &self,
        _wallet: &WalletSession,
        collection_id: CollectionId,
    ) -> Result<SaleSnapshot, LedgerError> {
        Err(LedgerError::Unclassified(format!(
            "no program client configured to read collection {collection_id}"
        )))
    }
}

#[async_trait]
impl MintTransactions for UnconfiguredProgramClient {
    async fn submit_mint(
        &self,
        program: &ProgramHandle,
        _config: ConfigKey,
        _payer: Pubkey,
        _treasury: TreasuryKey,
    ) -> Result<TransactionId, LedgerError> {
        Err(LedgerError::Unclassified(format!(
            "no program client configured to mint from {}",
            program.collection_id
        )))
    }

    async fn await_confirmation(
        &self,
        signature: &TransactionId,
        _timeout: Duration,
        _commitment: Commitment,
        _search_history: bool,
    ) -> Result<SignatureStatus, LedgerError> {
        Err(LedgerError::Unclassified(format!(
            "no program client configured to confirm {signature}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct MintSettings {
    pub collection_id: CollectionId,
    pub config_key: ConfigKey,
    pub treasury: TreasuryKey,
    /// Countdown target until the first sale state arrives.
    pub start_date: DateTime<Utc>,
    pub tx_timeout: Duration,
    pub commitment: Commitment,
}

pub struct MintCollaborators {
    pub wallet: Arc<dyn WalletAdapter>,
    pub sales: Arc<dyn SaleStateQuery>,
    pub mints: Arc<dyn MintTransactions>,
    pub balances: Arc<dyn BalanceQuery>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    WalletConnected(Pubkey),
    WalletDisconnected,
    StateRefreshed(SaleState),
    BalanceUpdated(Lamports),
    MintStarted,
    MintFinished(MintAttemptResult),
}

/// Outcome of [`MintController::connect`]. The wallet stays connected when
/// the initial sale-state load fails; `sale` carries that failure.
#[derive(Debug)]
pub struct Connection {
    pub session: WalletSession,
    pub sale: Result<Option<SaleState>, ControllerError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub session: Option<WalletSession>,
    pub balance: Option<Lamports>,
    pub sale: Option<SaleState>,
    pub sold_out: bool,
    pub countdown_target: DateTime<Utc>,
    pub notification: Notification,
}

#[derive(Debug, Clone)]
struct ControllerState {
    session: Option<WalletSession>,
    balance: Option<Lamports>,
    sale: Option<SaleState>,
    program: Option<ProgramHandle>,
    sold_out: bool,
    countdown_target: DateTime<Utc>,
    notification: Notification,
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct MintController {
    settings: MintSettings,
    wallet: Arc<dyn WalletAdapter>,
    sales: Arc<dyn SaleStateQuery>,
    mints: Arc<dyn MintTransactions>,
    balances: Arc<dyn BalanceQuery>,
    state: RwLock<ControllerState>,
    minting: AtomicBool,
    events: broadcast::Sender<ControllerEvent>,
}

impl MintController {
    pub fn new(settings: MintSettings, collaborators: MintCollaborators) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = ControllerState {
            session: None,
            balance: None,
            sale: None,
            program: None,
            sold_out: false,
            countdown_target: settings.start_date,
            notification: Notification::default(),
        };
        Self {
            settings,
            wallet: collaborators.wallet,
            sales: collaborators.sales,
            mints: collaborators.mints,
            balances: collaborators.balances,
            state: RwLock::new(state),
            minting: AtomicBool::new(false),
            events,
        }
    }

    pub fn settings(&self) -> &MintSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn is_minting(&self) -> bool {
        self.minting.load(Ordering::Acquire)
    }

    /// Current state as of now. An expired notification is closed first.
    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot_at(Utc::now()).await
    }

    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> ControllerSnapshot {
        let mut state = self.state.write().await;
        state.notification.expire(now);
        ControllerSnapshot {
            session: state.session.clone(),
            balance: state.balance,
            sale: state.sale,
            sold_out: state.sold_out,
            countdown_target: state.countdown_target,
            notification: state.notification.clone(),
        }
    }

    pub async fn ui_state(&self, now: DateTime<Utc>) -> UiState {
        let state = self.state.read().await;
        UiState::derive(&self.ui_inputs(&state), now)
    }

    fn ui_inputs(&self, state: &ControllerState) -> UiInputs {
        UiInputs {
            connected: state.session.is_some(),
            sale_loaded: state.sale.is_some(),
            sold_out: state.sold_out,
            minting: self.is_minting(),
            go_live: state.countdown_target,
        }
    }

    /// Connects the wallet, then loads its balance and the sale state. `Err`
    /// only when the wallet itself cannot connect.
    pub async fn connect(&self) -> Result<Connection, ControllerError> {
        let session = self.wallet.connect().await?;
        info!(wallet = %session.public_key, "wallet connected");
        self.state.write().await.session = Some(session.clone());
        self.emit(ControllerEvent::WalletConnected(session.public_key));

        self.update_balance(&session).await;
        let sale = self.refresh().await;
        Ok(Connection { session, sale })
    }

    /// Drops the session and everything loaded for it.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        state.session = None;
        state.balance = None;
        state.sale = None;
        state.program = None;
        state.sold_out = false;
        state.countdown_target = self.settings.start_date;
        state.notification = Notification::default();
        drop(state);
        info!("wallet disconnected");
        self.emit(ControllerEvent::WalletDisconnected);
    }

    /// Re-reads sale state. A no-op without a connected wallet; on failure the
    /// previous sale state is kept and a retryable error is returned.
    pub async fn refresh(&self) -> Result<Option<SaleState>, ControllerError> {
        let Some(session) = self.state.read().await.session.clone() else {
            return Ok(None);
        };

        let snapshot = match self
            .sales
            .query_state(&session, self.settings.collection_id)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    collection = %self.settings.collection_id,
                    error = %err,
                    retryable = err.is_retryable(),
                    "sale state refresh failed"
                );
                return Err(err.into());
            }
        };

        let sale = snapshot.state;
        let mut state = self.state.write().await;
        state.sold_out = sale.is_sold_out();
        state.countdown_target = sale.go_live_date;
        state.sale = Some(sale);
        state.program = Some(snapshot.program);
        drop(state);

        info!(
            items_available = sale.items_available,
            items_redeemed = sale.items_redeemed,
            items_remaining = sale.items_remaining,
            go_live = %sale.go_live_date,
            "sale state refreshed"
        );
        self.emit(ControllerEvent::StateRefreshed(sale));
        Ok(Some(sale))
    }

    /// Runs one mint attempt. Outcome failures are reported through the
    /// returned result and the notification; `Err` means no attempt was made.
    pub async fn submit_mint(&self) -> Result<MintAttemptResult, ControllerError> {
        let guard = InFlightGuard::acquire(&self.minting).ok_or(ControllerError::MintInFlight)?;

        let (session, program) = {
            let state = self.state.read().await;
            let session = state
                .session
                .clone()
                .ok_or(ControllerError::WalletNotConnected)?;
            let program = state
                .program
                .clone()
                .ok_or(ControllerError::ProgramUnavailable)?;
            let readiness = UiState::derive(
                &UiInputs {
                    minting: false,
                    ..self.ui_inputs(&state)
                },
                Utc::now(),
            );
            if !readiness.mint_enabled() {
                return Err(ControllerError::NotReady(readiness));
            }
            (session, program)
        };

        info!(wallet = %session.public_key, "mint started");
        self.emit(ControllerEvent::MintStarted);

        let classified = self.attempt_mint(&session, &program).await;
        {
            let mut state = self.state.write().await;
            if classified.sold_out {
                state.sold_out = true;
            }
            state.notification = Notification::open(&classified.result, Utc::now());
        }

        self.update_balance(&session).await;
        drop(guard);
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "post-mint refresh failed");
        }

        info!(
            succeeded = classified.result.succeeded,
            message = %classified.result.message,
            "mint finished"
        );
        self.emit(ControllerEvent::MintFinished(classified.result.clone()));
        Ok(classified.result)
    }

    async fn attempt_mint(&self, session: &WalletSession, program: &ProgramHandle) -> ClassifiedAttempt {
        let signature = match self
            .mints
            .submit_mint(
                program,
                self.settings.config_key,
                session.public_key,
                self.settings.treasury,
            )
            .await
        {
            Ok(signature) => signature,
            Err(err) => {
                warn!(error = %err, code = ?err.program_code(), "mint submission failed");
                return classify_failure(&err);
            }
        };

        match self
            .mints
            .await_confirmation(
                &signature,
                self.settings.tx_timeout,
                self.settings.commitment,
                false,
            )
            .await
        {
            Ok(status) => classify_confirmation(&status),
            Err(err) => {
                warn!(%signature, error = %err, "mint confirmation failed");
                classify_failure(&err)
            }
        }
    }

    async fn update_balance(&self, session: &WalletSession) {
        match self.balances.get_balance(&session.public_key).await {
            Ok(balance) => {
                self.state.write().await.balance = Some(balance);
                self.emit(ControllerEvent::BalanceUpdated(balance));
            }
            Err(err) => {
                warn!(wallet = %session.public_key, error = %err, "balance query failed");
            }
        }
    }

    pub async fn dismiss_notification(&self) {
        self.state.write().await.notification.dismiss();
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
