//! JSON-RPC 2.0 client for the balance and signature-status queries.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    domain::{ConfigKey, Lamports, Pubkey, TransactionId, TreasuryKey},
    error::LedgerError,
    protocol::{Commitment, SignatureStatus},
};
use tracing::debug;
use url::Url;

use crate::{
    confirmation::{await_signature_confirmation_every, SignatureStatusSource, DEFAULT_POLL_INTERVAL},
    BalanceQuery, MintTransactions, ProgramHandle,
};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

pub struct RpcLedgerClient {
    http: Client,
    endpoint: Url,
    commitment: Commitment,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(endpoint: Url, commitment: Commitment) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            commitment,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, endpoint = %self.endpoint, "rpc request");
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let body: RpcResponse<T> = response.json().await.map_err(transport)?;

        if let Some(error) = body.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        body.result
            .ok_or_else(|| LedgerError::Unclassified(format!("rpc {method} returned no result")))
    }
}

fn transport(err: reqwest::Error) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

#[async_trait]
impl BalanceQuery for RpcLedgerClient {
    async fn get_balance(&self, public_key: &Pubkey) -> Result<Lamports, LedgerError> {
        let balance: WithContext<u64> = self
            .call(
                "getBalance",
                json!([public_key.to_base58(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        Ok(Lamports(balance.value))
    }
}

#[async_trait]
impl SignatureStatusSource for RpcLedgerClient {
    async fn get_signature_status(
        &self,
        signature: &TransactionId,
        search_history: bool,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.0], { "searchTransactionHistory": search_history }]),
            )
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }
}

/// Submits through `submitter` and confirms by polling `getSignatureStatuses`.
pub struct RpcConfirmedMints {
    submitter: Arc<dyn MintTransactions>,
    ledger: Arc<RpcLedgerClient>,
    poll_interval: Duration,
}

impl RpcConfirmedMints {
    pub fn new(submitter: Arc<dyn MintTransactions>, ledger: Arc<RpcLedgerClient>) -> Self {
        Self {
            submitter,
            ledger,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl MintTransactions for RpcConfirmedMints {
    async fn submit_mint(
        &self,
        program: &ProgramHandle,
        config: ConfigKey,
        payer: Pubkey,
        treasury: TreasuryKey,
    ) -> Result<TransactionId, LedgerError> {
        self.submitter
            .submit_mint(program, config, payer, treasury)
            .await
    }

    async fn await_confirmation(
        &self,
        signature: &TransactionId,
        timeout: Duration,
        commitment: Commitment,
        search_history: bool,
    ) -> Result<SignatureStatus, LedgerError> {
        debug!(%signature, endpoint = %self.ledger.endpoint(), "awaiting confirmation over rpc");
        await_signature_confirmation_every(
            self.ledger.as_ref(),
            signature,
            timeout,
            commitment,
            search_history,
            self.poll_interval,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
