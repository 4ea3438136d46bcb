//! In-memory collection that plays the ledger, program and balance roles.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{CollectionId, ConfigKey, Lamports, Pubkey, TransactionId, TreasuryKey},
    error::{LedgerError, ProgramErrorCode},
    protocol::{Commitment, SaleState, SignatureStatus},
};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    confirmation::{await_signature_confirmation_every, SignatureStatusSource},
    BalanceQuery, MintTransactions, ProgramHandle, SaleSnapshot, SaleStateQuery, WalletSession,
};

const SIMULATED_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SimulatedSaleConfig {
    pub collection_id: CollectionId,
    pub program_id: Pubkey,
    pub items_available: u64,
    pub go_live_date: DateTime<Utc>,
    pub price: Lamports,
}

struct Ledger {
    items_redeemed: u64,
    balances: HashMap<Pubkey, Lamports>,
    signatures: HashMap<TransactionId, SignatureStatus>,
    slot: u64,
}

pub struct SimulatedCollection {
    config: SimulatedSaleConfig,
    ledger: Mutex<Ledger>,
}

impl SimulatedCollection {
    pub fn new(config: SimulatedSaleConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger {
                items_redeemed: 0,
                balances: HashMap::new(),
                signatures: HashMap::new(),
                slot: 1,
            }),
        }
    }

    pub async fn fund(&self, wallet: Pubkey, amount: Lamports) {
        let mut ledger = self.ledger.lock().await;
        let balance = ledger.balances.entry(wallet).or_default();
        balance.0 = balance.0.saturating_add(amount.0);
    }

    pub async fn set_items_redeemed(&self, items_redeemed: u64) {
        self.ledger.lock().await.items_redeemed = items_redeemed.min(self.config.items_available);
    }

    fn sale_state(&self, items_redeemed: u64) -> SaleState {
        SaleState {
            items_available: self.config.items_available,
            items_redeemed,
            items_remaining: self.config.items_available - items_redeemed,
            go_live_date: self.config.go_live_date,
        }
    }
}

#[async_trait]
impl SaleStateQuery for SimulatedCollection {
    async fn query_state(
        &self,
        _wallet: &WalletSession,
        collection_id: CollectionId,
    ) -> Result<SaleSnapshot, LedgerError> {
        if collection_id != self.config.collection_id {
            return Err(LedgerError::Rpc {
                code: -32602,
                message: format!("account {collection_id} not found"),
            });
        }
        let ledger = self.ledger.lock().await;
        Ok(SaleSnapshot {
            state: self.sale_state(ledger.items_redeemed),
            program: ProgramHandle {
                program_id: self.config.program_id,
                collection_id,
            },
        })
    }
}

#[async_trait]
impl MintTransactions for SimulatedCollection {
    async fn submit_mint(
        &self,
        program: &ProgramHandle,
        _config: ConfigKey,
        payer: Pubkey,
        treasury: TreasuryKey,
    ) -> Result<TransactionId, LedgerError> {
        if program.collection_id != self.config.collection_id {
            return Err(LedgerError::program(
                ProgramErrorCode::IncorrectOwner,
                "Account does not have correct owner!",
            ));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger.items_redeemed >= self.config.items_available {
            return Err(LedgerError::program(
                ProgramErrorCode::CandyMachineEmpty,
                "Candy machine is empty!",
            ));
        }
        if Utc::now() < self.config.go_live_date {
            return Err(LedgerError::program(
                ProgramErrorCode::CandyMachineNotLiveYet,
                "Candy machine is not live yet!",
            ));
        }
        let balance = ledger.balances.get(&payer).copied().unwrap_or_default();
        let Some(remaining) = balance.checked_sub(self.config.price) else {
            return Err(LedgerError::program(
                ProgramErrorCode::NotEnoughSol,
                "Not enough SOL to pay for this minting",
            ));
        };

        ledger.balances.insert(payer, remaining);
        let treasury_balance = ledger.balances.entry(treasury.0).or_default();
        treasury_balance.0 = treasury_balance.0.saturating_add(self.config.price.0);
        ledger.items_redeemed += 1;
        ledger.slot += 1;

        let signature = TransactionId(format!("sim{:0>12}", ledger.slot));
        let slot = ledger.slot;
        ledger.signatures.insert(
            signature.clone(),
            SignatureStatus {
                slot,
                confirmations: None,
                err: None,
                confirmation_status: Some(Commitment::Finalized),
            },
        );
        info!(
            %signature,
            %payer,
            items_redeemed = ledger.items_redeemed,
            "simulated mint landed"
        );
        Ok(signature)
    }

    async fn await_confirmation(
        &self,
        signature: &TransactionId,
        timeout: Duration,
        commitment: Commitment,
        search_history: bool,
    ) -> Result<SignatureStatus, LedgerError> {
        await_signature_confirmation_every(
            self,
            signature,
            timeout,
            commitment,
            search_history,
            SIMULATED_POLL_INTERVAL,
        )
        .await
    }
}

#[async_trait]
impl SignatureStatusSource for SimulatedCollection {
    async fn get_signature_status(
        &self,
        signature: &TransactionId,
        _search_history: bool,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        Ok(self.ledger.lock().await.signatures.get(signature).cloned())
    }
}

#[async_trait]
impl BalanceQuery for SimulatedCollection {
    async fn get_balance(&self, public_key: &Pubkey) -> Result<Lamports, LedgerError> {
        Ok(self
            .ledger
            .lock()
            .await
            .balances
            .get(public_key)
            .copied()
            .unwrap_or_default())
    }
}
