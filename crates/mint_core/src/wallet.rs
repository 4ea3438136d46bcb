use async_trait::async_trait;
use shared::{domain::Pubkey, error::LedgerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    pub public_key: Pubkey,
}

#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Opens the wallet's connect flow and returns the approved session.
    async fn connect(&self) -> Result<WalletSession, LedgerError>;
}

/// Watch-only wallet for a known address.
#[derive(Debug, Clone)]
pub struct AddressWallet {
    public_key: Pubkey,
}

impl AddressWallet {
    pub fn new(public_key: Pubkey) -> Self {
        Self { public_key }
    }
}

#[async_trait]
impl WalletAdapter for AddressWallet {
    async fn connect(&self) -> Result<WalletSession, LedgerError> {
        Ok(WalletSession {
            public_key: self.public_key,
        })
    }
}
