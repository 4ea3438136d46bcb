use shared::error::LedgerError;
use thiserror::Error;

use crate::ui_state::UiState;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("wallet is not connected")]
    WalletNotConnected,
    #[error("sale state has not been loaded for this collection")]
    ProgramUnavailable,
    #[error("a mint is already in flight")]
    MintInFlight,
    #[error("mint is unavailable while {0}")]
    NotReady(UiState),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ControllerError {
    /// Whether calling the same operation again may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_retryable(),
            Self::MintInFlight => true,
            Self::WalletNotConnected | Self::ProgramUnavailable | Self::NotReady(_) => false,
        }
    }
}
