use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Custom error codes raised by the candy-machine program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramErrorCode {
    IncorrectOwner,
    Uninitialized,
    MintMismatch,
    IndexGreaterThanLength,
    ConfigMustHaveAtleastOneEntry,
    NumericalOverflow,
    TooManyCreators,
    UuidMustBeExactly6Length,
    NotEnoughTokens,
    NotEnoughSol,
    TokenTransferFailed,
    CandyMachineEmpty,
    CandyMachineNotLiveYet,
    ConfigLineMismatch,
}

impl ProgramErrorCode {
    pub fn from_code(code: u32) -> Option<Self> {
        let value = match code {
            300 => Self::IncorrectOwner,
            301 => Self::Uninitialized,
            302 => Self::MintMismatch,
            303 => Self::IndexGreaterThanLength,
            304 => Self::ConfigMustHaveAtleastOneEntry,
            305 => Self::NumericalOverflow,
            306 => Self::TooManyCreators,
            307 => Self::UuidMustBeExactly6Length,
            308 => Self::NotEnoughTokens,
            309 => Self::NotEnoughSol,
            310 => Self::TokenTransferFailed,
            311 => Self::CandyMachineEmpty,
            312 => Self::CandyMachineNotLiveYet,
            313 => Self::ConfigLineMismatch,
            _ => return None,
        };
        Some(value)
    }

    pub fn code(self) -> u32 {
        match self {
            Self::IncorrectOwner => 300,
            Self::Uninitialized => 301,
            Self::MintMismatch => 302,
            Self::IndexGreaterThanLength => 303,
            Self::ConfigMustHaveAtleastOneEntry => 304,
            Self::NumericalOverflow => 305,
            Self::TooManyCreators => 306,
            Self::UuidMustBeExactly6Length => 307,
            Self::NotEnoughTokens => 308,
            Self::NotEnoughSol => 309,
            Self::TokenTransferFailed => 310,
            Self::CandyMachineEmpty => 311,
            Self::CandyMachineNotLiveYet => 312,
            Self::ConfigLineMismatch => 313,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger transport failure: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("program error {code}: {message}")]
    Program { code: u32, message: String },
    #[error("transaction {signature} was not confirmed within {timeout_ms} ms")]
    ConfirmationTimeout { signature: String, timeout_ms: u64 },
    #[error("{0}")]
    Unclassified(String),
}

impl LedgerError {
    pub fn program(code: ProgramErrorCode, message: impl Into<String>) -> Self {
        Self::Program {
            code: code.code(),
            message: message.into(),
        }
    }

    /// Numeric program error code, from the structured variant or from the
    /// `custom program error: 0x..` fragment of an RPC/simulation message.
    pub fn program_code(&self) -> Option<u32> {
        match self {
            Self::Program { code, .. } => Some(*code),
            Self::Rpc { message, .. } | Self::Unclassified(message) => {
                parse_custom_program_error(message)
            }
            Self::Transport(_) | Self::ConfirmationTimeout { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Rpc { .. } | Self::ConfirmationTimeout { .. }
        )
    }
}

const CUSTOM_PROGRAM_ERROR_MARKER: &str = "custom program error:";

pub fn parse_custom_program_error(message: &str) -> Option<u32> {
    let lower = message.to_ascii_lowercase();
    let start = lower.find(CUSTOM_PROGRAM_ERROR_MARKER)? + CUSTOM_PROGRAM_ERROR_MARKER.len();
    let rest = lower[start..].trim_start();
    let hex = rest.strip_prefix("0x")?;
    let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}
