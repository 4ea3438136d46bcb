//! Maps mint outcomes to the notification shown to the user.

use shared::{
    error::{LedgerError, ProgramErrorCode},
    protocol::{MintAttemptResult, SignatureStatus},
};

pub const MINT_SUCCEEDED: &str = "Congratulations! Mint succeeded!";
pub const MINT_FAILED: &str = "Mint failed! Please try again!";
pub const MINTING_FAILED: &str = "Minting failed! Please try again!";
pub const SOLD_OUT: &str = "SOLD OUT!";
pub const NOT_LIVE_YET: &str = "Minting period hasn't started yet.";
pub const INSUFFICIENT_FUNDS: &str = "Insufficient funds to mint. Please fund your wallet.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAttempt {
    pub result: MintAttemptResult,
    pub sold_out: bool,
}

impl ClassifiedAttempt {
    fn failure(message: &str) -> Self {
        Self {
            result: MintAttemptResult::failure(message),
            sold_out: false,
        }
    }
}

pub fn classify_confirmation(status: &SignatureStatus) -> ClassifiedAttempt {
    if status.is_err() {
        ClassifiedAttempt::failure(MINT_FAILED)
    } else {
        ClassifiedAttempt {
            result: MintAttemptResult::success(MINT_SUCCEEDED),
            sold_out: false,
        }
    }
}

pub fn classify_failure(err: &LedgerError) -> ClassifiedAttempt {
    match err.program_code().and_then(ProgramErrorCode::from_code) {
        Some(ProgramErrorCode::CandyMachineEmpty) => ClassifiedAttempt {
            result: MintAttemptResult::failure(SOLD_OUT),
            sold_out: true,
        },
        Some(ProgramErrorCode::CandyMachineNotLiveYet) => {
            ClassifiedAttempt::failure(NOT_LIVE_YET)
        }
        Some(ProgramErrorCode::NotEnoughSol) => ClassifiedAttempt::failure(INSUFFICIENT_FUNDS),
        _ => ClassifiedAttempt::failure(MINTING_FAILED),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared::protocol::{Commitment, Severity};

    use super::*;

    fn status(err: Option<serde_json::Value>) -> SignatureStatus {
        SignatureStatus {
            slot: 1,
            confirmations: Some(1),
            err,
            confirmation_status: Some(Commitment::Confirmed),
        }
    }

    #[test]
    fn clean_confirmation_is_success() {
        let classified = classify_confirmation(&status(None));
        assert!(classified.result.succeeded);
        assert_eq!(classified.result.message, MINT_SUCCEEDED);
        assert_eq!(classified.result.severity, Severity::Success);
    }

    #[test]
    fn confirmation_error_is_generic_failure() {
        let classified = classify_confirmation(&status(Some(json!({"InstructionError": [0, "Custom"]}))));
        assert!(!classified.result.succeeded);
        assert_eq!(classified.result.message, MINT_FAILED);
        assert_eq!(classified.result.severity, Severity::Error);
    }

    #[test]
    fn code_311_is_sold_out() {
        let err = LedgerError::Program {
            code: 311,
            message: "Candy machine is empty!".into(),
        };
        let classified = classify_failure(&err);
        assert_eq!(classified.result.message, SOLD_OUT);
        assert!(classified.sold_out);
    }

    #[test]
    fn code_312_is_not_live_yet() {
        let err = LedgerError::Program {
            code: 312,
            message: "Candy machine is not live yet!".into(),
        };
        let classified = classify_failure(&err);
        assert_eq!(classified.result.message, NOT_LIVE_YET);
        assert!(!classified.sold_out);
    }

    #[test]
    fn parsed_log_code_classifies_insufficient_funds() {
        let err = LedgerError::Rpc {
            code: -32002,
            message: "Transaction simulation failed: custom program error: 0x135".into(),
        };
        assert_eq!(classify_failure(&err).result.message, INSUFFICIENT_FUNDS);
    }

    #[test]
    fn unknown_failures_fall_back_to_generic_message() {
        for err in [
            LedgerError::Transport("connection reset".into()),
            LedgerError::ConfirmationTimeout {
                signature: "sig".into(),
                timeout_ms: 10,
            },
            LedgerError::Program {
                code: 305,
                message: "Numerical overflow".into(),
            },
        ] {
            let classified = classify_failure(&err);
            assert_eq!(classified.result.message, MINTING_FAILED);
            assert!(!classified.sold_out);
        }
    }
}
