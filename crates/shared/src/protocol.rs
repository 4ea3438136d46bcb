use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    pub items_available: u64,
    pub items_redeemed: u64,
    pub items_remaining: u64,
    pub go_live_date: DateTime<Utc>,
}

impl SaleState {
    pub fn is_sold_out(&self) -> bool {
        self.items_remaining == 0
    }
}

/// Confirmation depth, ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Legacy names are still accepted by older RPC nodes and configs.
        match s.trim() {
            "processed" | "recent" => Ok(Self::Processed),
            "confirmed" | "singleGossip" | "single" => Ok(Self::Confirmed),
            "finalized" | "max" | "root" => Ok(Self::Finalized),
            other => Err(format!("unknown commitment level '{other}'")),
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry of a `getSignatureStatuses` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    pub fn is_err(&self) -> bool {
        self.err.as_ref().is_some_and(|err| !err.is_null())
    }

    pub fn reached(&self, commitment: Commitment) -> bool {
        match self.confirmation_status {
            Some(status) => status >= commitment,
            // `confirmations: null` means the block is rooted.
            None => self.confirmations.is_none() || commitment == Commitment::Processed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAttemptResult {
    pub succeeded: bool,
    pub message: String,
    pub severity: Severity,
}

impl MintAttemptResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            severity: Severity::Success,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// How long a notification stays up before the front-end hides it.
pub const NOTIFICATION_AUTO_HIDE_MS: u64 = 6000;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notification {
    pub open: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Opens a notification for `result`, shown from `now`.
    pub fn open(result: &MintAttemptResult, now: DateTime<Utc>) -> Self {
        Self {
            open: true,
            message: result.message.clone(),
            severity: Some(result.severity),
            opened_at: Some(now),
        }
    }

    pub fn dismiss(&mut self) {
        self.open = false;
    }

    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        if !self.open {
            return false;
        }
        match self.opened_at {
            Some(opened_at) => {
                now.signed_duration_since(opened_at)
                    < chrono::Duration::milliseconds(NOTIFICATION_AUTO_HIDE_MS as i64)
            }
            None => true,
        }
    }

    /// Closes the notification once its auto-hide window has passed.
    /// Returns true if it was closed by this call.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.open && !self.is_visible(now) {
            self.dismiss();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_legacy_commitment_names() {
        assert_eq!("singleGossip".parse::<Commitment>(), Ok(Commitment::Confirmed));
        assert_eq!("max".parse::<Commitment>(), Ok(Commitment::Finalized));
        assert!("eventually".parse::<Commitment>().is_err());
    }

    #[test]
    fn decodes_rpc_signature_status() {
        let status: SignatureStatus = serde_json::from_value(json!({
            "slot": 72,
            "confirmations": 10,
            "err": null,
            "confirmationStatus": "confirmed"
        }))
        .expect("decode");
        assert!(!status.is_err());
        assert!(status.reached(Commitment::Confirmed));
        assert!(!status.reached(Commitment::Finalized));
    }

    #[test]
    fn status_with_instruction_error_is_err() {
        let status: SignatureStatus = serde_json::from_value(json!({
            "slot": 5,
            "confirmations": null,
            "err": {"InstructionError": [0, {"Custom": 311}]},
            "confirmationStatus": "finalized"
        }))
        .expect("decode");
        assert!(status.is_err());
    }

    #[test]
    fn notification_opens_with_attempt_severity() {
        let now = Utc::now();
        let mut note = Notification::open(&MintAttemptResult::failure("nope"), now);
        assert!(note.open);
        assert_eq!(note.severity, Some(Severity::Error));
        note.dismiss();
        assert!(!note.open);
        assert!(!note.is_visible(now));
    }

    #[test]
    fn notification_hides_after_auto_hide_window() {
        let opened = Utc::now();
        let mut note = Notification::open(&MintAttemptResult::success("minted"), opened);
        let just_before = opened + chrono::Duration::milliseconds(NOTIFICATION_AUTO_HIDE_MS as i64 - 1);
        let at_deadline = opened + chrono::Duration::milliseconds(NOTIFICATION_AUTO_HIDE_MS as i64);

        assert!(note.is_visible(just_before));
        assert!(!note.expire(just_before));
        assert!(note.open);

        assert!(!note.is_visible(at_deadline));
        assert!(note.expire(at_deadline));
        assert!(!note.open);
        assert!(!note.expire(at_deadline));
    }
}
