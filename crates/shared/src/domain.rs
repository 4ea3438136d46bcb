use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const PUBKEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubkeyParseError {
    #[error("invalid base58 public key: {0}")]
    InvalidBase58(String),
    #[error("invalid public key length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// 32-byte ed25519 public key, displayed and serialized as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pubkey([u8; PUBKEY_LEN]);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// `abcd..wxyz` form used next to the connect button.
    pub fn shortened(&self) -> String {
        shorten_address(&self.to_base58(), 4)
    }
}

impl FromStr for Pubkey {
    type Err = PubkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|err| PubkeyParseError::InvalidBase58(err.to_string()))?;
        let bytes: [u8; PUBKEY_LEN] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| PubkeyParseError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Pubkey {
    type Error = PubkeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pubkey> for String {
    fn from(value: Pubkey) -> Self {
        value.to_base58()
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_base58())
    }
}

/// Keeps `chars` leading and trailing characters, counted by `char`.
pub fn shorten_address(address: &str, chars: usize) -> String {
    let len = address.chars().count();
    if len <= chars * 2 {
        return address.to_string();
    }
    let head_end = address
        .char_indices()
        .nth(chars)
        .map_or(address.len(), |(idx, _)| idx);
    let tail_start = address
        .char_indices()
        .nth(len - chars)
        .map_or(address.len(), |(idx, _)| idx);
    format!("{}..{}", &address[..head_end], &address[tail_start..])
}

macro_rules! key_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Pubkey);

        impl FromStr for $name {
            type Err = PubkeyParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

key_newtype!(CollectionId);
key_newtype!(ConfigKey);
key_newtype!(TreasuryKey);

/// Balance in the ledger's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lamports(pub u64);

impl Lamports {
    pub fn to_sol(self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }

    pub fn checked_sub(self, other: Lamports) -> Option<Lamports> {
        self.0.checked_sub(other.0).map(Lamports)
    }
}

impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} SOL", self.to_sol())
    }
}

/// Base58 transaction signature returned by the ledger on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
