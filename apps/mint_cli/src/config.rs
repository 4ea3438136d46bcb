use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use mint_core::MintSettings;
use serde::Deserialize;
use shared::{
    domain::{CollectionId, ConfigKey, Lamports, Pubkey, TreasuryKey},
    protocol::Commitment,
};
use url::Url;

pub const CANDY_MACHINE_PROGRAM_ID: &str = "cndyAnrLdpjq1Ssp1z8xxDsB8dxe7u4HL5Nxi2K5WXZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-memory collection; nothing leaves the process.
    Simulated,
    /// Balance and confirmations over JSON-RPC.
    Rpc,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub items_available: u64,
    pub price_lamports: u64,
    pub wallet_balance_lamports: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            items_available: 500,
            price_lamports: 500_000_000,
            wallet_balance_lamports: 2_000_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: Backend,
    pub rpc_url: String,
    pub collection_id: Option<String>,
    pub config_key: Option<String>,
    pub treasury: Option<String>,
    pub wallet: Option<String>,
    pub start_date: Option<String>,
    pub tx_timeout_ms: u64,
    pub commitment: String,
    pub simulation: SimulationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated,
            rpc_url: "https://api.devnet.solana.com".into(),
            collection_id: None,
            config_key: None,
            treasury: None,
            wallet: None,
            start_date: None,
            tx_timeout_ms: 30_000,
            commitment: "singleGossip".into(),
            simulation: SimulationSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub backend: Backend,
    pub rpc_url: Url,
    pub wallet: Pubkey,
    pub program_id: Pubkey,
    pub mint: MintSettings,
    pub simulation: SimulationSettings,
}

impl ResolvedSettings {
    pub fn simulated_price(&self) -> Lamports {
        Lamports(self.simulation.price_lamports)
    }
}

/// Reads `path` if present, then applies `APP__*` environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };
    apply_env_overrides(&mut settings, lookup)?;
    Ok(settings)
}

pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("APP__BACKEND") {
        settings.backend = Backend::from_str(&v, true)
            .map_err(|err| anyhow!("invalid APP__BACKEND '{v}': {err}"))?;
    }
    if let Some(v) = lookup("APP__RPC_URL") {
        settings.rpc_url = v;
    }
    if let Some(v) = lookup("APP__COLLECTION_ID") {
        settings.collection_id = Some(v);
    }
    if let Some(v) = lookup("APP__CONFIG_KEY") {
        settings.config_key = Some(v);
    }
    if let Some(v) = lookup("APP__TREASURY") {
        settings.treasury = Some(v);
    }
    if let Some(v) = lookup("APP__WALLET") {
        settings.wallet = Some(v);
    }
    if let Some(v) = lookup("APP__START_DATE") {
        settings.start_date = Some(v);
    }
    if let Some(v) = lookup("APP__TX_TIMEOUT_MS") {
        settings.tx_timeout_ms = v
            .parse()
            .with_context(|| format!("invalid APP__TX_TIMEOUT_MS '{v}'"))?;
    }
    if let Some(v) = lookup("APP__COMMITMENT") {
        settings.commitment = v;
    }
    Ok(())
}

impl Settings {
    pub fn resolve(&self) -> anyhow::Result<ResolvedSettings> {
        let rpc_url = Url::parse(&self.rpc_url)
            .with_context(|| format!("invalid rpc_url '{}'", self.rpc_url))?;
        let commitment: Commitment = self.commitment.parse().map_err(|err: String| anyhow!(err))?;
        let start_date = match &self.start_date {
            Some(raw) => parse_start_date(raw)?,
            None => Utc::now(),
        };

        Ok(ResolvedSettings {
            backend: self.backend,
            rpc_url,
            wallet: required_key("wallet", &self.wallet)?,
            program_id: CANDY_MACHINE_PROGRAM_ID
                .parse()
                .context("invalid candy machine program id")?,
            mint: MintSettings {
                collection_id: CollectionId(required_key("collection_id", &self.collection_id)?),
                config_key: ConfigKey(required_key("config_key", &self.config_key)?),
                treasury: TreasuryKey(required_key("treasury", &self.treasury)?),
                start_date,
                tx_timeout: Duration::from_millis(self.tx_timeout_ms),
                commitment,
            },
            simulation: self.simulation.clone(),
        })
    }
}

fn required_key(name: &str, value: &Option<String>) -> anyhow::Result<Pubkey> {
    let raw = value.as_deref().ok_or_else(|| {
        anyhow!(
            "{name} is required; set it in the config file or APP__{}",
            name.to_ascii_uppercase()
        )
    })?;
    raw.parse()
        .with_context(|| format!("invalid {name} '{raw}'"))
}

/// Accepts RFC 3339 or unix milliseconds.
fn parse_start_date(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow!("start_date {millis} is out of range"));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .with_context(|| format!("invalid start_date '{raw}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
