use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mint_core::{
    rpc::{RpcConfirmedMints, RpcLedgerClient},
    simulated::{SimulatedCollection, SimulatedSaleConfig},
    AddressWallet, ControllerError, ControllerSnapshot, MintCollaborators, MintController,
    UiState, UnconfiguredProgramClient,
};
use shared::domain::{CollectionId, Lamports};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Backend, ResolvedSettings};

#[derive(Parser, Debug)]
#[command(about = "Connect a wallet and mint from an NFT collection")]
struct Cli {
    #[arg(long, default_value = "mint.toml")]
    config: PathBuf,
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    #[arg(long)]
    rpc_url: Option<String>,
    #[arg(long)]
    wallet: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show wallet, balance and sale progress.
    Status,
    /// Tick once per second until the sale goes live.
    Countdown,
    /// Submit one mint and report the outcome.
    Mint,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config)?;
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(rpc_url) = cli.rpc_url {
        settings.rpc_url = rpc_url;
    }
    if let Some(wallet) = cli.wallet {
        settings.wallet = Some(wallet);
    }
    let settings = settings.resolve()?;

    let controller = build_controller(&settings).await;
    let connection = controller
        .connect()
        .await
        .context("failed to connect wallet")?;
    let sale_error = connection.sale.err();

    match cli.command {
        Command::Status => print_status(&controller, sale_error.as_ref()).await,
        Command::Countdown => {
            require_sale(sale_error)?;
            run_countdown(&controller).await;
        }
        Command::Mint => {
            require_sale(sale_error)?;
            let result = controller.submit_mint().await?;
            print_status(&controller, None).await;
            if !result.succeeded {
                bail!("mint did not succeed");
            }
        }
    }

    Ok(())
}

fn sale_unavailable_message(err: &ControllerError) -> &'static str {
    if err.is_retryable() {
        "sale state unavailable; retry once the ledger is reachable"
    } else {
        "sale state unavailable"
    }
}

fn require_sale(sale_error: Option<ControllerError>) -> Result<()> {
    match sale_error {
        Some(err) => {
            let message = sale_unavailable_message(&err);
            Err(anyhow::Error::new(err).context(message))
        }
        None => Ok(()),
    }
}

async fn build_controller(settings: &ResolvedSettings) -> MintController {
    let wallet = Arc::new(AddressWallet::new(settings.wallet));
    let collaborators = match settings.backend {
        Backend::Simulated => {
            let collection = Arc::new(SimulatedCollection::new(SimulatedSaleConfig {
                collection_id: settings.mint.collection_id,
                program_id: settings.program_id,
                items_available: settings.simulation.items_available,
                go_live_date: settings.mint.start_date,
                price: settings.simulated_price(),
            }));
            collection
                .fund(
                    settings.wallet,
                    Lamports(settings.simulation.wallet_balance_lamports),
                )
                .await;
            info!(
                items_available = settings.simulation.items_available,
                "using simulated collection"
            );
            MintCollaborators {
                wallet,
                sales: collection.clone(),
                mints: collection.clone(),
                balances: collection,
            }
        }
        Backend::Rpc => {
            let ledger = Arc::new(RpcLedgerClient::new(
                settings.rpc_url.clone(),
                settings.mint.commitment,
            ));
            info!(rpc_url = %ledger.endpoint(), "using json-rpc ledger");
            let program = Arc::new(UnconfiguredProgramClient);
            MintCollaborators {
                wallet,
                sales: program.clone(),
                mints: Arc::new(RpcConfirmedMints::new(program, ledger.clone())),
                balances: ledger,
            }
        }
    };
    MintController::new(settings.mint.clone(), collaborators)
}

async fn print_status(controller: &MintController, sale_error: Option<&ControllerError>) {
    let now = Utc::now();
    let snapshot = controller.snapshot_at(now).await;
    let state = controller.ui_state(now).await;
    let lines = render_status(
        controller.settings().collection_id,
        &snapshot,
        state,
        sale_error,
        now,
    );
    for line in lines {
        println!("{line}");
    }
}

fn render_status(
    collection_id: CollectionId,
    snapshot: &ControllerSnapshot,
    state: UiState,
    sale_error: Option<&ControllerError>,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = vec![format!("Collection: {}", collection_id.0.shortened())];
    if let Some(session) = &snapshot.session {
        lines.push(format!("Wallet: {}", session.public_key.shortened()));
    }
    lines.push(format!(
        "Balance: {} SOL",
        snapshot.balance.unwrap_or_default().to_sol()
    ));
    match (snapshot.sale, sale_error) {
        (Some(sale), _) => lines.push(format!(
            "{} / {} minted ({} remaining)",
            sale.items_redeemed, sale.items_available, sale.items_remaining
        )),
        (None, Some(err)) => lines.push(format!("{}: {err}", sale_unavailable_message(err))),
        (None, None) => {}
    }
    if snapshot.notification.is_visible(now) {
        lines.push(snapshot.notification.message.clone());
    }
    lines.push(format!("[{}]", state.label(snapshot.countdown_target, now)));
    lines
}
async fn run_countdown(controller: &MintController) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let now = Utc::now();
        let state = controller.ui_state(now).await;
        if state != UiState::CountingDown {
            break;
        }
        let target = controller.snapshot().await.countdown_target;
        println!("{}", state.label(target, now));
    }
    print_status(controller, None).await;
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
