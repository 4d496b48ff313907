//! Cohort Wallet CLI
//!
//! Command-line tool for deriving smart account addresses and sending
//! threshold-signed transfers. Configuration comes from the environment
//! (see `WalletConfig::from_env`).

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cohort_wallet_core::{SigningContext, SmartWallet, TransferRequest, WalletConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cohort-wallet")]
#[command(about = "Threshold-signed smart account wallet CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the smart account address for a user
    Address {
        /// Stable decimal user identifier
        #[arg(long)]
        user_id: String,
    },

    /// Send native currency from a user's smart account
    Send {
        /// Stable decimal user identifier
        #[arg(long)]
        user_id: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount in native units, e.g. 0.01
        #[arg(long)]
        amount: String,

        /// Context variables passed to cohort members (key=value)
        #[arg(long = "context", value_parser = parse_context_entry)]
        context: Vec<(String, String)>,

        /// Print the receipt as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the loaded configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = WalletConfig::from_env().context("loading configuration")?;

    match cli.command {
        Commands::Address { user_id } => {
            let wallet = SmartWallet::connect(config)?;
            println!("{}", wallet.smart_account_for(&user_id)?.to_checksum(None));
        }
        Commands::Send {
            user_id,
            to,
            amount,
            context,
            json,
        } => {
            send(config, TransferRequest::new(user_id, to, amount), context, json).await?;
        }
        Commands::Info => {
            show_info(&config);
        }
    }

    Ok(())
}

async fn send(
    config: WalletConfig,
    request: TransferRequest,
    entries: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let context = entries
        .into_iter()
        .fold(SigningContext::new(), |ctx, (key, value)| ctx.with(key, value));

    let wallet = SmartWallet::connect(config)?;
    info!(user_id = %request.user_id, to = %request.recipient, amount = %request.amount, "Sending transfer");

    let receipt = wallet.send_native(&request, &context).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    println!("\nTransfer submitted\n");
    println!("  Round:          {}", receipt.round_id);
    println!("  Smart account:  {}", receipt.smart_account.to_checksum(None));
    println!("  Recipient:      {}", receipt.recipient.to_checksum(None));
    println!("  Amount:         {}", receipt.formatted_amount());
    println!("  Operation hash: {}", receipt.operation_hash);
    println!("  Bundler hash:   {}", receipt.bundler_hash);
    println!("  Signers:");
    for signer in &receipt.signers {
        println!("    - {}", signer);
    }
    Ok(())
}

fn show_info(config: &WalletConfig) {
    println!("Cohort Wallet v{}", cohort_wallet_core::VERSION);
    println!();
    println!("Chain:");
    println!("  Network:      {} ({})", config.chain_id.name(), config.chain_id);
    println!("  RPC:          {}", config.rpc_url);
    println!("  Entry point:  {}", config.entry_point.to_checksum(None));
    println!("  Bundler:      {}", config.redacted_bundler_url());
    println!();
    println!("Signing:");
    println!("  Gateway:      {}", config.gateway_url);
    println!("  Cohort:       {}", config.cohort_id);
    println!("  Threshold:    {}-of-{}", config.threshold, config.cohort_size);
    println!("  Protocol:     {:?}", config.protocol);
    println!("  AA version:   {}", config.aa_version);
    println!();
    println!("Accounts:");
    match config.smart_account {
        Some(account) => println!("  Pinned:       {}", account.to_checksum(None)),
        None => println!("  Pinned:       none (derived per user)"),
    }
    if let Some(factory) = config.account_factory {
        println!("  Factory:      {}", factory.to_checksum(None));
    }
}

fn parse_context_entry(entry: &str) -> Result<(String, String)> {
    let Some((key, value)) = entry.split_once('=') else {
        bail!("expected key=value, got {:?}", entry);
    };
    if key.trim().is_empty() {
        bail!("context key must not be empty");
    }
    Ok((key.trim().to_string(), value.to_string()))
}
