//! evm-deploy: staged deployment of a multi-contract lending protocol
//!
//! ## Features
//!
//! - **plan**: Show the deployment waves of the linked units
//! - **deploy**: Run deployment stages, resuming from the state file
//! - **link**: Resolve one unit's bytecode against deployed libraries
//! - **encode-price / decode-price**: Packed oracle price words
//! - **status**: Show what the state file has recorded
//! - **clean**: Remove the state file
//!
//! ## Example Usage
//!
//! ```bash
//! # Inspect the waves before touching the network
//! evm-deploy --spec deploy.yaml plan
//!
//! # Simulate the whole deployment in memory
//! evm-deploy --spec deploy.yaml --dry-run deploy
//!
//! # Deploy against a local node, then only refresh prices later
//! evm-deploy --spec deploy.yaml --rpc-url http://localhost:8545 deploy
//! evm-deploy --spec deploy.yaml deploy --stage prices
//!
//! # Sign locally against a public endpoint
//! EVM_DEPLOY_PRIVATE_KEY=0x... evm-deploy --spec deploy.yaml --rpc-url https://rpc.example deploy
//!
//! # Pack a price
//! evm-deploy encode-price 2448.5 --timestamp 1700000000
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod deploy_cli;

use deploy_cli::{
    deploy::DeployCmd,
    link::LinkCmd,
    plan::PlanCmd,
    price::{DecodePriceCmd, EncodePriceCmd},
    CliContext,
};

#[derive(Parser)]
#[command(
    name = "evm-deploy",
    author,
    version,
    about = "Staged deployment of multi-contract EVM protocols",
    long_about = "Links libraries, sequences deployments into waves and configures a lending \
                  protocol (pools, reward modules, oracle prices, test balances).\n\n\
                  Progress is recorded in a state file so interrupted runs resume."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deployment spec (YAML or JSON)
    #[arg(long, global = true, default_value = "deploy.yaml")]
    spec: std::path::PathBuf,

    /// State file recording deployed addresses (default: deployments.json next to the spec)
    #[arg(long, global = true)]
    state_file: Option<std::path::PathBuf>,

    /// JSON-RPC endpoint, overriding the spec and EVM_DEPLOY_RPC_URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Sender account, overriding the spec and EVM_DEPLOY_SENDER
    #[arg(long, global = true)]
    sender: Option<String>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logs and per-entry detail)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Run against an in-memory chain; the state file is neither read nor written
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the deployment waves of the linked units
    Plan(PlanCmd),

    /// Run deployment stages
    Deploy(DeployCmd),

    /// Resolve one unit's bytecode against deployed libraries
    Link(LinkCmd),

    /// Pack a decimal price and timestamp into an oracle word
    EncodePrice(EncodePriceCmd),

    /// Unpack an oracle word
    DecodePrice(DecodePriceCmd),

    /// Show recorded deployments and stage progress
    Status,

    /// Remove the state file
    Clean,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let Cli {
        command,
        spec,
        state_file,
        rpc_url,
        sender,
        json,
        verbose,
        dry_run,
    } = Cli::parse();
    init_tracing(verbose);

    let ctx = CliContext {
        spec_path: spec,
        state_file,
        rpc_url,
        sender,
        json,
        verbose,
        dry_run,
    };

    match command {
        Commands::Plan(cmd) => cmd.execute(&ctx),
        Commands::Deploy(cmd) => cmd.execute(&ctx).await,
        Commands::Link(cmd) => cmd.execute(&ctx),
        Commands::EncodePrice(cmd) => cmd.execute(&ctx),
        Commands::DecodePrice(cmd) => cmd.execute(&ctx),
        Commands::Status => {
            let path = ctx.state_file_path();
            let ledger = if path.exists() {
                Some(evm_deployer::core::DeploymentLedger::load(&path)?)
            } else {
                None
            };
            deploy_cli::output::print_status(ledger.as_ref(), json, &path);
            Ok(())
        }
        Commands::Clean => {
            let path = ctx.state_file_path();
            if path.exists() {
                std::fs::remove_file(&path)?;
                println!("Removed state file: {}", path.display());
            } else {
                println!("No state file to remove");
            }
            Ok(())
        }
    }
}
