mod allocator;
mod classifier;
mod command;
mod config;
mod error;
mod ledger;
mod logs;
mod prompt;
mod retry;
mod runner;
mod session;
mod transfer;
mod wallet;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::{Cluster, Config, Overrides};
use crate::error::DistributorError;
use crate::prompt::ConsoleOperator;
use crate::runner::SystemRunner;
use crate::session::Mode;
use crate::transfer::TransferService;
use crate::wallet::resolve_wallet_address;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Distribute a token proportionally to the current holdings of a list of addresses"
)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Generate default config file
    #[clap(long)]
    init: bool,

    /// Show the wallet address that pays for the distribution
    #[clap(short, long)]
    show_wallet: bool,

    /// File with one `address,balance` pair per line
    #[clap(short, long, required_unless_present_any = ["init", "show_wallet"])]
    address_list: Option<PathBuf>,

    /// Total amount of tokens to distribute across all recipients
    #[clap(short, long = "drop")]
    drop_amount: Option<f64>,

    /// Run without confirmation prompts
    #[clap(long)]
    non_interactive: bool,

    /// RPC endpoint, overrides the config file and --cluster
    #[clap(long)]
    url: Option<String>,

    /// Well-known endpoint to use when no RPC url is configured
    #[clap(long, value_enum)]
    cluster: Option<Cluster>,

    /// Retry 429 responses instead of logging them as unconfirmed
    #[clap(long)]
    retry_rate_limit: bool,

    /// Create the recipient's token account when missing
    #[clap(long)]
    fund_recipient: bool,

    /// Allow transfers to recipients without a SOL balance
    #[clap(long)]
    allow_unfunded_recipient: bool,

    /// Debug logging on stderr
    #[clap(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            rpc_url: self.url.clone(),
            cluster: self.cluster,
            drop_amount: self.drop_amount,
            retry_rate_limit: self.retry_rate_limit,
            fund_recipient: self.fund_recipient,
            allow_unfunded_recipient: self.allow_unfunded_recipient,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let interrupted = Arc::new(AtomicBool::new(false));
    let worker_flag = interrupted.clone();

    // prompts and the wallet tool block, so the run lives on a blocking thread
    let worker = tokio::task::spawn_blocking(move || run(args, worker_flag));

    let result = tokio::select! {
        joined = worker => joined.unwrap_or_else(|e| Err(anyhow!("Distribution task failed: {}", e))),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                interrupted.store(true, Ordering::SeqCst);
                Err(DistributorError::Interrupted.into())
            }
            Err(e) => Err(anyhow!("Failed to listen for Ctrl-C: {}", e)),
        },
    };

    if let Err(err) = result {
        let code = err
            .downcast_ref::<DistributorError>()
            .map(DistributorError::exit_code)
            .unwrap_or(1);
        eprintln!("{:#}", err);
        // exit here rather than return: the runtime would wait for the blocking worker
        std::process::exit(code);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args, interrupted: Arc<AtomicBool>) -> Result<()> {
    if args.init {
        let config = Config::default();
        config.save(&args.config)?;
        println!("Default config generated at: {}", args.config.display());
        println!("Set token_mint and token_decimals before running a distribution");
        return Ok(());
    }

    // Load config
    let config = Config::load(&args.config)?;
    let runner = SystemRunner;

    if args.show_wallet {
        let wallet = resolve_wallet_address(&runner, &config.wallet_program)?;
        println!("Current wallet address: {}", wallet);
        return Ok(());
    }

    let settings = config.resolve(&args.overrides())?;
    let address_list = args
        .address_list
        .clone()
        .ok_or_else(|| anyhow!("--address-list is required"))?;
    let mode = if args.non_interactive {
        Mode::NonInteractive
    } else {
        Mode::Interactive
    };

    println!("Using RPC endpoint: {}", settings.template.endpoint);

    let service = TransferService::new(settings, &runner, interrupted);
    let mut operator = ConsoleOperator::stdio();
    service.distribute(&address_list, mode, &mut operator)?;

    Ok(())
}
