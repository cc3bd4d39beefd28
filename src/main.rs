//! Joint Account CLI
//!
//! Command-line front-end for the joint account contract.

use alloy::primitives::Address;
use alloy::providers::DynProvider;
use clap::{Parser, Subcommand};
use joint_account_client::classify::classify;
use joint_account_client::contract;
use joint_account_client::forms::{
    CloseAccountForm, FormSurface, OpenAccountForm, RegisterUserForm, TransferForm,
};
use joint_account_client::shell::Shell;
use joint_account_client::simulation::{self, Artifact, LoadSimulation};
use joint_account_client::wallet::{
    LocalKeyWallet, RpcWallet, TransactionSimulator, WalletProvider,
};
use joint_account_client::{
    App, AppView, Config, ConnectionError, ConnectionManager, Error, Notifier, Result,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "joint-account")]
#[command(about = "Client for the joint account smart contract")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Grant account access to a local key without prompting
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the wallet and show the session
    Connect,

    /// Register a user
    Register {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        name: String,

        /// Simulate with eth_call instead of sending
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a joint account between two users
    Open {
        #[arg(long)]
        user1: String,

        #[arg(long)]
        user2: String,

        /// Initial balance in ETH
        #[arg(long)]
        balance: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Transfer between two users
    Transfer {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Amount in ETH
        #[arg(long)]
        amount: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Close the joint account of two users
    Close {
        #[arg(long)]
        user1: String,

        #[arg(long)]
        user2: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Follow wallet account and network changes until interrupted
    Watch,

    /// Interactive menu
    Shell,

    /// Deploy the contract from a compiled artifact
    Deploy {
        /// Artifact JSON with `abi` and `bytecode`
        #[arg(short, long)]
        artifact: PathBuf,
    },

    /// Seed a power-law network of accounts and drive random transfers
    Simulate {
        /// Deploy a fresh contract from this artifact first
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        #[arg(long, default_value_t = 100)]
        users: usize,

        /// Power-law exponent of the account degree distribution
        #[arg(long, default_value_t = 2.5)]
        alpha: f64,

        #[arg(long, default_value_t = 1000)]
        transactions: usize,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Deploy { artifact } => {
            let wallet = build_wallet(&config, cli.yes)?;
            let (from, provider) = signer(wallet.as_ref()).await?;
            let artifact = Artifact::from_file(&artifact)?;
            let address = simulation::deploy(&provider, from, &artifact).await?;
            println!("{}", address);
        }
        Commands::Simulate {
            artifact,
            users,
            alpha,
            transactions,
            seed,
        } => {
            let wallet = build_wallet(&config, cli.yes)?;
            run_simulation(&config, wallet, artifact, users, alpha, transactions, seed).await?;
        }
        command => {
            let interactive = matches!(command, Commands::Shell);
            // In the shell the `connect` command is itself the approval
            let wallet = match build_wallet(&config, cli.yes || interactive) {
                Ok(wallet) => Some(wallet),
                Err(Error::Connection(ConnectionError::NoWalletInstalled)) => None,
                Err(e) => return Err(e),
            };
            let notifier = Notifier::new();
            let renderer = spawn_renderer(&notifier);
            let mut app = App::new(
                ConnectionManager::new(wallet, config.connection_settings()),
                notifier,
            );

            let result = run_app(&mut app, command).await;

            // Closing the notifier lets the renderer drain and exit
            drop(app);
            let _ = renderer.await;
            result?;
        }
    }

    Ok(())
}

async fn run_app(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Shell => {
            app.init().await;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            Shell::new(stdin, tokio::io::stdout()).run(app).await
        }
        Commands::Watch => {
            app.connect().await?;
            print_view(app).await;
            watch(app).await
        }
        Commands::Connect => {
            app.connect().await?;
            print_view(app).await;
            Ok(())
        }
        Commands::Register {
            user_id,
            name,
            dry_run,
        } => submit(app, RegisterUserForm::new(user_id, name), dry_run).await,
        Commands::Open {
            user1,
            user2,
            balance,
            dry_run,
        } => submit(app, OpenAccountForm::new(user1, user2, balance), dry_run).await,
        Commands::Transfer {
            from,
            to,
            amount,
            dry_run,
        } => submit(app, TransferForm::new(from, to, amount), dry_run).await,
        Commands::Close {
            user1,
            user2,
            dry_run,
        } => submit(app, CloseAccountForm::new(user1, user2), dry_run).await,
        Commands::Config | Commands::Deploy { .. } | Commands::Simulate { .. } => Ok(()),
    }
}

/// Connect, then either simulate the form's call or submit the form
async fn submit<F: FormSurface>(app: &mut App, mut form: F, dry_run: bool) -> Result<()> {
    app.connect().await?;

    if dry_run {
        let call = form
            .call()
            .map_err(|f| Error::InvalidArgument(classify(&f)))?;
        let session = app
            .context()
            .session()
            .await
            .ok_or(ConnectionError::UserRejected)?;

        tracing::info!(
            method = call.method_name(),
            from = %session.signer_address,
            contract = %session.contract_address(),
            "Simulating transaction"
        );
        let result = TransactionSimulator::new(&session.contract, session.signer_address)
            .simulate(&call)
            .await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        if !result.success {
            return Err(Error::Simulation(
                result.revert_reason.unwrap_or_else(|| "reverted".to_string()),
            ));
        }
        return Ok(());
    }

    form.submit(app.context()).await?;
    Ok(())
}

async fn watch(app: &mut App) -> Result<()> {
    let Some(mut events) = app.wallet_events() else {
        return Ok(());
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    app.handle_wallet_event(&event).await;
                    print_view(app).await;
                    match app.wallet_events() {
                        Some(rx) => events = rx,
                        None => break,
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Dropped wallet events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

async fn print_view(app: &App) {
    match app.view().await {
        AppView::Connected { address, banner } => {
            println!("Connected: {}", address);
            if let Some(banner) = banner {
                println!("Error: {}", banner);
            }
        }
        AppView::Disconnected {
            wallet_installed: false,
            ..
        } => println!("No wallet found. Set WALLET_RPC_URL or PRIVATE_KEY to use this app."),
        AppView::Disconnected { .. } => println!("Wallet not connected"),
    }
}

/// Print notifications until every notifier is dropped
fn spawn_renderer(notifier: &Notifier) -> JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(note) => eprintln!("[{}] {}", note.level.name(), note.message),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// External wallet when `WALLET_RPC_URL` is set, otherwise the local key
fn build_wallet(config: &Config, assume_yes: bool) -> Result<Arc<dyn WalletProvider>> {
    let rpc = config.rpc()?;

    if let Some(url) = rpc.wallet {
        tracing::info!(url = %url, "Using external wallet");
        return Ok(Arc::new(RpcWallet::new(url)));
    }

    let key = config
        .private_key
        .as_ref()
        .ok_or(ConnectionError::NoWalletInstalled)?;
    let wallet =
        LocalKeyWallet::from_secret(key, rpc.chain).map_err(|e| Error::Wallet(e.to_string()))?;
    tracing::info!(address = %wallet.address(), "Loaded wallet from PRIVATE_KEY");

    if assume_yes {
        Ok(Arc::new(wallet))
    } else {
        Ok(Arc::new(wallet.with_approval(Arc::new(prompt_approval))))
    }
}

fn prompt_approval(account: Address) -> bool {
    eprint!("Allow this app to use account {}? [y/N] ", account);
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// First granted account and a provider signing as it
async fn signer(wallet: &dyn WalletProvider) -> Result<(Address, DynProvider)> {
    let accounts = wallet
        .request_accounts()
        .await
        .map_err(|e| Error::Wallet(e.to_string()))?;
    let account = *accounts
        .first()
        .ok_or(ConnectionError::UserRejected)?;
    let provider = wallet
        .provider_for(account)
        .map_err(|e| Error::Wallet(e.to_string()))?;
    Ok((account, provider))
}

async fn run_simulation(
    config: &Config,
    wallet: Arc<dyn WalletProvider>,
    artifact: Option<PathBuf>,
    users: usize,
    alpha: f64,
    transactions: usize,
    seed: Option<u64>,
) -> Result<()> {
    let (from, provider) = signer(wallet.as_ref()).await?;

    let address = match artifact {
        Some(path) => {
            let artifact = Artifact::from_file(&path)?;
            simulation::deploy(&provider, from, &artifact).await?
        }
        None => joint_account_client::connection::validate_contract_address(
            config.contract_address.as_deref().unwrap_or(""),
        )?,
    };

    tracing::info!(
        contract = %address,
        users = users,
        alpha = alpha,
        transactions = transactions,
        "Starting load simulation"
    );

    let mut load = LoadSimulation::new(contract::bind(address, provider), from, seed);
    let network = load.seed_network(users, alpha).await?;
    let transfers = load.drive_transfers(users, transactions).await?;

    let report = serde_json::json!({
        "contract": address,
        "network": network,
        "transfers": transfers,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
