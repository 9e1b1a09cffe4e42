//! Mock Web3 Wallet CLI
//!
//! Command-line front end for creating wallets, checking balances and
//! sending signed mock transfers.

use clap::{Parser, Subcommand};
use mock_web3_wallet::address;
use mock_web3_wallet::notify::ResendNotifier;
use mock_web3_wallet::{Config, Currency, Error, Result, Session, WalletFacade};
use secrecy::{ExposeSecret, SecretString};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MNEMONIC_ENV: &str = "WALLET_MNEMONIC";

#[derive(Parser)]
#[command(name = "mock-wallet")]
#[command(about = "Mock Web3 wallet with signed transfers and price protection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct MnemonicArg {
    /// Wallet recovery phrase
    #[arg(long, env = MNEMONIC_ENV, hide_env_values = true)]
    mnemonic: String,
}

impl MnemonicArg {
    fn secret(self) -> SecretString {
        SecretString::from(self.mnemonic)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new wallet with a random starting balance
    Create,

    /// Import a wallet from its recovery phrase
    Import {
        #[command(flatten)]
        wallet: MnemonicArg,
    },

    /// Show a wallet balance and its fiat value
    Balance {
        /// Address to look up (defaults to the wallet of --mnemonic)
        #[arg(long)]
        address: Option<String>,

        /// Wallet recovery phrase
        #[arg(long, env = MNEMONIC_ENV, hide_env_values = true)]
        mnemonic: Option<String>,
    },

    /// Prepare, approve and execute a transfer
    Send {
        #[command(flatten)]
        wallet: MnemonicArg,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount, in the unit given by --currency
        #[arg(long)]
        amount: f64,

        /// ETH or USD
        #[arg(long, default_value = "ETH")]
        currency: String,

        /// Approve without prompting
        #[arg(short, long)]
        yes: bool,
    },

    /// List recent transfers of a wallet
    History {
        /// Address to look up (defaults to the wallet of --mnemonic)
        #[arg(long)]
        address: Option<String>,

        /// Wallet recovery phrase
        #[arg(long, env = MNEMONIC_ENV, hide_env_values = true)]
        mnemonic: Option<String>,

        /// Maximum number of transfers to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the current ETH/USD rate
    Price,

    /// Send a test notification email
    NotifyTest {
        /// Recipient email address
        #[arg(long)]
        to: String,
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
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Create => run_create(&config)?,
        Commands::Import { wallet } => {
            let facade = WalletFacade::from_config(&config)?;
            let address = facade.import_wallet(&wallet.secret())?;
            println!("Imported wallet {}", address);
            println!("Balance: {} ETH", facade.get_balance(&address)?);
        }
        Commands::Balance { address, mnemonic } => {
            run_balance(&config, address, mnemonic).await?;
        }
        Commands::Send {
            wallet,
            to,
            amount,
            currency,
            yes,
        } => {
            let currency: Currency = currency.parse()?;
            run_send(&config, wallet.secret(), &to, amount, currency, yes).await?;
        }
        Commands::History {
            address,
            mnemonic,
            limit,
        } => {
            run_history(&config, address, mnemonic, limit)?;
        }
        Commands::Price => {
            let facade = WalletFacade::from_config(&config)?;
            let reading = facade.current_rate().await;
            println!("1 ETH = ${:.2} USD", reading.rate);
            if reading.used_fallback {
                println!("  (price provider unavailable, using fallback rate)");
            }
        }
        Commands::NotifyTest { to } => {
            let notifier = ResendNotifier::from_env()?;
            notifier.send_test(&to).await?;
            println!("Test notification sent to {}", to);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn run_create(config: &Config) -> Result<()> {
    let facade = WalletFacade::from_config(config)?;
    let created = facade.create_wallet()?;

    println!("Address:  {}", created.address);
    println!("Balance:  {} ETH", created.balance);
    println!();
    println!("Recovery phrase (write it down, it is not stored):");
    println!("  {}", created.mnemonic.expose_secret());
    Ok(())
}

/// Address from `--address`, or derived from the phrase.
fn resolve_address(
    facade: &WalletFacade,
    address: Option<String>,
    mnemonic: Option<String>,
) -> Result<String> {
    match (address, mnemonic) {
        (Some(address), _) => address::normalize(&address),
        (None, Some(mnemonic)) => facade.import_wallet(&SecretString::from(mnemonic)),
        (None, None) => Err(Error::Config(format!(
            "pass --address or --mnemonic (or set {})",
            MNEMONIC_ENV
        ))),
    }
}

async fn run_balance(
    config: &Config,
    address: Option<String>,
    mnemonic: Option<String>,
) -> Result<()> {
    let facade = WalletFacade::from_config(config)?;
    let address = resolve_address(&facade, address, mnemonic)?;
    let balance = facade.get_balance(&address)?;
    let reading = facade.current_rate().await;

    println!("Address: {}", address);
    println!("Balance: {} ETH", balance);
    println!(
        "Value:   ${:.2} USD{}",
        balance.to_ether_f64() * reading.rate,
        if reading.used_fallback { " (fallback rate)" } else { "" }
    );
    Ok(())
}

async fn run_send(
    config: &Config,
    mnemonic: SecretString,
    to: &str,
    amount: f64,
    currency: Currency,
    yes: bool,
) -> Result<()> {
    let facade = WalletFacade::from_config(config)?;
    let mut session = Session::new();
    let from = facade.connect(&mut session, mnemonic)?;

    let pending = facade
        .prepare_in_session(&mut session, to, amount, currency)
        .await?;

    println!("Transaction awaiting approval");
    println!("  From:    {}", pending.from);
    println!("  To:      {}", pending.to);
    println!("  Amount:  {} ETH", pending.amount);
    if let (Some(fiat), Some(rate)) = (pending.fiat_amount, pending.quoted_rate) {
        println!("  Fiat:    ${:.2} USD at ${:.2}/ETH", fiat, rate);
        if pending.used_fallback_rate {
            println!("  Warning: price provider unavailable, converted at fallback rate");
        }
    }
    println!("  Message: {}", pending.message);
    println!(
        "  Expires in {}s",
        facade.remaining_seconds(&session)?
    );

    if !yes && !confirm("Approve and sign this transaction?")? {
        let rejected = facade.reject(&mut session).await?;
        println!("Transaction {} rejected", rejected.id);
        return Ok(());
    }

    let record = facade.approve(&mut session).await?;
    println!(
        "Transaction #{} executed: {} ETH to {}",
        record.id, record.amount, record.to
    );
    println!("New balance: {} ETH", facade.get_balance(&from)?);
    Ok(())
}

fn run_history(
    config: &Config,
    address: Option<String>,
    mnemonic: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let facade = WalletFacade::from_config(config)?;
    let address = resolve_address(&facade, address, mnemonic)?;
    let records = match limit {
        Some(limit) => facade.history_with_limit(&address, limit)?,
        None => facade.history(&address)?,
    };

    if records.is_empty() {
        println!("No transactions for {}", address);
        return Ok(());
    }

    for record in records {
        let direction = if record.from == address { "OUT" } else { "IN " };
        let counterparty = if record.from == address { &record.to } else { &record.from };
        let fiat = record
            .fiat_amount
            .map(|usd| format!(" (${:.2} USD)", usd))
            .unwrap_or_default();
        println!(
            "#{:<5} {} {} {} ETH{} {}",
            record.id,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            direction,
            record.amount,
            fiat,
            address::shorten(counterparty, 4)
        );
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
