//! # Command Line Interface
//!
//! Thin front end over [`CredentialLeaseClient`]: check out one credential and
//! print it to stdout. Configuration comes from the environment (see
//! [`BrokerConfig::from_env`]).

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::broker::{CredentialLeaseClient, HttpTransport, SecretString, SessionManager};
use crate::config::{BrokerConfig, LoggingConfig};
use crate::observability::{init_logging, log_config_info};

#[derive(Parser, Debug)]
#[command(name = "credlease")]
#[command(about = "Lease short-lived credentials for broker-managed accounts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Check out the current credential of a managed account
    Checkout {
        /// Managed system name (e.g. Computer01)
        #[arg(long)]
        system: String,

        /// Managed account name (e.g. User04)
        #[arg(long)]
        account: String,
    },

    /// Check out a credential addressed as system/account
    CheckoutPath {
        /// Account path, e.g. Computer01/User04
        path: String,

        /// Separator between system and account
        #[arg(long, default_value_t = '/')]
        separator: char,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env().context("Failed to load logging configuration")?;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    init_logging(&logging).context("Failed to initialise logging")?;

    let config = BrokerConfig::from_env().context("Failed to load broker configuration")?;
    log_config_info(&config);

    let transport =
        Arc::new(HttpTransport::new(&config).context("Failed to create broker HTTP client")?);
    let sessions = Arc::new(SessionManager::new(transport));
    let client = CredentialLeaseClient::new(sessions, config.lease.clone());

    let secret = match cli.command {
        Commands::Checkout { system, account } => client
            .checkout(&system, &account)
            .await
            .with_context(|| format!("Failed to check out {}/{}", system, account))?,
        Commands::CheckoutPath { path, separator } => client
            .checkout_path(&path, separator)
            .await
            .with_context(|| format!("Failed to check out '{}'", path))?,
    };

    print_secret(&secret)
}

fn print_secret(secret: &SecretString) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", secret.expose_secret()).context("Failed to write credential")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
