use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::database::StateStore;
use crate::error::StoreError;
use crate::models::AddressRegistry;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown user: {0}")]
    UnknownUser(String),
}

#[derive(Parser, Debug)]
#[command(name = "state")]
#[command(about = "Inspect and reset the balance monitor's persisted state")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    /// Wallet file; overrides the configured one
    #[arg(long)]
    pub wallets: Option<String>,

    /// Store URL; overrides the configured one
    #[arg(long)]
    pub store: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Stored balance and last reported transaction per user
    Show,
    /// Forget the stored state of one user
    Reset {
        #[arg(long)]
        user: String,
    },
}

/// One line of `show` output
#[derive(Debug, Clone, PartialEq)]
pub struct StateRow {
    pub user_id: String,
    pub address: String,
    pub balance: Option<Decimal>,
    pub watermark: u64,
}

pub struct CliHandler {
    registry: AddressRegistry,
    store: StateStore,
}

impl CliHandler {
    pub fn new(registry: AddressRegistry, store: StateStore) -> Self {
        Self { registry, store }
    }

    pub async fn execute_command(&self, command: &Commands) -> Result<(), CliError> {
        match command {
            Commands::Show => {
                let rows = self.collect_state().await?;
                print_rows(&rows);
            }
            Commands::Reset { user } => {
                self.reset(user).await?;
                println!("State for user {} cleared", user);
            }
        }
        Ok(())
    }

    pub async fn collect_state(&self) -> Result<Vec<StateRow>, CliError> {
        let mut rows = Vec::with_capacity(self.registry.len());
        for wallet in self.registry.entries() {
            rows.push(StateRow {
                user_id: wallet.user_id.clone(),
                address: wallet.address.clone(),
                balance: self.store.get_balance(&wallet.user_id).await?,
                watermark: self.store.get_watermark(&wallet.user_id).await?,
            });
        }
        Ok(rows)
    }

    pub async fn reset(&self, user_id: &str) -> Result<(), CliError> {
        if self.registry.find(user_id).is_none() {
            return Err(CliError::UnknownUser(user_id.to_string()));
        }
        self.store.reset_user(user_id).await?;
        Ok(())
    }
}

fn print_rows(rows: &[StateRow]) {
    if rows.is_empty() {
        println!("No wallets registered");
        return;
    }

    println!("{:<12} {:<50} {:>20} {:>12}", "USER", "ADDRESS", "BALANCE", "LAST TX");
    for row in rows {
        let balance = row
            .balance
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<50} {:>20} {:>12}",
            row.user_id, row.address, balance, row.watermark
        );
    }
}
