use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use ton_balance_monitor::api::{Notifier, PriceClient, WebhookNotifier};
use ton_balance_monitor::blockchain::{BalanceMonitor, BalanceMonitorConfig, ChangeDetector, ProviderClient};
use ton_balance_monitor::config::AppConfig;
use ton_balance_monitor::database::open_store;
use ton_balance_monitor::logging::{init_logging, ErrorLogger, LogContext};
use ton_balance_monitor::models::AddressRegistry;
use ton_balance_monitor::MonitorError;

#[derive(Parser)]
#[command(name = "balance-monitor")]
#[command(about = "Polls wallet balances and reports changes to a webhook")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Wallet file (JSON object of user id -> address); overrides the configured one
    #[arg(long)]
    wallets: Option<String>,

    /// Initialize, run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Print a configuration file with default values and exit
    #[arg(long)]
    sample_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.sample_config {
        println!("{}", AppConfig::generate_sample_config()?);
        return Ok(());
    }

    let mut config = AppConfig::load_from(&args.config)?;
    if let Some(wallets) = args.wallets {
        config.monitor.wallets_file = wallets;
    }

    init_logging(&config.logging.level, &config.logging.format);
    info!("Starting balance monitor");

    if let Err(e) = run(config, args.once).await {
        ErrorLogger::log_error(&e, Some(LogContext::new("main", "run")));
        error!("Balance monitor stopped: {}", e);
        return Err(e.into());
    }

    Ok(())
}

async fn run(config: AppConfig, once: bool) -> Result<(), MonitorError> {
    let registry = AddressRegistry::load(&config.monitor.wallets_file)?;
    LogContext::new("main", "registry")
        .with_metadata("wallets", serde_json::json!(registry.len()))
        .info(&format!("Loaded {} wallets from {}", registry.len(), config.monitor.wallets_file));

    let store = open_store(config.store.url.as_deref()).await?;
    let chain = ProviderClient::new(&config.provider, config.retry.clone())?;
    let prices = PriceClient::new(&config.price)?;
    let notifier = WebhookNotifier::from_config(&config.notifier)?;

    if !config.notifier.send_balance_changes {
        info!("Balance change notifications are disabled");
    }

    let detector = ChangeDetector::new(
        Arc::new(chain),
        Arc::new(prices),
        notifier.map(|n| Arc::new(n) as Arc<dyn Notifier>),
        store,
        config.notifier.send_balance_changes,
    );
    let monitor = BalanceMonitor::new(
        registry,
        detector,
        Some(BalanceMonitorConfig::from_app_config(&config)),
    );

    if once {
        let summary = monitor.run_once().await;
        info!(
            "Single pass finished: {} wallets, {} changed, {} notified, {} failed",
            summary.total(),
            summary.changed,
            summary.notified,
            summary.failed
        );
        return Ok(());
    }

    monitor.start().await;
    info!("Balance monitor stopped");
    Ok(())
}
