use clap::Parser;
use ton_balance_monitor::api::{Cli, CliHandler};
use ton_balance_monitor::config::AppConfig;
use ton_balance_monitor::database::open_store;
use ton_balance_monitor::models::AddressRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    // less verbose than the monitor
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = AppConfig::load_from_file(&cli.config)?;
    config.apply_env_overrides()?;
    let wallets_file = cli.wallets.clone().unwrap_or(config.monitor.wallets_file);
    let store_url = cli.store.clone().or(config.store.url);

    let registry = match AddressRegistry::load(&wallets_file) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to load wallets: {}", e);
            std::process::exit(1);
        }
    };

    if store_url.is_none() {
        eprintln!("No store URL configured; the in-memory store is always empty.");
    }

    let store = match open_store(store_url.as_deref()).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open state store: {}", e);
            std::process::exit(1);
        }
    };

    let handler = CliHandler::new(registry, store);
    if let Err(e) = handler.execute_command(&cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
