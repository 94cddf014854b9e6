pub mod cli;
pub mod notifier;
pub mod price;

pub use cli::{Cli, CliError, CliHandler, Commands, StateRow};
pub use notifier::{Notifier, WebhookNotifier};
pub use price::{PriceClient, PriceSource};
