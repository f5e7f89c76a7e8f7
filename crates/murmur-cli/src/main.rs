mod cli;
mod setup;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use murmur_core::channel::{Messenger, TelegramChannel};
use murmur_core::runtime::Bot;
use murmur_storage::Storage;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BOT_DESCRIPTION: &str =
    "Send and receive anonymous messages. Share your link, stay unknown.";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let storage = Storage::new(&cli.db)?;

    match cli.command {
        Some(Commands::Setup) => {
            setup::run_setup(&storage)?;
            Ok(())
        }
        Some(Commands::Run) | None => run_bot(storage).await,
    }
}

async fn run_bot(storage: Storage) -> Result<()> {
    let config = match storage.config.load()? {
        Some(config) => config,
        None => {
            info!("No configuration found, starting first-time setup");
            setup::run_setup(&storage)?
        }
    };

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramChannel::with_token(&config.bot_token));
    if let Err(e) = messenger.set_description(BOT_DESCRIPTION).await {
        warn!("Could not set bot description: {}", e);
    }

    let bot = Bot::new(&storage, messenger, &config);
    bot.run().await
}
