//! Interactive Provisioning
//!
//! One-time setup collecting the bot token and administrator id, and
//! generating the pseudonym salt. Runs automatically on first start when
//! no configuration is stored.

use anyhow::{Context, Result};
use murmur_storage::{BotConfig, Storage};
use rand::RngExt;
use rand::distr::Alphanumeric;
use std::io::{self, Write};

const SALT_LEN: usize = 64;

pub fn run_setup(storage: &Storage) -> Result<BotConfig> {
    println!("Murmur first-time setup");
    println!("-----------------------");

    let bot_token = prompt("Bot token (from @BotFather): ")?;
    let admin_user_id: i64 = prompt("Administrator user id: ")?
        .parse()
        .context("administrator id must be a number")?;

    // Generated once; rotating it would orphan every issued link.
    let hash_salt = generate_salt();

    let config = BotConfig {
        bot_token,
        admin_user_id,
        hash_salt,
    };
    storage.config.store(&config)?;

    println!("Configuration saved. Start the bot with `murmur run`.");
    Ok(config)
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn generate_salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}
