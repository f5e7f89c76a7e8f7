//! Bot configuration storage.
//!
//! Holds the provisioning output: channel access token, administrator id,
//! and the pseudonym hash salt. Absence of a stored config on startup means
//! the bot has never been provisioned.

use anyhow::Result;
use redb::{Database, ReadableDatabase, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CONFIG_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("bot_config");

const CONFIG_KEY: &str = "bot_config";

/// Process-wide configuration persisted at provisioning time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot_token: String,
    pub admin_user_id: i64,
    /// Secret salt for pseudonym derivation. Generated once; rotating it
    /// would invalidate every previously issued pseudonym and link.
    pub hash_salt: String,
}

impl BotConfig {
    /// Validate provisioning input.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("Bot token must not be empty"));
        }
        if self.admin_user_id <= 0 {
            return Err(anyhow::anyhow!("Administrator user id must be positive"));
        }
        if self.hash_salt.len() < 32 {
            return Err(anyhow::anyhow!("Hash salt must be at least 32 characters"));
        }
        Ok(())
    }
}

/// Configuration persistence.
#[derive(Debug, Clone)]
pub struct BotConfigStorage {
    db: Arc<Database>,
}

impl BotConfigStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(CONFIG_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Load the stored config, or None if the bot is unprovisioned.
    pub fn load(&self) -> Result<Option<BotConfig>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONFIG_TABLE)?;

        match table.get(CONFIG_KEY)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn store(&self, config: &BotConfig) -> Result<()> {
        config.validate()?;
        let data = serde_json::to_vec(config)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONFIG_TABLE)?;
            table.insert(CONFIG_KEY, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
