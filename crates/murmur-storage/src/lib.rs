//! Murmur Storage - persistence layer for the anonymous relay bot.
//!
//! Uses redb as the embedded database. Each entity type gets its own table;
//! values are JSON-encoded records. All operations are atomic per call (one
//! write transaction each), and unique-key conflicts resolve through
//! insert-if-absent rather than a read-then-write race.
//!
//! # Tables
//!
//! - `users` - registered users, keyed by pseudonym (reverse mapping)
//! - `relay_records` - reply-threading log, keyed by monotonic u64 id
//! - `counters` - sequence counters (relay record ids)
//! - `gating_targets` - forced-subscription targets, keyed by target
//! - `bot_config` - provisioning output (token, admin id, salt)

pub mod config;
pub mod gate;
pub mod relay;
pub mod user;

mod simple_storage;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use config::{BotConfig, BotConfigStorage};
pub use gate::{GatingTarget, GatingTargetStorage, TargetKind};
pub use relay::{RelayRecord, RelayRecordStorage};
pub use simple_storage::SimpleStorage;
pub use user::{UserRecord, UserStorage};

/// Central storage manager that initializes all storage subsystems.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
    pub users: UserStorage,
    pub relay_records: RelayRecordStorage,
    pub gating_targets: GatingTargetStorage,
    pub config: BotConfigStorage,
}

impl Storage {
    /// Open (or create) the database at the given path and initialize all
    /// required tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);

        let users = UserStorage::new(db.clone())?;
        let relay_records = RelayRecordStorage::new(db.clone())?;
        let gating_targets = GatingTargetStorage::new(db.clone())?;
        let config = BotConfigStorage::new(db.clone())?;

        Ok(Self {
            db,
            users,
            relay_records,
            gating_targets,
            config,
        })
    }

    /// Get a reference to the underlying database.
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
