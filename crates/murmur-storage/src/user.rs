//! User storage - pseudonym-keyed user records.
//!
//! The pseudonym is the primary key; the stored record carries the real
//! channel user id, so this table doubles as the one-way hash's reverse
//! mapping. Users are created on first contact and never deleted.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Real channel identifier. Never shown to other non-admin users.
    pub user_id: i64,
    /// Derived opaque handle; immutable once assigned.
    pub pseudonym: String,
    pub display_name: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// User persistence keyed by pseudonym.
#[derive(Debug, Clone)]
pub struct UserStorage {
    db: Arc<Database>,
}

impl UserStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(USERS_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Register a user if absent. Returns true when a new record was
    /// inserted; an existing record is left untouched (idempotent on
    /// conflict, so concurrent first contacts resolve via the table).
    pub fn upsert_user(
        &self,
        pseudonym: &str,
        user_id: i64,
        display_name: Option<&str>,
    ) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(USERS_TABLE)?;
            if table.get(pseudonym)?.is_some() {
                false
            } else {
                let record = UserRecord {
                    user_id,
                    pseudonym: pseudonym.to_string(),
                    display_name: display_name.map(|s| s.to_string()),
                    registered_at: Utc::now(),
                };
                let data = serde_json::to_vec(&record)?;
                table.insert(pseudonym, data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Reverse-map a pseudonym to the real user id.
    pub fn find_user_id_by_pseudonym(&self, pseudonym: &str) -> Result<Option<i64>> {
        Ok(self.get(pseudonym)?.map(|record| record.user_id))
    }

    pub fn get(&self, pseudonym: &str) -> Result<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;

        match table.get(pseudonym)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by display name. Matching is case-insensitive when
    /// requested; the first match in key order wins.
    pub fn find_user_id_by_display_name(
        &self,
        name: &str,
        case_insensitive: bool,
    ) -> Result<Option<i64>> {
        let needle = if case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        };

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;

        for item in table.iter()? {
            let (_, value) = item?;
            let record: UserRecord = serde_json::from_slice(value.value())?;
            let Some(display_name) = record.display_name.as_deref() else {
                continue;
            };
            let matched = if case_insensitive {
                display_name.to_lowercase() == needle
            } else {
                display_name == needle
            };
            if matched {
                return Ok(Some(record.user_id));
            }
        }

        Ok(None)
    }

    /// List users in key order, optionally capped.
    pub fn list_users(&self, limit: Option<usize>) -> Result<Vec<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;

        let mut users = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            users.push(serde_json::from_slice(value.value())?);
            if let Some(limit) = limit
                && users.len() >= limit
            {
                break;
            }
        }

        Ok(users)
    }

    /// Count users, optionally only those registered on or after `since`
    /// (date boundary, UTC).
    pub fn count_users(&self, since: Option<NaiveDate>) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;

        let Some(since) = since else {
            return Ok(table.len()? as usize);
        };

        let mut count = 0;
        for item in table.iter()? {
            let (_, value) = item?;
            let record: UserRecord = serde_json::from_slice(value.value())?;
            if record.registered_at.date_naive() >= since {
                count += 1;
            }
        }

        Ok(count)
    }
}
