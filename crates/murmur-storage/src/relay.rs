//! Relay record storage - durable reply-threading log.
//!
//! Each successful anonymous delivery appends an immutable record linking
//! sender and recipient pseudonyms to the delivered message. Record ids are
//! monotonic and allocated from a counter table inside the same write
//! transaction as the insert, so an id is never observed without its record.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("relay_records");
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const RECORD_SEQ_KEY: &str = "relay_record_seq";

/// An immutable relay log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRecord {
    pub record_id: u64,
    pub sender_pseudonym: String,
    pub recipient_pseudonym: String,
    /// Channel message id of the delivered copy in the recipient's chat.
    pub delivered_message_id: i64,
}

/// Append-only relay record persistence.
#[derive(Debug, Clone)]
pub struct RelayRecordStorage {
    db: Arc<Database>,
}

impl RelayRecordStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(RECORDS_TABLE)?;
        write_txn.open_table(COUNTERS_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new record and return its freshly allocated id.
    pub fn insert_relay_record(
        &self,
        sender_pseudonym: &str,
        recipient_pseudonym: &str,
        delivered_message_id: i64,
    ) -> Result<u64> {
        let write_txn = self.db.begin_write()?;
        let record_id = {
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            let next = counters
                .get(RECORD_SEQ_KEY)?
                .map(|value| value.value())
                .unwrap_or(0)
                + 1;
            counters.insert(RECORD_SEQ_KEY, next)?;

            let record = RelayRecord {
                record_id: next,
                sender_pseudonym: sender_pseudonym.to_string(),
                recipient_pseudonym: recipient_pseudonym.to_string(),
                delivered_message_id,
            };
            let data = serde_json::to_vec(&record)?;

            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            records.insert(next, data.as_slice())?;
            next
        };
        write_txn.commit()?;
        Ok(record_id)
    }

    pub fn find_relay_record(&self, record_id: u64) -> Result<Option<RelayRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;

        match table.get(record_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn count_relay_records(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;
        Ok(table.len()? as usize)
    }
}
