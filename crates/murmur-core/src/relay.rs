//! Relay Engine
//!
//! Forwards messages between users without either side learning the other's
//! real identifier, and threads replies back through durable relay records.

use murmur_storage::{RelayRecord, RelayRecordStorage, UserStorage};
use std::sync::Arc;
use tracing::warn;

use crate::channel::{ActionRef, InlineButton, Messenger, MessageRef};
use crate::error::MurmurError;
use crate::pseudonym::PseudonymService;

const REPLY_BUTTON_LABEL: &str = "↩️ Reply anonymously";
const REPLY_NOTICE: &str = "💬 You received a reply to your anonymous message:";

/// Anonymous message relay over the channel's copy capability.
pub struct RelayEngine {
    users: Arc<UserStorage>,
    records: Arc<RelayRecordStorage>,
    pseudonyms: PseudonymService,
    messenger: Arc<dyn Messenger>,
}

impl RelayEngine {
    pub fn new(
        users: Arc<UserStorage>,
        records: Arc<RelayRecordStorage>,
        pseudonyms: PseudonymService,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            users,
            records,
            pseudonyms,
            messenger,
        }
    }

    /// Relay the message at `payload` from sender to recipient anonymously.
    ///
    /// The record is persisted only after the copy was delivered; a failed
    /// delivery leaves no trace. Attaching the reply button happens after
    /// persistence and is best effort: the message is already with the
    /// recipient, so the record is kept even if the button edit fails.
    pub async fn send_anonymous(
        &self,
        sender_id: i64,
        recipient_id: i64,
        payload: MessageRef,
    ) -> Result<RelayRecord, MurmurError> {
        if sender_id == recipient_id {
            return Err(MurmurError::SelfTarget);
        }

        let sender_pseudonym = self.pseudonyms.derive(sender_id);
        let recipient_pseudonym = self.pseudonyms.derive(recipient_id);
        if self.users.get(&recipient_pseudonym)?.is_none() {
            return Err(MurmurError::RecipientNotFound);
        }

        let delivered = self
            .messenger
            .copy_message(recipient_id, payload.chat_id, payload.message_id)
            .await
            .map_err(|e| e.into_delivery_failure())?;

        let record_id = self.records.insert_relay_record(
            &sender_pseudonym,
            &recipient_pseudonym,
            delivered.message_id,
        )?;

        let reply_button = InlineButton::callback(
            REPLY_BUTTON_LABEL,
            ActionRef::Reply { record_id }.encode(),
        );
        if let Err(e) = self
            .messenger
            .set_message_actions(&delivered, vec![vec![reply_button]])
            .await
        {
            warn!(
                "Could not attach reply action to record {}: {}",
                record_id, e
            );
        }

        Ok(RelayRecord {
            record_id,
            sender_pseudonym,
            recipient_pseudonym,
            delivered_message_id: delivered.message_id,
        })
    }

    /// Resolve a reply action back to the original sender's real id.
    pub fn resolve_reply_target(&self, record_id: u64) -> Result<i64, MurmurError> {
        let record = self
            .records
            .find_relay_record(record_id)?
            .ok_or(MurmurError::RecordNotFound(record_id))?;
        self.pseudonyms.resolve(&record.sender_pseudonym)
    }

    /// Deliver a reply to the record's original sender.
    ///
    /// Replies are not chained into new anonymous threads; replying to a
    /// reply requires a fresh relay.
    pub async fn reply(&self, record_id: u64, payload: MessageRef) -> Result<(), MurmurError> {
        let target_id = self.resolve_reply_target(record_id)?;

        self.messenger
            .send_text(target_id, REPLY_NOTICE)
            .await
            .map_err(|e| e.into_delivery_failure())?;
        self.messenger
            .copy_message(target_id, payload.chat_id, payload.message_id)
            .await
            .map_err(|e| e.into_delivery_failure())?;

        Ok(())
    }
}
