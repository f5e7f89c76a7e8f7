//! Messenger Trait
//!
//! The opaque bidirectional messaging capability every component receives
//! in its constructor. Production uses the Telegram implementation; tests
//! use the mock below.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::ChannelError;
use super::types::{InboundEvent, InlineButton, MembershipStatus, MessageRef, OutboundMessage};

/// Bidirectional messaging channel capability.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver a message, returning a reference to the delivered copy.
    async fn send(&self, message: OutboundMessage) -> Result<MessageRef, ChannelError>;

    /// Convenience: plain text without keyboards.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, ChannelError> {
        self.send(OutboundMessage::new(chat_id, text)).await
    }

    /// Deliver a copy of an existing message, preserving media and text.
    async fn copy_message(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_id: i64,
    ) -> Result<MessageRef, ChannelError>;

    /// Attach (or replace) inline action buttons on a delivered message.
    async fn set_message_actions(
        &self,
        message: &MessageRef,
        buttons: Vec<Vec<InlineButton>>,
    ) -> Result<(), ChannelError>;

    /// Delete a previously delivered message.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), ChannelError>;

    /// Query a user's membership status in a named channel.
    ///
    /// A query failure (e.g. the bot cannot inspect the channel) surfaces as
    /// an error; the admission gate decides what to do with it.
    async fn member_status(
        &self,
        channel: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, ChannelError>;

    /// Acknowledge an inline-button press, optionally with a popup.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), ChannelError>;

    /// The bot's own channel username, for building shareable deep links.
    async fn own_username(&self) -> Result<String, ChannelError>;

    /// Set the bot's public description. Best effort.
    async fn set_description(&self, description: &str) -> Result<(), ChannelError>;

    /// Start receiving inbound events (None if the channel cannot receive).
    fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundEvent> + Send>>>;
}

/// Test double for unit testing channel-dependent logic.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Debug, Clone)]
    pub struct AnsweredCallback {
        pub callback_id: String,
        pub text: Option<String>,
        pub alert: bool,
    }

    /// A scriptable in-memory messenger.
    ///
    /// Chats listed in `blocked` refuse deliveries with `Forbidden`;
    /// channels listed in `failing_channels` refuse membership queries.
    #[derive(Default)]
    pub struct MockMessenger {
        next_message_id: AtomicI64,
        pub sent: Mutex<Vec<OutboundMessage>>,
        pub copies: Mutex<Vec<(i64, i64, i64)>>,
        pub action_edits: Mutex<Vec<(MessageRef, Vec<Vec<InlineButton>>)>>,
        pub deleted: Mutex<Vec<MessageRef>>,
        pub answered: Mutex<Vec<AnsweredCallback>>,
        pub blocked: Mutex<HashSet<i64>>,
        pub memberships: Mutex<HashMap<(String, i64), MembershipStatus>>,
        pub failing_channels: Mutex<HashSet<String>>,
        pub username: String,
    }

    impl MockMessenger {
        pub fn new() -> Self {
            Self {
                username: "murmur_bot".to_string(),
                ..Default::default()
            }
        }

        pub fn block_chat(&self, chat_id: i64) {
            self.blocked.lock().unwrap().insert(chat_id);
        }

        pub fn set_membership(&self, channel: &str, user_id: i64, status: MembershipStatus) {
            self.memberships
                .lock()
                .unwrap()
                .insert((channel.to_string(), user_id), status);
        }

        pub fn fail_membership_queries(&self, channel: &str) {
            self.failing_channels
                .lock()
                .unwrap()
                .insert(channel.to_string());
        }

        pub fn sent_texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
        }

        fn next_ref(&self, chat_id: i64) -> MessageRef {
            let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
            MessageRef::new(chat_id, id)
        }

        fn check_blocked(&self, chat_id: i64) -> Result<(), ChannelError> {
            if self.blocked.lock().unwrap().contains(&chat_id) {
                Err(ChannelError::Forbidden(format!(
                    "chat {chat_id} blocked the bot"
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Messenger for MockMessenger {
        async fn send(&self, message: OutboundMessage) -> Result<MessageRef, ChannelError> {
            self.check_blocked(message.chat_id)?;
            let delivered = self.next_ref(message.chat_id);
            self.sent.lock().unwrap().push(message);
            Ok(delivered)
        }

        async fn copy_message(
            &self,
            to_chat: i64,
            from_chat: i64,
            message_id: i64,
        ) -> Result<MessageRef, ChannelError> {
            self.check_blocked(to_chat)?;
            self.copies
                .lock()
                .unwrap()
                .push((to_chat, from_chat, message_id));
            Ok(self.next_ref(to_chat))
        }

        async fn set_message_actions(
            &self,
            message: &MessageRef,
            buttons: Vec<Vec<InlineButton>>,
        ) -> Result<(), ChannelError> {
            self.action_edits.lock().unwrap().push((*message, buttons));
            Ok(())
        }

        async fn delete_message(&self, message: &MessageRef) -> Result<(), ChannelError> {
            self.deleted.lock().unwrap().push(*message);
            Ok(())
        }

        async fn member_status(
            &self,
            channel: &str,
            user_id: i64,
        ) -> Result<MembershipStatus, ChannelError> {
            if self.failing_channels.lock().unwrap().contains(channel) {
                return Err(ChannelError::Api(format!(
                    "not enough rights to inspect {channel}"
                )));
            }
            Ok(self
                .memberships
                .lock()
                .unwrap()
                .get(&(channel.to_string(), user_id))
                .copied()
                .unwrap_or(MembershipStatus::NotMember))
        }

        async fn answer_callback(
            &self,
            callback_id: &str,
            text: Option<&str>,
            alert: bool,
        ) -> Result<(), ChannelError> {
            self.answered.lock().unwrap().push(AnsweredCallback {
                callback_id: callback_id.to_string(),
                text: text.map(|s| s.to_string()),
                alert,
            });
            Ok(())
        }

        async fn own_username(&self) -> Result<String, ChannelError> {
            Ok(self.username.clone())
        }

        async fn set_description(&self, _description: &str) -> Result<(), ChannelError> {
            Ok(())
        }

        fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundEvent> + Send>>> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockMessenger;
    use super::*;

    #[tokio::test]
    async fn test_mock_records_sent_messages() {
        let messenger = MockMessenger::new();

        messenger.send_text(42, "hello").await.unwrap();

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 42);
        assert_eq!(sent[0].text, "hello");
    }

    #[tokio::test]
    async fn test_mock_blocked_chat_refuses_delivery() {
        let messenger = MockMessenger::new();
        messenger.block_chat(99);

        let result = messenger.send_text(99, "hello").await;
        assert!(matches!(result, Err(ChannelError::Forbidden(_))));

        let result = messenger.copy_message(99, 1, 1).await;
        assert!(matches!(result, Err(ChannelError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_mock_membership_defaults_to_not_member() {
        let messenger = MockMessenger::new();

        let status = messenger.member_status("@chan", 1).await.unwrap();
        assert_eq!(status, MembershipStatus::NotMember);

        messenger.set_membership("@chan", 1, MembershipStatus::Member);
        let status = messenger.member_status("@chan", 1).await.unwrap();
        assert_eq!(status, MembershipStatus::Member);
    }

    #[tokio::test]
    async fn test_mock_failing_channel_errors() {
        let messenger = MockMessenger::new();
        messenger.fail_membership_queries("@private");

        let result = messenger.member_status("@private", 1).await;
        assert!(matches!(result, Err(ChannelError::Api(_))));
    }
}
