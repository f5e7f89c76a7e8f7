//! Channel Types
//!
//! Core types for the channel-agnostic messaging layer.

use serde::{Deserialize, Serialize};

/// Opaque handle to a delivered message inside the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// A user's membership standing in a named channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Member,
    Administrator,
    Owner,
    NotMember,
}

impl MembershipStatus {
    /// Whether this status satisfies a membership requirement.
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member | Self::Administrator | Self::Owner)
    }
}

/// What pressing an inline button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Send an opaque callback payload back to the bot.
    Callback(String),
    /// Open an external URL.
    Url(String),
}

/// A single inline action button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Outbound message to a chat.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    /// Persistent reply keyboard rows (menu buttons).
    pub reply_keyboard: Option<Vec<Vec<String>>>,
    /// Remove any persistent keyboard on the recipient side.
    pub remove_keyboard: bool,
    /// Inline action buttons attached to this message.
    pub inline_keyboard: Option<Vec<Vec<InlineButton>>>,
}

impl OutboundMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_keyboard: None,
            remove_keyboard: false,
            inline_keyboard: None,
        }
    }

    pub fn with_reply_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
        self.reply_keyboard = Some(rows);
        self
    }

    pub fn with_keyboard_removed(mut self) -> Self {
        self.remove_keyboard = true;
        self
    }

    pub fn with_inline_keyboard(mut self, rows: Vec<Vec<InlineButton>>) -> Self {
        self.inline_keyboard = Some(rows);
        self
    }
}

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInfo {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl SenderInfo {
    /// Best human-readable name for admin-facing surfaces.
    pub fn display(&self) -> String {
        if let Some(username) = &self.username {
            format!("@{username}")
        } else if let Some(first_name) = &self.first_name {
            first_name.clone()
        } else {
            self.user_id.to_string()
        }
    }
}

/// A regular message received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub sender: SenderInfo,
    pub text: Option<String>,
}

impl IncomingMessage {
    /// Reference to this message for copy-based relaying.
    pub fn source_ref(&self) -> MessageRef {
        MessageRef::new(self.chat_id, self.message_id)
    }
}

/// An inline-button press received from a user.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    /// Channel-side callback id, needed to acknowledge the press.
    pub callback_id: String,
    pub sender: SenderInfo,
    /// Chat and message the pressed button was attached to, if known.
    pub message: Option<MessageRef>,
    /// Raw callback payload; decoded by the action-reference layer.
    pub data: String,
}

/// Any inbound event from the channel.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(IncomingMessage),
    Callback(CallbackEvent),
}

impl InboundEvent {
    pub fn sender(&self) -> &SenderInfo {
        match self {
            Self::Message(message) => &message.sender,
            Self::Callback(callback) => &callback.sender,
        }
    }

    /// Chat to address responses to.
    pub fn chat_id(&self) -> i64 {
        match self {
            Self::Message(message) => message.chat_id,
            Self::Callback(callback) => callback
                .message
                .map(|m| m.chat_id)
                .unwrap_or(callback.sender.user_id),
        }
    }
}
