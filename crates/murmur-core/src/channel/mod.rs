//! Messaging channel abstraction and the Telegram implementation.

pub mod action;
pub mod telegram;
pub mod traits;
pub mod types;

pub use action::ActionRef;
pub use telegram::{TelegramChannel, TelegramConfig};
pub use traits::Messenger;
pub use types::{
    ButtonAction, CallbackEvent, InboundEvent, IncomingMessage, InlineButton, MembershipStatus,
    MessageRef, OutboundMessage, SenderInfo,
};

#[cfg(test)]
pub use traits::mock;
