//! Flow Continuations
//!
//! Step handlers for every multi-step flow. Each handler receives the
//! event that arrived while the flow was active, validates it, and either
//! advances the flow, re-prompts the same step, or finishes.

use anyhow::Result;
use murmur_storage::TargetKind;
use tracing::{error, warn};

use crate::channel::{ActionRef, IncomingMessage, InlineButton};
use crate::error::{ChannelError, MurmurError};
use crate::session::Flow;

use super::handler::{Bot, PROMPT_MESSAGE_BODY, PROMPT_TARGET_LABEL};

const TEXT_REQUIRED: &str = "Please send this step as text.";
const RECIPIENT_NOT_FOUND: &str =
    "⚠️ No user with that username has talked to this bot yet.";
const DELIVERED: &str = "✅ Your message was delivered anonymously.";
const SELF_TARGET: &str = "⚠️ You can't send an anonymous message to yourself.";
const DELIVERY_FAILED: &str =
    "⚠️ Could not deliver the message. The recipient may have blocked the bot.";
const REPLY_SENT: &str = "✅ Reply sent.";
const STALE_REPLY: &str = "⚠️ This conversation is no longer available.";
const CONTACT_FORWARDED: &str = "✅ Forwarded to the administrator.";
const CONTACT_FAILED: &str =
    "⚠️ Could not forward your message to the administrator. Please try again later.";
const BROADCAST_STARTED: &str = "📤 Broadcast started.";
const BAD_CHANNEL_SHAPE: &str =
    "⚠️ That doesn't look like a channel handle. It must start with @.";
const BAD_LINK_SHAPE: &str = "⚠️ That doesn't look like a link. It must start with http.";

impl Bot {
    pub(super) async fn continue_flow(&self, flow: Flow, message: &IncomingMessage) -> Result<()> {
        match flow {
            Flow::AwaitingRecipient => self.step_recipient(message).await,
            Flow::AwaitingMessageBody { recipient_id } => {
                self.step_message_body(recipient_id, message).await
            }
            Flow::AwaitingAdminContactBody => self.step_admin_contact(message).await,
            Flow::AwaitingReplyBody { record_id } => self.step_reply(record_id, message).await,
            Flow::AwaitingAdminReplyBody { user_id } => {
                self.step_admin_reply(user_id, message).await
            }
            Flow::AwaitingBroadcastBody => self.step_broadcast(message).await,
            Flow::AwaitingTargetValue { kind } => self.step_target_value(kind, message).await,
            Flow::AwaitingTargetLabel { target, kind } => {
                self.step_target_label(target, kind, message).await
            }
            Flow::AwaitingTargetRemoval => self.step_target_removal(message).await,
        }
    }

    async fn step_recipient(&self, message: &IncomingMessage) -> Result<()> {
        let sender_id = message.sender.user_id;
        let Some(text) = &message.text else {
            self.messenger.send_text(sender_id, TEXT_REQUIRED).await?;
            return Ok(());
        };

        let name = text.trim().trim_start_matches('@');
        match self.users.find_user_id_by_display_name(name, true)? {
            Some(recipient_id) => {
                self.sessions
                    .begin(sender_id, Flow::AwaitingMessageBody { recipient_id });
                self.send_prompt(sender_id, PROMPT_MESSAGE_BODY).await?;
            }
            None => {
                // Not a validation failure the user can fix by retyping;
                // drop the flow and let them start over.
                self.sessions.clear(sender_id);
                self.send_with_menu(sender_id, RECIPIENT_NOT_FOUND).await?;
            }
        }
        Ok(())
    }

    async fn step_message_body(
        &self,
        recipient_id: i64,
        message: &IncomingMessage,
    ) -> Result<()> {
        let sender_id = message.sender.user_id;
        self.sessions.clear(sender_id);

        match self
            .relay
            .send_anonymous(sender_id, recipient_id, message.source_ref())
            .await
        {
            Ok(_) => self.send_with_menu(sender_id, DELIVERED).await,
            Err(MurmurError::SelfTarget) => self.send_with_menu(sender_id, SELF_TARGET).await,
            Err(MurmurError::RecipientNotFound) => {
                self.send_with_menu(sender_id, RECIPIENT_NOT_FOUND).await
            }
            Err(MurmurError::DeliveryFailed(_)) => {
                self.send_with_menu(sender_id, DELIVERY_FAILED).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn step_admin_contact(&self, message: &IncomingMessage) -> Result<()> {
        let sender_id = message.sender.user_id;
        self.sessions.clear(sender_id);

        match self.forward_to_admin(message).await {
            Ok(()) => self.send_with_menu(sender_id, CONTACT_FORWARDED).await,
            Err(e) => {
                warn!("Contact-admin forward from {} failed: {}", sender_id, e);
                self.send_with_menu(sender_id, CONTACT_FAILED).await
            }
        }
    }

    async fn forward_to_admin(&self, message: &IncomingMessage) -> Result<(), ChannelError> {
        let header = format!("📞 Message from {}:", message.sender.display());
        self.messenger.send_text(self.admin_user_id, &header).await?;
        let copied = self
            .messenger
            .copy_message(self.admin_user_id, message.chat_id, message.message_id)
            .await?;

        // The message is already with the admin; attaching the reply
        // action is best effort.
        let reply_button = InlineButton::callback(
            "↩️ Reply",
            ActionRef::AdminReply {
                user_id: message.sender.user_id,
            }
            .encode(),
        );
        if let Err(e) = self
            .messenger
            .set_message_actions(&copied, vec![vec![reply_button]])
            .await
        {
            warn!("Could not attach reply action to forwarded contact: {}", e);
        }
        Ok(())
    }

    async fn step_reply(&self, record_id: u64, message: &IncomingMessage) -> Result<()> {
        let sender_id = message.sender.user_id;
        self.sessions.clear(sender_id);

        match self.relay.reply(record_id, message.source_ref()).await {
            Ok(()) => self.send_with_menu(sender_id, REPLY_SENT).await,
            Err(MurmurError::RecordNotFound(_) | MurmurError::UnknownPseudonym(_)) => {
                self.send_with_menu(sender_id, STALE_REPLY).await
            }
            Err(MurmurError::DeliveryFailed(_)) => {
                self.send_with_menu(sender_id, DELIVERY_FAILED).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn step_admin_reply(&self, user_id: i64, message: &IncomingMessage) -> Result<()> {
        self.sessions.clear(message.sender.user_id);

        self.messenger
            .send_text(user_id, "📬 Reply from the administrator:")
            .await?;
        self.messenger
            .copy_message(user_id, message.chat_id, message.message_id)
            .await?;

        self.send_with_menu(message.sender.user_id, REPLY_SENT).await
    }

    async fn step_broadcast(&self, message: &IncomingMessage) -> Result<()> {
        let admin_id = message.sender.user_id;
        self.sessions.clear(admin_id);

        // Broadcast paces itself with an inter-send delay; run it as its
        // own task so other users' events keep flowing.
        let ops = self.admin.clone();
        let messenger = self.messenger.clone();
        let payload = message.source_ref();
        tokio::spawn(async move {
            match ops.broadcast(payload).await {
                Ok(outcome) => {
                    let tally = format!(
                        "📢 Broadcast finished: {} delivered, {} failed.",
                        outcome.sent_count, outcome.failed_count
                    );
                    if let Err(e) = messenger.send_text(admin_id, &tally).await {
                        error!("Could not report broadcast tally: {}", e);
                    }
                }
                Err(e) => error!("Broadcast failed: {}", e),
            }
        });

        self.messenger.send_text(admin_id, BROADCAST_STARTED).await?;
        Ok(())
    }

    async fn step_target_value(&self, kind: TargetKind, message: &IncomingMessage) -> Result<()> {
        let admin_id = message.sender.user_id;
        let Some(text) = message.text.as_deref().map(str::trim) else {
            self.messenger.send_text(admin_id, TEXT_REQUIRED).await?;
            return Ok(());
        };

        // Shape check per kind; a failure re-prompts without advancing.
        let valid = match kind {
            TargetKind::Channel => text.starts_with('@') && text.len() > 1,
            TargetKind::Link => text.starts_with("http"),
        };
        if !valid {
            let hint = match kind {
                TargetKind::Channel => BAD_CHANNEL_SHAPE,
                TargetKind::Link => BAD_LINK_SHAPE,
            };
            self.messenger.send_text(admin_id, hint).await?;
            return Ok(());
        }

        self.sessions.begin(
            admin_id,
            Flow::AwaitingTargetLabel {
                target: text.to_string(),
                kind,
            },
        );
        self.send_prompt(admin_id, PROMPT_TARGET_LABEL).await?;
        Ok(())
    }

    async fn step_target_label(
        &self,
        target: String,
        kind: TargetKind,
        message: &IncomingMessage,
    ) -> Result<()> {
        let admin_id = message.sender.user_id;
        let Some(text) = message.text.as_deref().map(str::trim) else {
            self.messenger.send_text(admin_id, TEXT_REQUIRED).await?;
            return Ok(());
        };

        self.sessions.clear(admin_id);
        match self.admin.add_gating_target(&target, kind, text) {
            Ok(()) => self.send_with_menu(admin_id, "✅ Target added.").await,
            Err(MurmurError::Duplicate(_)) => {
                self.send_with_menu(admin_id, "⚠️ That target already exists.").await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn step_target_removal(&self, message: &IncomingMessage) -> Result<()> {
        let admin_id = message.sender.user_id;
        let Some(text) = message.text.as_deref().map(str::trim) else {
            self.messenger.send_text(admin_id, TEXT_REQUIRED).await?;
            return Ok(());
        };

        self.sessions.clear(admin_id);
        match self.admin.remove_gating_target(text) {
            Ok(()) => self.send_with_menu(admin_id, "✅ Target removed.").await,
            Err(MurmurError::TargetNotFound(_)) => {
                self.send_with_menu(admin_id, "⚠️ No such target.").await
            }
            Err(e) => Err(e.into()),
        }
    }
}
