//! Telegram Channel Implementation
//!
//! Implements the [`Messenger`] capability against the Telegram Bot API:
//! sending, media-preserving copies, inline keyboard edits, membership
//! queries, and receiving via long-polling.

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::ChannelError;

use super::traits::Messenger;
use super::types::{
    ButtonAction, CallbackEvent, InboundEvent, IncomingMessage, InlineButton, MembershipStatus,
    MessageRef, OutboundMessage, SenderInfo,
};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;

/// Telegram channel configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Long-polling timeout in seconds (default: 30)
    pub polling_timeout: u32,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            polling_timeout: 30,
        }
    }

    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }
}

/// Telegram channel implementation
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    pub fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}{}/{}", TELEGRAM_API_BASE, self.config.bot_token, method)
    }

    /// Issue one Bot API call and unwrap the response envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChannelError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&params)
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        // Telegram reports failures in the JSON envelope regardless of the
        // HTTP status code.
        let body: TelegramResponse<T> = response.json().await?;
        if body.ok {
            body.result
                .ok_or_else(|| ChannelError::Api(format!("{method}: ok but no result")))
        } else {
            let description = body.description.unwrap_or_default();
            match body.error_code {
                Some(403) => Err(ChannelError::Forbidden(description)),
                Some(400) => Err(ChannelError::BadRequest(description)),
                _ => Err(ChannelError::Api(description)),
            }
        }
    }

    fn reply_markup(message: &OutboundMessage) -> Option<serde_json::Value> {
        if let Some(inline) = &message.inline_keyboard {
            return Some(serde_json::json!({
                "inline_keyboard": Self::inline_rows(inline),
            }));
        }
        if let Some(rows) = &message.reply_keyboard {
            let keyboard: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| serde_json::json!({ "text": label }))
                        .collect()
                })
                .collect();
            return Some(serde_json::json!({
                "keyboard": keyboard,
                "resize_keyboard": true,
            }));
        }
        if message.remove_keyboard {
            return Some(serde_json::json!({ "remove_keyboard": true }));
        }
        None
    }

    fn inline_rows(rows: &[Vec<InlineButton>]) -> Vec<Vec<serde_json::Value>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|button| match &button.action {
                        ButtonAction::Callback(data) => serde_json::json!({
                            "text": button.label,
                            "callback_data": data,
                        }),
                        ButtonAction::Url(url) => serde_json::json!({
                            "text": button.label,
                            "url": url,
                        }),
                    })
                    .collect()
            })
            .collect()
    }

    /// Poll for updates using long-polling
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>, ChannelError> {
        let url = self.api_url("getUpdates");

        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message", "callback_query"],
        });

        let response = self
            .client
            .post(&url)
            .json(&params)
            .timeout(std::time::Duration::from_secs(
                self.config.polling_timeout as u64 + 10,
            ))
            .send()
            .await?;

        let body: TelegramResponse<Vec<TelegramUpdate>> = response.json().await?;

        if !body.ok {
            return Err(ChannelError::Api(body.description.unwrap_or_default()));
        }

        let updates = body.result.unwrap_or_default();

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }

        Ok(updates)
    }

    /// Convert a Telegram update to an inbound event.
    fn convert_update(update: TelegramUpdate) -> Option<InboundEvent> {
        if let Some(callback) = update.callback_query {
            let data = callback.data?;
            let message = callback
                .message
                .map(|m| MessageRef::new(m.chat.id, m.message_id));
            return Some(InboundEvent::Callback(CallbackEvent {
                callback_id: callback.id,
                sender: Self::sender_info(callback.from),
                message,
                data,
            }));
        }

        let message = update.message?;
        let from = message.from?;
        if from.is_bot {
            return None;
        }

        Some(InboundEvent::Message(IncomingMessage {
            message_id: message.message_id,
            chat_id: message.chat.id,
            sender: Self::sender_info(from),
            text: message.text,
        }))
    }

    fn sender_info(user: TelegramUser) -> SenderInfo {
        SenderInfo {
            user_id: user.id,
            username: user.username,
            first_name: user.first_name,
        }
    }

    fn parse_member_status(status: &str) -> MembershipStatus {
        match status {
            "creator" => MembershipStatus::Owner,
            "administrator" => MembershipStatus::Administrator,
            "member" => MembershipStatus::Member,
            // restricted / left / kicked / unknown
            _ => MembershipStatus::NotMember,
        }
    }
}

#[async_trait]
impl Messenger for TelegramChannel {
    async fn send(&self, message: OutboundMessage) -> Result<MessageRef, ChannelError> {
        let mut params = serde_json::json!({
            "chat_id": message.chat_id,
            "text": message.text,
        });
        if let Some(markup) = Self::reply_markup(&message) {
            params["reply_markup"] = markup;
        }

        let sent: TelegramMessageId = self.call("sendMessage", params).await?;
        Ok(MessageRef::new(message.chat_id, sent.message_id))
    }

    async fn copy_message(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_id: i64,
    ) -> Result<MessageRef, ChannelError> {
        let params = serde_json::json!({
            "chat_id": to_chat,
            "from_chat_id": from_chat,
            "message_id": message_id,
        });

        let copied: TelegramMessageId = self.call("copyMessage", params).await?;
        Ok(MessageRef::new(to_chat, copied.message_id))
    }

    async fn set_message_actions(
        &self,
        message: &MessageRef,
        buttons: Vec<Vec<InlineButton>>,
    ) -> Result<(), ChannelError> {
        let params = serde_json::json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "reply_markup": { "inline_keyboard": Self::inline_rows(&buttons) },
        });

        self.call::<serde_json::Value>("editMessageReplyMarkup", params)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), ChannelError> {
        let params = serde_json::json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
        });

        self.call::<bool>("deleteMessage", params).await?;
        Ok(())
    }

    async fn member_status(
        &self,
        channel: &str,
        user_id: i64,
    ) -> Result<MembershipStatus, ChannelError> {
        let params = serde_json::json!({
            "chat_id": channel,
            "user_id": user_id,
        });

        let member: TelegramChatMember = self.call("getChatMember", params).await?;
        Ok(Self::parse_member_status(&member.status))
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), ChannelError> {
        let mut params = serde_json::json!({
            "callback_query_id": callback_id,
            "show_alert": alert,
        });
        if let Some(text) = text {
            params["text"] = serde_json::Value::String(text.to_string());
        }

        self.call::<bool>("answerCallbackQuery", params).await?;
        Ok(())
    }

    async fn own_username(&self) -> Result<String, ChannelError> {
        let me: TelegramUser = self.call("getMe", serde_json::json!({})).await?;
        me.username
            .ok_or_else(|| ChannelError::Api("bot has no username".to_string()))
    }

    async fn set_description(&self, description: &str) -> Result<(), ChannelError> {
        let params = serde_json::json!({ "description": description });
        self.call::<bool>("setMyDescription", params).await?;
        Ok(())
    }

    fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundEvent> + Send>>> {
        if !self.is_configured() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            channel.polling_active.store(true, Ordering::SeqCst);
            info!("Starting Telegram polling");

            while channel.polling_active.load(Ordering::SeqCst) {
                match channel.poll_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            let Some(event) = Self::convert_update(update) else {
                                continue;
                            };
                            debug!("Received event from {}", event.sender().user_id);
                            if tx.send(event).is_err() {
                                warn!("Event receiver dropped, stopping polling");
                                channel.polling_active.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Telegram polling error: {}", e);
                        // Back off on error
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }

            info!("Telegram polling stopped");
        });

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: TelegramUser,
    message: Option<TelegramMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    is_bot: bool,
    first_name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChatMember {
    status: String,
}

#[derive(Debug, Deserialize)]
struct TelegramMessageId {
    message_id: i64,
}

// ============================================================================
// Tests
// ============================================================================
