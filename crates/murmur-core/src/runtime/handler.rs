//! Event Handler - the bot's main processing pipeline.
//!
//! Wires every component together and drives the loop: inbound event →
//! registration → admission gate → router → handler. Per-event errors are
//! logged and never take the loop down.

use anyhow::{Result, anyhow};
use futures::StreamExt;
use murmur_storage::{BotConfig, GatingTarget, Storage, TargetKind, UserStorage};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::admin::AdminOps;
use crate::channel::{
    ActionRef, CallbackEvent, InboundEvent, IncomingMessage, InlineButton, Messenger,
    OutboundMessage,
};
use crate::error::MurmurError;
use crate::gate::{Admission, AdmissionGate, GateTrigger};
use crate::pseudonym::PseudonymService;
use crate::relay::RelayEngine;
use crate::session::{Flow, SessionStore};

use super::menus::{self, MenuAction};
use super::router::{EventRouter, RouteDecision};

const WELCOME: &str = "👋 Welcome! Share your anonymous link and people can \
message you without learning who they are talking to.";
const GATE_PROMPT: &str = "🔒 To use this bot, please join the required channels first:";
const GATE_CONFIRM_LABEL: &str = "✅ I've joined";
const GATE_PASSED_POPUP: &str = "✅ Thanks, you're in!";
const GATE_STILL_BLOCKED_POPUP: &str = "❌ You haven't joined all required channels yet.";
const INVALID_LINK: &str = "⚠️ This link is invalid or expired.";
const FALLBACK_HINT: &str = "Use the menu below to get started.";
const CANCELLED: &str = "Cancelled.";

pub const PROMPT_MESSAGE_BODY: &str =
    "✍️ Send the message you want delivered anonymously. Text, photos, and \
files all work.";
pub(super) const PROMPT_RECIPIENT: &str =
    "📨 Who do you want to message? Send their @username.";
pub(super) const PROMPT_CONTACT_ADMIN: &str =
    "📞 Send the message you want forwarded to the administrator.";
pub(super) const PROMPT_REPLY_BODY: &str = "✍️ Send your reply.";
pub(super) const PROMPT_BROADCAST_BODY: &str =
    "📢 Send the message to broadcast to every user.";
pub(super) const PROMPT_TARGET_CHANNEL: &str =
    "➕ Send the channel handle, starting with @ (the bot must be an \
administrator there to verify memberships).";
pub(super) const PROMPT_TARGET_LINK: &str = "🔗 Send the link users must visit.";
pub(super) const PROMPT_TARGET_LABEL: &str =
    "🏷️ Now send the button label users will see.";
pub(super) const PROMPT_TARGET_REMOVAL: &str =
    "➖ Send the exact target identifier to remove.";

/// The assembled bot.
pub struct Bot {
    pub(super) messenger: Arc<dyn Messenger>,
    pub(super) users: Arc<UserStorage>,
    pub(super) sessions: Arc<SessionStore>,
    pub(super) router: EventRouter,
    pub(super) gate: AdmissionGate,
    pub(super) relay: RelayEngine,
    pub(super) admin: AdminOps,
    pub(super) pseudonyms: PseudonymService,
    pub(super) admin_user_id: i64,
}

impl Bot {
    pub fn new(storage: &Storage, messenger: Arc<dyn Messenger>, config: &BotConfig) -> Self {
        let users = Arc::new(storage.users.clone());
        let records = Arc::new(storage.relay_records.clone());
        let targets = Arc::new(storage.gating_targets.clone());
        let sessions = Arc::new(SessionStore::new());
        let pseudonyms = PseudonymService::new(config.hash_salt.clone(), users.clone());

        Self {
            router: EventRouter::new(sessions.clone()),
            gate: AdmissionGate::new(targets.clone(), messenger.clone(), config.admin_user_id),
            relay: RelayEngine::new(
                users.clone(),
                records.clone(),
                pseudonyms.clone(),
                messenger.clone(),
            ),
            admin: AdminOps::new(users.clone(), records, targets, messenger.clone()),
            messenger,
            users,
            sessions,
            pseudonyms,
            admin_user_id: config.admin_user_id,
        }
    }

    /// Consume the channel's event stream until it ends.
    pub async fn run(&self) -> Result<()> {
        let mut stream = self
            .messenger
            .start_receiving()
            .ok_or_else(|| anyhow!("messaging channel cannot receive events"))?;

        info!("Relay bot is running");
        while let Some(event) = stream.next().await {
            let user_id = event.sender().user_id;
            if let Err(e) = self.handle_event(event).await {
                error!("Error handling event from {}: {}", user_id, e);
            }
        }
        Ok(())
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Message(message) => self.handle_message(message).await,
            InboundEvent::Callback(callback) => self.handle_callback(callback).await,
        }
    }

    async fn handle_message(&self, message: IncomingMessage) -> Result<()> {
        let user_id = message.sender.user_id;
        self.register(&message)?;

        if let Admission::Blocked(targets) = self.gate.check(user_id, GateTrigger::Event).await? {
            self.present_gate_prompt(user_id, &targets).await?;
            return Ok(());
        }

        match self.router.route_message(&message) {
            RouteDecision::HandleCommand { command, args } => {
                self.handle_command(&command, &args, &message).await
            }
            RouteDecision::ContinueFlow(flow) => self.continue_flow(flow, &message).await,
            RouteDecision::Menu(action) => self.handle_menu(action, &message).await,
            RouteDecision::Fallback => {
                self.send_with_menu(user_id, FALLBACK_HINT).await?;
                Ok(())
            }
            // Callback decisions never come out of route_message.
            RouteDecision::Callback(_) | RouteDecision::Ignore => Ok(()),
        }
    }

    async fn handle_callback(&self, callback: CallbackEvent) -> Result<()> {
        let user_id = callback.sender.user_id;

        let RouteDecision::Callback(action) = self.router.route_callback(&callback) else {
            // Malformed payload: just stop the client spinner.
            self.messenger
                .answer_callback(&callback.callback_id, None, false)
                .await?;
            return Ok(());
        };

        match action {
            ActionRef::Reply { record_id } => {
                // A stale button press from a user who has since left the
                // required channels must not stage a flow.
                if let Admission::Blocked(_) =
                    self.gate.check(user_id, GateTrigger::Event).await?
                {
                    self.messenger
                        .answer_callback(
                            &callback.callback_id,
                            Some(GATE_STILL_BLOCKED_POPUP),
                            true,
                        )
                        .await?;
                    return Ok(());
                }
                self.sessions.begin(user_id, Flow::AwaitingReplyBody { record_id });
                self.messenger
                    .answer_callback(&callback.callback_id, None, false)
                    .await?;
                self.send_prompt(user_id, PROMPT_REPLY_BODY).await?;
            }
            ActionRef::AdminReply { user_id: target } => {
                if user_id != self.admin_user_id {
                    self.messenger
                        .answer_callback(&callback.callback_id, None, false)
                        .await?;
                    return Ok(());
                }
                self.sessions
                    .begin(user_id, Flow::AwaitingAdminReplyBody { user_id: target });
                self.messenger
                    .answer_callback(&callback.callback_id, None, false)
                    .await?;
                self.send_prompt(user_id, PROMPT_REPLY_BODY).await?;
            }
            ActionRef::ConfirmJoin => {
                match self.gate.check(user_id, GateTrigger::Acknowledgment).await? {
                    Admission::Pass => {
                        if let Some(prompt) = &callback.message
                            && let Err(e) = self.messenger.delete_message(prompt).await
                        {
                            warn!("Could not delete gate prompt: {}", e);
                        }
                        self.messenger
                            .answer_callback(&callback.callback_id, Some(GATE_PASSED_POPUP), false)
                            .await?;
                        self.send_with_menu(user_id, WELCOME).await?;
                    }
                    Admission::Blocked(_) => {
                        self.messenger
                            .answer_callback(
                                &callback.callback_id,
                                Some(GATE_STILL_BLOCKED_POPUP),
                                true,
                            )
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Register the sender on first contact. The pseudonym is derived once
    /// and never changes.
    fn register(&self, message: &IncomingMessage) -> Result<()> {
        let user_id = message.sender.user_id;
        let pseudonym = self.pseudonyms.derive(user_id);
        if self
            .users
            .upsert_user(&pseudonym, user_id, message.sender.username.as_deref())?
        {
            info!("New user registered as {}", pseudonym);
        }
        Ok(())
    }

    async fn handle_command(
        &self,
        command: &str,
        args: &[String],
        message: &IncomingMessage,
    ) -> Result<()> {
        let user_id = message.sender.user_id;
        match command {
            "start" => {
                self.sessions.clear(user_id);
                if let Some(param) = args.first() {
                    return self.handle_deep_link(user_id, param).await;
                }
                self.send_with_menu(user_id, WELCOME).await?;
            }
            "cancel" => {
                self.sessions.clear(user_id);
                self.send_with_menu(user_id, CANCELLED).await?;
            }
            "admin" => {
                // Silently ignored for everyone else.
                if user_id == self.admin_user_id {
                    self.send_with_menu(user_id, "🛠 Administrator panel").await?;
                }
            }
            _ => {
                self.send_with_menu(user_id, FALLBACK_HINT).await?;
            }
        }
        Ok(())
    }

    /// A /start carrying a pseudonym: someone followed an anonymous link.
    async fn handle_deep_link(&self, user_id: i64, param: &str) -> Result<()> {
        if !PseudonymService::looks_like_pseudonym(param) {
            self.send_with_menu(user_id, INVALID_LINK).await?;
            return Ok(());
        }

        match self.pseudonyms.resolve(param) {
            Ok(recipient_id) if recipient_id == user_id => {
                self.send_with_menu(user_id, "⚠️ This is your own link.").await?;
            }
            Ok(recipient_id) => {
                self.sessions
                    .begin(user_id, Flow::AwaitingMessageBody { recipient_id });
                self.send_prompt(user_id, PROMPT_MESSAGE_BODY).await?;
            }
            Err(MurmurError::UnknownPseudonym(_)) => {
                self.send_with_menu(user_id, INVALID_LINK).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn handle_menu(&self, action: MenuAction, message: &IncomingMessage) -> Result<()> {
        let user_id = message.sender.user_id;
        if action.requires_admin() && user_id != self.admin_user_id {
            // Only the admin keyboard shows these; anyone typing the labels
            // by hand gets nothing.
            return Ok(());
        }

        match action {
            MenuAction::MyLink => {
                let username = self.messenger.own_username().await?;
                let pseudonym = self.pseudonyms.derive(user_id);
                let text = format!(
                    "🔗 Your anonymous link:\nhttps://t.me/{username}?start={pseudonym}\n\n\
                     Anyone who opens it can message you without seeing who you are."
                );
                self.messenger.send_text(user_id, &text).await?;
            }
            MenuAction::ContactAdmin => {
                self.sessions.begin(user_id, Flow::AwaitingAdminContactBody);
                self.send_prompt(user_id, PROMPT_CONTACT_ADMIN).await?;
            }
            MenuAction::SendToUser => {
                self.sessions.begin(user_id, Flow::AwaitingRecipient);
                self.send_prompt(user_id, PROMPT_RECIPIENT).await?;
            }
            MenuAction::Broadcast => {
                self.sessions.begin(user_id, Flow::AwaitingBroadcastBody);
                self.send_prompt(user_id, PROMPT_BROADCAST_BODY).await?;
            }
            MenuAction::UserList => {
                let listing = self.admin.list_users()?;
                self.messenger
                    .send_text(user_id, &format_user_listing(&listing))
                    .await?;
            }
            MenuAction::Stats => {
                let stats = self.admin.stats()?;
                self.messenger.send_text(user_id, &format_stats(&stats)).await?;
            }
            MenuAction::GateSettings => {
                self.messenger
                    .send(
                        OutboundMessage::new(user_id, "🔒 Gating settings")
                            .with_reply_keyboard(menus::gating_menu()),
                    )
                    .await?;
            }
            MenuAction::GateAddChannel => {
                self.sessions.begin(
                    user_id,
                    Flow::AwaitingTargetValue {
                        kind: TargetKind::Channel,
                    },
                );
                self.send_prompt(user_id, PROMPT_TARGET_CHANNEL).await?;
            }
            MenuAction::GateAddLink => {
                self.sessions.begin(
                    user_id,
                    Flow::AwaitingTargetValue {
                        kind: TargetKind::Link,
                    },
                );
                self.send_prompt(user_id, PROMPT_TARGET_LINK).await?;
            }
            MenuAction::GateRemove => {
                self.sessions.begin(user_id, Flow::AwaitingTargetRemoval);
                let targets = self.admin.list_gating_targets()?;
                let text = format!(
                    "{}\n\n{}",
                    format_target_list(&targets),
                    PROMPT_TARGET_REMOVAL
                );
                self.send_prompt(user_id, &text).await?;
            }
            MenuAction::GateList => {
                let targets = self.admin.list_gating_targets()?;
                self.messenger
                    .send_text(user_id, &format_target_list(&targets))
                    .await?;
            }
            MenuAction::GateBack => {
                self.send_with_menu(user_id, "🛠 Administrator panel").await?;
            }
        }
        Ok(())
    }

    async fn present_gate_prompt(&self, user_id: i64, targets: &[GatingTarget]) -> Result<()> {
        let mut buttons: Vec<Vec<InlineButton>> = targets
            .iter()
            .map(|target| vec![InlineButton::url(&target.label, target_url(target))])
            .collect();
        buttons.push(vec![InlineButton::callback(
            GATE_CONFIRM_LABEL,
            ActionRef::ConfirmJoin.encode(),
        )]);

        self.messenger
            .send(OutboundMessage::new(user_id, GATE_PROMPT).with_inline_keyboard(buttons))
            .await?;
        Ok(())
    }

    /// Send a flow-entry prompt. The persistent menu is removed so a stray
    /// button press cannot end up as the flow's body text.
    pub(super) async fn send_prompt(&self, user_id: i64, text: &str) -> Result<()> {
        self.messenger
            .send(OutboundMessage::new(user_id, text).with_keyboard_removed())
            .await?;
        Ok(())
    }

    pub(super) async fn send_with_menu(&self, user_id: i64, text: &str) -> Result<()> {
        let keyboard = menus::menu_for(user_id == self.admin_user_id);
        self.messenger
            .send(OutboundMessage::new(user_id, text).with_reply_keyboard(keyboard))
            .await?;
        Ok(())
    }
}

/// URL a gating target's button opens.
fn target_url(target: &GatingTarget) -> String {
    match target.kind {
        TargetKind::Channel => {
            let handle = target.target.trim_start_matches('@');
            format!("https://t.me/{handle}")
        }
        TargetKind::Link => target.target.clone(),
    }
}

fn format_user_listing(listing: &crate::admin::UserListing) -> String {
    let mut lines = vec![format!("👥 {} users total", listing.total)];
    for user in &listing.users {
        let name = user.display_name.as_deref().unwrap_or("(no username)");
        lines.push(format!(
            "• {} — {} — joined {}",
            user.user_id,
            name,
            user.registered_at.format("%Y-%m-%d")
        ));
    }
    if listing.total > listing.users.len() {
        lines.push(format!("… and {} more", listing.total - listing.users.len()));
    }
    lines.join("\n")
}

fn format_stats(stats: &crate::admin::ActivityStats) -> String {
    format!(
        "📊 Activity\n\n\
         Users: {}\n\
         Relayed messages: {}\n\n\
         New users:\n\
         • today: {}\n\
         • this week: {}\n\
         • this month: {}\n\
         • this year: {}",
        stats.total_users,
        stats.total_relayed_messages,
        stats.new_today,
        stats.new_this_week,
        stats.new_this_month,
        stats.new_this_year,
    )
}

fn format_target_list(targets: &[GatingTarget]) -> String {
    if targets.is_empty() {
        return "📋 No gating targets configured.".to_string();
    }
    let mut lines = vec!["📋 Gating targets:".to_string()];
    for target in targets {
        let kind = match target.kind {
            TargetKind::Channel => "channel",
            TargetKind::Link => "link",
        };
        lines.push(format!("• {} ({}) — \"{}\"", target.target, kind, target.label));
    }
    lines.join("\n")
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::channel::mock::MockMessenger;
    use crate::channel::{ButtonAction, MembershipStatus, SenderInfo};
    use tempfile::tempdir;

    pub(in crate::runtime) const ADMIN: i64 = 1000;

    pub(in crate::runtime) struct Fixture {
        pub _dir: tempfile::TempDir,
        pub messenger: Arc<MockMessenger>,
        pub bot: Bot,
    }

    pub(in crate::runtime) fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("test.db")).unwrap();
        let messenger = Arc::new(MockMessenger::new());
        let config = BotConfig {
            bot_token: "123:ABC".to_string(),
            admin_user_id: ADMIN,
            hash_salt: "a-salt-long-enough-to-be-plausible".to_string(),
        };
        let bot = Bot::new(&storage, messenger.clone(), &config);
        Fixture {
            _dir: dir,
            messenger,
            bot,
        }
    }

    pub(in crate::runtime) fn text_message(user_id: i64, text: &str) -> InboundEvent {
        InboundEvent::Message(IncomingMessage {
            message_id: 1,
            chat_id: user_id,
            sender: SenderInfo {
                user_id,
                username: Some(format!("user{user_id}")),
                first_name: None,
            },
            text: Some(text.to_string()),
        })
    }

    pub(in crate::runtime) fn media_message(user_id: i64, message_id: i64) -> InboundEvent {
        InboundEvent::Message(IncomingMessage {
            message_id,
            chat_id: user_id,
            sender: SenderInfo {
                user_id,
                username: Some(format!("user{user_id}")),
                first_name: None,
            },
            text: None,
        })
    }

    pub(in crate::runtime) fn callback(user_id: i64, data: &str) -> InboundEvent {
        InboundEvent::Callback(CallbackEvent {
            callback_id: "cb-1".to_string(),
            sender: SenderInfo {
                user_id,
                username: None,
                first_name: None,
            },
            message: Some(crate::channel::MessageRef::new(user_id, 500)),
            data: data.to_string(),
        })
    }

    #[tokio::test]
    async fn test_start_registers_and_greets() {
        let f = fixture();

        f.bot.handle_event(text_message(1, "/start")).await.unwrap();

        assert_eq!(f.bot.users.count_users(None).unwrap(), 1);
        let sent = f.messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Welcome"));
        assert!(sent[0].reply_keyboard.is_some());
    }

    #[tokio::test]
    async fn test_deep_link_starts_message_flow() {
        let f = fixture();
        // Bob registers first so his pseudonym resolves.
        f.bot.handle_event(text_message(2, "/start")).await.unwrap();
        let bob_link = f.bot.pseudonyms.derive(2);

        f.bot
            .handle_event(text_message(1, &format!("/start {bob_link}")))
            .await
            .unwrap();

        assert_eq!(
            f.bot.sessions.current(1),
            Some(Flow::AwaitingMessageBody { recipient_id: 2 })
        );

        // The next message is relayed to Bob as an anonymous copy.
        f.bot.handle_event(media_message(1, 77)).await.unwrap();
        assert_eq!(f.bot.sessions.current(1), None);
        assert_eq!(f.messenger.copies.lock().unwrap().as_slice(), &[(2, 1, 77)]);
    }

    #[tokio::test]
    async fn test_own_link_is_rejected() {
        let f = fixture();
        f.bot.handle_event(text_message(1, "/start")).await.unwrap();
        let own = f.bot.pseudonyms.derive(1);

        f.bot
            .handle_event(text_message(1, &format!("/start {own}")))
            .await
            .unwrap();

        assert_eq!(f.bot.sessions.current(1), None);
        assert!(f.messenger.sent_texts().last().unwrap().contains("your own link"));
    }

    #[tokio::test]
    async fn test_stale_deep_link_rejected() {
        let f = fixture();

        f.bot
            .handle_event(text_message(1, "/start abcdefabcdef"))
            .await
            .unwrap();

        assert_eq!(f.bot.sessions.current(1), None);
        assert!(f.messenger.sent_texts()[0].contains("invalid or expired"));
    }

    #[tokio::test]
    async fn test_gate_blocks_before_anything_else() {
        let f = fixture();
        f.bot
            .admin
            .add_gating_target("@chan", TargetKind::Channel, "Join us")
            .unwrap();

        f.bot.handle_event(text_message(1, "/start")).await.unwrap();

        // The user is registered but only saw the gate prompt.
        assert_eq!(f.bot.users.count_users(None).unwrap(), 1);
        let sent = f.messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("join the required channels"));
        let buttons = sent[0].inline_keyboard.as_ref().unwrap();
        assert_eq!(
            buttons[0][0].action,
            ButtonAction::Url("https://t.me/chan".to_string())
        );
        assert_eq!(
            buttons[1][0].action,
            ButtonAction::Callback(ActionRef::ConfirmJoin.encode())
        );
    }

    #[tokio::test]
    async fn test_gate_does_not_apply_to_admin() {
        let f = fixture();
        f.bot
            .admin
            .add_gating_target("@chan", TargetKind::Channel, "Join us")
            .unwrap();

        f.bot.handle_event(text_message(ADMIN, "/start")).await.unwrap();

        assert!(f.messenger.sent_texts()[0].contains("Welcome"));
    }

    #[tokio::test]
    async fn test_confirm_join_deletes_prompt_and_welcomes() {
        let f = fixture();
        f.bot
            .admin
            .add_gating_target("@chan", TargetKind::Channel, "Join us")
            .unwrap();
        f.messenger.set_membership("@chan", 1, MembershipStatus::Member);

        f.bot.handle_event(callback(1, "confirm-join")).await.unwrap();

        assert_eq!(f.messenger.deleted.lock().unwrap().len(), 1);
        let answered = f.messenger.answered.lock().unwrap();
        assert_eq!(answered[0].text.as_deref(), Some(GATE_PASSED_POPUP));
        assert!(f.messenger.sent_texts()[0].contains("Welcome"));
    }

    #[tokio::test]
    async fn test_confirm_join_still_blocked_alerts() {
        let f = fixture();
        f.bot
            .admin
            .add_gating_target("@chan", TargetKind::Channel, "Join us")
            .unwrap();

        f.bot.handle_event(callback(1, "confirm-join")).await.unwrap();

        let answered = f.messenger.answered.lock().unwrap();
        assert_eq!(answered[0].text.as_deref(), Some(GATE_STILL_BLOCKED_POPUP));
        assert!(answered[0].alert);
        assert!(f.messenger.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_clears_any_flow() {
        let f = fixture();
        f.bot.sessions.begin(1, Flow::AwaitingBroadcastBody);

        f.bot.handle_event(text_message(1, "/cancel")).await.unwrap();

        assert_eq!(f.bot.sessions.current(1), None);
        assert!(f.messenger.sent_texts()[0].contains("Cancelled"));
    }

    #[tokio::test]
    async fn test_admin_menu_labels_ignored_for_regular_users() {
        let f = fixture();

        f.bot
            .handle_event(text_message(1, menus::BTN_BROADCAST))
            .await
            .unwrap();

        assert_eq!(f.bot.sessions.current(1), None);
        assert!(f.messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_my_link_contains_pseudonym() {
        let f = fixture();

        f.bot
            .handle_event(text_message(1, menus::BTN_MY_LINK))
            .await
            .unwrap();

        let pseudonym = f.bot.pseudonyms.derive(1);
        let text = f.messenger.sent_texts().pop().unwrap();
        assert!(text.contains(&format!("https://t.me/murmur_bot?start={pseudonym}")));
    }

    #[tokio::test]
    async fn test_malformed_callback_only_answered() {
        let f = fixture();

        f.bot.handle_event(callback(1, "reply:garbage")).await.unwrap();

        assert_eq!(f.messenger.answered.lock().unwrap().len(), 1);
        assert!(f.messenger.sent.lock().unwrap().is_empty());
        assert_eq!(f.bot.sessions.current(1), None);
    }

    #[tokio::test]
    async fn test_admin_reply_action_restricted() {
        let f = fixture();

        f.bot.handle_event(callback(1, "admin-reply:5")).await.unwrap();
        assert_eq!(f.bot.sessions.current(1), None);

        f.bot.handle_event(callback(ADMIN, "admin-reply:5")).await.unwrap();
        assert_eq!(
            f.bot.sessions.current(ADMIN),
            Some(Flow::AwaitingAdminReplyBody { user_id: 5 })
        );
    }

    #[tokio::test]
    async fn test_flow_entry_prompts_remove_menu_keyboard() {
        let f = fixture();
        f.bot.handle_event(text_message(2, "/start")).await.unwrap();
        let bob_link = f.bot.pseudonyms.derive(2);

        // Deep-link entry into the message-body flow.
        f.bot
            .handle_event(text_message(1, &format!("/start {bob_link}")))
            .await
            .unwrap();
        // Menu entry into the recipient flow.
        f.bot
            .handle_event(text_message(3, menus::BTN_SEND_TO_USER))
            .await
            .unwrap();

        let sent = f.messenger.sent.lock().unwrap();
        for prompt in sent.iter().skip(1) {
            assert!(prompt.remove_keyboard, "prompt kept the menu: {:?}", prompt.text);
            assert!(prompt.reply_keyboard.is_none());
        }
    }

    #[tokio::test]
    async fn test_menu_press_mid_flow_is_not_relayed_as_body() {
        let f = fixture();
        f.bot.handle_event(text_message(2, "/start")).await.unwrap();
        let bob_link = f.bot.pseudonyms.derive(2);
        f.bot
            .handle_event(text_message(1, &format!("/start {bob_link}")))
            .await
            .unwrap();

        // A button press from a stale keyboard arrives as its label text;
        // it switches flows instead of becoming the anonymous message.
        f.bot
            .handle_event(text_message(1, menus::BTN_CONTACT_ADMIN))
            .await
            .unwrap();

        assert!(f.messenger.copies.lock().unwrap().is_empty());
        assert_eq!(f.bot.sessions.current(1), Some(Flow::AwaitingAdminContactBody));
    }

    #[tokio::test]
    async fn test_blocked_user_reply_callback_gets_alert() {
        let f = fixture();
        f.bot
            .admin
            .add_gating_target("@chan", TargetKind::Channel, "Join us")
            .unwrap();

        f.bot.handle_event(callback(1, "reply:1")).await.unwrap();

        assert_eq!(f.bot.sessions.current(1), None);
        let answered = f.messenger.answered.lock().unwrap();
        assert_eq!(answered[0].text.as_deref(), Some(GATE_STILL_BLOCKED_POPUP));
        assert!(answered[0].alert);
        assert!(f.messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_listing_shows_numeric_ids() {
        let f = fixture();
        f.bot.handle_event(text_message(7, "/start")).await.unwrap();

        f.bot
            .handle_event(text_message(ADMIN, menus::BTN_USER_LIST))
            .await
            .unwrap();

        let listing = f.messenger.sent_texts().pop().unwrap();
        assert!(listing.contains("• 7 — user7"), "listing was: {listing}");
    }
}
