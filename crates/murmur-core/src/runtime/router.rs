//! Event Router - Routes inbound events to appropriate handlers.
//!
//! The router determines how to handle each inbound event based on the
//! sender's active flow and the event content. It never executes anything
//! itself; it only classifies.

use std::sync::Arc;

use crate::channel::{ActionRef, CallbackEvent, IncomingMessage};
use crate::session::{Flow, SessionStore};

use super::menus::MenuAction;

/// Routing decision for an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Handle as a command (e.g., /start, /cancel).
    HandleCommand { command: String, args: Vec<String> },
    /// Feed the event into the sender's active flow.
    ContinueFlow(Flow),
    /// A menu button press.
    Menu(MenuAction),
    /// A decoded inline-button action.
    Callback(ActionRef),
    /// Ignore the event (malformed callback payload).
    Ignore,
    /// Nothing matched; show the user their menu.
    Fallback,
}

/// Classifies inbound events.
///
/// The router checks, in order:
/// 1. Is the message a command? → Handle as command (commands preempt any
///    active flow, so /cancel works mid-flow)
/// 2. Is the text a known menu label? → Menu action. Labels preempt flows
///    so a button press never ends up as a flow's body text.
/// 3. Does the sender have an active flow? → Continue it
/// 4. Otherwise → Fallback
pub struct EventRouter {
    sessions: Arc<SessionStore>,
}

impl EventRouter {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }

    pub fn route_message(&self, message: &IncomingMessage) -> RouteDecision {
        if let Some(text) = &message.text
            && let Some((command, args)) = Self::parse_command(text)
        {
            return RouteDecision::HandleCommand { command, args };
        }

        if let Some(text) = &message.text
            && let Some(action) = MenuAction::from_label(text.trim())
        {
            return RouteDecision::Menu(action);
        }

        // Media messages have no text but are valid flow bodies.
        if let Some(flow) = self.sessions.current(message.sender.user_id) {
            return RouteDecision::ContinueFlow(flow);
        }

        RouteDecision::Fallback
    }

    pub fn route_callback(&self, callback: &CallbackEvent) -> RouteDecision {
        match ActionRef::decode(&callback.data) {
            Some(action) => RouteDecision::Callback(action),
            None => RouteDecision::Ignore,
        }
    }

    fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let command = parts.next()?;
        // Commands can carry a bot suffix: /start@murmur_bot
        let command = command.split('@').next().unwrap_or(command);
        if command.is_empty() {
            return None;
        }
        let args = parts.map(|s| s.to_string()).collect();
        Some((command.to_lowercase(), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SenderInfo;

    fn router() -> (Arc<SessionStore>, EventRouter) {
        let sessions = Arc::new(SessionStore::new());
        let router = EventRouter::new(sessions.clone());
        (sessions, router)
    }

    fn message(user_id: i64, text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            message_id: 1,
            chat_id: user_id,
            sender: SenderInfo {
                user_id,
                username: None,
                first_name: None,
            },
            text: text.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_command_parsing() {
        let (_sessions, router) = router();

        let decision = router.route_message(&message(1, Some("/start abc123def456")));
        assert_eq!(
            decision,
            RouteDecision::HandleCommand {
                command: "start".to_string(),
                args: vec!["abc123def456".to_string()],
            }
        );

        let decision = router.route_message(&message(1, Some("/cancel@murmur_bot")));
        assert_eq!(
            decision,
            RouteDecision::HandleCommand {
                command: "cancel".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_command_preempts_active_flow() {
        let (sessions, router) = router();
        sessions.begin(1, Flow::AwaitingBroadcastBody);

        let decision = router.route_message(&message(1, Some("/cancel")));
        assert!(matches!(decision, RouteDecision::HandleCommand { .. }));
    }

    #[test]
    fn test_menu_label_preempts_flow() {
        let (sessions, router) = router();
        sessions.begin(1, Flow::AwaitingMessageBody { recipient_id: 2 });

        let decision = router.route_message(&message(
            1,
            Some(super::super::menus::BTN_CONTACT_ADMIN),
        ));
        assert_eq!(decision, RouteDecision::Menu(MenuAction::ContactAdmin));
    }

    #[test]
    fn test_active_flow_consumes_media() {
        let (sessions, router) = router();
        sessions.begin(1, Flow::AwaitingBroadcastBody);

        // No text at all: still routed into the flow.
        let decision = router.route_message(&message(1, None));
        assert_eq!(
            decision,
            RouteDecision::ContinueFlow(Flow::AwaitingBroadcastBody)
        );
    }

    #[test]
    fn test_menu_label_routes_when_idle() {
        let (_sessions, router) = router();

        let decision = router.route_message(&message(1, Some(super::super::menus::BTN_MY_LINK)));
        assert_eq!(decision, RouteDecision::Menu(MenuAction::MyLink));

        let decision = router.route_message(&message(1, Some("anything else")));
        assert_eq!(decision, RouteDecision::Fallback);
    }

    #[test]
    fn test_callback_decoding_fails_closed() {
        let (_sessions, router) = router();

        let callback = CallbackEvent {
            callback_id: "cb".to_string(),
            sender: SenderInfo {
                user_id: 1,
                username: None,
                first_name: None,
            },
            message: None,
            data: "reply:9".to_string(),
        };
        assert_eq!(
            router.route_callback(&callback),
            RouteDecision::Callback(ActionRef::Reply { record_id: 9 })
        );

        let garbage = CallbackEvent {
            data: "reply:not-a-number".to_string(),
            ..callback
        };
        assert_eq!(router.route_callback(&garbage), RouteDecision::Ignore);
    }
}
