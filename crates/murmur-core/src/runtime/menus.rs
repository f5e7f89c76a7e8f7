//! Menu Layout
//!
//! Persistent reply-keyboard labels and their mapping back to actions.
//! Labels double as the routing key for button presses, so every label in
//! a keyboard must map to exactly one [`MenuAction`].

pub const BTN_MY_LINK: &str = "🔗 My anonymous link";
pub const BTN_CONTACT_ADMIN: &str = "📞 Contact admin";
pub const BTN_SEND_TO_USER: &str = "📨 Message a user";

pub const BTN_BROADCAST: &str = "📢 Broadcast";
pub const BTN_USER_LIST: &str = "👥 User list";
pub const BTN_STATS: &str = "📊 Activity stats";
pub const BTN_GATE_SETTINGS: &str = "🔒 Gating settings";

pub const BTN_GATE_ADD_CHANNEL: &str = "➕ Add channel";
pub const BTN_GATE_ADD_LINK: &str = "🔗 Add link";
pub const BTN_GATE_REMOVE: &str = "➖ Remove target";
pub const BTN_GATE_LIST: &str = "📋 List targets";
pub const BTN_GATE_BACK: &str = "⬅️ Back to panel";

/// A pressed menu button, resolved from its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    MyLink,
    ContactAdmin,
    SendToUser,
    Broadcast,
    UserList,
    Stats,
    GateSettings,
    GateAddChannel,
    GateAddLink,
    GateRemove,
    GateList,
    GateBack,
}

impl MenuAction {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            BTN_MY_LINK => Some(Self::MyLink),
            BTN_CONTACT_ADMIN => Some(Self::ContactAdmin),
            BTN_SEND_TO_USER => Some(Self::SendToUser),
            BTN_BROADCAST => Some(Self::Broadcast),
            BTN_USER_LIST => Some(Self::UserList),
            BTN_STATS => Some(Self::Stats),
            BTN_GATE_SETTINGS => Some(Self::GateSettings),
            BTN_GATE_ADD_CHANNEL => Some(Self::GateAddChannel),
            BTN_GATE_ADD_LINK => Some(Self::GateAddLink),
            BTN_GATE_REMOVE => Some(Self::GateRemove),
            BTN_GATE_LIST => Some(Self::GateList),
            BTN_GATE_BACK => Some(Self::GateBack),
            _ => None,
        }
    }

    /// Actions only the administrator may trigger.
    pub fn requires_admin(&self) -> bool {
        !matches!(self, Self::MyLink | Self::ContactAdmin | Self::SendToUser)
    }
}

fn rows(labels: &[&[&str]]) -> Vec<Vec<String>> {
    labels
        .iter()
        .map(|row| row.iter().map(|label| label.to_string()).collect())
        .collect()
}

/// Menu shown to regular users.
pub fn main_menu() -> Vec<Vec<String>> {
    rows(&[&[BTN_MY_LINK, BTN_CONTACT_ADMIN], &[BTN_SEND_TO_USER]])
}

/// Menu shown to the administrator: the regular rows plus the panel.
pub fn admin_menu() -> Vec<Vec<String>> {
    rows(&[
        &[BTN_MY_LINK, BTN_SEND_TO_USER],
        &[BTN_BROADCAST, BTN_USER_LIST],
        &[BTN_STATS, BTN_GATE_SETTINGS],
    ])
}

/// Sub-menu for gating-target management.
pub fn gating_menu() -> Vec<Vec<String>> {
    rows(&[
        &[BTN_GATE_ADD_CHANNEL, BTN_GATE_ADD_LINK],
        &[BTN_GATE_REMOVE, BTN_GATE_LIST],
        &[BTN_GATE_BACK],
    ])
}

pub fn menu_for(is_admin: bool) -> Vec<Vec<String>> {
    if is_admin { admin_menu() } else { main_menu() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keyboard_label_routes() {
        for keyboard in [main_menu(), admin_menu(), gating_menu()] {
            for label in keyboard.iter().flatten() {
                assert!(
                    MenuAction::from_label(label).is_some(),
                    "label {label:?} has no action"
                );
            }
        }
    }

    #[test]
    fn test_unknown_label_does_not_route() {
        assert_eq!(MenuAction::from_label("free text"), None);
        assert_eq!(MenuAction::from_label(""), None);
    }

    #[test]
    fn test_admin_gating() {
        assert!(!MenuAction::MyLink.requires_admin());
        assert!(!MenuAction::ContactAdmin.requires_admin());
        assert!(!MenuAction::SendToUser.requires_admin());
        assert!(MenuAction::Broadcast.requires_admin());
        assert!(MenuAction::GateAddLink.requires_admin());
    }
}
