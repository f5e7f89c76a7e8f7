//! Structured action references.
//!
//! Inline buttons carry an opaque payload that comes back verbatim when
//! pressed. These payloads are encoded and decoded through a typed
//! [`ActionRef`] with validation, failing closed on anything malformed
//! instead of indexing into split fragments.

/// A typed reference embedded in a callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRef {
    /// Reply anonymously to the relay identified by this record.
    Reply { record_id: u64 },
    /// Administrator replying directly to a user who contacted them.
    AdminReply { user_id: i64 },
    /// User acknowledges having satisfied the gating targets.
    ConfirmJoin,
}

const REPLY_PREFIX: &str = "reply";
const ADMIN_REPLY_PREFIX: &str = "admin-reply";
const CONFIRM_JOIN: &str = "confirm-join";

impl ActionRef {
    pub fn encode(&self) -> String {
        match self {
            Self::Reply { record_id } => format!("{REPLY_PREFIX}:{record_id}"),
            Self::AdminReply { user_id } => format!("{ADMIN_REPLY_PREFIX}:{user_id}"),
            Self::ConfirmJoin => CONFIRM_JOIN.to_string(),
        }
    }

    /// Decode a callback payload. Returns None for anything that is not a
    /// well-formed action reference.
    pub fn decode(data: &str) -> Option<Self> {
        if data == CONFIRM_JOIN {
            return Some(Self::ConfirmJoin);
        }

        let (prefix, value) = data.split_once(':')?;
        match prefix {
            REPLY_PREFIX => value.parse().ok().map(|record_id| Self::Reply { record_id }),
            ADMIN_REPLY_PREFIX => {
                let user_id: i64 = value.parse().ok()?;
                (user_id > 0).then_some(Self::AdminReply { user_id })
            }
            _ => None,
        }
    }
}
