//! Conversation State Machine
//!
//! Tracks, per user, which multi-step flow is in progress and the partial
//! data collected so far. Sessions are in-memory only; a restart aborts any
//! in-flight flow and the user starts over.

use dashmap::DashMap;
use murmur_storage::TargetKind;

/// An in-progress multi-step flow, with the data collected so far carried
/// in the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Waiting for the user to name who they want to message.
    AwaitingRecipient,
    /// Recipient resolved; waiting for the message to relay.
    AwaitingMessageBody { recipient_id: i64 },
    /// Waiting for a message to forward to the administrator.
    AwaitingAdminContactBody,
    /// Reply action pressed; waiting for the reply body.
    AwaitingReplyBody { record_id: u64 },
    /// Administrator replying to a user who contacted them.
    AwaitingAdminReplyBody { user_id: i64 },
    /// Administrator composing a broadcast.
    AwaitingBroadcastBody,
    /// Administrator adding a gating target; waiting for the identifier.
    AwaitingTargetValue { kind: TargetKind },
    /// Identifier collected; waiting for the button label.
    AwaitingTargetLabel { target: String, kind: TargetKind },
    /// Administrator removing a gating target; waiting for the identifier.
    AwaitingTargetRemoval,
}

/// Per-user active flow registry. One flow per user; starting a new flow
/// discards any incomplete one.
#[derive(Default)]
pub struct SessionStore {
    active: DashMap<i64, Flow>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, user_id: i64, flow: Flow) {
        self.active.insert(user_id, flow);
    }

    pub fn current(&self, user_id: i64) -> Option<Flow> {
        self.active.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Clear the user's flow unconditionally (completion or cancellation).
    pub fn clear(&self, user_id: i64) {
        self.active.remove(&user_id);
    }
}
