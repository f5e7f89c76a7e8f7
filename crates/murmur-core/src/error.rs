//! Error taxonomy for the relay bot.

use thiserror::Error;

/// Domain-level errors surfaced by the pseudonym, relay, gate, and admin
/// components.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// Pseudonym was never registered (stale or forged link).
    #[error("unknown pseudonym: {0}")]
    UnknownPseudonym(String),

    /// Relay record id does not exist (stale reply action).
    #[error("relay record {0} not found")]
    RecordNotFound(u64),

    /// Recipient is not a registered user.
    #[error("recipient not found")]
    RecipientNotFound,

    /// Gating target does not exist.
    #[error("gating target not found: {0}")]
    TargetNotFound(String),

    /// Sender and recipient are the same user.
    #[error("cannot send an anonymous message to yourself")]
    SelfTarget,

    /// The channel rejected the delivery (e.g. recipient blocked the bot).
    /// Never retried automatically; the sender is informed instead.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Unique-constraint conflict on insert; reported as "already exists".
    #[error("already exists: {0}")]
    Duplicate(String),

    /// Non-administrator invoked an administrator-only operation.
    #[error("operation restricted to the administrator")]
    PermissionDenied,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Transport-level errors from the messaging channel.
///
/// Kept separate from [`MurmurError`] so callers can distinguish a blocked
/// recipient (maps to `DeliveryFailed`, counted in broadcast tallies) from a
/// membership query the bot is not allowed to perform (the admission gate
/// fails open on those).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The recipient is unreachable: blocked the bot, deactivated, etc.
    #[error("recipient unreachable: {0}")]
    Forbidden(String),

    /// The API rejected the request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any other API-level failure.
    #[error("channel API error: {0}")]
    Api(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ChannelError {
    /// Map a delivery failure into the domain taxonomy.
    pub fn into_delivery_failure(self) -> MurmurError {
        MurmurError::DeliveryFailed(self.to_string())
    }
}
