//! Murmur Core - anonymous message relay over a messaging channel.
//!
//! Users get a shareable pseudonymous link; anyone who opens it can message
//! them without either side learning the other's real identity. Components:
//!
//! - [`pseudonym`] - salted one-way derivation of opaque user handles
//! - [`gate`] - forced-subscription admission check
//! - [`relay`] - anonymous delivery and reply-threading
//! - [`session`] - per-user multi-step flow state
//! - [`admin`] - broadcast, listing, stats, gating-target CRUD
//! - [`channel`] - messaging abstraction and the Telegram implementation
//! - [`runtime`] - the event loop wiring it all together

pub mod admin;
pub mod channel;
pub mod error;
pub mod gate;
pub mod pseudonym;
pub mod relay;
pub mod runtime;
pub mod session;

pub use admin::{ActivityStats, AdminOps, BroadcastOutcome, UserListing};
pub use channel::{Messenger, TelegramChannel, TelegramConfig};
pub use error::{ChannelError, MurmurError};
pub use gate::{Admission, AdmissionGate, GateTrigger};
pub use pseudonym::PseudonymService;
pub use relay::RelayEngine;
pub use runtime::Bot;
pub use session::{Flow, SessionStore};
