//! Pseudonym Derivation
//!
//! Maps real channel user ids to opaque, stable handles. The derivation is
//! a salted one-way hash; the reverse direction goes through the user table,
//! never through the hash.

use murmur_storage::UserStorage;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::MurmurError;

/// Length of the hex-encoded pseudonym.
pub const PSEUDONYM_LEN: usize = 12;

/// Derives and resolves pseudonyms against a deployment-secret salt.
///
/// The salt is fixed for the lifetime of a deployment; changing it orphans
/// every stored pseudonym.
#[derive(Clone)]
pub struct PseudonymService {
    salt: String,
    users: Arc<UserStorage>,
}

impl PseudonymService {
    pub fn new(salt: impl Into<String>, users: Arc<UserStorage>) -> Self {
        Self {
            salt: salt.into(),
            users,
        }
    }

    /// Derive the pseudonym for a user id. Deterministic for a fixed salt.
    pub fn derive(&self, user_id: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(user_id.to_string().as_bytes());
        hasher.update(self.salt.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..PSEUDONYM_LEN].to_string()
    }

    /// Resolve a pseudonym back to the real user id via the user table.
    pub fn resolve(&self, pseudonym: &str) -> Result<i64, MurmurError> {
        self.users
            .find_user_id_by_pseudonym(pseudonym)?
            .ok_or_else(|| MurmurError::UnknownPseudonym(pseudonym.to_string()))
    }

    /// Shape check for text that might be a pseudonym out of a deep link.
    pub fn looks_like_pseudonym(text: &str) -> bool {
        text.len() == PSEUDONYM_LEN && text.bytes().all(|b| b.is_ascii_hexdigit())
    }
}
