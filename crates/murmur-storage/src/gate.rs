//! Gating target storage - forced-subscription requirements.
//!
//! Targets are keyed by their external identifier (channel handle or URL),
//! so uniqueness is the table's key constraint. There is no update path;
//! changing a label means remove and re-add.

use crate::define_simple_storage;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// What kind of external resource a gating target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A channel/group the user must be a member of (verifiable).
    Channel,
    /// An arbitrary link the user must acknowledge (trust-based).
    Link,
}

/// A single admission requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatingTarget {
    pub target: String,
    pub kind: TargetKind,
    /// Button label shown when prompting the user.
    pub label: String,
}

define_simple_storage! {
    /// Low-level gating target storage keyed by target identifier.
    pub struct GatingTargetStorage { table: "gating_targets" }
}

impl GatingTargetStorage {
    /// Insert a target. Returns false without mutating anything when the
    /// target already exists.
    pub fn insert_gating_target(&self, target: &GatingTarget) -> Result<bool> {
        let data = serde_json::to_vec(target)?;
        self.insert_if_absent(&target.target, &data)
    }

    /// Remove a target, reporting whether a row was actually removed.
    pub fn delete_gating_target(&self, target: &str) -> Result<bool> {
        self.delete(target)
    }

    /// All targets in key order.
    pub fn list_gating_targets(&self) -> Result<Vec<GatingTarget>> {
        let mut targets = Vec::new();
        for (_, data) in self.list_raw()? {
            targets.push(serde_json::from_slice(&data)?);
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::Database;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn target(name: &str, kind: TargetKind) -> GatingTarget {
        GatingTarget {
            target: name.to_string(),
            kind,
            label: "join".to_string(),
        }
    }

    fn storage() -> (tempfile::TempDir, GatingTargetStorage) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let storage = GatingTargetStorage::new(db).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let (_dir, storage) = storage();

        assert!(storage
            .insert_gating_target(&target("@x", TargetKind::Channel))
            .unwrap());
        assert!(!storage
            .insert_gating_target(&target("@x", TargetKind::Channel))
            .unwrap());

        let targets = storage.list_gating_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target, "@x");
    }

    #[test]
    fn test_delete_reports_removal() {
        let (_dir, storage) = storage();

        storage
            .insert_gating_target(&target("https://example.com", TargetKind::Link))
            .unwrap();

        assert!(storage.delete_gating_target("https://example.com").unwrap());
        assert!(!storage.delete_gating_target("https://example.com").unwrap());
    }

    #[test]
    fn test_kind_round_trips() {
        let (_dir, storage) = storage();

        storage
            .insert_gating_target(&target("@chan", TargetKind::Channel))
            .unwrap();
        storage
            .insert_gating_target(&target("https://a.example", TargetKind::Link))
            .unwrap();

        let targets = storage.list_gating_targets().unwrap();
        let kinds: Vec<TargetKind> = targets.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TargetKind::Channel));
        assert!(kinds.contains(&TargetKind::Link));
    }
}
