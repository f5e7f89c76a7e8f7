//! Admission Gate
//!
//! Forced-subscription check that runs before any relay operation. Each
//! check is computed fresh from the current target list; nothing about an
//! admission decision is persisted.

use murmur_storage::{GatingTarget, GatingTargetStorage, TargetKind};
use std::sync::Arc;
use tracing::warn;

use crate::channel::Messenger;
use crate::error::MurmurError;

/// What caused this admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTrigger {
    /// A regular inbound event (message, menu press).
    Event,
    /// The user pressed the "I've joined" acknowledgment button.
    Acknowledgment,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Pass,
    /// The caller must present these targets and not run the requested
    /// operation.
    Blocked(Vec<GatingTarget>),
}

/// Evaluates gating targets against a user's current standing.
pub struct AdmissionGate {
    targets: Arc<GatingTargetStorage>,
    messenger: Arc<dyn Messenger>,
    admin_user_id: i64,
}

impl AdmissionGate {
    pub fn new(
        targets: Arc<GatingTargetStorage>,
        messenger: Arc<dyn Messenger>,
        admin_user_id: i64,
    ) -> Self {
        Self {
            targets,
            messenger,
            admin_user_id,
        }
    }

    /// Check whether `user_id` satisfies every configured target.
    ///
    /// Channel targets are verified through the membership API. A failed
    /// query cannot be distinguished from non-membership, so it blocks
    /// normal events but yields to the user's acknowledgment (fail open,
    /// logged). Link targets cannot be verified at all and are satisfied
    /// only by acknowledgment.
    pub async fn check(&self, user_id: i64, trigger: GateTrigger) -> Result<Admission, MurmurError> {
        if user_id == self.admin_user_id {
            return Ok(Admission::Pass);
        }

        let targets = self.targets.list_gating_targets()?;
        if targets.is_empty() {
            return Ok(Admission::Pass);
        }

        let acknowledged = trigger == GateTrigger::Acknowledgment;
        let mut unsatisfied = Vec::new();

        for target in targets {
            let satisfied = match target.kind {
                TargetKind::Channel => match self
                    .messenger
                    .member_status(&target.target, user_id)
                    .await
                {
                    Ok(status) => status.is_member(),
                    Err(e) => {
                        warn!(
                            "Membership query failed for {}: {}, failing open",
                            target.target, e
                        );
                        acknowledged
                    }
                },
                TargetKind::Link => acknowledged,
            };

            if !satisfied {
                unsatisfied.push(target);
            }
        }

        if unsatisfied.is_empty() {
            Ok(Admission::Pass)
        } else {
            Ok(Admission::Blocked(unsatisfied))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MembershipStatus;
    use crate::channel::mock::MockMessenger;
    use redb::Database;
    use tempfile::tempdir;

    const ADMIN: i64 = 1000;

    fn gate() -> (tempfile::TempDir, Arc<MockMessenger>, AdmissionGate) {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        let targets = Arc::new(GatingTargetStorage::new(db).unwrap());
        let messenger = Arc::new(MockMessenger::new());
        let gate = AdmissionGate::new(targets.clone(), messenger.clone(), ADMIN);
        (temp_dir, messenger, gate)
    }

    fn channel_target(name: &str) -> GatingTarget {
        GatingTarget {
            target: name.to_string(),
            kind: TargetKind::Channel,
            label: format!("Join {name}"),
        }
    }

    fn link_target(url: &str) -> GatingTarget {
        GatingTarget {
            target: url.to_string(),
            kind: TargetKind::Link,
            label: "Visit".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_target_list_passes() {
        let (_dir, _messenger, gate) = gate();
        assert_eq!(gate.check(1, GateTrigger::Event).await.unwrap(), Admission::Pass);
    }

    #[tokio::test]
    async fn test_admin_is_exempt() {
        let (_dir, _messenger, gate) = gate();
        gate.targets
            .insert_gating_target(&channel_target("@chan"))
            .unwrap();

        // Admin passes without any membership set up.
        assert_eq!(
            gate.check(ADMIN, GateTrigger::Event).await.unwrap(),
            Admission::Pass
        );
    }

    #[tokio::test]
    async fn test_member_passes_non_member_blocked() {
        let (_dir, messenger, gate) = gate();
        gate.targets
            .insert_gating_target(&channel_target("@chan"))
            .unwrap();

        let Admission::Blocked(unsatisfied) = gate.check(1, GateTrigger::Event).await.unwrap()
        else {
            panic!("expected blocked");
        };
        assert_eq!(unsatisfied.len(), 1);
        assert_eq!(unsatisfied[0].target, "@chan");

        messenger.set_membership("@chan", 1, MembershipStatus::Member);
        assert_eq!(
            gate.check(1, GateTrigger::Event).await.unwrap(),
            Admission::Pass
        );
    }

    #[tokio::test]
    async fn test_not_member_blocks_even_on_acknowledgment() {
        let (_dir, messenger, gate) = gate();
        gate.targets
            .insert_gating_target(&channel_target("@chan"))
            .unwrap();
        messenger.set_membership("@chan", 1, MembershipStatus::NotMember);

        assert!(matches!(
            gate.check(1, GateTrigger::Acknowledgment).await.unwrap(),
            Admission::Blocked(_)
        ));
    }

    #[tokio::test]
    async fn test_query_failure_fails_open_on_acknowledgment_only() {
        let (_dir, messenger, gate) = gate();
        gate.targets
            .insert_gating_target(&channel_target("@private"))
            .unwrap();
        messenger.fail_membership_queries("@private");

        assert!(matches!(
            gate.check(1, GateTrigger::Event).await.unwrap(),
            Admission::Blocked(_)
        ));
        assert_eq!(
            gate.check(1, GateTrigger::Acknowledgment).await.unwrap(),
            Admission::Pass
        );
    }

    #[tokio::test]
    async fn test_link_collapse_on_acknowledgment() {
        let (_dir, messenger, gate) = gate();
        gate.targets
            .insert_gating_target(&channel_target("@chan"))
            .unwrap();
        gate.targets
            .insert_gating_target(&link_target("https://example.com"))
            .unwrap();
        messenger.set_membership("@chan", 1, MembershipStatus::Member);

        // Links block normal events but yield to the acknowledgment once
        // every channel target is satisfied.
        let Admission::Blocked(unsatisfied) = gate.check(1, GateTrigger::Event).await.unwrap()
        else {
            panic!("expected blocked");
        };
        assert_eq!(unsatisfied.len(), 1);
        assert_eq!(unsatisfied[0].target, "https://example.com");

        assert_eq!(
            gate.check(1, GateTrigger::Acknowledgment).await.unwrap(),
            Admission::Pass
        );
    }
}
