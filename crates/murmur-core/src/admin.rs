//! Administrator Operations
//!
//! Broadcast, user listing, activity statistics, and gating-target CRUD.
//! Every operation here is reachable only from the administrator's panel;
//! the permission check lives in the runtime dispatcher.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use murmur_storage::{
    GatingTarget, GatingTargetStorage, RelayRecordStorage, TargetKind, UserRecord, UserStorage,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::channel::{Messenger, MessageRef};
use crate::error::MurmurError;

/// How many users the listing shows before cutting off.
const USER_LISTING_CAP: usize = 20;

/// Pause between broadcast sends to respect channel throughput limits.
#[cfg(not(test))]
const BROADCAST_DELAY_MS: u64 = 100;
#[cfg(test)]
const BROADCAST_DELAY_MS: u64 = 1;

/// Tally of a finished broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub sent_count: usize,
    pub failed_count: usize,
}

/// Bounded user listing.
#[derive(Debug, Clone)]
pub struct UserListing {
    /// First [`USER_LISTING_CAP`] users in key order.
    pub users: Vec<UserRecord>,
    pub total: usize,
}

/// Activity counters computed against the current date boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityStats {
    pub total_users: usize,
    pub total_relayed_messages: usize,
    pub new_today: usize,
    pub new_this_week: usize,
    pub new_this_month: usize,
    pub new_this_year: usize,
}

#[derive(Clone)]
pub struct AdminOps {
    users: Arc<UserStorage>,
    records: Arc<RelayRecordStorage>,
    targets: Arc<GatingTargetStorage>,
    messenger: Arc<dyn Messenger>,
}

impl AdminOps {
    pub fn new(
        users: Arc<UserStorage>,
        records: Arc<RelayRecordStorage>,
        targets: Arc<GatingTargetStorage>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            users,
            records,
            targets,
            messenger,
        }
    }

    /// Copy the payload message to every known user, pausing between sends.
    ///
    /// Per-recipient failures are tallied and never abort the batch; a
    /// failed recipient is not retried within the same broadcast.
    pub async fn broadcast(&self, payload: MessageRef) -> Result<BroadcastOutcome, MurmurError> {
        let users = self.users.list_users(None)?;
        let mut outcome = BroadcastOutcome {
            sent_count: 0,
            failed_count: 0,
        };

        for user in &users {
            match self
                .messenger
                .copy_message(user.user_id, payload.chat_id, payload.message_id)
                .await
            {
                Ok(_) => outcome.sent_count += 1,
                Err(e) => {
                    warn!("Broadcast to {} failed: {}", user.pseudonym, e);
                    outcome.failed_count += 1;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(BROADCAST_DELAY_MS)).await;
        }

        info!(
            "Broadcast finished: {} sent, {} failed",
            outcome.sent_count, outcome.failed_count
        );
        Ok(outcome)
    }

    pub fn list_users(&self) -> Result<UserListing, MurmurError> {
        Ok(UserListing {
            users: self.users.list_users(Some(USER_LISTING_CAP))?,
            total: self.users.count_users(None)?,
        })
    }

    pub fn stats(&self) -> Result<ActivityStats, MurmurError> {
        self.stats_at(Utc::now())
    }

    /// Statistics with an explicit "now", split out so boundary behavior is
    /// testable.
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<ActivityStats, MurmurError> {
        let (today, week, month, year) = Self::period_boundaries(now.date_naive());

        Ok(ActivityStats {
            total_users: self.users.count_users(None)?,
            total_relayed_messages: self.records.count_relay_records()?,
            new_today: self.users.count_users(Some(today))?,
            new_this_week: self.users.count_users(Some(week))?,
            new_this_month: self.users.count_users(Some(month))?,
            new_this_year: self.users.count_users(Some(year))?,
        })
    }

    /// Start-of-period dates for (today, week, month, year). Weeks start on
    /// Monday; a week may begin in the previous month.
    fn period_boundaries(today: NaiveDate) -> (NaiveDate, NaiveDate, NaiveDate, NaiveDate) {
        let week = today
            - chrono::Duration::days(today.weekday().num_days_from_monday() as i64);
        // Day 1 always exists, as does January 1st.
        let month = today.with_day(1).unwrap_or(today);
        let year = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        (today, week, month, year)
    }

    /// Add a gating target. Fails with [`MurmurError::Duplicate`] when the
    /// target already exists.
    pub fn add_gating_target(
        &self,
        target: &str,
        kind: TargetKind,
        label: &str,
    ) -> Result<(), MurmurError> {
        let record = GatingTarget {
            target: target.to_string(),
            kind,
            label: label.to_string(),
        };
        if self.targets.insert_gating_target(&record)? {
            Ok(())
        } else {
            Err(MurmurError::Duplicate(target.to_string()))
        }
    }

    /// Remove a gating target, reporting absence as an error the caller can
    /// word for the administrator.
    pub fn remove_gating_target(&self, target: &str) -> Result<(), MurmurError> {
        if self.targets.delete_gating_target(target)? {
            Ok(())
        } else {
            Err(MurmurError::TargetNotFound(target.to_string()))
        }
    }

    pub fn list_gating_targets(&self) -> Result<Vec<GatingTarget>, MurmurError> {
        Ok(self.targets.list_gating_targets()?)
    }
}
