use crate::db::{Database, RaidRecord, ReactionRecord};
use crate::roster::reaction::ReactionKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub struct RaidService {
    db: Database,
}

impl RaidService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_raid(
        &self,
        scheduled_at: DateTime<Utc>,
        color: Option<u32>,
    ) -> anyhow::Result<RaidRecord> {
        self.db
            .run_blocking(move |db| db.create_raid(scheduled_at, color))
            .await
    }

    pub async fn raid_at(&self, scheduled_at: DateTime<Utc>) -> anyhow::Result<Option<RaidRecord>> {
        self.db
            .run_blocking(move |db| db.raid_at(scheduled_at))
            .await
    }

    pub async fn get_raid(&self, raid_id: i64) -> anyhow::Result<Option<RaidRecord>> {
        self.db.run_blocking(move |db| db.get_raid(raid_id)).await
    }

    pub async fn next_raid(&self, after: DateTime<Utc>) -> anyhow::Result<Option<RaidRecord>> {
        self.db.run_blocking(move |db| db.next_raid(after)).await
    }

    pub async fn upcoming_raids(&self, after: DateTime<Utc>) -> anyhow::Result<Vec<RaidRecord>> {
        self.db
            .run_blocking(move |db| db.list_upcoming_raids(after))
            .await
    }

    pub async fn find_by_message(&self, message_id: &str) -> anyhow::Result<Option<RaidRecord>> {
        let message_id = message_id.to_string();
        self.db
            .run_blocking(move |db| db.find_raid_by_message(&message_id))
            .await
    }

    pub async fn set_message(
        &self,
        raid_id: i64,
        message_id: Option<String>,
    ) -> anyhow::Result<()> {
        self.db
            .run_blocking(move |db| db.set_raid_message(raid_id, message_id.as_deref()))
            .await
    }

    pub async fn record_reaction(
        &self,
        raid_id: i64,
        user_id: String,
        at: DateTime<Utc>,
        reaction: ReactionKind,
        reason: Option<String>,
    ) -> anyhow::Result<()> {
        let record = ReactionRecord {
            raid_id,
            user_id,
            at,
            reaction,
            reason,
        };
        self.db
            .run_blocking(move |db| db.append_reaction(&record))
            .await
    }

    pub async fn reactions(&self, raid_id: i64) -> anyhow::Result<Vec<ReactionRecord>> {
        self.db
            .run_blocking(move |db| db.list_reactions(raid_id))
            .await
    }

    /// Each user's latest record for the raid, kept only when that record
    /// carries a reason, ordered by reaction time.
    pub async fn latest_reasons(&self, raid_id: i64) -> anyhow::Result<Vec<ReactionRecord>> {
        let log = self.reactions(raid_id).await?;
        Ok(latest_with_reason(log))
    }

    pub async fn delete_raid(&self, raid_id: i64) -> anyhow::Result<Option<RaidRecord>> {
        self.db.run_blocking(move |db| db.delete_raid(raid_id)).await
    }

    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<RaidRecord>> {
        self.db
            .run_blocking(move |db| db.delete_raids_before(cutoff))
            .await
    }
}

/// Reduce a time-sorted log to the latest record per user, dropping users
/// whose latest record has no reason. Earlier records with reasons do not
/// count; only the current answer matters.
fn latest_with_reason(log: Vec<ReactionRecord>) -> Vec<ReactionRecord> {
    let mut latest: BTreeMap<String, ReactionRecord> = BTreeMap::new();
    for record in log {
        latest.insert(record.user_id.clone(), record);
    }

    let mut kept: Vec<ReactionRecord> = latest
        .into_values()
        .filter(|record| record.reason.is_some())
        .collect();
    kept.sort_by(|a, b| a.at.cmp(&b.at));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(user: &str, secs: i64, kind: ReactionKind, reason: Option<&str>) -> ReactionRecord {
        ReactionRecord {
            raid_id: 1,
            user_id: user.to_string(),
            at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            reaction: kind,
            reason: reason.map(|r| r.to_string()),
        }
    }

    #[test]
    fn test_latest_with_reason_keeps_current_answer_only() {
        let log = vec![
            record("a", 0, ReactionKind::Declined, Some("work")),
            record("a", 60, ReactionKind::Accepted, None),
            record("b", 30, ReactionKind::Delayed, Some("+1h")),
            record("c", 40, ReactionKind::Accepted, None),
        ];

        let kept = latest_with_reason(log);
        // "a" recanted the decline, "c" never gave a reason.
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].user_id, "b");
        assert_eq!(kept[0].reason.as_deref(), Some("+1h"));
    }

    #[test]
    fn test_latest_with_reason_orders_by_time() {
        let log = vec![
            record("a", 10, ReactionKind::Declined, Some("early shift")),
            record("b", 5, ReactionKind::Delayed, Some("+30m")),
        ];

        let kept = latest_with_reason(log);
        assert_eq!(
            kept.iter().map(|r| r.user_id.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
    }

    #[test]
    fn test_latest_with_reason_empty_log() {
        assert!(latest_with_reason(Vec::new()).is_empty());
    }
}
