use crate::config::Config;
use crate::roster::reaction::ReactionKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Timestamps are stored as UTC text in SQLite's canonical format.
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no raid with id {0}")]
    UnknownRaid(i64),
}

/// A scheduled raid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidRecord {
    pub id: i64,
    pub scheduled_at: DateTime<Utc>,
    /// Discord message id of the posted invite, if any.
    pub message_id: Option<String>,
    /// Accent color for the invite embed.
    pub color: Option<u32>,
}

/// One append-only RSVP record. Keyed by (raid, user, at); a user may have
/// many, and the one with the greatest `at` is their current answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub raid_id: i64,
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub reaction: ReactionKind,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        let conn = Connection::open(&config.database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS raids (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scheduled_at DATETIME NOT NULL UNIQUE,
                message_id TEXT,
                color INTEGER
            );

            CREATE TABLE IF NOT EXISTS raid_reactions (
                raid_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                at DATETIME NOT NULL,
                reaction TEXT NOT NULL,
                reason TEXT,
                PRIMARY KEY (raid_id, user_id, at)
            );
            CREATE INDEX IF NOT EXISTS idx_reactions_raid_at ON raid_reactions (raid_id, at);
        ";
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Run a closure against this database on the blocking thread pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    // --- Raids ---

    pub fn create_raid(
        &self,
        scheduled_at: DateTime<Utc>,
        color: Option<u32>,
    ) -> anyhow::Result<RaidRecord> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO raids (scheduled_at, color) VALUES (?1, ?2)",
            (to_sqlite(scheduled_at), color),
        )?;
        let id = conn.last_insert_rowid();
        debug!("Database: Created raid {} at {}", id, scheduled_at);
        Ok(RaidRecord {
            id,
            scheduled_at,
            message_id: None,
            color,
        })
    }

    pub fn get_raid(&self, raid_id: i64) -> anyhow::Result<Option<RaidRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, scheduled_at, message_id, color FROM raids WHERE id = ?1",
                [raid_id],
                raid_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn raid_at(&self, scheduled_at: DateTime<Utc>) -> anyhow::Result<Option<RaidRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, scheduled_at, message_id, color FROM raids WHERE scheduled_at = ?1",
                [to_sqlite(scheduled_at)],
                raid_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn find_raid_by_message(&self, message_id: &str) -> anyhow::Result<Option<RaidRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, scheduled_at, message_id, color FROM raids WHERE message_id = ?1",
                [message_id],
                raid_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// The soonest raid strictly after `after`.
    pub fn next_raid(&self, after: DateTime<Utc>) -> anyhow::Result<Option<RaidRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, scheduled_at, message_id, color FROM raids
                 WHERE scheduled_at > ?1 ORDER BY scheduled_at ASC LIMIT 1",
                [to_sqlite(after)],
                raid_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_upcoming_raids(&self, after: DateTime<Utc>) -> anyhow::Result<Vec<RaidRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scheduled_at, message_id, color FROM raids
             WHERE scheduled_at > ?1 ORDER BY scheduled_at ASC",
        )?;
        let rows = stmt.query_map([to_sqlite(after)], raid_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn set_raid_message(&self, raid_id: i64, message_id: Option<&str>) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE raids SET message_id = ?1 WHERE id = ?2",
            (message_id, raid_id),
        )?;
        Ok(())
    }

    /// Delete a raid together with its reaction log. Returns the deleted
    /// record so the caller can retire the invite message.
    pub fn delete_raid(&self, raid_id: i64) -> anyhow::Result<Option<RaidRecord>> {
        let record = self.get_raid(raid_id)?;
        if record.is_some() {
            let conn = self.conn.lock().unwrap();
            conn.execute("DELETE FROM raid_reactions WHERE raid_id = ?1", [raid_id])?;
            conn.execute("DELETE FROM raids WHERE id = ?1", [raid_id])?;
            debug!("Database: Deleted raid {}", raid_id);
        }
        Ok(record)
    }

    /// Remove raids scheduled before `cutoff` and their reaction logs.
    /// Returns the removed records, message references included.
    pub fn delete_raids_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<RaidRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, scheduled_at, message_id, color FROM raids
             WHERE scheduled_at < ?1 ORDER BY scheduled_at ASC",
        )?;
        let rows = stmt.query_map([to_sqlite(cutoff)], raid_from_row)?;

        let mut removed = Vec::new();
        for row in rows {
            removed.push(row?);
        }
        for raid in &removed {
            conn.execute("DELETE FROM raid_reactions WHERE raid_id = ?1", [raid.id])?;
            conn.execute("DELETE FROM raids WHERE id = ?1", [raid.id])?;
        }
        Ok(removed)
    }

    // --- Reaction log ---

    /// Append one RSVP record. Fails with [`StoreError::UnknownRaid`] when
    /// the raid does not exist; no ordering constraint is enforced on `at`.
    pub fn append_reaction(&self, record: &ReactionRecord) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        let known = conn
            .prepare("SELECT 1 FROM raids WHERE id = ?1")?
            .exists([record.raid_id])?;
        if !known {
            return Err(StoreError::UnknownRaid(record.raid_id).into());
        }

        conn.execute(
            "INSERT OR REPLACE INTO raid_reactions (raid_id, user_id, at, reaction, reason)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                record.raid_id,
                &record.user_id,
                to_sqlite(record.at),
                record.reaction.as_str(),
                &record.reason,
            ),
        )?;
        Ok(())
    }

    /// The full reaction log for one raid, sorted by `at` ascending. An
    /// unknown or silent raid yields an empty vector, never an error.
    pub fn list_reactions(&self, raid_id: i64) -> anyhow::Result<Vec<ReactionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT raid_id, user_id, at, reaction, reason FROM raid_reactions
             WHERE raid_id = ?1 ORDER BY at ASC",
        )?;
        let rows = stmt.query_map([raid_id], |row| {
            Ok(ReactionRecord {
                raid_id: row.get(0)?,
                user_id: row.get(1)?,
                at: from_sqlite(&row.get::<_, String>(2)?).unwrap_or_default(),
                reaction: ReactionKind::from_str_lossy(&row.get::<_, String>(3)?),
                reason: row.get(4)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn raid_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RaidRecord> {
    Ok(RaidRecord {
        id: row.get(0)?,
        scheduled_at: from_sqlite(&row.get::<_, String>(1)?).unwrap_or_default(),
        message_id: row.get(2)?,
        color: row.get(3)?,
    })
}

fn to_sqlite(at: DateTime<Utc>) -> String {
    at.format(SQLITE_DATETIME_FMT).to_string()
}

fn from_sqlite(ts: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(ts, SQLITE_DATETIME_FMT).ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::new(&Config::in_memory()).unwrap();
        db.execute_init().unwrap();
        db
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn reaction(raid_id: i64, user: &str, secs: i64, kind: ReactionKind) -> ReactionRecord {
        ReactionRecord {
            raid_id,
            user_id: user.to_string(),
            at: ts(secs),
            reaction: kind,
            reason: None,
        }
    }

    #[test]
    fn test_raid_round_trip() {
        let db = test_db();
        let created = db.create_raid(ts(0), Some(0xFF0000)).unwrap();

        let fetched = db.get_raid(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(db.raid_at(ts(0)).unwrap().unwrap().id, created.id);
        assert!(db.get_raid(created.id + 1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_schedule_rejected() {
        let db = test_db();
        db.create_raid(ts(0), None).unwrap();
        assert!(db.create_raid(ts(0), None).is_err());
    }

    #[test]
    fn test_message_ref_set_and_cleared() {
        let db = test_db();
        let raid = db.create_raid(ts(0), None).unwrap();

        db.set_raid_message(raid.id, Some("42")).unwrap();
        let found = db.find_raid_by_message("42").unwrap().unwrap();
        assert_eq!(found.id, raid.id);

        db.set_raid_message(raid.id, None).unwrap();
        assert!(db.find_raid_by_message("42").unwrap().is_none());
    }

    #[test]
    fn test_next_and_upcoming_ordering() {
        let db = test_db();
        let later = db.create_raid(ts(7200), None).unwrap();
        let sooner = db.create_raid(ts(3600), None).unwrap();

        let next = db.next_raid(ts(0)).unwrap().unwrap();
        assert_eq!(next.id, sooner.id);

        let upcoming = db.list_upcoming_raids(ts(0)).unwrap();
        assert_eq!(
            upcoming.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![sooner.id, later.id]
        );

        // Strictly after: a raid exactly at the probe time is excluded.
        assert!(db.next_raid(ts(7200)).unwrap().is_none());
    }

    #[test]
    fn test_append_requires_known_raid() {
        let db = test_db();
        let err = db
            .append_reaction(&reaction(99, "u1", 0, ReactionKind::Accepted))
            .unwrap_err();
        assert!(err.downcast_ref::<StoreError>().is_some());
    }

    #[test]
    fn test_reactions_sorted_by_time() {
        let db = test_db();
        let raid = db.create_raid(ts(0), None).unwrap();

        // Inserted out of order on purpose.
        db.append_reaction(&reaction(raid.id, "u1", 60, ReactionKind::Declined))
            .unwrap();
        db.append_reaction(&reaction(raid.id, "u2", 10, ReactionKind::Accepted))
            .unwrap();
        db.append_reaction(&reaction(raid.id, "u1", 30, ReactionKind::Accepted))
            .unwrap();

        let log = db.list_reactions(raid.id).unwrap();
        let ats: Vec<_> = log.iter().map(|r| r.at).collect();
        assert_eq!(ats, vec![ts(10), ts(30), ts(60)]);

        assert!(db.list_reactions(raid.id + 1).unwrap().is_empty());
    }

    #[test]
    fn test_reason_round_trip() {
        let db = test_db();
        let raid = db.create_raid(ts(0), None).unwrap();
        let mut record = reaction(raid.id, "u1", 0, ReactionKind::Delayed);
        record.reason = Some("+1h".to_string());
        db.append_reaction(&record).unwrap();

        let log = db.list_reactions(raid.id).unwrap();
        assert_eq!(log, vec![record]);
    }

    #[test]
    fn test_delete_raid_drops_log() {
        let db = test_db();
        let raid = db.create_raid(ts(0), None).unwrap();
        db.append_reaction(&reaction(raid.id, "u1", 0, ReactionKind::Accepted))
            .unwrap();

        let removed = db.delete_raid(raid.id).unwrap().unwrap();
        assert_eq!(removed.id, raid.id);
        assert!(db.get_raid(raid.id).unwrap().is_none());
        assert!(db.list_reactions(raid.id).unwrap().is_empty());
        assert!(db.delete_raid(raid.id).unwrap().is_none());
    }

    #[test]
    fn test_prune_before_cutoff() {
        let db = test_db();
        let old = db.create_raid(ts(-86_400), None).unwrap();
        db.set_raid_message(old.id, Some("101")).unwrap();
        let fresh = db.create_raid(ts(3600), None).unwrap();

        let removed = db.delete_raids_before(ts(0)).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, old.id);
        assert_eq!(removed[0].message_id.as_deref(), Some("101"));

        assert!(db.get_raid(old.id).unwrap().is_none());
        assert!(db.get_raid(fresh.id).unwrap().is_some());
    }
}
