//! Roster aggregation: guild membership + reaction log → one entry per member.

pub mod buffs;
pub mod classes;
pub mod reaction;

use crate::db::ReactionRecord;
use chrono::{DateTime, Utc};
use classes::{Class, Role};
use reaction::ReactionKind;
use std::collections::{BTreeMap, HashMap};

/// Snapshot of one guild member, taken by the glue layer right before a
/// pipeline run. The core never talks to Discord itself.
#[derive(Debug, Clone)]
pub struct Member {
    pub user_id: String,
    pub display_name: String,
    pub role_tags: Vec<String>,
}

/// One member's place in a raid roster. Derived on every render, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub user_id: String,
    pub display_name: String,
    pub class: Class,
    pub role: Role,
    pub reaction: ReactionKind,
    pub reason: Option<String>,
    pub reaction_at: Option<DateTime<Utc>>,
}

impl RosterEntry {
    fn seed(member: &Member) -> Self {
        RosterEntry {
            user_id: member.user_id.clone(),
            display_name: member.display_name.clone(),
            class: Class::from_tags(&member.role_tags),
            role: Role::from_tags(&member.role_tags),
            reaction: ReactionKind::Unknown,
            reason: None,
            reaction_at: None,
        }
    }
}

/// Keyed by user id, so the at-most-one-entry-per-member invariant holds by
/// construction.
pub type Roster = BTreeMap<String, RosterEntry>;

/// Whether a member counts as part of the raiding squad.
pub fn is_raider(member: &Member, raider_tags: &[String]) -> bool {
    member
        .role_tags
        .iter()
        .any(|tag| raider_tags.iter().any(|raider| raider == tag))
}

/// Build the roster for one raid.
///
/// Every raider is seeded with `Unknown`, then `reactions` — which the store
/// hands over sorted by `at` ascending — are replayed on top. Each record
/// overwrites the entry unconditionally, so the latest record wins. A
/// reacting member without a raider tag still gets an entry (they invited
/// themselves in), while records from users no longer in the guild are
/// skipped.
pub fn build(members: &[Member], reactions: &[ReactionRecord], raider_tags: &[String]) -> Roster {
    let mut roster = Roster::new();
    for member in members {
        if is_raider(member, raider_tags) {
            roster.insert(member.user_id.clone(), RosterEntry::seed(member));
        }
    }

    let by_id: HashMap<&str, &Member> = members
        .iter()
        .map(|member| (member.user_id.as_str(), member))
        .collect();

    for record in reactions {
        let Some(member) = by_id.get(record.user_id.as_str()) else {
            // Stale reaction from a member who left the guild.
            continue;
        };
        let entry = roster
            .entry(record.user_id.clone())
            .or_insert_with(|| RosterEntry::seed(member));
        entry.reaction = record.reaction;
        entry.reason = record.reason.clone();
        entry.reaction_at = Some(record.at);
    }

    roster
}
