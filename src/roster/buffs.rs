//! Raid-wide buff coverage.
//!
//! Each buff is provided by exactly one class. Coverage for a buff is the
//! best (minimum-rank) reaction among roster entries of that class: if at
//! least one provider accepted, the buff is covered; if the only provider
//! is delayed, the buff is delayed; and so on. A buff with no provider in
//! the roster resolves to `Unknown` — the maximum of the rank order, which
//! makes the empty reduction total without a special case.

use crate::roster::classes::Class;
use crate::roster::reaction::ReactionKind;
use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Buff {
    ArcaneIntellect,
    BattleShout,
    ChaosBrand,
    MysticTouch,
    PowerWordFortitude,
}

impl Buff {
    pub const ALL: [Buff; 5] = [
        Buff::ArcaneIntellect,
        Buff::BattleShout,
        Buff::ChaosBrand,
        Buff::MysticTouch,
        Buff::PowerWordFortitude,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Buff::ArcaneIntellect => "Arcane Int",
            Buff::BattleShout => "Battle Shout",
            Buff::ChaosBrand => "Chaos Brand",
            Buff::MysticTouch => "Mystic Touch",
            Buff::PowerWordFortitude => "PW: Fortitude",
        }
    }

    /// The class whose attendance grants this buff.
    pub fn provider(self) -> Class {
        match self {
            Buff::ArcaneIntellect => Class::Mage,
            Buff::BattleShout => Class::Warrior,
            Buff::ChaosBrand => Class::DemonHunter,
            Buff::MysticTouch => Class::Monk,
            Buff::PowerWordFortitude => Class::Priest,
        }
    }
}

/// Reduce the roster to a coverage level per buff. Every buff is always
/// present in the result; ordering for display is the renderer's concern.
pub fn resolve(roster: &Roster) -> Vec<(Buff, ReactionKind)> {
    Buff::ALL
        .iter()
        .map(|&buff| {
            let level = roster
                .values()
                .filter(|entry| entry.class == buff.provider())
                .map(|entry| entry.reaction)
                .min()
                .unwrap_or(ReactionKind::Unknown);
            (buff, level)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{build, Member};
    use crate::db::ReactionRecord;
    use chrono::{TimeZone, Utc};

    fn member(id: &str, tags: &[&str]) -> Member {
        Member {
            user_id: id.to_string(),
            display_name: id.to_string(),
            role_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn reaction(id: &str, secs: i64, kind: ReactionKind) -> ReactionRecord {
        ReactionRecord {
            raid_id: 1,
            user_id: id.to_string(),
            at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            reaction: kind,
            reason: None,
        }
    }

    fn level_of(resolved: &[(Buff, ReactionKind)], buff: Buff) -> ReactionKind {
        resolved.iter().find(|(b, _)| *b == buff).unwrap().1
    }

    #[test]
    fn test_best_provider_wins() {
        let members = vec![
            member("a", &["Mainraider", "Mage"]),
            member("b", &["Mainraider", "Mage"]),
        ];
        let reactions = vec![
            reaction("a", 0, ReactionKind::Declined),
            reaction("b", 1, ReactionKind::Accepted),
        ];
        let roster = build(&members, &reactions, &["Mainraider".to_string()]);

        let resolved = resolve(&roster);
        assert_eq!(level_of(&resolved, Buff::ArcaneIntellect), ReactionKind::Accepted);
    }

    #[test]
    fn test_sole_delayed_provider() {
        let members = vec![member("a", &["Mainraider", "Mage"])];
        let reactions = vec![reaction("a", 0, ReactionKind::Delayed)];
        let roster = build(&members, &reactions, &["Mainraider".to_string()]);

        let resolved = resolve(&roster);
        assert_eq!(level_of(&resolved, Buff::ArcaneIntellect), ReactionKind::Delayed);
    }

    #[test]
    fn test_missing_provider_defaults_to_unknown() {
        let roster = Roster::new();
        let resolved = resolve(&roster);

        assert_eq!(resolved.len(), Buff::ALL.len());
        for (_, level) in resolved {
            assert_eq!(level, ReactionKind::Unknown);
        }
    }

    #[test]
    fn test_every_buff_present_once() {
        let members = vec![member("a", &["Mainraider", "Warrior"])];
        let roster = build(&members, &[], &["Mainraider".to_string()]);
        let resolved = resolve(&roster);

        assert_eq!(resolved.len(), Buff::ALL.len());
        // The seeded warrior has not reacted yet.
        assert_eq!(level_of(&resolved, Buff::BattleShout), ReactionKind::Unknown);
    }
}
