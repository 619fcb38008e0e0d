//! Class and role classification from Discord role tags.
//!
//! Membership in a class or role is not stored anywhere; it is derived on
//! every pipeline run from the member's current set of role names. A member
//! carrying several qualifying tags gets the first match in the fixed
//! candidate order below, and a member carrying none degrades to `Unknown`.

use serde::{Deserialize, Serialize};

/// Playable class, matched against role tags by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class {
    DeathKnight,
    DemonHunter,
    Druid,
    Hunter,
    Mage,
    Monk,
    Paladin,
    Priest,
    Rogue,
    Shaman,
    Warlock,
    Warrior,
    Unknown,
}

impl Class {
    /// Candidate order for tag matching.
    pub const KNOWN: [Class; 12] = [
        Class::DeathKnight,
        Class::DemonHunter,
        Class::Druid,
        Class::Hunter,
        Class::Mage,
        Class::Monk,
        Class::Paladin,
        Class::Priest,
        Class::Rogue,
        Class::Shaman,
        Class::Warlock,
        Class::Warrior,
    ];

    /// The Discord role name this class is recognized by.
    pub fn tag(self) -> &'static str {
        match self {
            Class::DeathKnight => "Death Knight",
            Class::DemonHunter => "Demon Hunter",
            Class::Druid => "Druid",
            Class::Hunter => "Hunter",
            Class::Mage => "Mage",
            Class::Monk => "Monk",
            Class::Paladin => "Paladin",
            Class::Priest => "Priest",
            Class::Rogue => "Rogue",
            Class::Shaman => "Shaman",
            Class::Warlock => "Warlock",
            Class::Warrior => "Warrior",
            Class::Unknown => "Unknown",
        }
    }

    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Class {
        for candidate in Class::KNOWN {
            if tags.iter().any(|t| t.as_ref() == candidate.tag()) {
                return candidate;
            }
        }
        Class::Unknown
    }
}

/// Raid role, matched against role tags by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Tank,
    Heal,
    Melee,
    Ranged,
    Unknown,
}

impl Role {
    /// Candidate order for tag matching.
    pub const KNOWN: [Role; 4] = [Role::Tank, Role::Heal, Role::Melee, Role::Ranged];

    /// Display order for the roster sections, `Unknown` last.
    pub const ALL: [Role; 5] = [
        Role::Tank,
        Role::Heal,
        Role::Melee,
        Role::Ranged,
        Role::Unknown,
    ];

    /// The Discord role name this raid role is recognized by.
    pub fn tag(self) -> &'static str {
        match self {
            Role::Tank => "Tank",
            Role::Heal => "Heal",
            Role::Melee => "Melee DD",
            Role::Ranged => "Range DD",
            Role::Unknown => "Unknown",
        }
    }

    /// Section heading in the rendered roster.
    pub fn heading(self) -> &'static str {
        match self {
            Role::Tank => "Tanks",
            Role::Heal => "Healers",
            Role::Melee => "Melee DD",
            Role::Ranged => "Range DD",
            Role::Unknown => "Unknown",
        }
    }

    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Role {
        for candidate in Role::KNOWN {
            if tags.iter().any(|t| t.as_ref() == candidate.tag()) {
                return candidate;
            }
        }
        Role::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_from_tags() {
        assert_eq!(Class::from_tags(&["Mainraider", "Mage"]), Class::Mage);
        assert_eq!(Class::from_tags(&["Mainraider"]), Class::Unknown);
        assert_eq!(Class::from_tags::<&str>(&[]), Class::Unknown);
    }

    #[test]
    fn test_class_precedence_is_candidate_order() {
        // Two qualifying tags: the earlier candidate wins, regardless of the
        // order the tags arrive in.
        assert_eq!(Class::from_tags(&["Warrior", "Druid"]), Class::Druid);
        assert_eq!(Class::from_tags(&["Druid", "Warrior"]), Class::Druid);
    }

    #[test]
    fn test_role_from_tags() {
        assert_eq!(Role::from_tags(&["Heal", "Priest"]), Role::Heal);
        assert_eq!(Role::from_tags(&["Range DD"]), Role::Ranged);
        assert_eq!(Role::from_tags(&["Priest"]), Role::Unknown);
        assert_eq!(Role::from_tags(&["Tank", "Heal"]), Role::Tank);
    }
}
