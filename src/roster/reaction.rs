use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// RSVP state of a roster member.
///
/// The ordering is load-bearing: buff resolution takes the minimum over
/// providers and the renderer sorts by it, so the rank is spelled out
/// explicitly instead of relying on declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionKind {
    Accepted,
    Delayed,
    Declined,
    Unknown,
}

impl ReactionKind {
    /// All kinds, best to worst.
    pub const ALL: [ReactionKind; 4] = [
        ReactionKind::Accepted,
        ReactionKind::Delayed,
        ReactionKind::Declined,
        ReactionKind::Unknown,
    ];

    /// Rank under the total order: Accepted(0) < Delayed(1) < Declined(2) < Unknown(3).
    /// Lower is better.
    pub fn rank(self) -> u8 {
        match self {
            ReactionKind::Accepted => 0,
            ReactionKind::Delayed => 1,
            ReactionKind::Declined => 2,
            ReactionKind::Unknown => 3,
        }
    }

    /// Line prefix inside a Discord ```diff code block: `+` renders green,
    /// `-` red, `!` orange, a space stays uncolored.
    pub fn icon(self) -> char {
        match self {
            ReactionKind::Accepted => '+',
            ReactionKind::Delayed => '!',
            ReactionKind::Declined => '-',
            ReactionKind::Unknown => ' ',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Accepted => "Accepted",
            ReactionKind::Delayed => "Delayed",
            ReactionKind::Declined => "Declined",
            ReactionKind::Unknown => "Unknown",
        }
    }

    /// Inverse of [`as_str`](Self::as_str). Anything unrecognized collapses
    /// to `Unknown` rather than failing the whole roster build.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "Accepted" => ReactionKind::Accepted,
            "Delayed" => ReactionKind::Delayed,
            "Declined" => ReactionKind::Declined,
            _ => ReactionKind::Unknown,
        }
    }
}

impl Ord for ReactionKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for ReactionKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
