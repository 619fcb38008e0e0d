//! Pure rendering of a raid roster into displayable pieces.
//!
//! Everything here is deterministic string-building over a [`Roster`];
//! [`to_embed`] is the single point where the result meets serenity types.

use crate::db::RaidRecord;
use crate::roster::buffs;
use crate::roster::classes::Role;
use crate::roster::reaction::ReactionKind;
use crate::roster::{Roster, RosterEntry};
use chrono::Datelike;
use chrono_tz::Tz;
use serenity::all::{Colour, CreateEmbed};

/// One embed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Fully rendered invite content, ready to be turned into an embed.
#[derive(Debug, Clone, PartialEq)]
pub struct RaidSummary {
    pub title: String,
    pub raid_tag: String,
    pub thumbnail_url: String,
    pub color: Option<u32>,
    pub sections: Vec<Section>,
}

/// Per-weekday accent icons, Monday first.
const WEEKDAY_THUMBNAILS: [&str; 7] = [
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-montag-50.png",
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-dienstag-50.png",
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-mittwoch-50.png",
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-donnerstag-50.png",
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-freitag-50.png",
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-samstag-50.png",
    "https://s3.eu-central-1.amazonaws.com/weekday-thumbnails/icons8-sonntag-50.png",
];

/// Wrap a body in a ```diff code block so the reaction icons colorize.
fn diff(body: &str) -> String {
    format!("```diff\n{}\n```", body)
}

pub fn render(raid: &RaidRecord, roster: &Roster, tz: Tz) -> RaidSummary {
    let local = raid.scheduled_at.with_timezone(&tz);
    let weekday = local.format("%A %H:%M - %x").to_string();
    let thumbnail = WEEKDAY_THUMBNAILS[local.weekday().num_days_from_monday() as usize];

    let mut sections = vec![attendance_section(roster)];
    for role in Role::ALL {
        if let Some(section) = role_section(roster, role) {
            sections.push(section);
        }
    }
    sections.push(buffs_section(roster));

    RaidSummary {
        title: weekday,
        raid_tag: format!("Raid #{}", raid.id),
        thumbnail_url: thumbnail.to_string(),
        color: raid.color,
        sections,
    }
}

fn attendance_section(roster: &Roster) -> Section {
    let lines: Vec<String> = ReactionKind::ALL
        .iter()
        .map(|&kind| {
            let count = roster.values().filter(|e| e.reaction == kind).count();
            format!("{} {}: {}", kind.icon(), kind.as_str(), count)
        })
        .collect();

    Section {
        name: "Attendance".to_string(),
        value: diff(&lines.join("\n")),
        inline: true,
    }
}

fn entry_line(entry: &RosterEntry) -> String {
    match (&entry.reaction, &entry.reason) {
        // Only a delay explains itself inline; declines keep their reasons
        // for the reasons listing.
        (ReactionKind::Delayed, Some(reason)) => {
            format!("{} {} ({})", entry.reaction.icon(), entry.display_name, reason)
        }
        _ => format!("{} {}", entry.reaction.icon(), entry.display_name),
    }
}

/// One section per role; a role nobody holds is omitted entirely.
fn role_section(roster: &Roster, role: Role) -> Option<Section> {
    let mut entries: Vec<&RosterEntry> =
        roster.values().filter(|e| e.role == role).collect();
    if entries.is_empty() {
        return None;
    }

    entries.sort_by(|a, b| {
        a.reaction
            .rank()
            .cmp(&b.reaction.rank())
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    let lines: Vec<String> = entries.iter().map(|e| entry_line(e)).collect();

    Some(Section {
        name: format!("**{}**", role.heading()),
        value: diff(&lines.join("\n")),
        inline: true,
    })
}

fn buffs_section(roster: &Roster) -> Section {
    let mut resolved = buffs::resolve(roster);
    resolved.sort_by(|a, b| {
        a.1.rank()
            .cmp(&b.1.rank())
            .then_with(|| a.0.name().cmp(b.0.name()))
    });

    let lines: Vec<String> = resolved
        .iter()
        .map(|(buff, level)| format!("{} {}", level.icon(), buff.name()))
        .collect();

    Section {
        name: "Raid Buffs".to_string(),
        value: diff(&lines.join("\n")),
        inline: true,
    }
}

pub fn to_embed(summary: &RaidSummary) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&summary.title)
        .description(&summary.raid_tag)
        .thumbnail(&summary.thumbnail_url);
    if let Some(color) = summary.color {
        embed = embed.colour(Colour::new(color));
    }
    for section in &summary.sections {
        embed = embed.field(&section.name, &section.value, section.inline);
    }
    embed
}
