use crate::board;
use crate::render;
use crate::roster::reaction::ReactionKind;
use crate::services::raid::RaidService;
use crate::{Context, Error};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use humantime::{format_duration, parse_duration};
use tracing::info;

const MAX_REASON_CHARS: usize = 200;
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Manage scheduled raids
#[poise::command(
    slash_command,
    subcommands("create", "next", "accept", "decline", "delay", "reasons", "log", "cancel"),
    guild_only
)]
pub async fn raid(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Schedule a raid and post its invite
#[poise::command(slash_command, guild_only)]
pub async fn create(
    ctx: Context<'_>,
    #[description = "Start time, guild-local (e.g., 2026-08-20 19:30)"] at: String,
    #[description = "Accent color as hex RRGGBB"] color: Option<String>,
) -> Result<(), Error> {
    let Some(scheduled_at) = parse_guild_datetime(at.trim(), ctx.data().config.timezone) else {
        ctx.say(format!(
            "❌ Invalid start time. Use `{}` (guild-local).",
            DATETIME_FORMAT
        ))
        .await?;
        return Ok(());
    };

    if scheduled_at <= Utc::now() {
        ctx.say("❌ Raids must be scheduled in the future.").await?;
        return Ok(());
    }

    let color = match color.as_deref().map(parse_color) {
        None => None,
        Some(Some(value)) => Some(value),
        Some(None) => {
            ctx.say("❌ Invalid color. Use hex like `ff7f00`.").await?;
            return Ok(());
        }
    };

    let service = RaidService::new(ctx.data().db.clone());
    if service.raid_at(scheduled_at).await?.is_some() {
        ctx.say("❌ A raid is already scheduled at that time.").await?;
        return Ok(());
    }

    let raid = service.create_raid(scheduled_at, color).await?;
    board::publish_raid(
        &ctx.serenity_context().http,
        &ctx.data().config,
        &ctx.data().db,
        &raid,
    )
    .await?;

    let unix = scheduled_at.timestamp();
    info!(
        "Created raid {} at {} (by user {})",
        raid.id,
        scheduled_at,
        ctx.author().id
    );

    ctx.say(format!(
        "✅ Raid `#{}` scheduled for <t:{unix}:F> (<t:{unix}:R>).",
        raid.id
    ))
    .await?;
    Ok(())
}

/// Show the roster of the next upcoming raid
#[poise::command(slash_command, guild_only)]
pub async fn next(ctx: Context<'_>) -> Result<(), Error> {
    let service = RaidService::new(ctx.data().db.clone());
    let Some(raid) = service.next_raid(Utc::now()).await? else {
        ctx.say("📭 No raid scheduled.").await?;
        return Ok(());
    };

    let summary = board::raid_summary(
        &ctx.serenity_context().http,
        &ctx.data().config,
        &ctx.data().db,
        &raid,
    )
    .await?;

    ctx.send(
        poise::CreateReply::default()
            .embed(render::to_embed(&summary))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Accept a raid invite
#[poise::command(slash_command, guild_only)]
pub async fn accept(
    ctx: Context<'_>,
    #[description = "Raid id"] raid_id: i64,
    #[description = "Optional note"] reason: Option<String>,
) -> Result<(), Error> {
    record_rsvp(ctx, raid_id, ReactionKind::Accepted, reason).await
}

/// Decline a raid invite
#[poise::command(slash_command, guild_only)]
pub async fn decline(
    ctx: Context<'_>,
    #[description = "Raid id"] raid_id: i64,
    #[description = "Why you can't make it"] reason: String,
) -> Result<(), Error> {
    record_rsvp(ctx, raid_id, ReactionKind::Declined, Some(reason)).await
}

/// Announce you'll be late for a raid
#[poise::command(slash_command, guild_only)]
pub async fn delay(
    ctx: Context<'_>,
    #[description = "Raid id"] raid_id: i64,
    #[description = "How late (e.g., 30m, 1h)"] by: String,
    #[description = "Optional note"] note: Option<String>,
) -> Result<(), Error> {
    let offset = match parse_duration(by.trim()) {
        Ok(offset) => offset,
        Err(_) => {
            ctx.say("❌ Invalid delay. Examples: `30m`, `1h`, `1h 30m`.")
                .await?;
            return Ok(());
        }
    };

    let mut reason = format!("+{}", format_duration(offset));
    if let Some(note) = note {
        let note = note.trim();
        if !note.is_empty() {
            reason.push_str(&format!(", {}", note));
        }
    }

    record_rsvp(ctx, raid_id, ReactionKind::Delayed, Some(reason)).await
}

/// List who gave a reason with their current answer
#[poise::command(slash_command, guild_only)]
pub async fn reasons(
    ctx: Context<'_>,
    #[description = "Raid id"] raid_id: i64,
) -> Result<(), Error> {
    let service = RaidService::new(ctx.data().db.clone());
    if service.get_raid(raid_id).await?.is_none() {
        ctx.say(format!("❌ No raid with id `{}` found.", raid_id))
            .await?;
        return Ok(());
    }

    let records = service.latest_reasons(raid_id).await?;
    if records.is_empty() {
        ctx.say("📭 Nobody has given a reason.").await?;
        return Ok(());
    }

    let mut lines = Vec::new();
    for record in records {
        let reason = record.reason.unwrap_or_default();
        lines.push(format!(
            "• `{}` <@{}> <t:{}:R> — {}",
            record.reaction.as_str(),
            record.user_id,
            record.at.timestamp(),
            reason
        ));
    }

    ctx.say(format!(
        "**Current answers with reasons for raid `#{}`:**\n{}",
        raid_id,
        lines.join("\n")
    ))
    .await?;
    Ok(())
}

/// Show the full RSVP log of a raid
#[poise::command(slash_command, guild_only)]
pub async fn log(
    ctx: Context<'_>,
    #[description = "Raid id"] raid_id: i64,
) -> Result<(), Error> {
    let service = RaidService::new(ctx.data().db.clone());
    if service.get_raid(raid_id).await?.is_none() {
        ctx.say(format!("❌ No raid with id `{}` found.", raid_id))
            .await?;
        return Ok(());
    }

    let records = service.reactions(raid_id).await?;
    if records.is_empty() {
        ctx.say("📭 No reactions recorded yet.").await?;
        return Ok(());
    }

    let mut lines = Vec::new();
    for record in records {
        let reason = record
            .reason
            .map(|r| format!(" — {}", r))
            .unwrap_or_default();
        lines.push(format!(
            "• `{}` <@{}> <t:{}:f>{}",
            record.reaction.as_str(),
            record.user_id,
            record.at.timestamp(),
            reason
        ));
    }

    ctx.say(format!(
        "**RSVP log for raid `#{}`:**\n{}",
        raid_id,
        lines.join("\n")
    ))
    .await?;
    Ok(())
}

/// Cancel a raid and remove its invite
#[poise::command(slash_command, guild_only)]
pub async fn cancel(
    ctx: Context<'_>,
    #[description = "Raid id"] raid_id: i64,
) -> Result<(), Error> {
    let removed = board::retire_raid(
        &ctx.serenity_context().http,
        &ctx.data().config,
        &ctx.data().db,
        raid_id,
    )
    .await?;

    match removed {
        Some(raid) => {
            info!(
                "Cancelled raid {} at {} (by user {})",
                raid.id,
                raid.scheduled_at,
                ctx.author().id
            );
            ctx.say(format!("✅ Raid `#{}` cancelled.", raid.id)).await?;
        }
        None => {
            ctx.say(format!("❌ No raid with id `{}` found.", raid_id))
                .await?;
        }
    }
    Ok(())
}

async fn record_rsvp(
    ctx: Context<'_>,
    raid_id: i64,
    kind: ReactionKind,
    reason: Option<String>,
) -> Result<(), Error> {
    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    if let Some(reason) = &reason {
        if reason.chars().count() > MAX_REASON_CHARS {
            ctx.say(format!(
                "❌ Reason is too long (max {} characters).",
                MAX_REASON_CHARS
            ))
            .await?;
            return Ok(());
        }
    }

    let service = RaidService::new(ctx.data().db.clone());
    let Some(raid) = service.get_raid(raid_id).await? else {
        ctx.say(format!("❌ No raid with id `{}` found.", raid_id))
            .await?;
        return Ok(());
    };

    service
        .record_reaction(
            raid.id,
            ctx.author().id.to_string(),
            Utc::now(),
            kind,
            reason,
        )
        .await?;
    info!(
        "Recorded {} from user {} for raid {}",
        kind.as_str(),
        ctx.author().id,
        raid.id
    );

    board::refresh_raid(
        &ctx.serenity_context().http,
        &ctx.data().config,
        &ctx.data().db,
        &raid,
    )
    .await?;

    ctx.say(format!(
        "✅ {} raid `#{}`.",
        match kind {
            ReactionKind::Accepted => "Accepted",
            ReactionKind::Delayed => "Delayed for",
            ReactionKind::Declined => "Declined",
            ReactionKind::Unknown => "Updated",
        },
        raid.id
    ))
    .await?;
    Ok(())
}

/// Parse a guild-local wall-clock time into UTC. Ambiguous local times
/// (DST fold) resolve to the earlier instant.
fn parse_guild_datetime(input: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input, DATETIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn parse_color(input: &str) -> Option<u32> {
    let trimmed = input.trim().trim_start_matches('#');
    if trimmed.len() != 6 {
        return None;
    }
    u32::from_str_radix(trimmed, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Berlin;

    #[test]
    fn test_parse_guild_datetime() {
        // Winter: Berlin is UTC+1.
        let parsed = parse_guild_datetime("2026-01-15 19:30", Berlin).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-15T18:30:00+00:00");

        // Summer: UTC+2.
        let parsed = parse_guild_datetime("2026-07-15 19:30", Berlin).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-07-15T17:30:00+00:00");

        assert!(parse_guild_datetime("19:30 2026-01-15", Berlin).is_none());
        assert!(parse_guild_datetime("tomorrow", Berlin).is_none());
        // 02:30 does not exist on the spring-forward night.
        assert!(parse_guild_datetime("2026-03-29 02:30", Berlin).is_none());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("ff7f00"), Some(0xFF7F00));
        assert_eq!(parse_color("#336699"), Some(0x336699));
        assert_eq!(parse_color("33669"), None);
        assert_eq!(parse_color("zzzzzz"), None);
    }
}
