//! The invite board: posting, refreshing and retiring raid invite messages
//! in the raid channel, plus the background refresh loop.
//!
//! All Discord I/O for the roster pipeline lives here; the pipeline itself
//! (`roster`, `render`) only ever sees plain inputs assembled by this module.

use crate::config::Config;
use crate::db::{Database, RaidRecord};
use crate::render::{self, RaidSummary};
use crate::roster::reaction::ReactionKind;
use crate::roster::{self, Member};
use crate::services::raid::RaidService;
use anyhow::Context as AnyhowContext;
use chrono::{Duration as ChronoDuration, Utc};
use serenity::all::{
    ChannelId, Context, CreateMessage, EditMessage, GuildId, MessageId, Reaction, ReactionType,
};
use serenity::http::Http;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

const ACCEPT_EMOJI: &str = "👍";
const DELAY_EMOJI: &str = "⏰";
const DECLINE_EMOJI: &str = "👎";

/// Emojis seeded onto every invite message, in display order.
const INVITE_EMOJIS: [&str; 3] = [ACCEPT_EMOJI, DELAY_EMOJI, DECLINE_EMOJI];

fn reaction_kind_of(emoji: &ReactionType) -> Option<ReactionKind> {
    let ReactionType::Unicode(name) = emoji else {
        return None;
    };
    match name.as_str() {
        ACCEPT_EMOJI => Some(ReactionKind::Accepted),
        DELAY_EMOJI => Some(ReactionKind::Delayed),
        DECLINE_EMOJI => Some(ReactionKind::Declined),
        _ => None,
    }
}

/// Snapshot the guild's membership into the plain view the roster builder
/// consumes: stable id, display name, role-tag names.
pub async fn membership_snapshot(http: &Http, guild_id: GuildId) -> anyhow::Result<Vec<Member>> {
    let roles = guild_id
        .roles(http)
        .await
        .context("fetching guild roles")?;
    let members = guild_id
        .members(http, None, None)
        .await
        .context("fetching guild members")?;

    Ok(members
        .iter()
        .map(|member| Member {
            user_id: member.user.id.to_string(),
            display_name: member.display_name().to_string(),
            role_tags: member
                .roles
                .iter()
                .filter_map(|role_id| roles.get(role_id).map(|role| role.name.clone()))
                .collect(),
        })
        .collect())
}

async fn summary_for(
    config: &Config,
    db: &Database,
    raid: &RaidRecord,
    members: &[Member],
) -> anyhow::Result<RaidSummary> {
    let service = RaidService::new(db.clone());
    let reactions = service.reactions(raid.id).await?;

    let known: HashSet<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    for record in &reactions {
        if !known.contains(record.user_id.as_str()) {
            debug!(
                "Skipping reaction from departed user {} on raid {}",
                record.user_id, raid.id
            );
        }
    }

    let roster = roster::build(members, &reactions, &config.raider_tags);
    Ok(render::render(raid, &roster, config.timezone))
}

/// Build the current summary for one raid, membership fetch included.
pub async fn raid_summary(
    http: &Http,
    config: &Config,
    db: &Database,
    raid: &RaidRecord,
) -> anyhow::Result<RaidSummary> {
    let members = membership_snapshot(http, GuildId::new(config.guild_id)).await?;
    summary_for(config, db, raid, &members).await
}

/// Post a fresh invite message for the raid, seed the RSVP reactions, and
/// remember the message id.
pub async fn publish_raid(
    http: &Http,
    config: &Config,
    db: &Database,
    raid: &RaidRecord,
) -> anyhow::Result<()> {
    let summary = raid_summary(http, config, db, raid).await?;
    let channel = ChannelId::new(config.raid_channel_id);
    let message = channel
        .send_message(http, CreateMessage::new().embed(render::to_embed(&summary)))
        .await
        .context("posting invite message")?;

    for emoji in INVITE_EMOJIS {
        message
            .react(http, ReactionType::Unicode(emoji.to_string()))
            .await?;
    }

    RaidService::new(db.clone())
        .set_message(raid.id, Some(message.id.to_string()))
        .await?;
    info!("Posted invite for raid {} as message {}", raid.id, message.id);
    Ok(())
}

/// Re-render the raid's invite embed in place; a raid that lost its message
/// gets a fresh one posted instead.
pub async fn refresh_raid(
    http: &Http,
    config: &Config,
    db: &Database,
    raid: &RaidRecord,
) -> anyhow::Result<()> {
    let members = membership_snapshot(http, GuildId::new(config.guild_id)).await?;
    refresh_with_members(http, config, db, raid, &members).await
}

async fn refresh_with_members(
    http: &Http,
    config: &Config,
    db: &Database,
    raid: &RaidRecord,
    members: &[Member],
) -> anyhow::Result<()> {
    let Some(message_id) = &raid.message_id else {
        return publish_raid(http, config, db, raid).await;
    };

    let message_id: u64 = message_id
        .parse()
        .with_context(|| format!("Invalid message id '{}' for raid {}", message_id, raid.id))?;
    let summary = summary_for(config, db, raid, members).await?;

    let edited = ChannelId::new(config.raid_channel_id)
        .edit_message(
            http,
            MessageId::new(message_id),
            EditMessage::new().embed(render::to_embed(&summary)),
        )
        .await;
    if let Err(e) = edited {
        // The invite is gone (deleted by hand). Forget the reference so the
        // next refresh posts a fresh one.
        RaidService::new(db.clone())
            .set_message(raid.id, None)
            .await?;
        return Err(anyhow::Error::new(e).context("editing invite message"));
    }
    Ok(())
}

/// Delete the raid, its reaction log, and its invite message.
pub async fn retire_raid(
    http: &Http,
    config: &Config,
    db: &Database,
    raid_id: i64,
) -> anyhow::Result<Option<RaidRecord>> {
    let Some(raid) = RaidService::new(db.clone()).delete_raid(raid_id).await? else {
        return Ok(None);
    };
    delete_invite(http, config, &raid).await;
    Ok(Some(raid))
}

async fn delete_invite(http: &Http, config: &Config, raid: &RaidRecord) {
    let Some(message_id) = &raid.message_id else {
        return;
    };
    let Ok(message_id) = message_id.parse::<u64>() else {
        return;
    };
    if let Err(e) = ChannelId::new(config.raid_channel_id)
        .delete_message(http, MessageId::new(message_id))
        .await
    {
        debug!("Could not delete invite message for raid {}: {}", raid.id, e);
    }
}

/// Gateway hook: a member reacted somewhere. Only the three RSVP emojis on
/// invite messages in the raid channel count; everything else is ignored.
pub async fn handle_reaction(
    ctx: &Context,
    data: &crate::Data,
    reaction: &Reaction,
) -> anyhow::Result<()> {
    if reaction.channel_id.get() != data.config.raid_channel_id {
        return Ok(());
    }
    let Some(user_id) = reaction.user_id else {
        return Ok(());
    };
    let me = ctx.cache.current_user().id;
    if user_id == me {
        // Our own seed reactions.
        return Ok(());
    }
    let Some(kind) = reaction_kind_of(&reaction.emoji) else {
        return Ok(());
    };

    let service = RaidService::new(data.db.clone());
    let Some(raid) = service
        .find_by_message(&reaction.message_id.to_string())
        .await?
    else {
        return Ok(());
    };

    service
        .record_reaction(raid.id, user_id.to_string(), Utc::now(), kind, None)
        .await?;
    info!(
        "Recorded {} from user {} for raid {}",
        kind.as_str(),
        user_id,
        raid.id
    );

    // Keep the invite clean: only the seed reactions stay visible.
    if let Err(e) = reaction.delete(&ctx.http).await {
        debug!("Could not remove RSVP reaction on raid {}: {}", raid.id, e);
    }

    refresh_raid(&ctx.http, &data.config, &data.db, &raid).await
}

/// Periodic maintenance: prune raids past the retention window, then
/// re-render every upcoming invite so membership and role changes surface
/// without waiting for a reaction.
pub struct BoardRefresher {
    db: Database,
    config: Config,
    http: Arc<Http>,
    poll_interval: Duration,
}

impl BoardRefresher {
    pub fn new(db: Database, config: Config, http: Arc<Http>) -> Self {
        let poll_interval = Duration::from_secs(config.refresh_interval_secs);
        Self {
            db,
            config,
            http,
            poll_interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_cycle().await {
                error!("Board refresh cycle failed: {}", e);
            }
        }
    }

    async fn refresh_cycle(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let service = RaidService::new(self.db.clone());

        let cutoff = now - ChronoDuration::days(self.config.retention_days);
        for raid in service.prune_before(cutoff).await? {
            delete_invite(&self.http, &self.config, &raid).await;
            debug!("Pruned raid {} scheduled at {}", raid.id, raid.scheduled_at);
        }

        let upcoming = service.upcoming_raids(now).await?;
        if upcoming.is_empty() {
            return Ok(());
        }

        let members =
            membership_snapshot(&self.http, GuildId::new(self.config.guild_id)).await?;
        for raid in upcoming {
            if let Err(e) =
                refresh_with_members(&self.http, &self.config, &self.db, &raid, &members).await
            {
                error!("Failed to refresh invite for raid {}: {}", raid.id, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsvp_emoji_mapping() {
        let unicode = |s: &str| ReactionType::Unicode(s.to_string());

        assert_eq!(reaction_kind_of(&unicode("👍")), Some(ReactionKind::Accepted));
        assert_eq!(reaction_kind_of(&unicode("⏰")), Some(ReactionKind::Delayed));
        assert_eq!(reaction_kind_of(&unicode("👎")), Some(ReactionKind::Declined));
        assert_eq!(reaction_kind_of(&unicode("🎉")), None);
    }
}
