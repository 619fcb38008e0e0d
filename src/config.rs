use chrono_tz::Tz;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub guild_id: u64,
    pub raid_channel_id: u64,
    pub database_url: String,
    /// Role tags that make a member part of the raiding squad.
    pub raider_tags: Vec<String>,
    /// Timezone raid times are entered and displayed in.
    pub timezone: Tz,
    pub refresh_interval_secs: u64,
    /// Raids older than this are pruned by the board refresher.
    pub retention_days: i64,
    pub status_message: String,
}

const DEFAULT_RAIDER_TAGS: &[&str] = &["Mainraider", "Testraider"];

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            guild_id: env::var("GUILD_ID")
                .map_err(|_| anyhow::anyhow!("GUILD_ID must be set"))?
                .parse()
                .map_err(|_| anyhow::anyhow!("GUILD_ID must be a valid u64"))?,
            raid_channel_id: env::var("RAID_CHANNEL_ID")
                .map_err(|_| anyhow::anyhow!("RAID_CHANNEL_ID must be set"))?
                .parse()
                .map_err(|_| anyhow::anyhow!("RAID_CHANNEL_ID must be a valid u64"))?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/raidcord.db".to_string()),
            raider_tags: env::var("RAIDER_TAGS")
                .map(|raw| {
                    raw.split(',')
                        .map(|tag| tag.trim().to_string())
                        .filter(|tag| !tag.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    DEFAULT_RAIDER_TAGS.iter().map(|t| t.to_string()).collect()
                }),
            timezone: env::var("GUILD_TIMEZONE")
                .unwrap_or_else(|_| "Europe/Berlin".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GUILD_TIMEZONE must be a valid IANA timezone"))?,
            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            retention_days: env::var("RAID_RETENTION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Tracking raid signups".to_string()),
        })
    }

    /// Configuration backed by an in-memory database, for tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Config {
            discord_token: "test".to_string(),
            guild_id: 1,
            raid_channel_id: 2,
            database_url: ":memory:".to_string(),
            raider_tags: DEFAULT_RAIDER_TAGS.iter().map(|t| t.to_string()).collect(),
            timezone: chrono_tz::Europe::Berlin,
            refresh_interval_secs: 300,
            retention_days: 7,
            status_message: "test".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("guild_id", &self.guild_id)
            .field("raid_channel_id", &self.raid_channel_id)
            .field("database_url", &self.database_url)
            .field("raider_tags", &self.raider_tags)
            .field("timezone", &self.timezone)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("retention_days", &self.retention_days)
            .field("status_message", &self.status_message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Test missing vars
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("GUILD_ID");
        env::remove_var("RAID_CHANNEL_ID");
        let result = Config::build();
        assert!(result.is_err(), "Should fail when required vars are missing");

        // 2. Test defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        env::set_var("GUILD_ID", "12345");
        env::set_var("RAID_CHANNEL_ID", "67890");
        let config = Config::build().unwrap();
        assert_eq!(config.guild_id, 12345);
        assert_eq!(config.raid_channel_id, 67890);
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.raider_tags, vec!["Mainraider", "Testraider"]);
        assert_eq!(config.retention_days, 7);

        // 3. Test overrides
        env::set_var("RAIDER_TAGS", "Raider, Trial ,");
        env::set_var("GUILD_TIMEZONE", "Europe/Warsaw");
        let config = Config::build().unwrap();
        assert_eq!(config.raider_tags, vec!["Raider", "Trial"]);
        assert_eq!(config.timezone, chrono_tz::Europe::Warsaw);

        // 4. Test debug redaction
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("test_token"));
        assert!(debug_output.contains("[REDACTED]"));

        // 5. Bad timezone is an error, not a silent default
        env::set_var("GUILD_TIMEZONE", "Atlantis/Underwater");
        assert!(Config::build().is_err());

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("GUILD_ID");
        env::remove_var("RAID_CHANNEL_ID");
        env::remove_var("RAIDER_TAGS");
        env::remove_var("GUILD_TIMEZONE");
    }
}
