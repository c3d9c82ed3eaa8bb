use crate::default_struct;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// A join-to-create template declared in the environment rather than through `/jtc setup`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateSeed {
    pub guild_id: u64,
    pub channel_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub private: bool,
}

default_struct! {
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String = String::new(),
    pub cleanup_delay: Duration = Duration::from_millis(1000),
    pub platform_timeout: Duration = Duration::from_secs(5),
    pub jtc_templates: Vec<TemplateSeed>,
    pub jtc_lobby_channel: Option<u64>,
    pub jtc_restricted_role: Option<u64>,
}
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config {
            discord_token: lookup("DISCORD_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            ..Default::default()
        };

        if let Some(ms) = parse_u64(&lookup, "JTC_CLEANUP_DELAY_MS")? {
            config.cleanup_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, "PLATFORM_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "PLATFORM_TIMEOUT_SECS",
                    reason: "must be at least 1".into(),
                });
            }
            config.platform_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("JTC_TEMPLATES").filter(|raw| !raw.trim().is_empty()) {
            config.jtc_templates =
                serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                    key: "JTC_TEMPLATES",
                    reason: e.to_string(),
                })?;
            if let Some(seed) = config
                .jtc_templates
                .iter()
                .find(|seed| seed.guild_id == 0 || seed.channel_id == 0)
            {
                return Err(ConfigError::Invalid {
                    key: "JTC_TEMPLATES",
                    reason: format!(
                        "ids must be non-zero (guild {}, channel {})",
                        seed.guild_id, seed.channel_id
                    ),
                });
            }
        }
        config.jtc_lobby_channel = parse_id(&lookup, "JTC_LOBBY_CHANNEL_ID")?;
        config.jtc_restricted_role = parse_id(&lookup, "JTC_RESTRICTED_ROLE_ID")?;

        Ok(config)
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(key)
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Discord snowflakes are never zero.
fn parse_id(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match parse_u64(lookup, key)? {
        Some(0) => Err(ConfigError::Invalid {
            key,
            reason: "ids must be non-zero".into(),
        }),
        id => Ok(id),
    }
}
