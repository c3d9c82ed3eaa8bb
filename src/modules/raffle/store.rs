use crate::store::Store;
use chrono::{DateTime, TimeDelta, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum RaffleDuration {
    #[name = "1 hour"]
    OneHour,
    #[name = "2 hours"]
    TwoHours,
    #[name = "6 hours"]
    SixHours,
    #[name = "12 hours"]
    TwelveHours,
    #[name = "24 hours"]
    OneDay,
}

impl RaffleDuration {
    pub fn hours(self) -> i64 {
        match self {
            Self::OneHour => 1,
            Self::TwoHours => 2,
            Self::SixHours => 6,
            Self::TwelveHours => 12,
            Self::OneDay => 24,
        }
    }

    pub fn as_delta(self) -> TimeDelta {
        TimeDelta::hours(self.hours())
    }
}

/// Raffle names are unique per guild, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RaffleKey {
    pub guild_id: GuildId,
    pub name: String,
}

impl RaffleKey {
    pub fn new(guild_id: GuildId, name: &str) -> Self {
        Self {
            guild_id,
            name: normalize_name(name),
        }
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaffleStatus {
    Open,
    /// Winners are being drawn; entries and other draws are turned away.
    Drawing,
}

#[derive(Debug, Clone)]
pub struct RaffleState {
    pub guild_id: GuildId,
    pub name: String,
    pub prize: String,
    pub number_of_winners: u32,
    pub end_time: DateTime<Utc>,
    pub rules: Option<String>,
    pub entries: HashSet<UserId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub announcement_channel_id: ChannelId,
    pub announcement_message_id: Option<MessageId>,
    pub status: RaffleStatus,
}

/// Everything about a raffle except who entered.
#[derive(Debug, Clone, PartialEq)]
pub struct RaffleSummary {
    pub guild_id: GuildId,
    pub name: String,
    pub prize: String,
    pub number_of_winners: u32,
    pub end_time: DateTime<Utc>,
    pub rules: Option<String>,
    pub entry_count: usize,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub announcement_channel_id: ChannelId,
    pub announcement_message_id: Option<MessageId>,
}

impl RaffleState {
    pub fn summary(&self) -> RaffleSummary {
        RaffleSummary {
            guild_id: self.guild_id,
            name: self.name.clone(),
            prize: self.prize.clone(),
            number_of_winners: self.number_of_winners,
            end_time: self.end_time,
            rules: self.rules.clone(),
            entry_count: self.entries.len(),
            created_by: self.created_by,
            created_at: self.created_at,
            announcement_channel_id: self.announcement_channel_id,
            announcement_message_id: self.announcement_message_id,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }
}

#[derive(Debug, Default)]
pub struct RaffleTable {
    pub raffles: HashMap<RaffleKey, RaffleState>,
}

pub type RaffleStore = Store<RaffleTable>;
