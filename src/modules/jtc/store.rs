use crate::store::Store;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateChannelConfig {
    pub guild_id: GuildId,
    pub template_channel_id: ChannelId,
    pub name: String,
    pub is_private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimState {
    Active,
    /// A delete call is in flight; further emptiness checks leave it alone.
    Reclaiming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedChannel {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub owner_id: UserId,
    pub parent_template_id: ChannelId,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub state: ReclaimState,
}

#[derive(Debug, Default)]
pub struct ProvisionerTable {
    pub templates: HashMap<ChannelId, TemplateChannelConfig>,
    pub channels: HashMap<ChannelId, ProvisionedChannel>,
}

pub type ProvisionerStore = Store<ProvisionerTable>;

impl ProvisionerTable {
    pub fn template_for(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<&TemplateChannelConfig> {
        self.templates
            .get(&channel_id)
            .filter(|template| template.guild_id == guild_id)
    }

    /// Moves an active entry to [`ReclaimState::Reclaiming`]; `false` if it was not active.
    pub fn claim(&mut self, channel_id: ChannelId) -> bool {
        match self.channels.get_mut(&channel_id) {
            Some(channel) if channel.state == ReclaimState::Active => {
                channel.state = ReclaimState::Reclaiming;
                true
            }
            _ => false,
        }
    }

    pub fn release(&mut self, channel_id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(&channel_id) {
            channel.state = ReclaimState::Active;
        }
    }
}
