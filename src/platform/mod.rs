//! The seam between the bot's state machines and Discord.
//!
//! Managers only talk to the platform through [`Platform`], which keeps them
//! testable against an in-memory double and keeps every gateway/HTTP call in
//! one place where it can be time-bounded.

use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, ChannelId, GuildId, PermissionOverwrite, RoleId, UserId};
use std::collections::HashSet;
use thiserror::Error;

#[cfg(test)]
pub mod fake;
pub mod serenity_impl;

pub use serenity_impl::SerenityPlatform;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Discord error: {0}")]
    Http(#[from] serenity::Error),
    #[error("Platform call timed out")]
    Timeout,
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Layout details copied from a template channel onto the channels it spawns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateInfo {
    pub parent_id: Option<ChannelId>,
    pub user_limit: Option<u32>,
    pub bitrate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVoiceChannel {
    pub name: String,
    pub parent_id: Option<ChannelId>,
    pub user_limit: Option<u32>,
    pub bitrate: Option<u32>,
    /// Applied atomically with creation.
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

/// A short embed-style message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub mention: Option<UserId>,
}

#[async_trait]
pub trait Platform: Send + Sync + std::fmt::Debug {
    async fn template_info(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<TemplateInfo, PlatformError>;

    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        channel: &NewVoiceChannel,
    ) -> Result<ChannelId, PlatformError>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError>;

    async fn set_permission(
        &self,
        channel_id: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> Result<(), PlatformError>;

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<(), PlatformError>;

    async fn list_members(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<HashSet<UserId>, PlatformError>;

    /// Roles carrying administrator, manage guild or manage channels, excluding `@everyone`.
    async fn elevated_roles(&self, guild_id: GuildId) -> Result<Vec<RoleId>, PlatformError>;

    async fn send_message(&self, channel_id: ChannelId, notice: &Notice)
        -> Result<(), PlatformError>;

    async fn direct_message(&self, user_id: UserId, notice: &Notice) -> Result<(), PlatformError>;

    async fn is_service_account(&self, user_id: UserId) -> Result<bool, PlatformError>;

    async fn has_elevated_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<bool, PlatformError>;
}
