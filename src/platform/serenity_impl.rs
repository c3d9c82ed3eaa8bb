use super::{NewVoiceChannel, Notice, Platform, PlatformError, TemplateInfo};
use async_trait::async_trait;
use poise::serenity_prelude::{
    self as serenity, Cache, ChannelId, ChannelType, CreateChannel, CreateEmbed, CreateMessage,
    GuildId, Http, Mentionable, PermissionOverwrite, RoleId, Timestamp, UserId,
};
use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};
use tokio::time::timeout;

pub const NOTICE_COLOUR: u32 = 0x6E8878;

/// [`Platform`] backed by the live gateway cache and REST client.
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    timeout: Duration,
}

impl std::fmt::Debug for SerenityPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityPlatform")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SerenityPlatform {
    pub fn new(ctx: &serenity::Context, timeout: Duration) -> Self {
        Self {
            http: Arc::clone(&ctx.http),
            cache: Arc::clone(&ctx.cache),
            timeout,
        }
    }

    fn cache_http(&self) -> (&Arc<Cache>, &Http) {
        (&self.cache, &self.http)
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = serenity::Result<T>> + Send,
    ) -> Result<T, PlatformError> {
        match timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PlatformError::Timeout),
        }
    }

    fn build_message(notice: &Notice) -> CreateMessage {
        let embed = CreateEmbed::new()
            .title(&notice.title)
            .description(&notice.body)
            .colour(NOTICE_COLOUR)
            .timestamp(Timestamp::now());

        let message = CreateMessage::new().embed(embed);
        match notice.mention {
            Some(user_id) => message.content(user_id.mention().to_string()),
            None => message,
        }
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn template_info(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<TemplateInfo, PlatformError> {
        let cached = self.cache.guild(guild_id).and_then(|guild| {
            guild.channels.get(&channel_id).map(|channel| TemplateInfo {
                parent_id: channel.parent_id,
                user_limit: channel.user_limit,
                bitrate: channel.bitrate,
            })
        });
        if let Some(info) = cached {
            return Ok(info);
        }

        let channel = self
            .bounded(self.http.get_channel(channel_id))
            .await?
            .guild()
            .ok_or_else(|| PlatformError::Unavailable(format!("{} is not a guild channel", channel_id)))?;

        Ok(TemplateInfo {
            parent_id: channel.parent_id,
            user_limit: channel.user_limit,
            bitrate: channel.bitrate,
        })
    }

    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        channel: &NewVoiceChannel,
    ) -> Result<ChannelId, PlatformError> {
        let mut builder = CreateChannel::new(channel.name.clone())
            .kind(ChannelType::Voice)
            .permissions(channel.permission_overwrites.clone())
            .audit_log_reason("Join-to-create channel created");
        if let Some(parent_id) = channel.parent_id {
            builder = builder.category(parent_id);
        }
        if let Some(limit) = channel.user_limit.filter(|limit| *limit > 0) {
            builder = builder.user_limit(limit);
        }
        if let Some(bitrate) = channel.bitrate {
            builder = builder.bitrate(bitrate);
        }

        let created = self
            .bounded(guild_id.create_channel(self.http.as_ref(), builder))
            .await?;
        Ok(created.id)
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        self.bounded(channel_id.delete(self.http.as_ref())).await?;
        Ok(())
    }

    async fn set_permission(
        &self,
        channel_id: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> Result<(), PlatformError> {
        self.bounded(channel_id.create_permission(self.http.as_ref(), overwrite))
            .await
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<(), PlatformError> {
        self.bounded(guild_id.move_member(self.http.as_ref(), user_id, channel_id))
            .await?;
        Ok(())
    }

    async fn list_members(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<HashSet<UserId>, PlatformError> {
        let guild = self
            .cache
            .guild(guild_id)
            .ok_or_else(|| PlatformError::Unavailable(format!("guild {} is not cached", guild_id)))?;

        Ok(guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .map(|state| state.user_id)
            .collect())
    }

    async fn elevated_roles(&self, guild_id: GuildId) -> Result<Vec<RoleId>, PlatformError> {
        let guild = self
            .cache
            .guild(guild_id)
            .ok_or_else(|| PlatformError::Unavailable(format!("guild {} is not cached", guild_id)))?;
        let everyone = guild_id.everyone_role();

        Ok(guild
            .roles
            .values()
            .filter(|role| role.id != everyone)
            .filter(|role| {
                role.permissions.administrator()
                    || role.permissions.manage_guild()
                    || role.permissions.manage_channels()
            })
            .map(|role| role.id)
            .collect())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        notice: &Notice,
    ) -> Result<(), PlatformError> {
        self.bounded(channel_id.send_message(self.http.as_ref(), Self::build_message(notice)))
            .await?;
        Ok(())
    }

    async fn direct_message(&self, user_id: UserId, notice: &Notice) -> Result<(), PlatformError> {
        self.bounded(user_id.direct_message(self.cache_http(), Self::build_message(notice)))
            .await?;
        Ok(())
    }

    async fn is_service_account(&self, user_id: UserId) -> Result<bool, PlatformError> {
        let user = self.bounded(user_id.to_user(self.cache_http())).await?;
        Ok(user.bot)
    }

    async fn has_elevated_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<bool, PlatformError> {
        let member = self
            .bounded(guild_id.member(self.cache_http(), user_id))
            .await?;

        let guild = self
            .cache
            .guild(guild_id)
            .ok_or_else(|| PlatformError::Unavailable(format!("guild {} is not cached", guild_id)))?;
        let permissions = guild.member_permissions(&member);

        Ok(permissions.administrator() || permissions.manage_guild())
    }
}
