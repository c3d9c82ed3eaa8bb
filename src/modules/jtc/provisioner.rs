use super::policy;
use super::store::{
    ProvisionedChannel, ProvisionerStore, ReclaimState, TemplateChannelConfig,
};
use crate::config::TemplateSeed;
use crate::platform::{NewVoiceChannel, Notice, Platform, PlatformError};
use crate::tasks::TaskManager;
use chrono::Utc;
use poise::serenity_prelude::{ChannelId, GuildId, PermissionOverwrite, RoleId, UserId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const MAX_CHANNEL_NAME: usize = 100;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Template lookup failed: {0}")]
    TemplateLookupFailed(#[source] PlatformError),
    #[error("Channel creation failed: {0}")]
    ChannelCreationFailed(#[source] PlatformError),
    #[error("Permission grant failed: {0}")]
    PermissionGrantFailed(#[source] PlatformError),
    #[error("Moving member failed: {0}")]
    MoveFailed(#[source] PlatformError),
    #[error("Membership lookup failed: {0}")]
    MembershipLookupFailed(#[source] PlatformError),
    #[error("Channel deletion failed: {0}")]
    DeletionFailed(#[source] PlatformError),
    #[error("Owner notification failed: {0}")]
    NotificationFailed(#[source] PlatformError),
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionerSettings {
    pub cleanup_delay: Duration,
    pub lobby_channel: Option<ChannelId>,
    pub restricted_role: Option<RoleId>,
}

/// One member's voice presence moving between channels.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceStateChange {
    pub guild_id: GuildId,
    pub member_id: UserId,
    pub display_name: String,
    pub previous_channel_id: Option<ChannelId>,
    pub new_channel_id: Option<ChannelId>,
}

/// Join-to-create lifecycle: spawns a channel when a template is joined and
/// reclaims it once it empties.
#[derive(Debug, Clone)]
pub struct Provisioner {
    store: ProvisionerStore,
    platform: Arc<dyn Platform>,
    tasks: Arc<TaskManager>,
    settings: ProvisionerSettings,
}

pub fn channel_name(display_name: &str) -> String {
    format!("{}'s Channel", display_name.trim())
        .chars()
        .take(MAX_CHANNEL_NAME)
        .collect()
}

impl Provisioner {
    pub fn new(
        platform: Arc<dyn Platform>,
        tasks: Arc<TaskManager>,
        settings: ProvisionerSettings,
    ) -> Self {
        Self {
            store: ProvisionerStore::default(),
            platform,
            tasks,
            settings,
        }
    }

    pub async fn seed(&self, seeds: &[TemplateSeed]) {
        for seed in seeds {
            let template = TemplateChannelConfig {
                guild_id: GuildId::new(seed.guild_id),
                template_channel_id: ChannelId::new(seed.channel_id),
                name: seed
                    .name
                    .clone()
                    .unwrap_or_else(|| seed.channel_id.to_string()),
                is_private: seed.private,
            };
            info!(
                "Pre-configured join-to-create channel {} ({}) - {}",
                template.name,
                template.template_channel_id,
                if template.is_private { "private" } else { "public" }
            );
            self.configure_template(template).await;
        }
    }

    pub async fn configure_template(
        &self,
        template: TemplateChannelConfig,
    ) -> Option<TemplateChannelConfig> {
        self.store
            .write(|table| table.templates.insert(template.template_channel_id, template))
            .await
    }

    pub async fn remove_template(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        self.store
            .write(|table| {
                if table.template_for(guild_id, channel_id).is_some() {
                    table.templates.remove(&channel_id).is_some()
                } else {
                    false
                }
            })
            .await
    }

    /// Drops every record of a channel the platform reports as deleted.
    pub async fn forget(&self, channel_id: ChannelId) -> bool {
        let (template, provisioned) = self
            .store
            .write(|table| {
                (
                    table.templates.remove(&channel_id).is_some(),
                    table.channels.remove(&channel_id).is_some(),
                )
            })
            .await;
        if template {
            info!("Template channel {} deleted, join-to-create disabled", channel_id);
        }
        if provisioned {
            debug!("Provisioned channel {} deleted externally", channel_id);
        }
        template || provisioned
    }

    #[cfg(test)]
    pub async fn template(&self, channel_id: ChannelId) -> Option<TemplateChannelConfig> {
        self.store
            .read(|table| table.templates.get(&channel_id).cloned())
            .await
    }

    pub async fn templates_in(&self, guild_id: GuildId) -> Vec<TemplateChannelConfig> {
        let mut templates: Vec<_> = self
            .store
            .read(|table| {
                table
                    .templates
                    .values()
                    .filter(|template| template.guild_id == guild_id)
                    .cloned()
                    .collect()
            })
            .await;
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub async fn provisioned(&self, channel_id: ChannelId) -> Option<ProvisionedChannel> {
        self.store
            .read(|table| table.channels.get(&channel_id).cloned())
            .await
    }

    pub async fn provisioned_in(&self, guild_id: GuildId) -> Vec<ProvisionedChannel> {
        let mut channels: Vec<_> = self
            .store
            .read(|table| {
                table
                    .channels
                    .values()
                    .filter(|channel| channel.guild_id == guild_id)
                    .cloned()
                    .collect()
            })
            .await;
        channels.sort_by_key(|channel| channel.created_at);
        channels
    }

    pub async fn is_provisioned(&self, channel_id: ChannelId) -> bool {
        self.store
            .read(|table| table.channels.contains_key(&channel_id))
            .await
    }

    #[cfg(test)]
    pub async fn owner_of(&self, channel_id: ChannelId) -> Option<UserId> {
        self.store
            .read(|table| table.channels.get(&channel_id).map(|c| c.owner_id))
            .await
    }

    #[cfg(test)]
    pub async fn is_private(&self, channel_id: ChannelId) -> Option<bool> {
        self.store
            .read(|table| table.channels.get(&channel_id).map(|c| c.is_private))
            .await
    }

    pub async fn on_voice_state_changed(&self, change: VoiceStateChange) {
        // Mute, deafen and stream toggles arrive as updates within one channel.
        if change.previous_channel_id == change.new_channel_id {
            return;
        }

        if let Some(new_channel) = change.new_channel_id {
            let template = self
                .store
                .read(|table| table.template_for(change.guild_id, new_channel).cloned())
                .await;

            if let Some(template) = template {
                if let Err(e) = self.provision(&change, &template).await {
                    error!(
                        "Failed to create join-to-create channel for {} from {}: {}",
                        change.member_id, template.name, e
                    );
                }
            } else if let Some(channel) = self.provisioned(new_channel).await {
                if channel.is_private && channel.owner_id != change.member_id {
                    self.admit_invitee(&channel, change.member_id).await;
                }
            }
        }

        if let Some(previous) = change.previous_channel_id {
            if self.is_provisioned(previous).await {
                self.schedule_cleanup(previous);
            }
        }
    }

    async fn provision(
        &self,
        change: &VoiceStateChange,
        template: &TemplateChannelConfig,
    ) -> Result<ChannelId, ProvisionError> {
        let info = self
            .platform
            .template_info(change.guild_id, template.template_channel_id)
            .await
            .map_err(ProvisionError::TemplateLookupFailed)?;

        let elevated_roles = if template.is_private {
            self.platform
                .elevated_roles(change.guild_id)
                .await
                .map_err(ProvisionError::TemplateLookupFailed)?
        } else {
            Vec::new()
        };

        let overwrites = policy::channel_overwrites(
            change.guild_id,
            change.member_id,
            template.is_private,
            &elevated_roles,
            self.settings.restricted_role,
        );
        let request = NewVoiceChannel {
            name: channel_name(&change.display_name),
            parent_id: info.parent_id,
            user_limit: info.user_limit,
            bitrate: info.bitrate,
            permission_overwrites: overwrites.clone(),
        };
        let channel_id = self
            .platform
            .create_voice_channel(change.guild_id, &request)
            .await
            .map_err(ProvisionError::ChannelCreationFailed)?;

        self.store
            .write(|table| {
                table.channels.insert(
                    channel_id,
                    ProvisionedChannel {
                        channel_id,
                        guild_id: change.guild_id,
                        owner_id: change.member_id,
                        parent_template_id: template.template_channel_id,
                        is_private: template.is_private,
                        created_at: Utc::now(),
                        state: ReclaimState::Active,
                    },
                )
            })
            .await;

        // Re-applied in case the platform dropped any overwrite sent at creation.
        for overwrite in overwrites {
            if let Err(e) = self.grant(channel_id, overwrite).await {
                warn!("Channel {} is missing an overwrite: {}", channel_id, e);
            }
        }

        if let Err(e) = self
            .platform
            .move_member(change.guild_id, change.member_id, channel_id)
            .await
        {
            warn!(
                "Created {} but could not move {} into it: {}",
                channel_id,
                change.member_id,
                ProvisionError::MoveFailed(e)
            );
            self.schedule_cleanup(channel_id);
        }

        if template.is_private {
            if let Err(e) = self.notify_owner(change, channel_id).await {
                error!("Could not send private channel notice to {}: {}", change.member_id, e);
            }
        }

        info!(
            "Created {} join-to-create channel \"{}\" ({}) for {}",
            if template.is_private { "private" } else { "public" },
            request.name,
            channel_id,
            change.member_id
        );
        Ok(channel_id)
    }

    /// Applies an overwrite, re-attempting once before giving up.
    async fn grant(
        &self,
        channel_id: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> Result<(), ProvisionError> {
        match self.platform.set_permission(channel_id, overwrite.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Retrying overwrite on {} after: {}", channel_id, e);
                self.platform
                    .set_permission(channel_id, overwrite)
                    .await
                    .map_err(ProvisionError::PermissionGrantFailed)
            }
        }
    }

    async fn admit_invitee(&self, channel: &ProvisionedChannel, member_id: UserId) {
        let overwrite = policy::member(member_id, policy::invitee());
        match self.platform.set_permission(channel.channel_id, overwrite).await {
            Ok(()) => info!(
                "Granted {} access to private channel {}",
                member_id, channel.channel_id
            ),
            Err(e) => error!(
                "Failed to grant {} access to {}: {}",
                member_id,
                channel.channel_id,
                ProvisionError::PermissionGrantFailed(e)
            ),
        }
    }

    fn private_notice(&self, change: &VoiceStateChange) -> Notice {
        let lobby = self
            .settings
            .lobby_channel
            .map(|id| format!("<#{}>", id))
            .unwrap_or_else(|| "the lobby".to_string());

        Notice {
            title: "🔒 Private Voice Channel Created".to_string(),
            body: format!(
                "Welcome to your private voice channel, {}!\n\n\
                 **How to invite others:**\n\
                 • Drag members from {} into this channel\n\
                 • Or ask a moderator to move members here\n\n\
                 *Note: Admins and moderators can always see and join this channel.*",
                change.display_name, lobby
            ),
            mention: Some(change.member_id),
        }
    }

    async fn notify_owner(
        &self,
        change: &VoiceStateChange,
        channel_id: ChannelId,
    ) -> Result<(), ProvisionError> {
        let notice = self.private_notice(change);
        match self.platform.send_message(channel_id, &notice).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    "Could not post notice in {}, falling back to DM: {}",
                    channel_id, e
                );
                let dm = Notice {
                    mention: None,
                    ..notice
                };
                self.platform
                    .direct_message(change.member_id, &dm)
                    .await
                    .map_err(ProvisionError::NotificationFailed)
            }
        }
    }

    pub fn schedule_cleanup(&self, channel_id: ChannelId) {
        let provisioner = self.clone();
        self.tasks.schedule_once(
            channel_id.get(),
            self.settings.cleanup_delay,
            move || async move {
                if let Err(e) = provisioner.reclaim_if_empty(channel_id).await {
                    error!("Failed to clean up join-to-create channel {}: {}", channel_id, e);
                }
            },
        );
    }

    /// Deletes the channel if nobody is in it right now. Returns whether it was deleted.
    pub async fn reclaim_if_empty(&self, channel_id: ChannelId) -> Result<bool, ProvisionError> {
        let guild_id = self
            .store
            .read(|table| {
                table
                    .channels
                    .get(&channel_id)
                    .filter(|channel| channel.state == ReclaimState::Active)
                    .map(|channel| channel.guild_id)
            })
            .await;
        let Some(guild_id) = guild_id else {
            return Ok(false);
        };

        let members = self
            .platform
            .list_members(guild_id, channel_id)
            .await
            .map_err(ProvisionError::MembershipLookupFailed)?;
        if !members.is_empty() {
            debug!(
                "Channel {} still has {} member(s), keeping it",
                channel_id,
                members.len()
            );
            return Ok(false);
        }

        if !self.store.write(|table| table.claim(channel_id)).await {
            return Ok(false);
        }

        match self.platform.delete_channel(channel_id).await {
            Ok(()) => {
                self.store
                    .write(|table| table.channels.remove(&channel_id))
                    .await;
                info!("Deleted empty join-to-create channel {}", channel_id);
                Ok(true)
            }
            Err(e) => {
                self.store.write(|table| table.release(channel_id)).await;
                Err(ProvisionError::DeletionFailed(e))
            }
        }
    }
}
