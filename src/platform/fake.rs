//! Recording in-memory [`Platform`] used by unit tests.

use super::{NewVoiceChannel, Notice, Platform, PlatformError, TemplateInfo};
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, PermissionOverwrite, RoleId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(GuildId, NewVoiceChannel),
    Delete(ChannelId),
    Move(UserId, ChannelId),
    Send(ChannelId, Notice),
    Dm(UserId, Notice),
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub next_channel: u64,
    pub calls: Vec<Call>,
    pub overwrites: Vec<(ChannelId, PermissionOverwrite)>,
    pub members: HashMap<ChannelId, HashSet<UserId>>,
    pub elevated_roles: Vec<RoleId>,
    pub admins: HashSet<UserId>,
    pub bots: HashSet<UserId>,
    pub unknown_users: HashSet<UserId>,
    pub fail_template: bool,
    pub fail_roles: bool,
    pub fail_create: bool,
    pub fail_move: bool,
    pub fail_send: bool,
    pub fail_dm: bool,
    /// Number of upcoming `delete_channel` calls that fail.
    pub fail_deletes: usize,
    /// Number of upcoming `set_permission` calls that fail.
    pub fail_grants: usize,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    pub state: Mutex<FakeState>,
}

fn rejected(what: &str) -> PlatformError {
    PlatformError::Unavailable(format!("{} rejected", what))
}

impl FakePlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.with(|s| s.next_channel = 9000);
        platform
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn deletes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Delete(_)))
            .count()
    }

    pub fn overwrites_for(&self, channel_id: ChannelId) -> Vec<PermissionOverwrite> {
        self.with(|s| {
            s.overwrites
                .iter()
                .filter(|(id, _)| *id == channel_id)
                .map(|(_, overwrite)| overwrite.clone())
                .collect()
        })
    }

    pub fn set_members(&self, channel_id: ChannelId, members: &[u64]) {
        self.with(|s| {
            s.members
                .insert(channel_id, members.iter().map(|id| UserId::new(*id)).collect());
        });
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn template_info(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<TemplateInfo, PlatformError> {
        self.with(|s| {
            if s.fail_template {
                return Err(rejected("template lookup"));
            }
            Ok(TemplateInfo {
                parent_id: Some(ChannelId::new(500)),
                user_limit: Some(0),
                bitrate: Some(64_000),
            })
        })
    }

    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        channel: &NewVoiceChannel,
    ) -> Result<ChannelId, PlatformError> {
        self.with(|s| {
            if s.fail_create {
                return Err(rejected("create"));
            }
            s.next_channel += 1;
            s.calls.push(Call::Create(guild_id, channel.clone()));
            Ok(ChannelId::new(s.next_channel))
        })
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        self.with(|s| {
            s.calls.push(Call::Delete(channel_id));
            if s.fail_deletes > 0 {
                s.fail_deletes -= 1;
                return Err(rejected("delete"));
            }
            s.members.remove(&channel_id);
            Ok(())
        })
    }

    async fn set_permission(
        &self,
        channel_id: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> Result<(), PlatformError> {
        self.with(|s| {
            if s.fail_grants > 0 {
                s.fail_grants -= 1;
                return Err(rejected("grant"));
            }
            s.overwrites.push((channel_id, overwrite));
            Ok(())
        })
    }

    async fn move_member(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<(), PlatformError> {
        self.with(|s| {
            s.calls.push(Call::Move(user_id, channel_id));
            if s.fail_move {
                return Err(rejected("move"));
            }
            for members in s.members.values_mut() {
                members.remove(&user_id);
            }
            s.members.entry(channel_id).or_default().insert(user_id);
            Ok(())
        })
    }

    async fn list_members(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<HashSet<UserId>, PlatformError> {
        Ok(self.with(|s| s.members.get(&channel_id).cloned().unwrap_or_default()))
    }

    async fn elevated_roles(&self, _guild_id: GuildId) -> Result<Vec<RoleId>, PlatformError> {
        self.with(|s| {
            if s.fail_roles {
                return Err(rejected("roles"));
            }
            Ok(s.elevated_roles.clone())
        })
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        notice: &Notice,
    ) -> Result<(), PlatformError> {
        self.with(|s| {
            if s.fail_send {
                return Err(rejected("send"));
            }
            s.calls.push(Call::Send(channel_id, notice.clone()));
            Ok(())
        })
    }

    async fn direct_message(&self, user_id: UserId, notice: &Notice) -> Result<(), PlatformError> {
        self.with(|s| {
            if s.fail_dm {
                return Err(rejected("dm"));
            }
            s.calls.push(Call::Dm(user_id, notice.clone()));
            Ok(())
        })
    }

    async fn is_service_account(&self, user_id: UserId) -> Result<bool, PlatformError> {
        self.with(|s| {
            if s.unknown_users.contains(&user_id) {
                return Err(rejected("user lookup"));
            }
            Ok(s.bots.contains(&user_id))
        })
    }

    async fn has_elevated_role(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
    ) -> Result<bool, PlatformError> {
        Ok(self.with(|s| s.admins.contains(&user_id)))
    }
}
