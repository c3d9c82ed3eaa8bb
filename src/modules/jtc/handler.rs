use super::provisioner::{Provisioner, VoiceStateChange};
use crate::events::EventHandler;
use async_trait::async_trait;
use poise::serenity_prelude::{Context, FullEvent, VoiceState};

#[derive(Debug, Clone)]
pub struct JoinToCreateHandler {
    provisioner: Provisioner,
}

impl JoinToCreateHandler {
    pub fn new(provisioner: Provisioner) -> Self {
        Self { provisioner }
    }
}

fn voice_change(old: Option<&VoiceState>, new: &VoiceState) -> Option<VoiceStateChange> {
    let guild_id = new.guild_id.or_else(|| old.and_then(|state| state.guild_id))?;
    let display_name = new
        .member
        .as_ref()
        .map(|member| member.display_name().to_string())
        .unwrap_or_else(|| new.user_id.to_string());

    Some(VoiceStateChange {
        guild_id,
        member_id: new.user_id,
        display_name,
        previous_channel_id: old.and_then(|state| state.channel_id),
        new_channel_id: new.channel_id,
    })
}

#[async_trait]
impl EventHandler for JoinToCreateHandler {
    fn name(&self) -> &str {
        "JoinToCreate"
    }

    async fn handle(
        &self,
        _ctx: &Context,
        event: &FullEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event {
            FullEvent::VoiceStateUpdate { old, new } => {
                if let Some(change) = voice_change(old.as_ref(), new) {
                    self.provisioner.on_voice_state_changed(change).await;
                }
            }
            FullEvent::ChannelDelete { channel, .. } => {
                self.provisioner.forget(channel.id).await;
            }
            _ => {}
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn EventHandler> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::{ChannelId, GuildId, UserId};
    use serde_json::json;

    fn state(guild: Option<u64>, channel: Option<u64>) -> VoiceState {
        serde_json::from_value(json!({
            "guild_id": guild.map(|id| id.to_string()),
            "channel_id": channel.map(|id| id.to_string()),
            "user_id": "11",
            "session_id": "session",
            "deaf": false,
            "mute": false,
            "self_deaf": false,
            "self_mute": false,
            "self_video": false,
            "suppress": false,
            "request_to_speak_timestamp": null
        }))
        .unwrap()
    }

    #[test]
    fn join_without_previous_state() {
        let change = voice_change(None, &state(Some(1), Some(100))).unwrap();

        assert_eq!(change.guild_id, GuildId::new(1));
        assert_eq!(change.member_id, UserId::new(11));
        assert_eq!(change.previous_channel_id, None);
        assert_eq!(change.new_channel_id, Some(ChannelId::new(100)));
    }

    #[test]
    fn display_name_falls_back_to_user_id() {
        let change = voice_change(None, &state(Some(1), Some(100))).unwrap();
        assert_eq!(change.display_name, "11");
    }

    #[test]
    fn leave_takes_guild_from_previous_state() {
        let old = state(Some(1), Some(100));
        let change = voice_change(Some(&old), &state(None, None)).unwrap();

        assert_eq!(change.guild_id, GuildId::new(1));
        assert_eq!(change.previous_channel_id, Some(ChannelId::new(100)));
        assert_eq!(change.new_channel_id, None);
    }

    #[test]
    fn updates_outside_a_guild_are_dropped() {
        assert!(voice_change(None, &state(None, Some(100))).is_none());
    }
}
