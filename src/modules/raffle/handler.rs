use super::announce::{
    announcement_embed, closed_buttons, ended_embed, winners_content, winners_embed,
    RaffleAction,
};
use super::engine::{EntryOutcome, RaffleEngine, RaffleError};
use super::store::RaffleSummary;
use crate::events::EventHandler;
use async_trait::async_trait;
use poise::serenity_prelude::{
    ComponentInteraction, Context, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, EditInteractionResponse, EditMessage, FullEvent, GuildId,
    Http,
};
use tracing::{error, warn};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Handles the Enter and Pick buttons on raffle announcements.
#[derive(Debug, Clone)]
pub struct RaffleButtonHandler {
    engine: RaffleEngine,
}

impl RaffleButtonHandler {
    pub fn new(engine: RaffleEngine) -> Self {
        Self { engine }
    }

    async fn enter(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        guild_id: GuildId,
        name: &str,
    ) -> HandlerResult {
        if component.user.bot {
            return reply(ctx, component, "Bots cannot enter raffles.").await;
        }

        match self.engine.enter(guild_id, name, component.user.id).await {
            Ok(EntryOutcome::Entered(summary)) => {
                reply(
                    ctx,
                    component,
                    &format!("✅ You've entered **{}**! Good luck!", summary.name),
                )
                .await?;
                if let Err(e) = component
                    .channel_id
                    .edit_message(
                        &ctx.http,
                        component.message.id,
                        EditMessage::new().embed(announcement_embed(&summary)),
                    )
                    .await
                {
                    warn!("Failed to refresh raffle announcement: {}", e);
                }
                Ok(())
            }
            Ok(EntryOutcome::AlreadyEntered(_)) => {
                reply(ctx, component, "You are already entered in this raffle!").await
            }
            Err(e) => reply_error(ctx, component, &e).await,
        }
    }

    async fn pick(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        guild_id: GuildId,
        name: &str,
    ) -> HandlerResult {
        // Classifying entrants can outlast the interaction deadline.
        component.defer(&ctx.http).await?;

        let result = match self
            .engine
            .pick_winners(guild_id, name, component.user.id)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                log_platform_error(&e);
                component
                    .create_followup(
                        &ctx.http,
                        CreateInteractionResponseFollowup::new()
                            .content(format!("❌ {}", e.user_message()))
                            .ephemeral(true),
                    )
                    .await?;
                return Ok(());
            }
        };

        component
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new()
                    .embed(ended_embed(&result.raffle, "This raffle has ended."))
                    .components(closed_buttons(&result.raffle)),
            )
            .await?;

        component
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(winners_content(&result))
                    .embed(winners_embed(&result)),
            )
            .await?;
        Ok(())
    }
}

fn log_platform_error(err: &RaffleError) {
    if let RaffleError::Platform(e) = err {
        error!("Raffle button failed: {}", e);
    }
}

async fn reply(ctx: &Context, component: &ComponentInteraction, content: &str) -> HandlerResult {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_error(
    ctx: &Context,
    component: &ComponentInteraction,
    err: &RaffleError,
) -> HandlerResult {
    log_platform_error(err);
    reply(ctx, component, &format!("❌ {}", err.user_message())).await
}

/// Rewrites the announcement with the current entry count, if one was posted.
pub async fn refresh_announcement(http: &Http, raffle: &RaffleSummary) {
    let Some(message_id) = raffle.announcement_message_id else {
        return;
    };
    if let Err(e) = raffle
        .announcement_channel_id
        .edit_message(http, message_id, EditMessage::new().embed(announcement_embed(raffle)))
        .await
    {
        warn!("Failed to refresh announcement for {}: {}", raffle.name, e);
    }
}

/// Greys out the announcement and disables its buttons.
pub async fn close_announcement(http: &Http, raffle: &RaffleSummary, status: &str) {
    let Some(message_id) = raffle.announcement_message_id else {
        return;
    };
    if let Err(e) = raffle
        .announcement_channel_id
        .edit_message(
            http,
            message_id,
            EditMessage::new()
                .embed(ended_embed(raffle, status))
                .components(closed_buttons(raffle)),
        )
        .await
    {
        warn!("Failed to close announcement for {}: {}", raffle.name, e);
    }
}

#[async_trait]
impl EventHandler for RaffleButtonHandler {
    fn name(&self) -> &str {
        "RaffleButtons"
    }

    async fn handle(&self, ctx: &Context, event: &FullEvent) -> HandlerResult {
        let FullEvent::InteractionCreate { interaction, .. } = event else {
            return Ok(());
        };
        let Some(component) = interaction.as_message_component() else {
            return Ok(());
        };
        let Some(action) = RaffleAction::parse(&component.data.custom_id) else {
            return Ok(());
        };
        let Some(guild_id) = component.guild_id else {
            return reply(ctx, component, "Raffles only work in a server.").await;
        };

        match action {
            RaffleAction::Enter(name) => self.enter(ctx, component, guild_id, &name).await,
            RaffleAction::Pick(name) => self.pick(ctx, component, guild_id, &name).await,
        }
    }

    fn box_clone(&self) -> Box<dyn EventHandler> {
        Box::new(self.clone())
    }
}
