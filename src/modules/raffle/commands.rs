use super::announce::{announcement_buttons, announcement_embed, winners_content, winners_embed};
use super::engine::{EntryOutcome, NewRaffle, RaffleError, MAX_WINNERS};
use super::handler::{close_announcement, refresh_announcement};
use super::store::RaffleDuration;
use crate::{utils::discord_timestamp, Context, Error};
use poise::command;
use poise::serenity_prelude::{self as serenity, Mentionable};
use poise::CreateReply;
use tracing::error;

async fn autocomplete_raffle<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = serenity::AutocompleteChoice> {
    let names = match ctx.guild_id() {
        Some(guild_id) => ctx.data().raffles.matching_names(guild_id, partial).await,
        None => Vec::new(),
    };

    names
        .into_iter()
        .take(25)
        .map(|name| serenity::AutocompleteChoice::new(name.clone(), name))
}

async fn say_error(ctx: Context<'_>, err: &RaffleError) -> Result<(), Error> {
    if let RaffleError::Platform(e) = err {
        error!("Raffle command failed: {}", e);
    }
    ctx.send(
        CreateReply::default()
            .content(format!("❌ {}", err.user_message()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Start a new raffle in this channel
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Name of the raffle"]
    #[min_length = 1]
    #[max_length = 50]
    name: String,
    #[description = "What the winners receive"]
    #[max_length = 200]
    prize: String,
    #[description = "How long entries stay open"] duration: RaffleDuration,
    #[description = "Number of winners (default 1)"]
    #[min = 1]
    #[max = 10]
    winners: Option<u32>,
    #[description = "Rules or requirements for entering"]
    #[max_length = 1000]
    rules: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let engine = &ctx.data().raffles;

    let summary = match engine
        .start(NewRaffle {
            guild_id,
            name,
            prize,
            winners: winners.unwrap_or(1).min(MAX_WINNERS),
            duration,
            rules,
            organizer: ctx.author().id,
            channel_id: ctx.channel_id(),
        })
        .await
    {
        Ok(summary) => summary,
        Err(e) => return say_error(ctx, &e).await,
    };

    let handle = ctx
        .send(
            CreateReply::default()
                .content("🎉 **A new raffle has started!**")
                .embed(announcement_embed(&summary))
                .components(announcement_buttons(&summary)),
        )
        .await?;
    let message = handle.message().await?;
    engine
        .attach_announcement(guild_id, &summary.name, message.id)
        .await;
    Ok(())
}

/// Enter a running raffle
#[command(slash_command, guild_only, ephemeral)]
pub async fn enter(
    ctx: Context<'_>,
    #[description = "Raffle to enter"]
    #[autocomplete = "autocomplete_raffle"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    if ctx.author().bot {
        ctx.say("Bots cannot enter raffles.").await?;
        return Ok(());
    }

    match ctx
        .data()
        .raffles
        .enter(guild_id, &name, ctx.author().id)
        .await
    {
        Ok(EntryOutcome::Entered(summary)) => {
            ctx.say(format!("✅ You've entered **{}**! Good luck!", summary.name))
                .await?;
            refresh_announcement(&ctx.serenity_context().http, &summary).await;
        }
        Ok(EntryOutcome::AlreadyEntered(_)) => {
            ctx.say("You are already entered in this raffle!").await?;
        }
        Err(e) => say_error(ctx, &e).await?,
    }
    Ok(())
}

/// Draw the winners of a raffle and close it
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn pick(
    ctx: Context<'_>,
    #[description = "Raffle to draw"]
    #[autocomplete = "autocomplete_raffle"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let engine = &ctx.data().raffles;

    // Answered before deferring so the reply can stay private.
    if engine.get(guild_id, &name).await.is_none() {
        return say_error(ctx, &RaffleError::RaffleNotFound(name)).await;
    }

    // The results are public; anything after this point is too.
    ctx.defer().await?;

    let result = match engine.pick_winners(guild_id, &name, ctx.author().id).await {
        Ok(result) => result,
        Err(e) => {
            if let RaffleError::Platform(platform) = &e {
                error!("Raffle pick failed: {}", platform);
            }
            ctx.say(format!("❌ {}", e.user_message())).await?;
            return Ok(());
        }
    };

    ctx.send(
        CreateReply::default()
            .content(winners_content(&result))
            .embed(winners_embed(&result)),
    )
    .await?;
    close_announcement(
        &ctx.serenity_context().http,
        &result.raffle,
        "This raffle has ended.",
    )
    .await;
    Ok(())
}

/// Show the raffles running in this server
#[command(slash_command, guild_only, ephemeral)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let engine = &ctx.data().raffles;
    let raffles = engine.active_in(guild_id).await;

    if raffles.is_empty() {
        ctx.say("There are no active raffles right now.").await?;
        return Ok(());
    }

    let mut lines = Vec::with_capacity(raffles.len());
    for raffle in &raffles {
        let entered = engine
            .has_entered(guild_id, &raffle.name, ctx.author().id)
            .await;
        lines.push(format!(
            "• **{}** - {} ({} entries, {} winner(s)) in {}, ends {}{}",
            raffle.name,
            raffle.prize,
            raffle.entry_count,
            raffle.number_of_winners,
            raffle.announcement_channel_id.mention(),
            discord_timestamp(raffle.end_time, 'R'),
            if entered { " ✅ entered" } else { "" }
        ));
    }
    let lines = lines.join("\n");

    ctx.say(format!("**Active Raffles:**\n{}", lines)).await?;
    Ok(())
}

/// Cancel a raffle without drawing winners
#[command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    ephemeral
)]
pub async fn cancel(
    ctx: Context<'_>,
    #[description = "Raffle to cancel"]
    #[autocomplete = "autocomplete_raffle"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;

    let summary = match ctx.data().raffles.cancel(guild_id, &name).await {
        Ok(summary) => summary,
        Err(e) => return say_error(ctx, &e).await,
    };

    close_announcement(
        &ctx.serenity_context().http,
        &summary,
        "This raffle was cancelled.",
    )
    .await;
    ctx.say(format!("🗑️ Cancelled **{}**.", summary.name)).await?;
    Ok(())
}
