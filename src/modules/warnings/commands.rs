use super::ledger::{ClearSelection, Warning};
use crate::{utils::discord_timestamp, Context, Error};
use poise::command;
use poise::serenity_prelude::{
    self as serenity, Colour, CreateEmbed, CreateEmbedFooter, CreateMessage, Mentionable,
    Timestamp,
};
use poise::CreateReply;

pub const WARNING_COLOUR: Colour = Colour::new(0xFFCC00);

// Discord caps an embed at 25 fields.
const MAX_LISTED: usize = 25;

fn warning_field(warning: &Warning) -> (String, String, bool) {
    (
        format!("Warning #{}", warning.number),
        format!(
            "**Reason:** {}\n**Moderator:** {}\n**Date:** {}",
            warning.reason,
            warning.moderator.mention(),
            discord_timestamp(warning.issued_at, 'F')
        ),
        false,
    )
}

/// Warn a user for violating rules
#[command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "The user to warn"] user: serenity::User,
    #[description = "Reason for the warning"]
    #[max_length = 1000]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    if user.bot {
        ctx.say("Bots cannot be warned.").await?;
        return Ok(());
    }

    let issued = ctx
        .data()
        .warnings
        .warn(guild_id, user.id, ctx.author().id, reason.clone())
        .await;

    let server = ctx
        .guild()
        .map(|guild| guild.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let notice = CreateEmbed::new()
        .title("Warning Issued")
        .description("You have received a warning from a moderator.")
        .colour(WARNING_COLOUR)
        .field("Reason", &reason, false)
        .field("Moderator", ctx.author().tag(), true)
        .field("Server", server, true)
        .field("Warning Count", issued.total.to_string(), true)
        .footer(CreateEmbedFooter::new(
            "Please follow the server rules to avoid future warnings.",
        ))
        .timestamp(Timestamp::now());

    if let Err(e) = user
        .direct_message(ctx.serenity_context(), CreateMessage::new().embed(notice))
        .await
    {
        tracing::warn!("Could not send warning DM to {}: {}", user.tag(), e);
    }

    ctx.say(format!(
        "✅ Warning issued to {}.\n**Reason:** {}\n**Total warnings:** {}",
        user.tag(),
        reason,
        issued.total
    ))
    .await?;
    Ok(())
}

/// View warnings for a specific user
#[command(
    slash_command,
    guild_only,
    rename = "user-warnings",
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
pub async fn user_warnings(
    ctx: Context<'_>,
    #[description = "The user to check warnings for"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let warnings = ctx.data().warnings.list(guild_id, user.id).await;

    if warnings.is_empty() {
        ctx.say(format!("{} has no warnings.", user.tag())).await?;
        return Ok(());
    }

    let mut description = format!("Total warnings: {}", warnings.len());
    if warnings.len() > MAX_LISTED {
        description.push_str(&format!(" (showing the latest {})", MAX_LISTED));
    }
    let shown = &warnings[warnings.len().saturating_sub(MAX_LISTED)..];

    let embed = CreateEmbed::new()
        .title(format!("Warnings for {}", user.tag()))
        .description(description)
        .colour(WARNING_COLOUR)
        .thumbnail(user.face())
        .fields(shown.iter().map(warning_field))
        .timestamp(Timestamp::now());

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Clear specific warnings for a user
#[command(
    slash_command,
    guild_only,
    rename = "clear-warnings",
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
pub async fn clear_warnings(
    ctx: Context<'_>,
    #[description = "The user to clear warnings for"] user: serenity::User,
    #[description = "Warning numbers to clear (e.g. \"1,3,5\") or \"all\""]
    warning_numbers: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;

    let outcome = match ClearSelection::parse(&warning_numbers) {
        Ok(selection) => {
            ctx.data()
                .warnings
                .clear(guild_id, user.id, &selection)
                .await
                .map(|cleared| (selection, cleared))
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok((ClearSelection::All, _)) => {
            ctx.say(format!("✅ All warnings cleared for {}.", user.tag()))
                .await?;
        }
        Ok((ClearSelection::Numbers(_), cleared)) => {
            ctx.say(format!(
                "✅ Cleared {} warning(s) for {}.",
                cleared,
                user.tag()
            ))
            .await?;
        }
        Err(e) => {
            ctx.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
