use super::store::TemplateChannelConfig;
use crate::{utils::discord_timestamp, Context, Error};
use poise::command;
use poise::serenity_prelude::{self as serenity, Mentionable};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum AccessType {
    #[name = "Public (Open to all members)"]
    Public,
    #[name = "Invite Only (Private)"]
    Private,
}

fn access_label(is_private: bool) -> &'static str {
    if is_private {
        "Invite Only"
    } else {
        "Public"
    }
}

/// Turn a voice channel into a join-to-create trigger
#[command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    ephemeral
)]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Voice channel to configure as join-to-create"]
    #[channel_types("Voice")]
    channel: serenity::GuildChannel,
    #[description = "Channel access type"] access: AccessType,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let is_private = access == AccessType::Private;

    let previous = ctx
        .data()
        .provisioner
        .configure_template(TemplateChannelConfig {
            guild_id,
            template_channel_id: channel.id,
            name: channel.name.clone(),
            is_private,
        })
        .await;

    info!(
        "Join-to-create enabled for {} ({}) - {} in guild {}",
        channel.name,
        channel.id,
        access_label(is_private),
        guild_id
    );

    let verb = if previous.is_some() { "Updated" } else { "Configured" };
    ctx.say(format!(
        "✅ {} **{}** as a join-to-create voice channel.\n**Access Type:** {}",
        verb,
        channel.name,
        if is_private {
            "Invite Only (Private)"
        } else {
            "Public (Open to all members)"
        }
    ))
    .await?;
    Ok(())
}

/// List join-to-create channels in this server
#[command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    ephemeral
)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let templates = ctx.data().provisioner.templates_in(guild_id).await;

    if templates.is_empty() {
        ctx.say("No join-to-create channels are configured in this server.")
            .await?;
        return Ok(());
    }

    let lines = templates
        .iter()
        .map(|template| {
            format!(
                "• **{}** ({}) - {}",
                template.name,
                template.template_channel_id.mention(),
                access_label(template.is_private)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    ctx.say(format!("**Join-to-Create Channels:**\n{}", lines))
        .await?;
    Ok(())
}

/// Stop a voice channel from creating new channels
#[command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    ephemeral
)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Channel to remove from join-to-create"]
    #[channel_types("Voice")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;

    if !ctx
        .data()
        .provisioner
        .remove_template(guild_id, channel.id)
        .await
    {
        ctx.say(format!(
            "**{}** is not configured as a join-to-create channel.",
            channel.name
        ))
        .await?;
        return Ok(());
    }

    info!(
        "Join-to-create disabled for {} ({}) in guild {}",
        channel.name, channel.id, guild_id
    );
    ctx.say(format!(
        "✅ Removed **{}** from join-to-create system.",
        channel.name
    ))
    .await?;
    Ok(())
}

/// Show the temporary channels currently managed by the bot
#[command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    ephemeral
)]
pub async fn active(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let channels = ctx.data().provisioner.provisioned_in(guild_id).await;

    if channels.is_empty() {
        ctx.say("There are no temporary voice channels right now.")
            .await?;
        return Ok(());
    }

    let lines = channels
        .iter()
        .map(|channel| {
            format!(
                "• {} owned by {} - {}, created {}",
                channel.channel_id.mention(),
                channel.owner_id.mention(),
                access_label(channel.is_private),
                discord_timestamp(channel.created_at, 'R')
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    ctx.say(format!("**Temporary Voice Channels:**\n{}", lines))
        .await?;
    Ok(())
}
