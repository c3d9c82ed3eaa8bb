pub mod announce;
pub mod commands;
pub mod engine;
pub mod handler;
pub mod store;

use commands::*;
use poise::command;

/// 🎉 Run raffles with button entry
#[command(
    slash_command,
    subcommands("start", "enter", "pick", "list", "cancel"),
    guild_only
)]
pub async fn raffle(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
