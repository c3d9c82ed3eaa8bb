pub mod commands;
pub mod handler;
pub mod policy;
pub mod provisioner;
pub mod store;

use commands::*;
use poise::command;

/// 🔊 Join-to-create voice channels
#[command(
    slash_command,
    subcommands("setup", "list", "remove", "active"),
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn jtc(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
