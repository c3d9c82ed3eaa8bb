use config::Config;
use modules::{
    jtc::{
        handler::JoinToCreateHandler,
        jtc,
        provisioner::{Provisioner, ProvisionerSettings},
    },
    raffle::{engine::RaffleEngine, handler::RaffleButtonHandler, raffle},
    system::events::ReadyHandler,
    warnings::{clear_warnings, ledger::WarningLedger, user_warnings, warn},
};
use platform::{Platform, SerenityPlatform};
use poise::serenity_prelude::{self as serenity, ChannelId, CreateAllowedMentions, RoleId};
use std::sync::Arc;
use tasks::TaskManager;
use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;

mod config;
mod events;
mod modules;
mod platform;
mod store;
mod tasks;
mod utils;

use crate::events::EventManager;

#[derive(Clone, Debug)]
pub struct Data {
    pub provisioner: Provisioner,
    pub raffles: RaffleEngine,
    pub warnings: WarningLedger,
    pub task_manager: Arc<TaskManager>,
    pub event_manager: Arc<EventManager>,
}

impl Data {
    pub async fn new(
        ctx: &serenity::Context,
        config: &Config,
        task_manager: Arc<TaskManager>,
    ) -> Self {
        let platform: Arc<dyn Platform> =
            Arc::new(SerenityPlatform::new(ctx, config.platform_timeout));

        let provisioner = Provisioner::new(
            platform.clone(),
            task_manager.clone(),
            ProvisionerSettings {
                cleanup_delay: config.cleanup_delay,
                lobby_channel: config.jtc_lobby_channel.map(ChannelId::new),
                restricted_role: config.jtc_restricted_role.map(RoleId::new),
            },
        );
        provisioner.seed(&config.jtc_templates).await;

        let raffles = RaffleEngine::new(platform);

        let event_manager = Arc::new(EventManager::new());
        event_manager.add_handler(ReadyHandler).await;
        event_manager
            .add_handler(JoinToCreateHandler::new(provisioner.clone()))
            .await;
        event_manager
            .add_handler(RaffleButtonHandler::new(raffles.clone()))
            .await;

        Self {
            provisioner,
            raffles,
            warnings: WarningLedger::new(),
            task_manager,
            event_manager,
        }
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("starting loungebot");

    let config = Arc::new(Config::from_env()?);
    let task_manager = Arc::new(TaskManager::new());
    let intents = serenity::GatewayIntents::non_privileged();

    let setup_config = config.clone();
    let setup_tasks = task_manager.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions::<Data, Error> {
            allowed_mentions: Some(CreateAllowedMentions::new().empty_roles().all_users(true)),
            commands: vec![
                register(),
                jtc(),
                raffle(),
                warn(),
                user_warnings(),
                clear_warnings(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    trace!(
                        "Command {} used by {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        ctx.guild_id()
                            .map_or_else(|| "DM".to_string(), |id| id.to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command {} completed for {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        ctx.guild_id()
                            .map_or_else(|| "DM".to_string(), |id| id.to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Command {} failed for {} in {}: {:?}",
                                ctx.command().qualified_name,
                                ctx.author().tag(),
                                ctx.guild_id()
                                    .map_or_else(|| "DM".to_string(), |id| id.to_string()),
                                error
                            );
                            if let Err(e) = ctx.say(format!("❌ {}", error)).await {
                                error!("Failed to report command error: {}", e);
                            }
                        }
                        err => {
                            if let Err(e) = poise::builtins::on_error(err).await {
                                error!("Error while handling framework error: {}", e);
                            }
                        }
                    }
                })
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    data.event_manager.handle_event(ctx, event).await;
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("registering commands");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(Data::new(ctx, &setup_config, setup_tasks).await)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("shutdown requested");
        shard_manager.shutdown_all().await;
    });

    client.start().await?;
    task_manager.shutdown().await;
    info!("stopped");
    Ok(())
}
