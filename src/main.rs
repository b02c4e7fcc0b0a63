// DeltaBotz - Rust Edition
// A Discord moderation bot with per-server configuration

mod api;
mod commands;
mod features;
mod models;
mod services;
mod storage;
mod utils;

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::tc::Drafts;
use crate::features::{member_events, pipeline, setup_menu};
use crate::services::config_manager::ConfigManager;
use crate::services::scheduler::{HttpRunner, Scheduler};
use crate::storage::{FileStore, KvStore};
use crate::utils::config::BotConfig;
use crate::utils::cooldown::Cooldowns;
use crate::utils::discord;
use crate::utils::error_log::{log_error, ErrorSource};
use crate::utils::sessions::SessionStore;

/// Pending confirmations keyed by guild and user
pub type Confirmations = SessionStore<(serenity::GuildId, serenity::UserId), String>;

const CONFIRMATION_TTL: Duration = Duration::from_secs(60);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// User data shared across all commands and event handlers
pub struct Data {
    pub http_client: reqwest::Client,
    pub bot_config: BotConfig,
    pub config_manager: Arc<ConfigManager>,
    pub store: Arc<dyn KvStore>,
    pub scheduler: Arc<Scheduler>,
    pub cooldowns: Cooldowns,
    pub faq_removals: Arc<Confirmations>,
    pub tc_removals: Arc<Confirmations>,
    pub tc_drafts: Arc<Drafts>,
    pub started_at: Instant,
}

// Manual Debug impl since the store and scheduler are trait objects / locks
impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("http_client", &"reqwest::Client")
            .field("bot_config", &self.bot_config)
            .field("store", &"dyn KvStore")
            .field("scheduler", &"Scheduler")
            .field("started_at", &self.started_at)
            .finish()
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Register all slash commands
fn get_commands() -> Vec<poise::Command<Data, Error>> {
    vec![commands::info::info(), commands::setup::setup()]
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            pipeline::handle_message(ctx, data, new_message).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = member_events::on_member_join(ctx, data, new_member).await {
                let origin = ErrorSource::new("guildMemberAdd")
                    .guild(new_member.guild_id, new_member.guild_id.to_string())
                    .user(new_member.user.id);
                log_error(&ctx.http, data.bot_config.error_log_channel, &origin, &format!("{:#}", e)).await;
            }
        }
        serenity::FullEvent::GuildMemberRemoval {
            guild_id,
            user,
            member_data_if_available,
        } => {
            if let Err(e) =
                member_events::on_member_leave(ctx, data, *guild_id, user, member_data_if_available.as_ref()).await
            {
                let origin = ErrorSource::new("guildMemberRemove")
                    .guild(*guild_id, guild_id.to_string())
                    .user(user.id);
                log_error(&ctx.http, data.bot_config.error_log_channel, &origin, &format!("{:#}", e)).await;
            }
        }
        serenity::FullEvent::InteractionCreate { interaction } => {
            let result = match interaction {
                serenity::Interaction::Component(component) => {
                    setup_menu::handle_component(ctx, data, component).await
                }
                serenity::Interaction::Modal(modal) => setup_menu::handle_modal(ctx, data, modal).await,
                _ => Ok(()),
            };
            if let Err(e) = result {
                let mut origin = ErrorSource::new("interactionCreate");
                if let Some(guild_id) = interaction.guild_id() {
                    origin = origin.guild(guild_id, guild_id.to_string());
                }
                log_error(&ctx.http, data.bot_config.error_log_channel, &origin, &e.to_string()).await;
            }
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if *is_new == Some(true) {
                info!("Added to guild {} ({})", guild.name, guild.id);
                discord::log_text(
                    &ctx.http,
                    data.bot_config.error_log_channel,
                    format!("Added to server: **{}** ({})", guild.name, guild.id),
                )
                .await;
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // unavailable means an outage, not a removal
            if !incomplete.unavailable {
                info!("Removed from guild {}, purging its config", incomplete.id);
                data.config_manager.delete_server_config(incomplete.id).await;
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let boot = Instant::now();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "deltabotz_rs=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let bot_config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    info!("Starting DeltaBotz (Rust Edition)...");

    // Build HTTP client for link probing
    let http_client = match reqwest::Client::builder()
        .user_agent("DeltaBotz/1.0")
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return;
        }
    };

    let configs_dir = bot_config.configs_dir();
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&configs_dir));
    let config_manager = Arc::new(ConfigManager::new(store.clone(), &configs_dir));
    info!("Config store at {}", configs_dir.display());

    let scheduler = match Scheduler::load(bot_config.scheduled_tasks_path()).await {
        Ok(scheduler) => Arc::new(scheduler),
        Err(e) => {
            error!("Failed to load scheduled tasks: {:#}", e);
            return;
        }
    };

    let token = bot_config.token.clone();

    // Setup framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: get_commands(),
            event_handler: |ctx, event, framework, data| Box::pin(event_handler(ctx, event, framework, data)),
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            let data = ctx.data();
                            let mut origin = ErrorSource::new(format!("slash:{}", ctx.command().name))
                                .user(ctx.author().id);
                            if let Some(guild_id) = ctx.guild_id() {
                                origin = origin.guild(guild_id, guild_id.to_string());
                            }
                            log_error(
                                &ctx.serenity_context().http,
                                data.bot_config.error_log_channel,
                                &origin,
                                &error.to_string(),
                            )
                            .await;
                            let reply = poise::CreateReply::default()
                                .content(data.bot_config.error_message.as_str())
                                .ephemeral(true);
                            if let Err(e) = ctx.send(reply).await {
                                warn!("Could not send error reply: {}", e);
                            }
                        }
                        err => {
                            if let Err(e) = poise::builtins::on_error(err).await {
                                error!("Error while handling error: {}", e);
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}. Registering commands...", ready.user.tag());
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Commands registered successfully!");

                let known = config_manager.list_configs().await;
                info!("Loaded {} server config(s)", known.len());

                scheduler
                    .start(Arc::new(HttpRunner::new(ctx.http.clone())))
                    .await;
                ctx.set_activity(Some(serenity::ActivityData::watching("DeltaBotz")));

                let faq_removals = Arc::new(Confirmations::new(CONFIRMATION_TTL));
                let tc_removals = Arc::new(Confirmations::new(CONFIRMATION_TTL));
                let tc_drafts = Arc::new(Drafts::new(commands::tc::RESPONSE_WINDOW));
                spawn_session_sweeper(faq_removals.clone(), tc_removals.clone(), tc_drafts.clone());

                let startup = format!("{:.2}", boot.elapsed().as_secs_f64());
                info!("Startup time: {}s", startup);
                discord::log_text(
                    &ctx.http,
                    bot_config.error_log_channel,
                    format!(
                        "{} has been logged in successfully\nStartup Time: `{}s`",
                        ready.user.tag(),
                        startup
                    ),
                )
                .await;

                Ok(Data {
                    http_client,
                    bot_config,
                    config_manager,
                    store,
                    scheduler,
                    cooldowns: Cooldowns::new(),
                    faq_removals,
                    tc_removals,
                    tc_drafts,
                    started_at: Instant::now(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let mut client = match serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create client: {}", e);
            return;
        }
    };

    // Run with graceful shutdown
    let shard_manager = client.shard_manager.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to register Ctrl+C handler: {}", e);
            return;
        }
        info!("Shutting down...");
        shard_manager.shutdown_all().await;
    });

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    info!("Goodbye!");
}

/// Drop expired confirmations and drafts now and then
fn spawn_session_sweeper(faq_removals: Arc<Confirmations>, tc_removals: Arc<Confirmations>, tc_drafts: Arc<Drafts>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = faq_removals.purge_expired() + tc_removals.purge_expired() + tc_drafts.purge_expired();
            if purged > 0 {
                debug!("Purged {} expired session(s)", purged);
            }
        }
    });
}
