// Setup menu - the component-driven views behind /setup
//
// Every view is rebuilt from the stored config after a change, so what the
// admin sees is always what was persisted.

use poise::serenity_prelude as serenity;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::models::guild_snapshot::GuildSnapshot;
use crate::models::server_config::{is_valid_prefix, ConfigPath, FeatureKey, Section, ServerConfig};
use crate::services::config_manager::{apply_at_path, ConfigError, GuildIdentity};
use crate::services::config_validator::{fix_config, get_health_score, validate_config, ValidationReport};
use crate::utils::config::colors;
use crate::utils::discord;
use crate::utils::formatters::{channel_mention, role_mentions};
use crate::{Data, Error};

pub const MENU_ID: &str = "setup_menu";
pub const BACK_ID: &str = "setup_back";
pub const REPAIR_ID: &str = "setup_repair";
pub const PREFIX_BUTTON_ID: &str = "setup_prefix";
pub const PREFIX_MODAL_ID: &str = "setup_prefix_modal";
pub const PREFIX_INPUT_ID: &str = "prefix_input";

pub const NEED_ADMIN: &str = "You need Administrator to use setup.";
const SAVE_FAILED: &str = "Could not save that change. Please try again later.";
const INVALID_PREFIX: &str = "Invalid prefix. Please use 1-5 characters.";

const OVERVIEW_TEXT: &str = "Use the menu below to configure the bot. Changes save instantly when you select.\n\
Tip: For the best experience, use Discord on PC; some buttons may not show on mobile.\n\
Note: Re-select roles (including previously selected) to ensure they are included.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Overview,
    Prefix,
    Roles,
    ModCommands,
    Logging,
    Honeypot,
    Welcome,
    Others,
}

impl View {
    /// Sections offered by the overview select menu
    pub const MENU: [View; 7] = [
        View::Prefix,
        View::Roles,
        View::ModCommands,
        View::Logging,
        View::Honeypot,
        View::Welcome,
        View::Others,
    ];

    pub fn value(self) -> &'static str {
        match self {
            View::Overview => "overview",
            View::Prefix => "prefix",
            View::Roles => "roles",
            View::ModCommands => "permissions",
            View::Logging => "logging",
            View::Honeypot => "honeypot",
            View::Welcome => "welcome_role",
            View::Others => "auto_moderation",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::MENU.into_iter().find(|v| v.value() == value)
    }

    fn label(self) -> &'static str {
        match self {
            View::Overview => "Setup",
            View::Prefix => "Prefix",
            View::Roles => "Mod roles",
            View::ModCommands => "Mod Commands",
            View::Logging => "Logging",
            View::Honeypot => "Honeypot",
            View::Welcome => "Welcome & Role restoration",
            View::Others => "Others",
        }
    }

    fn description(self) -> &'static str {
        match self {
            View::Overview => "Overview",
            View::Prefix => "Set custom bot prefix",
            View::Roles => "View moderator roles",
            View::ModCommands => "Enable/disable moderator commands",
            View::Logging => "View logging settings",
            View::Honeypot => "View honeypot settings",
            View::Welcome => "Welcome, Goodbye, and Role Restore",
            View::Others => "Auto Embed and Invite Block",
        }
    }
}

/// A decoded setup interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupAction {
    Open(View),
    Repair,
    OpenPrefixModal,
    SetPrefix(String),
    SetModRoles(Vec<String>),
    ToggleModCommands,
    SetLogChannel(Option<String>),
    ToggleLogging,
    SetHoneypotChannel(Option<String>),
    ToggleHoneypotAutoUnban,
    ToggleHoneypotDelete,
    ToggleWelcome,
    ToggleGoodbye,
    ToggleRoleRestore,
    SetWelcomeChannel(Option<String>),
    SetGoodbyeChannel(Option<String>),
    ToggleAutoEmbed,
    ToggleInviteBlock,
}

impl SetupAction {
    /// Decode a component custom id with its selected values
    pub fn from_component(custom_id: &str, values: &[String]) -> Option<Self> {
        let first = || values.first().cloned();
        let action = match custom_id {
            MENU_ID => SetupAction::Open(View::from_value(values.first()?)?),
            BACK_ID => SetupAction::Open(View::Overview),
            REPAIR_ID => SetupAction::Repair,
            PREFIX_BUTTON_ID => SetupAction::OpenPrefixModal,
            "setup_role_mods" => SetupAction::SetModRoles(values.to_vec()),
            "toggle_mod_commands" => SetupAction::ToggleModCommands,
            "setup_log_channel" => SetupAction::SetLogChannel(first()),
            "toggle_logging" => SetupAction::ToggleLogging,
            "setup_honeypot_channel" => SetupAction::SetHoneypotChannel(first()),
            "toggle_honeypot_autounban" => SetupAction::ToggleHoneypotAutoUnban,
            "toggle_honeypot_delete" => SetupAction::ToggleHoneypotDelete,
            "toggle_welcome" => SetupAction::ToggleWelcome,
            "toggle_goodbye" => SetupAction::ToggleGoodbye,
            "toggle_restore" => SetupAction::ToggleRoleRestore,
            "setup_welcome_channel" => SetupAction::SetWelcomeChannel(first()),
            "setup_goodbye_channel" => SetupAction::SetGoodbyeChannel(first()),
            "toggle_auto_embed" => SetupAction::ToggleAutoEmbed,
            "toggle_invite_block" => SetupAction::ToggleInviteBlock,
            _ => return None,
        };
        Some(action)
    }

    /// The view to show once the action is applied
    pub fn view_after(&self) -> View {
        match self {
            SetupAction::Open(view) => *view,
            SetupAction::Repair => View::Overview,
            SetupAction::OpenPrefixModal | SetupAction::SetPrefix(_) => View::Prefix,
            SetupAction::SetModRoles(_) => View::Roles,
            SetupAction::ToggleModCommands => View::ModCommands,
            SetupAction::SetLogChannel(_) | SetupAction::ToggleLogging => View::Logging,
            SetupAction::SetHoneypotChannel(_)
            | SetupAction::ToggleHoneypotAutoUnban
            | SetupAction::ToggleHoneypotDelete => View::Honeypot,
            SetupAction::ToggleWelcome
            | SetupAction::ToggleGoodbye
            | SetupAction::ToggleRoleRestore
            | SetupAction::SetWelcomeChannel(_)
            | SetupAction::SetGoodbyeChannel(_) => View::Welcome,
            SetupAction::ToggleAutoEmbed | SetupAction::ToggleInviteBlock => View::Others,
        }
    }
}

/// The partial update an action makes, or `None` when it changes nothing
pub fn mutation(action: &SetupAction, config: &ServerConfig) -> Option<(ConfigPath, Value)> {
    let features = &config.features;
    let update: (ConfigPath, Value) = match action {
        SetupAction::Open(_) | SetupAction::Repair | SetupAction::OpenPrefixModal => return None,
        SetupAction::SetPrefix(prefix) => {
            if !is_valid_prefix(prefix) {
                return None;
            }
            (Section::Prefix.into(), json!(prefix))
        }
        SetupAction::SetModRoles(roles) => (Section::Permissions.into(), json!({ "moderatorRoles": roles })),
        SetupAction::ToggleModCommands => (
            Section::Permissions.into(),
            json!({ "moderatorCommandsEnabled": !config.permissions.moderator_commands_enabled }),
        ),
        SetupAction::SetLogChannel(channel) => (Section::Logging.into(), json!({ "logChannelId": channel })),
        SetupAction::ToggleLogging => (Section::Logging.into(), json!({ "enabled": !config.logging.enabled })),
        SetupAction::SetHoneypotChannel(channel) => (
            FeatureKey::Honeypot.into(),
            json!({
                "enabled": channel.is_some(),
                "channelId": channel,
                "autoBan": channel.is_some(),
            }),
        ),
        SetupAction::ToggleHoneypotAutoUnban => (
            FeatureKey::Honeypot.into(),
            json!({ "autoUnban": !features.honeypot.auto_unban }),
        ),
        SetupAction::ToggleHoneypotDelete => (
            FeatureKey::Honeypot.into(),
            json!({ "deleteMessage": !features.honeypot.delete_message }),
        ),
        SetupAction::ToggleWelcome => (FeatureKey::Welcome.into(), json!({ "enabled": !features.welcome.enabled })),
        SetupAction::ToggleGoodbye => (FeatureKey::Goodbye.into(), json!({ "enabled": !features.goodbye.enabled })),
        SetupAction::ToggleRoleRestore => (
            FeatureKey::RoleRestore.into(),
            json!({ "enabled": !features.role_restore.enabled }),
        ),
        SetupAction::SetWelcomeChannel(channel) => (FeatureKey::Welcome.into(), json!({ "channelId": channel })),
        SetupAction::SetGoodbyeChannel(channel) => (FeatureKey::Goodbye.into(), json!({ "channelId": channel })),
        SetupAction::ToggleAutoEmbed => (
            FeatureKey::AutoEmbed.into(),
            json!({ "enabled": !features.auto_embed.enabled }),
        ),
        SetupAction::ToggleInviteBlock => (
            FeatureKey::InviteBlock.into(),
            json!({ "enabled": !features.invite_block.enabled }),
        ),
    };
    Some(update)
}

/// `current` with the action's change applied, `None` when nothing changes
pub fn apply_action(action: &SetupAction, current: &ServerConfig) -> Result<Option<ServerConfig>, ConfigError> {
    match mutation(action, current) {
        Some((path, value)) => apply_at_path(current, path, value).map(Some),
        None => Ok(None),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn enabled(value: bool) -> &'static str {
    if value {
        "Enabled"
    } else {
        "Disabled"
    }
}

pub fn health_line(score: u8, report: &ValidationReport) -> String {
    format!(
        "{}/100 ({} errors, {} warnings)",
        score,
        report.errors.len(),
        report.warnings.len()
    )
}

/// Embed fields `(name, value, inline)` for a section view
pub fn view_fields(view: View, config: &ServerConfig) -> Vec<(String, String, bool)> {
    let field = |name: &str, value: String, inline: bool| (name.to_string(), value, inline);
    let features = &config.features;
    match view {
        View::Overview => vec![
            field("Prefix", format!("`{}`", config.prefix), true),
            field("Mod roles", role_mentions(&config.permissions.moderator_roles), false),
        ],
        View::Prefix => vec![field("Current prefix", format!("`{}`", config.prefix), true)],
        View::Roles => vec![field("Mod roles", role_mentions(&config.permissions.moderator_roles), false)],
        View::ModCommands => vec![field(
            "Moderator commands",
            enabled(config.permissions.moderator_commands_enabled).to_string(),
            true,
        )],
        View::Logging => vec![
            field("Enabled", yes_no(config.logging.enabled).to_string(), true),
            field("Log Channel", channel_mention(config.logging.log_channel_id.as_deref()), true),
        ],
        View::Honeypot => vec![
            field("Enabled", yes_no(features.honeypot.enabled).to_string(), true),
            field("Channel", channel_mention(features.honeypot.channel_id.as_deref()), true),
            field("Auto Unban", yes_no(features.honeypot.auto_unban).to_string(), true),
            field("Delete Messages", yes_no(features.honeypot.delete_message).to_string(), true),
        ],
        View::Welcome => vec![
            field("Welcome", enabled(features.welcome.enabled).to_string(), true),
            field("Goodbye", enabled(features.goodbye.enabled).to_string(), true),
            field("Role Restore", enabled(features.role_restore.enabled).to_string(), true),
            field("Welcome Channel", channel_mention(features.welcome.channel_id.as_deref()), true),
            field("Goodbye Channel", channel_mention(features.goodbye.channel_id.as_deref()), true),
        ],
        View::Others => vec![
            field("Auto Embed", enabled(features.auto_embed.enabled).to_string(), true),
            field("Invite Block", enabled(features.invite_block.enabled).to_string(), true),
        ],
    }
}

fn view_embed(view: View, config: &ServerConfig, health: Option<(u8, &ValidationReport)>) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(view.label())
        .color(colors::PRIMARY)
        .timestamp(serenity::Timestamp::now())
        .fields(view_fields(view, config));

    match view {
        View::Overview => {
            if let Some((score, report)) = health {
                embed = embed.field("Health", health_line(score, report), false);
            }
            embed
                .description(OVERVIEW_TEXT)
                .footer(serenity::CreateEmbedFooter::new("Use /setup anytime to refresh."))
        }
        View::Roles => embed.description("Note: Re-select roles (including previously selected) to ensure they are included."),
        View::Welcome => embed.footer(serenity::CreateEmbedFooter::new(
            "Note: Role Restore acts as a role logger; it stores a user's roles on leave and restores them when they rejoin.",
        )),
        _ => embed,
    }
}

fn button(id: &str, label: &str) -> serenity::CreateButton {
    serenity::CreateButton::new(id)
        .label(label)
        .style(serenity::ButtonStyle::Secondary)
}

fn back_button() -> serenity::CreateButton {
    button(BACK_ID, "Back")
}

fn channel_select(id: &str, placeholder: &str) -> serenity::CreateActionRow {
    serenity::CreateActionRow::SelectMenu(
        serenity::CreateSelectMenu::new(
            id,
            serenity::CreateSelectMenuKind::Channel {
                channel_types: Some(vec![serenity::ChannelType::Text]),
                default_channels: None,
            },
        )
        .placeholder(placeholder)
        .min_values(0)
        .max_values(1),
    )
}

fn main_menu() -> serenity::CreateActionRow {
    let options = View::MENU
        .iter()
        .map(|v| serenity::CreateSelectMenuOption::new(v.label(), v.value()).description(v.description()))
        .collect();
    serenity::CreateActionRow::SelectMenu(
        serenity::CreateSelectMenu::new(MENU_ID, serenity::CreateSelectMenuKind::String { options })
            .placeholder("Select a section to view"),
    )
}

fn view_components(view: View, can_repair: bool) -> Vec<serenity::CreateActionRow> {
    match view {
        View::Overview => {
            let mut rows = vec![main_menu()];
            if can_repair {
                rows.push(serenity::CreateActionRow::Buttons(vec![button(REPAIR_ID, "Repair config")]));
            }
            rows
        }
        View::Prefix => vec![serenity::CreateActionRow::Buttons(vec![
            button(PREFIX_BUTTON_ID, "Change prefix").style(serenity::ButtonStyle::Primary),
            back_button(),
        ])],
        View::Roles => vec![
            serenity::CreateActionRow::SelectMenu(
                serenity::CreateSelectMenu::new("setup_role_mods", serenity::CreateSelectMenuKind::Role { default_roles: None })
                    .placeholder("Select Mod roles")
                    .min_values(0)
                    .max_values(10),
            ),
            serenity::CreateActionRow::Buttons(vec![back_button()]),
        ],
        View::ModCommands => vec![serenity::CreateActionRow::Buttons(vec![
            button("toggle_mod_commands", "Toggle Mod Commands"),
            back_button(),
        ])],
        View::Logging => vec![
            channel_select("setup_log_channel", "Select Log channel"),
            serenity::CreateActionRow::Buttons(vec![button("toggle_logging", "Toggle Logging"), back_button()]),
        ],
        View::Honeypot => vec![
            channel_select("setup_honeypot_channel", "Select Honeypot channel"),
            serenity::CreateActionRow::Buttons(vec![
                button("toggle_honeypot_autounban", "Toggle Auto-unban"),
                button("toggle_honeypot_delete", "Toggle Delete Msgs"),
            ]),
            serenity::CreateActionRow::Buttons(vec![back_button()]),
        ],
        View::Welcome => vec![
            serenity::CreateActionRow::Buttons(vec![
                button("toggle_welcome", "Toggle Welcome"),
                button("toggle_goodbye", "Toggle Goodbye"),
                button("toggle_restore", "Toggle Role Restore"),
            ]),
            channel_select("setup_welcome_channel", "Select Welcome channel"),
            channel_select("setup_goodbye_channel", "Select Goodbye channel"),
            serenity::CreateActionRow::Buttons(vec![back_button()]),
        ],
        View::Others => vec![serenity::CreateActionRow::Buttons(vec![
            button("toggle_auto_embed", "Toggle Auto Embed"),
            button("toggle_invite_block", "Toggle Invite Block"),
            back_button(),
        ])],
    }
}

/// Embed and component rows for a view of the guild's current config
pub fn render(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    config: &ServerConfig,
    view: View,
) -> (serenity::CreateEmbed, Vec<serenity::CreateActionRow>) {
    if view != View::Overview {
        return (view_embed(view, config, None), view_components(view, false));
    }

    match GuildSnapshot::from_cache(ctx, guild_id) {
        Some(snapshot) => {
            let report = validate_config(&snapshot, config);
            let score = get_health_score(config);
            (
                view_embed(view, config, Some((score, &report))),
                view_components(view, !report.errors.is_empty()),
            )
        }
        None => (view_embed(view, config, None), view_components(view, false)),
    }
}

/// Administrators, the guild owner and the bot owner may configure
pub async fn can_configure(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> bool {
    data.bot_config.bot_owner == Some(user_id) || discord::is_administrator(ctx, guild_id, user_id).await
}

/// Expired interaction tokens are not worth reporting
fn settle(result: serenity::Result<()>) -> Result<(), Error> {
    match result {
        Err(e) if discord::is_expired_interaction(&e) => Ok(()),
        other => other.map_err(Into::into),
    }
}

fn ephemeral(content: &str) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

fn update_message(
    (embed, components): (serenity::CreateEmbed, Vec<serenity::CreateActionRow>),
) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::UpdateMessage(
        serenity::CreateInteractionResponseMessage::new()
            .embed(embed)
            .components(components),
    )
}

fn prefix_modal(current: &str) -> serenity::CreateInteractionResponse {
    let input = serenity::CreateInputText::new(serenity::InputTextStyle::Short, "New prefix", PREFIX_INPUT_ID)
        .min_length(1)
        .max_length(5)
        .value(current);
    serenity::CreateInteractionResponse::Modal(
        serenity::CreateModal::new(PREFIX_MODAL_ID, "Set prefix")
            .components(vec![serenity::CreateActionRow::InputText(input)]),
    )
}

fn selected_values(kind: &serenity::ComponentInteractionDataKind) -> Vec<String> {
    match kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        serenity::ComponentInteractionDataKind::RoleSelect { values } => {
            values.iter().map(|id| id.to_string()).collect()
        }
        serenity::ComponentInteractionDataKind::ChannelSelect { values } => {
            values.iter().map(|id| id.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

/// Apply an action and produce the response to send
async fn apply(
    ctx: &serenity::Context,
    data: &Data,
    identity: &GuildIdentity,
    action: SetupAction,
) -> serenity::CreateInteractionResponse {
    let manager = &data.config_manager;
    let config = manager.get_or_create_config(identity).await;

    let saved = match &action {
        SetupAction::Open(_) => true,
        SetupAction::OpenPrefixModal => return prefix_modal(&config.prefix),
        SetupAction::SetPrefix(prefix) if !is_valid_prefix(prefix) => return ephemeral(INVALID_PREFIX),
        SetupAction::Repair => match GuildSnapshot::from_cache(ctx, identity.id) {
            Some(snapshot) => {
                manager
                    .update_with(identity.id, |current| Ok(Some(fix_config(&snapshot, current))))
                    .await
            }
            None => false,
        },
        // toggles read the state they flip under the update lock
        _ => {
            manager
                .update_with(identity.id, |current| apply_action(&action, current))
                .await
        }
    };
    if !saved {
        return ephemeral(SAVE_FAILED);
    }
    if !matches!(action, SetupAction::Open(_)) {
        info!("Setup change in {} ({}): {:?}", identity.name, identity.id, action);
    }

    let config = manager.get_or_create_config(identity).await;
    update_message(render(ctx, identity.id, &config, action.view_after()))
}

/// Component interactions from the setup views
pub async fn handle_component(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ComponentInteraction,
) -> Result<(), Error> {
    let values = selected_values(&interaction.data.kind);
    let Some(action) = SetupAction::from_component(&interaction.data.custom_id, &values) else {
        return Ok(());
    };
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    let response = if !can_configure(ctx, data, guild_id, interaction.user.id).await {
        ephemeral(NEED_ADMIN)
    } else {
        match GuildIdentity::from_cache(ctx, guild_id) {
            Some(identity) => apply(ctx, data, &identity, action).await,
            None => {
                warn!("Setup interaction for uncached guild {}", guild_id);
                ephemeral(SAVE_FAILED)
            }
        }
    };
    settle(interaction.create_response(ctx, response).await)
}

/// Submitted prefix modal
pub async fn handle_modal(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &serenity::ModalInteraction,
) -> Result<(), Error> {
    if interaction.data.custom_id != PREFIX_MODAL_ID {
        return Ok(());
    }
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    let prefix = interaction
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            serenity::ActionRowComponent::InputText(input) if input.custom_id == PREFIX_INPUT_ID => {
                input.value.clone()
            }
            _ => None,
        })
        .unwrap_or_default();

    let response = if !can_configure(ctx, data, guild_id, interaction.user.id).await {
        ephemeral(NEED_ADMIN)
    } else {
        match GuildIdentity::from_cache(ctx, guild_id) {
            Some(identity) => apply(ctx, data, &identity, SetupAction::SetPrefix(prefix.trim().to_string())).await,
            None => ephemeral(SAVE_FAILED),
        }
    };
    settle(interaction.create_response(ctx, response).await)
}
