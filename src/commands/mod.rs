// Commands - prefix command dispatch plus the poise slash commands

pub mod ban;
pub mod botdm;
pub mod channel_access;
pub mod embed;
pub mod faq;
pub mod giver;
pub mod info;
pub mod kick;
pub mod mute;
pub mod setprefix;
pub mod setup;
pub mod softban;
pub mod tc;
pub mod unban;
pub mod warn;

use std::time::Duration;

use poise::serenity_prelude as serenity;

use crate::features::permissions::{has_moderator_role, moderator_gate, GateDecision};
use crate::features::pipeline::Flow;
use crate::models::entries::find_by_name;
use crate::models::server_config::ServerConfig;
use crate::utils::config::COMMAND_COOLDOWN_SECS;
use crate::utils::cooldown::wait_message;
use crate::utils::discord;
use crate::utils::error_log::{log_error, ErrorSource};
use crate::Data;

pub const NO_REASON: &str = "No reason provided";

/// Built-in prefix commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixCommand {
    Ban,
    Kick,
    Mute,
    Warn,
    Unban,
    Softban,
    Add,
    Removec,
    Giver,
    Botdm,
    Faq,
    Tc,
    Embed,
}

impl PrefixCommand {
    pub const ALL: [PrefixCommand; 13] = [
        PrefixCommand::Ban,
        PrefixCommand::Kick,
        PrefixCommand::Mute,
        PrefixCommand::Warn,
        PrefixCommand::Unban,
        PrefixCommand::Softban,
        PrefixCommand::Add,
        PrefixCommand::Removec,
        PrefixCommand::Giver,
        PrefixCommand::Botdm,
        PrefixCommand::Faq,
        PrefixCommand::Tc,
        PrefixCommand::Embed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrefixCommand::Ban => "ban",
            PrefixCommand::Kick => "kick",
            PrefixCommand::Mute => "mute",
            PrefixCommand::Warn => "warn",
            PrefixCommand::Unban => "unban",
            PrefixCommand::Softban => "softban",
            PrefixCommand::Add => "add",
            PrefixCommand::Removec => "removec",
            PrefixCommand::Giver => "giver",
            PrefixCommand::Botdm => "botdm",
            PrefixCommand::Faq => "faq",
            PrefixCommand::Tc => "tc",
            PrefixCommand::Embed => "embed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Whole-command moderator gate. `faq` and `tc` gate their
    /// management subcommands themselves.
    pub fn is_moderator(self) -> bool {
        !matches!(self, PrefixCommand::Faq | PrefixCommand::Tc | PrefixCommand::Embed)
    }

    pub fn cooldown(self) -> Option<Duration> {
        match self {
            PrefixCommand::Kick | PrefixCommand::Mute | PrefixCommand::Softban => {
                Some(Duration::from_secs(COMMAND_COOLDOWN_SECS))
            }
            _ => None,
        }
    }
}

/// Names a temp command may not take
pub fn is_reserved_name(name: &str) -> bool {
    PrefixCommand::from_name(name).is_some() || name.eq_ignore_ascii_case(setprefix::KEYWORD)
}

/// A prefixed message split into command name and argument text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: String,
    pub args_text: &'a str,
}

pub fn parse_invocation<'a>(content: &'a str, prefix: &str) -> Option<Invocation<'a>> {
    let body = content.strip_prefix(prefix)?.trim_start();
    let (name, args_text) = match body.find(char::is_whitespace) {
        Some(i) => (&body[..i], body[i..].trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(Invocation {
        name: name.to_lowercase(),
        args_text,
    })
}

/// Text after the first `skip` whitespace-separated words, line breaks kept
pub fn tail(text: &str, skip: usize) -> &str {
    let mut rest = text.trim_start();
    for _ in 0..skip {
        match rest.find(char::is_whitespace) {
            Some(i) => rest = rest[i..].trim_start(),
            None => return "",
        }
    }
    rest.trim_end()
}

/// Everything a prefix command needs about its invocation
pub struct PrefixContext<'a> {
    pub ctx: &'a serenity::Context,
    pub data: &'a Data,
    pub msg: &'a serenity::Message,
    pub config: &'a ServerConfig,
    pub guild_id: serenity::GuildId,
    pub args: Vec<&'a str>,
    args_text: &'a str,
}

impl<'a> PrefixContext<'a> {
    pub fn new(
        ctx: &'a serenity::Context,
        data: &'a Data,
        msg: &'a serenity::Message,
        config: &'a ServerConfig,
        guild_id: serenity::GuildId,
        args_text: &'a str,
    ) -> Self {
        Self {
            ctx,
            data,
            msg,
            config,
            guild_id,
            args: args_text.split_whitespace().collect(),
            args_text,
        }
    }

    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).copied()
    }

    pub fn rest(&self, skip: usize) -> &'a str {
        tail(self.args_text, skip)
    }

    /// Free-text reason after `skip` arguments
    pub fn reason(&self, skip: usize) -> String {
        match self.rest(skip) {
            "" => NO_REASON.to_string(),
            reason => reason.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn guild_name(&self) -> &str {
        &self.config.guild_name
    }

    pub fn author_roles(&self) -> &[serenity::RoleId] {
        self.msg.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or(&[])
    }

    pub async fn reply(&self, content: impl Into<String>) -> anyhow::Result<()> {
        discord::reply(&self.ctx.http, self.msg, content).await?;
        Ok(())
    }

    pub async fn reply_embed(&self, embed: serenity::CreateEmbed) -> anyhow::Result<()> {
        self.msg
            .channel_id
            .send_message(
                &self.ctx.http,
                serenity::CreateMessage::new()
                    .embed(embed)
                    .reference_message(self.msg)
                    .allowed_mentions(discord::no_pings()),
            )
            .await?;
        Ok(())
    }

    /// Plain message in the invoking channel
    pub async fn say(&self, content: impl Into<String>) -> anyhow::Result<()> {
        self.msg
            .channel_id
            .send_message(
                &self.ctx.http,
                serenity::CreateMessage::new()
                    .content(content.into())
                    .allowed_mentions(discord::no_pings()),
            )
            .await?;
        Ok(())
    }

    /// Post to the log channel when logging is on
    pub async fn log(&self, content: impl Into<String>) {
        discord::log_text(&self.ctx.http, self.config.active_log_channel(), content).await;
    }

    pub async fn log_event(&self, enabled: bool, content: impl Into<String>) {
        if enabled {
            self.log(content).await;
        }
    }

    /// DM a user; on failure note it in the log channel
    pub async fn dm_or_log(&self, user_id: serenity::UserId, text: impl Into<String>, failure: impl Into<String>) -> bool {
        let dm = serenity::CreateMessage::new().content(text.into());
        match user_id.direct_message(self.ctx, dm).await {
            Ok(_) => true,
            Err(_) => {
                self.log(failure).await;
                false
            }
        }
    }

    pub async fn member(&self, user_id: serenity::UserId) -> Option<serenity::Member> {
        self.guild_id.member(self.ctx, user_id).await.ok()
    }

    /// Moderators cannot be targeted by moderation commands
    pub fn is_protected(&self, member: &serenity::Member) -> bool {
        has_moderator_role(self.config, &member.roles)
    }

    pub fn bot_outranks(&self, member: &serenity::Member) -> bool {
        let bot_id = self.ctx.cache.current_user().id;
        self.ctx
            .cache
            .guild(self.guild_id)
            .is_some_and(|g| discord::bot_outranks(&g, bot_id, member))
    }

    /// Apply the moderator gate, replying once on denial
    pub async fn gate(&self) -> anyhow::Result<bool> {
        let decision = moderator_gate(
            self.config,
            self.msg.author.id,
            self.author_roles(),
            self.data.bot_config.bot_owner,
        );
        if let Some(text) = decision.denial_message() {
            self.reply(text).await?;
        }
        Ok(decision == GateDecision::Allow)
    }

    /// Ban-list delete window from the punishment settings
    pub fn delete_message_days(&self) -> u8 {
        self.config
            .moderation
            .punishment
            .delete_message_days
            .clamp(0, 7) as u8
    }
}

async fn run(command: PrefixCommand, pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    match command {
        PrefixCommand::Ban => ban::run(pctx).await,
        PrefixCommand::Kick => kick::run(pctx).await,
        PrefixCommand::Mute => mute::run(pctx).await,
        PrefixCommand::Warn => warn::run(pctx).await,
        PrefixCommand::Unban => unban::run(pctx).await,
        PrefixCommand::Softban => softban::run(pctx).await,
        PrefixCommand::Add => channel_access::run(pctx, channel_access::Access::Grant).await,
        PrefixCommand::Removec => channel_access::run(pctx, channel_access::Access::Revoke).await,
        PrefixCommand::Giver => giver::run(pctx).await,
        PrefixCommand::Botdm => botdm::run(pctx).await,
        PrefixCommand::Faq => faq::run(pctx).await,
        PrefixCommand::Tc => tc::run(pctx).await,
        PrefixCommand::Embed => embed::run(pctx).await,
    }
}

/// Last pipeline stage: temp commands first, then built-ins
pub async fn dispatch(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(Flow::Continue);
    };
    let Some(invocation) = parse_invocation(&msg.content, &config.prefix) else {
        return Ok(Flow::Continue);
    };

    let temp_commands = tc::load(data.store.as_ref(), guild_id).await?;
    if let Some(temp) = find_by_name(&temp_commands, &invocation.name) {
        discord::send_quiet(
            &ctx.http,
            msg.channel_id,
            serenity::CreateMessage::new()
                .content(&temp.response)
                .allowed_mentions(discord::no_pings()),
        )
        .await;
        return Ok(Flow::Handled);
    }

    let Some(command) = PrefixCommand::from_name(&invocation.name) else {
        return Ok(Flow::Continue);
    };
    let pctx = PrefixContext::new(ctx, data, msg, config, guild_id, invocation.args_text);

    if command.is_moderator() && !pctx.gate().await? {
        return Ok(Flow::Handled);
    }

    if let Some(window) = command.cooldown() {
        if let Err(left) = data.cooldowns.try_start(command.name(), guild_id, msg.author.id, window) {
            pctx.reply(wait_message(left)).await?;
            return Ok(Flow::Handled);
        }
    }

    if let Err(e) = run(command, &pctx).await {
        let origin = ErrorSource::new(format!("prefix:{}", command.name()))
            .guild(guild_id, config.guild_name.clone())
            .user(msg.author.id);
        log_error(&ctx.http, data.bot_config.error_log_channel, &origin, &format!("{:#}", e)).await;
        if let Err(e) = discord::reply(&ctx.http, msg, data.bot_config.error_message.as_str()).await {
            tracing::warn!("Could not send error reply in {}: {}", msg.channel_id, e);
        }
    }

    Ok(Flow::Handled)
}
