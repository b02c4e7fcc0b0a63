// Honeypot - anyone who is not a moderator and posts in the trap channel gets removed
//
// `plan` decides from plain facts; `execute` runs the side effects in a
// fixed order: delete, purge, ban, schedule unban, log.

use std::time::Duration;

use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

use crate::features::permissions::has_moderator_role;
use crate::features::pipeline::Flow;
use crate::models::server_config::{channel_id, ServerConfig};
use crate::services::scheduler::TaskAction;
use crate::utils::config::{colors, HONEYPOT_UNBAN_DELAY_SECS};
use crate::utils::formatters::split_chunks;
use crate::utils::{discord, purge};
use crate::Data;

pub const UNBAN_REASON: &str = "Auto-unban after honeypot ban";
const FIELD_LIMIT: usize = 1024;

pub fn ban_reason(channel: serenity::ChannelId) -> String {
    format!("Posted in honeypot channel ({})", channel)
}

/// Facts about one message and the bot's standing
#[derive(Debug, Clone)]
pub struct HoneypotInput {
    pub author_is_bot: bool,
    pub is_system: bool,
    pub channel_id: serenity::ChannelId,
    pub author_roles: Vec<serenity::RoleId>,
    pub bot_can_manage_messages: bool,
    pub bot_can_ban: bool,
    pub bot_outranks_author: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPlan {
    pub honeypot_channel: serenity::ChannelId,
    pub delete_message: bool,
    pub ban: bool,
    pub auto_unban: bool,
    pub log_channel: Option<serenity::ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoneypotPlan {
    Ignore,
    Trigger(TriggerPlan),
}

pub fn plan(input: &HoneypotInput, config: &ServerConfig) -> HoneypotPlan {
    let honeypot = &config.features.honeypot;
    if input.author_is_bot || input.is_system || !honeypot.enabled {
        return HoneypotPlan::Ignore;
    }

    let Some(trap) = channel_id(honeypot.channel_id.as_ref()) else {
        return HoneypotPlan::Ignore;
    };
    if trap != input.channel_id {
        return HoneypotPlan::Ignore;
    }

    if has_moderator_role(config, &input.author_roles) {
        return HoneypotPlan::Ignore;
    }

    let ban = honeypot.auto_ban && input.bot_can_ban && input.bot_outranks_author;
    HoneypotPlan::Trigger(TriggerPlan {
        honeypot_channel: trap,
        delete_message: honeypot.delete_message && input.bot_can_manage_messages,
        ban,
        auto_unban: ban && honeypot.auto_unban,
        log_channel: config.active_log_channel(),
    })
}

/// What gets written to the log channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoneypotReport {
    pub user_id: serenity::UserId,
    pub user_tag: String,
    pub honeypot_channel: serenity::ChannelId,
    pub content: String,
}

impl HoneypotReport {
    pub fn fields(&self) -> Vec<(String, String)> {
        let content = if self.content.is_empty() { "--" } else { self.content.as_str() };

        let mut fields = vec![("User ID".to_string(), self.user_id.to_string())];
        for (i, chunk) in split_chunks(content, FIELD_LIMIT).into_iter().enumerate() {
            let name = if i == 0 {
                "Message".to_string()
            } else {
                format!("Message (part {})", i)
            };
            fields.push((name, chunk));
        }
        fields
    }

    pub fn embed(&self) -> serenity::CreateEmbed {
        let fields = self.fields().into_iter().map(|(name, value)| (name, value, false));
        serenity::CreateEmbed::new()
            .title("Honeypot Triggered.")
            .description(format!(
                "User **{}** posted in honeypot <#{}>",
                self.user_tag, self.honeypot_channel
            ))
            .fields(fields)
            .color(colors::HONEYPOT)
            .timestamp(serenity::Timestamp::now())
    }
}

/// Side effects of a triggered honeypot
pub trait HoneypotEffects: Send + Sync {
    fn delete_message(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn purge_recent_messages(&self) -> BoxFuture<'_, anyhow::Result<usize>>;
    fn ban(&self, reason: String) -> BoxFuture<'_, anyhow::Result<()>>;
    fn schedule_unban(&self, delay: Duration) -> BoxFuture<'_, anyhow::Result<()>>;
    fn log(
        &self,
        channel: serenity::ChannelId,
        report: &HoneypotReport,
    ) -> BoxFuture<'_, anyhow::Result<()>>;
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct HoneypotOutcome {
    pub deleted: bool,
    pub purged: Option<usize>,
    pub banned: bool,
    pub unban_scheduled: bool,
    pub logged: bool,
}

/// Run a triggered plan. Every step is best effort; only a failed ban
/// stops anything (no unban is scheduled without a ban).
pub async fn execute(
    plan: &TriggerPlan,
    effects: &dyn HoneypotEffects,
    report: &HoneypotReport,
) -> HoneypotOutcome {
    let mut outcome = HoneypotOutcome::default();

    if plan.delete_message {
        match effects.delete_message().await {
            Ok(()) => outcome.deleted = true,
            Err(e) => warn!("Honeypot: failed to delete message from {}: {}", report.user_id, e),
        }
    }

    if plan.ban {
        match effects.purge_recent_messages().await {
            Ok(count) => {
                if count > 0 {
                    info!("Deleted {} messages from user {} before honeypot ban", count, report.user_id);
                }
                outcome.purged = Some(count);
            }
            Err(e) => warn!("Honeypot: purge before ban failed for {}: {}", report.user_id, e),
        }

        match effects.ban(ban_reason(plan.honeypot_channel)).await {
            Ok(()) => outcome.banned = true,
            Err(e) => warn!("Honeypot: failed to ban {}: {}", report.user_id, e),
        }

        if outcome.banned && plan.auto_unban {
            match effects
                .schedule_unban(Duration::from_secs(HONEYPOT_UNBAN_DELAY_SECS))
                .await
            {
                Ok(()) => outcome.unban_scheduled = true,
                Err(e) => warn!("Honeypot: failed to schedule unban for {}: {}", report.user_id, e),
            }
        }
    }

    if let Some(channel) = plan.log_channel {
        match effects.log(channel, report).await {
            Ok(()) => outcome.logged = true,
            Err(e) => warn!("Honeypot: failed to log to {}: {}", channel, e),
        }
    }

    outcome
}

struct DiscordEffects<'a> {
    ctx: &'a serenity::Context,
    data: &'a Data,
    msg: &'a serenity::Message,
    guild_id: serenity::GuildId,
}

impl HoneypotEffects for DiscordEffects<'_> {
    fn delete_message(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { Ok(self.msg.delete(&self.ctx.http).await?) })
    }

    fn purge_recent_messages(&self) -> BoxFuture<'_, anyhow::Result<usize>> {
        Box::pin(async move {
            Ok(purge::delete_user_messages_last_day(self.ctx, self.guild_id, self.msg.author.id).await)
        })
    }

    fn ban(&self, reason: String) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.guild_id
                .ban_with_reason(&self.ctx.http, self.msg.author.id, 0, reason)
                .await?;
            Ok(())
        })
    }

    fn schedule_unban(&self, delay: Duration) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let action = TaskAction::Unban {
                guild_id: self.guild_id,
                user_id: self.msg.author.id,
                reason: UNBAN_REASON.to_string(),
                announce: None,
            };
            self.data.scheduler.schedule(delay, action).await?;
            Ok(())
        })
    }

    fn log(
        &self,
        channel: serenity::ChannelId,
        report: &HoneypotReport,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        let embed = report.embed();
        Box::pin(async move {
            channel
                .send_message(&self.ctx.http, serenity::CreateMessage::new().embed(embed))
                .await?;
            Ok(())
        })
    }
}

/// Read the bot's permissions and rank from the cache
fn standing(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    msg: &serenity::Message,
) -> Option<(bool, bool, bool)> {
    let bot_id = ctx.cache.current_user().id;
    let guild = ctx.cache.guild(guild_id)?;
    let bot = guild.members.get(&bot_id)?;

    let can_manage = guild
        .channels
        .get(&msg.channel_id)
        .map(|c| guild.user_permissions_in(c, bot).manage_messages())
        .unwrap_or(false);
    let can_ban = guild.member_permissions(bot).ban_members();

    let author_roles = msg.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or(&[]);
    let outranks = msg.author.id != guild.owner_id
        && discord::top_role_position(&guild, bot) > discord::top_position_of(&guild, author_roles);

    Some((can_manage, can_ban, outranks))
}

/// Message stage: a triggered honeypot consumes the message.
pub async fn handle(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(Flow::Continue);
    };
    if !config.features.honeypot.enabled {
        return Ok(Flow::Continue);
    }

    let (bot_can_manage_messages, bot_can_ban, bot_outranks_author) =
        standing(ctx, guild_id, msg).unwrap_or((false, false, false));

    let input = HoneypotInput {
        author_is_bot: msg.author.bot,
        is_system: discord::is_system(msg),
        channel_id: msg.channel_id,
        author_roles: msg.member.as_ref().map(|m| m.roles.clone()).unwrap_or_default(),
        bot_can_manage_messages,
        bot_can_ban,
        bot_outranks_author,
    };

    let HoneypotPlan::Trigger(trigger) = plan(&input, config) else {
        return Ok(Flow::Continue);
    };

    info!("Honeypot triggered by {} in guild {}", msg.author.id, guild_id);
    let report = HoneypotReport {
        user_id: msg.author.id,
        user_tag: msg.author.tag(),
        honeypot_channel: trigger.honeypot_channel,
        content: msg.content.clone(),
    };
    let effects = DiscordEffects {
        ctx,
        data,
        msg,
        guild_id,
    };
    execute(&trigger, &effects, &report).await;

    Ok(Flow::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const TRAP: u64 = 500;
    const LOG: u64 = 600;
    const MOD_ROLE: u64 = 100;

    fn config() -> ServerConfig {
        let mut config = ServerConfig::new("1", "Guild", "42");
        config.permissions.moderator_roles = vec![MOD_ROLE.to_string()];
        config.logging.log_channel_id = Some(LOG.to_string());
        let honeypot = &mut config.features.honeypot;
        honeypot.enabled = true;
        honeypot.channel_id = Some(TRAP.to_string());
        honeypot.delete_message = true;
        honeypot.auto_ban = true;
        honeypot.auto_unban = true;
        config
    }

    fn input() -> HoneypotInput {
        HoneypotInput {
            author_is_bot: false,
            is_system: false,
            channel_id: serenity::ChannelId::new(TRAP),
            author_roles: vec![serenity::RoleId::new(7)],
            bot_can_manage_messages: true,
            bot_can_ban: true,
            bot_outranks_author: true,
        }
    }

    fn report() -> HoneypotReport {
        HoneypotReport {
            user_id: serenity::UserId::new(9),
            user_tag: "spammer".into(),
            honeypot_channel: serenity::ChannelId::new(TRAP),
            content: "free nitro".into(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_purge: bool,
        fail_ban: bool,
        fail_delete: bool,
    }

    impl Recorder {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HoneypotEffects for Recorder {
        fn delete_message(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.record("delete");
                if self.fail_delete {
                    anyhow::bail!("missing permissions");
                }
                Ok(())
            })
        }

        fn purge_recent_messages(&self) -> BoxFuture<'_, anyhow::Result<usize>> {
            Box::pin(async move {
                self.record("purge");
                if self.fail_purge {
                    anyhow::bail!("purge exploded");
                }
                Ok(3)
            })
        }

        fn ban(&self, reason: String) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.record(format!("ban:{}", reason));
                if self.fail_ban {
                    anyhow::bail!("cannot ban");
                }
                Ok(())
            })
        }

        fn schedule_unban(&self, delay: Duration) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.record(format!("unban:{}", delay.as_secs()));
                Ok(())
            })
        }

        fn log(
            &self,
            channel: serenity::ChannelId,
            _report: &HoneypotReport,
        ) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.record(format!("log:{}", channel));
                Ok(())
            })
        }
    }

    fn trigger(config: &ServerConfig, input: &HoneypotInput) -> TriggerPlan {
        match plan(input, config) {
            HoneypotPlan::Trigger(t) => t,
            HoneypotPlan::Ignore => panic!("expected honeypot to trigger"),
        }
    }

    #[test]
    fn test_moderator_bypass() {
        let mut input = input();
        input.author_roles.push(serenity::RoleId::new(MOD_ROLE));
        assert_eq!(plan(&input, &config()), HoneypotPlan::Ignore);
    }

    #[test]
    fn test_ignores_other_channels_bots_and_disabled() {
        let config = config();

        let mut other = input();
        other.channel_id = serenity::ChannelId::new(1);
        assert_eq!(plan(&other, &config), HoneypotPlan::Ignore);

        let mut bot = input();
        bot.author_is_bot = true;
        assert_eq!(plan(&bot, &config), HoneypotPlan::Ignore);

        let mut system = input();
        system.is_system = true;
        assert_eq!(plan(&system, &config), HoneypotPlan::Ignore);

        let mut disabled = config.clone();
        disabled.features.honeypot.enabled = false;
        assert_eq!(plan(&input(), &disabled), HoneypotPlan::Ignore);

        let mut unset = config;
        unset.features.honeypot.channel_id = None;
        assert_eq!(plan(&input(), &unset), HoneypotPlan::Ignore);
    }

    #[test]
    fn test_plan_respects_bot_standing() {
        let config = config();
        let mut weak = input();
        weak.bot_outranks_author = false;
        weak.bot_can_manage_messages = false;

        let t = trigger(&config, &weak);
        assert!(!t.delete_message);
        assert!(!t.ban);
        assert!(!t.auto_unban);
        assert_eq!(t.log_channel, Some(serenity::ChannelId::new(LOG)));
    }

    #[test]
    fn test_no_log_when_logging_disabled() {
        let mut config = config();
        config.logging.enabled = false;
        assert_eq!(trigger(&config, &input()).log_channel, None);
    }

    #[tokio::test]
    async fn test_full_sequence_in_order() {
        let config = config();
        let t = trigger(&config, &input());
        let recorder = Recorder::default();

        let outcome = execute(&t, &recorder, &report()).await;
        assert_eq!(
            recorder.calls(),
            vec![
                "delete".to_string(),
                "purge".to_string(),
                format!("ban:Posted in honeypot channel ({})", TRAP),
                "unban:10".to_string(),
                format!("log:{}", LOG),
            ]
        );
        assert_eq!(
            outcome,
            HoneypotOutcome {
                deleted: true,
                purged: Some(3),
                banned: true,
                unban_scheduled: true,
                logged: true,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_purge_and_delete_do_not_block_ban() {
        let t = trigger(&config(), &input());
        let recorder = Recorder {
            fail_purge: true,
            fail_delete: true,
            ..Default::default()
        };

        let outcome = execute(&t, &recorder, &report()).await;
        assert!(!outcome.deleted);
        assert_eq!(outcome.purged, None);
        assert!(outcome.banned);
        assert!(outcome.unban_scheduled);
        assert_eq!(recorder.calls()[0], "delete");
        assert_eq!(recorder.calls()[3], "unban:10");
    }

    #[tokio::test]
    async fn test_failed_ban_skips_unban() {
        let t = trigger(&config(), &input());
        let recorder = Recorder {
            fail_ban: true,
            ..Default::default()
        };

        let outcome = execute(&t, &recorder, &report()).await;
        assert!(!outcome.banned);
        assert!(!outcome.unban_scheduled);
        assert!(!recorder.calls().iter().any(|c| c.starts_with("unban")));
        assert!(outcome.logged);
    }

    #[test]
    fn test_report_fields_chunk_content() {
        let mut report = report();
        report.content = "x".repeat(2100);
        let fields = report.fields();
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["User ID", "Message", "Message (part 1)", "Message (part 2)"]);
        assert_eq!(fields[0].1, "9");
        assert_eq!(fields[3].1.len(), 52);

        report.content.clear();
        assert_eq!(report.fields()[1], ("Message".to_string(), "--".to_string()));
    }

    #[test]
    fn test_report_embed_uses_honeypot_color() {
        let embed = serde_json::to_value(report().embed()).unwrap();
        assert_eq!(embed["color"], colors::HONEYPOT);
        assert_eq!(embed["title"], "Honeypot Triggered.");
    }
}
