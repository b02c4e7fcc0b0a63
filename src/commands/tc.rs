// tc - temporary commands: guild-defined `<prefix><name>` canned replies
//
// Creation is a two-step draft answered with plain messages in the same
// channel: first the name, then the response. Each step has its own
// timeout; a later step supersedes the earlier timer via the generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use poise::serenity_prelude as serenity;

use super::{is_reserved_name, PrefixContext};
use crate::features::pipeline::Flow;
use crate::models::entries::{
    find_by_name, remove_by_name, TempCommand, MAX_TEMP_COMMAND_NAME_LEN, MAX_TEMP_COMMAND_RESPONSE_LEN,
    TEMP_COMMANDS_KEY,
};
use crate::models::server_config::ServerConfig;
use crate::storage::{get_typed, set_typed, KvStore, StoreError};
use crate::utils::discord;
use crate::utils::sessions::SessionStore;
use crate::Data;

pub const NAME_WINDOW: Duration = Duration::from_secs(60);
pub const RESPONSE_WINDOW: Duration = Duration::from_secs(120);
/// Drafts outlive their window slightly so the timer sees them first
const DRAFT_GRACE: Duration = Duration::from_secs(5);

const CANCEL_WORD: &str = "cancel";

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub type DraftKey = (serenity::GuildId, serenity::UserId);
pub type Drafts = SessionStore<DraftKey, Draft>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftStep {
    Name,
    Response { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub channel_id: serenity::ChannelId,
    pub step: DraftStep,
    pub generation: u64,
}

/// What a reply to a draft prompt leads to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftOutcome {
    Cancelled,
    /// Input rejected; the draft stays open
    Retry(String),
    AskResponse { name: String },
    Create { name: String, response: String },
}

pub async fn load(store: &dyn KvStore, guild_id: serenity::GuildId) -> Result<Vec<TempCommand>, StoreError> {
    Ok(get_typed(store, guild_id, TEMP_COMMANDS_KEY).await?.unwrap_or_default())
}

async fn save(store: &dyn KvStore, guild_id: serenity::GuildId, commands: &[TempCommand]) -> Result<(), StoreError> {
    set_typed(store, guild_id, TEMP_COMMANDS_KEY, &commands).await
}

pub fn list_text(commands: &[TempCommand], prefix: &str) -> String {
    if commands.is_empty() {
        return format!(
            "No temporary commands have been created yet.\n\nModerators can use `{}tc` to create one.",
            prefix
        );
    }
    let lines: Vec<String> = commands.iter().map(|c| format!("- {}", c.name)).collect();
    let plural = if commands.len() == 1 { "" } else { "s" };
    format!(
        "**Temporary Commands**\nUse `{}<command name>` to execute a temporary command.\n\n{}\n\nTotal: {} command{}",
        prefix,
        lines.join("\n"),
        commands.len(),
        plural
    )
}

pub fn name_prompt() -> &'static str {
    "**Create Temporary Command**\n\n**Command name?**\n\nReply with the name for your temporary command (e.g., `welcome`, `rules`). **Make sure they are lowercase**\n\nType `cancel` to cancel."
}

pub fn response_prompt(name: &str) -> String {
    format!(
        "**Create Temporary Command**\n\n**Command name:** `{}`\n\n**What do you want this command to say?**\n\nReply with the response text. Type `cancel` to cancel.",
        name
    )
}

/// Apply one reply to the current draft step
pub fn advance(step: &DraftStep, input: &str, existing: &[TempCommand], prefix: &str) -> DraftOutcome {
    let input = input.trim();
    if input.eq_ignore_ascii_case(CANCEL_WORD) {
        return DraftOutcome::Cancelled;
    }

    match step {
        DraftStep::Name => {
            let name = input.to_lowercase();
            if name.is_empty() {
                return DraftOutcome::Retry("Invalid command name. Please provide a valid name.".into());
            }
            if name.chars().count() > MAX_TEMP_COMMAND_NAME_LEN {
                return DraftOutcome::Retry("Command name must be 30 characters or less.".into());
            }
            if name.contains(char::is_whitespace) {
                return DraftOutcome::Retry("Command name cannot contain spaces.".into());
            }
            if find_by_name(existing, &name).is_some() {
                return DraftOutcome::Retry(format!(
                    "A temporary command with the name \"{}\" already exists. Use `{}tc remove {}` to remove it first.",
                    name, prefix, name
                ));
            }
            if is_reserved_name(&name) {
                return DraftOutcome::Retry(format!(
                    "\"{}\" is already a built-in command. Please choose a different name.",
                    name
                ));
            }
            DraftOutcome::AskResponse { name }
        }
        DraftStep::Response { name } => {
            if input.is_empty() {
                return DraftOutcome::Retry("Invalid response. Please provide a response text.".into());
            }
            if input.chars().count() > MAX_TEMP_COMMAND_RESPONSE_LEN {
                return DraftOutcome::Retry("Response text must be 2000 characters or less.".into());
            }
            DraftOutcome::Create {
                name: name.clone(),
                response: input.to_string(),
            }
        }
    }
}

fn window(step: &DraftStep) -> Duration {
    match step {
        DraftStep::Name => NAME_WINDOW,
        DraftStep::Response { .. } => RESPONSE_WINDOW,
    }
}

/// Store a draft step and arm its timeout
fn open_step(
    http: Arc<serenity::Http>,
    drafts: Arc<Drafts>,
    key: DraftKey,
    channel_id: serenity::ChannelId,
    step: DraftStep,
) {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    let wait = window(&step);
    drafts.insert_for(
        key,
        Draft {
            channel_id,
            step,
            generation,
        },
        wait + DRAFT_GRACE,
    );

    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        if drafts.take_if(&key, |d| d.generation == generation).is_some() {
            discord::send_quiet(
                &http,
                channel_id,
                serenity::CreateMessage::new()
                    .content(format!("<@{}> Command creation timed out.", key.1))
                    .allowed_mentions(discord::no_pings()),
            )
            .await;
        }
    });
}

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    match pctx.arg(0).map(str::to_lowercase).as_deref() {
        Some("list") => {
            let commands = load(pctx.data.store.as_ref(), pctx.guild_id).await?;
            pctx.reply(list_text(&commands, pctx.prefix())).await
        }
        Some("remove") => remove(pctx).await,
        _ => create(pctx).await,
    }
}

async fn remove(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    if !pctx.gate().await? {
        return Ok(());
    }
    let Some(name) = pctx.arg(1).map(str::to_lowercase) else {
        return pctx
            .reply(format!(
                "Usage: `{p}tc remove <name>`\nExample: `{p}tc remove welcome`",
                p = pctx.prefix()
            ))
            .await;
    };

    let store = pctx.data.store.as_ref();
    let mut commands = load(store, pctx.guild_id).await?;
    let Some(found) = find_by_name(&commands, &name).map(|c| c.name.clone()) else {
        return pctx.reply(format!("Temporary command \"{}\" not found.", name)).await;
    };

    let key = (pctx.guild_id, pctx.msg.author.id);
    let confirmed = pctx
        .data
        .tc_removals
        .take_if(&key, |pending| pending.eq_ignore_ascii_case(&name))
        .is_some();
    if !confirmed {
        pctx.data.tc_removals.insert(key, name.clone());
        return pctx
            .reply(format!(
                "**Confirm Removal**\n\nAre you sure you want to remove **{}**?\n\nRun `{}tc remove {}` again to confirm.",
                found,
                pctx.prefix(),
                name
            ))
            .await;
    }

    remove_by_name(&mut commands, &name);
    save(store, pctx.guild_id, &commands).await?;
    pctx.reply(format!("Temporary command \"{}\" has been removed.", found)).await
}

async fn create(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    if !pctx.gate().await? {
        return Ok(());
    }
    let key = (pctx.guild_id, pctx.msg.author.id);
    if pctx.data.tc_drafts.contains(&key) {
        return pctx
            .reply("You already have an active command creation process. Please complete it first.")
            .await;
    }

    pctx.reply(name_prompt()).await?;
    open_step(
        pctx.ctx.http.clone(),
        pctx.data.tc_drafts.clone(),
        key,
        pctx.msg.channel_id,
        DraftStep::Name,
    );
    Ok(())
}

/// Pipeline stage: feed a message to its author's open draft
pub async fn continue_draft(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
    config: &ServerConfig,
) -> anyhow::Result<Flow> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(Flow::Continue);
    };
    let key = (guild_id, msg.author.id);
    let Some(draft) = data.tc_drafts.get(&key).filter(|d| d.channel_id == msg.channel_id) else {
        return Ok(Flow::Continue);
    };

    let store = data.store.as_ref();
    let mut commands = load(store, guild_id).await?;
    let reply = match advance(&draft.step, &msg.content, &commands, &config.prefix) {
        DraftOutcome::Cancelled => {
            data.tc_drafts.remove(&key);
            "Command creation cancelled.".to_string()
        }
        DraftOutcome::Retry(text) => text,
        DraftOutcome::AskResponse { name } => {
            let prompt = response_prompt(&name);
            open_step(
                ctx.http.clone(),
                data.tc_drafts.clone(),
                key,
                msg.channel_id,
                DraftStep::Response { name },
            );
            prompt
        }
        DraftOutcome::Create { name, response } => {
            data.tc_drafts.remove(&key);
            let text = format!(
                "**Temporary Command Created**\n\n**Command:** `{}{}`\n**Response:** {}\n\nCreated by {}",
                config.prefix,
                name,
                response,
                msg.author.tag()
            );
            commands.push(TempCommand {
                name,
                response,
                creator_id: msg.author.id.to_string(),
                creator_tag: msg.author.tag(),
                created_at: Utc::now(),
            });
            save(store, guild_id, &commands).await?;
            text
        }
    };

    discord::reply(&ctx.http, msg, reply).await?;
    Ok(Flow::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn command(name: &str) -> TempCommand {
        TempCommand {
            name: name.into(),
            response: "hi".into(),
            creator_id: "1".into(),
            creator_tag: "mod".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_name_step() {
        let existing = vec![command("rules")];
        assert_eq!(
            advance(&DraftStep::Name, " Welcome ", &existing, "."),
            DraftOutcome::AskResponse { name: "welcome".into() }
        );
        assert_eq!(advance(&DraftStep::Name, "CANCEL", &existing, "."), DraftOutcome::Cancelled);

        let long = "n".repeat(31);
        let rejected = [
            ("", "Invalid command name"),
            (long.as_str(), "30 characters"),
            ("two words", "cannot contain spaces"),
            ("Rules", "already exists. Use `.tc remove rules`"),
            ("ban", "already a built-in command"),
            ("setprefix", "already a built-in command"),
        ];
        for (input, expected) in rejected {
            match advance(&DraftStep::Name, input, &existing, ".") {
                DraftOutcome::Retry(text) => assert!(text.contains(expected), "{}: {}", input, text),
                other => panic!("{:?} accepted as {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_response_step() {
        let step = DraftStep::Response { name: "welcome".into() };
        assert_eq!(
            advance(&step, "  Hello there!  ", &[], "."),
            DraftOutcome::Create {
                name: "welcome".into(),
                response: "Hello there!".into()
            }
        );
        assert!(matches!(advance(&step, "   ", &[], "."), DraftOutcome::Retry(_)));
        assert!(matches!(advance(&step, &"r".repeat(2001), &[], "."), DraftOutcome::Retry(_)));
        assert_eq!(advance(&step, "cancel", &[], "."), DraftOutcome::Cancelled);
    }

    #[test]
    fn test_list_text() {
        assert!(list_text(&[], "!").contains("`!tc`"));
        assert_eq!(
            list_text(&[command("rules")], "."),
            "**Temporary Commands**\nUse `.<command name>` to execute a temporary command.\n\n- rules\n\nTotal: 1 command"
        );
        assert!(list_text(&[command("a"), command("b")], ".").ends_with("Total: 2 commands"));
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let store = MemoryStore::new();
        let guild = serenity::GuildId::new(3);
        assert!(load(&store, guild).await.unwrap().is_empty());
        save(&store, guild, &[command("rules")]).await.unwrap();
        assert_eq!(load(&store, guild).await.unwrap().len(), 1);
    }
}
