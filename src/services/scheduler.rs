// Scheduler - durable delayed actions (auto-unban, mute-end notice)
//
// Pending tasks live in a JSON file so a restart re-arms them instead of
// dropping them. Actions are idempotent; a task is removed once it has run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use once_cell::sync::OnceCell;
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::storage::write_atomic;
use crate::utils::discord::{error_code, UNKNOWN_BAN};

/// A message posted to a channel after the action ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub channel_id: serenity::ChannelId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TaskAction {
    Unban {
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        reason: String,
        announce: Option<Announcement>,
    },
    MuteEnded {
        guild_id: serenity::GuildId,
        guild_name: String,
        user_id: serenity::UserId,
        log_channel_id: Option<serenity::ChannelId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: u64,
    pub due_at: DateTime<Utc>,
    pub action: TaskAction,
}

/// Carries out a due action
pub trait TaskRunner: Send + Sync {
    fn run<'a>(&'a self, action: &'a TaskAction) -> BoxFuture<'a, anyhow::Result<()>>;
}

pub struct Scheduler {
    path: PathBuf,
    tasks: Mutex<Vec<ScheduledTask>>,
    next_id: AtomicU64,
    runner: OnceCell<Arc<dyn TaskRunner>>,
}

impl Scheduler {
    /// Load pending tasks from `path`. A missing file means nothing is pending.
    pub async fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let tasks: Vec<ScheduledTask> = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("reading scheduled tasks from {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let next_id = tasks.iter().map(|t| t.id).max().map_or(1, |id| id + 1);
        Ok(Self {
            path,
            tasks: Mutex::new(tasks),
            next_id: AtomicU64::new(next_id),
            runner: OnceCell::new(),
        })
    }

    /// Attach the runner and arm every pending task. Later calls are ignored.
    pub async fn start(self: &Arc<Self>, runner: Arc<dyn TaskRunner>) {
        if self.runner.set(runner.clone()).is_err() {
            return;
        }

        let pending = self.tasks.lock().await.clone();
        if !pending.is_empty() {
            info!("Re-arming {} scheduled task(s)", pending.len());
        }
        for task in pending {
            self.arm(runner.clone(), task);
        }
    }

    /// Persist a task due after `delay`, arming it right away when started.
    pub async fn schedule(self: &Arc<Self>, delay: Duration, action: TaskAction) -> anyhow::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let due_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let task = ScheduledTask { id, due_at, action };

        {
            let mut tasks = self.tasks.lock().await;
            let mut next = tasks.clone();
            next.push(task.clone());
            self.persist(&next).await?;
            *tasks = next;
        }
        debug!("Scheduled task {} due at {}", id, due_at);

        if let Some(runner) = self.runner.get() {
            self.arm(runner.clone(), task);
        }
        Ok(id)
    }

    /// Drop every pending task whose action matches; armed timers for them do nothing.
    pub async fn cancel_where(&self, pred: impl Fn(&TaskAction) -> bool) -> anyhow::Result<usize> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| !pred(&t.action));
        let dropped = before - tasks.len();
        if dropped > 0 {
            self.persist(&tasks).await?;
            debug!("Cancelled {} scheduled task(s)", dropped);
        }
        Ok(dropped)
    }

    /// Drop a pending mute-end notice for this member
    pub async fn cancel_mute_end(&self, guild_id: serenity::GuildId, user_id: serenity::UserId) -> anyhow::Result<usize> {
        self.cancel_where(|action| {
            matches!(action, TaskAction::MuteEnded { guild_id: g, user_id: u, .. } if *g == guild_id && *u == user_id)
        })
        .await
    }

    async fn is_pending(&self, id: u64) -> bool {
        self.tasks.lock().await.iter().any(|t| t.id == id)
    }

    pub async fn pending(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().await.clone()
    }

    async fn complete(&self, id: u64) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|t| t.id != id);
        if let Err(e) = self.persist(&tasks).await {
            warn!("Failed to persist scheduled tasks after completing {}: {}", id, e);
        }
    }

    async fn persist(&self, tasks: &[ScheduledTask]) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(tasks)?;
        write_atomic(&self.path, &bytes)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }

    fn arm(self: &Arc<Self>, runner: Arc<dyn TaskRunner>, task: ScheduledTask) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let wait = (task.due_at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if !scheduler.is_pending(task.id).await {
                debug!("Scheduled task {} was cancelled", task.id);
                return;
            }
            if let Err(e) = runner.run(&task.action).await {
                warn!("Scheduled task {} failed: {:#}", task.id, e);
            }
            scheduler.complete(task.id).await;
        });
    }
}

/// Runs actions against the Discord REST API
pub struct HttpRunner {
    http: Arc<serenity::Http>,
}

impl HttpRunner {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    async fn unban(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        reason: &str,
        announce: Option<&Announcement>,
    ) -> anyhow::Result<()> {
        match self.http.remove_ban(guild_id, user_id, Some(reason)).await {
            Ok(()) => info!("Unbanned {} in guild {}: {}", user_id, guild_id, reason),
            Err(e) if error_code(&e) == Some(UNKNOWN_BAN) => {
                debug!("User {} was already unbanned in guild {}", user_id, guild_id);
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(announce) = announce {
            announce
                .channel_id
                .send_message(
                    &*self.http,
                    serenity::CreateMessage::new()
                        .content(&announce.content)
                        .allowed_mentions(serenity::CreateAllowedMentions::new()),
                )
                .await?;
        }
        Ok(())
    }

    async fn mute_ended(
        &self,
        guild_name: &str,
        user_id: serenity::UserId,
        log_channel_id: Option<serenity::ChannelId>,
    ) -> anyhow::Result<()> {
        let dm = serenity::CreateMessage::new()
            .content(format!("Your mute in **{}** has ended.", guild_name));

        if user_id.direct_message(&*self.http, dm).await.is_err() {
            if let Some(channel) = log_channel_id {
                channel
                    .send_message(
                        &*self.http,
                        serenity::CreateMessage::new()
                            .content(format!("Could not send DM to <@{}> after the mute ended.", user_id))
                            .allowed_mentions(serenity::CreateAllowedMentions::new()),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

impl TaskRunner for HttpRunner {
    fn run<'a>(&'a self, action: &'a TaskAction) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            match action {
                TaskAction::Unban {
                    guild_id,
                    user_id,
                    reason,
                    announce,
                } => self.unban(*guild_id, *user_id, reason, announce.as_ref()).await,
                TaskAction::MuteEnded {
                    guild_name,
                    user_id,
                    log_channel_id,
                    ..
                } => self.mute_ended(guild_name, *user_id, *log_channel_id).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct RecordingRunner {
        tx: mpsc::UnboundedSender<TaskAction>,
    }

    impl TaskRunner for RecordingRunner {
        fn run<'a>(&'a self, action: &'a TaskAction) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                let _ = self.tx.send(action.clone());
                Ok(())
            })
        }
    }

    fn unban(user: u64) -> TaskAction {
        TaskAction::Unban {
            guild_id: serenity::GuildId::new(1),
            user_id: serenity::UserId::new(user),
            reason: "Auto-unban after honeypot ban".to_string(),
            announce: None,
        }
    }

    #[tokio::test]
    async fn test_tasks_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduled_tasks.json");

        let scheduler = Arc::new(Scheduler::load(&path).await.unwrap());
        let first = scheduler.schedule(Duration::from_secs(3600), unban(7)).await.unwrap();
        scheduler.schedule(Duration::from_secs(3600), unban(8)).await.unwrap();

        let reloaded = Scheduler::load(&path).await.unwrap();
        let pending = reloaded.pending().await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[0].action, unban(7));
        assert_eq!(reloaded.next_id.load(Ordering::SeqCst), first + 2);
    }

    #[tokio::test]
    async fn test_start_runs_overdue_tasks_and_clears_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduled_tasks.json");

        let scheduler = Arc::new(Scheduler::load(&path).await.unwrap());
        scheduler.schedule(Duration::ZERO, unban(9)).await.unwrap();

        let reloaded = Arc::new(Scheduler::load(&path).await.unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();
        reloaded.start(Arc::new(RecordingRunner { tx })).await;

        let ran = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(ran, Some(unban(9)));

        for _ in 0..100 {
            if reloaded.pending().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reloaded.pending().await.is_empty());
        assert!(Scheduler::load(&path).await.unwrap().pending().await.is_empty());
    }

    #[test]
    fn test_action_wire_shape() {
        let action = TaskAction::MuteEnded {
            guild_id: serenity::GuildId::new(1),
            guild_name: "Guild".to_string(),
            user_id: serenity::UserId::new(5),
            log_channel_id: None,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["kind"], "muteEnded");
        assert_eq!(value["guildName"], "Guild");
    }

    fn mute_end(guild: u64, user: u64) -> TaskAction {
        TaskAction::MuteEnded {
            guild_id: serenity::GuildId::new(guild),
            guild_name: "Guild".to_string(),
            user_id: serenity::UserId::new(user),
            log_channel_id: None,
        }
    }

    #[tokio::test]
    async fn test_cancel_mute_end_only_drops_that_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduled_tasks.json");

        let scheduler = Arc::new(Scheduler::load(&path).await.unwrap());
        scheduler.schedule(Duration::from_secs(3600), mute_end(1, 5)).await.unwrap();
        scheduler.schedule(Duration::from_secs(3600), mute_end(2, 5)).await.unwrap();
        scheduler.schedule(Duration::from_secs(3600), unban(5)).await.unwrap();

        let dropped = scheduler
            .cancel_mute_end(serenity::GuildId::new(1), serenity::UserId::new(5))
            .await
            .unwrap();
        assert_eq!(dropped, 1);

        let actions: Vec<TaskAction> = Scheduler::load(&path)
            .await
            .unwrap()
            .pending()
            .await
            .into_iter()
            .map(|t| t.action)
            .collect();
        assert_eq!(actions, vec![mute_end(2, 5), unban(5)]);
    }

    #[tokio::test]
    async fn test_cancelled_task_does_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Arc::new(Scheduler::load(dir.path().join("tasks.json")).await.unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();
        scheduler.start(Arc::new(RecordingRunner { tx })).await;

        scheduler.schedule(Duration::from_millis(100), mute_end(1, 5)).await.unwrap();
        scheduler.schedule(Duration::from_millis(300), unban(6)).await.unwrap();
        scheduler
            .cancel_mute_end(serenity::GuildId::new(1), serenity::UserId::new(5))
            .await
            .unwrap();

        let ran = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(ran, Some(unban(6)));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_task_out() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        let scheduler = Arc::new(Scheduler::load(blocked.join("tasks.json")).await.unwrap());

        // a plain file where the parent directory should be
        std::fs::write(&blocked, b"").unwrap();
        assert!(scheduler.schedule(Duration::from_secs(60), unban(3)).await.is_err());
        assert!(scheduler.pending().await.is_empty());
    }
}
