// Purge a user's recent messages across a guild

use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::models::guild_snapshot::ChannelKind;

pub const PURGE_WINDOW_SECS: i64 = 24 * 60 * 60;
pub const BULK_DELETE_MAX_AGE_SECS: i64 = 14 * 24 * 60 * 60;
pub const MAX_COLLECTED_PER_CHANNEL: usize = 1000;
const PAGE_SIZE: u8 = 100;

/// How collected messages get deleted
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Batches of at most 100 messages young enough for bulk delete
    pub bulk: Vec<Vec<serenity::MessageId>>,
    pub individual: Vec<serenity::MessageId>,
}

/// Split `(id, unix_timestamp)` pairs into bulk batches and single deletes.
pub fn plan_deletions(messages: &[(serenity::MessageId, i64)], now: i64) -> DeletionPlan {
    let cutoff = now - BULK_DELETE_MAX_AGE_SECS;
    let (young, old): (Vec<_>, Vec<_>) = messages.iter().partition(|(_, ts)| *ts >= cutoff);

    DeletionPlan {
        bulk: young
            .chunks(PAGE_SIZE as usize)
            .map(|batch| batch.iter().map(|(id, _)| *id).collect())
            .collect(),
        individual: old.into_iter().map(|(id, _)| id).collect(),
    }
}

/// Channels in the guild where the bot can delete messages
fn purgeable_channels(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Vec<serenity::ChannelId> {
    let bot_id = ctx.cache.current_user().id;
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };
    let Some(bot) = guild.members.get(&bot_id) else {
        return Vec::new();
    };

    guild
        .channels
        .values()
        .filter(|c| ChannelKind::from(c.kind) == ChannelKind::Text)
        .filter(|c| guild.user_permissions_in(c, bot).manage_messages())
        .map(|c| c.id)
        .collect()
}

async fn collect_recent(
    ctx: &serenity::Context,
    channel: serenity::ChannelId,
    user_id: serenity::UserId,
    since: i64,
) -> serenity::Result<Vec<(serenity::MessageId, i64)>> {
    let mut found = Vec::new();
    let mut before: Option<serenity::MessageId> = None;

    while found.len() < MAX_COLLECTED_PER_CHANNEL {
        let mut request = serenity::GetMessages::new().limit(PAGE_SIZE);
        if let Some(before) = before {
            request = request.before(before);
        }
        let page = channel.messages(&ctx.http, request).await?;
        if page.is_empty() {
            break;
        }

        let mut oldest = i64::MAX;
        for msg in &page {
            let ts = msg.timestamp.unix_timestamp();
            if msg.author.id == user_id && ts >= since {
                found.push((msg.id, ts));
            }
            if ts < oldest {
                oldest = ts;
                before = Some(msg.id);
            }
        }

        if oldest < since || page.len() < PAGE_SIZE as usize {
            break;
        }
    }
    Ok(found)
}

/// Delete everything `user_id` posted in the last 24 hours. Best effort:
/// channels that fail are skipped. Returns the number of deleted messages.
pub async fn delete_user_messages_last_day(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> usize {
    let now = chrono::Utc::now().timestamp();
    let since = now - PURGE_WINDOW_SECS;
    let mut deleted = 0;

    for channel in purgeable_channels(ctx, guild_id) {
        let messages = match collect_recent(ctx, channel, user_id, since).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Skipping channel {} while purging {}: {}", channel, user_id, e);
                continue;
            }
        };

        let plan = plan_deletions(&messages, now);
        for batch in plan.bulk {
            let result = if batch.len() == 1 {
                channel.delete_message(&ctx.http, batch[0]).await
            } else {
                channel.delete_messages(&ctx.http, &batch).await
            };
            match result {
                Ok(()) => deleted += batch.len(),
                Err(e) => {
                    debug!("Bulk delete failed in {}, deleting one by one: {}", channel, e);
                    for id in batch {
                        if channel.delete_message(&ctx.http, id).await.is_ok() {
                            deleted += 1;
                        }
                    }
                }
            }
        }
        for id in plan.individual {
            if channel.delete_message(&ctx.http, id).await.is_ok() {
                deleted += 1;
            }
        }
    }

    deleted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> serenity::MessageId {
        serenity::MessageId::new(n)
    }

    #[test]
    fn test_plan_splits_by_age() {
        let now = 100 * 24 * 60 * 60;
        let messages = vec![
            (id(1), now - 60),
            (id(2), now - BULK_DELETE_MAX_AGE_SECS - 1),
            (id(3), now - 3600),
        ];
        let plan = plan_deletions(&messages, now);
        assert_eq!(plan.bulk, vec![vec![id(1), id(3)]]);
        assert_eq!(plan.individual, vec![id(2)]);
    }

    #[test]
    fn test_plan_batches_by_hundred() {
        let now = 1_000_000;
        let messages: Vec<_> = (1..=250).map(|n| (id(n), now)).collect();
        let plan = plan_deletions(&messages, now);
        let sizes: Vec<usize> = plan.bulk.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(plan.individual.is_empty());
    }

    #[test]
    fn test_empty_plan() {
        assert_eq!(plan_deletions(&[], 0), DeletionPlan::default());
    }
}
