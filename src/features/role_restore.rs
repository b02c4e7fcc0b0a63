// Role restore - remember a leaving member's roles and give them back on rejoin
//
// The snapshot is one-shot: it is deleted as soon as it has been read back.

use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::models::guild_snapshot::GuildSnapshot;
use crate::storage::{get_typed, set_typed, KvStore, StoreError};

pub fn restore_key(user_id: serenity::UserId, guild_id: serenity::GuildId) -> String {
    format!("roles_{}_{}", user_id, guild_id)
}

/// Drop @everyone (same id as the guild) and integration-managed roles
pub fn restorable_roles(
    guild_id: serenity::GuildId,
    roles: &[serenity::RoleId],
    is_managed: impl Fn(serenity::RoleId) -> bool,
) -> Vec<serenity::RoleId> {
    roles
        .iter()
        .copied()
        .filter(|r| r.get() != guild_id.get() && !is_managed(*r))
        .collect()
}

pub async fn remember_roles(
    store: &dyn KvStore,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    roles: &[serenity::RoleId],
) -> Result<(), StoreError> {
    let ids: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    set_typed(store, guild_id, &restore_key(user_id, guild_id), &ids).await
}

/// Read the stored roles and delete the entry
pub async fn take_roles(
    store: &dyn KvStore,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> Result<Vec<serenity::RoleId>, StoreError> {
    let key = restore_key(user_id, guild_id);
    let Some(ids) = get_typed::<Vec<String>>(store, guild_id, &key).await? else {
        return Ok(Vec::new());
    };

    store.delete(guild_id, &key).await?;
    let roles: Vec<serenity::RoleId> = ids
        .iter()
        .filter_map(|id| id.parse::<u64>().ok().filter(|id| *id != 0))
        .map(serenity::RoleId::new)
        .collect();
    debug!("Took {} stored role(s) for {} in guild {}", roles.len(), user_id, guild_id);
    Ok(roles)
}

/// Roles that still exist and sit below the bot's highest role
pub fn assignable_roles(
    snapshot: &GuildSnapshot,
    roles: impl IntoIterator<Item = serenity::RoleId>,
) -> Vec<serenity::RoleId> {
    roles
        .into_iter()
        .filter(|id| {
            snapshot
                .roles
                .get(id)
                .is_some_and(|role| snapshot.bot_can_assign(role))
        })
        .collect()
}
