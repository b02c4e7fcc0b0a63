// giver - hand out roles by id, never moderator roles

use poise::serenity_prelude as serenity;
use tracing::warn;

use super::PrefixContext;
use crate::models::guild_snapshot::GuildSnapshot;
use crate::models::server_config::parse_snowflake;
use crate::utils::formatters::parse_user_id;

const USAGE: &str = "Usage: `giver <@user|userID> <roleID1> [roleID2 ...]`";

/// Requested role ids split into grantable roles and rejected input
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RolePick {
    pub grant: Vec<(serenity::RoleId, String)>,
    pub rejected: Vec<String>,
}

/// Unknown ids and moderator roles are rejected; duplicates collapse.
pub fn pick_roles(snapshot: &GuildSnapshot, moderator_roles: &[serenity::RoleId], requested: &[&str]) -> RolePick {
    let mut pick = RolePick::default();
    for raw in requested {
        let known = parse_snowflake(raw)
            .map(serenity::RoleId::new)
            .and_then(|id| snapshot.roles.get(&id).map(|role| (id, role)));
        match known {
            Some((id, role)) if !moderator_roles.contains(&id) => {
                if !pick.grant.iter().any(|(g, _)| *g == id) {
                    pick.grant.push((id, role.name.clone()));
                }
            }
            _ => pick.rejected.push((*raw).to_string()),
        }
    }
    pick
}

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let user_id = pctx.arg(0).and_then(parse_user_id).map(serenity::UserId::new);
    let requested: Vec<&str> = pctx.args.iter().skip(1).copied().collect();
    let Some(user_id) = user_id.filter(|_| !requested.is_empty()) else {
        return pctx.reply(USAGE).await;
    };

    let Some(member) = pctx.member(user_id).await else {
        return pctx.reply("Could not find the specified user.").await;
    };
    let Some(snapshot) = GuildSnapshot::from_cache(pctx.ctx, pctx.guild_id) else {
        return pctx.reply("Could not find the specified user.").await;
    };

    let pick = pick_roles(&snapshot, &pctx.config.moderator_role_ids(), &requested);
    if pick.grant.is_empty() {
        let mut text = String::from("No valid roles to add.");
        if !pick.rejected.is_empty() {
            text.push_str(&format!("\nInvalid or restricted role IDs: {}", pick.rejected.join(", ")));
        }
        return pctx.reply(text).await;
    }

    let ids: Vec<serenity::RoleId> = pick.grant.iter().map(|(id, _)| *id).collect();
    if let Err(e) = member.add_roles(&pctx.ctx.http, &ids).await {
        warn!("Adding roles to {} in {} failed: {}", user_id, pctx.guild_id, e);
        pctx.log(format!(
            "Action: Give Role (Error)\nUser: <@{}>\nBy: <@{}>",
            user_id, pctx.msg.author.id
        ))
        .await;
        return pctx.reply("An error occurred while assigning roles.").await;
    }

    let names = pick
        .grant
        .iter()
        .map(|(_, name)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut text = format!("Added roles to <@{}>: {}", user_id, names);
    if !pick.rejected.is_empty() {
        text.push_str(&format!("\nInvalid or restricted role IDs: {}", pick.rejected.join(", ")));
    }
    pctx.reply(text).await?;
    pctx.log(format!(
        "Action: Give Role\nUser: <@{}>\nBy: <@{}>\nRoles: {}",
        user_id, pctx.msg.author.id, names
    ))
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guild_snapshot::fixtures;

    #[test]
    fn test_pick_roles_rejects_unknown_and_moderator_roles() {
        let snapshot = fixtures::sample();
        let mods = [serenity::RoleId::new(100)];
        let pick = pick_roles(&snapshot, &mods, &["101", " 101", "100", "999", "abc"]);

        assert_eq!(pick.grant, vec![(serenity::RoleId::new(101), "members".to_string())]);
        assert_eq!(pick.rejected, vec!["100", "999", "abc"]);
    }

    #[test]
    fn test_pick_roles_empty_request() {
        let pick = pick_roles(&fixtures::sample(), &[], &[]);
        assert_eq!(pick, RolePick::default());
    }
}
