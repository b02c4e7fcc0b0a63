// faq - server FAQ entries: list, show, add, edit, remove, info
//
// Listing, showing and info are open to everyone; changes go through the
// moderator gate. Removal asks for a second identical invocation.

use chrono::Utc;
use poise::serenity_prelude as serenity;

use super::PrefixContext;
use crate::models::entries::{
    find_by_name, find_by_name_mut, remove_by_name, FaqEntry, FAQ_KEY, MAX_FAQ_CONTENT_LEN, MAX_FAQ_NAME_LEN,
};
use crate::storage::{get_typed, set_typed, KvStore, StoreError};
use crate::utils::formatters::truncate;

const PREVIEW_CHARS: usize = 500;

pub async fn load(store: &dyn KvStore, guild_id: serenity::GuildId) -> Result<Vec<FaqEntry>, StoreError> {
    Ok(get_typed(store, guild_id, FAQ_KEY).await?.unwrap_or_default())
}

async fn save(store: &dyn KvStore, guild_id: serenity::GuildId, faqs: &[FaqEntry]) -> Result<(), StoreError> {
    set_typed(store, guild_id, FAQ_KEY, &faqs).await
}

pub fn list_text(faqs: &[FaqEntry], prefix: &str) -> String {
    if faqs.is_empty() {
        return format!(
            "**Server FAQs**\n\nNo FAQs have been created yet.\n\nModerators can use `{}faq add <name> <content>` to create one.",
            prefix
        );
    }
    let names: Vec<&str> = faqs.iter().map(|f| f.name.as_str()).collect();
    format!("**Server FAQs**\n\n{}", names.join(", "))
}

/// Why a new entry was refused
#[derive(Debug, PartialEq, Eq)]
pub enum AddRejection {
    NameTooLong,
    ContentTooLong,
    Duplicate,
}

pub fn check_new_entry(faqs: &[FaqEntry], name: &str, content: &str) -> Result<(), AddRejection> {
    if name.chars().count() > MAX_FAQ_NAME_LEN {
        return Err(AddRejection::NameTooLong);
    }
    if content.chars().count() > MAX_FAQ_CONTENT_LEN {
        return Err(AddRejection::ContentTooLong);
    }
    if find_by_name(faqs, name).is_some() {
        return Err(AddRejection::Duplicate);
    }
    Ok(())
}

pub fn info_text(faq: &FaqEntry) -> String {
    let updated = if faq.was_edited() {
        format!("<t:{}:F>", faq.updated_at.timestamp())
    } else {
        "Never".to_string()
    };
    format!(
        "**FAQ: {}**\n\n{}\n\n**Created By:** <@{}> ({})\n**Created At:** <t:{}:F>\n**Last Updated:** {}",
        faq.name,
        faq.content,
        faq.creator_id,
        faq.creator_tag,
        faq.created_at.timestamp(),
        updated
    )
}

pub fn confirm_removal_text(faq: &FaqEntry, name: &str, prefix: &str) -> String {
    format!(
        "**Confirm Removal**\n\nAre you sure you want to remove **{}**?\n\n**Content:** {}\n\nRun `{}faq remove {}` again to confirm.\n\n\u{26a0}\u{fe0f} This action cannot be undone!",
        name,
        truncate(&faq.content, PREVIEW_CHARS),
        prefix,
        name
    )
}

pub async fn run(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let store = pctx.data.store.as_ref();
    let Some(first) = pctx.arg(0) else {
        let faqs = load(store, pctx.guild_id).await?;
        return pctx.reply(list_text(&faqs, pctx.prefix())).await;
    };

    match first.to_lowercase().as_str() {
        "add" => add(pctx).await,
        "remove" => remove(pctx).await,
        "edit" => edit(pctx).await,
        "info" => info(pctx).await,
        _ => {
            let faqs = load(store, pctx.guild_id).await?;
            match find_by_name(&faqs, first) {
                Some(faq) => pctx.reply(faq.content.as_str()).await,
                None => {
                    pctx.reply(format!(
                        "This FAQ likely does not exist, use `{}faq` to list FAQs.",
                        pctx.prefix()
                    ))
                    .await
                }
            }
        }
    }
}

async fn add(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    if !pctx.gate().await? {
        return Ok(());
    }
    let prefix = pctx.prefix();
    let (Some(name), content) = (pctx.arg(1), pctx.rest(2)) else {
        return add_usage(pctx).await;
    };
    if content.is_empty() {
        return add_usage(pctx).await;
    }

    let store = pctx.data.store.as_ref();
    let mut faqs = load(store, pctx.guild_id).await?;
    match check_new_entry(&faqs, name, content) {
        Err(AddRejection::NameTooLong) => {
            return pctx.reply("FAQ name must be 50 characters or less.").await;
        }
        Err(AddRejection::ContentTooLong) => {
            return pctx.reply("FAQ content must be 2000 characters or less.").await;
        }
        Err(AddRejection::Duplicate) => {
            return pctx
                .reply(format!(
                    "A FAQ with the name \"{}\" already exists. Use `{}faq edit {} <new content>` to update it.",
                    name, prefix, name
                ))
                .await;
        }
        Ok(()) => {}
    }

    let now = Utc::now();
    let author = &pctx.msg.author;
    faqs.push(FaqEntry {
        name: name.to_string(),
        content: content.to_string(),
        creator_id: author.id.to_string(),
        creator_tag: author.tag(),
        created_at: now,
        updated_at: now,
    });
    save(store, pctx.guild_id, &faqs).await?;

    pctx.reply(format!(
        "**FAQ Added**\n\n**Name:** {}\n**Content:** {}\n\nCreated by {}",
        name,
        content,
        author.tag()
    ))
    .await
}

async fn add_usage(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let prefix = pctx.prefix();
    pctx.reply(format!(
        "Usage: `{p}faq add <name> <content>`\nExample: `{p}faq add rules Please follow the server rules!`",
        p = prefix
    ))
    .await
}

async fn remove(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    if !pctx.gate().await? {
        return Ok(());
    }
    let prefix = pctx.prefix();
    let Some(name) = pctx.arg(1) else {
        return pctx
            .reply(format!(
                "Usage: `{p}faq remove <name>`\nExample: `{p}faq remove rules`",
                p = prefix
            ))
            .await;
    };

    let store = pctx.data.store.as_ref();
    let mut faqs = load(store, pctx.guild_id).await?;
    let Some(faq) = find_by_name(&faqs, name) else {
        return pctx.reply(format!("FAQ \"{}\" not found.", name)).await;
    };

    let key = (pctx.guild_id, pctx.msg.author.id);
    let confirmed = pctx
        .data
        .faq_removals
        .take_if(&key, |pending| pending.eq_ignore_ascii_case(name))
        .is_some();
    if !confirmed {
        let text = confirm_removal_text(faq, name, prefix);
        pctx.data.faq_removals.insert(key, name.to_string());
        return pctx.reply(text).await;
    }

    remove_by_name(&mut faqs, name);
    save(store, pctx.guild_id, &faqs).await?;
    pctx.reply(format!(
        "**FAQ Removed**\n\n{} has been permanently removed.\n\nRemoved by {}",
        name,
        pctx.msg.author.tag()
    ))
    .await
}

async fn edit(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    if !pctx.gate().await? {
        return Ok(());
    }
    let prefix = pctx.prefix();
    let (name, content) = (pctx.arg(1), pctx.rest(2));
    let Some(name) = name.filter(|_| !content.is_empty()) else {
        return pctx
            .reply(format!(
                "Usage: `{p}faq edit <name> <new content>`\nExample: `{p}faq edit rules Updated server rules!`\n\n\u{26a0}\u{fe0f} **Warning:** This replaces the entire FAQ content, not edits it. Make sure to copy the previous content and paste it again with your edits.",
                p = prefix
            ))
            .await;
    };
    if content.chars().count() > MAX_FAQ_CONTENT_LEN {
        return pctx.reply("FAQ content must be 2000 characters or less.").await;
    }

    let store = pctx.data.store.as_ref();
    let mut faqs = load(store, pctx.guild_id).await?;
    let Some(faq) = find_by_name_mut(&mut faqs, name) else {
        return pctx.reply(format!("FAQ \"{}\" not found.", name)).await;
    };
    faq.content = content.to_string();
    faq.updated_at = Utc::now();
    let creator_tag = faq.creator_tag.clone();
    save(store, pctx.guild_id, &faqs).await?;

    pctx.reply(format!(
        "**FAQ Updated**\n\n**Name:** {}\n**New Content:** {}\n\n**Original Creator:** {}\n**Last Updated By:** {}\n\n\u{26a0}\u{fe0f} Note: This replaced the entire FAQ content",
        name,
        content,
        creator_tag,
        pctx.msg.author.tag()
    ))
    .await
}

async fn info(pctx: &PrefixContext<'_>) -> anyhow::Result<()> {
    let Some(name) = pctx.arg(1) else {
        return pctx
            .reply(format!(
                "Usage: `{p}faq info <name>`\nExample: `{p}faq info rules`",
                p = pctx.prefix()
            ))
            .await;
    };
    let faqs = load(pctx.data.store.as_ref(), pctx.guild_id).await?;
    match find_by_name(&faqs, name) {
        Some(faq) => pctx.reply(info_text(faq)).await,
        None => pctx.reply(format!("FAQ \"{}\" not found.", name)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use chrono::TimeZone;

    fn entry(name: &str, content: &str) -> FaqEntry {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        FaqEntry {
            name: name.into(),
            content: content.into(),
            creator_id: "5".into(),
            creator_tag: "mod".into(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_list_text() {
        let empty = list_text(&[], "!");
        assert!(empty.contains("No FAQs have been created yet."));
        assert!(empty.contains("`!faq add <name> <content>`"));

        let listed = list_text(&[entry("rules", "a"), entry("roles", "b")], ".");
        assert_eq!(listed, "**Server FAQs**\n\nrules, roles");
    }

    #[test]
    fn test_check_new_entry() {
        let faqs = vec![entry("Rules", "a")];
        assert_eq!(check_new_entry(&faqs, "rules", "x"), Err(AddRejection::Duplicate));
        assert_eq!(check_new_entry(&faqs, &"n".repeat(51), "x"), Err(AddRejection::NameTooLong));
        assert_eq!(
            check_new_entry(&faqs, "faq", &"c".repeat(2001)),
            Err(AddRejection::ContentTooLong)
        );
        assert_eq!(check_new_entry(&faqs, &"n".repeat(50), &"c".repeat(2000)), Ok(()));
    }

    #[test]
    fn test_info_text_marks_unedited_entries() {
        let mut faq = entry("rules", "Be nice");
        let text = info_text(&faq);
        assert!(text.starts_with("**FAQ: rules**\n\nBe nice"));
        assert!(text.contains("**Created At:** <t:1704067200:F>"));
        assert!(text.ends_with("**Last Updated:** Never"));

        faq.updated_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(info_text(&faq).ends_with("**Last Updated:** <t:1704153600:F>"));
    }

    #[test]
    fn test_confirm_removal_previews_content() {
        let faq = entry("rules", &"x".repeat(600));
        let text = confirm_removal_text(&faq, "rules", ".");
        assert!(text.contains(&format!("**Content:** {}...", "x".repeat(500))));
        assert!(text.contains("Run `.faq remove rules` again to confirm."));
    }

    #[tokio::test]
    async fn test_load_and_save_round_trip() {
        let store = MemoryStore::new();
        let guild = serenity::GuildId::new(1);
        assert!(load(&store, guild).await.unwrap().is_empty());

        save(&store, guild, &[entry("rules", "Be nice")]).await.unwrap();
        let loaded = load(&store, guild).await.unwrap();
        assert_eq!(loaded, vec![entry("rules", "Be nice")]);
        assert!(store.raw(guild, FAQ_KEY).is_some());
    }
}
