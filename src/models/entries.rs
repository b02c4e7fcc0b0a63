// Guild-scoped lists kept in the store next to the config

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FAQ_KEY: &str = "faqs";
pub const TEMP_COMMANDS_KEY: &str = "tempCommands";

pub const MAX_FAQ_NAME_LEN: usize = 50;
pub const MAX_FAQ_CONTENT_LEN: usize = 2000;
pub const MAX_TEMP_COMMAND_NAME_LEN: usize = 30;
pub const MAX_TEMP_COMMAND_RESPONSE_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqEntry {
    pub name: String,
    pub content: String,
    pub creator_id: String,
    pub creator_tag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FaqEntry {
    pub fn was_edited(&self) -> bool {
        self.created_at != self.updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempCommand {
    pub name: String,
    pub response: String,
    pub creator_id: String,
    pub creator_tag: String,
    pub created_at: DateTime<Utc>,
}

/// Anything looked up by a case-insensitive name
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for FaqEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for TempCommand {
    fn name(&self) -> &str {
        &self.name
    }
}

pub fn find_by_name<'a, T: Named>(entries: &'a [T], name: &str) -> Option<&'a T> {
    entries.iter().find(|e| e.name().eq_ignore_ascii_case(name))
}

pub fn find_by_name_mut<'a, T: Named>(entries: &'a mut [T], name: &str) -> Option<&'a mut T> {
    entries.iter_mut().find(|e| e.name().eq_ignore_ascii_case(name))
}

/// Remove every entry matching `name`; returns whether anything was removed.
pub fn remove_by_name<T: Named>(entries: &mut Vec<T>, name: &str) -> bool {
    let before = entries.len();
    entries.retain(|e| !e.name().eq_ignore_ascii_case(name));
    entries.len() != before
}
