// Error reporting to the operational channel

use poise::serenity_prelude as serenity;
use tracing::error;

/// Discord's message length limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Where an error happened
#[derive(Debug, Clone, Default)]
pub struct ErrorSource {
    pub source: String,
    pub guild: Option<(serenity::GuildId, String)>,
    pub user: Option<serenity::UserId>,
}

impl ErrorSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn guild(mut self, id: serenity::GuildId, name: impl Into<String>) -> Self {
        self.guild = Some((id, name.into()));
        self
    }

    pub fn user(mut self, id: serenity::UserId) -> Self {
        self.user = Some(id);
        self
    }
}

/// Full report, or the short form when it would not fit in one message
pub fn format_error_report(origin: &ErrorSource, details: &str) -> String {
    let (server_name, server_id) = match &origin.guild {
        Some((id, name)) => (name.clone(), id.to_string()),
        None => ("Unknown Server".to_string(), "unknown".to_string()),
    };

    let mut lines = vec![
        format!("**Error in:** `{}`", origin.source),
        format!("**Server:** {} ({})", server_name, server_id),
    ];
    if let Some(user) = origin.user {
        lines.push(format!("**User:** <@{}> ({})", user, user));
    }
    lines.push("```".to_string());
    lines.push(details.to_string());
    lines.push("```".to_string());

    let report = lines.join("\n");
    if report.chars().count() > MESSAGE_LIMIT {
        format!("**Error in:** `{}` (Error too long, check console logs)", origin.source)
    } else {
        report
    }
}

/// Log an error locally and, when configured, to the operational channel.
pub async fn log_error(
    http: &serenity::Http,
    channel: Option<serenity::ChannelId>,
    origin: &ErrorSource,
    details: &str,
) {
    error!("Error in {}: {}", origin.source, details);

    let Some(channel) = channel else {
        return;
    };
    let message = serenity::CreateMessage::new()
        .content(format_error_report(origin, details))
        .allowed_mentions(serenity::CreateAllowedMentions::new());
    if let Err(e) = channel.send_message(http, message).await {
        error!("Failed to log error to channel {}: {}", channel, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_contains_context() {
        let origin = ErrorSource::new("ban")
            .guild(serenity::GuildId::new(5), "Guild")
            .user(serenity::UserId::new(7));
        let report = format_error_report(&origin, "boom");
        assert!(report.starts_with("**Error in:** `ban`"));
        assert!(report.contains("**Server:** Guild (5)"));
        assert!(report.contains("<@7>"));
        assert!(report.contains("boom"));
    }

    #[test]
    fn test_long_report_is_shortened() {
        let origin = ErrorSource::new("messageCreate");
        let report = format_error_report(&origin, &"x".repeat(3000));
        assert_eq!(report, "**Error in:** `messageCreate` (Error too long, check console logs)");
    }
}
