// Formatting utilities

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([smhd])$").unwrap());

/// Truncate string to `max_chars` characters, appending `...` when cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars).collect();
        format!("{}...", kept)
    }
}

/// First `max_chars` characters, no marker
pub fn truncate_plain(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Split text into pieces of at most `size` characters.
/// Empty input yields no pieces.
pub fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect()
}

/// Parse durations like `10s`, `5m`, `1h`, `2d`
pub fn parse_duration(input: &str) -> Option<Duration> {
    let caps = DURATION_RE.captures(input.trim())?;
    let value: u64 = caps[1].parse().ok()?;
    let secs = match &caps[2] {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(60 * 60)?,
        "d" => value.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

/// Format a duration in milliseconds (e.g. "1h 30m")
pub fn format_duration_ms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let (days, rem) = (total_secs / 86_400, total_secs % 86_400);
    let (hours, rem) = (rem / 3600, rem % 3600);
    let (mins, secs) = (rem / 60, rem % 60);

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (mins, "m"), (secs, "s")]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{}{}", n, unit))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// Extract a user id from a mention (`<@123>`, `<@!123>`) or a raw id
pub fn parse_user_id(arg: &str) -> Option<u64> {
    let digits: String = arg
        .trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>')
        .to_string();
    digits.parse::<u64>().ok().filter(|id| *id != 0)
}

/// `<#id>` or "Not set"
pub fn channel_mention(raw: Option<&str>) -> String {
    match raw {
        Some(id) if !id.is_empty() => format!("<#{}>", id),
        _ => "Not set".to_string(),
    }
}

/// Comma-separated role mentions, or "None"
pub fn role_mentions<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    let mentions: Vec<String> = ids.into_iter().map(|id| format!("<@&{}>", id)).collect();
    if mentions.is_empty() {
        "None".to_string()
    } else {
        mentions.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("ééééé", 2), "éé...");
        assert_eq!(truncate_plain("ééééé", 2), "éé");
    }

    #[test]
    fn test_split_chunks() {
        assert!(split_chunks("", 1024).is_empty());
        let text = "a".repeat(2050);
        let chunks = split_chunks(&text, 1024);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1024);
        assert_eq!(chunks[2].len(), 2);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(172_800)));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("1w"), None);
        assert_eq!(parse_duration("m5"), None);
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(600_000), "10m");
        assert_eq!(format_duration_ms(5_400_000), "1h 30m");
        assert_eq!(format_duration_ms(0), "0s");
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("<@123>"), Some(123));
        assert_eq!(parse_user_id("<@!123>"), Some(123));
        assert_eq!(parse_user_id("123"), Some(123));
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id("<@&123>"), None);
    }

    #[test]
    fn test_mentions() {
        assert_eq!(channel_mention(Some("5")), "<#5>");
        assert_eq!(channel_mention(None), "Not set");
        assert_eq!(role_mentions(["1", "2"]), "<@&1>, <@&2>");
        assert_eq!(role_mentions(Vec::<String>::new()), "None");
    }
}
