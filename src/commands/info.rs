// Info command - bot status and reach

use poise::serenity_prelude as serenity;

use crate::utils::config::colors;
use crate::utils::formatters::format_duration_ms;
use crate::{Context, Error};

/// Human-readable size with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", value.round() as u64, UNITS[unit])
}

/// `(used, total)` bytes from a `/proc/meminfo` listing
pub fn parse_meminfo(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    Some((total.saturating_sub(available), total))
}

async fn memory_usage() -> Option<String> {
    let text = tokio::fs::read_to_string("/proc/meminfo").await.ok()?;
    let (used, total) = parse_meminfo(&text)?;
    Some(format!("{} / {}", format_bytes(used), format_bytes(total)))
}

/// Displays bot information and system stats.
#[poise::command(slash_command)]
pub async fn info(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let uptime = ctx.data().started_at.elapsed();
    let latency = ctx.ping().await;
    let mut status = vec![
        format!("**Uptime:** {}", format_duration_ms(uptime.as_millis() as i64)),
        format!("**Latency:** {}ms", latency.as_millis()),
    ];
    if let Some(ram) = memory_usage().await {
        status.push(format!("**RAM:** {}", ram));
    }

    let cache = &ctx.serenity_context().cache;
    let guild_count = cache.guild_count();
    let avatar = cache.current_user().face();

    let embed = serenity::CreateEmbed::new()
        .title("DeltaBotz")
        .description("perhaps useful Discord bot for your servers :)")
        .thumbnail(avatar)
        .field("Status", status.join("\n"), true)
        .field("Servers", guild_count.to_string(), true)
        .color(colors::PRIMARY)
        .timestamp(serenity::Timestamp::now())
        .footer(serenity::CreateEmbedFooter::new("Tip: Use /setup to configure features"));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
