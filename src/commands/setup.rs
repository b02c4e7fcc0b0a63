// Setup command - entry point to the interactive configuration menu

use crate::features::setup_menu::{self, View, NEED_ADMIN};
use crate::services::config_manager::GuildIdentity;
use crate::{Context, Error};

/// Setup the bot with an interactive menu
#[poise::command(slash_command, guild_only)]
pub async fn setup(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.send(
            poise::CreateReply::default()
                .content("This command can only be used in a server!")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };
    let serenity_ctx = ctx.serenity_context();

    if !setup_menu::can_configure(serenity_ctx, ctx.data(), guild_id, ctx.author().id).await {
        ctx.send(poise::CreateReply::default().content(NEED_ADMIN).ephemeral(true))
            .await?;
        return Ok(());
    }

    let Some(identity) = GuildIdentity::from_cache(serenity_ctx, guild_id) else {
        ctx.send(
            poise::CreateReply::default()
                .content("Failed to load server configuration. Please try again later.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };
    let config = ctx.data().config_manager.get_or_create_config(&identity).await;

    let (embed, components) = setup_menu::render(serenity_ctx, guild_id, &config, View::Overview);
    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .components(components)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
