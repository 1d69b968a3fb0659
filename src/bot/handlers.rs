use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::{session::Placement, songbird_sink::SongbirdSink},
    bot::JukeboxBot,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id, Placement::Back).await?,
        "playnext" => handle_play(ctx, &command, bot, guild_id, Placement::Front).await?,
        "playlist" => handle_playlist(ctx, &command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        _ => {
            respond(
                ctx,
                &command,
                embeds::create_error_embed("Comando desconocido", "Este comando no está soportado."),
                true,
            )
            .await?;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    placement: Placement,
) -> Result<()> {
    let query = string_option(command, "query")?;

    // Defer la respuesta ya que resolver puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => {
            let embed = embeds::create_error_embed("Sin canal de voz", &e.to_string());
            edit(ctx, command, embed).await?;
            return Ok(());
        }
    };

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
    let sink = Arc::new(SongbirdSink::new(manager, guild_id, channel_id)?);

    let result = match placement {
        Placement::Back => bot.player.play(guild_id.get(), query, sink).await,
        Placement::Front => bot.player.play_next(guild_id.get(), query, sink).await,
    };

    let embed = match result {
        Ok(outcome) => embeds::create_play_embed(&outcome),
        Err(e) => {
            warn!("⚠️ /play falló en guild {}: {}", guild_id, e);
            embeds::create_player_error_embed(&e)
        }
    };
    edit(ctx, command, embed).await
}

async fn handle_playlist(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.playlist(guild_id.get()) {
        Ok(view) => respond(ctx, command, embeds::create_playlist_embed(&view), false).await,
        Err(e) => respond(ctx, command, embeds::create_player_error_embed(&e), true).await,
    }
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let title = string_option(command, "title")?;

    match bot.player.remove(guild_id.get(), title) {
        Ok(item) => {
            let embed = embeds::create_success_embed(
                "Removida",
                &format!("**{}** fue quitada de la cola.", item.title()),
            );
            respond(ctx, command, embed, false).await
        }
        Err(e) => respond(ctx, command, embeds::create_player_error_embed(&e), true).await,
    }
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Falta el nivel de volumen"))?;
    let normalized = (level as f32 / 100.0).clamp(0.0, 2.0);

    match bot.player.set_volume(guild_id.get(), normalized).await {
        Ok(()) => respond(ctx, command, embeds::create_volume_embed(normalized), false).await,
        Err(e) => respond(ctx, command, embeds::create_player_error_embed(&e), true).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let embed = if bot.player.stop(guild_id.get()).await {
        embeds::create_success_embed("Detenido", "Cola limpiada, ¡hasta la próxima! 👋")
    } else {
        embeds::create_info_embed("Nada reproduciéndose", "No había nada que detener.")
    };
    respond(ctx, command, embed, false).await
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Falta la opción '{}'", name))
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Servidor no encontrado en cache"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}
