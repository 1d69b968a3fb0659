use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una sola guild (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        playnext_command(),
        playlist_command(),
        remove_command(),
        volume_command(),
        stop_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist desde una url de YouTube")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Url de YouTube")
                .required(true),
        )
}

fn playnext_command() -> CreateCommand {
    CreateCommand::new("playnext")
        .description("Agrega una canción o playlist al frente de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Url de YouTube")
                .required(true),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la música y sale del canal de voz")
}

// Comandos de cola

fn playlist_command() -> CreateCommand {
    CreateCommand::new("playlist").description("Muestra la canción actual y las siguientes")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Quita una canción de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "title", "Título de la canción")
                .required(true),
        )
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volumen (0-200)")
                .min_int_value(0)
                .max_int_value(200)
                .required(true),
        )
}
