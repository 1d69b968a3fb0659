use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        player::{PlayOutcome, PlaylistView},
        queue::TRUNCATION_MARKER,
    },
    error::PlayerError,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Jukebox";

/// Crea un embed de respuesta para `/play` y `/playnext`
pub fn create_play_embed(outcome: &PlayOutcome) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎶 Agregado a la cola")
        .description(&outcome.changes)
        .color(colors::MUSIC_PURPLE)
        .field("▶️ Reproduciendo", now_playing_field(outcome.now_playing.as_deref()), true)
        .field("🔊 Canal", format!("<#{}>", outcome.voice_channel), true);

    if outcome.pending > 0 {
        embed = embed.field(
            "⏳ Cargando",
            format!("{} canciones más de **{}**", outcome.pending, outcome.title),
            false,
        );
    }

    if outcome.skipped > 0 {
        embed = embed.field(
            "⚠️ Omitidas",
            format!("{} canciones de la playlist no están disponibles", outcome.skipped),
            false,
        );
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_playlist_embed(view: &PlaylistView) -> CreateEmbed {
    let upcoming = if view.upcoming.is_empty() {
        "😴 **La cola está vacía**\n\n💡 Usa `/play <url>` para agregar música".to_string()
    } else {
        format_upcoming(&view.upcoming)
    };

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .field("▶️ Reproduciendo", now_playing_field(view.now_playing.as_deref()), false)
        .field("⏭️ A continuación", upcoming, false);

    if view.queued > 0 {
        embed = embed.field(
            "📊 En cola",
            format!("{} canciones · {}", view.queued, format_duration(view.queued_duration)),
            true,
        );
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn now_playing_field(title: Option<&str>) -> String {
    match title {
        Some(title) => format!("**{}**", title),
        None => "⏳ Cargando la siguiente canción...".to_string(),
    }
}

/// Lista numerada de próximas canciones; el marcador de truncado va sin número
pub fn format_upcoming(titles: &[String]) -> String {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            if title == TRUNCATION_MARKER {
                title.clone()
            } else {
                format!("`{}.` {}", i + 1, title)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formatea una duración como `h:mm:ss` o `m:ss`
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Traduce un error del reproductor a un embed para el usuario
pub fn create_player_error_embed(error: &PlayerError) -> CreateEmbed {
    let (title, description) = match error.root() {
        PlayerError::NotImplemented(_) => (
            "No soportado",
            "La búsqueda aún no está disponible, usa una url de YouTube.".to_string(),
        ),
        PlayerError::InvalidInput(reason) => ("Url inválida", capitalize(reason)),
        PlayerError::DuplicateKey(title) => {
            ("Ya en la cola", format!("**{title}** ya está en la cola."))
        }
        PlayerError::NotFound(title) => ("No encontrada", format!("**{title}** no está en la cola.")),
        PlayerError::QueueFull(max) => ("Cola llena", format!("La cola admite como máximo {max} canciones.")),
        PlayerError::InvalidState { .. } | PlayerError::EmptyQueue => {
            ("Nada reproduciéndose", "Usa `/play <url>` para empezar la música.".to_string())
        }
        PlayerError::MalformedMetadata(_) | PlayerError::Resolver(_) => (
            "No se pudo cargar",
            "No se pudo cargar la canción, prueba con otra url.".to_string(),
        ),
        _ => ("Error de reproducción", error.to_string()),
    };

    create_error_embed(title, &description)
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::NEUTRAL_GRAY)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de volumen, `level` va de 0.0 a 2.0
pub fn create_volume_embed(level: f32) -> CreateEmbed {
    let percent = (level * 100.0).round() as u32;
    let icon = match percent {
        0 => "🔇",
        1..=50 => "🔉",
        _ => "🔊",
    };
    let colour = if percent > 100 {
        colors::WARNING_ORANGE
    } else {
        colors::SUCCESS_GREEN
    };

    CreateEmbed::default()
        .title(format!("{} Volumen", icon))
        .description(format!("Volumen ajustado a **{}%**", percent))
        .color(colour)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
