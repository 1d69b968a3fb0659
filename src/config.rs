use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::retry::Backoff;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub upcoming_preview: usize,

    // Recuperación
    pub retry_attempts: i32,
    pub backoff_unit_ms: u64,
    #[serde(with = "humantime_serde_compat")]
    pub idle_timeout: Duration,

    // Backend de metadata
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: env_or("DEFAULT_VOLUME", "0.5")?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", "1000")?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", "100")?,
            upcoming_preview: env_or("UPCOMING_PREVIEW", "10")?,

            // Recuperación
            retry_attempts: env_or("RETRY_ATTEMPTS", "3")?,
            backoff_unit_ms: env_or("BACKOFF_UNIT_MS", "1000")?,
            idle_timeout: humantime::parse_duration(
                &std::env::var("IDLE_TIMEOUT").unwrap_or_else(|_| "5m".to_string()),
            )
            .context("IDLE_TIMEOUT must be a duration like '5m' or '90s'")?,

            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Retry attempts must not be negative
    /// - Queue, playlist and preview sizes must be > 0
    /// - Idle timeout must be at least one second
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.retry_attempts < 0 {
            anyhow::bail!("Retry attempts cannot be negative, got: {}", self.retry_attempts);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.upcoming_preview == 0 {
            anyhow::bail!("Upcoming preview must be greater than 0");
        }

        if self.idle_timeout < Duration::from_secs(1) {
            anyhow::bail!("Idle timeout must be at least 1s, got: {:?}", self.idle_timeout);
        }

        Ok(())
    }

    /// Parte de la configuración que usa el motor de reproducción
    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            retry_attempts: self.retry_attempts,
            backoff: Backoff::new(Duration::from_millis(self.backoff_unit_ms)),
            max_queue_size: self.max_queue_size,
            idle_timeout: self.idle_timeout,
            default_volume: self.default_volume,
            upcoming_preview: self.upcoming_preview,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands for {}\n  \
            Audio: {}% vol, {} queue, {} per playlist, {} shown\n  \
            Recovery: {} retries, {}ms backoff unit, {} idle timeout\n  \
            Resolver: {}",
            self.guild_id
                .map_or("all guilds".to_string(), |id| format!("guild {id}")),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_playlist_size,
            self.upcoming_preview,
            self.retry_attempts,
            self.backoff_unit_ms,
            humantime::format_duration(self.idle_timeout),
            self.ytdlp_path,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin valores por defecto, obligatorio)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,
            max_playlist_size: 100,
            upcoming_preview: 10,

            retry_attempts: 3,
            backoff_unit_ms: 1000,
            idle_timeout: Duration::from_secs(300),

            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Ajustes del motor de reproducción, sin credenciales
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub retry_attempts: i32,
    pub backoff: Backoff,
    pub max_queue_size: usize,
    pub idle_timeout: Duration,
    pub default_volume: f32,
    pub upcoming_preview: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Config::default().player_settings()
    }
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("invalid value for {key}"))
}

mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
