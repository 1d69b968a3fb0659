pub mod resolver;
pub mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{fmt, time::Duration};

use crate::error::{PlayerError, Result};

pub use resolver::{PendingEntry, Resolved, ResolverAdapter};
pub use youtube::YtDlpSource;

/// Backend de metadata: convierte una URL o id en metadata.
///
/// `process = false` es la consulta rápida, sin recursión, que distingue una
/// canción de una playlist. `process = true` resuelve una canción completa,
/// incluida su URL de stream con caducidad. Las implementaciones nunca
/// reintentan por su cuenta.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn extract_info(&self, url: &str, process: bool) -> Result<Metadata>;

    fn source_name(&self) -> &'static str;
}

/// Metadata tal como la reporta el backend (formato JSON de yt-dlp)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// URL de stream una vez procesada; URL de la página en entradas de playlist
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub entries: Option<Vec<Metadata>>,
}

impl Metadata {
    pub fn is_collection(&self) -> bool {
        self.entries.is_some()
    }

    /// Desde dónde se puede volver a obtener esta entrada
    pub fn source_reference(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.url.as_deref())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
            .and_then(|d| Duration::try_from_secs_f64(d).ok())
    }
}

/// Clave estable de un [`PlayableItem`] en la cola
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// URL de stream con caducidad. Nunca se reutiliza entre reproducciones
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRef {
    pub url: String,
    pub resolved_at: DateTime<Utc>,
}

impl StreamRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resolved_at: Utc::now(),
        }
    }
}

/// Una canción que se puede resolver y reproducir
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableItem {
    title: String,
    source_url: String,
    key: ItemKey,
    duration: Option<Duration>,
    stream: Option<StreamRef>,
}

impl PlayableItem {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            key: ItemKey::new(&title),
            title,
            source_url: source_url.into(),
            duration: None,
            stream: None,
        }
    }

    /// Crea una canción a partir de metadata resuelta.
    ///
    /// Falla con [`PlayerError::MalformedMetadata`] si falta el título o la
    /// referencia de origen necesaria para volver a resolver el stream.
    pub fn from_metadata(meta: &Metadata) -> Result<Self> {
        let title = meta
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                PlayerError::MalformedMetadata(format!(
                    "la entrada {} no tiene título",
                    meta.id.as_deref().unwrap_or("<desconocida>")
                ))
            })?;
        let source = meta.source_reference().ok_or_else(|| {
            PlayerError::MalformedMetadata(format!("'{title}' no tiene referencia de origen"))
        })?;

        let mut item = Self::new(title, source);
        item.duration = meta.duration();
        Ok(item)
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn source_url(&self) -> &str {
        &self.source_url
    }
    pub fn key(&self) -> &ItemKey {
        &self.key
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn stream(&self) -> Option<&StreamRef> {
        self.stream.as_ref()
    }

    pub fn with_stream(mut self, stream: StreamRef) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Descarta el stream resuelto anteriormente
    pub fn without_stream(mut self) -> Self {
        self.stream = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_flat_playlist_json() {
        let raw = r#"{
            "id": "PL123",
            "title": "Road trip",
            "webpage_url": "https://www.youtube.com/playlist?list=PL123",
            "entries": [
                {"id": "a1", "title": "First", "url": "https://www.youtube.com/watch?v=a1", "duration": 201.0},
                {"id": "b2", "title": "Second", "url": "https://www.youtube.com/watch?v=b2"}
            ]
        }"#;
        let meta: Metadata = serde_json::from_str(raw).unwrap();

        assert!(meta.is_collection());
        let entries = meta.entries.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].source_reference(),
            Some("https://www.youtube.com/watch?v=a1")
        );
        assert_eq!(entries[0].duration(), Some(Duration::from_secs(201)));
    }

    #[test]
    fn unrepresentable_durations_are_dropped() {
        let with = |duration: f64| Metadata {
            duration: Some(duration),
            ..Default::default()
        };
        assert_eq!(with(1e20).duration(), None);
        assert_eq!(with(-3.0).duration(), None);
        assert_eq!(with(f64::NAN).duration(), None);
        assert_eq!(with(f64::INFINITY).duration(), None);
        assert_eq!(with(90.5).duration(), Some(Duration::from_millis(90_500)));
    }

    #[test]
    fn item_from_metadata_uses_title_as_key() {
        let meta = Metadata {
            title: Some("  Song A ".into()),
            webpage_url: Some("https://www.youtube.com/watch?v=abc".into()),
            ..Default::default()
        };
        let item = PlayableItem::from_metadata(&meta).unwrap();

        assert_eq!(item.key(), &ItemKey::from("Song A"));
        assert_eq!(item.source_url(), "https://www.youtube.com/watch?v=abc");
        assert!(item.stream().is_none());
    }

    #[test]
    fn item_without_source_reference_is_malformed() {
        let meta = Metadata {
            title: Some("Orphan".into()),
            ..Default::default()
        };
        assert!(matches!(
            PlayableItem::from_metadata(&meta),
            Err(PlayerError::MalformedMetadata(_))
        ));
    }
}
