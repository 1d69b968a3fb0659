use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

use super::{Metadata, MetadataSource, PlayableItem, StreamRef};
use crate::{
    audio::retry::{retry, Backoff},
    error::{PlayerError, Result},
};

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?((www|m|music)\.)?(youtube(-nocookie)?\.com/(watch\?|embed/|v/|shorts/|playlist\?)|youtu\.be/)\S+$",
    )
    .expect("el patrón de YouTube es válido")
});

/// Entrada de una playlist que todavía hay que resolver
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub reference: String,
    pub title_hint: Option<String>,
}

impl PendingEntry {
    fn from_metadata(meta: &Metadata) -> Option<Self> {
        meta.source_reference().map(|reference| Self {
            reference: reference.to_string(),
            title_hint: meta.title.clone(),
        })
    }
}

/// Resultado de [`ResolverAdapter::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Título de la canción, o de la playlist
    pub title: String,
    /// Canciones listas para encolar de inmediato
    pub items: Vec<PlayableItem>,
    /// Entradas que quedan para resolver en segundo plano
    pub remaining: Vec<PendingEntry>,
    /// Entradas descartadas por no tener referencia de origen
    pub skipped: usize,
}

impl Resolved {
    pub fn is_collection(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Descripción legible de lo que se agrega a la cola
    pub fn summary(&self) -> String {
        let first = self
            .items
            .first()
            .map(|i| i.title())
            .unwrap_or(self.title.as_str());
        if self.is_collection() {
            format!("*{}* and others", first)
        } else {
            format!("*{}*", first)
        }
    }
}

/// Convierte las consultas del usuario en canciones reproducibles
#[derive(Clone)]
pub struct ResolverAdapter {
    source: Arc<dyn MetadataSource>,
    media_host: Regex,
    attempts: i32,
    backoff: Backoff,
    max_playlist_size: usize,
}

impl ResolverAdapter {
    pub fn new(source: Arc<dyn MetadataSource>, attempts: i32, backoff: Backoff) -> Self {
        Self {
            source,
            media_host: YOUTUBE_URL.clone(),
            attempts,
            backoff,
            max_playlist_size: 100,
        }
    }

    pub fn with_max_playlist_size(mut self, max: usize) -> Self {
        self.max_playlist_size = max.max(1);
        self
    }

    /// Verifica si `url` apunta al sitio soportado
    pub fn is_media_url(&self, url: &str) -> bool {
        self.media_host.is_match(url)
    }

    /// Resuelve una consulta en sus primeras canciones reproducibles.
    ///
    /// Una canción suelta vuelve completa. De una playlist solo se resuelve
    /// aquí la primera entrada; el resto va en [`Resolved::remaining`] para que
    /// quien llama las encole a medida que se resuelven.
    pub async fn resolve(&self, query: &str) -> Result<Resolved> {
        let url = self.classify(query)?;

        let meta = self.fetch(&url, false).await?;
        debug!("📊 Metadata obtenida para '{}'", url);

        let Some(entries) = meta.entries.as_ref() else {
            debug!("🎵 La url es una canción");
            let item = PlayableItem::from_metadata(&meta)?;
            return Ok(Resolved {
                title: item.title().to_string(),
                items: vec![item],
                remaining: Vec::new(),
                skipped: 0,
            });
        };

        debug!("📋 La url es una playlist con {} entradas", entries.len());
        let mut pending: Vec<PendingEntry> = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for entry in entries.iter().take(self.max_playlist_size) {
            match PendingEntry::from_metadata(entry) {
                Some(p) => pending.push(p),
                None => {
                    skipped += 1;
                    warn!(
                        "⚠️ Omitiendo entrada de playlist sin referencia de origen: {:?}",
                        entry.id
                    );
                }
            }
        }

        if pending.is_empty() {
            return Err(PlayerError::MalformedMetadata(format!(
                "la playlist '{url}' no tiene entradas reproducibles"
            )));
        }

        let remaining = pending.split_off(1);
        let first = self.resolve_entry(&pending[0]).await?;
        let title = meta.title.clone().unwrap_or_else(|| url.clone());
        info!(
            "📋 Playlist '{}' resuelta: primera entrada '{}', {} pendientes",
            title,
            first.title(),
            remaining.len()
        );

        Ok(Resolved {
            title,
            items: vec![first],
            remaining,
            skipped,
        })
    }

    /// Resuelve por completo una entrada de playlist
    pub async fn resolve_entry(&self, entry: &PendingEntry) -> Result<PlayableItem> {
        let meta = self.fetch(&entry.reference, true).await?;
        PlayableItem::from_metadata(&meta)
    }

    /// Obtiene una URL de stream nueva para `item`.
    ///
    /// Las URLs de stream caducan, así que se llama justo antes de cada
    /// reproducción.
    pub async fn refresh_stream(&self, item: &PlayableItem) -> Result<StreamRef> {
        let meta = self.fetch(item.source_url(), true).await?;
        let url = meta.url.filter(|u| !u.is_empty()).ok_or_else(|| {
            PlayerError::MalformedMetadata(format!("'{}' no tiene url de stream", item.title()))
        })?;
        Ok(StreamRef::new(url))
    }

    fn classify(&self, query: &str) -> Result<String> {
        let query = query.trim();
        let is_web_url = Url::parse(query)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);
        if !is_web_url {
            return Err(PlayerError::NotImplemented(format!(
                "la búsqueda de '{query}' aún no está soportada, usa una url"
            )));
        }
        if !self.is_media_url(query) {
            return Err(PlayerError::InvalidInput(format!(
                "usa una url de {}",
                self.source.source_name()
            )));
        }
        Ok(query.to_string())
    }

    async fn fetch(&self, url: &str, process: bool) -> Result<Metadata> {
        let source = self.source.clone();
        retry(self.attempts, self.backoff, || {
            let source = source.clone();
            let url = url.to_string();
            async move { source.extract_info(&url, process).await }
        })
        .await
    }
}
