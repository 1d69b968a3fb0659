//! In-memory sink and metadata backend used by the engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    retry::Backoff,
    sink::{AudioSink, PlaybackOutcome, TrackCompletion},
};
use crate::{
    config::PlayerSettings,
    error::{PlayerError, Result},
    sources::{Metadata, MetadataSource, ResolverAdapter, StreamRef},
};

pub fn video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

pub fn playlist_url(id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={id}")
}

pub fn test_settings() -> PlayerSettings {
    PlayerSettings {
        retry_attempts: 3,
        backoff: Backoff::new(Duration::from_millis(1)),
        max_queue_size: 100,
        idle_timeout: Duration::from_secs(60),
        default_volume: 0.5,
        upcoming_preview: 10,
    }
}

pub fn resolver(source: Arc<FakeSource>) -> ResolverAdapter {
    ResolverAdapter::new(source, 3, Backoff::new(Duration::from_millis(1)))
}

/// Espera hasta que se cumpla `condition`, falla a los dos segundos
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Backend de metadata con un catálogo fijo.
///
/// Cada consulta procesada entrega una URL de stream nueva, así los tests
/// pueden saber si el stream se volvió a resolver.
#[derive(Default)]
pub struct FakeSource {
    catalog: Mutex<HashMap<String, Metadata>>,
    streamless: Mutex<HashSet<String>>,
    processed: Mutex<Vec<String>>,
    processed_delay: Mutex<Duration>,
    signatures: AtomicU32,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(self, id: &str, title: &str) -> Self {
        self.catalog.lock().insert(
            video_url(id),
            Metadata {
                id: Some(id.to_string()),
                title: Some(title.to_string()),
                webpage_url: Some(video_url(id)),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_playlist(self, id: &str, title: &str, videos: &[(&str, &str)]) -> Self {
        let mut source = self;
        let mut entries = Vec::new();
        for (video_id, video_title) in videos {
            entries.push(Metadata {
                id: Some(video_id.to_string()),
                title: Some(video_title.to_string()),
                url: Some(video_url(video_id)),
                ..Default::default()
            });
            source = source.with_video(video_id, video_title);
        }
        source.catalog.lock().insert(
            playlist_url(id),
            Metadata {
                id: Some(id.to_string()),
                title: Some(title.to_string()),
                webpage_url: Some(playlist_url(id)),
                entries: Some(entries),
                ..Default::default()
            },
        );
        source
    }

    /// Las consultas procesadas de `id` vuelven sin URL de stream
    pub fn without_stream(self, id: &str) -> Self {
        self.streamless.lock().insert(video_url(id));
        self
    }

    pub fn with_processed_delay(self, delay: Duration) -> Self {
        *self.processed_delay.lock() = delay;
        self
    }

    /// URLs de cada consulta procesada, en orden de llamada
    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().clone()
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn extract_info(&self, url: &str, process: bool) -> Result<Metadata> {
        let mut meta = self
            .catalog
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| PlayerError::Resolver(format!("HTTP Error 404: {url}")))?;

        if process {
            let delay = *self.processed_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.processed.lock().push(url.to_string());
            if !self.streamless.lock().contains(url) {
                let sig = self.signatures.fetch_add(1, Ordering::SeqCst);
                meta.url = Some(format!("https://stream.example/{}?sig={sig}", meta.id.clone().unwrap_or_default()));
            }
        }
        Ok(meta)
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

/// Sink de audio que registra lo que se le pidió
pub struct FakeSink {
    channel: u64,
    connect_failures: AtomicU32,
    refuse_play: AtomicBool,
    fail_disconnect: AtomicBool,
    connects: AtomicU32,
    disconnects: AtomicU32,
    played: Mutex<Vec<StreamRef>>,
    completions: Mutex<Vec<TrackCompletion>>,
    volume: Mutex<Option<f32>>,
}

impl FakeSink {
    pub fn new(channel: u64) -> Self {
        Self {
            channel,
            connect_failures: AtomicU32::new(0),
            refuse_play: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            connects: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
            played: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            volume: Mutex::new(None),
        }
    }

    /// Los próximos `n` intentos de conexión fallan
    pub fn failing_connects(self, n: u32) -> Self {
        self.connect_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn refusing_play(self) -> Self {
        self.refuse_play.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_disconnect(self) -> Self {
        self.fail_disconnect.store(true, Ordering::SeqCst);
        self
    }

    /// Reporta como terminado el último track iniciado
    pub fn finish(&self, outcome: PlaybackOutcome) {
        let completion = self
            .completions
            .lock()
            .pop()
            .expect("no track is playing on the fake sink");
        completion.complete(outcome);
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().iter().map(|s| s.url.clone()).collect()
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> Option<f32> {
        *self.volume.lock()
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PlayerError::Sink("voice gateway timed out".to_string()));
        }
        Ok(())
    }

    async fn play(&self, stream: &StreamRef, on_complete: TrackCompletion) -> Result<()> {
        if self.refuse_play.load(Ordering::SeqCst) {
            return Err(PlayerError::Sink("ffmpeg exited".to_string()));
        }
        self.played.lock().push(stream.clone());
        self.completions.lock().push(on_complete);
        Ok(())
    }

    async fn disconnect(&self, _force: bool) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(PlayerError::Sink("already disconnected".to_string()));
        }
        Ok(())
    }

    async fn set_volume(&self, level: f32) -> Result<()> {
        *self.volume.lock() = Some(level);
        Ok(())
    }

    fn channel_id(&self) -> u64 {
        self.channel
    }
}
