use std::sync::Arc;
use tracing::{debug, info};

pub use super::session::PlaylistView;

use super::{
    registry::SessionRegistry,
    session::{Enqueued, PlaybackSession, SessionId, SessionState},
    sink::AudioSink,
};
use crate::{
    config::PlayerSettings,
    error::{PlayerError, Result},
    sources::{PlayableItem, ResolverAdapter},
};

/// Lo que cambió una petición `play`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOutcome {
    /// Título resuelto de la canción o playlist
    pub title: String,
    /// Descripción legible del cambio en la cola
    pub changes: String,
    /// Entradas de la playlist que aún se resuelven en segundo plano
    pub pending: usize,
    /// Entradas de la playlist que no se pudieron encolar
    pub skipped: usize,
    /// `None` mientras carga la siguiente canción
    pub now_playing: Option<String>,
    pub voice_channel: u64,
}

/// Punto de entrada de los handlers de comandos.
///
/// Cada llamada se identifica por el id del guild; las sesiones se crean bajo
/// demanda y salen del registro al detenerse.
pub struct AudioPlayer {
    registry: SessionRegistry,
}

impl AudioPlayer {
    pub fn new(resolver: ResolverAdapter, settings: PlayerSettings) -> Self {
        Self {
            registry: SessionRegistry::new(resolver, settings),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Encola `query` y asegura que la sesión esté sonando en `sink`
    pub async fn play(
        &self,
        session_id: SessionId,
        query: &str,
        sink: Arc<dyn AudioSink>,
    ) -> Result<PlayOutcome> {
        let session = self.registry.get_or_create(session_id);
        let enqueued = session.enqueue(query).await?;
        self.start_if_needed(&session, sink).await?;
        Self::outcome(&session, enqueued)
    }

    /// Como [`AudioPlayer::play`], pero las canciones van al frente de la cola
    pub async fn play_next(
        &self,
        session_id: SessionId,
        query: &str,
        sink: Arc<dyn AudioSink>,
    ) -> Result<PlayOutcome> {
        let session = self.registry.get_or_create(session_id);
        let enqueued = session.push(query).await?;
        self.start_if_needed(&session, sink).await?;
        Self::outcome(&session, enqueued)
    }

    pub fn playlist(&self, session_id: SessionId) -> Result<PlaylistView> {
        self.live_session(session_id)?
            .playlist(self.registry.settings().upcoming_preview)
    }

    /// Quita una canción de la cola por título
    pub fn remove(&self, session_id: SessionId, title: &str) -> Result<PlayableItem> {
        let item = self.live_session(session_id)?.remove(title)?;
        info!("🗑️ Removido '{}' de la sesión {}", item.title(), session_id);
        Ok(item)
    }

    pub async fn set_volume(&self, session_id: SessionId, level: f32) -> Result<()> {
        self.live_session(session_id)?.set_volume(level).await
    }

    /// Detiene la sesión. Devuelve `false` si no había nada sonando
    pub async fn stop(&self, session_id: SessionId) -> bool {
        match self.registry.remove(session_id) {
            Some(session) => {
                session.stop().await;
                true
            }
            None => false,
        }
    }

    /// Detiene la sesión después de que el bot fue desconectado de `channel_id`.
    ///
    /// Una sesión que ya fue reemplazada, o que suena en otro canal, no se
    /// toca. Devuelve si se detuvo alguna sesión.
    pub async fn voice_disconnected(&self, session_id: SessionId, channel_id: u64) -> bool {
        let removed = self.registry.remove_if(session_id, |session| {
            session.state() == SessionState::Running
                && session.voice_channel().ok() == Some(channel_id)
        });
        match removed {
            Some(session) => {
                session.cleanup("desconectado del canal de voz").await;
                true
            }
            None => {
                debug!("Ninguna sesión de {} suena en el canal {}", session_id, channel_id);
                false
            }
        }
    }

    /// Estado de la sesión, `None` si no hay sesión viva
    pub fn state(&self, session_id: SessionId) -> Option<SessionState> {
        self.registry.get(session_id).map(|s| s.state())
    }

    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }

    async fn start_if_needed(
        &self,
        session: &PlaybackSession,
        sink: Arc<dyn AudioSink>,
    ) -> Result<()> {
        if session.state() != SessionState::NotStarted {
            return Ok(());
        }
        match session.join(sink).await {
            Ok(()) => Ok(()),
            // Otra petición se conectó primero
            Err(PlayerError::InvalidState {
                actual: SessionState::Running,
                ..
            }) => {
                debug!("La sesión {} ya estaba conectada", session.id());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn outcome(session: &PlaybackSession, enqueued: Enqueued) -> Result<PlayOutcome> {
        Ok(PlayOutcome {
            title: enqueued.title,
            changes: enqueued.summary,
            pending: enqueued.pending,
            skipped: enqueued.skipped,
            now_playing: session.current_title()?,
            voice_channel: session.voice_channel()?,
        })
    }

    fn live_session(&self, session_id: SessionId) -> Result<Arc<PlaybackSession>> {
        self.registry.get(session_id).ok_or_else(|| {
            PlayerError::invalid_state(&[SessionState::Running], SessionState::NotStarted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        sink::PlaybackOutcome,
        testing::{
            eventually, playlist_url, resolver, test_settings, video_url, FakeSink, FakeSource,
        },
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn player(source: FakeSource) -> AudioPlayer {
        AudioPlayer::new(resolver(Arc::new(source)), test_settings())
    }

    fn catalog() -> FakeSource {
        FakeSource::new()
            .with_video("a", "Song A")
            .with_video("b", "Song B")
    }

    #[tokio::test]
    async fn play_joins_and_reports_now_playing() {
        let player = player(catalog());
        let sink = Arc::new(FakeSink::new(42));

        let outcome = player.play(1, &video_url("a"), sink.clone()).await.unwrap();
        assert_eq!(
            outcome,
            PlayOutcome {
                title: "Song A".to_string(),
                changes: "*Song A*".to_string(),
                pending: 0,
                skipped: 0,
                now_playing: Some("Song A".to_string()),
                voice_channel: 42,
            }
        );
        assert_eq!(player.state(1), Some(SessionState::Running));

        // Una segunda petición solo encola
        let outcome = player.play(1, &video_url("b"), sink.clone()).await.unwrap();
        assert_eq!(outcome.now_playing.as_deref(), Some("Song A"));
        assert_eq!(sink.connects(), 1);
        let view = player.playlist(1).unwrap();
        assert_eq!(view.now_playing.as_deref(), Some("Song A"));
        assert_eq!(view.upcoming, vec!["Song B"]);
        assert_eq!(view.queued, 1);
    }

    #[tokio::test]
    async fn finished_session_is_forgotten() {
        let player = player(catalog());
        let sink = Arc::new(FakeSink::new(42));
        player.play(1, &video_url("a"), sink.clone()).await.unwrap();

        sink.finish(PlaybackOutcome::Finished);
        eventually("session gone", || player.state(1).is_none()).await;

        let err = player.playlist(1).unwrap_err();
        assert!(matches!(err, PlayerError::InvalidState { .. }));

        // El siguiente play crea una sesión nueva
        let outcome = player.play(1, &video_url("b"), sink.clone()).await.unwrap();
        assert_eq!(outcome.now_playing.as_deref(), Some("Song B"));
        assert_eq!(sink.connects(), 2);
    }

    #[tokio::test]
    async fn playlist_returns_before_background_entries() {
        let source = catalog()
            .with_playlist(
                "PL5",
                "Mix",
                &[("p1", "One"), ("p2", "Two"), ("p3", "Three"), ("p4", "Four"), ("p5", "Five")],
            )
            .with_processed_delay(Duration::from_millis(5));
        let player = player(source);
        let sink = Arc::new(FakeSink::new(42));

        let outcome = player.play(1, &playlist_url("PL5"), sink).await.unwrap();
        assert_eq!(outcome.changes, "*One* and others");
        assert_eq!(outcome.now_playing.as_deref(), Some("One"));
        assert_eq!(outcome.pending, 4);

        eventually("remaining entries", || {
            player.playlist(1).map(|view| view.upcoming.len()).unwrap_or(0) == 4
        })
        .await;
        assert_eq!(
            player.playlist(1).unwrap().upcoming,
            vec!["Two", "Three", "Four", "Five"]
        );
    }

    #[tokio::test]
    async fn play_during_a_track_change_still_queues() {
        let source = catalog()
            .with_video("c", "Song C")
            .with_processed_delay(Duration::from_millis(200));
        let player = player(source);
        let sink = Arc::new(FakeSink::new(42));
        player.play(1, &video_url("a"), sink.clone()).await.unwrap();
        player.play(1, &video_url("b"), sink.clone()).await.unwrap();

        // Se está resolviendo el stream de Song B, no suena nada
        sink.finish(PlaybackOutcome::Finished);
        eventually("track change", || {
            player.playlist(1).map(|view| view.now_playing.is_none()).unwrap_or(false)
        })
        .await;

        let outcome = player.play(1, &video_url("c"), sink.clone()).await.unwrap();
        assert_eq!(outcome.now_playing, None);
        assert_eq!(outcome.changes, "*Song C*");
        assert_eq!(player.playlist(1).unwrap().now_playing, None);

        eventually("second song", || {
            player.playlist(1).map(|view| view.now_playing.is_some()).unwrap_or(false)
        })
        .await;
        let view = player.playlist(1).unwrap();
        assert_eq!(view.now_playing.as_deref(), Some("Song B"));
        assert_eq!(view.upcoming, vec!["Song C"]);
    }

    #[tokio::test]
    async fn voice_disconnect_only_stops_the_matching_session() {
        let player = player(catalog());
        let sink = Arc::new(FakeSink::new(42));
        player.play(1, &video_url("a"), sink.clone()).await.unwrap();

        assert!(!player.voice_disconnected(1, 43).await);
        assert!(!player.voice_disconnected(2, 42).await);
        assert_eq!(player.state(1), Some(SessionState::Running));

        assert!(player.voice_disconnected(1, 42).await);
        assert_eq!(player.state(1), None);
        assert_eq!(sink.disconnects(), 1);

        // Una sesión nueva que aún no se conectó sobrevive a un aviso tardío
        let fresh = player.registry().get_or_create(1);
        fresh.enqueue(&video_url("b")).await.unwrap();
        assert!(!player.voice_disconnected(1, 42).await);
        assert_eq!(player.state(1), Some(SessionState::NotStarted));
    }

    #[tokio::test]
    async fn play_next_jumps_the_queue() {
        let player = player(catalog().with_video("c", "Song C"));
        let sink = Arc::new(FakeSink::new(42));
        player.play(1, &video_url("a"), sink.clone()).await.unwrap();
        player.play(1, &video_url("b"), sink.clone()).await.unwrap();

        player.play_next(1, &video_url("c"), sink).await.unwrap();
        assert_eq!(player.playlist(1).unwrap().upcoming, vec!["Song C", "Song B"]);
    }

    #[tokio::test]
    async fn rejected_queries_do_not_start_anything() {
        let player = player(catalog());
        let sink = Arc::new(FakeSink::new(42));

        let err = player.play(1, "never gonna give you up", sink.clone()).await.unwrap_err();
        assert!(matches!(err, PlayerError::NotImplemented(_)));

        let err = player.play(1, "https://vimeo.com/12345", sink.clone()).await.unwrap_err();
        assert!(matches!(err, PlayerError::InvalidInput(_)));

        assert_eq!(sink.connects(), 0);
        assert_eq!(player.state(1), Some(SessionState::NotStarted));
    }

    #[tokio::test]
    async fn remove_and_stop() {
        let player = player(catalog());
        let sink = Arc::new(FakeSink::new(42));
        player.play(1, &video_url("a"), sink.clone()).await.unwrap();
        player.play(1, &video_url("b"), sink.clone()).await.unwrap();

        assert_eq!(player.remove(1, "Song B").unwrap().title(), "Song B");
        assert_eq!(
            player.remove(1, "Song B").unwrap_err(),
            PlayerError::NotFound("Song B".to_string())
        );

        assert!(player.stop(1).await);
        assert!(!player.stop(1).await);
        assert_eq!(sink.disconnects(), 1);
    }
}
