//! Per-guild playback state machine.
//!
//! A [`PlaybackSession`] owns one [`SongQueue`], the song currently playing and
//! the sink it plays into, all behind a single lock. Sink completions arrive
//! as [`SessionEvent`]s on the session's own event loop task, so consecutive
//! tracks never grow the call stack and `advance` runs strictly one at a time.

use parking_lot::{Mutex, RwLock};
use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::{
    queue::SongQueue,
    retry::retry,
    sink::{AudioSink, PlaybackOutcome, TrackCompletion},
};
use crate::{
    config::PlayerSettings,
    error::{PlayerError, Result},
    sources::{ItemKey, PendingEntry, PlayableItem, ResolverAdapter},
};

/// Identificador externo de la sesión (el id del guild)
pub type SessionId = u64;

/// Se llama una sola vez cuando la sesión se detuvo y liberó sus recursos
pub type Teardown = Box<dyn FnOnce(&PlaybackSession) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NotStarted,
    Running,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Mensajes que recibe el bucle de eventos de una sesión
#[derive(Debug)]
pub enum SessionEvent {
    /// El sink terminó (o falló) el track iniciado con `generation`
    TrackEnded {
        generation: u64,
        outcome: PlaybackOutcome,
    },
    /// Llegaron canciones nuevas mientras no sonaba nada
    Wake,
}

/// Dónde van las canciones recién resueltas
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Back,
    Front,
}

/// Lo que una petición `play` agregó a la cola
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    /// Título de la canción o de la playlist
    pub title: String,
    /// Descripción legible del cambio
    pub summary: String,
    /// Entradas de la playlist que aún se resuelven en segundo plano
    pub pending: usize,
    /// Entradas de la playlist descartadas por no tener referencia
    pub skipped: usize,
}

/// Canción actual y comienzo de la cola, tomados de una misma instantánea
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistView {
    /// `None` mientras se resuelve el stream de la siguiente canción
    pub now_playing: Option<String>,
    pub upcoming: Vec<String>,
    /// Canciones en cola, incluidas las que no aparecen en `upcoming`
    pub queued: usize,
    pub queued_duration: Duration,
}

/// Resultado de un paso de `advance`
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Playing(String),
    Drained,
}

struct Core {
    state: SessionState,
    queue: SongQueue,
    current: Option<PlayableItem>,
    sink: Option<Arc<dyn AudioSink>>,
    // Se incrementa con cada track y al limpiar; las notificaciones viejas se ignoran
    generation: u64,
}

pub struct PlaybackSession {
    id: SessionId,
    core: RwLock<Core>,
    resolver: ResolverAdapter,
    settings: PlayerSettings,
    events: UnboundedSender<SessionEvent>,
    advance_gate: tokio::sync::Mutex<()>,
    teardown: Mutex<Option<Teardown>>,
}

impl PlaybackSession {
    /// Crea una sesión en `NotStarted` y arranca su bucle de eventos.
    ///
    /// Debe llamarse dentro de un runtime de tokio.
    pub fn spawn(
        id: SessionId,
        resolver: ResolverAdapter,
        settings: PlayerSettings,
        teardown: Option<Teardown>,
    ) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            core: RwLock::new(Core {
                state: SessionState::NotStarted,
                queue: SongQueue::new(settings.max_queue_size),
                current: None,
                sink: None,
                generation: 0,
            }),
            resolver,
            settings,
            events,
            advance_gate: tokio::sync::Mutex::new(()),
            teardown: Mutex::new(teardown),
        });

        tokio::spawn(run_event_loop(Arc::downgrade(&session), rx));
        debug!("🆕 Sesión {} creada", id);
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.core.read().state
    }

    /// Resuelve `query` y agrega el resultado al final de la cola.
    ///
    /// El resto de la playlist sigue llegando en segundo plano.
    pub async fn enqueue(self: &Arc<Self>, query: &str) -> Result<Enqueued> {
        self.add_to_playlist(query, Placement::Back).await
    }

    /// Resuelve `query` y lo pone al frente de la cola
    pub async fn push(self: &Arc<Self>, query: &str) -> Result<Enqueued> {
        self.add_to_playlist(query, Placement::Front).await
    }

    /// Conecta el sink y empieza a reproducir la primera canción
    pub async fn join(&self, sink: Arc<dyn AudioSink>) -> Result<()> {
        let _gate = self.advance_gate.lock().await;

        {
            let core = self.core.read();
            if core.state != SessionState::NotStarted {
                return Err(PlayerError::invalid_state(
                    &[SessionState::NotStarted],
                    core.state,
                ));
            }
            if core.queue.is_empty() {
                return Err(PlayerError::EmptyQueue);
            }
        }

        retry(self.settings.retry_attempts, self.settings.backoff, || {
            let sink = sink.clone();
            async move { sink.connect().await }
        })
        .await?;

        let stale = {
            let mut core = self.core.write();
            if core.state == SessionState::NotStarted {
                core.sink = Some(sink.clone());
                core.state = SessionState::Running;
                false
            } else {
                true
            }
        };
        if stale {
            // Detenida mientras conectábamos
            if let Err(e) = sink.disconnect(true).await {
                warn!("⚠️ Ignorando error al desconectar la sesión {}: {}", self.id, e);
            }
            return Err(PlayerError::invalid_state(
                &[SessionState::NotStarted],
                self.state(),
            ));
        }

        info!("🔊 Sesión {} conectada al canal {}", self.id, sink.channel_id());
        self.advance_locked().await.map(|_| ())
    }

    /// Reproduce la siguiente canción, o detiene la sesión si no queda ninguna
    pub async fn advance(&self) -> Result<Advance> {
        let _gate = self.advance_gate.lock().await;
        self.advance_locked().await
    }

    /// Quita una canción de la cola por su clave
    pub fn remove(&self, key: &str) -> Result<PlayableItem> {
        let mut core = self.core.write();
        expect_not_stopped(core.state)?;
        core.queue.remove(&ItemKey::new(key))
    }

    pub fn now_playing(&self) -> Result<String> {
        let core = self.core.read();
        expect_running(core.state)?;
        core.current
            .as_ref()
            .map(|item| item.title().to_string())
            .ok_or(PlayerError::EmptyQueue)
    }

    /// Como [`PlaybackSession::now_playing`], pero `None` entre dos tracks
    pub fn current_title(&self) -> Result<Option<String>> {
        let core = self.core.read();
        expect_running(core.state)?;
        Ok(core.current.as_ref().map(|item| item.title().to_string()))
    }

    pub fn voice_channel(&self) -> Result<u64> {
        let core = self.core.read();
        expect_running(core.state)?;
        core.sink
            .as_ref()
            .map(|sink| sink.channel_id())
            .ok_or_else(|| PlayerError::Sink("no hay sink conectado".to_string()))
    }

    /// Hasta `n` títulos siguientes, ver [`SongQueue::peek_upcoming`]
    pub fn upcoming(&self, n: usize) -> Result<Vec<String>> {
        let core = self.core.read();
        expect_running(core.state)?;
        Ok(core.queue.peek_upcoming(n))
    }

    /// Canción actual y hasta `n` títulos siguientes
    pub fn playlist(&self, n: usize) -> Result<PlaylistView> {
        let core = self.core.read();
        expect_running(core.state)?;
        Ok(PlaylistView {
            now_playing: core.current.as_ref().map(|item| item.title().to_string()),
            upcoming: core.queue.peek_upcoming(n),
            queued: core.queue.len(),
            queued_duration: core.queue.total_duration(),
        })
    }

    pub async fn set_volume(&self, level: f32) -> Result<()> {
        let sink = {
            let core = self.core.read();
            expect_running(core.state)?;
            core.sink.clone()
        }
        .ok_or_else(|| PlayerError::Sink("no hay sink conectado".to_string()))?;

        let level = level.clamp(0.0, 2.0);
        retry(self.settings.retry_attempts, self.settings.backoff, || {
            let sink = sink.clone();
            async move { sink.set_volume(level).await }
        })
        .await?;
        info!("🔊 Volumen de la sesión {} ajustado a {}%", self.id, (level * 100.0) as u32);
        Ok(())
    }

    /// Detiene la reproducción y cierra la sesión
    pub async fn stop(&self) {
        self.cleanup("detenida por el usuario").await;
    }

    /// Libera el sink y todo el estado en memoria. Válido en cualquier estado, nunca falla.
    pub async fn cleanup(&self, reason: &str) {
        let (previous, sink) = {
            let mut core = self.core.write();
            let previous = core.state;
            core.state = SessionState::Stopped;
            core.current = None;
            core.queue.clear();
            core.generation += 1;
            (previous, core.sink.take())
        };

        if let Some(sink) = sink {
            if let Err(e) = sink.disconnect(true).await {
                warn!("⚠️ Ignorando error al desconectar la sesión {}: {}", self.id, e);
            }
        }

        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown(self);
        }

        if previous != SessionState::Stopped {
            info!("⏹️ Sesión {} detenida ({} -> STOPPED): {}", self.id, previous, reason);
        }
    }

    async fn add_to_playlist(
        self: &Arc<Self>,
        query: &str,
        placement: Placement,
    ) -> Result<Enqueued> {
        expect_not_stopped(self.state())?;

        let resolved = self.resolver.resolve(query).await?;
        let enqueued = Enqueued {
            title: resolved.title.clone(),
            summary: resolved.summary(),
            pending: resolved.remaining.len(),
            skipped: resolved.skipped,
        };

        let mut anchor: Option<ItemKey> = None;
        for item in resolved.items {
            anchor = Some(self.insert(item, placement, anchor.as_ref())?);
        }

        if !resolved.remaining.is_empty() {
            self.spawn_backfill(resolved.remaining, placement, anchor);
        }

        Ok(enqueued)
    }

    fn insert(
        &self,
        item: PlayableItem,
        placement: Placement,
        anchor: Option<&ItemKey>,
    ) -> Result<ItemKey> {
        let key = item.key().clone();
        let wake = {
            let mut core = self.core.write();
            expect_not_stopped(core.state)?;
            match (placement, anchor) {
                (Placement::Back, _) => core.queue.enqueue(item)?,
                (Placement::Front, None) => core.queue.push(item)?,
                (Placement::Front, Some(anchor)) => core.queue.insert_after(anchor, item)?,
            }
            core.state == SessionState::Running && core.current.is_none()
        };

        if wake {
            let _ = self.events.send(SessionEvent::Wake);
        }
        Ok(key)
    }

    /// Resuelve el resto de una playlist entrada por entrada, encolando cada
    /// una con el lock de la sesión apenas está lista.
    fn spawn_backfill(
        self: &Arc<Self>,
        entries: Vec<PendingEntry>,
        placement: Placement,
        mut anchor: Option<ItemKey>,
    ) {
        let session = Arc::downgrade(self);
        let resolver = self.resolver.clone();
        let id = self.id;

        tokio::spawn(async move {
            let total = entries.len();
            let mut added = 0usize;

            for entry in entries {
                let item = match resolver.resolve_entry(&entry).await {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(
                            "⚠️ Omitiendo entrada {} de la playlist en la sesión {}: {}",
                            entry.reference, id, e
                        );
                        continue;
                    }
                };

                let Some(session) = session.upgrade() else {
                    return;
                };
                match session.insert(item, placement, anchor.as_ref()) {
                    Ok(key) => {
                        anchor = Some(key);
                        added += 1;
                    }
                    Err(PlayerError::InvalidState { .. }) => {
                        debug!("Sesión {} detenida, se abandona la carga de la playlist", id);
                        return;
                    }
                    Err(e) => warn!("⚠️ No se pudo encolar la entrada de la playlist: {}", e),
                }
            }

            info!("📋 Sesión {}: {}/{} entradas de la playlist encoladas en segundo plano", id, added, total);
        });
    }

    async fn advance_locked(&self) -> Result<Advance> {
        expect_running(self.state())?;

        let this = self;
        let popped = retry(self.settings.retry_attempts, self.settings.backoff, move || async move {
            this.pop_next()
        })
        .await;

        let item = match popped {
            Ok(item) => item,
            Err(PlayerError::EmptyQueue) => {
                self.cleanup("cola vacía").await;
                return Ok(Advance::Drained);
            }
            Err(e) => {
                self.cleanup("no se pudo sacar de la cola").await;
                return Err(e);
            }
        };

        match self.start(item).await {
            Ok(title) => Ok(Advance::Playing(title)),
            Err(e) => {
                error!("❌ Error al reproducir en la sesión {}: {}", self.id, e);
                self.cleanup("falló la reproducción").await;
                Err(e)
            }
        }
    }

    fn pop_next(&self) -> Result<PlayableItem> {
        let mut core = self.core.write();
        expect_running(core.state)?;
        core.queue.pop_front()
    }

    async fn start(&self, item: PlayableItem) -> Result<String> {
        // Los enlaces de stream caducan, renovar siempre justo antes de reproducir
        let item = item.without_stream();
        let stream = self.resolver.refresh_stream(&item).await?;
        let item = item.with_stream(stream.clone());
        let title = item.title().to_string();

        let (generation, sink) = {
            let mut core = self.core.write();
            expect_running(core.state)?;
            let sink = core
                .sink
                .clone()
                .ok_or_else(|| PlayerError::Sink("no hay sink conectado".to_string()))?;
            core.generation += 1;
            core.current = Some(item);
            (core.generation, sink)
        };

        let events = self.events.clone();
        retry(self.settings.retry_attempts, self.settings.backoff, || {
            let sink = sink.clone();
            let stream = stream.clone();
            let completion = TrackCompletion::new(generation, events.clone());
            async move { sink.play(&stream, completion).await }
        })
        .await?;

        if let Err(e) = sink.set_volume(self.settings.default_volume).await {
            warn!("⚠️ No se pudo ajustar el volumen de la sesión {}: {}", self.id, e);
        }

        debug!("Stream de '{}' resuelto a las {}", title, stream.resolved_at);
        info!("🎵 Sesión {} reproduciendo: {}", self.id, title);
        Ok(title)
    }

    fn is_idle(&self) -> bool {
        let core = self.core.read();
        core.state != SessionState::Running || core.current.is_none()
    }

    async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::TrackEnded {
                generation,
                outcome,
            } => {
                let _gate = self.advance_gate.lock().await;
                {
                    let mut core = self.core.write();
                    if core.generation != generation || core.state != SessionState::Running {
                        debug!("Ignorando notificación vieja de la sesión {}", self.id);
                        return;
                    }
                    if let Some(done) = core.current.take() {
                        match &outcome {
                            PlaybackOutcome::Finished => debug!("✅ Terminó: {}", done.title()),
                            PlaybackOutcome::Failed(reason) => {
                                warn!("❌ El sink reportó un error en {}: {}", done.title(), reason)
                            }
                        }
                    }
                }
                if let Err(e) = self.advance_locked().await {
                    error!("❌ La sesión {} no pudo continuar: {}", self.id, e);
                }
            }
            SessionEvent::Wake => {
                let _gate = self.advance_gate.lock().await;
                if self.state() == SessionState::Running && self.is_idle() {
                    if let Err(e) = self.advance_locked().await {
                        error!("❌ La sesión {} no pudo reanudar: {}", self.id, e);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("state", &core.state)
            .field("queued", &core.queue.len())
            .field("current", &core.current.as_ref().map(|i| i.title()))
            .finish()
    }
}

/// Bucle de una sesión: entrega las notificaciones del sink y aplica el
/// tiempo máximo de inactividad.
///
/// Entre eventos solo guarda una referencia débil, así al soltar la sesión
/// el bucle termina.
async fn run_event_loop(session: Weak<PlaybackSession>, mut rx: UnboundedReceiver<SessionEvent>) {
    loop {
        let idle_timeout = match session.upgrade() {
            Some(s) if s.state() == SessionState::Stopped => return,
            Some(s) if s.is_idle() => Some(s.settings.idle_timeout),
            Some(_) => None,
            None => return,
        };

        let event = match idle_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    if let Some(s) = session.upgrade() {
                        if s.is_idle() {
                            info!("💤 Sesión {} inactiva durante {:?}", s.id, timeout);
                            s.cleanup("inactividad").await;
                            return;
                        }
                    }
                    continue;
                }
            },
            None => rx.recv().await,
        };

        let Some(event) = event else {
            return;
        };
        let Some(s) = session.upgrade() else {
            return;
        };
        s.handle_event(event).await;
    }
}

fn expect_running(state: SessionState) -> Result<()> {
    if state == SessionState::Running {
        Ok(())
    } else {
        Err(PlayerError::invalid_state(&[SessionState::Running], state))
    }
}

fn expect_not_stopped(state: SessionState) -> Result<()> {
    if state == SessionState::Stopped {
        Err(PlayerError::invalid_state(
            &[SessionState::NotStarted, SessionState::Running],
            state,
        ))
    } else {
        Ok(())
    }
}
