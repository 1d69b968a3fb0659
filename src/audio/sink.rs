use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::session::SessionEvent;
use crate::{error::Result, sources::StreamRef};

/// Cómo terminó un track entregado al sink
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Finished,
    Failed(String),
}

/// Aviso de fin de track, de un solo uso, que recibe el sink con cada track.
///
/// [`TrackCompletion::complete`] consume el aviso, así un track se reporta
/// como mucho una vez. Solo envía un mensaje al bucle de eventos de la sesión;
/// nunca toca el estado de la sesión desde el hilo del sink.
#[derive(Debug)]
pub struct TrackCompletion {
    generation: u64,
    events: UnboundedSender<SessionEvent>,
}

impl TrackCompletion {
    pub(crate) fn new(generation: u64, events: UnboundedSender<SessionEvent>) -> Self {
        Self { generation, events }
    }

    pub fn complete(self, outcome: PlaybackOutcome) {
        let event = SessionEvent::TrackEnded {
            generation: self.generation,
            outcome,
        };
        if self.events.send(event).is_err() {
            debug!("La sesión ya no existe, se descarta el aviso");
        }
    }
}

/// Salida de audio externa (una conexión de voz)
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn connect(&self) -> Result<()>;

    /// Empieza a reproducir `stream`; `on_complete` debe dispararse cuando el
    /// track termine o falle
    async fn play(&self, stream: &StreamRef, on_complete: TrackCompletion) -> Result<()>;

    async fn disconnect(&self, force: bool) -> Result<()>;

    async fn set_volume(&self, level: f32) -> Result<()>;

    /// Canal de voz en el que suena el sink
    fn channel_id(&self) -> u64;
}
