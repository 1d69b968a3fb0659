use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use super::sink::{AudioSink, PlaybackOutcome, TrackCompletion};
use crate::{
    error::{PlayerError, Result},
    sources::StreamRef,
};

/// Reproduce streams en un canal de voz del guild usando Songbird
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    http: reqwest::Client,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, channel_id: ChannelId) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlayerError::Sink(format!("cliente http: {e}")))?;

        Ok(Self {
            manager,
            guild_id,
            channel_id,
            http,
            track: Mutex::new(None),
        })
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn connect(&self) -> Result<()> {
        self.manager
            .join(self.guild_id, self.channel_id)
            .await
            .map_err(|e| PlayerError::Sink(format!("no se pudo unir al canal de voz: {e}")))?;
        info!("🔊 Conectado al canal de voz {} en guild {}", self.channel_id, self.guild_id);
        Ok(())
    }

    async fn play(&self, stream: &StreamRef, on_complete: TrackCompletion) -> Result<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or_else(|| PlayerError::Sink("no conectado a un canal de voz".to_string()))?;

        let input = HttpRequest::new(self.http.clone(), stream.url.clone());
        let handle = call.lock().await.play_input(input.into());

        // End y Error se disparan con un track fallido; avisa el que llegue primero
        let notifier = TrackEndNotifier {
            completion: Arc::new(Mutex::new(Some(on_complete))),
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| PlayerError::Sink(format!("no se pudo observar el track: {e}")))?;
        }

        *self.track.lock() = Some(handle);
        Ok(())
    }

    async fn disconnect(&self, force: bool) -> Result<()> {
        if let Some(track) = self.track.lock().take() {
            let _ = track.stop();
        }
        match self.manager.remove(self.guild_id).await {
            Ok(()) => {
                info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
                Ok(())
            }
            Err(e) if force => {
                debug!("Desconexión forzada en guild {}: {}", self.guild_id, e);
                Ok(())
            }
            Err(e) => Err(PlayerError::Sink(format!("no se pudo salir del canal de voz: {e}"))),
        }
    }

    async fn set_volume(&self, level: f32) -> Result<()> {
        let track = self.track.lock().clone();
        match track {
            Some(track) => track
                .set_volume(level)
                .map_err(|e| PlayerError::Sink(format!("no se pudo ajustar el volumen: {e}"))),
            None => Err(PlayerError::Sink("no hay nada reproduciéndose".to_string())),
        }
    }

    fn channel_id(&self) -> u64 {
        self.channel_id.get()
    }
}

#[derive(Clone)]
struct TrackEndNotifier {
    completion: Arc<Mutex<Option<TrackCompletion>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(PlaybackOutcome::Failed(e.to_string())),
                    _ => None,
                })
                .unwrap_or(PlaybackOutcome::Finished),
            _ => PlaybackOutcome::Finished,
        };

        if let Some(completion) = self.completion.lock().take() {
            completion.complete(outcome);
        }
        None
    }
}
