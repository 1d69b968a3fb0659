use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use super::session::{PlaybackSession, SessionId, SessionState, Teardown};
use crate::{config::PlayerSettings, sources::ResolverAdapter};

type Sessions = DashMap<SessionId, Arc<PlaybackSession>>;

/// Sesiones de reproducción por guild.
///
/// `DashMap` reparte el mapa en shards, así guilds distintos no se bloquean.
pub struct SessionRegistry {
    sessions: Arc<Sessions>,
    resolver: ResolverAdapter,
    settings: PlayerSettings,
}

impl SessionRegistry {
    pub fn new(resolver: ResolverAdapter, settings: PlayerSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            resolver,
            settings,
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Devuelve la sesión viva de `id`, o crea una en `NotStarted` si no hay
    /// ninguna (o solo una detenida)
    pub fn get_or_create(&self, id: SessionId) -> Arc<PlaybackSession> {
        match self.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().state() == SessionState::Stopped {
                    debug!("♻️ Reemplazando sesión detenida {}", id);
                    entry.insert(self.new_session(id));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(self.new_session(id)).clone(),
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// Quita la entrada de `id`. No hace nada si ya no existe
    pub fn remove(&self, id: SessionId) -> Option<Arc<PlaybackSession>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// Quita la entrada de `id` solo si `predicate` se cumple para la sesión viva
    pub fn remove_if(
        &self,
        id: SessionId,
        predicate: impl Fn(&PlaybackSession) -> bool,
    ) -> Option<Arc<PlaybackSession>> {
        self.sessions
            .remove_if(&id, |_, session| predicate(session))
            .map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Cierra todas las sesiones, p. ej. al apagar el bot
    pub async fn shutdown_all(&self) {
        // Recolectar primero: cleanup quita entradas del mapa
        let sessions: Vec<Arc<PlaybackSession>> =
            self.sessions.iter().map(|entry| entry.value().clone()).collect();

        info!("🛑 Cerrando {} sesiones", sessions.len());
        for session in sessions {
            session.cleanup("apagando").await;
        }
        self.sessions.clear();
    }

    fn new_session(&self, id: SessionId) -> Arc<PlaybackSession> {
        PlaybackSession::spawn(
            id,
            self.resolver.clone(),
            self.settings.clone(),
            Some(teardown_hook(Arc::downgrade(&self.sessions))),
        )
    }
}

/// Quita una sesión detenida del mapa, salvo que ya haya sido reemplazada
fn teardown_hook(sessions: Weak<Sessions>) -> Teardown {
    Box::new(move |session: &PlaybackSession| {
        if let Some(sessions) = sessions.upgrade() {
            let removed = sessions
                .remove_if(&session.id(), |_, live| std::ptr::eq(Arc::as_ptr(live), session))
                .is_some();
            if removed {
                debug!("🗑️ Sesión {} removida del registro", session.id());
            }
        }
    })
}
