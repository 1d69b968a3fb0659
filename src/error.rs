//! Error types for the playback engine.
//!
//! Lifecycle and queue-key errors surface to the caller immediately. Only
//! [`PlayerError::Resolver`] and [`PlayerError::Sink`] are transient; the
//! retry executor retries those and then wraps the last one in
//! [`PlayerError::RetryExhausted`].

use thiserror::Error;

use crate::audio::session::SessionState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// Argumento inválido, p. ej. un número de reintentos negativo
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operación no válida en el estado actual de la sesión
    #[error("expected {}, got [{actual}]", format_expected(.expected))]
    InvalidState {
        expected: Vec<SessionState>,
        actual: SessionState,
    },

    #[error("the queue is empty")]
    EmptyQueue,

    #[error("'{0}' is already queued")]
    DuplicateKey(String),

    #[error("'{0}' is not in the queue")]
    NotFound(String),

    #[error("the queue is full ({0} songs max)")]
    QueueFull(usize),

    /// URI válida que no apunta a un sitio soportado
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Metadata sin los campos que necesita la reproducción
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Fallo transitorio del backend de metadata (red, proceso, parseo)
    #[error("resolver error: {0}")]
    Resolver(String),

    /// Fallo transitorio del sink (conexión, reproducción, volumen)
    #[error("sink error: {0}")]
    Sink(String),

    #[error("attempted {attempts} time(s), but failed: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<PlayerError>,
    },
}

impl PlayerError {
    pub fn invalid_state(expected: &[SessionState], actual: SessionState) -> Self {
        Self::InvalidState {
            expected: expected.to_vec(),
            actual,
        }
    }

    /// Indica si el ejecutor de reintentos puede volver a intentar la operación
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolver(_) | Self::Sink(_))
    }

    /// El error más interno, ignorando los envoltorios `RetryExhausted`
    pub fn root(&self) -> &PlayerError {
        match self {
            Self::RetryExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

fn format_expected(expected: &[SessionState]) -> String {
    let names: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    if names.len() > 1 {
        format!("one of [{}]", names.join(", "))
    } else {
        format!("[{}]", names.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backend_failures_are_retryable() {
        assert!(PlayerError::Resolver("timeout".into()).is_retryable());
        assert!(PlayerError::Sink("gateway".into()).is_retryable());
        assert!(!PlayerError::EmptyQueue.is_retryable());
        assert!(!PlayerError::MalformedMetadata("no url".into()).is_retryable());
        assert!(!PlayerError::invalid_state(&[SessionState::Running], SessionState::Stopped)
            .is_retryable());
    }

    #[test]
    fn invalid_state_message_lists_expected_states() {
        let err = PlayerError::invalid_state(
            &[SessionState::NotStarted, SessionState::Running],
            SessionState::Stopped,
        );
        assert_eq!(
            err.to_string(),
            "expected one of [NOT_STARTED, RUNNING], got [STOPPED]"
        );

        let err = PlayerError::invalid_state(&[SessionState::Running], SessionState::NotStarted);
        assert_eq!(err.to_string(), "expected [RUNNING], got [NOT_STARTED]");
    }

    #[test]
    fn root_unwraps_nested_exhaustion() {
        let err = PlayerError::RetryExhausted {
            attempts: 4,
            source: Box::new(PlayerError::Resolver("403".into())),
        };
        assert_eq!(err.root(), &PlayerError::Resolver("403".into()));
    }
}
