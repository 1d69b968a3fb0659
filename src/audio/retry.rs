//! Bounded retry with deterministic exponential backoff.
//!
//! Every call that talks to the resolver backend or the audio sink goes
//! through [`retry`], which caps the worst-case wait of any single operation.

use std::{future::Future, time::Duration};
use tracing::{debug, warn};

use crate::error::{PlayerError, Result};

/// Pausa máxima entre dos intentos, en unidades de backoff
pub const MAX_WAIT: u32 = 8;

/// Esquema de backoff: al intento `i` le siguen `min(MAX_WAIT, 2^i)` unidades
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    unit: Duration,
}

impl Backoff {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Pausa después de que falló el intento `attempt` (desde 0)
    pub fn delay(&self, attempt: u32) -> Duration {
        let units = 1u32.checked_shl(attempt).unwrap_or(u32::MAX).min(MAX_WAIT);
        self.unit * units
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Ejecuta `operation` hasta que funcione, como mucho `max_attempts + 1` veces.
///
/// Los errores no reintentables (ver [`PlayerError::is_retryable`]) se
/// devuelven tal cual. Al agotar los reintentos, el último error transitorio
/// se envuelve en [`PlayerError::RetryExhausted`]. Un `max_attempts` negativo
/// falla con [`PlayerError::InvalidArgument`] sin llamar nunca a `operation`.
pub async fn retry<T, F, Fut>(max_attempts: i32, backoff: Backoff, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if max_attempts < 0 {
        return Err(PlayerError::InvalidArgument(format!(
            "los reintentos no pueden ser negativos, se recibió {max_attempts}"
        )));
    }
    let max_attempts = max_attempts as u32;

    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("✅ Exitoso después de {} reintentos", attempt);
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(PlayerError::RetryExhausted {
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }

                let wait = backoff.delay(attempt);
                warn!(
                    "🔄 Intento {}/{} falló ({}), reintentando en {:?}",
                    attempt + 1,
                    max_attempts + 1,
                    err,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
