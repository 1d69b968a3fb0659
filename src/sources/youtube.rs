use async_process::Command;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{Metadata, MetadataSource};
use crate::error::{PlayerError, Result};

/// Fuente de metadata basada en yt-dlp
pub struct YtDlpSource {
    binary: String,
    // Limitar procesos concurrentes de yt-dlp para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YtDlpSource {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(3),
        }
    }

    fn args(url: &str, process: bool) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--skip-download".to_string(),
        ];
        if process {
            args.extend([
                "--no-playlist".to_string(),
                "-f".to_string(),
                "bestaudio/best".to_string(),
            ]);
        } else {
            args.push("--flat-playlist".to_string());
        }
        args.push(url.to_string());
        args
    }

    /// Verifica que yt-dlp y ffmpeg estén instalados
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        let yt_dlp = Command::new(&self.binary).arg("--version").output().await?;
        let ffmpeg = Command::new("ffmpeg").arg("-version").output().await?;

        if yt_dlp.status.success() && ffmpeg.status.success() {
            info!(
                "✅ yt-dlp {} disponible",
                String::from_utf8_lossy(&yt_dlp.stdout).trim()
            );
            Ok(())
        } else {
            anyhow::bail!("faltan dependencias: se requieren yt-dlp y ffmpeg")
        }
    }
}

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl MetadataSource for YtDlpSource {
    async fn extract_info(&self, url: &str, process: bool) -> Result<Metadata> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlayerError::Resolver(e.to_string()))?;

        debug!("📊 Extrayendo info de {} (process={})", url, process);

        let output = Command::new(&self.binary)
            .args(Self::args(url, process))
            .output()
            .await
            .map_err(|e| PlayerError::Resolver(format!("no se pudo ejecutar {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para {}: {}", url, stderr.trim());
            return Err(PlayerError::Resolver(format!("yt-dlp error: {}", stderr.trim())));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| PlayerError::Resolver(format!("salida de yt-dlp ilegible: {e}")))
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}
