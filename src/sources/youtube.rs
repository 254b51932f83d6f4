use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{SearchHit, SearchSource};
use crate::error::SearchError;

/// Cliente de búsqueda y extracción sobre yt-dlp.
///
/// Una sola invocación resuelve consulta o URL directa a título más
/// locator de stream: `ytsearch1:` deja que YouTube elija el mejor
/// resultado, igual que escribirlo en el buscador.
pub struct YouTubeClient {
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (solo los campos que usamos).
#[derive(Debug, Deserialize)]
struct YtDlpTrack {
    title: String,
    /// URL del formato de audio seleccionado con `-f bestaudio/best`.
    url: Option<String>,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Todo lo que empieza con esquema HTTP va directo a yt-dlp; el
    /// resto se trata como texto de búsqueda.
    pub fn is_direct_url(reference: &str) -> bool {
        reference.starts_with("http://") || reference.starts_with("https://")
    }

    fn search_target(reference: &str) -> String {
        if Self::is_direct_url(reference) {
            reference.to_string()
        } else {
            format!("ytsearch1:{reference}")
        }
    }

    fn parse_track_line(line: &str) -> Result<SearchHit, SearchError> {
        let info: YtDlpTrack = serde_json::from_str(line)
            .map_err(|e| SearchError::Backend(format!("respuesta de yt-dlp ilegible: {e}")))?;

        let stream_url = info
            .url
            .ok_or_else(|| SearchError::Backend("respuesta sin URL de stream".to_string()))?;

        Ok(SearchHit {
            title: info.title,
            stream_url,
        })
    }

    /// Comprueba que yt-dlp esté instalado y responda. Se llama al
    /// arrancar; sin él ninguna resolución va a funcionar.
    pub async fn verify_dependencies(&self) -> anyhow::Result<String> {
        let output = Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("no se pudo ejecutar yt-dlp: {e}"))?;

        if !output.status.success() {
            anyhow::bail!(
                "yt-dlp no responde: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("✅ yt-dlp disponible (versión {})", version);
        Ok(version)
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchSource for YouTubeClient {
    async fn find_best(&self, reference: &str) -> Result<SearchHit, SearchError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;

        debug!("🔍 Resolviendo con yt-dlp: {}", reference);
        let target = Self::search_target(reference);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                "--dump-json",
                &target,
            ])
            .output()
            .await
            .map_err(|e| SearchError::Backend(format!("error al ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para `{}`: {}", reference, error.trim());
            return Err(SearchError::Backend(error.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // Una búsqueda sin resultados sale con éxito pero sin JSON
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or(SearchError::NoMatch)?;

        let hit = Self::parse_track_line(line)?;
        debug!("🎯 `{}` resuelto a: {}", reference, hit.title);
        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_url_detection() {
        assert!(YouTubeClient::is_direct_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_direct_url("http://example.com/audio.mp3"));
        assert!(!YouTubeClient::is_direct_url("daft punk around the world"));
        assert!(!YouTubeClient::is_direct_url("httpx no es un esquema"));
    }

    #[test]
    fn test_search_target_format() {
        assert_eq!(
            YouTubeClient::search_target("daft punk"),
            "ytsearch1:daft punk"
        );
        assert_eq!(
            YouTubeClient::search_target("https://youtu.be/abc123"),
            "https://youtu.be/abc123"
        );
    }

    #[test]
    fn test_parse_track_line() {
        let line = r#"{"title": "Around the World", "url": "https://cdn.example/a.webm", "id": "x1"}"#;
        let hit = YouTubeClient::parse_track_line(line).unwrap();
        assert_eq!(hit.title, "Around the World");
        assert_eq!(hit.stream_url, "https://cdn.example/a.webm");
    }

    #[test]
    fn test_parse_track_line_sin_stream() {
        let line = r#"{"title": "Sin formato", "id": "x2"}"#;
        assert!(matches!(
            YouTubeClient::parse_track_line(line),
            Err(SearchError::Backend(_))
        ));
    }
}
