use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (opcional: sin credenciales la expansión de enlaces queda apagada)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Resolución
    pub search_concurrency: usize,

    // Desconexión por inactividad
    pub idle_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Spotify (cadenas vacías cuentan como ausentes)
            spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            // Resolución
            search_concurrency: std::env::var("SEARCH_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,

            // Inactividad
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Sanity checks sobre los valores cargados.
    ///
    /// - El volumen debe estar entre 0.0 y 2.0 (rango de Songbird).
    /// - Los límites de cola y playlist deben ser mayores que cero.
    /// - Las credenciales de Spotify van en pareja: una sola no sirve.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.search_concurrency == 0 {
            anyhow::bail!("Search concurrency must be greater than 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0 seconds");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!(
                "Spotify credentials are incomplete: set both SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET"
            );
        }

        Ok(())
    }

    /// Ambas credenciales presentes.
    pub fn spotify_enabled(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Resumen apto para logs: sin token ni secretos.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: comandos {}\n  \
            Spotify: {}\n  \
            Audio: {}% vol, cola máx {}, playlist máx {}\n  \
            Resolución: {} búsquedas en paralelo\n  \
            Inactividad: desconexión tras {}",
            self.guild_id
                .map_or("globales".to_string(), |id| format!("de guild {id}")),
            if self.spotify_enabled() {
                "expansión habilitada"
            } else {
                "deshabilitado"
            },
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_playlist_size,
            self.search_concurrency,
            humantime::format_duration(self.idle_timeout()),
        )
    }
}

/// Valores por defecto; Discord no tiene fallback, el token es obligatorio.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            spotify_client_id: None,
            spotify_client_secret: None,
            default_volume: 0.5,
            max_queue_size: 500,
            max_playlist_size: 100,
            search_concurrency: 4,
            idle_timeout_secs: 60,
        }
    }
}
