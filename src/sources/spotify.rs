//! Cliente de la Web API de Spotify (client credentials).
//!
//! Spotify aquí es solo metadatos: un enlace se expande a pares
//! artista/título y cada par se busca después en YouTube. Nunca se
//! reproduce audio de Spotify.

use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use super::{CatalogKind, CatalogLink, CatalogSource, CatalogTrack};
use crate::error::ResolutionError;
use async_trait::async_trait;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Margen antes del vencimiento real del token, para no usar uno que
/// muera a mitad de una paginación.
const TOKEN_SLACK_SECS: i64 = 30;

static LINK_RE: OnceLock<Regex> = OnceLock::new();

fn link_regex() -> &'static Regex {
    LINK_RE.get_or_init(|| {
        Regex::new(
            r"(?:open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?|spotify:)(track|playlist|album)[/:]([A-Za-z0-9]+)",
        )
        .expect("patrón de enlaces de Spotify válido")
    })
}

/// Reconoce enlaces de Spotify (URL abierta, con prefijo regional, o
/// URI `spotify:`). Cualquier otra referencia devuelve `None` y sigue
/// el camino de búsqueda directa.
pub fn parse_link(reference: &str) -> Option<CatalogLink> {
    let caps = link_regex().captures(reference)?;
    let kind = match &caps[1] {
        "track" => CatalogKind::Track,
        "playlist" => CatalogKind::Playlist,
        "album" => CatalogKind::Album,
        _ => return None,
    };
    Some(CatalogLink {
        kind,
        id: caps[2].to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

/// Pista tal como la devuelve la API. Los campos son opcionales a
/// propósito: las playlists traen huecos (pistas borradas, episodios)
/// y una entrada incompleta se salta en vez de tumbar la expansión.
#[derive(Debug, Deserialize)]
struct TrackObject {
    name: Option<String>,
    artists: Option<Vec<ArtistObject>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
    max_playlist: usize,
}

impl SpotifyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        max_playlist: usize,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            token: RwLock::new(None),
            max_playlist,
        })
    }

    /// Token vigente, renovándolo si venció. El lock nunca se retiene
    /// durante la llamada de red.
    async fn bearer(&self) -> Result<String, ResolutionError> {
        {
            let cached = self.token.read();
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *self.token.write() = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, ResolutionError> {
        debug!("🔑 Solicitando token de Spotify");
        let auth = B64_ENGINE.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {auth}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ResolutionError::MetadataUnavailable(format!("fallo de red: {e}")))?
            .error_for_status()
            .map_err(|e| {
                ResolutionError::MetadataUnavailable(format!("credenciales rechazadas: {e}"))
            })?;

        let token: TokenResponse = response.json().await.map_err(|e| {
            ResolutionError::MetadataUnavailable(format!("respuesta de token ilegible: {e}"))
        })?;

        let lifetime = ChronoDuration::seconds((token.expires_in - TOKEN_SLACK_SECS).max(0));
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + lifetime,
        })
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, ResolutionError>
    where
        T: serde::de::DeserializeOwned,
    {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ResolutionError::MetadataUnavailable(format!("fallo de red: {e}")))?
            .error_for_status()
            .map_err(|e| ResolutionError::MetadataUnavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ResolutionError::MetadataUnavailable(format!("respuesta ilegible: {e}")))
    }

    fn to_catalog(track: TrackObject) -> Option<CatalogTrack> {
        let name = track.name?;
        if name.trim().is_empty() {
            return None;
        }
        let artist = track
            .artists
            .and_then(|artists| artists.into_iter().next())
            .map(|artist| artist.name);
        Some(CatalogTrack { name, artist })
    }

    async fn track_entry(&self, id: &str) -> Result<Vec<CatalogTrack>, ResolutionError> {
        let track: TrackObject = self.get_json(&format!("{API_BASE}/tracks/{id}")).await?;
        Ok(Self::to_catalog(track).into_iter().collect())
    }

    /// Recorre la paginación hasta agotarla o llegar al tope; cada
    /// página que no hace falta es una petición que no se hace.
    async fn paged_entries<T>(
        &self,
        first_url: String,
        extract: impl Fn(T) -> Option<CatalogTrack>,
    ) -> Result<Vec<CatalogTrack>, ResolutionError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut collected = Vec::new();
        let mut next_url = Some(first_url);

        while let Some(url) = next_url {
            if collected.len() >= self.max_playlist {
                break;
            }
            let page: Page<T> = self.get_json(&url).await?;
            for item in page.items {
                if collected.len() >= self.max_playlist {
                    break;
                }
                if let Some(entry) = extract(item) {
                    collected.push(entry);
                }
            }
            next_url = page.next;
        }

        Ok(collected)
    }

    async fn playlist_entries(&self, id: &str) -> Result<Vec<CatalogTrack>, ResolutionError> {
        let entries = self
            .paged_entries(
                format!("{API_BASE}/playlists/{id}/tracks?limit=100"),
                |entry: PlaylistEntry| entry.track.and_then(Self::to_catalog),
            )
            .await?;
        info!("📋 Playlist {} expandida a {} pistas", id, entries.len());
        Ok(entries)
    }

    async fn album_entries(&self, id: &str) -> Result<Vec<CatalogTrack>, ResolutionError> {
        let entries = self
            .paged_entries(
                format!("{API_BASE}/albums/{id}/tracks?limit=50"),
                Self::to_catalog,
            )
            .await?;
        info!("💿 Álbum {} expandido a {} pistas", id, entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl CatalogSource for SpotifyClient {
    async fn expand(&self, link: &CatalogLink) -> Result<Vec<CatalogTrack>, ResolutionError> {
        match link.kind {
            CatalogKind::Track => self.track_entry(&link.id).await,
            CatalogKind::Playlist => self.playlist_entries(&link.id).await,
            CatalogKind::Album => self.album_entries(&link.id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reconoce_enlaces_de_track() {
        let link =
            parse_link("https://open.spotify.com/track/6rqhFgbbKwnb9MLmUQDhG6").unwrap();
        assert_eq!(link.kind, CatalogKind::Track);
        assert_eq!(link.id, "6rqhFgbbKwnb9MLmUQDhG6");
    }

    #[test]
    fn reconoce_enlaces_con_prefijo_regional_y_query() {
        let link = parse_link(
            "https://open.spotify.com/intl-es/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc123",
        )
        .unwrap();
        assert_eq!(link.kind, CatalogKind::Playlist);
        assert_eq!(link.id, "37i9dQZF1DXcBWIGoYBM5M");
    }

    #[test]
    fn reconoce_uris_de_spotify() {
        let link = parse_link("spotify:album:4aawyAB9vmqN3uQ7FjRGTy").unwrap();
        assert_eq!(link.kind, CatalogKind::Album);
        assert_eq!(link.id, "4aawyAB9vmqN3uQ7FjRGTy");
    }

    #[test]
    fn ignora_todo_lo_demas() {
        assert_eq!(parse_link("https://open.spotify.com/artist/0OdUWJ0sBjDrqHygGUXeCF"), None);
        assert_eq!(parse_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(parse_link("daft punk around the world"), None);
    }

    #[test]
    fn entradas_sin_nombre_se_saltan() {
        assert_eq!(
            SpotifyClient::to_catalog(TrackObject {
                name: None,
                artists: None
            }),
            None
        );
        assert_eq!(
            SpotifyClient::to_catalog(TrackObject {
                name: Some("  ".to_string()),
                artists: None
            }),
            None
        );

        let entry = SpotifyClient::to_catalog(TrackObject {
            name: Some("Aerodynamic".to_string()),
            artists: Some(vec![ArtistObject {
                name: "Daft Punk".to_string(),
            }]),
        })
        .unwrap();
        assert_eq!(entry.name, "Aerodynamic");
        assert_eq!(entry.artist.as_deref(), Some("Daft Punk"));
    }

    #[test]
    fn deserializa_paginas_de_playlist() {
        let payload = r#"{
            "items": [
                {"track": {"name": "Uno", "artists": [{"name": "A"}]}},
                {"track": null},
                {"track": {"artists": [{"name": "B"}]}}
            ],
            "next": "https://api.spotify.com/v1/playlists/x/tracks?offset=100"
        }"#;
        let page: Page<PlaylistEntry> = serde_json::from_str(payload).unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.next.is_some());

        let usable: Vec<_> = page
            .items
            .into_iter()
            .filter_map(|entry| entry.track.and_then(SpotifyClient::to_catalog))
            .collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "Uno");
    }
}
