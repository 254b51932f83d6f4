//! Resolución de referencias: de lo que escribió el usuario a
//! descriptores reproducibles.
//!
//! Dos colaboradores detrás de traits: el catálogo ([`CatalogSource`],
//! Spotify) expande enlaces a pares artista/título, y la búsqueda
//! ([`SearchSource`], yt-dlp sobre YouTube) convierte texto en título
//! más locator de stream. El [`TrackResolver`] orquesta ambos y es lo
//! único que ven los comandos.

pub mod spotify;
pub mod youtube;

pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::queue::{RequestOrigin, TrackDescriptor};
use crate::error::{ResolutionError, SearchError};

/// Qué clase de recurso de catálogo referencia un enlace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Track,
    Playlist,
    Album,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLink {
    pub kind: CatalogKind,
    pub id: String,
}

/// Entrada de catálogo ya normalizada: lo justo para buscarla después.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub name: String,
    pub artist: Option<String>,
}

impl CatalogTrack {
    /// Texto de búsqueda, artista primero: "Daft Punk Aerodynamic"
    /// encuentra la canción; al revés suele encontrar covers.
    pub fn search_query(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} {}", artist, self.name),
            None => self.name.clone(),
        }
    }
}

/// Resultado de búsqueda listo para encolar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub stream_url: String,
}

/// Expansión de enlaces de catálogo a entradas buscables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn expand(&self, link: &CatalogLink) -> Result<Vec<CatalogTrack>, ResolutionError>;
}

/// Búsqueda y extracción: una referencia (texto o URL) al mejor
/// resultado único.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn find_best(&self, reference: &str) -> Result<SearchHit, SearchError>;
}

/// Lo que produjo una resolución: descriptores en el orden del
/// catálogo más cuántas entradas quedaron en el camino.
#[derive(Debug)]
pub struct ResolvedBatch {
    pub tracks: Vec<TrackDescriptor>,
    pub failed: usize,
}

/// Orquestador de resolución. Corre fuera de todo lock de sesión: la
/// red tarda lo que tarde sin congelar los comandos de otras guilds.
pub struct TrackResolver {
    catalog: Option<Arc<dyn CatalogSource>>,
    search: Arc<dyn SearchSource>,
    concurrency: usize,
}

impl TrackResolver {
    pub fn new(
        catalog: Option<Arc<dyn CatalogSource>>,
        search: Arc<dyn SearchSource>,
        concurrency: usize,
    ) -> Self {
        Self {
            catalog,
            search,
            concurrency: concurrency.max(1),
        }
    }

    /// Resuelve una referencia completa. Enlaces de Spotify se expanden
    /// y buscan por lotes; todo lo demás va directo a la búsqueda.
    pub async fn resolve(
        &self,
        reference: &str,
        origin: &RequestOrigin,
    ) -> Result<ResolvedBatch, ResolutionError> {
        if let Some(link) = spotify::parse_link(reference) {
            let Some(catalog) = &self.catalog else {
                return Err(ResolutionError::MetadataUnavailable(
                    "la expansión de enlaces de Spotify está deshabilitada (sin credenciales)"
                        .to_string(),
                ));
            };

            let entries = catalog.expand(&link).await?;
            if entries.is_empty() {
                return Err(ResolutionError::MetadataEmpty);
            }
            info!("🎧 Enlace expandido a {} entradas", entries.len());

            Ok(self.search_batch(entries, origin).await)
        } else {
            match self.search.find_best(reference).await {
                Ok(hit) => Ok(ResolvedBatch {
                    tracks: vec![TrackDescriptor::new(hit.title, hit.stream_url, origin)],
                    failed: 0,
                }),
                Err(SearchError::NoMatch) => Err(ResolutionError::NotFound(reference.to_string())),
                Err(SearchError::Backend(detail)) => {
                    warn!("🔍 Fallo del backend de búsqueda: {}", detail);
                    Err(ResolutionError::NotFound(reference.to_string()))
                }
            }
        }
    }

    /// Busca las entradas del catálogo con paralelismo acotado.
    /// `buffered` conserva el orden de entrada aunque las búsquedas
    /// terminen desordenadas; las fallidas se descartan y se cuentan.
    async fn search_batch(
        &self,
        entries: Vec<CatalogTrack>,
        origin: &RequestOrigin,
    ) -> ResolvedBatch {
        let results: Vec<Result<SearchHit, SearchError>> = stream::iter(entries)
            .map(|entry| {
                let search = Arc::clone(&self.search);
                async move { search.find_best(&entry.search_query()).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut tracks = Vec::new();
        let mut failed = 0usize;
        for result in results {
            match result {
                Ok(hit) => tracks.push(TrackDescriptor::new(hit.title, hit.stream_url, origin)),
                Err(e) => {
                    failed += 1;
                    debug!("🔇 Entrada de catálogo sin resultado: {}", e);
                }
            }
        }

        if failed > 0 {
            warn!("⚠️ {} entradas del catálogo no se resolvieron", failed);
        }
        ResolvedBatch { tracks, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, GuildId, UserId};

    fn origin() -> RequestOrigin {
        RequestOrigin {
            guild_id: GuildId::new(1),
            channel_id: ChannelId::new(2),
            requested_by: UserId::new(3),
        }
    }

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            stream_url: format!("https://cdn.example/{}", title.replace(' ', "-")),
        }
    }

    #[test]
    fn la_consulta_lleva_el_artista_primero() {
        let entry = CatalogTrack {
            name: "Aerodynamic".to_string(),
            artist: Some("Daft Punk".to_string()),
        };
        assert_eq!(entry.search_query(), "Daft Punk Aerodynamic");

        let sin_artista = CatalogTrack {
            name: "Intro".to_string(),
            artist: None,
        };
        assert_eq!(sin_artista.search_query(), "Intro");
    }

    #[tokio::test]
    async fn consulta_simple_produce_un_descriptor() {
        let mut search = MockSearchSource::new();
        search
            .expect_find_best()
            .withf(|reference| reference == "daft punk around the world")
            .returning(|_| Ok(hit("Around the World")));

        let search: Arc<dyn SearchSource> = Arc::new(search);
        let resolver = TrackResolver::new(None, search, 4);

        let batch = resolver
            .resolve("daft punk around the world", &origin())
            .await
            .unwrap();

        assert_eq!(batch.failed, 0);
        assert_eq!(batch.tracks.len(), 1);
        assert_eq!(batch.tracks[0].title, "Around the World");
        assert_eq!(batch.tracks[0].requested_by, UserId::new(3));
        assert_eq!(batch.tracks[0].guild_id, GuildId::new(1));
    }

    #[tokio::test]
    async fn busqueda_sin_resultados_es_not_found() {
        let mut search = MockSearchSource::new();
        search
            .expect_find_best()
            .returning(|_| Err(SearchError::NoMatch));

        let search: Arc<dyn SearchSource> = Arc::new(search);
        let resolver = TrackResolver::new(None, search, 4);

        let err = resolver.resolve("inexistente", &origin()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
    }

    #[tokio::test]
    async fn fallo_del_backend_tambien_es_not_found() {
        let mut search = MockSearchSource::new();
        search
            .expect_find_best()
            .returning(|_| Err(SearchError::Backend("se cayó".to_string())));

        let search: Arc<dyn SearchSource> = Arc::new(search);
        let resolver = TrackResolver::new(None, search, 4);

        let err = resolver.resolve("lo que sea", &origin()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
    }

    #[tokio::test]
    async fn enlace_sin_credenciales_queda_deshabilitado() {
        // Sin expectativas: la búsqueda no debe ni llamarse
        let search: Arc<dyn SearchSource> = Arc::new(MockSearchSource::new());
        let resolver = TrackResolver::new(None, search, 4);

        let err = resolver
            .resolve(
                "https://open.spotify.com/track/6rqhFgbbKwnb9MLmUQDhG6",
                &origin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MetadataUnavailable(_)));
    }

    #[tokio::test]
    async fn playlist_conserva_el_orden_y_cuenta_fallos() {
        let mut catalog = MockCatalogSource::new();
        catalog.expect_expand().returning(|link| {
            assert_eq!(link.kind, CatalogKind::Playlist);
            Ok(vec![
                CatalogTrack { name: "uno".to_string(), artist: Some("X".to_string()) },
                CatalogTrack { name: "dos".to_string(), artist: Some("X".to_string()) },
                CatalogTrack { name: "tres".to_string(), artist: Some("X".to_string()) },
                CatalogTrack { name: "cuatro".to_string(), artist: Some("X".to_string()) },
                CatalogTrack { name: "cinco".to_string(), artist: Some("X".to_string()) },
            ])
        });

        let mut search = MockSearchSource::new();
        search.expect_find_best().returning(|reference| {
            // Una entrada del medio no aparece en la búsqueda
            if reference.contains("tres") {
                Err(SearchError::NoMatch)
            } else {
                Ok(hit(reference))
            }
        });

        let catalog: Arc<dyn CatalogSource> = Arc::new(catalog);
        let search: Arc<dyn SearchSource> = Arc::new(search);
        let resolver = TrackResolver::new(Some(catalog), search, 2);

        let batch = resolver
            .resolve(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                &origin(),
            )
            .await
            .unwrap();

        assert_eq!(batch.failed, 1);
        let titles: Vec<_> = batch.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["X uno", "X dos", "X cuatro", "X cinco"]);
    }

    #[tokio::test]
    async fn expansion_vacia_es_metadata_empty() {
        let mut catalog = MockCatalogSource::new();
        catalog.expect_expand().returning(|_| Ok(Vec::new()));

        let catalog: Arc<dyn CatalogSource> = Arc::new(catalog);
        let search: Arc<dyn SearchSource> = Arc::new(MockSearchSource::new());
        let resolver = TrackResolver::new(Some(catalog), search, 4);

        let err = resolver
            .resolve("spotify:album:4aawyAB9vmqN3uQ7FjRGTy", &origin())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MetadataEmpty));
    }

    #[tokio::test]
    async fn si_todas_las_entradas_fallan_el_lote_va_vacio() {
        let mut catalog = MockCatalogSource::new();
        catalog.expect_expand().returning(|_| {
            Ok(vec![
                CatalogTrack { name: "uno".to_string(), artist: None },
                CatalogTrack { name: "dos".to_string(), artist: None },
            ])
        });

        let mut search = MockSearchSource::new();
        search
            .expect_find_best()
            .returning(|_| Err(SearchError::NoMatch));

        let catalog: Arc<dyn CatalogSource> = Arc::new(catalog);
        let search: Arc<dyn SearchSource> = Arc::new(search);
        let resolver = TrackResolver::new(Some(catalog), search, 4);

        let batch = resolver
            .resolve(
                "https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy",
                &origin(),
            )
            .await
            .unwrap();
        assert!(batch.tracks.is_empty());
        assert_eq!(batch.failed, 2);
    }
}
