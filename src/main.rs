use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::reaper::IdleReaper;
use crate::audio::sequencer::Sequencer;
use crate::audio::session::SessionRegistry;
use crate::audio::transport::{AudioTransport, SongbirdTransport};
use crate::bot::ResonarBot;
use crate::config::Config;
use crate::sources::{CatalogSource, SearchSource, SpotifyClient, TrackResolver, YouTubeClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("resonar=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎶 Iniciando Resonar v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Fuentes: la búsqueda siempre está; el catálogo solo con credenciales
    let youtube = Arc::new(YouTubeClient::new());
    if let Err(e) = youtube.verify_dependencies().await {
        warn!(
            "⚠️ yt-dlp no disponible: {:?}. Las búsquedas van a fallar hasta instalarlo",
            e
        );
    }

    let catalog: Option<Arc<dyn CatalogSource>> =
        match (&config.spotify_client_id, &config.spotify_client_secret) {
            (Some(id), Some(secret)) => {
                let spotify =
                    SpotifyClient::new(id.clone(), secret.clone(), config.max_playlist_size)?;
                info!("🎧 Expansión de enlaces de Spotify habilitada");
                Some(Arc::new(spotify))
            }
            _ => {
                info!("🎧 Sin credenciales de Spotify: los enlaces no se expandirán");
                None
            }
        };

    let search: Arc<dyn SearchSource> = youtube;
    let resolver = Arc::new(TrackResolver::new(
        catalog,
        search,
        config.search_concurrency,
    ));

    // Núcleo de reproducción
    let registry = Arc::new(SessionRegistry::new(config.max_queue_size));
    let transport = Arc::new(SongbirdTransport::new(config.default_volume)?);
    let dyn_transport: Arc<dyn AudioTransport> = transport.clone();
    let sequencer = Sequencer::new(registry, dyn_transport);
    let reaper = IdleReaper::new(
        Arc::clone(&sequencer),
        Arc::clone(&transport),
        config.idle_timeout(),
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let handler = ResonarBot::new(Arc::clone(&config), sequencer, resolver, transport, reaper);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // yt-dlp es la única dependencia externa del proceso
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
