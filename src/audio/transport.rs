use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, warn};

use super::queue::TrackDescriptor;
use crate::error::PlaybackError;

/// Señal de que una pista dejó de sonar, con la época bajo la que
/// arrancó. El secuenciador la compara contra la época vigente para
/// distinguir fines reales de señales obsoletas; como las épocas no se
/// reutilizan, la señal identifica también a la sesión que la emitió.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEnded {
    pub guild_id: GuildId,
    pub epoch: u64,
    pub errored: bool,
}

pub type CompletionSender = UnboundedSender<TrackEnded>;

/// Control mínimo sobre una pista ya entregada al driver. Las órdenes
/// son fire-and-forget: si el driver ya murió, la señal de fin
/// correspondiente está en camino de todos modos.
pub trait TrackControl: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn halt(&self);
}

/// Arranque de reproducción. El secuenciador habla con el transporte
/// solo por esta interfaz; los tests la sustituyen por un doble.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Entrega la pista al driver de voz y espera a que esté lista para
    /// sonar. Los notificadores de fin quedan registrados con `epoch`.
    async fn begin(
        &self,
        track: &TrackDescriptor,
        epoch: u64,
        completions: CompletionSender,
    ) -> Result<Box<dyn TrackControl>, PlaybackError>;
}

/// Transporte real sobre Songbird: una `Call` registrada por guild y
/// streaming HTTP directo del locator resuelto.
pub struct SongbirdTransport {
    calls: DashMap<GuildId, Arc<Mutex<Call>>>,
    client: reqwest::Client,
    default_volume: f32,
}

impl SongbirdTransport {
    pub fn new(default_volume: f32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            calls: DashMap::new(),
            client,
            default_volume: default_volume.clamp(0.0, 2.0),
        })
    }

    /// Asocia la conexión de voz de una guild; se llama tras el join.
    pub fn register(&self, guild_id: GuildId, call: Arc<Mutex<Call>>) {
        debug!("🔌 Conexión de voz registrada para guild {}", guild_id);
        self.calls.insert(guild_id, call);
    }

    /// Olvida la conexión de una guild; se llama al desconectar.
    pub fn forget(&self, guild_id: GuildId) {
        if self.calls.remove(&guild_id).is_some() {
            debug!("🔌 Conexión de voz olvidada para guild {}", guild_id);
        }
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.calls.contains_key(&guild_id)
    }
}

#[async_trait]
impl AudioTransport for SongbirdTransport {
    async fn begin(
        &self,
        track: &TrackDescriptor,
        epoch: u64,
        completions: CompletionSender,
    ) -> Result<Box<dyn TrackControl>, PlaybackError> {
        let call = self
            .calls
            .get(&track.guild_id)
            .map(|c| c.clone())
            .ok_or(PlaybackError::NotConnected)?;

        let input: Input = HttpRequest::new(self.client.clone(), track.stream_url.clone()).into();

        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };
        let _ = handle.set_volume(self.default_volume);

        // End y Error llegan como eventos separados; ambos notificadores
        // llevan la misma época y el secuenciador se queda con el primero.
        for event in [TrackEvent::End, TrackEvent::Error] {
            let notifier = EndNotifier {
                guild_id: track.guild_id,
                epoch,
                completions: completions.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                let _ = handle.stop();
                return Err(PlaybackError::StartFailed {
                    title: track.title.clone(),
                    reason: format!("no se pudo registrar el notificador: {e}"),
                });
            }
        }

        // Espera a que el stream abra de verdad; un locator vencido
        // falla aquí en vez de sonar a silencio.
        if let Err(e) = handle.make_playable_async().await {
            warn!("❌ El stream de `{}` no llegó a estar listo: {}", track.title, e);
            let _ = handle.stop();
            return Err(PlaybackError::StartFailed {
                title: track.title.clone(),
                reason: e.to_string(),
            });
        }

        Ok(Box::new(SongbirdControl { handle }))
    }
}

struct SongbirdControl {
    handle: TrackHandle,
}

impl TrackControl for SongbirdControl {
    fn pause(&self) {
        let _ = self.handle.pause();
    }

    fn resume(&self) {
        let _ = self.handle.play();
    }

    fn halt(&self) {
        let _ = self.handle.stop();
    }
}

/// Notificador registrado sobre cada pista: convierte los eventos del
/// driver en [`TrackEnded`] y los manda por el canal del secuenciador.
/// Nunca toca el estado de sesión él mismo.
struct EndNotifier {
    guild_id: GuildId,
    epoch: u64,
    completions: CompletionSender,
}

#[async_trait]
impl VoiceEventHandler for EndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let errored = if let EventContext::Track(list) = ctx {
            list.iter()
                .any(|(state, _)| matches!(state.playing, PlayMode::Errored(_)))
        } else {
            false
        };

        debug!(
            "🏁 Pista terminada en guild {} (época {}, error: {})",
            self.guild_id, self.epoch, errored
        );

        // El secuenciador puede haberse ido primero en el apagado; un
        // canal cerrado no es un problema del driver.
        let _ = self.completions.send(TrackEnded {
            guild_id: self.guild_id,
            epoch: self.epoch,
            errored,
        });

        None
    }
}
