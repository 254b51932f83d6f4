//! Secuenciador de reproducción por guild.
//!
//! Toda transición de estado (encolar, saltar, pausar, detener, avance
//! automático) pasa por aquí y se ejecuta bajo el mutex de la sesión,
//! de modo que cada una observa el estado que dejó la anterior. Los
//! fines de pista llegan por un canal desde los notificadores del
//! driver y un worker los reparte en tasks, una por señal: los
//! notificadores nunca tocan el estado directamente y una guild con el
//! arranque trabado no frena los avances de las demás.

use parking_lot::RwLock;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use super::queue::TrackDescriptor;
use super::session::{ActiveTrack, PlaybackState, SessionRegistry, SessionState};
use super::transport::{AudioTransport, CompletionSender, TrackEnded};
use crate::error::{PlaybackError, PreconditionError};

/// Resultado de un encolado, para armar la respuesta al usuario.
#[derive(Debug)]
pub struct EnqueueReport {
    /// Título que empezó a sonar como consecuencia de este encolado.
    pub started: Option<String>,
    /// Pistas que quedaron esperando en la cola.
    pub pending: usize,
    /// Pistas rechazadas por cola llena.
    pub dropped: usize,
    /// La sesión se destruyó en pleno encolado y todo se descartó; no
    /// es una cola llena y la respuesta no debe decir que lo es.
    pub session_closed: bool,
}

#[derive(Debug)]
pub struct StopReport {
    /// Título que se cortó, si había algo sonando.
    pub halted: Option<String>,
    /// Pistas descartadas de la cola.
    pub cleared: usize,
}

/// Copia de solo lectura del estado de una guild, para `/queue`.
#[derive(Debug, Default)]
pub struct QueueView {
    pub active: Option<TrackDescriptor>,
    pub pending: Vec<TrackDescriptor>,
    pub paused: bool,
}

pub struct Sequencer {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn AudioTransport>,
    completions: CompletionSender,
    /// Fuente de épocas, única para todo el proceso: un valor entregado
    /// no se repite jamás, ni entre sesiones sucesivas de una guild.
    epochs: AtomicU64,
    /// Se llena en `ready`; antes de eso los anuncios se omiten.
    http: RwLock<Option<Arc<Http>>>,
}

impl Sequencer {
    pub fn new(registry: Arc<SessionRegistry>, transport: Arc<dyn AudioTransport>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sequencer = Arc::new(Self {
            registry,
            transport,
            completions: tx,
            epochs: AtomicU64::new(0),
            http: RwLock::new(None),
        });
        sequencer.spawn_completion_worker(rx);
        sequencer
    }

    /// Worker que reparte los fines de pista: cada señal avanza su
    /// guild en una task propia. El lock de sesión serializa los
    /// avances dentro de una guild y la época descarta los repetidos,
    /// así que el reparto concurrente no necesita más orden que ese.
    fn spawn_completion_worker(self: &Arc<Self>, mut rx: UnboundedReceiver<TrackEnded>) {
        let sequencer = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(ended) = rx.recv().await {
                let sequencer = Arc::clone(&sequencer);
                tokio::spawn(async move {
                    sequencer.advance(ended).await;
                });
            }
            debug!("Canal de fines cerrado, worker de avance terminado");
        });
    }

    /// Época recién acuñada. Las sesiones nacen en 0, valor que el
    /// contador nunca entrega: ninguna señal vieja puede coincidir con
    /// una sesión que todavía no arrancó nada.
    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn attach_http(&self, http: Arc<Http>) {
        *self.http.write() = Some(http);
    }

    /// Agrega pistas a la cola de la guild y, si el slot de
    /// reproducción está libre, arranca la primera de inmediato.
    pub async fn enqueue(&self, guild_id: GuildId, tracks: Vec<TrackDescriptor>) -> EnqueueReport {
        let session = self.live_session(guild_id).await;
        let mut guard = session.state.lock().await;
        let st = &mut *guard;

        if st.defunct {
            // Destruida entre el lookup y el lock; no arrancamos nada
            // sobre una sesión muerta.
            warn!("⚰️ La sesión de guild {} se destruyó durante el encolado", guild_id);
            return EnqueueReport {
                started: None,
                pending: 0,
                dropped: tracks.len(),
                session_closed: true,
            };
        }

        let mut dropped = 0usize;
        for track in tracks {
            if st.queue.enqueue(track).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(
                "📦 Cola de guild {} llena: {} pistas rechazadas",
                guild_id, dropped
            );
        }

        // Paused también ocupa el slot: encolar no debe pisar una pausa.
        // El arranque no se anuncia: la respuesta al comando ya lo dice.
        let started = if st.active.is_none() {
            self.start_next_locked(st, false).await
        } else {
            None
        };

        EnqueueReport {
            started,
            pending: st.queue.len(),
            dropped,
            session_closed: false,
        }
    }

    /// Corta la pista actual si está sonando. El avance a la siguiente
    /// lo hace la señal de fin que ese corte provoca: la época NO sube,
    /// así la señal sigue siendo vigente. En pausa es un no-op: saltar
    /// no debe arrancar sonido que el usuario dejó detenido.
    pub async fn skip(&self, guild_id: GuildId) -> Option<String> {
        let session = self.registry.get(guild_id)?;
        let st = session.state.lock().await;
        if st.playback != PlaybackState::Playing {
            return None;
        }
        let active = st.active.as_ref()?;

        let title = active.descriptor.title.clone();
        info!("⏭️ Saltando en guild {}: {}", guild_id, title);
        active.handle.halt();
        Some(title)
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<String, PreconditionError> {
        let session = self
            .registry
            .get(guild_id)
            .ok_or(PreconditionError::NothingPlaying)?;
        let mut st = session.state.lock().await;

        if st.playback != PlaybackState::Playing {
            return Err(PreconditionError::NothingPlaying);
        }
        let Some(active) = st.active.as_ref() else {
            return Err(PreconditionError::NothingPlaying);
        };

        active.handle.pause();
        let title = active.descriptor.title.clone();
        st.playback = PlaybackState::Paused;
        info!("⏸️ Pausado en guild {}: {}", guild_id, title);
        Ok(title)
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<String, PreconditionError> {
        let session = self
            .registry
            .get(guild_id)
            .ok_or(PreconditionError::NothingPaused)?;
        let mut st = session.state.lock().await;

        if st.playback != PlaybackState::Paused {
            return Err(PreconditionError::NothingPaused);
        }
        let Some(active) = st.active.as_ref() else {
            return Err(PreconditionError::NothingPaused);
        };

        active.handle.resume();
        let title = active.descriptor.title.clone();
        st.playback = PlaybackState::Playing;
        info!("▶️ Reanudado en guild {}: {}", guild_id, title);
        Ok(title)
    }

    /// Corta lo que suene y vacía la cola. Sube la época ANTES de
    /// cortar: la señal de fin del corte nace obsoleta y ningún avance
    /// automático puede colarse después. La sesión queda lista para un
    /// nuevo `/play`.
    pub async fn stop(&self, guild_id: GuildId) -> StopReport {
        let Some(session) = self.registry.get(guild_id) else {
            return StopReport {
                halted: None,
                cleared: 0,
            };
        };
        let mut guard = session.state.lock().await;
        let st = &mut *guard;

        st.epoch = self.next_epoch();
        let cleared = st.queue.clear();
        let halted = st.active.take().map(|active| {
            active.handle.halt();
            active.descriptor.title
        });
        st.playback = PlaybackState::Idle;

        if halted.is_some() || cleared > 0 {
            info!(
                "⏹️ Detenido en guild {} ({} pistas descartadas)",
                guild_id, cleared
            );
        }
        StopReport { halted, cleared }
    }

    /// Desmonta la sesión por completo (leave, expulsión o inactividad).
    /// Devuelve `false` si la guild no tenía sesión.
    pub async fn destroy(&self, guild_id: GuildId) -> bool {
        let Some(session) = self.registry.remove(guild_id) else {
            return false;
        };
        let mut guard = session.state.lock().await;
        let st = &mut *guard;

        st.defunct = true;
        st.epoch = self.next_epoch();
        let cleared = st.queue.clear();
        if let Some(active) = st.active.take() {
            active.handle.halt();
        }
        st.playback = PlaybackState::Idle;

        info!(
            "🧹 Sesión de guild {} destruida ({} pistas descartadas)",
            guild_id, cleared
        );
        true
    }

    /// Estado visible de la cola; una guild sin sesión cuenta como vacía.
    pub async fn queue_view(&self, guild_id: GuildId) -> QueueView {
        let Some(session) = self.registry.get(guild_id) else {
            return QueueView::default();
        };
        let st = session.state.lock().await;
        QueueView {
            active: st.active.as_ref().map(|a| a.descriptor.clone()),
            pending: st.queue.snapshot(),
            paused: st.playback == PlaybackState::Paused,
        }
    }

    /// Procesa una señal de fin. La época decide todo: si no coincide
    /// con la vigente, la señal viene de una pista ya cortada (stop,
    /// destroy, un arranque fallido) o de una sesión anterior de la
    /// guild, y se descarta sin tocar nada.
    async fn advance(&self, ended: TrackEnded) {
        let Some(session) = self.registry.get(ended.guild_id) else {
            debug!(
                "Señal de fin para guild {} sin sesión, descartada",
                ended.guild_id
            );
            return;
        };
        let mut guard = session.state.lock().await;
        let st = &mut *guard;

        if ended.epoch != st.epoch {
            debug!(
                "Señal de fin obsoleta en guild {} (época {} ≠ {}), suprimida",
                ended.guild_id, ended.epoch, st.epoch
            );
            return;
        }

        if let Some(finished) = st.active.take() {
            if ended.errored {
                warn!(
                    "💥 `{}` terminó con error en guild {}",
                    finished.descriptor.title, ended.guild_id
                );
                self.announce(
                    finished.descriptor.channel_id,
                    format!(
                        "⚠️ La reproducción de **{}** falló",
                        finished.descriptor.title
                    ),
                );
            } else {
                debug!(
                    "✅ `{}` terminó en guild {}",
                    finished.descriptor.title, ended.guild_id
                );
            }
        }

        let _ = self.start_next_locked(st, true).await;
    }

    /// Saca pistas del frente hasta que una arranque. Cada intento,
    /// bueno o malo, consume una época nueva, así las señales de un
    /// arranque fallido jamás coinciden con la de uno posterior. Sin
    /// conexión de voz no consume nada: la cola espera al reconectado.
    /// Con `announce_start` el arranque se avisa en el canal de origen;
    /// los avances automáticos lo usan, los comandos responden solos.
    async fn start_next_locked(
        &self,
        st: &mut SessionState,
        announce_start: bool,
    ) -> Option<String> {
        loop {
            let Some(next) = st.queue.front().cloned() else {
                st.playback = PlaybackState::Idle;
                return None;
            };

            st.epoch = self.next_epoch();
            match self
                .transport
                .begin(&next, st.epoch, self.completions.clone())
                .await
            {
                Ok(handle) => {
                    let _ = st.queue.dequeue_front();
                    info!("🎵 Reproduciendo en guild {}: {}", next.guild_id, next.title);
                    if announce_start {
                        self.announce(
                            next.channel_id,
                            format!("🎵 Reproduciendo: **{}**", next.title),
                        );
                    }
                    let title = next.title.clone();
                    st.active = Some(ActiveTrack {
                        descriptor: next,
                        handle,
                    });
                    st.playback = PlaybackState::Playing;
                    return Some(title);
                }
                Err(PlaybackError::NotConnected) => {
                    warn!(
                        "🔌 Sin conexión de voz en guild {}; la cola queda como está",
                        next.guild_id
                    );
                    st.playback = PlaybackState::Idle;
                    return None;
                }
                Err(e) => {
                    let _ = st.queue.dequeue_front();
                    warn!("⚠️ Arranque fallido, salto a la siguiente: {}", e);
                    self.announce(
                        next.channel_id,
                        format!(
                            "⚠️ No se pudo reproducir **{}**, salto a la siguiente",
                            next.title
                        ),
                    );
                }
            }
        }
    }

    /// Sesión viva de la guild; si justo fue destruida, el registro ya
    /// la soltó y la siguiente vuelta crea una fresca.
    async fn live_session(&self, guild_id: GuildId) -> Arc<super::session::GuildSession> {
        loop {
            let session = self.registry.get_or_create(guild_id);
            if !session.state.lock().await.defunct {
                return session;
            }
        }
    }

    /// Manda un mensaje al canal de texto de origen sin retener el lock
    /// de sesión: el envío corre en su propia task.
    fn announce(&self, channel_id: ChannelId, text: String) {
        let Some(http) = self.http.read().clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = channel_id.say(&http, text).await {
                warn!("📣 No se pudo anunciar en el canal {}: {}", channel_id, e);
            }
        });
    }
}
