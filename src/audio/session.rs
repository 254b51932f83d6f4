use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::queue::{GuildQueue, TrackDescriptor};
use super::transport::TrackControl;

/// Fase de reproducción de una sesión. Detener no tiene fase propia:
/// se materializa subiendo la época, que invalida señales en vuelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// La pista que ocupa el slot de reproducción, con su control de transporte.
pub struct ActiveTrack {
    pub descriptor: TrackDescriptor,
    pub handle: Box<dyn TrackControl>,
}

impl fmt::Debug for ActiveTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveTrack")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Estado mutable completo de una guild. Siempre se toca bajo el mutex
/// de [`GuildSession`]: cada transición observa el estado ya actualizado
/// por la anterior.
#[derive(Debug)]
pub struct SessionState {
    pub queue: GuildQueue,
    pub active: Option<ActiveTrack>,
    pub playback: PlaybackState,
    /// Cerca generacional: el secuenciador la renueva en cada arranque
    /// y en cada stop/destroy, con valores de un contador único del
    /// proceso. Una señal de fin cuya época no coincide con la actual
    /// es obsoleta y se descarta; como los valores no se reutilizan, la
    /// de una sesión anterior tampoco puede coincidir con esta. El 0
    /// inicial nunca lo entrega el contador.
    pub epoch: u64,
    /// La sesión fue destruida mientras alguien aún sostenía el Arc;
    /// ningún arranque posterior debe proceder sobre ella.
    pub defunct: bool,
}

impl SessionState {
    fn new(queue_capacity: usize) -> Self {
        Self {
            queue: GuildQueue::new(queue_capacity),
            active: None,
            playback: PlaybackState::Idle,
            epoch: 0,
            defunct: false,
        }
    }
}

#[derive(Debug)]
pub struct GuildSession {
    pub state: Mutex<SessionState>,
}

/// Registro de sesiones por guild. Crear es perezoso (primer `/play`);
/// las rutas de avance automático usan [`get`](Self::get) a propósito,
/// para no resucitar sesiones ya destruidas.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            queue_capacity,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Sesión creada para guild {}", guild_id);
                Arc::new(GuildSession {
                    state: Mutex::new(SessionState::new(self.queue_capacity)),
                })
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.remove(&guild_id).map(|(_, s)| s)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
