use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::VecDeque;
use tracing::debug;

use crate::error::PreconditionError;

/// De dónde vino una petición: se estampa en cada descriptor para saber
/// a qué canal anunciar y a quién atribuir la pista.
#[derive(Debug, Clone, Copy)]
pub struct RequestOrigin {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub requested_by: UserId,
}

/// Pista ya resuelta y lista para reproducir: título legible más el
/// locator del stream que el transporte puede abrir directamente.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    pub title: String,
    pub stream_url: String,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub requested_by: UserId,
    pub enqueued_at: DateTime<Utc>,
}

impl TrackDescriptor {
    pub fn new(
        title: impl Into<String>,
        stream_url: impl Into<String>,
        origin: &RequestOrigin,
    ) -> Self {
        Self {
            title: title.into(),
            stream_url: stream_url.into(),
            guild_id: origin.guild_id,
            channel_id: origin.channel_id,
            requested_by: origin.requested_by,
            enqueued_at: Utc::now(),
        }
    }
}

/// Cola FIFO estricta de una guild. La pista en reproducción NO vive
/// aquí: al arrancar se extrae, y saltar o terminar nunca la devuelve.
#[derive(Debug)]
pub struct GuildQueue {
    items: VecDeque<TrackDescriptor>,
    capacity: usize,
}

impl GuildQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Agrega una pista al final. Con la cola llena no descarta nada:
    /// rechaza la nueva y lo informa.
    pub fn enqueue(&mut self, track: TrackDescriptor) -> Result<(), PreconditionError> {
        if self.items.len() >= self.capacity {
            return Err(PreconditionError::QueueFull(self.capacity));
        }

        debug!("➕ En cola [{}]: {}", track.guild_id, track.title);
        self.items.push_back(track);
        Ok(())
    }

    /// Extrae la primera pista (FIFO).
    pub fn dequeue_front(&mut self) -> Option<TrackDescriptor> {
        self.items.pop_front()
    }

    /// Mira la primera pista sin extraerla.
    pub fn front(&self) -> Option<&TrackDescriptor> {
        self.items.front()
    }

    /// Vacía la cola y devuelve cuántas pistas se descartaron.
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }

    /// Copia ordenada del contenido, para mostrar la cola.
    pub fn snapshot(&self) -> Vec<TrackDescriptor> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
