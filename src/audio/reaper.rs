use serenity::all::Context;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::sequencer::Sequencer;
use super::transport::SongbirdTransport;

/// Vigila los canales de voz donde está el bot y desmonta la sesión
/// cuando se queda sin oyentes humanos.
///
/// El esquema es armar-y-revalidar: cada cambio de estado de voz que
/// deja al bot solo arma un temporizador de gracia, y al expirar se
/// vuelve a mirar el canal. Pueden convivir varios temporizadores para
/// la misma guild; la revalidación vuelve inofensivos a los de más.
pub struct IdleReaper {
    sequencer: Arc<Sequencer>,
    transport: Arc<SongbirdTransport>,
    grace: Duration,
}

impl IdleReaper {
    pub fn new(
        sequencer: Arc<Sequencer>,
        transport: Arc<SongbirdTransport>,
        grace: Duration,
    ) -> Self {
        Self {
            sequencer,
            transport,
            grace,
        }
    }

    /// Se llama en cada `voice_state_update` de la guild. Si el bot
    /// quedó solo, programa la desconexión.
    pub fn observe(&self, ctx: &Context, guild_id: GuildId) {
        let Some((channel_id, listeners)) = Self::occupancy(ctx, guild_id) else {
            return;
        };
        if listeners > 0 {
            return;
        }

        info!(
            "🚪 Canal de voz sin oyentes en guild {}; desconexión en {}",
            guild_id,
            humantime::format_duration(self.grace)
        );

        let sequencer = Arc::clone(&self.sequencer);
        let transport = Arc::clone(&self.transport);
        let ctx = ctx.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            // Revalidar al expirar: si alguien volvió, o el bot cambió
            // de canal o ya se fue, no hay nada que cosechar.
            if !still_abandoned(channel_id, Self::occupancy(&ctx, guild_id)) {
                return;
            }

            info!(
                "💤 Nadie volvió al canal en guild {}; desconectando",
                guild_id
            );
            sequencer.destroy(guild_id).await;
            transport.forget(guild_id);
            if let Some(manager) = songbird::get(&ctx).await {
                if let Err(e) = manager.remove(guild_id).await {
                    warn!("🔌 Error al salir del canal de voz: {:?}", e);
                }
            }
        });
    }

    /// Canal de voz actual del bot y cuántos oyentes humanos tiene.
    /// `None` si el bot no está en ningún canal de esa guild. Solo lee
    /// la caché; contar y decidir viven en las funciones de abajo.
    fn occupancy(ctx: &Context, guild_id: GuildId) -> Option<(ChannelId, usize)> {
        let bot_id = ctx.cache.current_user().id;
        let guild = ctx.cache.guild(guild_id)?;
        let channel_id = guild.voice_states.get(&bot_id)?.channel_id?;

        let listeners = human_listeners(
            channel_id,
            guild
                .voice_states
                .values()
                .filter(|vs| vs.user_id != bot_id)
                .map(|vs| {
                    let is_bot = vs.member.as_ref().map(|m| m.user.bot).unwrap_or(false);
                    (vs.channel_id, is_bot)
                }),
        );

        Some((channel_id, listeners))
    }
}

/// Oyentes humanos en `channel_id`, sobre pares (canal, es_bot) del
/// resto de los miembros. Un miembro sin datos en caché debe venir con
/// `es_bot = false`: ante la duda cuenta como humano antes que
/// desconectar de más.
fn human_listeners(
    channel_id: ChannelId,
    voices: impl IntoIterator<Item = (Option<ChannelId>, bool)>,
) -> usize {
    voices
        .into_iter()
        .filter(|(channel, is_bot)| *channel == Some(channel_id) && !is_bot)
        .count()
}

/// Decisión al expirar la gracia: cosechar solo si el bot sigue en el
/// canal que disparó el temporizador y sigue sin oyentes humanos.
fn still_abandoned(armed_channel: ChannelId, occupancy: Option<(ChannelId, usize)>) -> bool {
    matches!(occupancy, Some((current, 0)) if current == armed_channel)
}
