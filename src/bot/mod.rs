//! # Bot Module
//!
//! Main Discord-facing layer: command registration, slash command
//! dispatch, voice connection lifecycle and voice-state bookkeeping.
//!
//! ## Architecture
//!
//! Everything hangs off [`ResonarBot`], which implements Serenity's
//! [`EventHandler`]. The bot itself holds no playback state: commands
//! translate interactions into calls on the [`Sequencer`], references
//! get resolved by the [`TrackResolver`], and voice connections live in
//! the [`SongbirdTransport`]. Voice-state updates feed the
//! [`IdleReaper`] so the bot leaves channels it is alone in.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{reaper::IdleReaper, sequencer::Sequencer, transport::SongbirdTransport},
    config::Config,
    sources::TrackResolver,
};

pub struct ResonarBot {
    config: Arc<Config>,
    pub sequencer: Arc<Sequencer>,
    pub resolver: Arc<TrackResolver>,
    pub transport: Arc<SongbirdTransport>,
    reaper: IdleReaper,
}

impl ResonarBot {
    pub fn new(
        config: Arc<Config>,
        sequencer: Arc<Sequencer>,
        resolver: Arc<TrackResolver>,
        transport: Arc<SongbirdTransport>,
        reaper: IdleReaper,
    ) -> Self {
        Self {
            config,
            sequencer,
            resolver,
            transport,
            reaper,
        }
    }

    /// Registers slash commands, either globally or for a single guild.
    ///
    /// Guild commands propagate in seconds and are what you want during
    /// development; global commands can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Joins a voice channel and hands the call to the transport so the
    /// sequencer can start tracks on it.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        match manager.join(guild_id, channel_id).await {
            Ok(call) => {
                self.transport.register(guild_id, call);
                info!("🔊 Conectado al canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(e) => {
                error!("Error al obtener handler de voz: {:?}", e);
                Err(anyhow::anyhow!("Error al conectar al canal de voz"))
            }
        }
    }

    /// Tears down the guild session and leaves the voice channel.
    ///
    /// The session dies before the connection is dropped, so an
    /// in-flight advance never finds a transport to use.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        self.sequencer.destroy(guild_id).await;
        self.transport.forget(guild_id);

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
        if manager.get(guild_id).is_some() {
            manager.remove(guild_id).await?;
        }

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ResonarBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        // Los anuncios del secuenciador salen por este cliente HTTP
        self.sequencer.attach_http(ctx.http.clone());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Watches voice-state changes for two things: the bot being kicked
    /// or disconnected by hand, and channels where the bot ended up
    /// alone (which the reaper handles with a grace period).
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let bot_id = ctx.cache.current_user().id;
        if new.user_id == bot_id && old.is_some() && new.channel_id.is_none() {
            // Expulsado o desconectado a mano: la conexión ya no existe,
            // solo queda desmontar el estado local
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.sequencer.destroy(guild_id).await;
            self.transport.forget(guild_id);
            return;
        }

        self.reaper.observe(&ctx, guild_id);
    }
}
