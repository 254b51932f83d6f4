use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{
    audio::queue::RequestOrigin, bot::ResonarBot, error::PreconditionError, ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            respond_ephemeral(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // La precondición de voz se verifica antes del defer: la respuesta
    // efímera solo puede ser la primera respuesta de la interacción.
    let voice_channel_id = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => {
            respond_ephemeral(ctx, &command, format!("❌ {}", e)).await?;
            return Ok(());
        }
    };

    // Defer: resolver puede tardar más que la ventana de respuesta
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Conectar o mover: si el bot ya tiene llamada pero en otro canal,
    // el join lo muda al canal del usuario sin desarmar la sesión.
    let connected = bot.transport.is_connected(guild_id);
    if needs_voice_join(connected, bot_voice_channel(ctx, guild_id), voice_channel_id) {
        if let Err(e) = bot.join_voice_channel(ctx, guild_id, voice_channel_id).await {
            error!("Error al conectar al canal de voz: {:?}", e);
            let embed = embeds::error_embed(
                "No se pudo conectar",
                "Revisa que el bot tenga permisos de conexión y voz en tu canal",
            );
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            return Ok(());
        }
    }

    let origin = RequestOrigin {
        guild_id,
        channel_id: command.channel_id,
        requested_by: command.user.id,
    };

    let batch = match bot.resolver.resolve(query, &origin).await {
        Ok(batch) => batch,
        Err(e) => {
            let embed = embeds::error_embed("No se pudo resolver", &e.to_string());
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            return Ok(());
        }
    };

    let added = batch.tracks.len();
    let failed = batch.failed;
    let first_title = batch.tracks.first().map(|t| t.title.clone());

    if added == 0 {
        let embed = embeds::error_embed(
            "Sin pistas utilizables",
            "Ninguna entrada del enlace produjo resultados en la búsqueda",
        );
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
            .await?;
        return Ok(());
    }

    let report = bot.sequencer.enqueue(guild_id, batch.tracks).await;
    let embed = embeds::enqueue_embed(added, failed, first_title.as_deref(), &report);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.sequencer.pause(guild_id).await {
        Ok(title) => respond_text(ctx, &command, format!("⏸️ Pausado: **{}**", title)).await,
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {}", e)).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.sequencer.resume(guild_id).await {
        Ok(title) => respond_text(ctx, &command, format!("▶️ Reanudado: **{}**", title)).await,
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {}", e)).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.sequencer.skip(guild_id).await {
        Some(title) => respond_text(ctx, &command, format!("⏭️ Saltada: **{}**", title)).await,
        None => {
            respond_ephemeral(
                ctx,
                &command,
                format!("❌ {}", PreconditionError::NothingPlaying),
            )
            .await
        }
    }
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    let report = bot.sequencer.stop(guild_id).await;

    let text = match report.halted {
        Some(title) => format!(
            "⏹️ Detenido: **{}** ({} pistas descartadas de la cola)",
            title, report.cleared
        ),
        None if report.cleared > 0 => {
            format!("⏹️ Cola limpiada ({} pistas descartadas)", report.cleared)
        }
        None => "⏹️ No había nada sonando".to_string(),
    };

    respond_text(ctx, &command, text).await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    let view = bot.sequencer.queue_view(guild_id).await;
    let embed = embeds::queue_embed(&view);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &ResonarBot,
    guild_id: GuildId,
) -> Result<()> {
    let was_connected = bot.transport.is_connected(guild_id);
    bot.leave_voice_channel(ctx, guild_id).await?;

    let text = if was_connected {
        "👋 Desconectado del canal de voz"
    } else {
        "🤷 No estaba conectado a ningún canal de voz"
    };
    respond_text(ctx, &command, text).await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

/// Canal de voz donde está el usuario, según el caché de la guild.
fn user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, PreconditionError> {
    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return Err(PreconditionError::NoVoiceChannel);
    };

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(PreconditionError::NoVoiceChannel)
}

/// Canal de voz donde está el bot, según el caché de la guild.
fn bot_voice_channel(ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
    let bot_id = ctx.cache.current_user().id;
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&bot_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// Hace falta un join cuando no hay conexión o cuando el bot está en
/// un canal distinto al del usuario; sobre una llamada existente el
/// join equivale a moverse.
fn needs_voice_join(
    connected: bool,
    bot_channel: Option<ChannelId>,
    user_channel: ChannelId,
) -> bool {
    !connected || bot_channel != Some(user_channel)
}

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    text: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await?;

    Ok(())
}

async fn respond_ephemeral(
    ctx: &Context,
    command: &CommandInteraction,
    text: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn el_join_se_decide_por_conexion_y_canal() {
        let destino = ChannelId::new(7);

        // Sin conexión siempre hay que unirse
        assert!(needs_voice_join(false, None, destino));
        // Conectado en otro canal: el join mueve al bot
        assert!(needs_voice_join(true, Some(ChannelId::new(8)), destino));
        // Conectado pero sin estado de voz en caché: mejor re-unirse
        assert!(needs_voice_join(true, None, destino));
        // Ya en el canal del usuario: nada que hacer
        assert!(!needs_voice_join(true, Some(destino), destino));
    }
}
