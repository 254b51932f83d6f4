use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::sequencer::{EnqueueReport, QueueView};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎶 Resonar";

/// Embed de respuesta a `/play`: qué arrancó, qué quedó en espera y qué
/// se perdió en el camino.
pub fn enqueue_embed(
    added: usize,
    failed: usize,
    first_title: Option<&str>,
    report: &EnqueueReport,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    // Un cierre de sesión en pleno encolado no es una cola llena: acá
    // no entró nada porque ya no había dónde
    if report.session_closed {
        return embed
            .title("🚪 Sesión cerrada")
            .description(
                "La sesión de voz se cerró mientras se agregaban las pistas; usa `/play` de nuevo",
            )
            .color(colors::NEUTRAL_GRAY);
    }

    if added == 1 {
        let title = first_title.unwrap_or("(sin título)");
        embed = match &report.started {
            Some(started) => embed
                .title("🎵 Reproduciendo")
                .description(format!("**{}**", started))
                .color(colors::SUCCESS_GREEN),
            None if report.dropped > 0 => embed
                .title("📦 Cola llena")
                .description(format!("**{}** no entró en la cola", title))
                .color(colors::WARNING_ORANGE),
            None => embed
                .title("➕ Agregada a la cola")
                .description(format!("**{}** esperará su turno", title))
                .color(colors::SUCCESS_GREEN)
                .field("📊 Posición", report.pending.to_string(), true),
        };
    } else {
        let entered = added - report.dropped;
        if entered == 0 {
            embed = embed
                .title("📦 Cola llena")
                .description("Ninguna pista del lote entró en la cola")
                .color(colors::WARNING_ORANGE);
        } else {
            embed = embed
                .title("📋 Lote agregado")
                .description(format!(
                    "Se agregaron **{} pistas** a la cola de reproducción",
                    entered
                ))
                .color(colors::MUSIC_PURPLE);

            if let Some(started) = &report.started {
                embed = embed.field("🎵 Sonando ahora", started.clone(), false);
            }
            embed = embed.field("📊 En espera", report.pending.to_string(), true);
        }
    }

    if report.dropped > 0 && added > 1 {
        embed = embed.field(
            "📦 Rechazadas por cola llena",
            report.dropped.to_string(),
            true,
        );
    }
    if failed > 0 {
        embed = embed.field("🔇 Sin resultado en la búsqueda", failed.to_string(), true);
    }

    embed
}

/// Embed para `/queue`: la pista activa, las próximas diez y el resto
/// como conteo.
pub fn queue_embed(view: &QueueView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now());

    if view.active.is_none() && view.pending.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    if let Some(active) = &view.active {
        let status = if view.paused {
            "⏸️ Pausado"
        } else {
            "▶️ Reproduciendo"
        };
        // <t:…:R> lo renderiza Discord como tiempo relativo
        embed = embed.field(
            status,
            format!(
                "**{}**\nPedida por <@{}> <t:{}:R>",
                active.title,
                active.requested_by,
                active.enqueued_at.timestamp()
            ),
            false,
        );
    }

    if !view.pending.is_empty() {
        let mut description = String::new();
        for (i, track) in view.pending.iter().take(10).enumerate() {
            description.push_str(&format!("**{}**. {}\n", i + 1, track.title));
        }
        let remaining = view.pending.len().saturating_sub(10);
        if remaining > 0 {
            description.push_str(&format!("… y {} más en la cola\n", remaining));
        }
        embed = embed.field("Próximas canciones", description, false);
    }

    embed = embed.field(
        "Información",
        format!("**En espera:** {} pistas", view.pending.len()),
        false,
    );

    embed.footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de ayuda general
pub fn help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎶 Resonar - Guía de Comandos")
        .color(colors::INFO_BLUE)
        .description("Bot de música con cola por servidor y expansión de enlaces de Spotify")
        .field(
            "🎵 Reproducción",
            "• `/play <canción>` - Reproduce o agrega a la cola\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta a la siguiente canción\n\
            • `/stop` - Detiene y limpia la cola",
            false,
        )
        .field(
            "📜 Cola y conexión",
            "• `/queue` - Muestra la cola de reproducción\n\
            • `/leave` - Desconecta el bot del canal de voz",
            false,
        )
        .field(
            "🎧 Fuentes soportadas",
            "• Búsquedas de texto y URLs (vía yt-dlp)\n\
            • Enlaces de Spotify: pista, playlist y álbum (solo metadatos)",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Embed de error
pub fn error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
