//! Errores del dominio del bot.
//!
//! Los mensajes de `Display` son aptos para mostrarse al usuario; el
//! detalle técnico va a los logs en el punto donde se origina.

use thiserror::Error;

/// Fallos al resolver una referencia (búsqueda o enlace de catálogo)
/// en descriptores reproducibles.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// El servicio de metadatos no respondió o las credenciales no sirven.
    #[error("servicio de metadatos no disponible: {0}")]
    MetadataUnavailable(String),

    /// La expansión del enlace no produjo ninguna pista utilizable.
    #[error("el enlace no contiene pistas utilizables")]
    MetadataEmpty,

    /// La búsqueda no encontró nada para la consulta.
    #[error("sin resultados para `{0}`")]
    NotFound(String),
}

/// Fallos del backend de búsqueda/extracción. Internos a las fuentes;
/// el resolutor los traduce a [`ResolutionError`] antes de responder.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("sin coincidencias")]
    NoMatch,

    #[error("fallo del extractor: {0}")]
    Backend(String),
}

/// Fallos al iniciar la reproducción de un descriptor ya resuelto.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No hay conexión de voz registrada para la guild.
    #[error("no hay conexión de voz activa")]
    NotConnected,

    /// El transporte aceptó la pista pero nunca llegó a sonar
    /// (locator vencido, stream rechazado, driver caído).
    #[error("no se pudo iniciar `{title}`: {reason}")]
    StartFailed { title: String, reason: String },
}

/// Precondiciones de comandos que no se cumplen. No son fallos del
/// sistema: se responden al usuario y no dejan rastro en el estado.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("debes estar en un canal de voz para usar este comando")]
    NoVoiceChannel,

    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("no hay ninguna pista pausada")]
    NothingPaused,

    #[error("la cola está llena (máximo {0} pistas)")]
    QueueFull(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn los_mensajes_son_aptos_para_el_usuario() {
        let err = ResolutionError::NotFound("algo raro".to_string());
        assert_eq!(err.to_string(), "sin resultados para `algo raro`");

        let err = PreconditionError::QueueFull(500);
        assert!(err.to_string().contains("500"));
    }
}
