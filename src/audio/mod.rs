//! # Audio Module
//!
//! Núcleo de reproducción por guild: cola, sesión y secuenciador.
//!
//! El flujo completo es corto de contar:
//!
//! ### [`queue`] - Cola FIFO
//! - Descriptores ya resueltos, en orden estricto de llegada
//! - Capacidad acotada: llena rechaza, nunca descarta lo encolado
//!
//! ### [`session`] - Estado por guild
//! - Una sesión perezosa por guild bajo un único mutex
//! - La época generacional que invalida señales de fin obsoletas
//!
//! ### [`transport`] - Entrega al driver de voz
//! - Abstracción mínima sobre Songbird (arrancar, pausar, cortar)
//! - Notificadores que convierten eventos del driver en señales
//!
//! ### [`sequencer`] - Transiciones
//! - Encolar, saltar, pausar, reanudar, detener y el avance automático
//! - Todas serializadas por el mutex de la sesión de su guild
//!
//! ### [`reaper`] - Desconexión por inactividad
//! - Canal sin oyentes humanos: gracia, revalidación y desmontaje

pub mod queue;
pub mod reaper;
pub mod sequencer;
pub mod session;
pub mod transport;
