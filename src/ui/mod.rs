//! Presentación: los embeds con los que responden los comandos.

pub mod embeds;
