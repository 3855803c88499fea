// Lullabox - bedtime stories and songs
// Library surface: the built-in catalog, settings, favorites, and the
// playback session core that ties engine, focus and sleep timer together

pub mod catalog;
pub mod config;
pub mod error;
pub mod favorites;
pub mod session;
