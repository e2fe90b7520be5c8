//! Startup helpers: settings and topology loading

pub mod config;

pub use config::{load_peers, load_settings};
