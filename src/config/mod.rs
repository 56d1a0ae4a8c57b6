//! Configuration module
//!
//! Handles bot settings, per-handler tuning, and loop timings.

pub mod settings;

pub use settings::{
    AutorollSettings, BuildingSettings, InputSettings, MultiplierSettings, Settings, Timings,
    WindowSettings,
};

use thiserror::Error;

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
