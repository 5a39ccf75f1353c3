//! Runtime configuration
//!
//! All thresholds that shape the turn-completion decision are runtime
//! overridable: layered YAML files plus `TURNGATE__`-prefixed environment
//! variables.

mod settings;

pub use settings::{
    init_tracing, load_settings, JudgeConfig, ObservabilityConfig, PreReplyConfig,
    RegistryConfig, Settings, TurnConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
