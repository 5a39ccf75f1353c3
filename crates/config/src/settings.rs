//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Turn detection configuration
    #[serde(default)]
    pub turn: TurnConfig,

    /// Semantic judge configuration
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Pre-reply staging configuration
    #[serde(default)]
    pub prereply: PreReplyConfig,

    /// Session registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn.short_silence_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "turn.short_silence_ms".to_string(),
                message: "Silence threshold must be positive".to_string(),
            });
        }

        if self.turn.recent_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "turn.recent_window".to_string(),
                message: "Recent judgment window must hold at least one entry".to_string(),
            });
        }

        if self.judge.timeout_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "judge.timeout_ms".to_string(),
                message: "Judge timeout too low (minimum 100ms)".to_string(),
            });
        }

        if self.judge.context_user_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "judge.context_user_turns".to_string(),
                message: "Judge context must include at least one user turn".to_string(),
            });
        }

        if self.judge.positive_token == self.judge.negative_token {
            return Err(ConfigError::InvalidValue {
                field: "judge.positive_token".to_string(),
                message: "Verdict tokens must differ".to_string(),
            });
        }

        if self.registry.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "registry.max_sessions".to_string(),
                message: "Registry must allow at least one session".to_string(),
            });
        }

        Ok(())
    }
}

/// Turn detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Silence duration that closes a segment and arms the semantic check (ms)
    #[serde(default = "default_short_silence")]
    pub short_silence_ms: u64,

    /// Entries returned by the recent-judgment window
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Join window for emotion/intent classifications (ms)
    #[serde(default = "default_classification_window")]
    pub classification_window_ms: u64,

    /// Dialogue history entries kept before compaction
    #[serde(default = "default_history_max")]
    pub history_max_entries: usize,
}

fn default_short_silence() -> u64 {
    300
}
fn default_recent_window() -> usize {
    16
}
fn default_classification_window() -> u64 {
    5000
}
fn default_history_max() -> usize {
    64
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            short_silence_ms: default_short_silence(),
            recent_window: default_recent_window(),
            classification_window_ms: default_classification_window(),
            history_max_entries: default_history_max(),
        }
    }
}

/// Semantic judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Judge call timeout (ms); expiry is treated as an undetermined verdict
    #[serde(default = "default_judge_timeout")]
    pub timeout_ms: u64,

    /// Most recent user turns (with paired agent replies) in the context
    #[serde(default = "default_context_user_turns")]
    pub context_user_turns: usize,

    /// Estimated token cap for the judgment context
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Expected verdict token for a complete turn
    #[serde(default = "default_positive_token")]
    pub positive_token: String,

    /// Expected verdict token for an incomplete turn
    #[serde(default = "default_negative_token")]
    pub negative_token: String,
}

fn default_judge_timeout() -> u64 {
    1500
}
fn default_context_user_turns() -> usize {
    2
}
fn default_max_context_tokens() -> usize {
    512
}
fn default_positive_token() -> String {
    "COMPLETE".to_string()
}
fn default_negative_token() -> String {
    "INCOMPLETE".to_string()
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_judge_timeout(),
            context_user_turns: default_context_user_turns(),
            max_context_tokens: default_max_context_tokens(),
            positive_token: default_positive_token(),
            negative_token: default_negative_token(),
        }
    }
}

/// Pre-reply staging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreReplyConfig {
    /// Enable speculative pre-reply staging
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreReplyConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// Session registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum concurrent sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle time before a session is expired (seconds)
    #[serde(default = "default_session_timeout")]
    pub session_timeout_seconds: u64,

    /// Interval between expiry sweeps (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_max_sessions() -> usize {
    1000
}
fn default_session_timeout() -> u64 {
    3600
}
fn default_cleanup_interval() -> u64 {
    300
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            session_timeout_seconds: default_session_timeout(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (TURNGATE__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("TURNGATE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(env = env.unwrap_or("default"), "Settings loaded");
    Ok(settings)
}

/// Initialize tracing from observability settings
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &ObservabilityConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("turngate={}", config.log_level).into());

    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    // Tests and embedders may have installed a subscriber already.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.turn.short_silence_ms, 300);
        assert_eq!(settings.judge.context_user_turns, 2);
        assert!(settings.prereply.enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.judge.timeout_ms = 50; // Too low
        assert!(settings.validate().is_err());

        settings.judge.timeout_ms = 1500;
        settings.turn.short_silence_ms = 0;
        assert!(settings.validate().is_err());

        settings.turn.short_silence_ms = 300;
        settings.judge.negative_token = settings.judge.positive_token.clone();
        assert!(settings.validate().is_err());
    }
}
