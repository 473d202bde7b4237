//! Configuration loading, validation, and management for Stockflow.
//!
//! Loads configuration from `~/.stockflow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.stockflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote tutor backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Circuit breaker guarding the backend
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Rolling telemetry and health thresholds
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Keyword context retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Tutoring session behaviour
    #[serde(default)]
    pub tutor: TutorConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Chat endpoint of the tutor service
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Per-request timeout imposed by the client
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api/v1/chat".into()
}
fn default_timeout_ms() -> u64 {
    5000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_ms: default_timeout_ms(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_failure_threshold() -> u32 {
    3
}
fn default_cooldown_ms() -> u64 {
    10_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Number of latency samples in the rolling window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Error rate above which the system is degraded
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    /// Average latency above which the system is degraded
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: u64,

    /// How often the health watcher polls snapshots
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_window_size() -> usize {
    20
}
fn default_error_rate_threshold() -> f64 {
    0.20
}
fn default_latency_threshold_ms() -> u64 {
    3000
}
fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            error_rate_threshold: default_error_rate_threshold(),
            latency_threshold_ms: default_latency_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum number of chunks injected into a prompt
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// Module a new session starts in: "python" or "prompt_eng"
    #[serde(default = "default_module")]
    pub default_module: String,

    /// Answer locally when the backend is unavailable
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

fn default_module() -> String {
    "python".into()
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            default_module: default_module(),
            fallback_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stockflow/config.toml).
    ///
    /// Environment variables override the file:
    /// - `STOCKFLOW_BACKEND_URL`
    /// - `STOCKFLOW_API_KEY`
    /// - `STOCKFLOW_TIMEOUT_MS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STOCKFLOW_BACKEND_URL") {
            self.backend.url = url;
        }

        if let Some(key) = lookup("STOCKFLOW_API_KEY") {
            self.backend.api_key = Some(key);
        }

        if let Some(raw) = lookup("STOCKFLOW_TIMEOUT_MS") {
            self.backend.timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STOCKFLOW_TIMEOUT_MS must be an integer, got '{raw}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stockflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "backend.timeout_ms must be > 0".into(),
            ));
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.failure_threshold must be >= 1".into(),
            ));
        }

        if self.telemetry.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.window_size must be >= 1".into(),
            ));
        }

        let rate = self.telemetry.error_rate_threshold;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(ConfigError::ValidationError(
                "telemetry.error_rate_threshold must be in (0.0, 1.0]".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be >= 1".into(),
            ));
        }

        if self.tutor.default_module.parse::<stockflow_core::ModuleType>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "tutor.default_module '{}' is not a known module",
                self.tutor.default_module
            )));
        }

        Ok(())
    }

    /// The module new sessions start in.
    pub fn default_module(&self) -> stockflow_core::ModuleType {
        self.tutor.default_module.parse().unwrap_or_default()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for stockflow_core::Error {
    fn from(e: ConfigError) -> Self {
        stockflow_core::Error::Config {
            message: e.to_string(),
        }
    }
}
