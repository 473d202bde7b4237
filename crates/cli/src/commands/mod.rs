//! Subcommand implementations.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod context;
pub mod status;

use stockflow_config::AppConfig;
use stockflow_core::ModuleType;
use stockflow_telemetry::TelemetrySnapshot;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub(crate) fn parse_module(module: &str) -> Result<ModuleType, Box<dyn std::error::Error>> {
    Ok(module.parse::<ModuleType>()?)
}

/// One-line health summary, e.g. `HEALTHY | circuit CLOSED | 3 req, 0 failed | avg 412ms`.
pub(crate) fn health_line(snapshot: &TelemetrySnapshot) -> String {
    let mut line = format!(
        "{} | circuit {} | {} req, {} failed | avg {}ms",
        snapshot.status,
        snapshot.circuit_state,
        snapshot.requests_total,
        snapshot.requests_failed,
        snapshot.average_latency
    );
    if let Some(err) = &snapshot.last_error {
        line.push_str(&format!(" | last error: {err}"));
    }
    line
}
