//! `stockflow status`: show configuration and health.

use stockflow_agent::TutorSession;
use stockflow_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let session = TutorSession::from_config(&config)?;

    println!("Stockflow Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Backend:      {}", config.backend.url);
    println!("  Timeout:      {}ms", config.backend.timeout_ms);
    println!("  API key:      {}", if config.backend.api_key.is_some() { "set" } else { "not set" });
    println!(
        "  Breaker:      {} failures, {}ms cooldown",
        config.breaker.failure_threshold, config.breaker.cooldown_ms
    );
    println!(
        "  Health:       window {}, error rate > {}, latency > {}ms",
        config.telemetry.window_size,
        config.telemetry.error_rate_threshold,
        config.telemetry.latency_threshold_ms
    );
    println!("  Module:       {}", session.module().subject());
    println!(
        "  Fallback:     {}",
        if config.tutor.fallback_enabled { "enabled" } else { "disabled" }
    );
    println!("  Knowledge:    {} chunks, top {}", session.retriever().len(), session.retriever().top_k());

    println!();
    println!("{}", serde_json::to_string_pretty(&session.telemetry().snapshot())?);

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("\n  No config file, using defaults ({})", config_path.display());
    }

    Ok(())
}
