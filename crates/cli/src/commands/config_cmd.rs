//! `stockflow config`: configuration management commands.

use stockflow_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed and validated");

            let mut warnings = Vec::new();
            if config.backend.api_key.is_none() {
                warnings.push("No API key set (set STOCKFLOW_API_KEY if the backend needs one)");
            }
            if !config.tutor.fallback_enabled {
                warnings.push("Fallback disabled: requests fail outright while the circuit is open");
            }
            if config.backend.timeout_ms > config.telemetry.latency_threshold_ms {
                warnings.push("backend.timeout_ms exceeds the latency threshold; slow replies will mark the system DEGRADED before they time out");
            }

            for w in &warnings {
                println!("   warning: {w}");
            }

            println!();
            println!("   Backend:   {}", config.backend.url);
            println!("   Breaker:   threshold {}, cooldown {}ms", config.breaker.failure_threshold, config.breaker.cooldown_ms);
            println!("   Module:    {}", config.default_module());
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if config.backend.api_key.is_some() {
        config.backend.api_key = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
