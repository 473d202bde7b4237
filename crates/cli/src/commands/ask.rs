//! `stockflow ask`: single-question mode.

use stockflow_agent::TutorSession;

use super::{health_line, load_config, parse_module};

pub async fn run(message: &str, module: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut session = TutorSession::from_config(&config)?;
    if let Some(module) = module {
        session.set_module(parse_module(module)?);
    }

    eprint!("  Thinking...");
    let result = session.ask(message).await;
    eprint!("\r              \r");

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            eprintln!("  [Error] {e}");
            eprintln!("  {}", health_line(&session.telemetry().snapshot()));
            return Err(e.into());
        }
    };

    println!("{}", reply.text);
    println!();
    println!(
        "  [{}{}] {}ms{}",
        reply.backend,
        if reply.degraded { ", degraded" } else { "" },
        reply.latency.as_millis(),
        if reply.used_rag { " | context used" } else { "" }
    );
    for action in &reply.suggested_actions {
        println!("  -> {action}");
    }
    println!("  {}", health_line(&session.telemetry().snapshot()));

    Ok(())
}
