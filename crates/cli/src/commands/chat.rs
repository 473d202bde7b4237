//! `stockflow chat`: interactive tutoring session.

use std::io::Write;
use std::time::Duration;

use stockflow_agent::TutorSession;
use stockflow_core::ModuleType;
use stockflow_telemetry::{SystemStatus, spawn_health_poller};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{health_line, load_config, parse_module};

/// A parsed line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Exit,
    Help,
    Status,
    Reset,
    Clear,
    Module(Option<&'a str>),
    Unknown(&'a str),
    Message(&'a str),
}

impl<'a> ReplInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            return Self::Exit;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line);
        };

        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
        match name {
            "help" => Self::Help,
            "status" => Self::Status,
            "reset" => Self::Reset,
            "clear" => Self::Clear,
            "module" => Self::Module(arg),
            _ => Self::Unknown(line),
        }
    }
}

const HELP: &str = "  /status          health snapshot and breaker state\n\
                    \x20 /module <name>   switch module (python | prompt-eng)\n\
                    \x20 /reset           force the circuit closed\n\
                    \x20 /clear           forget the conversation\n\
                    \x20 exit             quit";

pub async fn run(module: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut session = TutorSession::from_config(&config)?;
    if let Some(module) = module {
        session.set_module(parse_module(module)?);
    }

    println!();
    println!("  Stockflow Tutor (interactive)");
    println!();
    println!("  Backend:   {}", config.backend.url);
    println!("  Module:    {}", session.module().subject());
    println!(
        "  Fallback:  {}",
        if config.tutor.fallback_enabled { "offline tutor" } else { "disabled" }
    );
    println!();
    println!("  Type your question and press Enter. /help lists commands.");
    println!();

    let poller = spawn_health_poller(
        session.telemetry().clone(),
        Duration::from_millis(config.telemetry.poll_interval_ms),
        |from, to, snapshot| {
            if to == SystemStatus::Healthy {
                info!(%from, %to, "System health recovered");
            } else {
                warn!(
                    %from,
                    %to,
                    circuit = %snapshot.circuit_state,
                    error_rate = snapshot.error_rate(),
                    average_latency_ms = snapshot.average_latency,
                    "System health changed"
                );
            }
        },
    );

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt(session.module())?;

    while let Some(line) = lines.next_line().await? {
        match ReplInput::parse(&line) {
            ReplInput::Exit => break,
            ReplInput::Message("") => {}
            ReplInput::Help => println!("{HELP}"),
            ReplInput::Status => {
                let breaker = session.gate().snapshot();
                println!("  {}", health_line(&session.telemetry().snapshot()));
                println!(
                    "  breaker: {} ({}/{} failures{})",
                    breaker.state,
                    breaker.failure_count,
                    breaker.failure_threshold,
                    breaker
                        .retry_after
                        .map(|d| format!(", retry in {}ms", d.as_millis()))
                        .unwrap_or_default()
                );
            }
            ReplInput::Reset => {
                session.gate().reset();
                println!("  Circuit reset to CLOSED.");
            }
            ReplInput::Clear => {
                session.clear_history();
                println!("  Conversation cleared.");
            }
            ReplInput::Module(None) => println!("  Current module: {}", session.module()),
            ReplInput::Module(Some(name)) => match parse_module(name) {
                Ok(module) => {
                    session.set_module(module);
                    println!("  Switched to {}.", module.subject());
                }
                Err(e) => eprintln!("  [Error] {e}"),
            },
            ReplInput::Unknown(command) => {
                eprintln!("  Unknown command '{command}'. Try /help.");
            }
            ReplInput::Message(text) => {
                eprint!("  ...");
                let result = session.ask(text).await;
                eprint!("\r     \r");
                match result {
                    Ok(reply) => {
                        println!();
                        for line in reply.text.lines() {
                            println!("  Tutor > {line}");
                        }
                        println!(
                            "  ({}ms{}{})",
                            reply.latency.as_millis(),
                            if reply.used_rag { ", context used" } else { "" },
                            if reply.degraded { ", offline fallback" } else { "" }
                        );
                        println!();
                    }
                    Err(e) => {
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }
        prompt(session.module())?;
    }

    poller.abort();
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt(module: ModuleType) -> std::io::Result<()> {
    print!("  [{module}] You > ");
    std::io::stdout().flush()
}
