//! Generate a job description or a project plan from the command line.
//!
//! Run with:
//!
//! ```text
//! PROMPTLINE_API_KEY=... cargo run --example generate -- primary "Senior Backend Engineer"
//! PROMPTLINE_API_KEY=... cargo run --example generate -- secondary "A marketplace for used bikes"
//! ```
//!
//! Set `PROMPTLINE_DEBUG=1` to see attempts and backoff.

use std::env;

use promptline::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = if env::var_os("PROMPTLINE_DEBUG").is_some() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut args = env::args().skip(1);
    let mode = match args.next().as_deref() {
        Some("secondary") => RequestMode::Secondary,
        _ => RequestMode::Primary,
    };
    let input = args.collect::<Vec<_>>().join(" ");

    let config = ClientConfig::from_env()?;
    let orchestrator = RequestOrchestrator::from_config(&config)?;
    let mut results = orchestrator.subscribe();

    match orchestrator.submit(mode, input) {
        Ok(handle) => println!("session {} submitted", handle.id()),
        Err(SubmitError::EmptyInput) => {
            eprintln!("usage: generate [primary|secondary] <text>");
            return Ok(());
        }
    }

    if let Some(delivery) = results.recv().await {
        match delivery.result {
            Ok(text) => println!("{text}"),
            Err(cause) => {
                tracing::debug!(%cause, "generation failed");
                eprintln!("{}", cause.user_message());
            }
        }
    }
    Ok(())
}
