//! Morsetap - morse-style tap counter CLI
//!
//! Counts rapid repeated inputs and emits the count, capped at 5, once a
//! pause of one window elapses. Runs an interactive stdin tap loop and, by
//! default, the web server that shares emitted signals with other clients.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use morsetap_core::{InputEvent, SignalStore, TapConfig, TapSession};
use morsetap_server::{spawn_signal_forwarder, start_server, AppState, ServerConfig};
use tokio::io::AsyncBufReadExt;
use tracing::info;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("morsetap=info".parse().unwrap())
                .add_directive("morsetap_core=info".parse().unwrap())
                .add_directive("morsetap_server=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let mut window_override: Option<u32> = None;
    let mut key_override: Option<String> = None;
    let mut port = ServerConfig::default().port;
    let mut serve = true;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("morsetap {}", VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--window" | "-w" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --window requires a value in milliseconds");
                    return Ok(());
                }
                window_override = args[i + 1].parse().ok();
                if window_override.is_none() {
                    eprintln!("Error: Invalid window: {}", args[i + 1]);
                    return Ok(());
                }
                i += 2;
                continue;
            }
            "--key" | "-k" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --key requires a key value");
                    return Ok(());
                }
                key_override = Some(args[i + 1].clone());
                i += 2;
                continue;
            }
            "--port" | "-p" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --port requires a value");
                    return Ok(());
                }
                match args[i + 1].parse() {
                    Ok(p) => port = p,
                    Err(_) => {
                        eprintln!("Error: Invalid port: {}", args[i + 1]);
                        return Ok(());
                    }
                }
                i += 2;
                continue;
            }
            "--no-server" => {
                serve = false;
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(());
            }
        }
        i += 1;
    }

    println!("Morsetap v{} - tap bursts become 1-5 signals", VERSION);
    println!();

    // Load persisted config, then apply overrides
    let mut config = TapConfig::load();
    let overridden = window_override.is_some() || key_override.is_some();
    if let Some(window_ms) = window_override {
        config.window_ms = window_ms;
    }
    if let Some(key) = key_override {
        config.trigger_key = key;
    }
    config = config.clamped();
    if overridden {
        if let Err(e) = config.save(&TapConfig::path()) {
            tracing::warn!(error = %e, "Failed to persist config");
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, port, serve))
}

fn print_help() {
    println!("Usage: morsetap [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -w, --window MS    Burst window in milliseconds, 150-2000 (default: 700)");
    println!("  -k, --key KEY      Trigger key; blank means Space (default: Space)");
    println!("  -p, --port PORT    Web server port (default: 8930)");
    println!("      --no-server    Skip the shared-signal web server");
    println!("  -v, --version      Show version");
    println!("  -h, --help         Show this help");
    println!();
    println!("Examples:");
    println!("  morsetap -w 500 -k j");
    println!("  morsetap --no-server");
}

async fn run(config: TapConfig, port: u16, serve: bool) -> Result<()> {
    let session = TapSession::spawn(config.clone());

    // Print every finalized burst the way the indicator shows it
    let mut outcomes = session.subscribe();
    tokio::spawn(async move {
        while let Ok(outcome) = outcomes.recv().await {
            if outcome.clamped {
                println!(
                    "Result: {} ({} taps, capped at 5)",
                    outcome.value, outcome.raw_count
                );
            } else {
                println!("Result: {} ({} taps)", outcome.value, outcome.raw_count);
            }
        }
    });

    if serve {
        let store = Arc::new(Mutex::new(SignalStore::new()));
        let state = AppState::new(
            session.clone(),
            store,
            ServerConfig {
                port,
                ..Default::default()
            },
        );
        spawn_signal_forwarder(state.clone());
        tokio::spawn(async move {
            if let Err(e) = start_server(state).await {
                tracing::error!(error = %e, "Web server failed");
            }
        });
        info!(port, "Sharing signals at /api/v1");
    }

    // Set up Ctrl+C handler
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let s = shutdown.clone();
    ctrlc::set_handler(move || s.notify_one()).ok();

    println!(
        "Trigger key: {} | Window: {}ms",
        config.trigger().display(),
        config.effective_window_ms()
    );
    println!("Type the trigger key and press Enter to tap (empty line = Space).");
    println!("Press Ctrl+C to stop.");
    println!("────────────────────────────────────────");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let event = line_to_event(&line);
                        match session.input(event).await {
                            Ok(Some(_)) => {
                                if let Ok(status) = session.status().await {
                                    println!("counting... ({})", status.count);
                                }
                            }
                            Ok(None) => {}
                            Err(_) => break,
                        }
                    }
                    None => break,
                }
            }
        }
    }

    println!();
    println!("Stopping...");
    session.shutdown().await;
    println!("Done.");

    Ok(())
}

/// Map an entered line to a typed input event; an empty line is the space key
fn line_to_event(line: &str) -> InputEvent {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        InputEvent::Key {
            key: " ".to_string(),
        }
    } else {
        InputEvent::Key {
            key: trimmed.to_string(),
        }
    }
}
