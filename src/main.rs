use anyhow::Result;
use bit_link::config::{AppConfig, TransportMode};
use bit_link::transport::{BitTransport, BluetoothTransport, SimulatedTransport};
use bit_link::{listener, ConnectionManager, ConnectionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Line commands accepted on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Write(u8),
    Connect,
    Disconnect,
    State,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if let Ok(value) = line.parse::<u8>() {
            return Command::Write(value);
        }

        match line.to_ascii_lowercase().as_str() {
            "c" | "connect" => Command::Connect,
            "d" | "disconnect" => Command::Disconnect,
            "s" | "state" => Command::State,
            "q" | "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line.to_owned()),
        }
    }
}

fn print_state(label: &str, snapshot: &ConnectionSnapshot) {
    println!("{}: {}", label, snapshot.state);
    println!("  name:  {}", snapshot.name.as_deref().unwrap_or("-"));
    println!("  id:    {}", snapshot.id.as_deref().unwrap_or("-"));
    println!("  error: {}", snapshot.error.as_deref().unwrap_or("-"));
    for line in &snapshot.log {
        println!("  | {}", line);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let transport: Arc<dyn BitTransport> = match config.transport {
        TransportMode::Bluetooth => Arc::new(BluetoothTransport::new(config.discovery.clone())),
        TransportMode::Simulated => Arc::new(SimulatedTransport::with_delay(config.simulated_delay)),
    };

    let manager = ConnectionManager::new(transport);
    info!("bit-link starting: label '{}' via {}", config.label, manager.transport_name());

    manager.subscribe(listener(|label, snapshot| {
        if let Some(line) = snapshot.last_log() {
            info!("[{}] {} | {}", label, snapshot.state, line);
        }
    }));

    manager.connect(&config.label, config.initial_value);
    println!("Commands: <0-255> write, c connect, d disconnect, s state, q quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match Command::parse(&line) {
                    Command::Write(value) => {
                        if !manager.get_state(&config.label).connected {
                            warn!("'{}' is not connected; value {} dropped", config.label, value);
                        }
                        manager.write(&config.label, value);
                    }
                    Command::Connect => manager.connect(&config.label, config.initial_value),
                    Command::Disconnect => manager.disconnect(&config.label),
                    Command::State => print_state(&config.label, &manager.get_state(&config.label)),
                    Command::Quit => break,
                    Command::Empty => {}
                    Command::Unknown(other) => warn!("Unknown command: {}", other),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    manager.disconnect(&config.label);
    // Give the platform a moment to process the teardown
    tokio::time::sleep(Duration::from_millis(200)).await;

    Ok(())
}
