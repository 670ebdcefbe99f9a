//! Softphone console dialer
//!
//! Runs the call coordinator against the loopback signaling client and a
//! logging call UI, driven from stdin.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use softphone::console::{Console, ConsoleCommand, HELP};
use softphone::coordinator::{self, Coordinator};
use softphone::loopback::{LoggingBridge, LoopbackMedia, LoopbackSignaling};
use softphone::PhoneConfig;

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("softphone=info".parse()?))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?
        .block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let config = PhoneConfig::from_env();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid phone configuration")?;

    tracing::info!("Starting {} (default number {})", config.app_name, config.default_number);

    let (sink, events) = coordinator::channel(config.event_buffer);
    let signaling = Arc::new(LoopbackSignaling::new(
        sink.clone(),
        Duration::from_millis(config.loopback_answer_delay_ms),
    ));
    let bridge = Arc::new(LoggingBridge::new(sink.clone()));
    let media = Arc::new(LoopbackMedia::default());

    let default_number = config.default_number.clone();
    let coordinator = Coordinator::new(config, signaling.clone(), bridge.clone(), media);
    let (handle, task) = coordinator.spawn(sink, events);

    // Report state changes the way a dialer screen would re-render
    let mut state_rx = handle.subscribe();
    tokio::spawn(async move {
        let mut last_status = String::new();
        while state_rx.changed().await.is_ok() {
            let snapshot = state_rx.borrow_and_update().clone();
            let status = match (&snapshot.peer_number, &snapshot.last_error) {
                (Some(peer), _) => format!("{}: {}", snapshot.status_text(), peer),
                (None, Some(error)) => format!("{} (last error: {})", snapshot.status_text(), error),
                (None, None) => snapshot.status_text().to_string(),
            };
            if status != last_status {
                println!("[{}]", status);
                last_status = status;
            }
        }
    });

    let console = Console::new(handle.clone(), signaling, bridge, default_number);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(command) => match console.execute(command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => println!("Error: {:#}", e),
            },
            Err(e) => println!("{} (type 'help')", e),
        }
    }

    handle.shutdown();
    task.await.context("Coordinator task failed")?;
    tracing::info!("Logged out");
    Ok(())
}
