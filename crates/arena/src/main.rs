//! Arena lobby server entry point.
//!
//! Parses the command line, loads the configuration, initialises logging,
//! wires the server and hands the terminal to the interactive console until
//! `quit`, end of input or a termination signal.

mod cli;
mod console;
mod signals;

use anyhow::Context;
use arena_event_system::ChannelTransport;
use arena_server::logging::setup_logging;
use arena_server::{load_config, ArenaServer};
use cli::CliArgs;
use console::Console;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = load_config(&args.config_path)
        .await
        .with_context(|| format!("loading {}", args.config_path.display()))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if args.sequential {
        config.event_bus.parallel_processing = false;
    }

    setup_logging(&config.logging)?;
    info!("🚀 Starting Arena v{}", env!("CARGO_PKG_VERSION"));
    info!("📂 Config: {}", args.config_path.display());

    let server = ArenaServer::new(config).await?;
    let printer = tokio::spawn(print_outbound(server.transport()));

    let mut console = Console::new(server.service());
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console.run(stdin) => {
            if let Err(e) = result {
                error!("❌ Console failed: {:#}", e);
            }
        }
        result = signals::wait_for_shutdown_signal() => {
            if let Err(e) = result {
                error!("❌ Signal handling failed: {:#}", e);
            }
        }
    }

    server.shutdown().await;
    printer.abort();
    info!("✅ Arena shut down cleanly");
    Ok(())
}

/// Prints every payload the bridges send, until the transport goes away.
async fn print_outbound(transport: Arc<ChannelTransport>) {
    let mut tap = transport.tap();
    loop {
        match tap.recv().await {
            Ok((channel, payload)) => println!("📡 [{channel}] {payload}"),
            Err(RecvError::Lagged(skipped)) => warn!("Outbound printer skipped {} messages", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
