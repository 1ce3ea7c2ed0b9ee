//! termbridge: headless host for the terminal session bridge.
//!
//! Speaks the UI protocol over stdio: one JSON command per stdin line,
//! one JSON event per stdout line. A desktop shell embeds the same
//! bridge with its own event sink; this binary is what you drive the
//! core with from a terminal or a test harness.

mod cli;
mod stdio;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use termbridge_config::BridgeConfig;
use termbridge_ipc::TerminalBridge;
use termbridge_session::SessionManager;

fn load_config(args: &cli::Args) -> Result<BridgeConfig, termbridge_config::ConfigError> {
    match args.config {
        Some(ref path) => termbridge_config::toml_loader::load_from_path(Path::new(path)),
        None => termbridge_config::load_config(),
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Config first: its logging level is the fallback when no CLI flag
    // or RUST_LOG is given.
    let config_result = load_config(&args);

    // Logs go to stderr so stdout stays a clean event stream.
    let log_directive = args.log_level.clone().unwrap_or_else(|| {
        config_result
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".into())
    });
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("termbridge={log_directive}"))),
        )
        .init();

    tracing::info!("termbridge v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = config_result.unwrap_or_else(|e| {
        tracing::warn!("config load failed, using defaults: {e}");
        BridgeConfig::default()
    });

    // CLI overrides
    if let Some(ref program) = args.execute {
        config.session.shell = Some(program.clone());
        config.session.login_shell = false;
    }
    if let Some(ref dir) = args.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            tracing::warn!("failed to change directory to {dir}: {e}");
        }
    }

    let (manager, events) = SessionManager::new(config.bridge.output_capacity);
    let sink = Arc::new(stdio::StdioSink::stdout());
    let bridge = Arc::new(TerminalBridge::new(manager.clone(), config, sink));

    let pump = Arc::clone(&bridge);
    let pump_task = tokio::spawn(async move { pump.run_event_pump(events).await });

    tracing::info!("reading commands from stdin");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = bridge.handle_message(line) {
            tracing::warn!(error = %e, "command rejected");
        }
    }

    // stdin closed: graceful shutdown. Close every session, give the
    // read loops a bounded window to deliver their final events, then
    // stop the pump.
    tracing::info!("stdin closed, shutting down");
    manager.close_all();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while manager.session_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    pump_task.abort();
    tracing::info!("shutdown complete");
}
