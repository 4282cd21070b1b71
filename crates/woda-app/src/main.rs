mod cli;
mod stdio;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use woda_bridge::{Bridge, BridgeOptions};
use woda_capabilities::CapabilitySet;
use woda_config::schema::WodaConfig;
use woda_config::SettingsStore;

fn init_logging(directive: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                directive
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Read config before logging is up so `[logging] level` can apply.
    let loaded = match args.config {
        Some(ref path) => woda_config::load_config_from(path),
        None => woda_config::load_config(),
    };
    let directive = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "woda=info".to_string());
    init_logging(&directive);

    tracing::info!("Woda bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        WodaConfig::default()
    });

    match serve(&args, &config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Woda bridge failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Build the capabilities, start the bridge and serve stdin until it closes.
async fn serve(args: &cli::Args, config: &WodaConfig) -> woda_common::Result<()> {
    let settings = match SettingsStore::open_default() {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::warn!("Settings store unavailable: {e}");
            None
        }
    };

    let capabilities = CapabilitySet::from_config(config, args.base_path.clone(), settings)?;

    let bridge = Bridge::start(
        Arc::new(stdio::StdoutTransport::stdout()),
        BridgeOptions {
            retry_interval: Duration::from_millis(config.bridge.retry_interval_ms),
            max_pending: config.bridge.max_pending_frames,
        },
    );
    if let Err(e) = capabilities.register(&bridge) {
        bridge.shutdown().await;
        return Err(e.into());
    }

    if args.print_init_script {
        println!("{}", bridge.init_script());
        bridge.shutdown().await;
        return Ok(());
    }

    tracing::info!("Serving frames on stdio");
    let served = pump_stdin(&bridge).await;
    bridge.shutdown().await;
    served
}

/// Hand each non-empty stdin line to the bridge until EOF or Ctrl-C.
async fn pump_stdin(bridge: &Bridge) -> woda_common::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        bridge.handle(line);
                    }
                }
                None => {
                    tracing::info!("stdin closed");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return Ok(());
            }
        }
    }
}
