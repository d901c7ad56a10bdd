//! filewatcher - folder change watcher
//!
//! Entry point for the filewatcher daemon.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use anyhow::Context;
use clap::Parser;
use filewatcher::config::{WatchesFile, DEFAULT_CONFIG_PATH};
use filewatcher::telemetry::{init_metrics, init_tracing, render_metrics};
use filewatcher::watcher::Watch;
use filewatcher::Config;
use tokio::signal;

/// filewatcher - watch folders and react to file changes
#[derive(Parser, Debug)]
#[command(name = "filewatcher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the TOML watch file
    #[arg(short, long, env = "FILEWATCHER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FILEWATCHER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "FILEWATCHER_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        config_path: cli.config,
        log_level: cli.log_level,
        log_json: cli.log_json,
    };
    config.validate()?;

    init_tracing(&config.log_level, config.log_json);
    init_metrics();

    tracing::info!(
        "filewatcher v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let file = WatchesFile::load(&config.config_path).with_context(|| {
        format!(
            "failed to load watch file '{}'",
            config.config_path.display()
        )
    })?;

    let watches = start_all(file).await;
    if watches.is_empty() {
        anyhow::bail!("no watch root could be started");
    }
    tracing::info!(roots = watches.len(), "Watching");

    shutdown_signal().await;

    futures::future::join_all(watches.into_iter().map(Watch::shutdown)).await;

    tracing::debug!("Final metrics:\n{}", render_metrics());
    tracing::info!("filewatcher shut down gracefully");
    Ok(())
}

/// Start every declared root concurrently. Roots that fail are logged and skipped.
async fn start_all(file: WatchesFile) -> Vec<Watch> {
    let runtime = tokio::runtime::Handle::current();

    let starts = file.watch.into_iter().map(|config| {
        let runtime = runtime.clone();
        tokio::task::spawn_blocking(move || {
            let result = Watch::start(&config, runtime);
            (config.path, result)
        })
    });

    let mut watches = Vec::new();
    for joined in futures::future::join_all(starts).await {
        match joined {
            Ok((_, Ok(watch))) => watches.push(watch),
            Ok((path, Err(e))) => {
                tracing::error!(root = %path.display(), "Failed to start watch: {e}");
            }
            Err(e) => tracing::error!("Watch start task failed: {e}"),
        }
    }
    watches
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
