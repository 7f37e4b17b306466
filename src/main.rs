use std::path::PathBuf;

use clap::Parser;
use kvhttpd::config::Config;
use kvhttpd::server;
use tracing::Level;

/// In-memory key-value store served over HTTP.
///
/// Routes: `GET|POST|DELETE /api/{key}`, `GET /` (redirect to /web/),
/// `GET /web/*`, `GET /health`, `GET /test_connection`.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (overrides the configured listen address port)
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Enable verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();
    kvhttpd::verbose::set_verbose(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(),
    };
    if let Some(port) = cli.port {
        cfg.server.set_port(port)?;
    }

    let mut event_loop = server::bind(&cfg)?;
    let stop = event_loop.stop_handle();
    let mut task = tokio::task::spawn_blocking(move || event_loop.run());

    let signalled = tokio::select! {
        res = &mut task => {
            res??;
            false
        }

        _ = shutdown_signal() => true,
    };

    if signalled {
        tracing::info!("Shutdown signal received");
        stop.stop();
        task.await??;
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
