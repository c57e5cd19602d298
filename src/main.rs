#![deny(warnings)]

// Binary crate for univer-fileserver - uses library crate

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use univer_fileserver::config::{
    ServerConfig, DEFAULT_DATA_DIR, DEFAULT_HOST, DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT,
};
use univer_fileserver::server::FileServer;

#[derive(Parser, Debug)]
#[command(name = "univer-fileserver")]
#[command(about = "Static file server with a writable data directory")]
#[command(
    long_about = "univer-fileserver serves the project directory read-only and accepts PUT/POST/DELETE inside its data directory.\n\nUsage:\n  univer-fileserver\n  univer-fileserver --port 8080\n  univer-fileserver --port 8080 --host 0.0.0.0"
)]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Project root served for GET requests
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Writable directory, relative to the project root
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "univer_fileserver=debug,tower_http=debug"
    } else {
        "univer_fileserver=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let project_root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Project root is not accessible: {}", cli.root.display()))?;
    if !project_root.is_dir() {
        anyhow::bail!("Project root is not a directory: {}", project_root.display());
    }

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        project_root,
        data_dir: cli.data_dir,
        max_body_bytes: cli.max_body_bytes,
    };
    let server = FileServer::new(config);
    let data_path = server.prepare()?;

    let addr = server.config().bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Univer file server listening on http://{}", addr);
    info!("Project root: {}", server.config().project_root.display());
    info!("Data directory: {}", data_path.display());
    info!("Press Ctrl+C to stop");

    server.serve(listener, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, shutting down");
}
