#![deny(warnings)]

// Launcher: starts the file server as a child process and watches its health endpoint

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use univer_fileserver::config::DEFAULT_PORT;
use univer_fileserver::supervisor::{server_url, HealthProbe, ServerCommand, Supervisor};

#[derive(Parser)]
#[command(name = "univer-launcher")]
#[command(about = "Start, watch and stop the Univer file server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the server if it is not running and supervise it until Ctrl+C
    Run {
        /// Port the server listens on
        #[arg(long, env = "UNIVER_SERVER_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Server binary (defaults to univer-fileserver next to this executable)
        #[arg(long)]
        server: Option<PathBuf>,
        /// Project root handed to the server
        #[arg(long)]
        root: Option<PathBuf>,
        /// Timeout for each health probe, in milliseconds
        #[arg(long, default_value_t = 2000)]
        probe_timeout_ms: u64,
        /// Seconds between health checks once the server is up
        #[arg(long, default_value_t = 5)]
        check_interval_secs: u64,
        /// Open the server's start page in the default browser once it is healthy
        #[arg(long)]
        open: bool,
    },
    /// Probe the health endpoint once
    Status {
        /// Port the server listens on
        #[arg(long, env = "UNIVER_SERVER_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Timeout for the health probe, in milliseconds
        #[arg(long, default_value_t = 2000)]
        probe_timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "univer_fileserver=info,univer_launcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            port,
            server,
            root,
            probe_timeout_ms,
            check_interval_secs,
            open,
        } => {
            let program = match server {
                Some(path) => path,
                None => default_server_binary()?,
            };
            let mut command = ServerCommand::new(program, port);
            if let Some(root) = root {
                command = command
                    .arg("--root")
                    .arg(root.to_string_lossy().into_owned());
            }
            let probe = HealthProbe::new(
                &server_url(port),
                Duration::from_millis(probe_timeout_ms),
            )?;
            run(
                Supervisor::new(command, probe),
                Duration::from_secs(check_interval_secs),
                open,
            )
            .await?
        }
        Commands::Status {
            port,
            probe_timeout_ms,
        } => {
            let probe = HealthProbe::new(
                &server_url(port),
                Duration::from_millis(probe_timeout_ms),
            )?;
            let status = probe
                .check()
                .await
                .with_context(|| format!("Server not running at {}", server_url(port)))?;
            println!(
                "{} at {} (data dir: {})",
                status.message,
                server_url(port),
                status.data_dir
            );
        }
    }

    Ok(())
}

async fn run(
    mut supervisor: Supervisor,
    check_interval: Duration,
    open: bool,
) -> anyhow::Result<()> {
    supervisor.start().await?;
    let page = format!("{}/", supervisor.probe().url().trim_end_matches("/health"));
    if open {
        if let Err(e) = open_in_browser(&page).await {
            warn!("Could not open a browser ({}); open {} manually", e, page);
        }
    } else {
        info!("Open {} in a browser", page);
    }

    let mut ticker = tokio::time::interval(check_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            _ = ticker.tick() => {
                let state = supervisor.refresh().await?;
                if !state.is_running() {
                    warn!("Server is no longer running ({:?})", state);
                    anyhow::bail!("server stopped unexpectedly");
                }
            }
        }
    }

    let state = supervisor.stop().await?;
    info!("Launcher exiting ({:?})", state);
    Ok(())
}

/// Platform command that hands `url` to the desktop's default browser
fn browser_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open", vec![url.to_string()])
    } else if cfg!(windows) {
        (
            "cmd",
            vec!["/C".into(), "start".into(), String::new(), url.to_string()],
        )
    } else {
        ("xdg-open", vec![url.to_string()])
    }
}

async fn open_in_browser(url: &str) -> anyhow::Result<()> {
    let (program, args) = browser_command(url);
    let status = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .with_context(|| format!("Failed to run {}", program))?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", program, status);
    }
    info!("Opened {} in the default browser", url);
    Ok(())
}

fn default_server_binary() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot locate launcher executable")?;
    let dir = exe
        .parent()
        .context("Launcher executable has no parent directory")?;
    Ok(dir.join(format!(
        "univer-fileserver{}",
        std::env::consts::EXE_SUFFIX
    )))
}
