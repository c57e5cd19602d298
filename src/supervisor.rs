#![deny(warnings)]

// Launcher side of the health contract: start, probe and stop the server process

use crate::error::SupervisorError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Environment variable the launcher reads its target port from
pub const PORT_ENV: &str = "UNIVER_SERVER_PORT";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// How long a stopping server gets between SIGTERM and a hard kill
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Base URL of a server listening on loopback `port`
pub fn server_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Lifecycle of the supervised server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    /// Child spawned, health endpoint not answering yet
    Starting,
    /// Health endpoint answering. `pid` is `None` for a server we did not spawn.
    Running { pid: Option<u32> },
    Stopped,
}

impl ServerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ServerState::Running { .. })
    }
}

/// Body of a healthy `/health` response
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub ok: bool,
    pub message: String,
    #[serde(rename = "dataDir")]
    pub data_dir: String,
}

/// Polls `/health` with a per-request timeout
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HealthProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SupervisorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/health", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One probe. Anything but a 200 carrying `ok: true` is an error.
    pub async fn check(&self) -> Result<HealthStatus, SupervisorError> {
        let response = self.client.get(&self.url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(SupervisorError::Unhealthy(response.status().as_u16()));
        }
        let status: HealthStatus = response.json().await?;
        if !status.ok {
            return Err(SupervisorError::NotOk);
        }
        Ok(status)
    }

    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_ok()
    }
}

/// Exponential backoff between health probes while a server starts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            max_attempts: 20,
        }
    }
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt`, doubling up to `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// How to launch the server binary
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub port: u16,
    /// Extra flags appended after `--port`
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            program: program.into(),
            port,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        Command::new(&self.program)
            .arg("--port")
            .arg(self.port.to_string())
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.program.display().to_string(),
                source,
            })
    }
}

/// Starts, watches and stops one server child process.
///
/// All lifecycle state lives in this struct; callers drive it from their own
/// control loop through [`Supervisor::start`], [`Supervisor::refresh`] and
/// [`Supervisor::stop`].
pub struct Supervisor {
    command: ServerCommand,
    probe: HealthProbe,
    retry: RetryPolicy,
    stop_grace: Duration,
    state: ServerState,
    child: Option<Child>,
}

impl Supervisor {
    pub fn new(command: ServerCommand, probe: HealthProbe) -> Self {
        Self {
            command,
            probe,
            retry: RetryPolicy::default(),
            stop_grace: DEFAULT_STOP_GRACE,
            state: ServerState::NotStarted,
            child: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn probe(&self) -> &HealthProbe {
        &self.probe
    }

    /// Start the server unless one already answers on the probe URL.
    ///
    /// Waits until the health endpoint reports ok, retrying with backoff. If
    /// the child exits or never becomes healthy it is stopped and the error
    /// returned.
    pub async fn start(&mut self) -> Result<ServerState, SupervisorError> {
        if self.state.is_running() {
            return Ok(self.state);
        }

        if self.probe.is_healthy().await {
            info!("Server already running at {}", self.probe.url());
            self.state = ServerState::Running { pid: None };
            return Ok(self.state);
        }

        let child = self.command.spawn()?;
        let pid = child.id();
        info!(pid = ?pid, program = %self.command.program.display(), "Spawned server process");
        self.child = Some(child);
        self.state = ServerState::Starting;

        match self.wait_until_healthy().await {
            Ok(()) => {
                self.state = ServerState::Running { pid };
                Ok(self.state)
            }
            Err(e) => {
                if let Err(stop_err) = self.stop().await {
                    warn!("Failed to stop unhealthy server: {}", stop_err);
                }
                self.state = ServerState::Stopped;
                Err(e)
            }
        }
    }

    async fn wait_until_healthy(&mut self) -> Result<(), SupervisorError> {
        for attempt in 0..self.retry.max_attempts {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(SupervisorError::Exited(status));
                }
            }

            match self.probe.check().await {
                Ok(_) => return Ok(()),
                Err(e) => debug!(attempt, "Server not ready yet: {}", e),
            }
            tokio::time::sleep(self.retry.delay_for(attempt)).await;
        }
        Err(SupervisorError::Timeout(self.retry.max_attempts))
    }

    /// Re-check liveness and update the state.
    ///
    /// An owned child that has exited moves the state to `Stopped`; a failed
    /// probe on a server we did not spawn does the same.
    pub async fn refresh(&mut self) -> Result<ServerState, SupervisorError> {
        if let Some(child) = self.child.as_mut() {
            if let Some(status) = child.try_wait()? {
                warn!("Server process exited: {}", status);
                self.child = None;
                self.state = ServerState::Stopped;
                return Ok(self.state);
            }
        }

        if self.state.is_running() && !self.probe.is_healthy().await {
            warn!("Health check failed at {}", self.probe.url());
            if self.child.is_none() {
                self.state = ServerState::Stopped;
            }
        }
        Ok(self.state)
    }

    /// Stop the child process we spawned: SIGTERM, then kill after the grace period.
    ///
    /// A server we did not spawn is left alone.
    pub async fn stop(&mut self) -> Result<ServerState, SupervisorError> {
        let Some(mut child) = self.child.take() else {
            if self.state.is_running() {
                info!(
                    "Server at {} was not started by this launcher; leaving it running",
                    self.probe.url()
                );
            }
            return Ok(self.state);
        };

        request_termination(&mut child)?;
        match tokio::time::timeout(self.stop_grace, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("Server process stopped ({})", status);
            }
            Err(_) => {
                warn!("Server did not exit within {:?}; killing it", self.stop_grace);
                child.kill().await?;
            }
        }

        self.state = ServerState::Stopped;
        Ok(self.state)
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) -> Result<(), SupervisorError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // No pid means the child has already been reaped
    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| SupervisorError::Signal(e.to_string())),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> Result<(), SupervisorError> {
    child.start_kill().map_err(SupervisorError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_doubles_and_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(0), Duration::from_millis(200));
        assert_eq!(retry.delay_for(1), Duration::from_millis(400));
        assert_eq!(retry.delay_for(2), Duration::from_millis(800));
        assert_eq!(retry.delay_for(3), Duration::from_millis(1600));
        assert_eq!(retry.delay_for(4), Duration::from_secs(2));
        assert_eq!(retry.delay_for(40), Duration::from_secs(2));
    }

    #[test]
    fn test_server_url_and_probe_url() {
        assert_eq!(server_url(8080), "http://127.0.0.1:8080");
        let probe = HealthProbe::new("http://127.0.0.1:8080/", DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(probe.url(), "http://127.0.0.1:8080/health");
    }

    #[test]
    fn test_server_state_is_running() {
        assert!(!ServerState::NotStarted.is_running());
        assert!(!ServerState::Starting.is_running());
        assert!(ServerState::Running { pid: Some(42) }.is_running());
        assert!(ServerState::Running { pid: None }.is_running());
        assert!(!ServerState::Stopped.is_running());
    }

    #[test]
    fn test_health_status_parses_server_body() {
        let status: HealthStatus = serde_json::from_str(
            r#"{"ok":true,"message":"Server is running","dataDir":"data"}"#,
        )
        .unwrap();
        assert!(status.ok);
        assert_eq!(status.data_dir, "data");
    }

    #[tokio::test]
    async fn test_probe_fails_when_nothing_listens() {
        // Bind then drop to get a port nobody is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HealthProbe::new(&server_url(port), Duration::from_millis(500)).unwrap();
        assert!(!probe.is_healthy().await);
    }

    #[tokio::test]
    async fn test_stop_without_child_is_noop() {
        let probe = HealthProbe::new(&server_url(9), DEFAULT_PROBE_TIMEOUT).unwrap();
        let mut supervisor = Supervisor::new(ServerCommand::new("/nonexistent", 9), probe);
        assert_eq!(supervisor.stop().await.unwrap(), ServerState::NotStarted);
    }
}
