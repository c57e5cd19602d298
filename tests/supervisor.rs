#![deny(warnings)]

use std::time::Duration;
use tempfile::TempDir;
use univer_fileserver::error::SupervisorError;
use univer_fileserver::supervisor::{
    server_url, HealthProbe, RetryPolicy, ServerCommand, ServerState, Supervisor,
};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

fn supervisor_for(port: u16, root: &TempDir) -> Supervisor {
    let command = ServerCommand::new(env!("CARGO_BIN_EXE_univer-fileserver"), port)
        .arg("--root")
        .arg(root.path().to_string_lossy().into_owned());
    let probe = HealthProbe::new(&server_url(port), Duration::from_millis(500)).unwrap();
    Supervisor::new(command, probe).with_retry(RetryPolicy {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(500),
        max_attempts: 60,
    })
}

#[tokio::test]
async fn test_start_probe_and_stop_server_process() {
    let root = TempDir::new().unwrap();
    let port = free_port();
    let mut supervisor = supervisor_for(port, &root);
    assert_eq!(supervisor.state(), ServerState::NotStarted);

    let state = supervisor.start().await.unwrap();
    match state {
        ServerState::Running { pid } => assert!(pid.is_some()),
        other => panic!("unexpected state: {other:?}"),
    }
    assert!(root.path().join("data/templates_store").is_dir());

    let health = supervisor.probe().check().await.unwrap();
    assert!(health.ok);
    assert_eq!(health.data_dir, "data");

    assert!(supervisor.refresh().await.unwrap().is_running());

    assert_eq!(supervisor.stop().await.unwrap(), ServerState::Stopped);
    assert!(!supervisor.probe().is_healthy().await);
}

#[tokio::test]
async fn test_second_launcher_reuses_running_server() {
    let root = TempDir::new().unwrap();
    let port = free_port();
    let mut owner = supervisor_for(port, &root);
    owner.start().await.unwrap();

    let mut other = supervisor_for(port, &root);
    assert_eq!(
        other.start().await.unwrap(),
        ServerState::Running { pid: None }
    );

    // Stopping a server we did not spawn leaves it up
    other.stop().await.unwrap();
    assert!(owner.probe().is_healthy().await);

    owner.stop().await.unwrap();
}

#[tokio::test]
async fn test_child_that_exits_early_is_reported() {
    let root = TempDir::new().unwrap();
    let port = free_port();
    let command = ServerCommand::new(env!("CARGO_BIN_EXE_univer-fileserver"), port)
        .arg("--root")
        .arg(root.path().join("does-not-exist").to_string_lossy().into_owned());
    let probe = HealthProbe::new(&server_url(port), Duration::from_millis(200)).unwrap();
    let mut supervisor = Supervisor::new(command, probe).with_retry(RetryPolicy {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        max_attempts: 100,
    });

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Exited(_)), "{err}");
    assert_eq!(supervisor.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_missing_binary_fails_to_spawn() {
    let port = free_port();
    let probe = HealthProbe::new(&server_url(port), Duration::from_millis(200)).unwrap();
    let mut supervisor = Supervisor::new(
        ServerCommand::new("/nonexistent/univer-fileserver", port),
        probe,
    );

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn { .. }), "{err}");
    assert_eq!(supervisor.state(), ServerState::NotStarted);
}
