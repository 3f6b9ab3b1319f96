//! Integration tests for `ProcessSupervisor`
//!
//! Runs real child processes through the restart, health and shutdown paths

#![cfg(unix)]

use std::time::{Duration, Instant};

use kodegen_agent_fleet::error::FleetError;
use kodegen_agent_fleet::supervisor::OutputSignal;
use kodegen_agent_fleet::{
    EventSubscription, ProcessSupervisor, SupervisorConfig, SupervisorEvent, SupervisorPhase,
};

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn shell(script: &str) -> SupervisorConfig {
    SupervisorConfig {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        health_port: unused_port(),
        max_restarts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
        min_runtime_ms: 15_000,
        health_check_interval_ms: 3_600_000,
        memory_sample_interval_ms: 3_600_000,
        shutdown_timeout_ms: 500,
        ..SupervisorConfig::default()
    }
}

/// Collect events until `stop` matches or `limit` elapses
async fn collect_until(
    events: &mut EventSubscription<SupervisorEvent>,
    limit: Duration,
    stop: impl Fn(&SupervisorEvent) -> bool,
) -> Vec<SupervisorEvent> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(limit, async {
        while let Some(event) = events.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}

fn count_started(events: &[SupervisorEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, SupervisorEvent::Started { .. }))
        .count()
}

#[tokio::test]
async fn test_crash_loop_stops_at_restart_limit() {
    let _ = env_logger::builder().is_test(true).try_init();
    let supervisor = ProcessSupervisor::new(shell("exit 1")).unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    let seen = collect_until(&mut events, Duration::from_secs(20), |event| {
        matches!(event, SupervisorEvent::RestartLimitExceeded { .. })
    })
    .await;

    assert!(matches!(
        seen.last(),
        Some(SupervisorEvent::RestartLimitExceeded { restart_count: 3 })
    ));
    assert_eq!(count_started(&seen), 4);
    assert!(seen.iter().any(|event| matches!(
        event,
        SupervisorEvent::RestartScheduled { crash_loop: true, .. }
    )));

    let later = collect_until(&mut events, Duration::from_millis(300), |_| false).await;
    assert_eq!(count_started(&later), 0);
    assert_eq!(supervisor.status().phase, SupervisorPhase::Terminated);
    assert!(supervisor.status().pid.is_none());
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let supervisor = ProcessSupervisor::new(shell("while true; do sleep 0.1; done")).unwrap();
    let mut events = supervisor.subscribe();

    let pid = supervisor.start().unwrap();
    assert_eq!(supervisor.start().unwrap(), pid);
    assert_eq!(supervisor.status().phase, SupervisorPhase::Running);

    let outcome = supervisor.shutdown().await;
    assert!(!outcome.forced);
    assert!(supervisor.is_shutting_down());
    assert_eq!(supervisor.status().phase, SupervisorPhase::Stopped);

    let seen = collect_until(&mut events, Duration::from_millis(300), |_| false).await;
    assert!(seen.contains(&SupervisorEvent::ShutdownComplete { forced: false }));
    assert!(!seen.iter().any(|event| matches!(
        event,
        SupervisorEvent::RestartScheduled { .. }
    )));
    assert!(supervisor.start().is_err());
}

#[tokio::test]
async fn test_shutdown_escalates_to_kill() {
    let supervisor =
        ProcessSupervisor::new(shell("trap '' TERM; echo server started; while true; do sleep 0.1; done"))
            .unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    // Wait for the trap to be installed before signalling.
    let _ = collect_until(&mut events, Duration::from_secs(5), |event| {
        matches!(event, SupervisorEvent::Signal { .. })
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let outcome = supervisor.shutdown().await;
    assert!(outcome.forced);
    assert!(started.elapsed() < Duration::from_millis(500 + 2000 + 500));
    assert!(supervisor.status().pid.is_none());
}

#[tokio::test]
async fn test_output_signals_and_child_environment() {
    let supervisor = ProcessSupervisor::new(shell(
        "echo \"listening on $PORT supervised=$FLEET_SUPERVISED\"; sleep 5",
    ))
    .unwrap();
    let port = supervisor.config().health_port;
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    let seen = collect_until(&mut events, Duration::from_secs(5), |event| {
        matches!(event, SupervisorEvent::Signal { .. })
    })
    .await;

    match seen.last() {
        Some(SupervisorEvent::Signal { signal, line }) => {
            assert_eq!(*signal, OutputSignal::ServerStarted);
            assert_eq!(line, &format!("listening on {port} supervised=1"));
        }
        other => panic!("expected signal, got {other:?}"),
    }

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_sustained_unhealthiness_forces_restart() {
    let config = SupervisorConfig {
        command: "sleep".to_string(),
        args: vec!["30".to_string()],
        health_check_interval_ms: 100,
        health_request_timeout_ms: 200,
        unhealthy_restart_threshold_ms: 300,
        ..shell("")
    };
    let supervisor = ProcessSupervisor::new(config).unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    let seen = collect_until(&mut events, Duration::from_secs(10), |event| {
        matches!(event, SupervisorEvent::RestartScheduled { .. })
    })
    .await;

    assert!(seen.iter().any(|event| matches!(event, SupervisorEvent::Unhealthy { .. })));
    assert!(seen.iter().any(|event| matches!(event, SupervisorEvent::ForcedRestart { .. })));
    assert!(matches!(
        seen.last(),
        Some(SupervisorEvent::RestartScheduled { .. })
    ));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let config = SupervisorConfig {
        command: "/nonexistent/fleet-server".to_string(),
        args: Vec::new(),
        ..shell("")
    };
    let supervisor = ProcessSupervisor::new(config).unwrap();

    assert!(matches!(
        supervisor.start(),
        Err(FleetError::SpawnFailure(_))
    ));
    assert_eq!(supervisor.status().phase, SupervisorPhase::Stopped);
}

#[tokio::test]
async fn test_manual_restart_requires_child() {
    let supervisor = ProcessSupervisor::new(shell("sleep 5")).unwrap();
    assert!(supervisor.restart_child().is_err());
}

#[tokio::test]
async fn test_start_during_backoff_keeps_single_child() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran-once");
    let script = format!(
        "if [ -f '{0}' ]; then while true; do sleep 0.1; done; else touch '{0}'; exit 1; fi",
        marker.display()
    );
    let config = SupervisorConfig {
        base_delay_ms: 500,
        max_delay_ms: 1000,
        ..shell(&script)
    };
    let supervisor = ProcessSupervisor::new(config).unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start().unwrap();
    let _ = collect_until(&mut events, Duration::from_secs(5), |event| {
        matches!(event, SupervisorEvent::RestartScheduled { .. })
    })
    .await;
    assert_eq!(supervisor.status().phase, SupervisorPhase::Restarting);
    assert!(matches!(
        supervisor.start(),
        Err(FleetError::SpawnFailure(_))
    ));

    let seen = collect_until(&mut events, Duration::from_millis(1500), |_| false).await;
    assert_eq!(count_started(&seen), 1);
    assert!(!seen.iter().any(|event| matches!(
        event,
        SupervisorEvent::RestartScheduled { .. }
    )));

    let status = supervisor.status();
    assert_eq!(status.phase, SupervisorPhase::Running);
    assert_eq!(status.restart_count, 1);
    let pid = status.pid.unwrap();
    assert_eq!(supervisor.start().unwrap(), pid);

    supervisor.shutdown().await;
    let raw = nix::unistd::Pid::from_raw(i32::try_from(pid).unwrap());
    assert!(nix::sys::signal::kill(raw, None).is_err());
}
