use super::*;
use crate::config::NetrunnerConfig;
use crate::error::NetrunnerError;
use crate::network::{MockNetwork, Network};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

fn create_test_config(healthy_timeout_seconds: u64) -> NetrunnerConfig {
    let mut config = NetrunnerConfig::default();
    config.network.node_count = 3;
    config.lifecycle.healthy_timeout_seconds = healthy_timeout_seconds;
    config
}

fn sigint() -> ShutdownReason {
    ShutdownReason::Signal("SIGINT".to_string())
}

async fn wait_for_running(states: &mut watch::Receiver<RunState>) {
    states
        .wait_for(|state| *state == RunState::Running)
        .await
        .expect("state channel closed");
}

#[tokio::test(start_paused = true)]
async fn test_healthy_network_runs_until_termination() {
    let network = Arc::new(MockNetwork::new().healthy_after(Duration::from_secs(3)));
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let mut states = controller.subscribe_state();
    let (source, sender) = TerminationSource::manual();

    let started = tokio::time::Instant::now();
    let trigger = async {
        wait_for_running(&mut states).await;
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(network.is_running());
        assert_eq!(network.stats().stop_calls, 0);
        assert!(sender.request(sigint()));
    };

    let (result, ()) = tokio::join!(controller.run_with_source(move || Ok(source)), trigger);

    assert_eq!(result.unwrap(), sigint());
    assert_eq!(controller.state(), RunState::Stopped);

    let stats = network.stats();
    assert_eq!(stats.start_calls, 1);
    assert_eq!(stats.health_checks, 1);
    assert_eq!(stats.real_stops, 1);
    // Coordinator stop plus the cleanup no-op
    assert_eq!(stats.stop_calls, 2);
    assert_eq!(stats.noop_stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_health_timeout_stops_network_through_cleanup() {
    let network = Arc::new(MockNetwork::new().never_healthy());
    let mut controller = NetworkController::new(create_test_config(1), network.clone());
    let (source, _sender) = TerminationSource::manual();

    let started = tokio::time::Instant::now();
    let err = controller
        .run_with_source(move || Ok(source))
        .await
        .unwrap_err();

    match err {
        NetrunnerError::HealthTimeout { timeout } => assert_eq!(timeout, Duration::from_secs(1)),
        other => panic!("Expected health timeout, got {}", other),
    }
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(controller.state(), RunState::Failed);

    let stats = network.stats();
    assert_eq!(stats.real_stops, 1);
    assert_eq!(stats.stop_calls, 1);
    assert!(stats.health_cancelled);
    assert!(!network.is_running());
}

#[tokio::test]
async fn test_start_failure_skips_coordinator_and_health() {
    let network = Arc::new(MockNetwork::new().with_start_failure("binary missing"));
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let registered = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&registered);
    let err = controller
        .run_with_source(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(TerminationSource::manual().0)
        })
        .await
        .unwrap_err();

    match err {
        NetrunnerError::Start { message } => assert_eq!(message, "binary missing"),
        other => panic!("Expected start failure, got {}", other),
    }
    assert!(!registered.load(Ordering::SeqCst));
    assert_eq!(controller.state(), RunState::Failed);

    let stats = network.stats();
    assert_eq!(stats.start_calls, 1);
    assert_eq!(stats.health_checks, 0);
    assert_eq!(stats.stop_calls, 0);
    assert_eq!(stats.real_stops, 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_requests_stop_once() {
    let network = Arc::new(MockNetwork::new());
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let mut states = controller.subscribe_state();
    let (source, sender) = TerminationSource::manual();

    let trigger = async {
        wait_for_running(&mut states).await;
        assert!(sender.request(sigint()));
        sender.request(ShutdownReason::Signal("SIGTERM".to_string()));
        for _ in 0..8 {
            sender.request(sigint());
        }
    };

    let (result, ()) = tokio::join!(controller.run_with_source(move || Ok(source)), trigger);
    assert_eq!(result.unwrap(), sigint());

    // Late requests find the source deregistered
    assert!(!sender.request(sigint()));

    let stats = network.stats();
    assert_eq!(stats.real_stops, 1);
    assert_eq!(stats.stop_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_request_sent_before_listening_is_kept() {
    let network = Arc::new(MockNetwork::new());
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let (source, sender) = TerminationSource::manual();

    assert!(sender.request(ShutdownReason::UserRequest("test".to_string())));

    let result = controller.run_with_source(move || Ok(source)).await;

    assert_eq!(
        result.unwrap(),
        ShutdownReason::UserRequest("test".to_string())
    );
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_during_health_wait_ends_run() {
    let network = Arc::new(MockNetwork::new().healthy_after(Duration::from_secs(10)));
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let mut states = controller.subscribe_state();
    let (source, sender) = TerminationSource::manual();

    let started = tokio::time::Instant::now();
    let trigger = async {
        states
            .wait_for(|state| *state == RunState::AwaitingHealth)
            .await
            .expect("state channel closed");
        assert!(sender.request(sigint()));
    };

    let (result, ()) = tokio::join!(controller.run_with_source(move || Ok(source)), trigger);

    assert_eq!(result.unwrap(), sigint());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(controller.state(), RunState::Stopped);

    let stats = network.stats();
    assert_eq!(stats.real_stops, 1);
    assert_eq!(stats.stop_calls, 2);
    assert!(stats.health_cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_request_during_health_wait_wins_over_timeout() {
    let network = Arc::new(MockNetwork::new().never_healthy());
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let mut states = controller.subscribe_state();
    let (source, sender) = TerminationSource::manual();

    let trigger = async {
        states
            .wait_for(|state| *state == RunState::AwaitingHealth)
            .await
            .expect("state channel closed");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(sender.request(ShutdownReason::Signal("SIGTERM".to_string())));
    };

    let (result, ()) = tokio::join!(controller.run_with_source(move || Ok(source)), trigger);

    assert_eq!(
        result.unwrap(),
        ShutdownReason::Signal("SIGTERM".to_string())
    );
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test]
async fn test_failed_listener_registration_aborts_earlier_listeners() {
    let (alive_tx, alive_rx) = oneshot::channel::<()>();
    let first = tokio::spawn(async move {
        let _alive = alive_tx;
        std::future::pending::<()>().await;
    });
    let (_sender, receiver) = mpsc::channel(1);
    let refused = std::io::Error::new(std::io::ErrorKind::Other, "signal registration refused");

    let result =
        TerminationSource::with_listeners(receiver, [Ok(first), Err(NetrunnerError::from(refused))]);

    assert!(matches!(result, Err(NetrunnerError::Io(_))));
    // The aborted listener drops its end of the channel
    assert!(alive_rx.await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_health_error_is_distinct_from_timeout() {
    let network = Arc::new(
        MockNetwork::new().unhealthy_after(Duration::from_secs(1), "node-2 exited"),
    );
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let (source, _sender) = TerminationSource::manual();

    let err = controller
        .run_with_source(move || Ok(source))
        .await
        .unwrap_err();

    match err {
        NetrunnerError::Health { message } => assert!(message.contains("node-2 exited")),
        other => panic!("Expected health error, got {}", other),
    }
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_failure_does_not_fail_run() {
    let network = Arc::new(MockNetwork::new().with_stop_failure("node refused to exit"));
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let mut states = controller.subscribe_state();
    let (source, sender) = TerminationSource::manual();

    let trigger = async {
        wait_for_running(&mut states).await;
        sender.request(sigint());
    };

    let (result, ()) = tokio::join!(controller.run_with_source(move || Ok(source)), trigger);

    assert_eq!(result.unwrap(), sigint());
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeout_bounds_coordinator() {
    let network = Arc::new(MockNetwork::new().with_stop_delay(Duration::from_secs(600)));
    let mut config = create_test_config(120);
    config.lifecycle.stop_timeout_seconds = Some(1);
    let mut controller = NetworkController::new(config, network.clone());
    let mut states = controller.subscribe_state();
    let (source, sender) = TerminationSource::manual();

    let started = tokio::time::Instant::now();
    let trigger = async {
        wait_for_running(&mut states).await;
        sender.request(sigint());
    };

    let (result, ()) = tokio::join!(controller.run_with_source(move || Ok(source)), trigger);

    assert!(result.is_ok());
    assert!(started.elapsed() < Duration::from_secs(600));
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_cannot_be_repeated() {
    let network = Arc::new(MockNetwork::new());
    let mut controller = NetworkController::new(create_test_config(120), network.clone());

    let (source, sender) = TerminationSource::manual();
    sender.request(sigint());
    controller.run_with_source(move || Ok(source)).await.unwrap();

    let (source, _sender) = TerminationSource::manual();
    let err = controller
        .run_with_source(move || Ok(source))
        .await
        .unwrap_err();

    assert!(matches!(err, NetrunnerError::System { .. }));
    assert_eq!(network.stats().start_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_run_stops_network() {
    let network = Arc::new(MockNetwork::new().never_healthy());
    let mut controller = NetworkController::new(create_test_config(120), network.clone());
    let (source, _sender) = TerminationSource::manual();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        controller.run_with_source(move || Ok(source)),
    )
    .await;
    assert!(outcome.is_err());

    // Let the guard's background stop run
    tokio::time::sleep(Duration::from_millis(10)).await;

    let stats = network.stats();
    assert_eq!(stats.real_stops, 1);
    assert!(!network.is_running());
}

#[tokio::test]
async fn test_coordinator_ignores_closed_source() {
    let network = Arc::new(MockNetwork::new());
    network.start(&NetrunnerConfig::default().network).await.unwrap();

    let (source, sender) = TerminationSource::manual();
    drop(sender);

    let (complete_tx, complete_rx) = oneshot::channel();
    let handle = ShutdownCoordinator::new(network.clone(), None, RunStateHandle::new())
        .spawn(source, complete_tx);

    assert!(complete_rx.await.is_err());
    handle.finish().await;

    assert_eq!(network.stats().stop_calls, 0);
    assert!(network.is_running());
}

#[tokio::test]
async fn test_coordinator_deregisters_after_first_request() {
    let network = Arc::new(MockNetwork::new());
    network.start(&NetrunnerConfig::default().network).await.unwrap();

    let state = RunStateHandle::new();
    let (source, sender) = TerminationSource::manual();
    let (complete_tx, complete_rx) = oneshot::channel();
    let handle =
        ShutdownCoordinator::new(network.clone(), None, state.clone()).spawn(source, complete_tx);

    assert!(sender.request(sigint()));
    assert_eq!(complete_rx.await.unwrap(), sigint());
    handle.finish().await;

    assert!(!sender.request(sigint()));
    assert_eq!(state.get(), RunState::Stopping);
    assert_eq!(network.stats().stop_calls, 1);
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test]
async fn test_cancelled_coordinator_does_not_stop() {
    let network = Arc::new(MockNetwork::new());
    network.start(&NetrunnerConfig::default().network).await.unwrap();

    let (source, sender) = TerminationSource::manual();
    let (complete_tx, complete_rx) = oneshot::channel();
    let handle = ShutdownCoordinator::new(network.clone(), None, RunStateHandle::new())
        .spawn(source, complete_tx);

    handle.finish().await;

    assert!(complete_rx.await.is_err());
    assert!(!sender.request(sigint()));
    assert_eq!(network.stats().stop_calls, 0);
}

#[tokio::test]
async fn test_stop_guard_release_stops_once() {
    let network = Arc::new(MockNetwork::new());
    network.start(&NetrunnerConfig::default().network).await.unwrap();

    StopGuard::new(network.clone(), None).release().await;

    assert_eq!(network.stats().stop_calls, 1);
    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test]
async fn test_stop_guard_drop_stops_in_background() {
    let network = Arc::new(MockNetwork::new());
    network.start(&NetrunnerConfig::default().network).await.unwrap();

    drop(StopGuard::new(network.clone(), None));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(network.stats().real_stops, 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_healthy_cancels_token() {
    let network = MockNetwork::new().healthy_after(Duration::from_millis(200));

    let outcome = wait_until_healthy(&network, Duration::from_secs(5)).await;

    assert!(outcome.is_healthy());
    assert!(network.stats().health_cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_healthy_times_out() {
    let network = MockNetwork::new().never_healthy();

    let outcome = wait_until_healthy(&network, Duration::from_secs(1)).await;

    assert_eq!(outcome, ReadinessOutcome::Timeout(Duration::from_secs(1)));
    assert!(network.stats().health_cancelled);
}

#[test]
fn test_readiness_outcome_into_result() {
    assert!(ReadinessOutcome::Healthy.into_result().is_ok());
    assert!(matches!(
        ReadinessOutcome::Error("bad".to_string()).into_result(),
        Err(NetrunnerError::Health { .. })
    ));
    assert!(matches!(
        ReadinessOutcome::Timeout(Duration::from_secs(2)).into_result(),
        Err(NetrunnerError::HealthTimeout { .. })
    ));
}

#[test]
fn test_shutdown_reason_display() {
    assert_eq!(sigint().to_string(), "signal SIGINT");
    assert_eq!(
        ShutdownReason::UserRequest("admin".to_string()).to_string(),
        "shutdown request from admin"
    );
}
