use super::Network;
use crate::config::NetworkConfig;
use crate::error::{NetrunnerError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
enum HealthBehavior {
    Healthy(Duration),
    Unhealthy(Duration, String),
    Never,
}

/// Call counters captured from a [`MockNetwork`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockNetworkStats {
    pub start_calls: usize,
    pub stop_calls: usize,
    /// Stops that took a running network down
    pub real_stops: usize,
    /// Stops that found nothing running
    pub noop_stops: usize,
    pub health_checks: usize,
    /// Whether the token handed to the last health check was cancelled
    pub health_cancelled: bool,
}

/// In-memory network for exercising the lifecycle without node processes
pub struct MockNetwork {
    start_failure: Option<String>,
    stop_failure: Option<String>,
    stop_delay: Duration,
    health: HealthBehavior,

    running: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    real_stops: AtomicUsize,
    noop_stops: AtomicUsize,
    health_checks: AtomicUsize,
    last_health_token: Mutex<Option<CancellationToken>>,
}

impl MockNetwork {
    /// Create a mock that starts cleanly and reports healthy right away
    pub fn new() -> Self {
        Self {
            start_failure: None,
            stop_failure: None,
            stop_delay: Duration::ZERO,
            health: HealthBehavior::Healthy(Duration::ZERO),
            running: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            real_stops: AtomicUsize::new(0),
            noop_stops: AtomicUsize::new(0),
            health_checks: AtomicUsize::new(0),
            last_health_token: Mutex::new(None),
        }
    }

    pub fn with_start_failure<S: Into<String>>(mut self, message: S) -> Self {
        self.start_failure = Some(message.into());
        self
    }

    pub fn with_stop_failure<S: Into<String>>(mut self, message: S) -> Self {
        self.stop_failure = Some(message.into());
        self
    }

    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn healthy_after(mut self, delay: Duration) -> Self {
        self.health = HealthBehavior::Healthy(delay);
        self
    }

    pub fn unhealthy_after<S: Into<String>>(mut self, delay: Duration, message: S) -> Self {
        self.health = HealthBehavior::Unhealthy(delay, message.into());
        self
    }

    pub fn never_healthy(mut self) -> Self {
        self.health = HealthBehavior::Never;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MockNetworkStats {
        MockNetworkStats {
            start_calls: self.start_calls.load(Ordering::SeqCst),
            stop_calls: self.stop_calls.load(Ordering::SeqCst),
            real_stops: self.real_stops.load(Ordering::SeqCst),
            noop_stops: self.noop_stops.load(Ordering::SeqCst),
            health_checks: self.health_checks.load(Ordering::SeqCst),
            health_cancelled: self
                .last_health_token
                .lock()
                .as_ref()
                .is_some_and(|token| token.is_cancelled()),
        }
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Network for MockNetwork {
    async fn start(&self, config: &NetworkConfig) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.start_failure {
            return Err(NetrunnerError::start(message.clone()));
        }

        self.running.store(true, Ordering::SeqCst);
        debug!("Mock network started with {} nodes", config.node_count);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        if !self.running.swap(false, Ordering::SeqCst) {
            self.noop_stops.fetch_add(1, Ordering::SeqCst);
            debug!("Mock network already stopped");
            return Ok(());
        }

        self.real_stops.fetch_add(1, Ordering::SeqCst);
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }

        match &self.stop_failure {
            Some(message) => Err(NetrunnerError::stop(message.clone())),
            None => {
                debug!("Mock network stopped");
                Ok(())
            }
        }
    }

    fn healthy(&self, cancel: CancellationToken) -> oneshot::Receiver<Result<()>> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        *self.last_health_token.lock() = Some(cancel.clone());

        let (tx, rx) = oneshot::channel();
        let behavior = self.health.clone();

        tokio::spawn(async move {
            let (delay, outcome) = match behavior {
                HealthBehavior::Healthy(delay) => (delay, Ok(())),
                HealthBehavior::Unhealthy(delay, message) => {
                    (delay, Err(NetrunnerError::health(message)))
                }
                HealthBehavior::Never => {
                    cancel.cancelled().await;
                    return;
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(outcome);
                }
            }
        });

        rx
    }
}
