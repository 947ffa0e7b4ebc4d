use super::signals::TerminationSource;
use super::state::RunStateHandle;
use super::{RunState, ShutdownReason};
use crate::network::Network;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Stop the network, logging rather than returning any failure
pub(super) async fn stop_network(network: &dyn Network, limit: Option<Duration>, origin: &str) {
    let result = match limit {
        Some(limit) => match timeout(limit, network.stop()).await {
            Ok(result) => result,
            Err(_) => {
                debug!("{}: network stop timed out after {:?}", origin, limit);
                return;
            }
        },
        None => network.stop().await,
    };

    match result {
        Ok(()) => debug!("{}: network stop returned", origin),
        Err(e) => debug!("{}: error while stopping network: {}", origin, e),
    }
}

/// Turns the first termination request into one network stop
pub struct ShutdownCoordinator {
    network: Arc<dyn Network>,
    stop_timeout: Option<Duration>,
    state: RunStateHandle,
}

impl ShutdownCoordinator {
    pub fn new(
        network: Arc<dyn Network>,
        stop_timeout: Option<Duration>,
        state: RunStateHandle,
    ) -> Self {
        Self {
            network,
            stop_timeout,
            state,
        }
    }

    /// Run the coordinator in the background.
    ///
    /// `complete` is fulfilled once the network has been told to stop. If the
    /// source closes without a request, or the coordinator is cancelled
    /// before one arrives, nothing is stopped and `complete` is dropped.
    pub fn spawn(
        self,
        source: TerminationSource,
        complete: oneshot::Sender<ShutdownReason>,
    ) -> CoordinatorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(source, complete, cancel.clone()));
        CoordinatorHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run(
        self,
        mut source: TerminationSource,
        complete: oneshot::Sender<ShutdownReason>,
        cancel: CancellationToken,
    ) {
        let reason = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Shutdown coordinator cancelled before any termination request");
                return;
            }
            reason = source.recv() => match reason {
                Some(reason) => reason,
                None => {
                    debug!("Termination source closed without a request");
                    return;
                }
            },
        };

        info!("Got {}, stopping network", reason);
        self.state.set(RunState::Stopping);
        stop_network(self.network.as_ref(), self.stop_timeout, "shutdown coordinator").await;

        source.deregister();
        if complete.send(reason).is_err() {
            debug!("Nobody waiting for shutdown completion");
        }
    }
}

/// Owner of a spawned coordinator task; aborts it when dropped unfinished
pub struct CoordinatorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Stop waiting for requests and let an in-flight stop run to completion
    pub async fn finish(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("Shutdown coordinator panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
