use super::shutdown::stop_network;
use crate::network::Network;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

/// Keeps a started network from outliving the scope that started it.
///
/// [`StopGuard::release`] stops the network on ordinary exits. If the guard is
/// dropped without being released (a panic unwinding the driver, or the
/// driver future being dropped), the stop is spawned onto the current runtime.
pub struct StopGuard {
    network: Option<Arc<dyn Network>>,
    stop_timeout: Option<Duration>,
}

impl StopGuard {
    pub fn new(network: Arc<dyn Network>, stop_timeout: Option<Duration>) -> Self {
        Self {
            network: Some(network),
            stop_timeout,
        }
    }

    /// Stop the network and disarm the guard
    pub async fn release(mut self) {
        if let Some(network) = self.network.take() {
            stop_network(network.as_ref(), self.stop_timeout, "cleanup").await;
        }
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        let Some(network) = self.network.take() else {
            return;
        };

        let stop_timeout = self.stop_timeout;
        match Handle::try_current() {
            Ok(handle) => {
                warn!("Network guard dropped without release, stopping network in background");
                handle.spawn(async move {
                    stop_network(network.as_ref(), stop_timeout, "guard drop").await;
                });
            }
            Err(_) => {
                warn!("Network guard dropped outside a runtime, network may still be running");
            }
        }
    }
}
