use super::ReadinessOutcome;
use crate::network::Network;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wait for `network` to report healthy, giving up after `deadline`.
///
/// The token handed to the health check is cancelled before this returns,
/// whatever the outcome.
pub async fn wait_until_healthy(network: &dyn Network, deadline: Duration) -> ReadinessOutcome {
    let token = CancellationToken::new();
    let _cancel_on_exit = token.clone().drop_guard();

    let receiver = network.healthy(token.child_token());

    match timeout(deadline, receiver).await {
        Ok(Ok(Ok(()))) => {
            debug!("Health check passed");
            ReadinessOutcome::Healthy
        }
        Ok(Ok(Err(e))) => {
            warn!("Health check failed: {}", e);
            ReadinessOutcome::Error(e.to_string())
        }
        Ok(Err(_)) => {
            warn!("Health check ended without a result");
            ReadinessOutcome::Error("health check ended without a result".to_string())
        }
        Err(_) => {
            warn!("Health check timed out after {:?}", deadline);
            ReadinessOutcome::Timeout(deadline)
        }
    }
}
