use super::{NetworkController, RunState};
use crate::error::Result;
use tracing::{error, info};

impl NetworkController {
    /// Start the network; a failure here is terminal for the run
    pub(super) async fn start_network(&self) -> Result<()> {
        let network_config = &self.config.network;
        info!(
            "Starting network of {} nodes from {}",
            network_config.node_count,
            network_config.binary_path.display()
        );
        self.state.set(RunState::Starting);

        self.network.start(network_config).await.map_err(|e| {
            error!("Failed to start network: {}", e);
            self.state.set(RunState::Failed);
            e
        })?;

        info!("Network started");
        Ok(())
    }
}
