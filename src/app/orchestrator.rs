use super::state::RunStateHandle;
use super::ShutdownReason;
use crate::config::NetrunnerConfig;
use crate::network::Network;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Main lifecycle driver for one managed network
pub struct NetworkController {
    pub(super) config: NetrunnerConfig,
    pub(super) network: Arc<dyn Network>,

    // Lifecycle management
    pub(super) state: RunStateHandle,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
}

impl NetworkController {
    /// Create a controller that will own `network` for its whole run
    pub fn new(config: NetrunnerConfig, network: Arc<dyn Network>) -> Self {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Self {
            config,
            network,
            state: RunStateHandle::new(),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
        }
    }
}
