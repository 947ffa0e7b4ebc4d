//! The managed network handle and its implementations.
//!
//! The lifecycle controller only talks to [`Network`]. What "healthy" means and
//! how nodes are started or stopped is up to the implementation.

mod local;
mod mock;
mod nodes;


pub use local::LocalNetwork;
pub use mock::{MockNetwork, MockNetworkStats};
pub use nodes::NodeInfo;

use crate::config::NetworkConfig;
use crate::error::Result;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Handle to a long-running multi-node network
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Start every node in the network
    async fn start(&self, config: &NetworkConfig) -> Result<()>;

    /// Stop the network.
    ///
    /// Must be idempotent: only the first call does real work, later calls
    /// return `Ok(())` without side effects. May be called concurrently.
    async fn stop(&self) -> Result<()>;

    /// Begin a health determination.
    ///
    /// The returned receiver yields exactly one result. Work behind it must
    /// end once `cancel` fires; the receiver is then allowed to close empty.
    fn healthy(&self, cancel: CancellationToken) -> oneshot::Receiver<Result<()>>;
}
