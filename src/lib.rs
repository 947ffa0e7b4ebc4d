pub mod app;
pub mod config;
pub mod error;
pub mod network;

pub use app::{
    NetworkController, ReadinessOutcome, RunState, ShutdownReason, TerminationSender,
    TerminationSource,
};
pub use config::{LifecycleConfig, NetrunnerConfig, NetworkConfig};
pub use error::{NetrunnerError, Result};
pub use network::{LocalNetwork, MockNetwork, MockNetworkStats, Network, NodeInfo};
