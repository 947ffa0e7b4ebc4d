use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct NetrunnerConfig {
    pub network: NetworkConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NetworkConfig {
    /// Node binary launched once per node
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Root directory; each run gets its own subdirectory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of nodes in the network
    #[serde(default = "default_node_count")]
    pub node_count: usize,

    /// HTTP port of the first node; node i listens on base + 2*i
    #[serde(default = "default_base_http_port")]
    pub base_http_port: u16,

    /// Staking port of the first node; node i listens on base + 2*i
    #[serde(default = "default_base_staking_port")]
    pub base_staking_port: u16,

    /// Genesis file handed to every node
    #[serde(default)]
    pub genesis_path: Option<PathBuf>,

    /// Extra arguments appended to every node command line
    #[serde(default)]
    pub node_args: Vec<String>,

    /// Interval between health probes in milliseconds
    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,

    /// Where to write the node list once the network is healthy
    #[serde(default)]
    pub node_list_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LifecycleConfig {
    /// Deadline for the whole network to report healthy
    #[serde(default = "default_healthy_timeout_seconds")]
    pub healthy_timeout_seconds: u64,

    /// Upper bound for the signal-triggered stop; unbounded when unset
    #[serde(default)]
    pub stop_timeout_seconds: Option<u64>,

    /// Time a node gets to exit after SIGTERM before it is killed
    #[serde(default = "default_node_stop_grace_seconds")]
    pub node_stop_grace_seconds: u64,
}

impl NetworkConfig {
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    /// HTTP port of node `index`, `None` when it does not fit in a u16
    pub fn http_port(&self, index: usize) -> Option<u16> {
        node_port(self.base_http_port, index)
    }

    /// Staking port of node `index`, `None` when it does not fit in a u16
    pub fn staking_port(&self, index: usize) -> Option<u16> {
        node_port(self.base_staking_port, index)
    }
}

impl LifecycleConfig {
    pub fn healthy_timeout(&self) -> Duration {
        Duration::from_secs(self.healthy_timeout_seconds)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_seconds.map(Duration::from_secs)
    }

    pub fn node_stop_grace(&self) -> Duration {
        Duration::from_secs(self.node_stop_grace_seconds)
    }
}

impl NetrunnerConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "network.binary_path",
                default_binary_path().to_string_lossy().to_string(),
            )?
            .set_default(
                "network.data_dir",
                default_data_dir().to_string_lossy().to_string(),
            )?
            .set_default("network.node_count", default_node_count() as i64)?
            .set_default("network.base_http_port", default_base_http_port() as i64)?
            .set_default(
                "network.base_staking_port",
                default_base_staking_port() as i64,
            )?
            .set_default("network.node_args", Vec::<String>::new())?
            .set_default(
                "network.health_poll_interval_ms",
                default_health_poll_interval_ms() as i64,
            )?
            .set_default(
                "lifecycle.healthy_timeout_seconds",
                default_healthy_timeout_seconds() as i64,
            )?
            .set_default(
                "lifecycle.node_stop_grace_seconds",
                default_node_stop_grace_seconds() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // NETRUNNER_NETWORK__NODE_COUNT=3 overrides network.node_count
            .add_source(
                Environment::with_prefix("NETRUNNER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: NetrunnerConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let network = &self.network;

        if network.node_count == 0 {
            return Err(ConfigError::Message(
                "Network node_count must be greater than 0".to_string(),
            ));
        }

        if network.health_poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Network health_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        let last = network.node_count - 1;
        for (name, base, last_port) in [
            ("base_http_port", network.base_http_port, network.http_port(last)),
            ("base_staking_port", network.base_staking_port, network.staking_port(last)),
        ] {
            if base == 0 || last_port.is_none() {
                return Err(ConfigError::Message(format!(
                    "Network {} {} cannot fit {} nodes",
                    name, base, network.node_count
                )));
            }
        }

        // Both port sets step by 2, so they collide only when the bases share parity
        let span = (last as u64) * 2;
        let http = network.base_http_port as u64;
        let staking = network.base_staking_port as u64;
        if http % 2 == staking % 2 && http.abs_diff(staking) <= span {
            return Err(ConfigError::Message(
                "Network HTTP and staking port ranges overlap".to_string(),
            ));
        }

        if self.lifecycle.healthy_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Lifecycle healthy_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.lifecycle.stop_timeout_seconds == Some(0) {
            return Err(ConfigError::Message(
                "Lifecycle stop_timeout_seconds must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            data_dir: default_data_dir(),
            node_count: default_node_count(),
            base_http_port: default_base_http_port(),
            base_staking_port: default_base_staking_port(),
            genesis_path: None,
            node_args: Vec::new(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
            node_list_path: None,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            healthy_timeout_seconds: default_healthy_timeout_seconds(),
            stop_timeout_seconds: None,
            node_stop_grace_seconds: default_node_stop_grace_seconds(),
        }
    }
}

fn node_port(base: u16, index: usize) -> Option<u16> {
    u16::try_from(index)
        .ok()?
        .checked_mul(2)?
        .checked_add(base)
}

// Default value functions
fn default_binary_path() -> PathBuf {
    PathBuf::from("build/avalanchego")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".netrunner")
}
fn default_node_count() -> usize {
    5
}
fn default_base_http_port() -> u16 {
    9650
}
fn default_base_staking_port() -> u16 {
    9651
}
fn default_health_poll_interval_ms() -> u64 {
    500
}

fn default_healthy_timeout_seconds() -> u64 {
    120
}
fn default_node_stop_grace_seconds() -> u64 {
    10
}
