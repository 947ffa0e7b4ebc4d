use crate::config::NetworkConfig;
use crate::error::{NetrunnerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Identity and endpoints of one node in a running network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub http_uri: String,
    pub http_port: u16,
    pub staking_port: u16,
    pub data_dir: PathBuf,
    pub pid: Option<u32>,
}

impl NodeInfo {
    /// Lay out node `index`; fails when its ports fall outside the u16 range
    pub(super) fn new(config: &NetworkConfig, run_dir: &Path, index: usize) -> Result<Self> {
        let name = format!("node-{}", index);
        let (Some(http_port), Some(staking_port)) =
            (config.http_port(index), config.staking_port(index))
        else {
            return Err(NetrunnerError::start(format!(
                "{}: ports from bases {}/{} exceed {}",
                name,
                config.base_http_port,
                config.base_staking_port,
                u16::MAX
            )));
        };

        Ok(Self {
            http_uri: format!("http://127.0.0.1:{}", http_port),
            http_port,
            staking_port,
            data_dir: run_dir.join(&name),
            name,
            pid: None,
        })
    }

    pub fn db_dir(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Command line for this node; every node after the first bootstraps from `bootstrap`
    pub(super) fn args(&self, config: &NetworkConfig, bootstrap: Option<&NodeInfo>) -> Vec<String> {
        let mut args = vec![
            format!("--http-port={}", self.http_port),
            format!("--staking-port={}", self.staking_port),
            format!("--db-dir={}", self.db_dir().display()),
            format!("--log-dir={}", self.log_dir().display()),
        ];

        if let Some(bootstrap) = bootstrap {
            args.push(format!("--bootstrap-ips=127.0.0.1:{}", bootstrap.staking_port));
        }

        if let Some(genesis) = &config.genesis_path {
            args.push(format!("--genesis={}", genesis.display()));
        }

        args.extend(config.node_args.iter().cloned());
        args
    }
}

/// Write the node list as pretty JSON
pub(super) async fn write_node_list(path: &Path, nodes: &[NodeInfo]) -> Result<()> {
    let data = serde_json::to_vec_pretty(nodes)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await?;

    info!("Wrote {} node entries to {}", nodes.len(), path.display());
    Ok(())
}
