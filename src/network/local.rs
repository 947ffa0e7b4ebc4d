use super::nodes::{write_node_list, NodeInfo};
use super::Network;
use crate::config::NetworkConfig;
use crate::error::{NetrunnerError, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct NodeProcess {
    info: NodeInfo,
    child: Child,
}

struct Shared {
    started: AtomicBool,
    nodes: Mutex<Vec<NodeProcess>>,
    poll_interval: Mutex<Duration>,
    node_list_path: Mutex<Option<PathBuf>>,
}

/// Network of node processes running on this host
pub struct LocalNetwork {
    shared: Arc<Shared>,
    stop_grace: Duration,
}

impl LocalNetwork {
    /// Create an unstarted network; `stop_grace` bounds each node's SIGTERM exit
    pub fn new(stop_grace: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                started: AtomicBool::new(false),
                nodes: Mutex::new(Vec::new()),
                poll_interval: Mutex::new(Duration::from_millis(500)),
                node_list_path: Mutex::new(None),
            }),
            stop_grace,
        }
    }

    /// Snapshot of the nodes currently owned by this network
    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.shared
            .nodes
            .lock()
            .iter()
            .map(|node| node.info.clone())
            .collect()
    }

    fn spawn_node(
        config: &NetworkConfig,
        info: &NodeInfo,
        bootstrap: Option<&NodeInfo>,
    ) -> Result<Child> {
        std::fs::create_dir_all(info.db_dir())?;
        std::fs::create_dir_all(info.log_dir())?;

        let stdout = File::create(info.log_dir().join("stdout.log"))?;
        let stderr = File::create(info.log_dir().join("stderr.log"))?;

        let args = info.args(config, bootstrap);
        debug!("Spawning {}: {} {:?}", info.name, config.binary_path.display(), args);

        Command::new(&config.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                NetrunnerError::start(format!(
                    "{}: failed to spawn {}: {}",
                    info.name,
                    config.binary_path.display(),
                    e
                ))
            })
    }

    /// Stop every node at once, so the whole set shares one grace period
    async fn shutdown_nodes(nodes: Vec<NodeProcess>, grace: Duration) -> Result<()> {
        let mut tasks = JoinSet::new();
        for mut node in nodes {
            tasks.spawn(async move {
                let result = Self::shutdown_node(&mut node, grace).await;
                (node.info.name, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((name, Err(e))) => {
                    error!("Error stopping {}: {}", name, e);
                    failures.push(format!("{}: {}", name, e));
                }
                Err(e) => {
                    error!("Node shutdown task failed: {}", e);
                    failures.push(format!("shutdown task: {}", e));
                }
            }
        }
        failures.sort();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NetrunnerError::stop(failures.join("; ")))
        }
    }

    async fn shutdown_node(node: &mut NodeProcess, grace: Duration) -> Result<()> {
        if node.child.try_wait()?.is_some() {
            debug!("{} already exited", node.info.name);
            return Ok(());
        }

        #[cfg(unix)]
        {
            if let Some(pid) = node.child.id() {
                // SAFETY: plain kill(2) on a pid we spawned and have not reaped
                let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if rc != 0 {
                    warn!(
                        "SIGTERM to {} failed: {}",
                        node.info.name,
                        std::io::Error::last_os_error()
                    );
                }
            }
        }

        match timeout(grace, node.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("{} exited with {}", node.info.name, status);
                Ok(())
            }
            Err(_) => {
                warn!(
                    "{} did not exit within {:?}, killing",
                    node.info.name, grace
                );
                node.child.start_kill()?;
                node.child.wait().await?;
                Ok(())
            }
        }
    }

    /// One probe round: `Ok(true)` once every node accepts on its HTTP port
    async fn probe(shared: &Shared) -> Result<bool> {
        let ports = {
            let mut nodes = shared.nodes.lock();
            let mut ports = Vec::with_capacity(nodes.len());
            for node in nodes.iter_mut() {
                if let Some(status) = node.child.try_wait()? {
                    return Err(NetrunnerError::node(
                        node.info.name.clone(),
                        format!("exited before becoming healthy ({})", status),
                    ));
                }
                ports.push((node.info.name.clone(), node.info.http_port));
            }
            ports
        };

        if ports.is_empty() {
            return Err(NetrunnerError::health("network has no running nodes"));
        }

        for (name, port) in ports {
            if TcpStream::connect(("127.0.0.1", port)).await.is_err() {
                debug!("{} not accepting on port {} yet", name, port);
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn wait_healthy(shared: Arc<Shared>) -> Result<()> {
        let mut ticker = interval(*shared.poll_interval.lock());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if Self::probe(&shared).await? {
                break;
            }
        }

        info!("All nodes accepting connections");

        let node_list_path = shared.node_list_path.lock().clone();
        if let Some(path) = node_list_path {
            let infos: Vec<NodeInfo> = shared
                .nodes
                .lock()
                .iter()
                .map(|node| node.info.clone())
                .collect();
            write_node_list(&path, &infos).await?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Network for LocalNetwork {
    async fn start(&self, config: &NetworkConfig) -> Result<()> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(NetrunnerError::start("network already started"));
        }

        if !config.binary_path.is_file() {
            return Err(NetrunnerError::start(format!(
                "node binary not found at {}",
                config.binary_path.display()
            )));
        }

        let run_dir = config.data_dir.join(Uuid::new_v4().to_string());
        let infos = (0..config.node_count)
            .map(|index| NodeInfo::new(config, &run_dir, index))
            .collect::<Result<Vec<_>>>()?;

        std::fs::create_dir_all(&run_dir)?;
        info!(
            "Starting {} nodes from {} in {}",
            config.node_count,
            config.binary_path.display(),
            run_dir.display()
        );

        *self.shared.poll_interval.lock() = config.health_poll_interval().max(MIN_POLL_INTERVAL);
        *self.shared.node_list_path.lock() = config.node_list_path.clone();

        let mut spawned = Vec::with_capacity(infos.len());
        for (index, info) in infos.iter().enumerate() {
            let bootstrap = if index == 0 { None } else { infos.first() };
            match Self::spawn_node(config, info, bootstrap) {
                Ok(child) => {
                    let mut info = info.clone();
                    info.pid = child.id();
                    info!("Started {} (pid {:?}) at {}", info.name, info.pid, info.http_uri);
                    spawned.push(NodeProcess { info, child });
                }
                Err(e) => {
                    error!("Failed to start {}: {}", info.name, e);
                    if let Err(stop_err) = Self::shutdown_nodes(spawned, self.stop_grace).await {
                        debug!("Error rolling back partial start: {}", stop_err);
                    }
                    return Err(e);
                }
            }
        }

        *self.shared.nodes.lock() = spawned;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let nodes = std::mem::take(&mut *self.shared.nodes.lock());
        if nodes.is_empty() {
            debug!("Local network has no running nodes");
            return Ok(());
        }

        info!("Stopping {} nodes", nodes.len());
        Self::shutdown_nodes(nodes, self.stop_grace).await
    }

    fn healthy(&self, cancel: CancellationToken) -> oneshot::Receiver<Result<()>> {
        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Health check cancelled");
                }
                result = Self::wait_healthy(shared) => {
                    let _ = tx.send(result);
                }
            }
        });

        rx
    }
}
