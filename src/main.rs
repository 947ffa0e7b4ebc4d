use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use netrunner::{LocalNetwork, NetrunnerConfig, NetworkController};

#[derive(Parser, Debug)]
#[command(name = "netrunner")]
#[command(about = "Run a local multi-node network until interrupted")]
#[command(version)]
#[command(long_about = "Starts a local network of node processes, waits for every node to \
report healthy within a deadline, then keeps the network running until SIGINT or SIGTERM. \
The network is stopped exactly once on the way out, whichever way the run ends.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netrunner.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Override the node binary path
    #[arg(long, value_name = "PATH", help = "Node binary, relative paths resolve against the working directory")]
    binary_path: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, value_name = "DIR", help = "Root directory for per-run node data")]
    data_dir: Option<PathBuf>,

    /// Override the number of nodes
    #[arg(short, long, value_name = "N", help = "Number of nodes to run")]
    nodes: Option<usize>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the network")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting netrunner v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match NetrunnerConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, &args)?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let network = Arc::new(LocalNetwork::new(config.lifecycle.node_stop_grace()));
    let mut controller = NetworkController::new(config, network);

    match controller.run().await {
        Ok(reason) => {
            info!("Netrunner exited cleanly after {}", reason);
            Ok(())
        }
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(1);
        }
    }
}

/// Apply CLI overrides and resolve relative paths against the working directory
fn apply_overrides(config: &mut NetrunnerConfig, args: &Args) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;

    if let Some(binary_path) = &args.binary_path {
        config.network.binary_path = binary_path.clone();
    }
    if let Some(data_dir) = &args.data_dir {
        config.network.data_dir = data_dir.clone();
    }
    if let Some(nodes) = args.nodes {
        config.network.node_count = nodes;
    }

    config.network.binary_path = resolve(&cwd, &config.network.binary_path);
    config.network.data_dir = resolve(&cwd, &config.network.data_dir);
    Ok(())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("netrunner={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = toml::to_string_pretty(&NetrunnerConfig::default())
        .context("Failed to render default configuration")?;

    println!("# Netrunner Configuration File");
    println!("# Environment overrides use NETRUNNER_<SECTION>__<KEY>, e.g. NETRUNNER_NETWORK__NODE_COUNT=3");
    println!();
    println!("{}", rendered);
    Ok(())
}
