use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use filetree_core::config::ServiceConfig;
use filetree_core::instrument::{ListingObserver, LogObserver, NoopObserver};
use filetree_core::listing::TreeService;
use filetree_store::PhysicalFileStore;

mod serve;

#[derive(Parser, Debug)]
#[command(name = "filetree-server")]
#[command(about = "Paginated tree listing service over a static file root")]
#[command(version)]
struct Cli {
    /// Address to listen on (e.g., 127.0.0.1:7870)
    #[arg(long, env = "FILETREE_BIND")]
    bind: Option<String>,

    /// Directory served as the tree root
    #[arg(long, env = "FILETREE_ROOT")]
    root: Option<String>,

    /// Path to config file
    #[arg(long, env = "FILETREE_CONFIG_PATH")]
    config_path: Option<String>,

    /// Hard ceiling for the `take` pagination parameter
    #[arg(long)]
    max_take: Option<u64>,

    /// Emit a timing event for every tree request
    #[arg(long)]
    profile_requests: bool,

    /// Write the effective config back to the config file and continue
    #[arg(long)]
    write_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FILETREE_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        "filetree-server v{} starting (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    // Load or create config
    let config_path = cli
        .config_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(ServiceConfig::default_path);

    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        ServiceConfig::load(&config_path)?
    } else {
        ServiceConfig::default()
    };

    // CLI args override config file
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = cli.root {
        config.root_dir = root;
    }
    if let Some(max_take) = cli.max_take {
        config.max_take = max_take;
    }
    if cli.profile_requests {
        config.profile_requests = true;
    }

    if config.root_dir.is_empty() {
        anyhow::bail!("tree root is required (--root or config file)");
    }

    if cli.write_config {
        config.save(&config_path)?;
        info!("config saved to {}", config_path.display());
    }

    let store = PhysicalFileStore::open(&config.root_dir)
        .with_context(|| format!("failed to open tree root {}", config.root_dir))?;

    let observer: Arc<dyn ListingObserver> = if config.profile_requests {
        Arc::new(LogObserver)
    } else {
        Arc::new(NoopObserver)
    };

    let service = TreeService::new(Box::new(store))
        .with_max_take(config.max_take)
        .with_observer(observer);

    serve::run(config, service).await
}
