//! ATW-Over-LAN bridge daemon entry point.
//!
//! Wires together the infrastructure services and starts the Tokio runtime.
//!
//! # Startup order
//!
//! ```text
//! main()
//!  └─ load configuration        -- TOML file or built-in defaults
//!  └─ init tracing              -- RUST_LOG overrides the config level
//!  └─ validate static tables    -- command catalog + characteristic table
//!  └─ bind the shared socket    -- one UDP socket, broadcast enabled
//!  └─ start services
//!       ├─ receive thread       -- feeds the datagram channel
//!       ├─ scanner task         -- periodic discovery broadcasts
//!       └─ router task          -- the single dispatch loop
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atw_bridge::application::characteristics;
use atw_bridge::application::registry::DeviceRegistry;
use atw_bridge::application::sender::DatagramSender;
use atw_bridge::infrastructure::network::router::Router;
use atw_bridge::infrastructure::network::scanner::{start_scan, ScanConfig};
use atw_bridge::infrastructure::network::transport::UdpTransport;
use atw_bridge::infrastructure::storage::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration: explicit path argument, else the platform default
    // location, else built-in defaults.
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(config::config_file_path);
    let app_config = match &config_path {
        Some(path) => config::load_config(path)?,
        None => config::AppConfig::default(),
    };

    // Structured logging.  `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(app_config.platform.log_level.clone())),
        )
        .init();

    info!("{} starting", app_config.platform.name);

    // A broken static table is a boot failure, not a runtime surprise.
    atw_core::catalog::validate()?;
    characteristics::validate()?;

    let app_config = Arc::new(app_config);

    // One shared socket for everything: scanner, poll tasks, commands, and
    // the receive thread.
    let transport = Arc::new(UdpTransport::bind(app_config.platform.listen_port)?);
    let sender: Arc<dyn DatagramSender> = transport.clone();

    let running = Arc::new(AtomicBool::new(true));
    let datagrams = transport.start_receiver(Arc::clone(&running));

    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));

    let scan_task = start_scan(
        Arc::clone(&sender),
        ScanConfig {
            broadcast_addr: app_config.scan_target()?,
            interval: app_config.scan_interval(),
            max_attempts: app_config.platform.scan_count,
        },
    );
    info!(
        "scanning {} every {:?}, up to {} attempts",
        app_config.scan_target()?,
        app_config.scan_interval(),
        app_config.platform.scan_count
    );

    let router = Router::new(
        Arc::clone(&registry),
        Arc::clone(&sender),
        Arc::clone(&app_config),
    );
    let router_task = tokio::spawn(router.run(datagrams));

    info!("{} ready, press Ctrl-C to exit", app_config.platform.name);
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    running.store(false, Ordering::Relaxed);
    scan_task.abort();
    router_task.abort();

    info!("{} stopped", app_config.platform.name);
    Ok(())
}
