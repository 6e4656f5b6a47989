//! Seareport dashboard service.
//!
//! Serves the dashboard layout and accepts UI events over HTTP, with:
//! - Dataset listing from blob storage, refreshed periodically
//! - Consolidated Zarr stores opened on demand
//! - Failure notifications through a desktop/push notifier
//! - Prometheus metrics

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dashboard::{CommandNotifier, DashboardController, EventLoop, FaultReporter, RefreshTask};
use dashboard_api::config::{Config, LoggingConfig};
use dashboard_api::{create_router, AppState, LayerSpecRenderer};
use storage::{ObjectStorage, ZarrDatasetSource};

#[derive(Parser, Debug)]
#[command(name = "dashboard-api")]
#[command(about = "Seareport storm-surge dashboard server")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "SEAREPORT_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Listen address (overrides server.listen)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (overrides logging.level)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true);

    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let loaded = Config::load(&args.config)?;
    let missing_config = loaded.is_none();
    let mut config = loaded.unwrap_or_default();
    args.apply(&mut config);

    init_tracing(&config.logging)?;
    if missing_config {
        warn!(path = %args.config.display(), "Config file not found, using defaults");
    }

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");
    info!("Starting seareport dashboard");

    // Storage adapters
    let storage = Arc::new(
        ObjectStorage::new(&config.storage).context("failed to configure object storage")?,
    );
    let catalog = Arc::new(config.dataset_catalog(storage.clone()));
    let source = Arc::new(ZarrDatasetSource::new(storage, Handle::current()));

    let reporter = if config.notify.enabled {
        FaultReporter::new(Arc::new(CommandNotifier::from_config(&config.notify)))
    } else {
        FaultReporter::log_only()
    };

    // Controller on its own thread
    let controller = DashboardController::new(
        config.dashboard.controller.clone(),
        source,
        LayerSpecRenderer::new(config.basemap.url.clone()),
    );
    let layout = controller.layout_handle();
    let (events, event_loop) =
        EventLoop::spawn(controller, reporter.clone(), config.dashboard.queue_capacity)
            .context("failed to start the event loop")?;

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let refresh = RefreshTask::new(catalog, events.clone(), reporter, &config.dashboard.refresh);
    let refresh_handle = tokio::spawn(refresh.run_forever(shutdown_tx.subscribe()));

    let state = Arc::new(AppState {
        events,
        layout,
        prometheus: Some(prometheus),
    });
    let app = create_router(state);

    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.listen))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Listening");

    // Handle Ctrl+C
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_tx.send(()).ok();
    });

    let mut server_shutdown = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_shutdown.recv().await.ok();
        })
        .await?;

    // The router and the refresh task hold the last event senders; once
    // both are gone the event loop drains its queue and stops.
    refresh_handle.await?;
    tokio::task::spawn_blocking(move || event_loop.join())
        .await?
        .map_err(|_| anyhow!("dashboard event loop panicked"))?;

    info!("Dashboard stopped");
    Ok(())
}
