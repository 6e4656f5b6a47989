//! Periodic refresh of the dataset list.
//!
//! The catalog is listed on the async runtime; only the resulting
//! [`UiEvent::DatasetsRefreshed`] goes through the event loop, so a slow
//! listing never holds up a render and a render never sees a half-applied
//! listing.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use seareport_common::DatasetCatalog;

use crate::error::{DashboardError, DashboardResult};
use crate::events::{EventSender, UiEvent};
use crate::fault::FaultReporter;

/// Configuration for the refresh task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether the task runs at all
    pub enabled: bool,
    /// Seconds between two listings
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Background task re-listing the catalog.
pub struct RefreshTask {
    catalog: Arc<dyn DatasetCatalog>,
    events: EventSender,
    reporter: FaultReporter,
    period: Duration,
    enabled: bool,
}

impl RefreshTask {
    pub fn new(
        catalog: Arc<dyn DatasetCatalog>,
        events: EventSender,
        reporter: FaultReporter,
        config: &RefreshConfig,
    ) -> Self {
        Self {
            catalog,
            events,
            reporter,
            period: config.interval(),
            enabled: config.enabled,
        }
    }

    /// Override the period, e.g. for sub-second periods in tests.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// List the catalog once and wait until the listing has been applied.
    /// Returns the number of datasets listed.
    pub async fn run_once(&self) -> DashboardResult<usize> {
        let ids = self
            .reporter
            .run_async("update_dataset_files", async {
                self.catalog
                    .list_dataset_identifiers()
                    .await
                    .map_err(DashboardError::from)
            })
            .await;

        let ids = match ids {
            Ok(ids) => ids,
            Err(e) => {
                counter!("dashboard_refresh_total", "outcome" => "error").increment(1);
                return Err(e);
            }
        };

        let count = ids.len();
        self.events.dispatch(UiEvent::DatasetsRefreshed { ids }).await?;
        counter!("dashboard_refresh_total", "outcome" => "ok").increment(1);
        debug!(count, "Updated dataset files");
        Ok(count)
    }

    /// Run the refresh in a loop until `shutdown` fires.
    pub async fn run_forever(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.enabled {
            info!("Dataset refresh task disabled");
            return;
        }

        info!(interval_secs = self.period.as_secs_f64(), "Starting dataset refresh task");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Run immediately on startup
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(_) => {}
                        Err(DashboardError::Closed) => {
                            info!("Event loop closed, stopping dataset refresh task");
                            break;
                        }
                        Err(e) => error!(error = %e, "Dataset refresh failed, retrying next period"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Stopping dataset refresh task");
                    break;
                }
            }
        }
    }
}
