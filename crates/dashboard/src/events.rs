//! UI events and the single-threaded event loop driving the controller.
//!
//! Hosts never touch the controller directly. They enqueue [`UiEvent`]s on a
//! bounded channel; a dedicated thread applies them one at a time, each
//! wrapped in the [`FaultReporter`], and answers with the outcome.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use seareport_common::{LayerId, RenderPrimitives, Timestamp, ZoomRange};

use crate::colorbar::ColorLimits;
use crate::controller::DashboardController;
use crate::error::{DashboardError, DashboardResult};
use crate::fault::{panic_message, FaultReporter};

/// Default capacity of the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    SelectDataset { id: String },
    SelectVariable { name: String },
    SelectTime { time: Option<Timestamp> },
    SelectTsVariable { name: String },
    SetKeepZoom { value: bool },
    SetShowMesh { value: bool },
    Render,
    ViewportChanged { layer: LayerId, range: ZoomRange },
    ColorLimitsChanged { min: Option<f64>, max: Option<f64> },
    DatasetsRefreshed { ids: Vec<String> },
}

impl UiEvent {
    /// Name of the callback handling the event, for logs and reports.
    pub fn callback_name(&self) -> &'static str {
        match self {
            UiEvent::SelectDataset { .. } => "update_dataset_file",
            UiEvent::SelectVariable { .. } => "on_variable_change",
            UiEvent::SelectTime { .. } => "on_time_change",
            UiEvent::SelectTsVariable { .. } => "on_ts_variable_change",
            UiEvent::SetKeepZoom { .. } => "on_keep_zoom_change",
            UiEvent::SetShowMesh { .. } => "on_show_mesh_change",
            UiEvent::Render => "update_main",
            UiEvent::ViewportChanged { .. } => "on_viewport_change",
            UiEvent::ColorLimitsChanged { .. } => "on_colorbar_change",
            UiEvent::DatasetsRefreshed { .. } => "update_dataset_files",
        }
    }
}

impl<R: RenderPrimitives> DashboardController<R> {
    /// Apply one event.
    pub fn handle_event(&mut self, event: UiEvent) -> DashboardResult<()> {
        match event {
            UiEvent::SelectDataset { id } => self.select_dataset(&id),
            UiEvent::SelectVariable { name } => self.select_variable(&name),
            UiEvent::SelectTime { time } => self.select_time(time),
            UiEvent::SelectTsVariable { name } => self.select_ts_variable(&name),
            UiEvent::SetKeepZoom { value } => self.set_keep_zoom(value),
            UiEvent::SetShowMesh { value } => self.set_show_mesh(value),
            UiEvent::Render => self.render().map(|_| ()),
            UiEvent::ViewportChanged { layer, range } => self.update_viewport(layer, range),
            UiEvent::ColorLimitsChanged { min, max } => {
                self.update_color_limits(ColorLimits::new(min, max))
            }
            UiEvent::DatasetsRefreshed { ids } => {
                self.apply_dataset_list(ids);
                Ok(())
            }
        }
    }
}

struct Envelope {
    event: UiEvent,
    reply: Option<oneshot::Sender<DashboardResult<()>>>,
}

/// Cloneable handle for enqueueing events.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("event", &self.event).finish()
    }
}

impl EventSender {
    /// Enqueue `event` and wait until it has been applied.
    pub async fn dispatch(&self, event: UiEvent) -> DashboardResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Envelope {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| DashboardError::Closed)?;
        outcome.await.map_err(|_| DashboardError::Closed)?
    }

    /// Enqueue `event` without waiting for it.
    pub async fn submit(&self, event: UiEvent) -> DashboardResult<()> {
        self.tx
            .send(Envelope { event, reply: None })
            .await
            .map_err(|_| DashboardError::Closed)
    }

    /// Blocking [`EventSender::dispatch`], for callers outside the runtime.
    pub fn blocking_dispatch(&self, event: UiEvent) -> DashboardResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .blocking_send(Envelope {
                event,
                reply: Some(reply),
            })
            .map_err(|_| DashboardError::Closed)?;
        outcome.blocking_recv().map_err(|_| DashboardError::Closed)?
    }
}

/// Owner of the event loop thread. The loop stops once every
/// [`EventSender`] has been dropped.
#[derive(Debug)]
pub struct EventLoopHandle {
    thread: JoinHandle<()>,
}

impl EventLoopHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to drain and stop.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

pub struct EventLoop<R: RenderPrimitives> {
    controller: DashboardController<R>,
    reporter: FaultReporter,
    rx: mpsc::Receiver<Envelope>,
}

impl<R> EventLoop<R>
where
    R: RenderPrimitives + 'static,
{
    /// Move `controller` onto its own thread.
    pub fn spawn(
        controller: DashboardController<R>,
        reporter: FaultReporter,
        capacity: usize,
    ) -> std::io::Result<(EventSender, EventLoopHandle)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let event_loop = EventLoop {
            controller,
            reporter: reporter.ignoring(DashboardError::is_client_fault),
            rx,
        };
        let thread = thread::Builder::new()
            .name("dashboard-events".to_string())
            .spawn(move || event_loop.run())?;

        Ok((EventSender { tx }, EventLoopHandle { thread }))
    }

    fn run(mut self) {
        info!("Dashboard event loop started");
        while let Some(Envelope { event, reply }) = self.rx.blocking_recv() {
            let result = self.handle(event);
            if let Some(reply) = reply {
                // the caller may have given up waiting
                let _ = reply.send(result);
            }
        }
        info!("Dashboard event loop stopped");
    }

    fn handle(&mut self, event: UiEvent) -> DashboardResult<()> {
        let callback = event.callback_name();
        debug!(callback, ?event, "Handling event");

        let controller = &mut self.controller;
        let reporter = &self.reporter;
        match panic::catch_unwind(AssertUnwindSafe(|| {
            reporter.run(callback, || controller.handle_event(event))
        })) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(callback, %message, "Event handler panicked");
                Err(DashboardError::Panic(message))
            }
        }
    }
}
