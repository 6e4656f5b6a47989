//! Run-and-report wrapper for externally triggered callbacks.
//!
//! A failing callback is logged with its source chain and a backtrace, a
//! notification is attempted, and the original error is handed back to the
//! caller unchanged. Panics are reported the same way and then resumed.

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, warn};

use seareport_common::Notifier;

/// What gets logged and sent for one failure.
#[derive(Debug, Clone)]
pub struct FaultReport {
    pub callback: String,
    pub message: String,
    pub chain: Vec<String>,
    pub backtrace: String,
}

impl FaultReport {
    pub fn from_error(callback: &str, err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            callback: callback.to_string(),
            message: err.to_string(),
            chain,
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn from_panic(callback: &str, payload: &(dyn Any + Send)) -> Self {
        Self {
            callback: callback.to_string(),
            message: format!("panicked: {}", panic_message(payload)),
            chain: Vec::new(),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    /// Text of the notification: the message, its causes, then the trace.
    pub fn notification(&self) -> String {
        let mut text = format!("{}: {}", self.callback, self.message);
        for cause in &self.chain {
            text.push_str("\ncaused by: ");
            text.push_str(cause);
        }
        text.push('\n');
        text.push_str(&self.backtrace);
        text
    }
}

/// Best-effort string form of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Predicate selecting errors that are expected and not worth a report.
pub type IgnoreFn = fn(&(dyn StdError + 'static)) -> bool;

#[derive(Clone, Default)]
pub struct FaultReporter {
    notifier: Option<Arc<dyn Notifier>>,
    ignore: Option<IgnoreFn>,
}

impl std::fmt::Debug for FaultReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultReporter")
            .field("notify", &self.notifier.is_some())
            .field("filtered", &self.ignore.is_some())
            .finish()
    }
}

impl FaultReporter {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier: Some(notifier),
            ignore: None,
        }
    }

    /// A reporter that only logs.
    pub fn log_only() -> Self {
        Self::default()
    }

    /// Pass errors matching `ignore` through without reporting them.
    pub fn ignoring(mut self, ignore: IgnoreFn) -> Self {
        self.ignore = Some(ignore);
        self
    }

    /// Run `f`, reporting an error or a panic before passing it on.
    pub fn run<T, E, F>(&self, callback: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: StdError + 'static,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                self.report_error(callback, &err);
                Err(err)
            }
            Err(payload) => {
                self.report(FaultReport::from_panic(callback, payload.as_ref()));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async counterpart of [`FaultReporter::run`] for errors.
    ///
    /// The report is sent from the blocking pool since notifiers run external
    /// programs.
    pub async fn run_async<T, E, Fut>(&self, callback: &str, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        match fut.await {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.should_report(callback, &err) {
                    let reporter = self.clone();
                    let report = FaultReport::from_error(callback, &err);
                    if let Err(e) = tokio::task::spawn_blocking(move || reporter.report(report)).await {
                        warn!(callback, error = %e, "Failure report task did not complete");
                    }
                }
                Err(err)
            }
        }
    }

    pub fn report_error(&self, callback: &str, err: &(dyn StdError + 'static)) {
        if self.should_report(callback, err) {
            self.report(FaultReport::from_error(callback, err));
        }
    }

    fn should_report(&self, callback: &str, err: &(dyn StdError + 'static)) -> bool {
        if self.ignore.is_some_and(|ignore| ignore(err)) {
            debug!(callback, error = %err, "Callback rejected the request");
            return false;
        }
        true
    }

    pub fn report(&self, report: FaultReport) {
        counter!("dashboard_faults_total").increment(1);
        error!(
            callback = %report.callback,
            error = %report.message,
            causes = ?report.chain,
            backtrace = %report.backtrace,
            "Callback failed"
        );

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&report.notification()) {
                warn!(error = %e, "Failed to send failure notification");
            }
        }
    }
}
