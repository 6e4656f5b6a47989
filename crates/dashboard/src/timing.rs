//! Stage timing.

use std::time::{Duration, Instant};

use metrics::histogram;
use tracing::debug;

/// Logs and records the time between `start` and drop.
#[derive(Debug)]
pub struct Stopwatch {
    stage: &'static str,
    started: Instant,
}

impl Stopwatch {
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        debug!(stage = self.stage, elapsed_secs = elapsed, "{}: {:.9}s", self.stage, elapsed);
        histogram!("dashboard_stage_seconds", "stage" => self.stage).record(elapsed);
    }
}

/// Run `f` under a [`Stopwatch`].
pub fn timed<T>(stage: &'static str, f: impl FnOnce() -> T) -> T {
    let _stopwatch = Stopwatch::start(stage);
    f()
}
