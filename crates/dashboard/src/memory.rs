//! Memory reclamation hint.
//!
//! Released artifacts are freed when their last owner drops them; the hint
//! only records the process RSS right after the teardown.

use metrics::gauge;
use tracing::debug;

/// Read the current process RSS (resident set size) in bytes.
pub fn process_rss() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Best-effort, non-blocking.
pub fn reclamation_hint() {
    match process_rss() {
        Some(rss) => {
            gauge!("dashboard_process_rss_bytes").set(rss as f64);
            debug!(rss_mb = rss / 1024 / 1024, "Released previous render artifacts");
        }
        None => debug!("Released previous render artifacts (RSS unavailable)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn test_process_rss_on_linux() {
        assert!(process_rss().is_some_and(|rss| rss > 0));
    }

    #[test]
    fn test_reclamation_hint_never_panics() {
        reclamation_hint();
    }
}
