//! Process resource probes.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Records the process start instant on first call and returns it.
///
/// [`build_logging`](crate::logger::build_logging) calls this during
/// startup; later calls return the same instant.
pub fn mark_started() -> Instant {
    *STARTED.get_or_init(Instant::now)
}

/// Time since [`mark_started`] first ran.
#[must_use]
pub fn uptime() -> Duration {
    mark_started().elapsed()
}

/// Resident set size of this process in bytes.
///
/// Read from `/proc/self/status`; `None` where that is unavailable.
#[must_use]
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    kib.checked_mul(1024)
}
