//! Cache status and `Server-Timing` encoding.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Metric name prefix used for cache entries in `Server-Timing`.
pub const SERVER_TIMING_PREFIX: &str = "edge";

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the store.
    Hit,
    /// Produced by the wrapped handler.
    Miss,
}

impl CacheStatus {
    /// Lowercase name as used in `Server-Timing`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `Server-Timing` metric, e.g. `edge-miss;dur=12`.
pub fn server_timing_entry(status: CacheStatus, elapsed: Duration) -> String {
    format!(
        "{}-{};dur={}",
        SERVER_TIMING_PREFIX,
        status.as_str(),
        elapsed.as_millis()
    )
}

/// Parse a metric produced by [`server_timing_entry`] back into its parts.
pub fn parse_server_timing_entry(entry: &str) -> Option<(CacheStatus, u64)> {
    let (metric, params) = entry.trim().split_once(';')?;
    let status = match metric.strip_prefix(SERVER_TIMING_PREFIX)?.strip_prefix('-')? {
        "hit" => CacheStatus::Hit,
        "miss" => CacheStatus::Miss,
        _ => return None,
    };
    let millis = params.trim().strip_prefix("dur=")?.parse().ok()?;
    Some((status, millis))
}
