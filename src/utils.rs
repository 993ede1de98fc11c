use crate::models::habitat::ControlGroup;
use crate::services::metrics::MetricFeed;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

/// Serialize a serde-backed enum into its string name (e.g. lowercase).
pub fn serde_enum_name<T: Serialize>(val: &T) -> Option<String> {
    serde_json::to_value(val).ok()?.as_str().map(|s| s.to_string())
}

/// Deterministic generator for `seed`, or OS-seeded when no seed is given.
///
/// `stream` separates generators built from the same seed so they do not
/// replay each other's draws.
pub fn seeded_rng(seed: Option<u64>, stream: u64) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed ^ stream.rotate_left(32)),
        None => SmallRng::from_os_rng(),
    }
}

/// Compact JSON rendering of the groups, as the dashboard would hold them.
pub fn groups_snapshot(groups: &[ControlGroup]) -> Result<String, String> {
    serde_json::to_string(groups).map_err(|e| format!("serializing groups failed: {}", e))
}

/// JSON rendering of every feed with its chart series.
pub fn feeds_snapshot(feeds: &[MetricFeed]) -> Result<String, String> {
    let snapshots: Vec<_> = feeds.iter().map(MetricFeed::snapshot).collect();
    serde_json::to_string(&snapshots).map_err(|e| format!("serializing metrics failed: {}", e))
}
