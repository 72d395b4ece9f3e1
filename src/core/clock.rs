use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in seconds since the Unix epoch.
///
/// Expiry and consumption timestamps are always read through a [Clock] so
/// that tests can drive the clock explicitly.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The default [Clock], backed by [SystemTime].
pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    })
}
