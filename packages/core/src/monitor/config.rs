//! Configuration for the treatment-date monitor

use chrono::Duration;

/// Default grace period before reporting is considered lapsed.
pub const DEFAULT_GRACE_HOURS: i64 = 72;

/// Longest grace period accepted from configuration: one year.
pub const MAX_GRACE_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// How long a patient may go without a reported intake before the
    /// treatment clock restarts.
    pub grace_period: Duration,
}

impl MonitorConfig {
    /// Hours outside `0..=MAX_GRACE_HOURS` are clamped into that range.
    pub fn with_grace_hours(hours: i64) -> Self {
        Self {
            grace_period: Duration::hours(hours.clamp(0, MAX_GRACE_HOURS)),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::with_grace_hours(DEFAULT_GRACE_HOURS)
    }
}
