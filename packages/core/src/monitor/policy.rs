//! The lapse rule.
//!
//! Pure functions only: no store, no clock. Both the sweep and the
//! post-insert check call [`evaluate_and_reset`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// What the lapse rule needs to know about one patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreatmentClock {
    pub start_treatment_date: DateTime<Utc>,
    pub last_log_at: Option<DateTime<Utc>>,
}

impl TreatmentClock {
    /// The later of the last reported intake and the clock start. Logs that
    /// predate a restart do not count against the new clock.
    pub fn reference_time(&self) -> DateTime<Utc> {
        match self.last_log_at {
            Some(last) if last > self.start_treatment_date => last,
            _ => self.start_treatment_date,
        }
    }

    /// The instant after which the patient counts as lapsed.
    pub fn deadline(&self, grace: Duration) -> DateTime<Utc> {
        self.reference_time() + grace
    }

    /// Lapsed when strictly more than `grace` has passed since the
    /// reference time.
    pub fn is_lapsed(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        now - self.reference_time() > grace
    }
}

/// Decide whether the treatment clock must restart. Returns the new start
/// date (`now`) for a lapsed patient, `None` otherwise.
pub fn evaluate_and_reset(
    clock: &TreatmentClock,
    now: DateTime<Utc>,
    grace: Duration,
) -> Option<DateTime<Utc>> {
    clock.is_lapsed(now, grace).then_some(now)
}
