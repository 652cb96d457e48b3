//! Lapse sweep scheduler.
//!
//! Drives the periodic treatment-lapse sweep: each tick runs
//! [`TreatmentMonitor::sweep`], records the outcome in [`AppMetrics`] and
//! logs the operator-facing report.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::{self, MissedTickBehavior};

use crate::metrics::AppMetrics;
use crate::monitor::{SweepReport, TreatmentMonitor};

/// Run the sweep loop.
///
/// Errors from a sweep are logged and the loop continues; a single failed
/// sweep never takes down the scheduler and it does not retry early. Late
/// ticks are delayed rather than bunched up.
///
/// Runs until `Ctrl+C` (SIGINT) is received.
pub async fn run_lapse_sweeps(
    monitor: Arc<TreatmentMonitor>,
    metrics: Arc<AppMetrics>,
    interval_seconds: u64,
) {
    let mut interval = time::interval(Duration::from_secs(interval_seconds.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Lapse sweeps started (interval: {}s, grace: {}h)",
        interval_seconds,
        monitor.config().grace_period.num_hours()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep_once(&monitor, &metrics).await;
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping lapse sweeps.");
                break;
            }
        }
    }

    tracing::info!("Lapse sweeps stopped cleanly");
}

/// Execute a single sweep and record it. Returns the report, or `None` if
/// the sweep failed outright.
pub async fn sweep_once(
    monitor: &TreatmentMonitor,
    metrics: &AppMetrics,
) -> Option<SweepReport> {
    match monitor.sweep().await {
        Ok(report) => {
            metrics.record_sweep(&report);
            if report.is_clean() {
                tracing::info!("{} (reset_count: {})", report.message, report.reset_count);
            } else {
                tracing::warn!(
                    "{} (reset_count: {}, failed: {})",
                    report.message,
                    report.reset_count,
                    report.failed
                );
            }
            Some(report)
        }
        Err(err) => {
            metrics.record_sweep_error();
            tracing::error!("Lapse sweep failed: {}", err);
            None
        }
    }
}

/// Process exit code for a one-shot sweep: 0 when every active patient was
/// evaluated, 1 otherwise.
pub fn exit_code(outcome: Option<&SweepReport>) -> i32 {
    match outcome {
        Some(report) if report.is_clean() => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::monitor::{InMemoryPatientStore, ManualClock, MonitorConfig};

    fn make_monitor(store: InMemoryPatientStore) -> TreatmentMonitor {
        let now = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        TreatmentMonitor::new(
            Arc::new(store),
            Arc::new(ManualClock::new(now)),
            MonitorConfig::with_grace_hours(72),
        )
    }

    fn lapsed_store() -> InMemoryPatientStore {
        let long_ago = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        InMemoryPatientStore::new()
            .with_patient("a", "aktif", Some(long_ago))
            .with_patient("b", "aktif", Some(long_ago))
    }

    #[tokio::test]
    async fn sweep_once_records_resets_in_metrics() {
        let monitor = make_monitor(lapsed_store());
        let metrics = AppMetrics::new().unwrap();

        let report = sweep_once(&monitor, &metrics).await.unwrap();

        assert_eq!(report.reset_count, 2);
        assert!((metrics.patients_reset_total.get() - 2.0).abs() < f64::EPSILON);
        assert!((metrics.sweeps_total.get() - 1.0).abs() < f64::EPSILON);
        assert_eq!(exit_code(Some(&report)), 0);
    }

    #[tokio::test]
    async fn two_sweeps_accumulate_attempts_but_not_resets() {
        let monitor = make_monitor(lapsed_store());
        let metrics = AppMetrics::new().unwrap();

        sweep_once(&monitor, &metrics).await;
        sweep_once(&monitor, &metrics).await;

        assert!((metrics.sweeps_total.get() - 2.0).abs() < f64::EPSILON);
        assert!((metrics.patients_reset_total.get() - 2.0).abs() < f64::EPSILON);
        assert!((metrics.last_sweep_resets.get()).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failed_sweep_is_counted_and_exits_non_zero() {
        let monitor = make_monitor(InMemoryPatientStore::new().failing_listing());
        let metrics = AppMetrics::new().unwrap();

        let outcome = sweep_once(&monitor, &metrics).await;

        assert!(outcome.is_none());
        assert!((metrics.sweep_errors_total.get() - 1.0).abs() < f64::EPSILON);
        assert_eq!(exit_code(outcome.as_ref()), 1);
    }

    #[tokio::test]
    async fn partial_failure_exits_non_zero() {
        let monitor = make_monitor(lapsed_store().failing_writes_for("a"));
        let metrics = AppMetrics::new().unwrap();

        let report = sweep_once(&monitor, &metrics).await.unwrap();

        assert_eq!(report.reset_count, 1);
        assert_eq!(exit_code(Some(&report)), 1);
    }

    #[tokio::test]
    async fn empty_store_is_a_clean_sweep() {
        let monitor = make_monitor(InMemoryPatientStore::new());
        let metrics = AppMetrics::new().unwrap();

        let report = sweep_once(&monitor, &metrics).await.unwrap();

        assert_eq!(report.reset_count, 0);
        assert_eq!(exit_code(Some(&report)), 0);
    }
}
