//! Prometheus metrics registry for the TB care coordinator.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the scheduler and HTTP middleware.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`), outside bearer-token auth so it can be
//! scraped.

use prometheus::{Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

use crate::monitor::SweepReport;

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Lapse sweeps attempted (success + failure).
    pub sweeps_total: Counter,
    /// Sweeps that aborted before evaluating patients.
    pub sweep_errors_total: Counter,
    /// Patients whose treatment clock was restarted by a sweep.
    pub patients_reset_total: Counter,
    /// Per-patient store failures isolated during sweeps.
    pub patient_failures_total: Counter,
    /// Active patients evaluated in the most recent sweep.
    pub last_sweep_evaluated: Gauge,
    /// Resets performed by the most recent sweep.
    pub last_sweep_resets: Gauge,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sweeps_total = Counter::with_opts(Opts::new(
            "tb_care_sweeps_total",
            "Treatment lapse sweeps attempted",
        ))?;

        let sweep_errors_total = Counter::with_opts(Opts::new(
            "tb_care_sweep_errors_total",
            "Treatment lapse sweeps that failed",
        ))?;

        let patients_reset_total = Counter::with_opts(Opts::new(
            "tb_care_patients_reset_total",
            "Patients whose treatment clock was restarted by a sweep",
        ))?;

        let patient_failures_total = Counter::with_opts(Opts::new(
            "tb_care_patient_failures_total",
            "Per-patient failures isolated during sweeps",
        ))?;

        let last_sweep_evaluated = Gauge::with_opts(Opts::new(
            "tb_care_last_sweep_evaluated",
            "Active patients evaluated by the most recent sweep",
        ))?;

        let last_sweep_resets = Gauge::with_opts(Opts::new(
            "tb_care_last_sweep_resets",
            "Resets performed by the most recent sweep",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "tb_care_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tb_care_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(sweeps_total.clone()))?;
        registry.register(Box::new(sweep_errors_total.clone()))?;
        registry.register(Box::new(patients_reset_total.clone()))?;
        registry.register(Box::new(patient_failures_total.clone()))?;
        registry.register(Box::new(last_sweep_evaluated.clone()))?;
        registry.register(Box::new(last_sweep_resets.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            sweeps_total,
            sweep_errors_total,
            patients_reset_total,
            patient_failures_total,
            last_sweep_evaluated,
            last_sweep_resets,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Record the outcome of one sweep.
    pub fn record_sweep(&self, report: &SweepReport) {
        self.sweeps_total.inc();
        self.patients_reset_total.inc_by(report.reset_count as f64);
        self.patient_failures_total.inc_by(report.failed as f64);
        self.last_sweep_evaluated.set(report.evaluated as f64);
        self.last_sweep_resets.set(report.reset_count as f64);
    }

    /// Record a sweep that failed outright.
    pub fn record_sweep_error(&self) {
        self.sweeps_total.inc();
        self.sweep_errors_total.inc();
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
