//! Treatment monitor - runs the lapse rule against a patient store

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::monitor::{
    clock::Clock,
    config::MonitorConfig,
    error::{MonitorError, StoreError},
    policy::{evaluate_and_reset, TreatmentClock},
    store::{PatientSnapshot, PatientStore},
};

/// Result of one full sweep. A sweep that resets nobody is still a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub message: String,
    pub reset_count: usize,
    /// Active patients looked at.
    pub evaluated: usize,
    /// Patients skipped because a read or write failed.
    pub failed: usize,
    pub reset_patient_ids: Vec<String>,
    pub swept_at: DateTime<Utc>,
}

impl SweepReport {
    /// `true` when every patient was evaluated without a store error.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Result of re-evaluating a single patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub patient_id: String,
    pub under_treatment: bool,
    pub reference_time: Option<DateTime<Utc>>,
    /// The new treatment start date, if the check restarted the clock.
    pub reset_to: Option<DateTime<Utc>>,
}

/// Read-only lapse view of one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LapseStatus {
    pub patient_id: String,
    pub under_treatment: bool,
    pub reference_time: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub lapsed: bool,
    pub checked_at: DateTime<Utc>,
}

pub struct TreatmentMonitor {
    store: Arc<dyn PatientStore + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
    config: MonitorConfig,
    /// Held for the duration of a sweep so two sweeps never interleave.
    sweep_lock: Mutex<()>,
}

impl TreatmentMonitor {
    pub fn new(
        store: Arc<dyn PatientStore + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Evaluate every active patient and restart the clock of each lapsed one.
    ///
    /// Failing to list active patients aborts the sweep. A read or write
    /// failure for one patient is logged and counted in `failed`; the rest
    /// of the batch still runs.
    pub async fn sweep(&self) -> Result<SweepReport, MonitorError> {
        let _guard = self.sweep_lock.lock().await;
        let now = self.clock.now();

        let patients = self.store.active_patients().await.map_err(|source| {
            tracing::error!("Treatment sweep at {} could not list patients: {}", now, source);
            MonitorError::ActivePatients { source }
        })?;

        let evaluated = patients.len();
        let mut reset_patient_ids = Vec::new();
        let mut failed = 0;

        for patient in &patients {
            match self.evaluate(patient, now).await {
                Ok((_, Some(_))) => reset_patient_ids.push(patient.id.clone()),
                Ok((_, None)) => {}
                Err(err) => {
                    failed += 1;
                    tracing::error!(
                        "Treatment sweep at {} failed for patient {}: {}",
                        now,
                        patient.id,
                        err
                    );
                }
            }
        }

        let reset_count = reset_patient_ids.len();
        let message = if reset_count == 0 {
            format!("No lapsed patients among {} active; treatment dates unchanged", evaluated)
        } else {
            format!(
                "Restarted treatment clock for {} of {} active patients",
                reset_count, evaluated
            )
        };

        Ok(SweepReport {
            message,
            reset_count,
            evaluated,
            failed,
            reset_patient_ids,
            swept_at: now,
        })
    }

    /// Latest intake on record for a patient. The log-insert path reads it
    /// before storing a new log and hands it to [`Self::check_patient`].
    pub async fn latest_log_at(
        &self,
        patient_id: &str,
    ) -> Result<Option<DateTime<Utc>>, MonitorError> {
        self.store
            .latest_log_at(patient_id)
            .await
            .map_err(|source| MonitorError::Patient {
                patient_id: patient_id.to_string(),
                source,
            })
    }

    /// Re-evaluate one patient right after a new intake log was stored.
    ///
    /// The lapse is decided on `prior_last_log_at`, the latest intake before
    /// that log. A patient who had already lapsed therefore gets a fresh
    /// clock even though the new log itself is recent.
    pub async fn check_patient(
        &self,
        patient_id: &str,
        prior_last_log_at: Option<DateTime<Utc>>,
    ) -> Result<CheckOutcome, MonitorError> {
        let now = self.clock.now();
        let patient = self.load(patient_id).await?;

        let start = match patient.start_treatment_date {
            Some(start) if patient.is_under_treatment() => start,
            _ => {
                return Ok(CheckOutcome {
                    patient_id: patient.id,
                    under_treatment: false,
                    reference_time: None,
                    reset_to: None,
                })
            }
        };

        let clock = TreatmentClock {
            start_treatment_date: start,
            last_log_at: prior_last_log_at,
        };
        let reset_to = self
            .apply(&patient.id, clock, now)
            .await
            .map_err(|source| MonitorError::Patient {
                patient_id: patient.id.clone(),
                source,
            })?;

        if let Some(at) = reset_to {
            tracing::info!("Patient {} lapsed; treatment clock restarted at {}", patient.id, at);
        }

        Ok(CheckOutcome {
            patient_id: patient.id,
            under_treatment: true,
            reference_time: Some(clock.reference_time()),
            reset_to,
        })
    }

    /// Report whether a patient is currently lapsed without changing anything.
    pub async fn lapse_status(&self, patient_id: &str) -> Result<LapseStatus, MonitorError> {
        let now = self.clock.now();
        let patient = self.load(patient_id).await?;
        let grace = self.config.grace_period;

        let clock = match (patient.is_under_treatment(), patient.start_treatment_date) {
            (true, Some(start)) => {
                let last_log_at = self
                    .store
                    .latest_log_at(&patient.id)
                    .await
                    .map_err(|source| MonitorError::Patient {
                        patient_id: patient.id.clone(),
                        source,
                    })?;
                Some(TreatmentClock {
                    start_treatment_date: start,
                    last_log_at,
                })
            }
            _ => None,
        };

        Ok(LapseStatus {
            patient_id: patient.id,
            under_treatment: clock.is_some(),
            reference_time: clock.map(|c| c.reference_time()),
            deadline: clock.map(|c| c.deadline(grace)),
            lapsed: clock.map(|c| c.is_lapsed(now, grace)).unwrap_or(false),
            checked_at: now,
        })
    }

    /// Manually restart a patient's treatment clock at the current time.
    pub async fn restart_treatment(&self, patient_id: &str) -> Result<DateTime<Utc>, MonitorError> {
        let now = self.clock.now();
        let found = self
            .store
            .restart_treatment(patient_id, now)
            .await
            .map_err(|source| MonitorError::Patient {
                patient_id: patient_id.to_string(),
                source,
            })?;

        if !found {
            return Err(MonitorError::PatientNotFound {
                patient_id: patient_id.to_string(),
            });
        }

        tracing::info!("Treatment clock for patient {} restarted manually at {}", patient_id, now);
        Ok(now)
    }

    async fn load(&self, patient_id: &str) -> Result<PatientSnapshot, MonitorError> {
        self.store
            .patient(patient_id)
            .await
            .map_err(|source| MonitorError::Patient {
                patient_id: patient_id.to_string(),
                source,
            })?
            .ok_or_else(|| MonitorError::PatientNotFound {
                patient_id: patient_id.to_string(),
            })
    }

    /// Apply the lapse rule to one patient, writing the reset if needed.
    /// Returns the clock that was evaluated (if any) and the new start date
    /// when the reset actually landed.
    async fn evaluate(
        &self,
        patient: &PatientSnapshot,
        now: DateTime<Utc>,
    ) -> Result<(Option<TreatmentClock>, Option<DateTime<Utc>>), StoreError> {
        let Some(start) = patient.start_treatment_date else {
            return Ok((None, None));
        };

        let clock = TreatmentClock {
            start_treatment_date: start,
            last_log_at: self.store.latest_log_at(&patient.id).await?,
        };
        let reset_to = self.apply(&patient.id, clock, now).await?;
        Ok((Some(clock), reset_to))
    }

    /// Write the reset for a lapsed clock. Returns the new start date when
    /// the reset actually landed.
    async fn apply(
        &self,
        patient_id: &str,
        clock: TreatmentClock,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(new_start) = evaluate_and_reset(&clock, now, self.config.grace_period) else {
            return Ok(None);
        };

        let changed = self.store.restart_treatment(patient_id, new_start).await?;
        Ok(changed.then_some(new_start))
    }
}
