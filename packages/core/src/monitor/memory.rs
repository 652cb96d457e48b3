//! In-memory [`PatientStore`] used by tests and local experiments.
//!
//! Failures can be injected per operation to exercise the monitor's error
//! isolation without a database.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::monitor::error::StoreError;
use crate::monitor::store::{PatientSnapshot, PatientStore};

#[derive(Debug, Default)]
struct State {
    patients: BTreeMap<String, PatientSnapshot>,
    logs: BTreeMap<String, Vec<DateTime<Utc>>>,
    fail_listing: bool,
    fail_reads: HashSet<String>,
    fail_writes: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    state: Mutex<State>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(
        self,
        id: &str,
        status: &str,
        start_treatment_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.insert_patient(id, status, start_treatment_date);
        self
    }

    pub fn with_log(self, patient_id: &str, taken_at: DateTime<Utc>) -> Self {
        self.add_log(patient_id, taken_at);
        self
    }

    /// Make `active_patients` fail.
    pub fn failing_listing(self) -> Self {
        self.lock().fail_listing = true;
        self
    }

    /// Make `latest_log_at` fail for one patient.
    pub fn failing_reads_for(self, patient_id: &str) -> Self {
        self.lock().fail_reads.insert(patient_id.to_string());
        self
    }

    /// Make `restart_treatment` fail for one patient.
    pub fn failing_writes_for(self, patient_id: &str) -> Self {
        self.lock().fail_writes.insert(patient_id.to_string());
        self
    }

    pub fn insert_patient(
        &self,
        id: &str,
        status: &str,
        start_treatment_date: Option<DateTime<Utc>>,
    ) {
        self.lock().patients.insert(
            id.to_string(),
            PatientSnapshot {
                id: id.to_string(),
                status: status.to_string(),
                start_treatment_date,
            },
        );
    }

    pub fn add_log(&self, patient_id: &str, taken_at: DateTime<Utc>) {
        self.lock()
            .logs
            .entry(patient_id.to_string())
            .or_default()
            .push(taken_at);
    }

    pub fn start_treatment_date(&self, patient_id: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .patients
            .get(patient_id)
            .and_then(|p| p.start_treatment_date)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn active_patients(&self) -> Result<Vec<PatientSnapshot>, StoreError> {
        let state = self.lock();
        if state.fail_listing {
            return Err(StoreError::unavailable("listing disabled"));
        }
        Ok(state
            .patients
            .values()
            .filter(|p| p.is_under_treatment())
            .cloned()
            .collect())
    }

    async fn patient(&self, patient_id: &str) -> Result<Option<PatientSnapshot>, StoreError> {
        Ok(self.lock().patients.get(patient_id).cloned())
    }

    async fn latest_log_at(
        &self,
        patient_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.lock();
        if state.fail_reads.contains(patient_id) {
            return Err(StoreError::unavailable(format!("reads disabled for {}", patient_id)));
        }
        Ok(state
            .logs
            .get(patient_id)
            .and_then(|logs| logs.iter().max().copied()))
    }

    async fn restart_treatment(
        &self,
        patient_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if state.fail_writes.contains(patient_id) {
            return Err(StoreError::unavailable(format!("writes disabled for {}", patient_id)));
        }
        match state.patients.get_mut(patient_id) {
            Some(patient) => {
                patient.start_treatment_date = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
