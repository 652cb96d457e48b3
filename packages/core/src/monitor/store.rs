//! Patient store interface
//!
//! The monitor only needs four things from storage. Keeping them behind a
//! trait lets the policy run against SQLite in production and an in-memory
//! store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{is_active_status, Patient};
use crate::monitor::error::StoreError;
use crate::repository::TbRepository;

/// The slice of a patient record the monitor reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientSnapshot {
    pub id: String,
    pub status: String,
    pub start_treatment_date: Option<DateTime<Utc>>,
}

impl PatientSnapshot {
    pub fn is_under_treatment(&self) -> bool {
        is_active_status(&self.status) && self.start_treatment_date.is_some()
    }
}

impl From<Patient> for PatientSnapshot {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            status: patient.status,
            start_treatment_date: patient.start_treatment_date,
        }
    }
}

#[async_trait]
pub trait PatientStore {
    /// Every patient under active treatment.
    async fn active_patients(&self) -> Result<Vec<PatientSnapshot>, StoreError>;

    async fn patient(&self, patient_id: &str) -> Result<Option<PatientSnapshot>, StoreError>;

    /// Intake time of the patient's most recent daily monitoring log.
    async fn latest_log_at(&self, patient_id: &str)
        -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Set `start_treatment_date = at`. Returns `false` if the patient no
    /// longer exists.
    async fn restart_treatment(&self, patient_id: &str, at: DateTime<Utc>)
        -> Result<bool, StoreError>;
}

#[async_trait]
impl PatientStore for TbRepository {
    async fn active_patients(&self) -> Result<Vec<PatientSnapshot>, StoreError> {
        let patients = self.list_active_patients().await?;
        Ok(patients.into_iter().map(PatientSnapshot::from).collect())
    }

    async fn patient(&self, patient_id: &str) -> Result<Option<PatientSnapshot>, StoreError> {
        Ok(self.find_patient(patient_id).await?.map(PatientSnapshot::from))
    }

    async fn latest_log_at(
        &self,
        patient_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(TbRepository::latest_log_at(self, patient_id).await?)
    }

    async fn restart_treatment(
        &self,
        patient_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.set_start_treatment_date(patient_id, at).await?)
    }
}
