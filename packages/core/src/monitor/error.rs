//! Error types for the treatment-date monitor

use thiserror::Error;

/// Errors raised by a [`PatientStore`](super::PatientStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }
}

/// Errors that abort a monitor operation as a whole.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to load active patients: {source}")]
    ActivePatients { source: StoreError },

    #[error("Patient not found: {patient_id}")]
    PatientNotFound { patient_id: String },

    #[error("Store error for patient {patient_id}: {source}")]
    Patient {
        patient_id: String,
        source: StoreError,
    },
}
