//! Treatment-date monitor
//!
//! Detects patients whose medication-adherence reporting has lapsed past
//! the grace period and restarts their treatment clock. The same rule runs
//! from the periodic sweep (see [`crate::scheduler`]) and from the
//! post-insert hook on daily monitoring logs.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod policy;
pub mod store;


pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use engine::{CheckOutcome, LapseStatus, SweepReport, TreatmentMonitor};
pub use error::{MonitorError, StoreError};
pub use memory::InMemoryPatientStore;
pub use policy::{evaluate_and_reset, TreatmentClock};
pub use store::{PatientSnapshot, PatientStore};
