//! Clinic appointment scheduling and lifecycle engine.
//!
//! Patients book appointments with practitioners against a grid of
//! published time slots. Appointments move through a small state machine
//! (pending, confirmed, cancelled, attended, absent, finalized) driven by
//! reception use-cases, and every booking carries a linked invoice. All
//! state lives in an in-memory entity store flushed to JSON files after
//! each successful mutation.

pub mod error;
pub mod models;
pub mod persistence;
pub mod reception;
pub mod slots;
pub mod store;

pub use error::{ScheduleError, StorageError};
pub use models::{
    Appointment, AppointmentStatus, Invoice, Patient, Practitioner, Slot,
    ARRIVAL_TOLERANCE_MINUTES,
};
pub use persistence::Storage;
pub use reception::{BookingRequest, BookingSchedule, Reception, StatusReport};
pub use store::{EntityKind, EntityStore};
