/// Data models for the clinic scheduling engine.
///
/// This module defines the core data structures used throughout the system:
/// - Patient: registered patient record
/// - Practitioner: treating clinician with a unique license number
/// - Slot: a bookable (date, time, practitioner) unit with an availability flag
/// - Appointment: a scheduled visit carrying a lifecycle state
/// - Invoice: the monetary record tied one-to-one with an appointment
///
/// Entities reference each other by id only; the entity store resolves the
/// references. The appointment state machine lives here as methods on
/// `Appointment`; cross-entity rules (slot reconciliation, overlap checks)
/// belong to the coordinator.
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScheduleError;

/// Minutes a patient may arrive after the scheduled time before the
/// appointment is cancelled automatically. Arriving exactly on the
/// boundary is tolerated.
pub const ARRIVAL_TOLERANCE_MINUTES: i64 = 15;

/// Lifecycle states of an appointment.
///
/// `Pending` is the initial state. `Cancelled`, `Attended`, `Absent`, and
/// `Finalized` are terminal for the standard transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Attended,
    Absent,
    Finalized,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled
                | AppointmentStatus::Attended
                | AppointmentStatus::Absent
                | AppointmentStatus::Finalized
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Attended => "ATTENDED",
            AppointmentStatus::Absent => "ABSENT",
            AppointmentStatus::Finalized => "FINALIZED",
        };
        write!(f, "{}", name)
    }
}

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: u32,
    pub name: String,
    pub phone: String,
    /// Unique business key, compared case-insensitively.
    pub record_number: String,
}

impl Patient {
    /// Create a new patient with validation. The id is assigned by the
    /// entity store.
    pub fn new(
        id: u32,
        name: String,
        phone: String,
        record_number: String,
    ) -> Result<Self, ScheduleError> {
        if name.trim().is_empty() {
            return Err(ScheduleError::InvalidInput(
                "patient name cannot be empty".to_string(),
            ));
        }
        if record_number.trim().is_empty() {
            return Err(ScheduleError::InvalidInput(
                "patient record number cannot be empty".to_string(),
            ));
        }

        Ok(Patient {
            id,
            name,
            phone,
            record_number,
        })
    }
}

/// A treating clinician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: u32,
    pub name: String,
    pub phone: String,
    pub specialty: String,
    /// Unique business key.
    pub license_number: u32,
}

impl Practitioner {
    pub fn new(
        id: u32,
        name: String,
        phone: String,
        specialty: String,
        license_number: u32,
    ) -> Result<Self, ScheduleError> {
        if name.trim().is_empty() {
            return Err(ScheduleError::InvalidInput(
                "practitioner name cannot be empty".to_string(),
            ));
        }

        Ok(Practitioner {
            id,
            name,
            phone,
            specialty,
            license_number,
        })
    }
}

/// A bookable time slot in a practitioner's schedule.
///
/// The natural key is (date, time, practitioner_id); slots always start
/// available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub practitioner_id: u32,
    pub available: bool,
}

impl Slot {
    pub fn new(id: u32, date: NaiveDate, time: NaiveTime, practitioner_id: u32) -> Self {
        Slot {
            id,
            date,
            time,
            practitioner_id,
            available: true,
        }
    }

    /// Check whether the slot lies strictly before today. Same-day slots
    /// are not considered past regardless of time; lateness is handled by
    /// the appointment arrival check instead.
    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.date < today
    }
}

/// A scheduled visit between a patient and a practitioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub motive: String,
    pub status: AppointmentStatus,
    pub arrival_time: Option<NaiveTime>,
    pub patient_id: u32,
    pub practitioner_id: u32,
}

impl Appointment {
    pub fn new(
        id: u32,
        date: NaiveDate,
        time: NaiveTime,
        motive: String,
        patient_id: u32,
        practitioner_id: u32,
    ) -> Self {
        Appointment {
            id,
            date,
            time,
            motive,
            status: AppointmentStatus::Pending,
            arrival_time: None,
            patient_id,
            practitioner_id,
        }
    }

    /// Confirm the appointment. Re-confirming an already-confirmed
    /// appointment is a no-op success; any terminal state fails.
    pub fn confirm(&mut self) -> bool {
        match self.status {
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => {
                self.status = AppointmentStatus::Confirmed;
                true
            }
            _ => false,
        }
    }

    /// Unconditional state set; the coordinator guards terminality and
    /// frees the matching slot.
    pub fn cancel(&mut self) {
        self.status = AppointmentStatus::Cancelled;
    }

    /// Move the appointment to a new date and time.
    ///
    /// Rejected when the appointment is cancelled or finalized, or when the
    /// new date lies strictly before `today`. On success the state resets
    /// to `Pending` and any recorded arrival is cleared.
    pub fn reschedule(
        &mut self,
        new_date: NaiveDate,
        new_time: NaiveTime,
        today: NaiveDate,
    ) -> Result<(), ScheduleError> {
        if matches!(
            self.status,
            AppointmentStatus::Cancelled | AppointmentStatus::Finalized
        ) {
            return Err(ScheduleError::InvalidState(format!(
                "cannot reschedule a {} appointment",
                self.status
            )));
        }
        if new_date < today {
            return Err(ScheduleError::InvalidInput(
                "cannot reschedule to a past date".to_string(),
            ));
        }

        self.date = new_date;
        self.time = new_time;
        self.status = AppointmentStatus::Pending;
        self.arrival_time = None;
        Ok(())
    }

    /// Record the patient's arrival, only meaningful on the appointment
    /// day. Arriving more than `ARRIVAL_TOLERANCE_MINUTES` after the
    /// scheduled time cancels the appointment and reports failure;
    /// arriving exactly on the boundary is tolerated.
    pub fn register_arrival(
        &mut self,
        arrival: NaiveTime,
        today: NaiveDate,
    ) -> Result<(), ScheduleError> {
        if self.status == AppointmentStatus::Cancelled {
            return Err(ScheduleError::InvalidState(
                "cannot register arrival for a cancelled appointment".to_string(),
            ));
        }
        if self.date != today {
            return Err(ScheduleError::InvalidInput(
                "arrival can only be registered on the day of the appointment".to_string(),
            ));
        }

        let late = arrival.signed_duration_since(self.time).num_minutes();
        if late > ARRIVAL_TOLERANCE_MINUTES {
            self.status = AppointmentStatus::Cancelled;
            return Err(ScheduleError::InvalidState(format!(
                "patient arrived {} minutes late; appointment cancelled",
                late
            )));
        }

        self.arrival_time = Some(arrival);
        Ok(())
    }

    /// Evaluate attendance from the recorded arrival: a registered arrival
    /// yields `Attended`, none yields `Absent`. Rejected when the
    /// appointment was already cancelled or evaluated.
    pub fn evaluate_attendance(&mut self) -> Result<AppointmentStatus, ScheduleError> {
        match self.status {
            AppointmentStatus::Cancelled
            | AppointmentStatus::Attended
            | AppointmentStatus::Absent => Err(ScheduleError::InvalidState(format!(
                "cannot evaluate attendance of a {} appointment",
                self.status
            ))),
            _ => {
                self.status = if self.arrival_time.is_some() {
                    AppointmentStatus::Attended
                } else {
                    AppointmentStatus::Absent
                };
                Ok(self.status)
            }
        }
    }

    /// Close out a confirmed appointment. Any other source state fails.
    pub fn finalize(&mut self) -> bool {
        if self.status == AppointmentStatus::Confirmed {
            self.status = AppointmentStatus::Finalized;
            true
        } else {
            false
        }
    }

    /// Signed minutes between the scheduled time and the recorded arrival
    /// (negative when the patient was early); 0 when no arrival is
    /// recorded.
    pub fn minutes_late(&self) -> i64 {
        match self.arrival_time {
            Some(arrival) => arrival.signed_duration_since(self.time).num_minutes(),
            None => 0,
        }
    }

    pub fn is_today(&self, today: NaiveDate) -> bool {
        self.date == today
    }

    pub fn is_past(&self, today: NaiveDate, now: NaiveTime) -> bool {
        self.date < today || (self.date == today && self.time < now)
    }
}

impl fmt::Display for Appointment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Appointment #{} [{} {} - patient {} with practitioner {} - {} - {}]",
            self.id,
            self.date,
            self.time,
            self.patient_id,
            self.practitioner_id,
            self.status,
            self.motive
        )
    }
}

/// The monetary record tied one-to-one with an appointment.
///
/// The patient reference is denormalized from the appointment for display
/// convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: u32,
    pub amount: f64,
    pub appointment_id: u32,
    pub patient_id: u32,
}

impl Invoice {
    pub fn new(
        id: u32,
        amount: f64,
        appointment_id: u32,
        patient_id: u32,
    ) -> Result<Self, ScheduleError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ScheduleError::InvalidInput(
                "invoice amount cannot be negative".to_string(),
            ));
        }

        Ok(Invoice {
            id,
            amount,
            appointment_id,
            patient_id,
        })
    }
}
