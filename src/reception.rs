/// Scheduling coordinator: the reception role.
///
/// Combines the entity store, slot management, and the appointment state
/// machine into use-cases: book, cancel, reschedule, confirm, finalize,
/// arrival check-in, attendance evaluation, purge, availability queries,
/// and status reporting. Booking also creates the linked invoice.
///
/// The store sits behind a single `RwLock`: mutating use-cases take the
/// write lock so multi-step slot/appointment/invoice updates appear
/// atomic; read-only queries share the read lock. Every successful
/// mutation is flushed to storage; a failed flush is logged and surfaced
/// through the log stream, never rolled back.
use chrono::{Local, NaiveDate, NaiveTime};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

use crate::error::{ScheduleError, StorageError};
use crate::models::{
    Appointment, AppointmentStatus, Invoice, Patient, Practitioner, Slot,
};
use crate::persistence::Storage;
use crate::store::{EntityKind, EntityStore};

/// How the booking's date and time are sourced: an explicit (date, time)
/// pair, or an existing available slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingSchedule {
    At { date: NaiveDate, time: NaiveTime },
    FromSlot { slot_id: u32 },
}

/// A booking request. One request type covers both booking variants;
/// `motive` defaults to a general consultation and `amount` to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub patient_id: u32,
    pub practitioner_id: u32,
    pub schedule: BookingSchedule,
    pub motive: Option<String>,
    pub amount: Option<f64>,
}

/// Appointment counts per state, computed by scanning the live set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub attended: usize,
    pub absent: usize,
    pub finalized: usize,
    pub total: usize,
}

pub struct Reception {
    store: RwLock<EntityStore>,
    storage: Storage,
}

impl Reception {
    /// Open the reception over persisted state, seeding and flushing a
    /// first-run dataset when none exists.
    pub fn open(storage: Storage) -> Result<Self, StorageError> {
        let store = match storage.load_all()? {
            Some(store) => {
                info!(
                    patients = store.patients().len(),
                    practitioners = store.practitioners().len(),
                    appointments = store.appointments().len(),
                    "loaded saved data"
                );
                store
            }
            None => {
                info!("no saved data found; generating seed dataset");
                let store = EntityStore::seed(Local::now().date_naive());
                storage.save_all(&store)?;
                store
            }
        };
        Ok(Reception {
            store: RwLock::new(store),
            storage,
        })
    }

    /// Wrap an explicitly constructed store. Used by tests to run against
    /// isolated fixtures.
    pub fn with_store(store: EntityStore, storage: Storage) -> Self {
        Reception {
            store: RwLock::new(store),
            storage,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, EntityStore> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityStore> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Best-effort flush after a successful mutation. The in-memory state
    /// has already changed, so failure is logged rather than unwound.
    fn persist(&self, store: &EntityStore) {
        if let Err(e) = self.storage.save_all(store) {
            error!(error = %e, "failed to persist data after mutation");
        }
    }

    // ── Booking ─────────────────────────────────────────────────────────

    /// Book an appointment for a patient with a practitioner, creating the
    /// linked invoice. The slot matching the booked (date, time,
    /// practitioner) is marked taken.
    pub fn book(&self, request: BookingRequest) -> Result<Appointment, ScheduleError> {
        let today = Local::now().date_naive();
        let mut store = self.write();

        if store.patient(request.patient_id).is_none() {
            return Err(ScheduleError::not_found("patient", request.patient_id));
        }
        if store.practitioner(request.practitioner_id).is_none() {
            return Err(ScheduleError::not_found(
                "practitioner",
                request.practitioner_id,
            ));
        }

        let (date, time) = match request.schedule {
            BookingSchedule::At { date, time } => (date, time),
            BookingSchedule::FromSlot { slot_id } => {
                let slot = store
                    .slot(slot_id)
                    .ok_or(ScheduleError::not_found("slot", slot_id))?;
                if slot.practitioner_id != request.practitioner_id {
                    return Err(ScheduleError::InvalidInput(
                        "slot belongs to a different practitioner".to_string(),
                    ));
                }
                if !slot.available {
                    return Err(ScheduleError::Conflict(format!(
                        "slot {} is already taken",
                        slot_id
                    )));
                }
                (slot.date, slot.time)
            }
        };

        // Shared validations for both variants; nothing is mutated until
        // every check has passed.
        if date < today {
            return Err(ScheduleError::InvalidInput(
                "cannot book an appointment in the past".to_string(),
            ));
        }
        if store.triple_occupied(request.practitioner_id, date, time, None) {
            return Err(ScheduleError::Conflict(format!(
                "practitioner {} already has an appointment on {} at {}",
                request.practitioner_id, date, time
            )));
        }
        let amount = request.amount.unwrap_or(0.0);
        if !amount.is_finite() || amount < 0.0 {
            return Err(ScheduleError::InvalidInput(
                "invoice amount cannot be negative".to_string(),
            ));
        }

        let motive = request
            .motive
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "General consultation".to_string());

        let appointment_id = store.next_id(EntityKind::Appointment);
        let appointment = Appointment::new(
            appointment_id,
            date,
            time,
            motive,
            request.patient_id,
            request.practitioner_id,
        );
        store.put_appointment(appointment.clone());

        if let Some(slot_id) = store
            .find_slot(date, time, request.practitioner_id)
            .map(|s| s.id)
        {
            store.mark_slot_taken(slot_id);
        }

        let invoice_id = store.next_id(EntityKind::Invoice);
        let invoice = Invoice::new(invoice_id, amount, appointment_id, request.patient_id)?;
        store.put_invoice(invoice);

        info!(
            appointment = appointment_id,
            patient = request.patient_id,
            practitioner = request.practitioner_id,
            %date,
            %time,
            "appointment booked"
        );
        self.persist(&store);
        Ok(appointment)
    }

    // ── Lifecycle use-cases ─────────────────────────────────────────────

    /// Cancel an appointment and free its matching slot. Terminal
    /// appointments (already cancelled, attended, absent, or finalized)
    /// are rejected.
    pub fn cancel(&self, appointment_id: u32) -> Result<(), ScheduleError> {
        let mut store = self.write();
        let appointment = store
            .appointment_mut(appointment_id)
            .ok_or(ScheduleError::not_found("appointment", appointment_id))?;

        if appointment.status.is_terminal() {
            return Err(ScheduleError::InvalidState(format!(
                "cannot cancel a {} appointment",
                appointment.status
            )));
        }

        appointment.cancel();
        let (date, time, practitioner_id) = (
            appointment.date,
            appointment.time,
            appointment.practitioner_id,
        );

        if let Some(slot_id) = store.find_slot(date, time, practitioner_id).map(|s| s.id) {
            store.mark_slot_available(slot_id);
        }

        info!(appointment = appointment_id, "appointment cancelled");
        self.persist(&store);
        Ok(())
    }

    /// Reschedule to a new date and time. On top of the state-machine
    /// rules, the target must be free among the practitioner's other
    /// non-cancelled appointments. The old slot is freed and the new one
    /// taken.
    pub fn reschedule(
        &self,
        appointment_id: u32,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> Result<(), ScheduleError> {
        let today = Local::now().date_naive();
        let mut store = self.write();

        let (old_date, old_time, practitioner_id) = {
            let appointment = store
                .appointment(appointment_id)
                .ok_or(ScheduleError::not_found("appointment", appointment_id))?;
            (
                appointment.date,
                appointment.time,
                appointment.practitioner_id,
            )
        };

        if store.triple_occupied(practitioner_id, new_date, new_time, Some(appointment_id)) {
            return Err(ScheduleError::Conflict(format!(
                "practitioner {} already has an appointment on {} at {}",
                practitioner_id, new_date, new_time
            )));
        }

        let Some(appointment) = store.appointment_mut(appointment_id) else {
            return Err(ScheduleError::not_found("appointment", appointment_id));
        };
        appointment.reschedule(new_date, new_time, today)?;

        let old_slot = store.find_slot(old_date, old_time, practitioner_id).map(|s| s.id);
        if let Some(slot_id) = old_slot {
            store.mark_slot_available(slot_id);
        }
        let new_slot = store.find_slot(new_date, new_time, practitioner_id).map(|s| s.id);
        if let Some(slot_id) = new_slot {
            store.mark_slot_taken(slot_id);
        }

        info!(
            appointment = appointment_id,
            %new_date,
            %new_time,
            "appointment rescheduled"
        );
        self.persist(&store);
        Ok(())
    }

    pub fn confirm(&self, appointment_id: u32) -> Result<(), ScheduleError> {
        let mut store = self.write();
        let appointment = store
            .appointment_mut(appointment_id)
            .ok_or(ScheduleError::not_found("appointment", appointment_id))?;

        if !appointment.confirm() {
            return Err(ScheduleError::InvalidState(format!(
                "cannot confirm a {} appointment",
                appointment.status
            )));
        }

        info!(appointment = appointment_id, "appointment confirmed");
        self.persist(&store);
        Ok(())
    }

    pub fn finalize(&self, appointment_id: u32) -> Result<(), ScheduleError> {
        let mut store = self.write();
        let appointment = store
            .appointment_mut(appointment_id)
            .ok_or(ScheduleError::not_found("appointment", appointment_id))?;

        if !appointment.finalize() {
            return Err(ScheduleError::InvalidState(format!(
                "only confirmed appointments can be finalized (current state: {})",
                appointment.status
            )));
        }

        info!(appointment = appointment_id, "appointment finalized");
        self.persist(&store);
        Ok(())
    }

    /// Record the patient's arrival, defaulting to the current wall-clock
    /// time. An arrival beyond the tolerance auto-cancels the appointment,
    /// frees its slot, and reports the failure.
    pub fn register_arrival(
        &self,
        appointment_id: u32,
        arrival: Option<NaiveTime>,
    ) -> Result<(), ScheduleError> {
        let now = Local::now();
        let today = now.date_naive();
        let arrival = arrival.unwrap_or_else(|| now.time());

        let mut store = self.write();
        let appointment = store
            .appointment_mut(appointment_id)
            .ok_or(ScheduleError::not_found("appointment", appointment_id))?;

        let was_cancelled = appointment.status == AppointmentStatus::Cancelled;
        let result = appointment.register_arrival(arrival, today);
        let auto_cancelled =
            !was_cancelled && appointment.status == AppointmentStatus::Cancelled;
        let (date, time, practitioner_id) = (
            appointment.date,
            appointment.time,
            appointment.practitioner_id,
        );

        match &result {
            Ok(()) => {
                info!(appointment = appointment_id, %arrival, "arrival registered");
                self.persist(&store);
            }
            Err(e) if auto_cancelled => {
                warn!(appointment = appointment_id, %arrival, error = %e, "late arrival");
                if let Some(slot_id) =
                    store.find_slot(date, time, practitioner_id).map(|s| s.id)
                {
                    store.mark_slot_available(slot_id);
                }
                self.persist(&store);
            }
            Err(_) => {}
        }
        result
    }

    /// Settle the appointment as attended or absent based on the recorded
    /// arrival.
    pub fn evaluate_attendance(
        &self,
        appointment_id: u32,
    ) -> Result<AppointmentStatus, ScheduleError> {
        let mut store = self.write();
        let appointment = store
            .appointment_mut(appointment_id)
            .ok_or(ScheduleError::not_found("appointment", appointment_id))?;

        let outcome = appointment.evaluate_attendance()?;
        info!(appointment = appointment_id, %outcome, "attendance evaluated");
        self.persist(&store);
        Ok(outcome)
    }

    /// Hard-delete an appointment together with its invoice and slot
    /// reservation, then recompute the appointment id counter so the id
    /// space stays dense after deletions.
    pub fn purge(&self, appointment_id: u32) -> Result<(), ScheduleError> {
        let mut store = self.write();
        let appointment = store
            .remove_appointment(appointment_id)
            .ok_or(ScheduleError::not_found("appointment", appointment_id))?;

        store.remove_invoices_for_appointment(appointment_id);
        // A cancelled appointment's old triple may have been rebooked since;
        // only free the slot when no live appointment still occupies it.
        if !store.triple_occupied(
            appointment.practitioner_id,
            appointment.date,
            appointment.time,
            None,
        ) {
            if let Some(slot_id) = store
                .find_slot(
                    appointment.date,
                    appointment.time,
                    appointment.practitioner_id,
                )
                .map(|s| s.id)
            {
                store.mark_slot_available(slot_id);
            }
        }
        store.recompute_next_id(EntityKind::Appointment);

        info!(appointment = appointment_id, "appointment purged");
        self.persist(&store);
        Ok(())
    }

    /// Publish a new bookable slot for a practitioner. The (date, time,
    /// practitioner) triple must not already have a slot.
    pub fn publish_slot(
        &self,
        practitioner_id: u32,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<u32, ScheduleError> {
        let today = Local::now().date_naive();
        let mut store = self.write();

        if store.practitioner(practitioner_id).is_none() {
            return Err(ScheduleError::not_found("practitioner", practitioner_id));
        }
        if date < today {
            return Err(ScheduleError::InvalidInput(
                "cannot publish a slot in the past".to_string(),
            ));
        }
        if store.find_slot(date, time, practitioner_id).is_some() {
            return Err(ScheduleError::Conflict(format!(
                "a slot already exists on {} at {} for practitioner {}",
                date, time, practitioner_id
            )));
        }

        let slot_id = store.create_slot(date, time, practitioner_id);
        info!(slot = slot_id, practitioner = practitioner_id, %date, %time, "slot published");
        self.persist(&store);
        Ok(slot_id)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Available, non-past slots for a practitioner, optionally restricted
    /// to one date, ordered by date then time.
    pub fn available_slots(
        &self,
        practitioner_id: u32,
        on: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let today = Local::now().date_naive();
        let store = self.read();
        if store.practitioner(practitioner_id).is_none() {
            return Err(ScheduleError::not_found("practitioner", practitioner_id));
        }
        Ok(store.available_slots(practitioner_id, on, today))
    }

    /// Per-state appointment counts plus total, scanned from the live set.
    pub fn report(&self) -> StatusReport {
        let store = self.read();
        let mut report = StatusReport::default();
        for appointment in store.appointments.values() {
            match appointment.status {
                AppointmentStatus::Pending => report.pending += 1,
                AppointmentStatus::Confirmed => report.confirmed += 1,
                AppointmentStatus::Cancelled => report.cancelled += 1,
                AppointmentStatus::Attended => report.attended += 1,
                AppointmentStatus::Absent => report.absent += 1,
                AppointmentStatus::Finalized => report.finalized += 1,
            }
            report.total += 1;
        }
        report
    }

    /// Pending, non-past appointments awaiting confirmation, ordered by
    /// date then time.
    pub fn pending_confirmations(&self) -> Vec<Appointment> {
        let today = Local::now().date_naive();
        let store = self.read();
        let mut pending: Vec<Appointment> = store
            .appointments
            .values()
            .filter(|a| a.status == AppointmentStatus::Pending)
            .filter(|a| a.date >= today)
            .cloned()
            .collect();
        pending.sort_by_key(|a| (a.date, a.time));
        pending
    }

    /// All appointments ordered by date then time.
    pub fn appointments(&self) -> Vec<Appointment> {
        self.read().appointments()
    }

    pub fn appointment(&self, appointment_id: u32) -> Option<Appointment> {
        self.read().appointment(appointment_id).cloned()
    }

    pub fn patients(&self) -> Vec<Patient> {
        self.read().patients()
    }

    pub fn practitioners(&self) -> Vec<Practitioner> {
        self.read().practitioners()
    }

    // ── Invoices ────────────────────────────────────────────────────────

    pub fn invoice_for(&self, appointment_id: u32) -> Option<Invoice> {
        self.read().invoice_for_appointment(appointment_id).cloned()
    }

    /// Update the amount on the invoice tied to an appointment. Negative
    /// amounts are rejected here even though callers validate upstream.
    pub fn set_invoice_amount(
        &self,
        appointment_id: u32,
        amount: f64,
    ) -> Result<(), ScheduleError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ScheduleError::InvalidInput(
                "invoice amount cannot be negative".to_string(),
            ));
        }

        let mut store = self.write();
        let invoice = store
            .invoice_for_appointment_mut(appointment_id)
            .ok_or(ScheduleError::not_found("invoice for appointment", appointment_id))?;
        invoice.amount = amount;

        info!(appointment = appointment_id, amount, "invoice amount updated");
        self.persist(&store);
        Ok(())
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// Register a patient; the record number must be unique
    /// (case-insensitive).
    pub fn register_patient(
        &self,
        name: String,
        phone: String,
        record_number: String,
    ) -> Result<Patient, ScheduleError> {
        let mut store = self.write();
        if record_number_in_use(&store, &record_number, None) {
            return Err(ScheduleError::Conflict(format!(
                "record number {} is already in use",
                record_number
            )));
        }

        let id = store.next_id(EntityKind::Patient);
        let patient = Patient::new(id, name, phone, record_number)?;
        store.put_patient(patient.clone());

        info!(patient = id, "patient registered");
        self.persist(&store);
        Ok(patient)
    }

    pub fn update_patient(
        &self,
        id: u32,
        name: String,
        phone: String,
        record_number: String,
    ) -> Result<(), ScheduleError> {
        let mut store = self.write();
        if store.patient(id).is_none() {
            return Err(ScheduleError::not_found("patient", id));
        }
        if record_number_in_use(&store, &record_number, Some(id)) {
            return Err(ScheduleError::Conflict(format!(
                "record number {} is already in use",
                record_number
            )));
        }

        let patient = Patient::new(id, name, phone, record_number)?;
        store.put_patient(patient);

        self.persist(&store);
        Ok(())
    }

    /// Remove a patient. Blocked while any appointment references them.
    pub fn remove_patient(&self, id: u32) -> Result<(), ScheduleError> {
        let mut store = self.write();
        if store.patient(id).is_none() {
            return Err(ScheduleError::not_found("patient", id));
        }
        if store.patient_has_appointments(id) {
            return Err(ScheduleError::InvalidState(
                "patient has appointments and cannot be removed".to_string(),
            ));
        }

        store.remove_patient(id);
        info!(patient = id, "patient removed");
        self.persist(&store);
        Ok(())
    }

    /// Register a practitioner; the license number must be unique.
    pub fn register_practitioner(
        &self,
        name: String,
        phone: String,
        specialty: String,
        license_number: u32,
    ) -> Result<Practitioner, ScheduleError> {
        let mut store = self.write();
        if license_number_in_use(&store, license_number, None) {
            return Err(ScheduleError::Conflict(format!(
                "license number {} is already registered",
                license_number
            )));
        }

        let id = store.next_id(EntityKind::Practitioner);
        let practitioner = Practitioner::new(id, name, phone, specialty, license_number)?;
        store.put_practitioner(practitioner.clone());

        info!(practitioner = id, "practitioner registered");
        self.persist(&store);
        Ok(practitioner)
    }

    pub fn update_practitioner(
        &self,
        id: u32,
        name: String,
        phone: String,
        specialty: String,
        license_number: u32,
    ) -> Result<(), ScheduleError> {
        let mut store = self.write();
        if store.practitioner(id).is_none() {
            return Err(ScheduleError::not_found("practitioner", id));
        }
        if license_number_in_use(&store, license_number, Some(id)) {
            return Err(ScheduleError::Conflict(format!(
                "license number {} is already registered",
                license_number
            )));
        }

        let practitioner = Practitioner::new(id, name, phone, specialty, license_number)?;
        store.put_practitioner(practitioner);

        self.persist(&store);
        Ok(())
    }

    /// Remove a practitioner and their slots. Blocked while any
    /// appointment references them.
    pub fn remove_practitioner(&self, id: u32) -> Result<(), ScheduleError> {
        let mut store = self.write();
        if store.practitioner(id).is_none() {
            return Err(ScheduleError::not_found("practitioner", id));
        }
        if store.practitioner_has_appointments(id) {
            return Err(ScheduleError::InvalidState(
                "practitioner has appointments and cannot be removed".to_string(),
            ));
        }

        let removed_slots = store.remove_slots_of_practitioner(id);
        store.remove_practitioner(id);

        info!(practitioner = id, removed_slots, "practitioner removed");
        self.persist(&store);
        Ok(())
    }

    // ── Synchronization ─────────────────────────────────────────────────

    /// Re-read the persisted form, replacing the in-memory store. Used to
    /// resynchronize with externally changed files; a no-op when nothing
    /// is persisted.
    pub fn reload(&self) -> Result<(), StorageError> {
        if let Some(fresh) = self.storage.load_all()? {
            let mut store = self.write();
            *store = fresh;
            info!("store reloaded from disk");
        }
        Ok(())
    }
}

fn record_number_in_use(store: &EntityStore, record_number: &str, except: Option<u32>) -> bool {
    store.patients.values().any(|p| {
        Some(p.id) != except && p.record_number.eq_ignore_ascii_case(record_number)
    })
}

fn license_number_in_use(store: &EntityStore, license_number: u32, except: Option<u32>) -> bool {
    store
        .practitioners
        .values()
        .any(|p| Some(p.id) != except && p.license_number == license_number)
}
