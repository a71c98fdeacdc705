/// In-memory entity store.
///
/// Holds all domain records in id-keyed maps plus one ascending id counter
/// per entity kind. Pure data holder: identity generation and lookup only;
/// use-case rules live in the coordinator and persistence is external.
///
/// Stores are constructed explicitly and passed to the coordinator, so
/// tests can build isolated instances instead of sharing process-wide
/// state.
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Appointment, AppointmentStatus, Invoice, Patient, Practitioner, Slot};

/// The five kinds of records the store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Patient,
    Practitioner,
    Slot,
    Appointment,
    Invoice,
}

/// Next-id counters, persisted alongside the collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub next_patient_id: u32,
    pub next_practitioner_id: u32,
    pub next_slot_id: u32,
    pub next_appointment_id: u32,
    pub next_invoice_id: u32,
}

impl Default for IdCounters {
    fn default() -> Self {
        IdCounters {
            next_patient_id: 1,
            next_practitioner_id: 1,
            next_slot_id: 1,
            next_appointment_id: 1,
            next_invoice_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    pub(crate) patients: HashMap<u32, Patient>,
    pub(crate) practitioners: HashMap<u32, Practitioner>,
    pub(crate) slots: HashMap<u32, Slot>,
    pub(crate) appointments: HashMap<u32, Appointment>,
    pub(crate) invoices: HashMap<u32, Invoice>,
    pub(crate) counters: IdCounters,
}

impl EntityStore {
    pub fn new() -> Self {
        EntityStore::default()
    }

    /// Rebuild a store from persisted collections and counters.
    pub fn from_parts(
        patients: HashMap<u32, Patient>,
        practitioners: HashMap<u32, Practitioner>,
        slots: HashMap<u32, Slot>,
        appointments: HashMap<u32, Appointment>,
        invoices: HashMap<u32, Invoice>,
        counters: IdCounters,
    ) -> Self {
        EntityStore {
            patients,
            practitioners,
            slots,
            appointments,
            invoices,
            counters,
        }
    }

    pub fn counters(&self) -> &IdCounters {
        &self.counters
    }

    /// Hand out the next ascending id for the given kind. Ids are never
    /// reused while the process runs.
    pub fn next_id(&mut self, kind: EntityKind) -> u32 {
        let counter = self.counter_mut(kind);
        let id = *counter;
        *counter += 1;
        id
    }

    /// The id `next_id` would return, without consuming it.
    pub fn peek_next_id(&self, kind: EntityKind) -> u32 {
        match kind {
            EntityKind::Patient => self.counters.next_patient_id,
            EntityKind::Practitioner => self.counters.next_practitioner_id,
            EntityKind::Slot => self.counters.next_slot_id,
            EntityKind::Appointment => self.counters.next_appointment_id,
            EntityKind::Invoice => self.counters.next_invoice_id,
        }
    }

    /// Reset the next-id counter to (max live id + 1), or 1 when the
    /// collection is empty. Required after cascading deletes so freed ids
    /// are not skipped forever, while never colliding with a live id.
    pub fn recompute_next_id(&mut self, kind: EntityKind) {
        let max = match kind {
            EntityKind::Patient => self.patients.keys().max().copied(),
            EntityKind::Practitioner => self.practitioners.keys().max().copied(),
            EntityKind::Slot => self.slots.keys().max().copied(),
            EntityKind::Appointment => self.appointments.keys().max().copied(),
            EntityKind::Invoice => self.invoices.keys().max().copied(),
        };
        *self.counter_mut(kind) = max.map_or(1, |m| m + 1);
    }

    fn counter_mut(&mut self, kind: EntityKind) -> &mut u32 {
        match kind {
            EntityKind::Patient => &mut self.counters.next_patient_id,
            EntityKind::Practitioner => &mut self.counters.next_practitioner_id,
            EntityKind::Slot => &mut self.counters.next_slot_id,
            EntityKind::Appointment => &mut self.counters.next_appointment_id,
            EntityKind::Invoice => &mut self.counters.next_invoice_id,
        }
    }

    // ── Patients ────────────────────────────────────────────────────────

    pub fn patient(&self, id: u32) -> Option<&Patient> {
        self.patients.get(&id)
    }

    pub fn put_patient(&mut self, patient: Patient) {
        self.patients.insert(patient.id, patient);
    }

    pub fn remove_patient(&mut self, id: u32) -> Option<Patient> {
        self.patients.remove(&id)
    }

    /// All patients sorted by id.
    pub fn patients(&self) -> Vec<Patient> {
        let mut patients: Vec<Patient> = self.patients.values().cloned().collect();
        patients.sort_by_key(|p| p.id);
        patients
    }

    // ── Practitioners ───────────────────────────────────────────────────

    pub fn practitioner(&self, id: u32) -> Option<&Practitioner> {
        self.practitioners.get(&id)
    }

    pub fn put_practitioner(&mut self, practitioner: Practitioner) {
        self.practitioners.insert(practitioner.id, practitioner);
    }

    pub fn remove_practitioner(&mut self, id: u32) -> Option<Practitioner> {
        self.practitioners.remove(&id)
    }

    pub fn practitioners(&self) -> Vec<Practitioner> {
        let mut practitioners: Vec<Practitioner> =
            self.practitioners.values().cloned().collect();
        practitioners.sort_by_key(|p| p.id);
        practitioners
    }

    // ── Appointments ────────────────────────────────────────────────────

    pub fn appointment(&self, id: u32) -> Option<&Appointment> {
        self.appointments.get(&id)
    }

    pub fn appointment_mut(&mut self, id: u32) -> Option<&mut Appointment> {
        self.appointments.get_mut(&id)
    }

    pub fn put_appointment(&mut self, appointment: Appointment) {
        self.appointments.insert(appointment.id, appointment);
    }

    pub fn remove_appointment(&mut self, id: u32) -> Option<Appointment> {
        self.appointments.remove(&id)
    }

    /// All appointments sorted by (date, time).
    pub fn appointments(&self) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self.appointments.values().cloned().collect();
        appointments.sort_by_key(|a| (a.date, a.time, a.id));
        appointments
    }

    /// True when a non-cancelled appointment occupies the given
    /// (practitioner, date, time) triple, excluding `except` (used when
    /// rescheduling an appointment against its own old position).
    pub fn triple_occupied(
        &self,
        practitioner_id: u32,
        date: NaiveDate,
        time: NaiveTime,
        except: Option<u32>,
    ) -> bool {
        self.appointments.values().any(|a| {
            Some(a.id) != except
                && a.status != AppointmentStatus::Cancelled
                && a.practitioner_id == practitioner_id
                && a.date == date
                && a.time == time
        })
    }

    /// True when any appointment (whatever its state) references the
    /// patient. Deletion of referenced patients is blocked.
    pub fn patient_has_appointments(&self, patient_id: u32) -> bool {
        self.appointments
            .values()
            .any(|a| a.patient_id == patient_id)
    }

    pub fn practitioner_has_appointments(&self, practitioner_id: u32) -> bool {
        self.appointments
            .values()
            .any(|a| a.practitioner_id == practitioner_id)
    }

    // ── Invoices ────────────────────────────────────────────────────────

    pub fn invoice(&self, id: u32) -> Option<&Invoice> {
        self.invoices.get(&id)
    }

    pub fn put_invoice(&mut self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    pub fn invoice_for_appointment(&self, appointment_id: u32) -> Option<&Invoice> {
        self.invoices
            .values()
            .find(|f| f.appointment_id == appointment_id)
    }

    pub fn invoice_for_appointment_mut(&mut self, appointment_id: u32) -> Option<&mut Invoice> {
        self.invoices
            .values_mut()
            .find(|f| f.appointment_id == appointment_id)
    }

    pub fn remove_invoices_for_appointment(&mut self, appointment_id: u32) -> usize {
        let before = self.invoices.len();
        self.invoices
            .retain(|_, f| f.appointment_id != appointment_id);
        before - self.invoices.len()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self.invoices.values().cloned().collect();
        invoices.sort_by_key(|f| f.id);
        invoices
    }

    // ── Seed dataset ────────────────────────────────────────────────────

    /// Build the first-run dataset: two practitioners with a three-day
    /// slot grid each, two patients, and three appointments with matching
    /// invoices. The grid starts the day after `today`.
    pub fn seed(today: NaiveDate) -> Self {
        let mut store = EntityStore::new();

        let dr_mendez = Practitioner {
            id: store.next_id(EntityKind::Practitioner),
            name: "Dr. Laura Mendez".to_string(),
            phone: "8888-1111".to_string(),
            specialty: "Oral Surgery".to_string(),
            license_number: 5501,
        };
        let dr_khalil = Practitioner {
            id: store.next_id(EntityKind::Practitioner),
            name: "Dr. Omar Khalil".to_string(),
            phone: "8888-2222".to_string(),
            specialty: "Orthodontics".to_string(),
            license_number: 5502,
        };
        store.put_practitioner(dr_mendez.clone());
        store.put_practitioner(dr_khalil.clone());

        let ana = Patient {
            id: store.next_id(EntityKind::Patient),
            name: "Ana Torres".to_string(),
            phone: "7777-0001".to_string(),
            record_number: "EXP-001".to_string(),
        };
        let luis = Patient {
            id: store.next_id(EntityKind::Patient),
            name: "Luis Romero".to_string(),
            phone: "7777-0002".to_string(),
            record_number: "EXP-002".to_string(),
        };
        store.put_patient(ana.clone());
        store.put_patient(luis.clone());

        let t = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();

        // Three days of slots per practitioner, morning and afternoon.
        for day in 1..=3 {
            let date = today + Duration::days(day);
            for hm in [(9, 0), (10, 0), (11, 0), (14, 0), (15, 0), (16, 0)] {
                store.create_slot(date, t(hm.0, hm.1), dr_mendez.id);
            }
            for hm in [(8, 0), (9, 30), (11, 0), (13, 0), (14, 30), (16, 0)] {
                store.create_slot(date, t(hm.0, hm.1), dr_khalil.id);
            }
        }

        let seeds = [
            (
                ana.id,
                dr_mendez.id,
                today + Duration::days(1),
                t(9, 0),
                "Deep cleaning",
                AppointmentStatus::Pending,
                150.0,
            ),
            (
                luis.id,
                dr_mendez.id,
                today + Duration::days(1),
                t(10, 0),
                "Toothache",
                AppointmentStatus::Confirmed,
                200.0,
            ),
            (
                ana.id,
                dr_khalil.id,
                today + Duration::days(2),
                t(14, 30),
                "Braces adjustment",
                AppointmentStatus::Pending,
                300.0,
            ),
        ];

        for (patient_id, practitioner_id, date, time, motive, status, amount) in seeds {
            let appointment_id = store.next_id(EntityKind::Appointment);
            let mut appointment = Appointment::new(
                appointment_id,
                date,
                time,
                motive.to_string(),
                patient_id,
                practitioner_id,
            );
            appointment.status = status;
            store.put_appointment(appointment);

            if let Some(slot_id) = store
                .find_slot(date, time, practitioner_id)
                .map(|s| s.id)
            {
                store.mark_slot_taken(slot_id);
            }

            let invoice = Invoice {
                id: store.next_id(EntityKind::Invoice),
                amount,
                appointment_id,
                patient_id,
            };
            store.put_invoice(invoice);
        }

        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ids_are_ascending_and_independent_per_kind() {
        let mut store = EntityStore::new();
        assert_eq!(store.next_id(EntityKind::Appointment), 1);
        assert_eq!(store.next_id(EntityKind::Appointment), 2);
        assert_eq!(store.next_id(EntityKind::Invoice), 1);
        assert_eq!(store.next_id(EntityKind::Patient), 1);
        assert_eq!(store.peek_next_id(EntityKind::Appointment), 3);
    }

    #[test]
    fn recompute_resets_to_one_when_empty() {
        let mut store = EntityStore::new();
        store.next_id(EntityKind::Appointment);
        store.next_id(EntityKind::Appointment);
        store.recompute_next_id(EntityKind::Appointment);
        assert_eq!(store.peek_next_id(EntityKind::Appointment), 1);
    }

    #[test]
    fn recompute_follows_max_live_id() {
        let mut store = EntityStore::new();
        let t = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        for _ in 0..3 {
            let id = store.next_id(EntityKind::Appointment);
            store.put_appointment(Appointment::new(
                id,
                date(2026, 9, 1),
                t,
                "x".to_string(),
                1,
                1,
            ));
        }

        // removing a middle id leaves the counter past the live maximum
        store.remove_appointment(2);
        store.recompute_next_id(EntityKind::Appointment);
        assert_eq!(store.peek_next_id(EntityKind::Appointment), 4);

        // removing the maximum pulls the counter back down
        store.remove_appointment(3);
        store.recompute_next_id(EntityKind::Appointment);
        assert_eq!(store.peek_next_id(EntityKind::Appointment), 2);
    }

    #[test]
    fn triple_occupied_ignores_cancelled_and_except() {
        let mut store = EntityStore::new();
        let t = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let d = date(2026, 9, 1);
        let mut a = Appointment::new(1, d, t, "x".to_string(), 1, 7);
        store.put_appointment(a.clone());

        assert!(store.triple_occupied(7, d, t, None));
        assert!(!store.triple_occupied(7, d, t, Some(1)));
        assert!(!store.triple_occupied(8, d, t, None));

        a.cancel();
        store.put_appointment(a);
        assert!(!store.triple_occupied(7, d, t, None));
    }

    #[test]
    fn seed_builds_consistent_dataset() {
        let today = date(2026, 8, 28);
        let store = EntityStore::seed(today);

        assert_eq!(store.practitioners().len(), 2);
        assert_eq!(store.patients().len(), 2);
        assert_eq!(store.slots.len(), 36);
        assert_eq!(store.appointments().len(), 3);
        assert_eq!(store.invoices().len(), 3);

        // every seed appointment has an invoice and a taken slot
        for apt in store.appointments() {
            let invoice = store.invoice_for_appointment(apt.id).unwrap();
            assert_eq!(invoice.patient_id, apt.patient_id);
            let slot = store
                .find_slot(apt.date, apt.time, apt.practitioner_id)
                .unwrap();
            assert!(!slot.available);
        }

        // counters point past the seeded ids
        assert_eq!(store.peek_next_id(EntityKind::Appointment), 4);
        assert_eq!(store.peek_next_id(EntityKind::Invoice), 4);
        assert_eq!(store.peek_next_id(EntityKind::Slot), 37);
    }
}
