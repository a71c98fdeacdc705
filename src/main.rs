/// Command-line interface for the clinic scheduling engine.
///
/// An interactive menu over the reception use-cases: booking, lifecycle
/// transitions, availability queries, invoices, and the patient and
/// practitioner registries. State is persisted to JSON files under the
/// data directory after every successful change.
use chrono::{NaiveDate, NaiveTime};
use std::io::{self, Write};

use clinidesk::{
    BookingRequest, BookingSchedule, Reception, ScheduleError, Storage, StorageError,
};

const DATA_DIR: &str = "data";

struct ClinicCli {
    reception: Reception,
    running: bool,
}

impl ClinicCli {
    fn open() -> Result<Self, StorageError> {
        let reception = Reception::open(Storage::new(DATA_DIR))?;
        Ok(ClinicCli {
            reception,
            running: true,
        })
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       CLINIC APPOINTMENT DESK");
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!(" 1. Book appointment");
        println!(" 2. View appointments");
        println!(" 3. Confirm appointment");
        println!(" 4. Cancel appointment");
        println!(" 5. Reschedule appointment");
        println!(" 6. Register patient arrival");
        println!(" 7. Evaluate attendance");
        println!(" 8. Finalize appointment");
        println!(" 9. View available slots");
        println!("10. Pending confirmations");
        println!("11. Status report");
        println!("12. Invoices");
        println!("13. Patients");
        println!("14. Practitioners");
        println!("15. Delete appointment record");
        println!("16. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&self, prompt: &str, default: Option<&str>) -> String {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return default.unwrap_or("").to_string();
        }
        let input = input.trim();

        if input.is_empty() {
            default.unwrap_or("").to_string()
        } else {
            input.to_string()
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<u32>) -> u32 {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref());

            if let Ok(value) = input.parse::<u32>() {
                return value;
            }
            println!("Please enter a valid number");
        }
    }

    fn get_date_input(&self, prompt: &str) -> NaiveDate {
        loop {
            let input = self.get_input(&format!("{} (YYYY-MM-DD)", prompt), None);
            if let Ok(date) = NaiveDate::parse_from_str(&input, "%Y-%m-%d") {
                return date;
            }
            println!("Please enter a valid date, e.g. 2026-09-15");
        }
    }

    fn get_time_input(&self, prompt: &str) -> NaiveTime {
        loop {
            let input = self.get_input(&format!("{} (HH:MM)", prompt), None);
            if let Ok(time) = NaiveTime::parse_from_str(&input, "%H:%M") {
                return time;
            }
            println!("Please enter a valid time, e.g. 09:30");
        }
    }

    fn get_amount_input(&self, prompt: &str, default: f64) -> f64 {
        loop {
            let default_str = format!("{:.2}", default);
            let input = self.get_input(prompt, Some(&default_str));
            match input.parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => return value,
                _ => println!("Please enter a non-negative amount"),
            }
        }
    }

    fn report_error(&self, e: &ScheduleError) {
        println!("\nError: {}", e);
    }

    // ── Booking ─────────────────────────────────────────────────────────

    fn book_appointment(&self) {
        println!("\n--- Book Appointment ---");

        if !self.list_practitioners() {
            return;
        }
        let practitioner_id = self.get_int_input("Practitioner id", None);

        if !self.list_patients() {
            return;
        }
        let patient_id = self.get_int_input("Patient id", None);

        let from_slot = self.get_input("Book from a published slot? (y/n)", Some("y"));
        let schedule = if from_slot.eq_ignore_ascii_case("y") {
            match self.reception.available_slots(practitioner_id, None) {
                Ok(slots) if slots.is_empty() => {
                    println!("\nNo available slots for this practitioner");
                    return;
                }
                Ok(slots) => {
                    println!("\nAvailable slots:");
                    for slot in &slots {
                        println!(
                            "  {}. {} at {}",
                            slot.id,
                            slot.date.format("%A, %Y-%m-%d"),
                            slot.time.format("%H:%M")
                        );
                    }
                    let slot_id = self.get_int_input("Slot id", None);
                    BookingSchedule::FromSlot { slot_id }
                }
                Err(e) => {
                    self.report_error(&e);
                    return;
                }
            }
        } else {
            let date = self.get_date_input("Appointment date");
            let time = self.get_time_input("Appointment time");
            BookingSchedule::At { date, time }
        };

        let motive = self.get_input("Motive", Some("General consultation"));
        let amount = self.get_amount_input("Invoice amount", 0.0);

        match self.reception.book(BookingRequest {
            patient_id,
            practitioner_id,
            schedule,
            motive: Some(motive),
            amount: Some(amount),
        }) {
            Ok(apt) => {
                println!("\nAppointment {} booked:", apt.id);
                println!("  {}", apt);
            }
            Err(e) => self.report_error(&e),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    fn view_appointments(&self) {
        let appointments = self.reception.appointments();
        if appointments.is_empty() {
            println!("\nNo appointments on record");
            return;
        }

        println!("\n--- Appointments ({}) ---", appointments.len());
        let mut current_date = None;
        for apt in &appointments {
            if Some(apt.date) != current_date {
                current_date = Some(apt.date);
                println!("\n{}:", apt.date.format("%A, %Y-%m-%d"));
            }
            println!("  {}", apt);
        }
    }

    fn confirm_appointment(&self) {
        let id = self.get_int_input("Appointment id to confirm", None);
        match self.reception.confirm(id) {
            Ok(()) => println!("\nAppointment {} confirmed", id),
            Err(e) => self.report_error(&e),
        }
    }

    fn cancel_appointment(&self) {
        let id = self.get_int_input("Appointment id to cancel", None);
        match self.reception.cancel(id) {
            Ok(()) => println!("\nAppointment {} cancelled; its slot is free again", id),
            Err(e) => self.report_error(&e),
        }
    }

    fn reschedule_appointment(&self) {
        let id = self.get_int_input("Appointment id to reschedule", None);
        let date = self.get_date_input("New date");
        let time = self.get_time_input("New time");

        match self.reception.reschedule(id, date, time) {
            Ok(()) => println!(
                "\nAppointment {} moved to {} at {}; it is pending confirmation again",
                id,
                date,
                time.format("%H:%M")
            ),
            Err(e) => self.report_error(&e),
        }
    }

    fn register_arrival(&self) {
        let id = self.get_int_input("Appointment id", None);
        let use_now = self.get_input("Use current time as arrival? (y/n)", Some("y"));
        let arrival = if use_now.eq_ignore_ascii_case("y") {
            None
        } else {
            Some(self.get_time_input("Arrival time"))
        };

        match self.reception.register_arrival(id, arrival) {
            Ok(()) => println!("\nArrival registered for appointment {}", id),
            Err(e) => self.report_error(&e),
        }
    }

    fn evaluate_attendance(&self) {
        let id = self.get_int_input("Appointment id", None);
        match self.reception.evaluate_attendance(id) {
            Ok(outcome) => println!("\nAppointment {} settled as {}", id, outcome),
            Err(e) => self.report_error(&e),
        }
    }

    fn finalize_appointment(&self) {
        let id = self.get_int_input("Appointment id to finalize", None);
        match self.reception.finalize(id) {
            Ok(()) => println!("\nAppointment {} finalized", id),
            Err(e) => self.report_error(&e),
        }
    }

    fn purge_appointment(&self) {
        let id = self.get_int_input("Appointment id to delete", None);
        let confirm = self.get_input(
            "This also deletes the linked invoice. Continue? (y/n)",
            Some("n"),
        );
        if !confirm.eq_ignore_ascii_case("y") {
            return;
        }

        match self.reception.purge(id) {
            Ok(()) => println!("\nAppointment {} and its invoice deleted", id),
            Err(e) => self.report_error(&e),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    fn view_available_slots(&self) {
        if !self.list_practitioners() {
            return;
        }
        let practitioner_id = self.get_int_input("Practitioner id", None);
        let date_filter = self.get_input("Restrict to one date? (y/n)", Some("n"));
        let on = if date_filter.eq_ignore_ascii_case("y") {
            Some(self.get_date_input("Date"))
        } else {
            None
        };

        match self.reception.available_slots(practitioner_id, on) {
            Ok(slots) if slots.is_empty() => println!("\nNo available slots"),
            Ok(slots) => {
                println!("\n--- Available Slots ({}) ---", slots.len());
                let mut current_date = None;
                for slot in &slots {
                    if Some(slot.date) != current_date {
                        current_date = Some(slot.date);
                        println!("\n{}:", slot.date.format("%A, %Y-%m-%d"));
                    }
                    println!("  {} (slot {})", slot.time.format("%H:%M"), slot.id);
                }
            }
            Err(e) => self.report_error(&e),
        }
    }

    fn pending_confirmations(&self) {
        let pending = self.reception.pending_confirmations();
        if pending.is_empty() {
            println!("\nNothing awaiting confirmation");
            return;
        }

        println!("\n--- Awaiting Confirmation ({}) ---", pending.len());
        for apt in &pending {
            println!("  {}", apt);
        }
    }

    fn status_report(&self) {
        let report = self.reception.report();
        println!("\n--- Status Report ---");
        println!("  Pending:    {}", report.pending);
        println!("  Confirmed:  {}", report.confirmed);
        println!("  Cancelled:  {}", report.cancelled);
        println!("  Attended:   {}", report.attended);
        println!("  Absent:     {}", report.absent);
        println!("  Finalized:  {}", report.finalized);
        println!("  Total:      {}", report.total);
    }

    // ── Invoices ────────────────────────────────────────────────────────

    fn invoices_menu(&self) {
        println!("\n--- Invoices ---");
        println!("1. View invoice for appointment");
        println!("2. Update invoice amount");
        println!("3. Back");

        match self.get_int_input("Enter choice", Some(3)) {
            1 => {
                let id = self.get_int_input("Appointment id", None);
                match self.reception.invoice_for(id) {
                    Some(invoice) => println!(
                        "\nInvoice {}: {:.2} (appointment {}, patient {})",
                        invoice.id, invoice.amount, invoice.appointment_id, invoice.patient_id
                    ),
                    None => println!("\nNo invoice for appointment {}", id),
                }
            }
            2 => {
                let id = self.get_int_input("Appointment id", None);
                let amount = self.get_amount_input("New amount", 0.0);
                match self.reception.set_invoice_amount(id, amount) {
                    Ok(()) => println!("\nInvoice updated"),
                    Err(e) => self.report_error(&e),
                }
            }
            _ => {}
        }
    }

    // ── Registries ──────────────────────────────────────────────────────

    fn list_patients(&self) -> bool {
        let patients = self.reception.patients();
        if patients.is_empty() {
            println!("\nNo patients registered");
            return false;
        }
        println!("\nPatients:");
        for p in &patients {
            println!("  {}. {} ({})", p.id, p.name, p.record_number);
        }
        true
    }

    fn list_practitioners(&self) -> bool {
        let practitioners = self.reception.practitioners();
        if practitioners.is_empty() {
            println!("\nNo practitioners registered");
            return false;
        }
        println!("\nPractitioners:");
        for p in &practitioners {
            println!("  {}. {} ({})", p.id, p.name, p.specialty);
        }
        true
    }

    fn patients_menu(&self) {
        println!("\n--- Patients ---");
        println!("1. List patients");
        println!("2. Register patient");
        println!("3. Update patient");
        println!("4. Remove patient");
        println!("5. Back");

        match self.get_int_input("Enter choice", Some(5)) {
            1 => {
                self.list_patients();
            }
            2 => {
                let name = self.get_input("Name", None);
                let phone = self.get_input("Phone", None);
                let record_number = self.get_input("Record number", None);
                match self.reception.register_patient(name, phone, record_number) {
                    Ok(p) => println!("\nRegistered patient {} with id {}", p.name, p.id),
                    Err(e) => self.report_error(&e),
                }
            }
            3 => {
                if !self.list_patients() {
                    return;
                }
                let id = self.get_int_input("Patient id", None);
                let name = self.get_input("Name", None);
                let phone = self.get_input("Phone", None);
                let record_number = self.get_input("Record number", None);
                match self.reception.update_patient(id, name, phone, record_number) {
                    Ok(()) => println!("\nPatient {} updated", id),
                    Err(e) => self.report_error(&e),
                }
            }
            4 => {
                let id = self.get_int_input("Patient id to remove", None);
                match self.reception.remove_patient(id) {
                    Ok(()) => println!("\nPatient {} removed", id),
                    Err(e) => self.report_error(&e),
                }
            }
            _ => {}
        }
    }

    fn practitioners_menu(&self) {
        println!("\n--- Practitioners ---");
        println!("1. List practitioners");
        println!("2. Register practitioner");
        println!("3. Update practitioner");
        println!("4. Remove practitioner");
        println!("5. Publish slot");
        println!("6. Back");

        match self.get_int_input("Enter choice", Some(6)) {
            1 => {
                self.list_practitioners();
            }
            2 => {
                let name = self.get_input("Name", None);
                let phone = self.get_input("Phone", None);
                let specialty = self.get_input("Specialty", None);
                let license_number = self.get_int_input("License number", None);
                match self
                    .reception
                    .register_practitioner(name, phone, specialty, license_number)
                {
                    Ok(p) => println!("\nRegistered practitioner {} with id {}", p.name, p.id),
                    Err(e) => self.report_error(&e),
                }
            }
            3 => {
                if !self.list_practitioners() {
                    return;
                }
                let id = self.get_int_input("Practitioner id", None);
                let name = self.get_input("Name", None);
                let phone = self.get_input("Phone", None);
                let specialty = self.get_input("Specialty", None);
                let license_number = self.get_int_input("License number", None);
                match self
                    .reception
                    .update_practitioner(id, name, phone, specialty, license_number)
                {
                    Ok(()) => println!("\nPractitioner {} updated", id),
                    Err(e) => self.report_error(&e),
                }
            }
            4 => {
                let id = self.get_int_input("Practitioner id to remove", None);
                match self.reception.remove_practitioner(id) {
                    Ok(()) => println!("\nPractitioner {} and their slots removed", id),
                    Err(e) => self.report_error(&e),
                }
            }
            5 => {
                if !self.list_practitioners() {
                    return;
                }
                let id = self.get_int_input("Practitioner id", None);
                let date = self.get_date_input("Slot date");
                let time = self.get_time_input("Slot time");
                match self.reception.publish_slot(id, date, time) {
                    Ok(slot_id) => println!("\nPublished slot {}", slot_id),
                    Err(e) => self.report_error(&e),
                }
            }
            _ => {}
        }
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let choice = self.get_int_input("Enter choice", Some(2));

            match choice {
                1 => self.book_appointment(),
                2 => self.view_appointments(),
                3 => self.confirm_appointment(),
                4 => self.cancel_appointment(),
                5 => self.reschedule_appointment(),
                6 => self.register_arrival(),
                7 => self.evaluate_attendance(),
                8 => self.finalize_appointment(),
                9 => self.view_available_slots(),
                10 => self.pending_confirmations(),
                11 => self.status_report(),
                12 => self.invoices_menu(),
                13 => self.patients_menu(),
                14 => self.practitioners_menu(),
                15 => self.purge_appointment(),
                16 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clinidesk=info")),
        )
        .init();

    match ClinicCli::open() {
        Ok(mut cli) => cli.run(),
        Err(e) => {
            eprintln!("Failed to open data directory '{}': {}", DATA_DIR, e);
            std::process::exit(1);
        }
    }
}
