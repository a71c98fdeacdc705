/// Slot management: creation, availability flips, and schedule queries.
///
/// Slots live in the entity store like every other record; this module
/// groups the operations that treat them as a bookable schedule. The
/// coordinator uses `find_slot` to reconcile appointment changes with slot
/// availability.
use chrono::{NaiveDate, NaiveTime};

use crate::models::Slot;
use crate::store::{EntityKind, EntityStore};

impl EntityStore {
    /// Create a slot for a practitioner; slots always start available.
    /// Returns the new slot id.
    pub fn create_slot(&mut self, date: NaiveDate, time: NaiveTime, practitioner_id: u32) -> u32 {
        let id = self.next_id(EntityKind::Slot);
        self.slots
            .insert(id, Slot::new(id, date, time, practitioner_id));
        id
    }

    pub fn slot(&self, id: u32) -> Option<&Slot> {
        self.slots.get(&id)
    }

    pub fn remove_slot(&mut self, id: u32) -> Option<Slot> {
        self.slots.remove(&id)
    }

    /// Idempotent flip to taken. Unknown ids are ignored.
    pub fn mark_slot_taken(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.available = false;
        }
    }

    /// Idempotent flip back to available. Unknown ids are ignored.
    pub fn mark_slot_available(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.available = true;
        }
    }

    /// Exact-match lookup on the slot's natural key.
    pub fn find_slot(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        practitioner_id: u32,
    ) -> Option<&Slot> {
        self.slots.values().find(|s| {
            s.date == date && s.time == time && s.practitioner_id == practitioner_id
        })
    }

    /// Available, non-past slots for a practitioner, optionally restricted
    /// to one date, ordered by date then time. Slots dated before `today`
    /// are excluded; same-day slots are kept regardless of time.
    pub fn available_slots(
        &self,
        practitioner_id: u32,
        on: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .slots
            .values()
            .filter(|s| s.practitioner_id == practitioner_id)
            .filter(|s| s.available)
            .filter(|s| !s.is_past(today))
            .filter(|s| on.map_or(true, |d| s.date == d))
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.date, s.time));
        slots
    }

    /// Remove every slot owned by a practitioner (used when the
    /// practitioner is deleted). Returns how many were removed.
    pub fn remove_slots_of_practitioner(&mut self, practitioner_id: u32) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, s| s.practitioner_id != practitioner_id);
        before - self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn created_slots_start_available() {
        let mut store = EntityStore::new();
        let id = store.create_slot(date(2026, 9, 1), time(9, 0), 1);
        assert!(store.slot(id).unwrap().available);
    }

    #[test]
    fn availability_flips_are_idempotent() {
        let mut store = EntityStore::new();
        let id = store.create_slot(date(2026, 9, 1), time(9, 0), 1);

        store.mark_slot_taken(id);
        store.mark_slot_taken(id);
        assert!(!store.slot(id).unwrap().available);

        store.mark_slot_available(id);
        store.mark_slot_available(id);
        assert!(store.slot(id).unwrap().available);

        // unknown ids are a no-op
        store.mark_slot_taken(999);
    }

    #[test]
    fn find_slot_matches_full_natural_key() {
        let mut store = EntityStore::new();
        let d = date(2026, 9, 1);
        store.create_slot(d, time(9, 0), 1);

        assert!(store.find_slot(d, time(9, 0), 1).is_some());
        assert!(store.find_slot(d, time(9, 30), 1).is_none());
        assert!(store.find_slot(d, time(9, 0), 2).is_none());
        assert!(store.find_slot(date(2026, 9, 2), time(9, 0), 1).is_none());
    }

    #[test]
    fn available_slots_filters_and_orders() {
        let mut store = EntityStore::new();
        let today = date(2026, 9, 10);

        store.create_slot(date(2026, 9, 12), time(10, 0), 1);
        store.create_slot(date(2026, 9, 11), time(15, 0), 1);
        store.create_slot(date(2026, 9, 11), time(9, 0), 1);
        let taken = store.create_slot(date(2026, 9, 11), time(10, 0), 1);
        store.mark_slot_taken(taken);
        store.create_slot(date(2026, 9, 9), time(9, 0), 1); // past
        store.create_slot(today, time(8, 0), 1); // same-day kept
        store.create_slot(date(2026, 9, 11), time(9, 0), 2); // other practitioner

        let slots = store.available_slots(1, None, today);
        let keys: Vec<(NaiveDate, NaiveTime)> = slots.iter().map(|s| (s.date, s.time)).collect();
        assert_eq!(
            keys,
            vec![
                (today, time(8, 0)),
                (date(2026, 9, 11), time(9, 0)),
                (date(2026, 9, 11), time(15, 0)),
                (date(2026, 9, 12), time(10, 0)),
            ]
        );
    }

    #[test]
    fn available_slots_can_restrict_to_one_date() {
        let mut store = EntityStore::new();
        let today = date(2026, 9, 10);
        store.create_slot(date(2026, 9, 11), time(9, 0), 1);
        store.create_slot(date(2026, 9, 12), time(9, 0), 1);

        let slots = store.available_slots(1, Some(date(2026, 9, 11)), today);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].date, date(2026, 9, 11));
    }

    #[test]
    fn practitioner_slot_cascade() {
        let mut store = EntityStore::new();
        store.create_slot(date(2026, 9, 1), time(9, 0), 1);
        store.create_slot(date(2026, 9, 1), time(10, 0), 1);
        store.create_slot(date(2026, 9, 1), time(9, 0), 2);

        assert_eq!(store.remove_slots_of_practitioner(1), 2);
        assert_eq!(store.available_slots(2, None, date(2026, 8, 1)).len(), 1);
    }
}
