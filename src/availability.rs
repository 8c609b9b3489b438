use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Fields open at 06:00 and close at 22:00, bookable in fixed 2-hour slots.
pub const OPENING_HOUR: u32 = 6;
pub const CLOSING_HOUR: u32 = 22;
pub const SLOT_HOURS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Booked,
    Past,
}

#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub state: SlotState,
}

/// A booking's occupied window on the calendar. Callers are expected to
/// pass only bookings whose status still holds the slot.
#[derive(Debug, Clone, Copy)]
pub struct BookedWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Half-open interval overlap: [a_start, a_end) intersects [b_start, b_end).
fn overlaps(a_start: NaiveDateTime, a_end: NaiveDateTime, b_start: NaiveDateTime, b_end: NaiveDateTime) -> bool {
    a_start < b_end && b_start < a_end
}

/// Build the fixed slot grid for `date` against the field's existing
/// bookings. A slot whose start has already passed relative to `now` is
/// `Past` regardless of any booking covering it; otherwise it is `Booked`
/// when any window overlaps it, else `Available`.
pub fn slot_grid(date: NaiveDate, booked: &[BookedWindow], now: NaiveDateTime) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(((CLOSING_HOUR - OPENING_HOUR) / SLOT_HOURS) as usize);

    let mut hour = OPENING_HOUR;
    while hour + SLOT_HOURS <= CLOSING_HOUR {
        let start = date.and_hms_opt(hour, 0, 0).unwrap();
        let end = date.and_hms_opt(hour + SLOT_HOURS, 0, 0).unwrap();

        let state = if start < now {
            SlotState::Past
        } else if booked.iter().any(|w| overlaps(start, end, w.start, w.end)) {
            SlotState::Booked
        } else {
            SlotState::Available
        };

        slots.push(Slot { start, end, state });
        hour += SLOT_HOURS;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        d.and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn grid_is_fixed_contiguous_and_non_overlapping() {
        let d = date(2025, 6, 10);
        let slots = slot_grid(d, &[], at(date(2025, 6, 1), 0, 0));

        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].start, at(d, 6, 0));
        assert_eq!(slots[7].end, at(d, 22, 0));
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(slots.iter().all(|s| s.state == SlotState::Available));
    }

    #[test]
    fn overlapping_booking_marks_slot_booked() {
        let d = date(2025, 6, 10);
        let booked = [BookedWindow {
            start: at(d, 8, 0),
            end: at(d, 10, 0),
        }];
        let slots = slot_grid(d, &booked, at(date(2025, 6, 1), 0, 0));

        assert_eq!(slots[0].state, SlotState::Available); // 06-08
        assert_eq!(slots[1].state, SlotState::Booked); // 08-10
        assert_eq!(slots[2].state, SlotState::Available); // 10-12
    }

    #[test]
    fn partial_overlap_still_blocks() {
        let d = date(2025, 6, 10);
        // A 3-hour booking from 09:00 touches both the 08-10 and 10-12 slots.
        let booked = [BookedWindow {
            start: at(d, 9, 0),
            end: at(d, 12, 0),
        }];
        let slots = slot_grid(d, &booked, at(date(2025, 6, 1), 0, 0));

        assert_eq!(slots[1].state, SlotState::Booked);
        assert_eq!(slots[2].state, SlotState::Booked);
        assert_eq!(slots[3].state, SlotState::Available);
    }

    #[test]
    fn touching_endpoints_do_not_overlap() {
        let d = date(2025, 6, 10);
        let booked = [BookedWindow {
            start: at(d, 8, 0),
            end: at(d, 10, 0),
        }];
        let slots = slot_grid(d, &booked, at(date(2025, 6, 1), 0, 0));

        // [06:00,08:00) and [10:00,12:00) share endpoints with the booking
        // but half-open intervals keep them free.
        assert_eq!(slots[0].state, SlotState::Available);
        assert_eq!(slots[2].state, SlotState::Available);
    }

    #[test]
    fn past_wins_over_booked_for_today() {
        let d = date(2025, 6, 10);
        let booked = [BookedWindow {
            start: at(d, 6, 0),
            end: at(d, 8, 0),
        }];
        // Midday: everything that already started is past, even the booked slot.
        let slots = slot_grid(d, &booked, at(d, 12, 30));

        assert_eq!(slots[0].state, SlotState::Past); // 06-08, booked but past
        assert_eq!(slots[1].state, SlotState::Past); // 08-10
        assert_eq!(slots[2].state, SlotState::Past); // 10-12, started 10:00
        assert_eq!(slots[3].state, SlotState::Past); // 12-14, started 12:00
        assert_eq!(slots[4].state, SlotState::Available); // 14-16
    }

    #[test]
    fn future_date_has_no_past_slots() {
        let d = date(2025, 6, 11);
        let slots = slot_grid(d, &[], at(date(2025, 6, 10), 23, 59));
        assert!(slots.iter().all(|s| s.state == SlotState::Available));
    }

    #[test]
    fn earlier_date_is_entirely_past() {
        let d = date(2025, 6, 9);
        let slots = slot_grid(d, &[], at(date(2025, 6, 10), 0, 0));
        assert!(slots.iter().all(|s| s.state == SlotState::Past));
    }
}
