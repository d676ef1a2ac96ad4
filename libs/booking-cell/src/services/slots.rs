// libs/booking-cell/src/services/slots.rs
//
// Pure week expansion: (availability windows, current sessions, week start)
// -> displayable slot list. No store handle, no clock, no hidden state, so
// re-running with the same inputs always yields the same slots.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use availability_cell::models::AvailabilityWindow;

use crate::models::{GeneratedSlot, TherapySession};

/// Expand the seven days starting at `week_start` into concrete slots.
///
/// Every candidate is returned, full ones included, so callers can render
/// capacity; the UI filters on `available` itself. Output is sorted by date
/// then time.
pub fn generate_week_slots(
    windows: &[AvailabilityWindow],
    sessions: &[TherapySession],
    week_start: NaiveDate,
) -> Vec<GeneratedSlot> {
    let mut slots = Vec::new();

    for offset in 0..7 {
        let date = week_start + Duration::days(offset);
        slots.extend(generate_day_slots(windows, sessions, date));
    }

    slots.sort_by(|a, b| {
        (a.date, a.time, a.specialist_id).cmp(&(b.date, b.time, b.specialist_id))
    });
    slots
}

/// Slots for a single date. Windows whose weekday does not match, that are
/// disabled, or that list the date as an exception contribute nothing.
pub fn generate_day_slots(
    windows: &[AvailabilityWindow],
    sessions: &[TherapySession],
    date: NaiveDate,
) -> Vec<GeneratedSlot> {
    let mut slots = Vec::new();

    for window in windows {
        if !window.applies_on(date) {
            continue;
        }

        for time in window.slot_starts() {
            let booked = booked_count(sessions, window.specialist_id, slot_datetime(date, time));
            let remaining = window.max_concurrent_sessions - booked;

            slots.push(GeneratedSlot {
                specialist_id: window.specialist_id,
                date,
                time,
                interval_minutes: window.interval_minutes,
                available: remaining > 0,
                remaining_capacity: remaining,
            });
        }
    }

    dedupe_slots(slots)
}

/// Non-cancelled sessions holding this exact specialist/instant.
pub fn booked_count(
    sessions: &[TherapySession],
    specialist_id: Uuid,
    datetime: DateTime<Utc>,
) -> i32 {
    sessions
        .iter()
        .filter(|s| {
            s.specialist_id == specialist_id
                && s.holds_capacity()
                && s.session_datetime == datetime
        })
        .count() as i32
}

/// Wall-clock date and time composed into the stored timestamp. One timezone
/// policy end to end: naive times are interpreted as UTC.
pub fn slot_datetime(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Overlapping windows can emit the same instant twice for one specialist;
/// keep the more permissive reading so a booking allowed by any covering
/// window stays visible.
fn dedupe_slots(mut slots: Vec<GeneratedSlot>) -> Vec<GeneratedSlot> {
    slots.sort_by(|a, b| {
        (a.specialist_id, a.date, a.time)
            .cmp(&(b.specialist_id, b.date, b.time))
            .then(b.remaining_capacity.cmp(&a.remaining_capacity))
    });
    slots.dedup_by(|a, b| {
        a.specialist_id == b.specialist_id && a.date == b.date && a.time == b.time
    });
    slots
}
