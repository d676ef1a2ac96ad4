// libs/availability-cell/src/models.rs
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recurring weekly time range during which a specialist accepts bookings.
///
/// Windows are never physically deleted once created; retiring one means
/// flipping `is_available` off so history stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub specialist_id: Uuid,
    /// Weekday this window recurs on, 0 = Sunday through 6 = Saturday.
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    /// Slot granularity in minutes. A trailing slot that does not fully fit
    /// before `end_time` is dropped, never emitted partially.
    pub interval_minutes: i64,
    /// How many simultaneous bookings one slot admits (group sessions).
    pub max_concurrent_sessions: i32,
    /// Calendar dates on which this recurring window does not apply at all.
    #[serde(default)]
    pub exceptions: Vec<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    /// Whether this window produces slots on the given date: the weekday must
    /// match, the window must be active, and the date must not be vetoed by
    /// an exception.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.is_available
            && weekday_index(date) == self.day_of_week
            && !self.exceptions.contains(&date)
    }

    /// Candidate slot start times, stepping `interval_minutes` from
    /// `start_time` for as long as a full slot still fits before `end_time`.
    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let mut starts = Vec::new();
        if self.interval_minutes <= 0 {
            return starts;
        }

        let start = self.start_time.num_seconds_from_midnight() as i64;
        let end = self.end_time.num_seconds_from_midnight() as i64;
        // Stored rows predating the interval upper bound may carry anything.
        let Some(step) = self.interval_minutes.checked_mul(60) else {
            return starts;
        };

        let mut current = start;
        while current + step <= end {
            if let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(current as u32, 0) {
                starts.push(time);
            }
            current += step;
        }

        starts
    }

    /// Whether `time` is exactly one of this window's generated slot starts.
    pub fn covers_slot(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.applies_on(date) && self.slot_starts().contains(&time)
    }
}

/// Map a date onto the stored weekday convention (Sunday = 0).
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertWindowRequest {
    /// Present for updates, absent for inserts.
    pub id: Option<Uuid>,
    pub specialist_id: Uuid,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub interval_minutes: i64,
    pub max_concurrent_sessions: Option<i32>,
    pub exceptions: Option<Vec<NaiveDate>>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Availability window not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl AvailabilityError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: &str, end: &str, interval: i64) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            specialist_id: Uuid::new_v4(),
            day_of_week: 1,
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
            is_available: true,
            interval_minutes: interval,
            max_concurrent_sessions: 1,
            exceptions: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn slot_starts_exact_division() {
        let w = window("09:00:00", "12:00:00", 60);
        let starts = w.slot_starts();
        assert_eq!(
            starts,
            vec![
                "09:00:00".parse::<NaiveTime>().unwrap(),
                "10:00:00".parse().unwrap(),
                "11:00:00".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn slot_starts_truncates_partial_trailing_slot() {
        // 09:00-10:30 at 60 minutes: the 10:00 slot would end at 11:00,
        // past the window, so only 09:00 is emitted.
        let w = window("09:00:00", "10:30:00", 60);
        assert_eq!(w.slot_starts().len(), 1);
        assert_eq!(w.slot_starts()[0], "09:00:00".parse::<NaiveTime>().unwrap());
    }

    #[test]
    fn slot_starts_nonpositive_interval_is_empty() {
        let w = window("09:00:00", "12:00:00", 0);
        assert!(w.slot_starts().is_empty());
    }

    #[test]
    fn slot_starts_extreme_interval_is_empty() {
        // A stored row with an absurd interval must not overflow the step
        // arithmetic; it simply yields no slots.
        let w = window("09:00:00", "12:00:00", i64::MAX);
        assert!(w.slot_starts().is_empty());

        let w = window("09:00:00", "12:00:00", 100_000);
        assert!(w.slot_starts().is_empty());
    }

    #[test]
    fn applies_on_honors_exceptions_and_weekday() {
        let mut w = window("09:00:00", "12:00:00", 60);
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert!(w.applies_on(monday));
        assert!(!w.applies_on(tuesday));

        w.exceptions.push(monday);
        assert!(!w.applies_on(monday));

        w.exceptions.clear();
        w.is_available = false;
        assert!(!w.applies_on(monday));
    }

    #[test]
    fn weekday_index_is_sunday_based() {
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        assert_eq!(weekday_index(sunday), 0);
        assert_eq!(weekday_index(saturday), 6);
    }
}
