// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE SESSION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: Uuid,
    pub specialist_id: Uuid,
    /// Absent for guest bookings made without an account.
    pub client_id: Option<Uuid>,
    pub session_datetime: DateTime<Utc>,
    pub session_type: String,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TherapySession {
    /// Cancelled sessions free their slot; everything else holds capacity.
    pub fn holds_capacity(&self) -> bool {
        self.status != SessionStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// One bookable unit derived from an availability window. Ephemeral: derived
/// on every view from the windows and current sessions, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSlot {
    pub specialist_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub interval_minutes: i64,
    pub available: bool,
    pub remaining_capacity: i32,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSessionRequest {
    pub specialist_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub session_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSearchQuery {
    pub specialist_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Slot no longer available")]
    SlotUnavailable,

    #[error("Session not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session cannot be modified in current status: {0}")]
    InvalidStatusTransition(SessionStatus),

    #[error("Database error: {0}")]
    Database(String),
}
