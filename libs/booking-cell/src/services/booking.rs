// libs/booking-cell/src/services/booking.rs
//
// Booking confirmation. The capacity re-check and the session insert run
// under a short-lived slot lock so two clients racing for the last place
// cannot both land a row: check-and-reserve is one atomic unit here, not
// the two independent steps the slot picker itself performs.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::weekday_index;
use availability_cell::services::AvailabilityService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BookSessionRequest, BookingError, PaymentStatus, SessionSearchQuery, SessionStatus,
    TherapySession,
};
use crate::services::lifecycle::SessionLifecycleService;
use crate::services::slots;

const DEFAULT_SESSION_TYPE: &str = "individual";

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    lifecycle: SessionLifecycleService,
    lock_timeout_seconds: i64,
    max_retry_attempts: u32,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            availability: AvailabilityService::new(config),
            lifecycle: SessionLifecycleService::new(),
            lock_timeout_seconds: 30,
            max_retry_attempts: 3,
        }
    }

    /// Confirm a slot selection: re-validate against the current windows,
    /// re-check capacity under a slot lock, and insert the session row.
    pub async fn book_session(
        &self,
        request: BookSessionRequest,
        client_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        let datetime = slots::slot_datetime(request.date, request.time);
        info!("Booking session with specialist {} at {}", request.specialist_id, datetime);

        // The chosen (date, time) must still be a generated candidate of some
        // active window; values cached from an earlier render are not trusted.
        let capacity = self.slot_capacity(&request, auth_token).await?;

        let lock_key = self.generate_lock_key(request.specialist_id, datetime);

        for attempt in 1..=self.max_retry_attempts {
            debug!("Reservation attempt {} for {}", attempt, lock_key);

            if !self.acquire_slot_lock(&lock_key, request.specialist_id).await? {
                if attempt < self.max_retry_attempts {
                    warn!("Slot lock contention, retrying attempt {}/{}", attempt, self.max_retry_attempts);
                    tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
                    continue;
                }
                return Err(BookingError::SlotUnavailable);
            }

            // Re-count under the lock, then insert. The reservation outcome
            // is already decided by this point; a failed release must not
            // overwrite it, it only delays the next contender until the lock
            // expires on its own.
            let outcome = self
                .reserve_under_lock(&request, client_id, datetime, capacity, auth_token)
                .await;
            if let Err(e) = self.release_slot_lock(&lock_key).await {
                warn!("Failed to release slot lock {}: {}", lock_key, e);
            }

            return match outcome {
                Ok(session) => {
                    info!("Session {} booked with specialist {}", session.id, session.specialist_id);
                    Ok(session)
                }
                Err(e) => Err(e),
            };
        }

        Err(BookingError::SlotUnavailable)
    }

    /// Capacity of the requested slot per the current windows, or
    /// `SlotUnavailable` when no active window generates that instant.
    async fn slot_capacity(
        &self,
        request: &BookSessionRequest,
        auth_token: &str,
    ) -> Result<i32, BookingError> {
        let windows = self.availability
            .windows_for_day(
                request.specialist_id,
                weekday_index(request.date),
                Some(auth_token),
            )
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        // Several windows may cover the same instant; the most permissive
        // capacity wins, matching what the generator advertises.
        windows
            .iter()
            .filter(|w| w.covers_slot(request.date, request.time))
            .map(|w| w.max_concurrent_sessions)
            .max()
            .ok_or(BookingError::SlotUnavailable)
    }

    async fn reserve_under_lock(
        &self,
        request: &BookSessionRequest,
        client_id: Option<Uuid>,
        datetime: DateTime<Utc>,
        capacity: i32,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        let booked = self
            .count_sessions_at(request.specialist_id, datetime, auth_token)
            .await?;

        if booked >= capacity {
            info!(
                "Slot at {} already at capacity ({}/{})",
                datetime, booked, capacity
            );
            return Err(BookingError::SlotUnavailable);
        }

        self.insert_session(request, client_id, datetime, auth_token).await
    }

    /// Non-cancelled sessions holding this exact specialist/instant.
    async fn count_sessions_at(
        &self,
        specialist_id: Uuid,
        datetime: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<i32, BookingError> {
        let path = format!(
            "/rest/v1/sessoes?specialist_id=eq.{}&session_datetime=eq.{}&status=neq.cancelled",
            specialist_id,
            urlencoding::encode(&datetime.to_rfc3339()),
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        Ok(result.len() as i32)
    }

    async fn insert_session(
        &self,
        request: &BookSessionRequest,
        client_id: Option<Uuid>,
        datetime: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        let session_data = json!({
            "specialist_id": request.specialist_id,
            "client_id": client_id,
            "session_datetime": datetime.to_rfc3339(),
            "session_type": request.session_type.as_deref().unwrap_or(DEFAULT_SESSION_TYPE),
            "status": SessionStatus::Scheduled,
            "payment_status": PaymentStatus::Pending,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/sessoes",
            Some(auth_token),
            Some(session_data),
            Some(headers),
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::Database("Session insert returned no row".to_string()));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::Database(format!("Failed to parse session: {}", e)))
    }

    // ==========================================================================
    // SESSION LIFECYCLE
    // ==========================================================================

    pub async fn get_session(
        &self,
        session_id: Uuid,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        debug!("Fetching session: {}", session_id);

        let path = format!("/rest/v1/sessoes?id=eq.{}", session_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::Database(format!("Failed to parse session: {}", e)))
    }

    pub async fn search_sessions(
        &self,
        query: SessionSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<TherapySession>, BookingError> {
        debug!("Searching sessions with filters: {:?}", query);

        let mut query_parts = Vec::new();

        if let Some(specialist_id) = query.specialist_id {
            query_parts.push(format!("specialist_id=eq.{}", specialist_id));
        }
        if let Some(client_id) = query.client_id {
            query_parts.push(format!("client_id=eq.{}", client_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!(
                "session_datetime=gte.{}",
                urlencoding::encode(&from_date.to_rfc3339())
            ));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!(
                "session_datetime=lte.{}",
                urlencoding::encode(&to_date.to_rfc3339())
            ));
        }

        query_parts.push("order=session_datetime.asc".to_string());
        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }

        let path = format!("/rest/v1/sessoes?{}", query_parts.join("&"));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        let sessions: Vec<TherapySession> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TherapySession>, _>>()
            .map_err(|e| BookingError::Database(format!("Failed to parse session: {}", e)))?;

        Ok(sessions)
    }

    /// Soft cancel: the row stays for the audit trail and the slot's capacity
    /// frees up on the next generation run.
    pub async fn cancel_session(
        &self,
        session_id: Uuid,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        self.transition_session(session_id, SessionStatus::Cancelled, auth_token).await
    }

    pub async fn complete_session(
        &self,
        session_id: Uuid,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        self.transition_session(session_id, SessionStatus::Completed, auth_token).await
    }

    async fn transition_session(
        &self,
        session_id: Uuid,
        new_status: SessionStatus,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        let current = self.get_session(session_id, auth_token).await?;

        self.lifecycle.validate_status_transition(&current.status, &new_status)?;

        let update_data = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let session = self.patch_session(session_id, update_data, auth_token).await?;
        info!("Session {} transitioned to {}", session_id, new_status);
        Ok(session)
    }

    /// Payment reconciliation hook: flips the payment flag without touching
    /// the scheduling status.
    pub async fn set_payment_status(
        &self,
        session_id: Uuid,
        payment_status: PaymentStatus,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        // Ensure the row exists before patching so a bad id is a 404.
        self.get_session(session_id, auth_token).await?;

        let update_data = json!({
            "payment_status": payment_status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let session = self.patch_session(session_id, update_data, auth_token).await?;
        info!("Session {} payment status set to {}", session_id, payment_status);
        Ok(session)
    }

    async fn patch_session(
        &self,
        session_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<TherapySession, BookingError> {
        let path = format!("/rest/v1/sessoes?id=eq.{}", session_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(headers),
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::Database(format!("Failed to parse session: {}", e)))
    }

    // ==========================================================================
    // SLOT LOCKING
    // ==========================================================================

    fn generate_lock_key(&self, specialist_id: Uuid, datetime: DateTime<Utc>) -> String {
        format!("slot_{}_{}", specialist_id, datetime.timestamp())
    }

    /// Insert-if-absent on the lock table. `false` means someone else holds a
    /// live lock on this slot.
    async fn acquire_slot_lock(
        &self,
        lock_key: &str,
        specialist_id: Uuid,
    ) -> Result<bool, BookingError> {
        match self.try_insert_lock(lock_key, specialist_id).await {
            Ok(()) => {
                debug!("Slot lock acquired: {}", lock_key);
                Ok(true)
            }
            Err(_) => {
                // Lock row already exists; a crashed booking may have left it
                // behind, so clear it once it expires and try again.
                if self.cleanup_expired_lock(lock_key).await? {
                    match self.try_insert_lock(lock_key, specialist_id).await {
                        Ok(()) => Ok(true),
                        Err(_) => Ok(false),
                    }
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn try_insert_lock(
        &self,
        lock_key: &str,
        specialist_id: Uuid,
    ) -> Result<(), BookingError> {
        let lock_data = json!({
            "lock_key": lock_key,
            "specialist_id": specialist_id,
            "acquired_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + Duration::seconds(self.lock_timeout_seconds)).to_rfc3339(),
            "process_id": format!("booking_{}", Uuid::new_v4())
        });

        self.supabase
            .request::<Value>(
                Method::POST,
                "/rest/v1/slot_locks",
                None, // Internal locking, not subject to row-level security
                Some(lock_data),
            )
            .await
            .map(|_| ())
            .map_err(|e| BookingError::Database(e.to_string()))
    }

    /// Returns true when an expired lock was found and removed.
    async fn cleanup_expired_lock(&self, lock_key: &str) -> Result<bool, BookingError> {
        let path = format!("/rest/v1/slot_locks?lock_key=eq.{}", lock_key);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        let Some(lock) = result.first() else {
            // Holder released between our failed insert and this read.
            return Ok(true);
        };

        let expired = lock["expires_at"]
            .as_str()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|expires_at| expires_at.with_timezone(&Utc) < Utc::now())
            .unwrap_or(false);

        if !expired {
            return Ok(false);
        }

        warn!("Removing expired slot lock: {}", lock_key);
        self.release_slot_lock(lock_key).await?;
        Ok(true)
    }

    async fn release_slot_lock(&self, lock_key: &str) -> Result<(), BookingError> {
        let path = format!("/rest/v1/slot_locks?lock_key=eq.{}", lock_key);
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            None,
            None,
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        debug!("Slot lock released: {}", lock_key);
        Ok(())
    }
}
