// libs/booking-cell/src/services/schedule.rs
use chrono::{Duration, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use availability_cell::services::AvailabilityService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{BookingError, GeneratedSlot, TherapySession};
use crate::services::slots;

/// Read side of the slot picker: fetches the specialist's windows and the
/// week's sessions, then delegates to the pure expansion in
/// [`crate::services::slots`]. Performs only reads; transport failures
/// propagate unchanged and recomputation on the next view is the recovery
/// mechanism.
pub struct ScheduleService {
    supabase: SupabaseClient,
    availability: AvailabilityService,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            availability: AvailabilityService::new(config),
        }
    }

    /// Full slot list for the seven days starting at `week_start`, full
    /// slots included so the UI can show remaining capacity.
    pub async fn week_schedule(
        &self,
        specialist_id: Uuid,
        week_start: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<GeneratedSlot>, BookingError> {
        debug!("Generating week schedule for specialist {} from {}", specialist_id, week_start);

        let windows = self.availability
            .list_windows(Some(specialist_id), auth_token)
            .await
            .map_err(|e| BookingError::Database(e.to_string()))?;

        let sessions = self
            .sessions_in_range(specialist_id, week_start, week_start + Duration::days(7), auth_token)
            .await?;

        Ok(slots::generate_week_slots(&windows, &sessions, week_start))
    }

    /// Non-cancelled sessions for one specialist in `[from, to)`.
    pub async fn sessions_in_range(
        &self,
        specialist_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<TherapySession>, BookingError> {
        let from_ts = from.and_hms_opt(0, 0, 0)
            .ok_or_else(|| BookingError::Validation("invalid range start".to_string()))?
            .and_utc();
        let to_ts = to.and_hms_opt(0, 0, 0)
            .ok_or_else(|| BookingError::Validation("invalid range end".to_string()))?
            .and_utc();

        let path = format!(
            "/rest/v1/sessoes?specialist_id=eq.{}&session_datetime=gte.{}&session_datetime=lt.{}&status=neq.cancelled&order=session_datetime.asc",
            specialist_id,
            urlencoding::encode(&from_ts.to_rfc3339()),
            urlencoding::encode(&to_ts.to_rfc3339()),
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| BookingError::Database(e.to_string()))?;

        let sessions: Vec<TherapySession> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TherapySession>, _>>()
            .map_err(|e| BookingError::Database(format!("Failed to parse session: {}", e)))?;

        Ok(sessions)
    }
}
