// libs/availability-cell/src/services/windows.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailabilityError, AvailabilityWindow, UpsertWindowRequest};

/// Persistence layer for `AvailabilityWindow` rows (table `availability`).
///
/// Reads and writes go straight to the store on every call; nothing is
/// cached, so an upsert is visible to the next list immediately.
pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// All windows, optionally filtered by specialist, ordered by weekday
    /// then start time. Disabled windows are included (history/audit).
    pub async fn list_windows(
        &self,
        specialist_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        debug!("Listing availability windows (specialist: {:?})", specialist_id);

        let mut path = "/rest/v1/availability?order=day_of_week.asc,start_time.asc".to_string();
        if let Some(specialist_id) = specialist_id {
            path.push_str(&format!("&specialist_id=eq.{}", specialist_id));
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| AvailabilityError::Database(e.to_string()))?;

        let windows: Vec<AvailabilityWindow> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| AvailabilityError::Database(format!("Failed to parse window: {}", e)))?;

        Ok(windows)
    }

    /// Active windows for one weekday only (`is_available = true`).
    pub async fn windows_for_day(
        &self,
        specialist_id: Uuid,
        day_of_week: u8,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        if day_of_week > 6 {
            return Err(AvailabilityError::validation(
                "day_of_week",
                "must be between 0 (Sunday) and 6 (Saturday)",
            ));
        }

        debug!("Fetching windows for specialist {} on weekday {}", specialist_id, day_of_week);

        let path = format!(
            "/rest/v1/availability?specialist_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
            specialist_id, day_of_week
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| AvailabilityError::Database(e.to_string()))?;

        let windows: Vec<AvailabilityWindow> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| AvailabilityError::Database(format!("Failed to parse window: {}", e)))?;

        Ok(windows)
    }

    /// Insert a new window or patch an existing one. Validation failures name
    /// the offending field and nothing is persisted.
    pub async fn upsert_window(
        &self,
        request: UpsertWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        self.validate(&request)?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = if let Some(id) = request.id {
            debug!("Updating availability window {}", id);

            let mut update_data = serde_json::Map::new();
            update_data.insert("day_of_week".to_string(), json!(request.day_of_week));
            update_data.insert("start_time".to_string(), json!(request.start_time.format("%H:%M:%S").to_string()));
            update_data.insert("end_time".to_string(), json!(request.end_time.format("%H:%M:%S").to_string()));
            update_data.insert("interval_minutes".to_string(), json!(request.interval_minutes));
            if let Some(max_concurrent) = request.max_concurrent_sessions {
                update_data.insert("max_concurrent_sessions".to_string(), json!(max_concurrent));
            }
            if let Some(ref exceptions) = request.exceptions {
                update_data.insert("exceptions".to_string(), json!(exceptions));
            }
            if let Some(is_available) = request.is_available {
                update_data.insert("is_available".to_string(), json!(is_available));
            }
            update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

            let path = format!("/rest/v1/availability?id=eq.{}", id);
            self.supabase.request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            ).await.map_err(|e| AvailabilityError::Database(e.to_string()))?
        } else {
            debug!("Creating availability window for specialist {}", request.specialist_id);

            let window_data = json!({
                "specialist_id": request.specialist_id,
                "day_of_week": request.day_of_week,
                "start_time": request.start_time.format("%H:%M:%S").to_string(),
                "end_time": request.end_time.format("%H:%M:%S").to_string(),
                "interval_minutes": request.interval_minutes,
                "max_concurrent_sessions": request.max_concurrent_sessions.unwrap_or(1),
                "exceptions": request.exceptions.unwrap_or_default(),
                "is_available": request.is_available.unwrap_or(true),
                "created_at": Utc::now().to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339()
            });

            self.supabase.request_with_headers(
                Method::POST,
                "/rest/v1/availability",
                Some(auth_token),
                Some(window_data),
                Some(headers),
            ).await.map_err(|e| AvailabilityError::Database(e.to_string()))?
        };

        if result.is_empty() {
            return Err(AvailabilityError::NotFound);
        }

        let window: AvailabilityWindow = serde_json::from_value(result[0].clone())
            .map_err(|e| AvailabilityError::Database(format!("Failed to parse window: {}", e)))?;

        debug!("Availability window {} persisted", window.id);
        Ok(window)
    }

    /// Logical delete. Windows referenced by booking history must survive, so
    /// the row is kept and only flipped off.
    pub async fn disable_window(
        &self,
        window_id: Uuid,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Disabling availability window {}", window_id);

        let update_data = json!({
            "is_available": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/availability?id=eq.{}", window_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(headers),
        ).await.map_err(|e| AvailabilityError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(AvailabilityError::NotFound);
        }

        let window: AvailabilityWindow = serde_json::from_value(result[0].clone())
            .map_err(|e| AvailabilityError::Database(format!("Failed to parse window: {}", e)))?;

        Ok(window)
    }

    fn validate(&self, request: &UpsertWindowRequest) -> Result<(), AvailabilityError> {
        if request.start_time >= request.end_time {
            return Err(AvailabilityError::validation(
                "start_time",
                "start time must be before end time",
            ));
        }
        if request.interval_minutes <= 0 {
            return Err(AvailabilityError::validation(
                "interval_minutes",
                "interval must be greater than zero",
            ));
        }
        // A slot cannot be longer than the day its window lives in.
        if request.interval_minutes > 1440 {
            return Err(AvailabilityError::validation(
                "interval_minutes",
                "interval must not exceed 1440 minutes",
            ));
        }
        if request.day_of_week > 6 {
            return Err(AvailabilityError::validation(
                "day_of_week",
                "must be between 0 (Sunday) and 6 (Saturday)",
            ));
        }
        if let Some(max_concurrent) = request.max_concurrent_sessions {
            if max_concurrent < 1 {
                return Err(AvailabilityError::validation(
                    "max_concurrent_sessions",
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }
}
