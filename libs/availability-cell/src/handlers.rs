use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AvailabilityError, UpsertWindowRequest};
use crate::services::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct ListWindowsQuery {
    pub specialist_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub specialist_id: Uuid,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_windows(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ListWindowsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    let windows = service.list_windows(query.specialist_id, None).await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "windows": windows,
        "total": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn windows_for_day(
    State(state): State<Arc<AppConfig>>,
    Path(day_of_week): Path<u8>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    let windows = service.windows_for_day(query.specialist_id, day_of_week, None).await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "windows": windows,
        "day_of_week": day_of_week,
        "specialist_id": query.specialist_id
    })))
}

// ==============================================================================
// PROTECTED HANDLERS (SPECIALIST / ADMIN)
// ==============================================================================

#[axum::debug_handler]
pub async fn upsert_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertWindowRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.can_manage_availability() {
        return Err(AppError::Auth("Only specialists can manage availability".to_string()));
    }

    // Specialists only touch their own schedule; admins can touch any.
    if !user.is_admin() && user.id != request.specialist_id.to_string() {
        return Err(AppError::Auth("Cannot manage another specialist's availability".to_string()));
    }

    let service = AvailabilityService::new(&state);

    let window = service.upsert_window(request, token).await
        .map_err(availability_error)?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn disable_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(window_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.can_manage_availability() {
        return Err(AppError::Auth("Only specialists can manage availability".to_string()));
    }

    let service = AvailabilityService::new(&state);

    let window = service.disable_window(window_id, token).await
        .map_err(availability_error)?;

    Ok(Json(json!(window)))
}

fn availability_error(err: AvailabilityError) -> AppError {
    match err {
        AvailabilityError::Validation { .. } => AppError::ValidationError(err.to_string()),
        AvailabilityError::NotFound => AppError::NotFound(err.to_string()),
        AvailabilityError::Database(msg) => AppError::Database(msg),
    }
}
