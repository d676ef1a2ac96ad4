use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookSessionRequest, BookingError, SessionSearchQuery, SessionStatus, SetPaymentStatusRequest,
};
use crate::services::{BookingService, ScheduleService};

#[derive(Debug, Deserialize)]
pub struct WeekSlotsQuery {
    pub specialist_id: Uuid,
    /// First day of the week to expand; any date is accepted as the anchor.
    pub week_start: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub specialist_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_week_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<WeekSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let slots = service.week_schedule(query.specialist_id, query.week_start, None).await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "slots": slots,
        "specialist_id": query.specialist_id,
        "week_start": query.week_start,
        "total_slots": slots.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_session(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // The booking is attributed to whoever confirmed it; service-account
    // callers without a UUID subject produce a guest booking.
    let client_id = Uuid::parse_str(&user.id).ok();

    let service = BookingService::new(&state);

    let session = service.book_session(request, client_id, token).await
        .map_err(booking_error)?;

    Ok(Json(json!(session)))
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(&state);

    let mut search = SessionSearchQuery {
        specialist_id: query.specialist_id,
        client_id: query.client_id,
        status: query.status,
        from_date: query.from_date,
        to_date: query.to_date,
        limit: query.limit,
    };

    // Non-admins only see their own side of the ledger.
    if !user.is_admin() {
        let own_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;
        match user.role.as_deref() {
            Some("specialist") => search.specialist_id = Some(own_id),
            _ => search.client_id = Some(own_id),
        }
    }

    let sessions = service.search_sessions(search, token).await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "sessions": sessions,
        "total": sessions.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_session(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(&state);

    let session = service.cancel_session(session_id, token).await
        .map_err(booking_error)?;

    Ok(Json(json!(session)))
}

#[axum::debug_handler]
pub async fn complete_session(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.can_manage_availability() {
        return Err(AppError::Auth("Only specialists can complete sessions".to_string()));
    }

    let service = BookingService::new(&state);

    let session = service.complete_session(session_id, token).await
        .map_err(booking_error)?;

    Ok(Json(json!(session)))
}

#[axum::debug_handler]
pub async fn set_payment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetPaymentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Auth("Only administrators can update payment status".to_string()));
    }

    let service = BookingService::new(&state);

    let session = service.set_payment_status(session_id, request.payment_status, token).await
        .map_err(booking_error)?;

    Ok(Json(json!(session)))
}

fn booking_error(err: BookingError) -> AppError {
    match err {
        BookingError::SlotUnavailable => AppError::Conflict(err.to_string()),
        BookingError::NotFound => AppError::NotFound(err.to_string()),
        BookingError::Validation(msg) => AppError::ValidationError(msg),
        BookingError::InvalidStatusTransition(_) => AppError::BadRequest(err.to_string()),
        BookingError::Database(msg) => AppError::Database(msg),
    }
}
