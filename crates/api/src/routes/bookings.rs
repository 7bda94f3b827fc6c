//! Booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slot_store::{Booking, BookingId, Email, EventId, Requester, SlotId};

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub user_name: String,
    pub user_email: String,
    pub time_slot_id: SlotId,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: BookingId,
    pub time_slot_id: SlotId,
    pub user_name: String,
    pub user_email: Email,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            time_slot_id: booking.slot_id,
            user_name: booking.requester.name,
            user_email: booking.requester.email,
            created_at: booking.created_at,
        }
    }
}

// -- Handlers --

/// POST /events/{event_id}/bookings — reserve a time slot.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let event_id: EventId = parse_id(&event_id)?;
    let requester = Requester::new(req.user_name, &req.user_email)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let booking = state
        .engine
        .reserve(event_id, req.time_slot_id, requester)
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// DELETE /bookings/{id} — cancel a booking.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let booking_id: BookingId = parse_id(&id)?;
    state.engine.cancel(booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /bookings/{id} — a single booking.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id: BookingId = parse_id(&id)?;
    let booking = state.engine.booking(booking_id).await?;
    Ok(Json(booking.into()))
}

/// GET /users/{email}/bookings — every booking held by a user.
#[tracing::instrument(skip(state))]
pub async fn for_user(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let email =
        Email::parse(&email).map_err(|_| ApiError::BadRequest("Invalid email format".to_string()))?;
    let bookings = state.engine.list_by_requester(&email).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}
