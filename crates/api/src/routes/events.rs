//! Event and time slot endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slot_store::{Event, EventDetail, EventId, NewEvent, SlotDetail, SlotId};

use super::bookings::BookingResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_capacity")]
    pub max_bookings_per_slot: u32,
    #[serde(default)]
    pub time_slots: Vec<DateTime<Utc>>,
}

fn default_capacity() -> u32 {
    1
}

// -- Response types --

#[derive(Serialize)]
pub struct EventResponse {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub max_bookings_per_slot: u32,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            max_bookings_per_slot: event.capacity,
        }
    }
}

#[derive(Serialize)]
pub struct TimeSlotResponse {
    pub id: SlotId,
    pub event_id: EventId,
    pub start_time: DateTime<Utc>,
    pub bookings: Vec<BookingResponse>,
}

impl From<SlotDetail> for TimeSlotResponse {
    fn from(detail: SlotDetail) -> Self {
        Self {
            id: detail.slot.id,
            event_id: detail.slot.event_id,
            start_time: detail.slot.start_time,
            bookings: detail.bookings.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct EventDetailResponse {
    #[serde(flatten)]
    pub event: EventResponse,
    pub time_slots: Vec<TimeSlotResponse>,
}

impl From<EventDetail> for EventDetailResponse {
    fn from(detail: EventDetail) -> Self {
        Self {
            event: detail.event.into(),
            time_slots: detail.slots.into_iter().map(Into::into).collect(),
        }
    }
}

// -- Handlers --

/// POST /events — create an event with its time slots.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventDetailResponse>), ApiError> {
    let mut event = NewEvent::new(req.title).capacity(req.max_bookings_per_slot);
    if let Some(description) = req.description {
        event = event.description(description);
    }
    for start_time in req.time_slots {
        event = event.slot_at(start_time);
    }

    let detail = state.catalog.create_event(event).await?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

/// GET /events — list all events without their slots.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = state.catalog.list_events().await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// GET /events/{id} — an event with its slots and their bookings.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventDetailResponse>, ApiError> {
    let event_id: EventId = parse_id(&id)?;
    let detail = state.catalog.get_event(event_id).await?;
    Ok(Json(detail.into()))
}

/// DELETE /events/{id} — delete an event, its slots and their bookings.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let event_id: EventId = parse_id(&id)?;
    state.catalog.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /events/{event_id}/slots/{slot_id} — delete one slot and its bookings.
#[tracing::instrument(skip(state))]
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    Path((event_id, slot_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let event_id: EventId = parse_id(&event_id)?;
    let slot_id: SlotId = parse_id(&slot_id)?;
    state.catalog.delete_slot(event_id, slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
