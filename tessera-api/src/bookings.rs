use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tessera_booking::BookingRequest;
use tessera_core::{CoreError, Reservation};
use tessera_shared::messages::SeatActivityKind;
use tessera_shared::{ReservationStatus, TicketClass};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stream::emit_seat_activity;

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking_id: Uuid,
    status: ReservationStatus,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct SeatOverlay {
    id: String,
    class: TicketClass,
    status: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", axum::routing::post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/events/{event_id}/bookings", get(event_bookings))
        .route("/v1/events/{event_id}/seats", get(event_seats))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let replayed = match &req.idempotency_key {
        Some(key) => state.ledger.find_by_key(key).await?.is_some(),
        None => false,
    };
    let reservation = state.orchestrator.create_booking(req).await?;
    // Replays hand back the original booking: nothing new was admitted, so
    // neither the counter nor the seat feed moves. The original may already
    // be settled, so only a live hold is worth announcing.
    if !replayed {
        state.metrics.reservations_created.inc();
        if reservation.status == ReservationStatus::Pending {
            emit_seat_activity(&state, &reservation, SeatActivityKind::Held).await;
        }
    }
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            booking_id: reservation.id,
            status: reservation.status,
        }),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, ApiError> {
    match state.ledger.get(id).await? {
        Some(reservation) => Ok(Json(reservation)),
        None => Err(CoreError::NotFound(id).into()),
    }
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let rows = state.ledger.for_user(params.user_id).await?;
    Ok(Json(rows))
}

async fn event_bookings(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let rows = state.ledger.for_event(event_id).await?;
    Ok(Json(rows))
}

/// Seat map overlay derived from the ledger: confirmed bookings show their
/// seats as sold, pending ones as locked. Failed and cancelled rows do not
/// contribute.
async fn event_seats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<SeatOverlay>>, ApiError> {
    let rows = state.ledger.for_event(event_id).await?;
    let mut seats = Vec::new();
    for reservation in rows {
        let status = match reservation.status {
            ReservationStatus::Confirmed => "sold",
            ReservationStatus::Pending => "locked",
            ReservationStatus::Failed | ReservationStatus::Cancelled => continue,
        };
        for seat in &reservation.seats {
            seats.push(SeatOverlay {
                id: seat.id.clone(),
                class: seat.class,
                status,
            });
        }
    }
    Ok(Json(seats))
}
