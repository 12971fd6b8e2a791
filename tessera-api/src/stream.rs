use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tessera_core::relay::publish_json;
use tessera_core::Reservation;
use tessera_shared::messages::{topics, SeatActivityKind, SeatActivityMessage};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events/{event_id}/stream", get(seat_stream))
}

/// Live seat activity for one event, as server-sent events. Each subscriber
/// gets its own broadcast receiver; lagging subscribers drop messages rather
/// than stall the channel.
async fn seat_stream(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.seat_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(msg) if msg.event_id == event_id => {
                match Event::default().event("seat_activity").json_data(&msg) {
                    Ok(event) => Some(Ok::<_, Infallible>(event)),
                    Err(_) => None,
                }
            }
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Fan a reservation's seat activity out to SSE subscribers and the activity
/// topic. Count-only bookings name no seats and are skipped.
pub(crate) async fn emit_seat_activity(
    state: &AppState,
    reservation: &Reservation,
    kind: SeatActivityKind,
) {
    if reservation.seats.is_empty() {
        return;
    }
    let msg = SeatActivityMessage {
        event_id: reservation.event_id,
        booking_id: reservation.id,
        kind,
        seats: reservation.seats.clone(),
        at: Utc::now().timestamp(),
    };
    // Send fails only when nobody is subscribed, which is fine.
    let _ = state.seat_tx.send(msg.clone());
    if let Err(e) = publish_json(
        state.relay.as_ref(),
        topics::SEAT_ACTIVITY,
        &reservation.event_id.to_string(),
        &msg,
    )
    .await
    {
        warn!(event_id = %reservation.event_id, error = %e, "seat activity publish failed");
    }
}
