use axum::{extract::State, routing::post, Json, Router};
use serde_json::json;
use tessera_booking::Disposition;
use tessera_core::CoreResult;
use tessera_shared::messages::{PaymentOutcomeMessage, SeatActivityKind};

use crate::error::ApiError;
use crate::state::AppState;
use crate::stream::emit_seat_activity;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments/outcome", post(payment_outcome))
}

/// Direct delivery path for payment outcomes, next to the consumer loop.
/// Payment providers that call back over HTTP land here; both paths are
/// replay-safe.
async fn payment_outcome(
    State(state): State<AppState>,
    Json(msg): Json<PaymentOutcomeMessage>,
) -> Result<Json<serde_json::Value>, ApiError> {
    apply_outcome(&state, &msg).await?;
    Ok(Json(json!({ "status": "accepted" })))
}

/// Settle one payment outcome and fan out the side effects that belong to
/// the API layer: counters and the live seat feed.
pub async fn apply_outcome(
    state: &AppState,
    msg: &PaymentOutcomeMessage,
) -> CoreResult<Disposition> {
    let disposition = state.orchestrator.handle_payment_outcome(msg).await?;
    match &disposition {
        Disposition::Confirmed(reservation) => {
            state.metrics.reservations_confirmed.inc();
            emit_seat_activity(state, reservation, SeatActivityKind::Sold).await;
        }
        Disposition::Failed(reservation) => {
            state.metrics.reservations_failed.inc();
            emit_seat_activity(state, reservation, SeatActivityKind::Released).await;
        }
        Disposition::Reconfirmed(_) | Disposition::Dropped => {}
    }
    Ok(disposition)
}
