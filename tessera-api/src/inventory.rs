use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_core::{CapacityUpdate, ClassTotals, CoreError};
use tessera_shared::TicketClass;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SeedRequest {
    normal: Option<i64>,
    vip: Option<i64>,
    vvip: Option<i64>,
}

impl SeedRequest {
    fn totals(&self) -> Vec<ClassTotals> {
        [
            (TicketClass::Normal, self.normal),
            (TicketClass::Vip, self.vip),
            (TicketClass::Vvip, self.vvip),
        ]
        .into_iter()
        .filter_map(|(class, total)| total.map(|total| ClassTotals { class, total }))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityParams {
    class: Option<TicketClass>,
}

#[derive(Debug, Serialize)]
struct ClassAvailability {
    class: TicketClass,
    available: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LockRequest {
    ticket_class: TicketClass,
    count: i64,
    #[serde(default)]
    seat_ids: Vec<String>,
    hold_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct UnlockRequest {
    ticket_class: TicketClass,
    count: i64,
    #[serde(default)]
    seat_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LockResponse {
    status: &'static str,
    hold_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/inventory/{event_id}",
            post(seed_inventory).patch(adjust_capacity),
        )
        .route("/v1/inventory/{event_id}/availability", get(availability))
        .route("/v1/inventory/{event_id}/lock", post(lock_seats))
        .route("/v1/inventory/{event_id}/unlock", post(unlock_seats))
}

async fn seed_inventory(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<SeedRequest>,
) -> Result<(StatusCode, Json<Vec<ClassAvailability>>), ApiError> {
    let totals = req.totals();
    if totals.is_empty() {
        return Err(
            CoreError::Validation("at least one ticket class total is required".into()).into(),
        );
    }
    state.inventory.initialize(event_id, &totals).await?;
    let snapshot = snapshot(&state, event_id).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn availability(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<ClassAvailability>>, ApiError> {
    let rows = match params.class {
        Some(class) => {
            let available = state.inventory.availability(event_id, class).await?;
            vec![ClassAvailability { class, available }]
        }
        None => snapshot(&state, event_id).await?,
    };
    Ok(Json(rows))
}

async fn lock_seats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    if req.count < 1 {
        return Err(CoreError::Validation("count must be at least 1".into()).into());
    }
    if !req.seat_ids.is_empty() && req.seat_ids.len() != req.count as usize {
        return Err(
            CoreError::Validation("seat_ids must match count when provided".into()).into(),
        );
    }
    let hold_id = req.hold_id.unwrap_or_else(Uuid::new_v4);
    let granted = state
        .inventory
        .reserve(
            event_id,
            req.ticket_class,
            req.count,
            &req.seat_ids,
            state.policy.seat_hold,
            hold_id,
        )
        .await?;
    if !granted {
        return Err(CoreError::InsufficientInventory {
            event_id,
            class: req.ticket_class,
            requested: req.count,
        }
        .into());
    }
    Ok(Json(LockResponse {
        status: "locked",
        hold_id,
    }))
}

async fn unlock_seats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.count < 1 {
        return Err(CoreError::Validation("count must be at least 1".into()).into());
    }
    state
        .inventory
        .release(event_id, req.ticket_class, req.count, &req.seat_ids)
        .await?;
    Ok(Json(json!({ "status": "released" })))
}

async fn adjust_capacity(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(update): Json<CapacityUpdate>,
) -> Result<Json<Vec<ClassAvailability>>, ApiError> {
    state.inventory.adjust(event_id, &update).await?;
    let snapshot = snapshot(&state, event_id).await?;
    Ok(Json(snapshot))
}

async fn snapshot(state: &AppState, event_id: Uuid) -> Result<Vec<ClassAvailability>, ApiError> {
    let mut rows = Vec::with_capacity(TicketClass::ALL.len());
    for class in TicketClass::ALL {
        let available = state.inventory.availability(event_id, class).await?;
        rows.push(ClassAvailability { class, available });
    }
    Ok(rows)
}
