use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_shared::{ReservationStatus, SeatRef, TicketClass};
use uuid::Uuid;

use crate::CoreResult;

/// A booking as recorded in the durable ledger.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub ticket_class: TicketClass,
    pub seat_count: i32,
    /// Explicit seat assignments; empty for count-only bookings.
    pub seats: Vec<SeatRef>,
    /// Minor currency units (cents).
    pub amount: i64,
    pub status: ReservationStatus,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn seat_ids(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.id.clone()).collect()
    }
}

/// Input for `ReservationLedger::create`. The caller picks the id so the same
/// token can name the seat locks.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub ticket_class: TicketClass,
    pub seat_count: i32,
    pub seats: Vec<SeatRef>,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

/// Durable system of record for reservations.
///
/// `transition` is the arbiter for the pending window: every terminal writer
/// (payment confirm, payment failure, the stale-hold sweeper) goes through
/// the same compare-and-set, so exactly one of them wins.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Insert a new `pending` reservation. Fails with `CoreError::Duplicate`
    /// when the idempotency key is already taken.
    async fn create(&self, new: NewReservation) -> CoreResult<Reservation>;

    /// Compare-and-set status change. Errors with
    /// `CoreError::InvalidTransition` when the stored status is not `from`,
    /// or when `from -> to` is not an edge of the state machine.
    async fn transition(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> CoreResult<Reservation>;

    /// Pending reservations created strictly before `cutoff`, oldest first.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<Reservation>>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Reservation>>;

    async fn find_by_key(&self, idempotency_key: &str) -> CoreResult<Option<Reservation>>;

    /// Every reservation for an event, newest first, all states included.
    async fn for_event(&self, event_id: Uuid) -> CoreResult<Vec<Reservation>>;

    /// A user's confirmed reservations, newest first.
    async fn for_user(&self, user_id: Uuid) -> CoreResult<Vec<Reservation>>;

    async fn all(&self) -> CoreResult<Vec<Reservation>>;
}
