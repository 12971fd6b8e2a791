use uuid::Uuid;

use crate::seats::SeatRef;

/// Topic names shared by producers and consumers.
pub mod topics {
    /// Payment collaborator reports the outcome of a charge attempt.
    pub const PAYMENT_OUTCOME: &str = "payments.outcome";
    /// Emitted once a reservation reaches `confirmed`.
    pub const BOOKING_CONFIRMED: &str = "bookings.confirmed";
    /// Seat holds created, released or finalized; feeds live seat maps.
    pub const SEAT_ACTIVITY: &str = "seats.activity";
    /// Append-only trail of notable pipeline actions.
    pub const AUDIT_LOG: &str = "audit.log";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

/// Result of a charge attempt, keyed by the booking it settles.
///
/// Delivered at least once; consumers must tolerate replays.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentOutcomeMessage {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    /// Minor currency units (cents).
    pub amount: i64,
    pub outcome: PaymentOutcome,
}

/// Published after a reservation is durably confirmed.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedMessage {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub amount: i64,
    pub seat_count: i32,
    pub seats: Vec<SeatRef>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatActivityKind {
    Held,
    Released,
    Sold,
}

/// Seat-level change notification for live seat-map views.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatActivityMessage {
    pub event_id: Uuid,
    pub booking_id: Uuid,
    pub kind: SeatActivityKind,
    pub seats: Vec<SeatRef>,
    pub at: i64,
}

/// Audit trail entry. `detail` is free-form, human-readable.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AuditMessage {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub detail: String,
    pub at: i64,
}

impl AuditMessage {
    pub fn new(user_id: Option<Uuid>, action: impl Into<String>, detail: impl Into<String>) -> Self {
        AuditMessage {
            user_id,
            action: action.into(),
            detail: detail.into(),
            at: chrono::Utc::now().timestamp(),
        }
    }
}
