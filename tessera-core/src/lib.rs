pub mod inventory;
pub mod ledger;
pub mod policy;
pub mod relay;

use tessera_shared::{ReservationStatus, TicketClass};
use uuid::Uuid;

pub use inventory::{CapacityUpdate, ClassTotals, SeatInventory};
pub use ledger::{NewReservation, Reservation, ReservationLedger};
pub use policy::ReservationPolicy;
pub use relay::EventRelay;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Admission was refused: not enough seats, or a requested seat is
    /// already held. Nothing was granted.
    #[error("insufficient inventory for event {event_id}: requested {requested} {class} seat(s)")]
    InsufficientInventory {
        event_id: Uuid,
        class: TicketClass,
        requested: i64,
    },
    /// A reservation with the same idempotency key already exists.
    #[error("duplicate reservation request; existing booking {existing}")]
    Duplicate { existing: Uuid },
    /// Compare-and-set lost, or the requested edge does not exist in the
    /// state machine. Carries the state the reservation is actually in.
    #[error("invalid status transition to {attempted}: reservation is {current}")]
    InvalidTransition {
        current: ReservationStatus,
        attempted: ReservationStatus,
    },
    #[error("reservation {0} not found")]
    NotFound(Uuid),
    #[error("validation failed: {0}")]
    Validation(String),
    /// A backing store could not be reached. Callers fail closed.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    /// The relay refused a message. Redelivery is the recovery path.
    #[error("message delivery failed: {0}")]
    DeliveryFailure(String),
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Unavailable(_) | CoreError::DeliveryFailure(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
