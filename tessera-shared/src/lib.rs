pub mod messages;
pub mod seats;
pub mod status;

pub use seats::{SeatRef, TicketClass};
pub use status::ReservationStatus;
