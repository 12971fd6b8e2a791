use std::sync::Arc;

use tessera_booking::BookingOrchestrator;
use tessera_core::{EventRelay, ReservationLedger, ReservationPolicy, SeatInventory};
use tessera_shared::messages::SeatActivityMessage;
use tokio::sync::broadcast;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<dyn SeatInventory>,
    pub ledger: Arc<dyn ReservationLedger>,
    pub relay: Arc<dyn EventRelay>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub policy: ReservationPolicy,
    pub seat_tx: broadcast::Sender<SeatActivityMessage>,
    pub metrics: Arc<Metrics>,
}
