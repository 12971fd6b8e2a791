use std::sync::Arc;

use tessera_core::relay::publish_json;
use tessera_core::{
    CoreError, CoreResult, EventRelay, Reservation, ReservationLedger, ReservationPolicy,
    SeatInventory,
};
use tessera_shared::messages::{topics, AuditMessage};
use tessera_shared::ReservationStatus;
use tracing::{debug, info, warn};

/// Cancels reservations whose pending window ran out.
///
/// Each reservation releases inventory first and only then tries the
/// compare-and-set to `cancelled`. A crash in between leaves the row pending,
/// which the next sweep picks up again; losing the compare-and-set to a late
/// confirm or failure is undone by taking the released count back.
pub struct Reaper {
    inventory: Arc<dyn SeatInventory>,
    ledger: Arc<dyn ReservationLedger>,
    relay: Arc<dyn EventRelay>,
    policy: ReservationPolicy,
}

impl Reaper {
    pub fn new(
        inventory: Arc<dyn SeatInventory>,
        ledger: Arc<dyn ReservationLedger>,
        relay: Arc<dyn EventRelay>,
        policy: ReservationPolicy,
    ) -> Self {
        Self {
            inventory,
            ledger,
            relay,
            policy,
        }
    }

    /// One pass over every stale pending reservation. Returns how many were
    /// cancelled. A reservation that cannot be processed is logged and
    /// skipped; it stays pending for the next sweep.
    pub async fn sweep(&self) -> CoreResult<usize> {
        let stale = self.ledger.find_stale(self.policy.stale_cutoff()).await?;
        if stale.is_empty() {
            return Ok(0);
        }
        debug!(count = stale.len(), "sweeping stale reservations");
        let mut cancelled = 0;
        for reservation in stale {
            match self.reap(&reservation).await {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(booking_id = %reservation.id, error = %e, "sweep skipped a reservation");
                }
            }
        }
        Ok(cancelled)
    }

    /// Cancel one stale reservation. Returns `false` when a terminal writer
    /// got there first.
    pub async fn reap(&self, reservation: &Reservation) -> CoreResult<bool> {
        let seat_ids = reservation.seat_ids();
        self.inventory
            .release(
                reservation.event_id,
                reservation.ticket_class,
                reservation.seat_count as i64,
                &seat_ids,
            )
            .await?;

        let result = self
            .ledger
            .transition(reservation.id, ReservationStatus::Pending, ReservationStatus::Cancelled)
            .await;
        match result {
            Ok(_) => {
                info!(booking_id = %reservation.id, "stale reservation cancelled");
                let msg = AuditMessage::new(
                    Some(reservation.user_id),
                    "booking.cancelled",
                    format!("booking {} expired unconfirmed", reservation.id),
                );
                if let Err(e) =
                    publish_json(self.relay.as_ref(), topics::AUDIT_LOG, "booking.cancelled", &msg)
                        .await
                {
                    warn!(booking_id = %reservation.id, error = %e, "audit publish failed");
                }
                Ok(true)
            }
            Err(CoreError::InvalidTransition { current, .. }) => {
                debug!(booking_id = %reservation.id, %current, "lost the pending window; restoring inventory");
                self.undo_release(reservation, Some(current)).await;
                Ok(false)
            }
            Err(e) => {
                self.undo_release(reservation, None).await;
                Err(e)
            }
        }
    }

    /// Put back what this sweep released. The release deleted the snapshot's
    /// seat locks, so when a confirm won the race the sold seats must be
    /// pinned again before anyone else can grab them; pinning never moves the
    /// counter, which is restored count-only. A failed or cancelled winner
    /// releases its own hold, so its seats stay free and only the counter
    /// comes back. When the transition itself errored the row is still
    /// pending and keeps its whole hold, locks included.
    async fn undo_release(&self, reservation: &Reservation, winner: Option<ReservationStatus>) {
        if winner == Some(ReservationStatus::Confirmed) && !reservation.seats.is_empty() {
            if let Err(e) = self
                .inventory
                .finalize(reservation.event_id, &reservation.seat_ids(), reservation.id)
                .await
            {
                warn!(booking_id = %reservation.id, error = %e, "could not re-pin sold seats");
            }
        }
        let seat_ids = match winner {
            Some(_) => Vec::new(),
            None => reservation.seat_ids(),
        };
        let restored = self
            .inventory
            .reserve(
                reservation.event_id,
                reservation.ticket_class,
                reservation.seat_count as i64,
                &seat_ids,
                self.policy.seat_hold,
                reservation.id,
            )
            .await;
        match restored {
            Ok(true) => {}
            Ok(false) => {
                warn!(booking_id = %reservation.id, "could not restore released count; availability drifted");
            }
            Err(e) => {
                warn!(booking_id = %reservation.id, error = %e, "could not restore released count");
            }
        }
    }
}
