use std::collections::HashSet;
use std::sync::Arc;

use tessera_core::relay::publish_json;
use tessera_core::{
    CoreError, CoreResult, EventRelay, NewReservation, Reservation, ReservationLedger,
    ReservationPolicy, SeatInventory,
};
use tessera_shared::messages::{topics, AuditMessage, BookingConfirmedMessage, PaymentOutcome, PaymentOutcomeMessage};
use tessera_shared::{ReservationStatus, SeatRef, TicketClass};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Booking request as accepted from the outside.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BookingRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub ticket_class: TicketClass,
    pub seat_count: i32,
    /// Explicit seat picks; may be empty for count-only bookings.
    #[serde(default)]
    pub seats: Vec<SeatRef>,
    /// Minor currency units (cents).
    pub amount: i64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// What a payment outcome delivery did to the reservation it names.
#[derive(Debug, Clone)]
pub enum Disposition {
    Confirmed(Reservation),
    /// Replayed success delivery; the confirmation notice was emitted again.
    Reconfirmed(Reservation),
    Failed(Reservation),
    /// Nothing to do: unknown booking, or a terminal writer already won.
    Dropped,
}

/// Drives a booking through reserve, record and settle.
///
/// Inventory is the gate and the ledger is the arbiter: a reservation only
/// exists once its seats are held, and only the ledger's compare-and-set
/// decides which terminal state wins the pending window.
pub struct BookingOrchestrator {
    inventory: Arc<dyn SeatInventory>,
    ledger: Arc<dyn ReservationLedger>,
    relay: Arc<dyn EventRelay>,
    policy: ReservationPolicy,
}

impl BookingOrchestrator {
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

    /// Admit and record a new booking.
    ///
    /// Replays of an earlier request (same idempotency key) return the
    /// original reservation instead of taking inventory twice.
    pub async fn create_booking(&self, req: BookingRequest) -> CoreResult<Reservation> {
        validate(&req)?;

        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = self.ledger.find_by_key(key).await? {
                debug!(booking_id = %existing.id, key, "replayed create; returning original");
                return Ok(existing);
            }
        }

        let booking_id = Uuid::new_v4();
        let seat_ids: Vec<String> = req.seats.iter().map(|s| s.id.clone()).collect();
        let granted = self
            .inventory
            .reserve(
                req.event_id,
                req.ticket_class,
                req.seat_count as i64,
                &seat_ids,
                self.policy.seat_hold,
                booking_id,
            )
            .await?;
        if !granted {
            return Err(CoreError::InsufficientInventory {
                event_id: req.event_id,
                class: req.ticket_class,
                requested: req.seat_count as i64,
            });
        }

        let created = self
            .ledger
            .create(NewReservation {
                id: booking_id,
                user_id: req.user_id,
                event_id: req.event_id,
                ticket_class: req.ticket_class,
                seat_count: req.seat_count,
                seats: req.seats.clone(),
                amount: req.amount,
                idempotency_key: req.idempotency_key.clone(),
            })
            .await;

        match created {
            Ok(reservation) => {
                info!(booking_id = %reservation.id, event_id = %req.event_id, "booking created");
                self.audit(
                    Some(req.user_id),
                    "booking.created",
                    format!(
                        "booking {} holds {} {} seat(s) for event {}",
                        reservation.id, req.seat_count, req.ticket_class, req.event_id
                    ),
                )
                .await;
                Ok(reservation)
            }
            Err(CoreError::Duplicate { existing }) => {
                // Two same-key requests raced past the lookup; this one holds
                // a second grant that must go back.
                self.undo_grant(&req, &seat_ids).await;
                match self.ledger.get(existing).await? {
                    Some(original) => Ok(original),
                    None => Err(CoreError::Duplicate { existing }),
                }
            }
            Err(e) => {
                self.undo_grant(&req, &seat_ids).await;
                Err(e)
            }
        }
    }

    /// Apply a payment outcome to the booking it names. Safe to replay.
    pub async fn handle_payment_outcome(
        &self,
        msg: &PaymentOutcomeMessage,
    ) -> CoreResult<Disposition> {
        match msg.outcome {
            PaymentOutcome::Success => self.confirm(msg.booking_id).await,
            PaymentOutcome::Failure => self.fail(msg.booking_id).await,
        }
    }

    async fn confirm(&self, booking_id: Uuid) -> CoreResult<Disposition> {
        let result = self
            .ledger
            .transition(booking_id, ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await;
        match result {
            Ok(reservation) => {
                info!(booking_id = %reservation.id, "booking confirmed");
                self.emit_confirmed(&reservation).await;
                self.audit(
                    Some(reservation.user_id),
                    "booking.confirmed",
                    format!("booking {} confirmed", reservation.id),
                )
                .await;
                Ok(Disposition::Confirmed(reservation))
            }
            Err(CoreError::InvalidTransition {
                current: ReservationStatus::Confirmed,
                ..
            }) => match self.ledger.get(booking_id).await? {
                // Replayed delivery. Emit the notice again; downstream
                // consumers are idempotent and the first emission may have
                // been lost.
                Some(reservation) => {
                    debug!(booking_id = %booking_id, "duplicate confirmation; re-emitting notice");
                    self.emit_confirmed(&reservation).await;
                    Ok(Disposition::Reconfirmed(reservation))
                }
                None => Ok(Disposition::Dropped),
            },
            Err(CoreError::InvalidTransition { current, .. }) => {
                info!(booking_id = %booking_id, %current, "confirmation arrived too late; dropping");
                Ok(Disposition::Dropped)
            }
            Err(CoreError::NotFound(_)) => {
                warn!(booking_id = %booking_id, "payment success for unknown booking; dropping");
                Ok(Disposition::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    async fn fail(&self, booking_id: Uuid) -> CoreResult<Disposition> {
        let result = self
            .ledger
            .transition(booking_id, ReservationStatus::Pending, ReservationStatus::Failed)
            .await;
        match result {
            Ok(reservation) => {
                info!(booking_id = %reservation.id, "payment failed; releasing hold");
                if let Err(e) = self
                    .inventory
                    .release(
                        reservation.event_id,
                        reservation.ticket_class,
                        reservation.seat_count as i64,
                        &reservation.seat_ids(),
                    )
                    .await
                {
                    // The row is already failed, so nothing retries this
                    // release. Seat locks still expire on their own.
                    warn!(booking_id = %reservation.id, error = %e, "release after payment failure did not land");
                }
                self.audit(
                    Some(reservation.user_id),
                    "booking.failed",
                    format!("booking {} failed payment", reservation.id),
                )
                .await;
                Ok(Disposition::Failed(reservation))
            }
            Err(CoreError::InvalidTransition {
                current: ReservationStatus::Failed,
                ..
            }) => {
                // Replayed failure. The hold went back when the first
                // delivery landed; releasing again would inflate the counter.
                debug!(booking_id = %booking_id, "duplicate payment failure; dropping");
                Ok(Disposition::Dropped)
            }
            Err(CoreError::InvalidTransition { current, .. }) => {
                info!(booking_id = %booking_id, %current, "payment failure arrived too late; dropping");
                Ok(Disposition::Dropped)
            }
            Err(CoreError::NotFound(_)) => {
                warn!(booking_id = %booking_id, "payment failure for unknown booking; dropping");
                Ok(Disposition::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    async fn emit_confirmed(&self, reservation: &Reservation) {
        let msg = BookingConfirmedMessage {
            booking_id: reservation.id,
            user_id: reservation.user_id,
            event_id: reservation.event_id,
            amount: reservation.amount,
            seat_count: reservation.seat_count,
            seats: reservation.seats.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = publish_json(
            self.relay.as_ref(),
            topics::BOOKING_CONFIRMED,
            &reservation.id.to_string(),
            &msg,
        )
        .await
        {
            // The confirm is durable; a replayed payment outcome re-emits.
            warn!(booking_id = %reservation.id, error = %e, "confirmation notice not delivered");
        }
    }

    async fn undo_grant(&self, req: &BookingRequest, seat_ids: &[String]) {
        if let Err(e) = self
            .inventory
            .release(req.event_id, req.ticket_class, req.seat_count as i64, seat_ids)
            .await
        {
            warn!(event_id = %req.event_id, error = %e, "compensating release did not land");
        }
    }

    async fn audit(&self, user_id: Option<Uuid>, action: &str, detail: String) {
        let msg = AuditMessage::new(user_id, action, detail);
        if let Err(e) = publish_json(self.relay.as_ref(), topics::AUDIT_LOG, action, &msg).await {
            warn!(action, error = %e, "audit publish failed");
        }
    }
}

fn validate(req: &BookingRequest) -> CoreResult<()> {
    if req.seat_count < 1 {
        return Err(CoreError::Validation("seat_count must be at least 1".into()));
    }
    if req.amount < 1 {
        return Err(CoreError::Validation("amount must be positive".into()));
    }
    if req.seats.is_empty() {
        return Ok(());
    }
    if req.seats.len() != req.seat_count as usize {
        return Err(CoreError::Validation(format!(
            "{} seat(s) requested but {} seat id(s) given",
            req.seat_count,
            req.seats.len()
        )));
    }
    let mut seen = HashSet::new();
    for seat in &req.seats {
        if seat.class != req.ticket_class {
            return Err(CoreError::Validation(format!(
                "seat {} is {} but the booking is {}",
                seat.id, seat.class, req.ticket_class
            )));
        }
        if !seen.insert(seat.id.as_str()) {
            return Err(CoreError::Validation(format!("seat {} listed twice", seat.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookingRequest {
        BookingRequest {
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            ticket_class: TicketClass::Vip,
            seat_count: 2,
            seats: vec![SeatRef::new("V1", TicketClass::Vip), SeatRef::new("V2", TicketClass::Vip)],
            amount: 12000,
            idempotency_key: None,
        }
    }

    #[test]
    fn accepts_count_only_and_seat_based_requests() {
        assert!(validate(&request()).is_ok());
        let mut count_only = request();
        count_only.seats.clear();
        assert!(validate(&count_only).is_ok());
    }

    #[test]
    fn rejects_count_and_seat_list_mismatch() {
        let mut req = request();
        req.seat_count = 3;
        assert!(matches!(validate(&req), Err(CoreError::Validation(_))));
    }

    #[test]
    fn rejects_seats_from_another_class() {
        let mut req = request();
        req.seats[1] = SeatRef::new("A7", TicketClass::Normal);
        assert!(matches!(validate(&req), Err(CoreError::Validation(_))));
    }

    #[test]
    fn rejects_repeated_seat_ids() {
        let mut req = request();
        req.seats[1] = req.seats[0].clone();
        assert!(matches!(validate(&req), Err(CoreError::Validation(_))));
    }

    #[test]
    fn rejects_nonpositive_count_and_amount() {
        let mut req = request();
        req.seat_count = 0;
        req.seats.clear();
        assert!(matches!(validate(&req), Err(CoreError::Validation(_))));

        let mut req = request();
        req.amount = 0;
        assert!(matches!(validate(&req), Err(CoreError::Validation(_))));
    }
}
