use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_core::{CoreError, CoreResult, NewReservation, Reservation, ReservationLedger};
use tessera_shared::ReservationStatus;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    rows: HashMap<Uuid, Reservation>,
    by_key: HashMap<String, Uuid>,
}

/// Ledger kept entirely in memory, for tests and local runs.
///
/// Transition semantics match the Postgres ledger exactly; the pipeline tests
/// run against this implementation.
#[derive(Default)]
pub struct MemoryLedger {
    inner: RwLock<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `created_at` so sweeper tests can age a reservation.
    pub async fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.rows.get_mut(&id) {
            row.created_at = created_at;
        }
    }
}

#[async_trait]
impl ReservationLedger for MemoryLedger {
    async fn create(&self, new: NewReservation) -> CoreResult<Reservation> {
        let mut inner = self.inner.write().await;
        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = inner.by_key.get(key) {
                return Err(CoreError::Duplicate { existing: *existing });
            }
        }
        let now = Utc::now();
        let row = Reservation {
            id: new.id,
            user_id: new.user_id,
            event_id: new.event_id,
            ticket_class: new.ticket_class,
            seat_count: new.seat_count,
            seats: new.seats,
            amount: new.amount,
            status: ReservationStatus::Pending,
            idempotency_key: new.idempotency_key,
            created_at: now,
            updated_at: now,
        };
        if let Some(key) = &row.idempotency_key {
            inner.by_key.insert(key.clone(), row.id);
        }
        inner.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> CoreResult<Reservation> {
        let mut inner = self.inner.write().await;
        let row = inner.rows.get_mut(&id).ok_or(CoreError::NotFound(id))?;
        if row.status != from || !from.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                current: row.status,
                attempted: to,
            });
        }
        row.status = to;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<Reservation>> {
        let inner = self.inner.read().await;
        let mut stale: Vec<Reservation> = inner
            .rows
            .values()
            .filter(|r| r.status == ReservationStatus::Pending && r.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        Ok(stale)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        let inner = self.inner.read().await;
        Ok(inner.rows.get(&id).cloned())
    }

    async fn find_by_key(&self, idempotency_key: &str) -> CoreResult<Option<Reservation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .get(idempotency_key)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn for_event(&self, event_id: Uuid) -> CoreResult<Vec<Reservation>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Reservation> = inner
            .rows
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn for_user(&self, user_id: Uuid) -> CoreResult<Vec<Reservation>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Reservation> = inner
            .rows
            .values()
            .filter(|r| r.user_id == user_id && r.status == ReservationStatus::Confirmed)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn all(&self) -> CoreResult<Vec<Reservation>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Reservation> = inner.rows.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_shared::TicketClass;

    fn new_reservation(key: Option<&str>) -> NewReservation {
        NewReservation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            ticket_class: TicketClass::Normal,
            seat_count: 2,
            seats: vec![],
            amount: 5000,
            idempotency_key: key.map(String::from),
        }
    }

    #[tokio::test]
    async fn create_starts_pending() {
        let ledger = MemoryLedger::new();
        let r = ledger.create(new_reservation(None)).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(ledger.get(r.id).await.unwrap().unwrap().status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_key_reports_the_existing_booking() {
        let ledger = MemoryLedger::new();
        let first = ledger.create(new_reservation(Some("k-1"))).await.unwrap();
        let err = ledger.create(new_reservation(Some("k-1"))).await.unwrap_err();
        match err {
            CoreError::Duplicate { existing } => assert_eq!(existing, first.id),
            other => panic!("expected Duplicate, got {other:?}"),
        }
        assert_eq!(ledger.find_by_key("k-1").await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn transition_applies_only_the_matching_edge() {
        let ledger = MemoryLedger::new();
        let r = ledger.create(new_reservation(None)).await.unwrap();

        let confirmed = ledger
            .transition(r.id, ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
        assert!(confirmed.updated_at >= confirmed.created_at);
    }

    #[tokio::test]
    async fn lost_compare_and_set_reports_current_state() {
        let ledger = MemoryLedger::new();
        let r = ledger.create(new_reservation(None)).await.unwrap();
        ledger
            .transition(r.id, ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await
            .unwrap();

        // A late cancel loses the race and learns who won.
        let err = ledger
            .transition(r.id, ReservationStatus::Pending, ReservationStatus::Cancelled)
            .await
            .unwrap_err();
        match err {
            CoreError::InvalidTransition { current, attempted } => {
                assert_eq!(current, ReservationStatus::Confirmed);
                assert_eq!(attempted, ReservationStatus::Cancelled);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reverse_and_lateral_edges_are_rejected() {
        let ledger = MemoryLedger::new();
        let r = ledger.create(new_reservation(None)).await.unwrap();
        ledger
            .transition(r.id, ReservationStatus::Pending, ReservationStatus::Failed)
            .await
            .unwrap();

        for to in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            let err = ledger.transition(r.id, ReservationStatus::Failed, to).await.unwrap_err();
            assert!(matches!(err, CoreError::InvalidTransition { .. }));
        }
        assert_eq!(
            ledger.get(r.id).await.unwrap().unwrap().status,
            ReservationStatus::Failed
        );
    }

    #[tokio::test]
    async fn transition_on_unknown_id_is_not_found() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .transition(Uuid::new_v4(), ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_stale_only_sees_old_pending_rows() {
        let ledger = MemoryLedger::new();
        let old_pending = ledger.create(new_reservation(None)).await.unwrap();
        let old_confirmed = ledger.create(new_reservation(None)).await.unwrap();
        let fresh = ledger.create(new_reservation(None)).await.unwrap();

        let aged = Utc::now() - chrono::Duration::minutes(30);
        ledger.backdate(old_pending.id, aged).await;
        ledger.backdate(old_confirmed.id, aged).await;
        ledger
            .transition(old_confirmed.id, ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::minutes(15);
        let stale = ledger.find_stale(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old_pending.id);
        assert_ne!(stale[0].id, fresh.id);
    }

    #[tokio::test]
    async fn user_listing_is_confirmed_only() {
        let ledger = MemoryLedger::new();
        let user = Uuid::new_v4();
        let mut a = new_reservation(None);
        a.user_id = user;
        let mut b = new_reservation(None);
        b.user_id = user;
        let a = ledger.create(a).await.unwrap();
        ledger.create(b).await.unwrap();
        ledger
            .transition(a.id, ReservationStatus::Pending, ReservationStatus::Confirmed)
            .await
            .unwrap();

        let listed = ledger.for_user(user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a.id);
    }
}
