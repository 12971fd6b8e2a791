use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_core::{CapacityUpdate, ClassTotals, CoreError, CoreResult, SeatInventory};
use tessera_shared::TicketClass;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct ClassCounter {
    available: i64,
    total: i64,
}

#[derive(Debug, Clone)]
struct SeatLock {
    holder: Uuid,
    /// `None` once the lock is pinned by a confirmed booking.
    expires_at: Option<DateTime<Utc>>,
}

impl SeatLock {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => at > now,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct EventInventory {
    counters: HashMap<TicketClass, ClassCounter>,
    locks: HashMap<String, SeatLock>,
}

/// In-memory seat inventory with the same contract as the Redis-backed one.
///
/// A single write guard makes every admission decision one indivisible step,
/// and lock expiry is checked against wall-clock time on read, so expired
/// holds behave as absent even before `purge_expired` removes them.
#[derive(Default)]
pub struct MemoryInventory {
    events: RwLock<HashMap<Uuid, EventInventory>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired seat locks. Pinned locks are kept. Returns how many were
    /// removed. Purging never moves a counter; `release` owns that.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut events = self.events.write().await;
        let mut removed = 0;
        for inv in events.values_mut() {
            let before = inv.locks.len();
            inv.locks.retain(|_, lock| lock.is_live(now));
            removed += before - inv.locks.len();
        }
        removed
    }
}

#[async_trait]
impl SeatInventory for MemoryInventory {
    async fn initialize(&self, event_id: Uuid, totals: &[ClassTotals]) -> CoreResult<()> {
        for t in totals {
            if t.total < 0 {
                return Err(CoreError::Validation(format!(
                    "total for {} must not be negative",
                    t.class
                )));
            }
        }
        let mut events = self.events.write().await;
        let inv = events.entry(event_id).or_default();
        for t in totals {
            inv.counters.insert(
                t.class,
                ClassCounter {
                    available: t.total,
                    total: t.total,
                },
            );
        }
        Ok(())
    }

    async fn reserve(
        &self,
        event_id: Uuid,
        class: TicketClass,
        count: i64,
        seats: &[String],
        ttl: Duration,
        holder: Uuid,
    ) -> CoreResult<bool> {
        if count <= 0 {
            return Err(CoreError::Validation("seat count must be positive".into()));
        }
        let now = Utc::now();
        let mut events = self.events.write().await;
        let Some(inv) = events.get_mut(&event_id) else {
            return Ok(false);
        };
        let Some(counter) = inv.counters.get(&class) else {
            return Ok(false);
        };
        if counter.available < count {
            return Ok(false);
        }
        for seat in seats {
            if inv.locks.get(seat).is_some_and(|l| l.is_live(now)) {
                return Ok(false);
            }
        }
        let expires_at = now + chrono::Duration::milliseconds(ttl.as_millis() as i64);
        for seat in seats {
            inv.locks.insert(
                seat.clone(),
                SeatLock {
                    holder,
                    expires_at: Some(expires_at),
                },
            );
        }
        if let Some(counter) = inv.counters.get_mut(&class) {
            counter.available -= count;
        }
        Ok(true)
    }

    async fn release(
        &self,
        event_id: Uuid,
        class: TicketClass,
        count: i64,
        seats: &[String],
    ) -> CoreResult<()> {
        let mut events = self.events.write().await;
        let Some(inv) = events.get_mut(&event_id) else {
            return Ok(());
        };
        for seat in seats {
            inv.locks.remove(seat);
        }
        if let Some(counter) = inv.counters.get_mut(&class) {
            counter.available = (counter.available + count).min(counter.total);
        }
        Ok(())
    }

    async fn finalize(&self, event_id: Uuid, seats: &[String], holder: Uuid) -> CoreResult<()> {
        let mut events = self.events.write().await;
        let inv = events.entry(event_id).or_default();
        for seat in seats {
            inv.locks.insert(
                seat.clone(),
                SeatLock {
                    holder,
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn availability(&self, event_id: Uuid, class: TicketClass) -> CoreResult<Option<i64>> {
        let events = self.events.read().await;
        Ok(events
            .get(&event_id)
            .and_then(|inv| inv.counters.get(&class))
            .map(|c| c.available))
    }

    async fn adjust(&self, event_id: Uuid, update: &CapacityUpdate) -> CoreResult<()> {
        if update.is_empty() {
            return Err(CoreError::Validation("no capacity fields provided".into()));
        }
        let mut events = self.events.write().await;
        let inv = events.entry(event_id).or_default();
        // Validate every provided class before touching any counter, so a
        // rejected update changes nothing.
        for class in TicketClass::ALL {
            let Some(new_total) = update.get(class) else {
                continue;
            };
            if new_total < 0 {
                return Err(CoreError::Validation(format!(
                    "total for {class} must not be negative"
                )));
            }
            if let Some(counter) = inv.counters.get(&class) {
                let taken = counter.total - counter.available;
                if new_total < taken {
                    return Err(CoreError::Validation(format!(
                        "total for {class} cannot drop below {taken} seats already taken"
                    )));
                }
            }
        }
        for class in TicketClass::ALL {
            let Some(new_total) = update.get(class) else {
                continue;
            };
            match inv.counters.get_mut(&class) {
                Some(counter) => {
                    counter.available += new_total - counter.total;
                    counter.total = new_total;
                }
                None => {
                    inv.counters.insert(
                        class,
                        ClassCounter {
                            available: new_total,
                            total: new_total,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(900);

    fn seats(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded(event_id: Uuid, normal: i64, vip: i64) -> MemoryInventory {
        let inv = MemoryInventory::new();
        inv.initialize(
            event_id,
            &[
                ClassTotals { class: TicketClass::Normal, total: normal },
                ClassTotals { class: TicketClass::Vip, total: vip },
            ],
        )
        .await
        .unwrap();
        inv
    }

    #[tokio::test]
    async fn reserve_decrements_and_locks() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;

        let granted = inv
            .reserve(event, TicketClass::Vip, 2, &seats(&["V1", "V2"]), TTL, Uuid::new_v4())
            .await
            .unwrap();
        assert!(granted);
        assert_eq!(inv.availability(event, TicketClass::Vip).await.unwrap(), Some(2));
        // Other classes are untouched.
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing_when_one_seat_is_held() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        assert!(inv
            .reserve(event, TicketClass::Normal, 1, &seats(&["A2"]), TTL, Uuid::new_v4())
            .await
            .unwrap());

        // A2 collides, so neither A1 nor A3 may be granted.
        let granted = inv
            .reserve(event, TicketClass::Normal, 3, &seats(&["A1", "A2", "A3"]), TTL, Uuid::new_v4())
            .await
            .unwrap();
        assert!(!granted);
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(9));

        // The untouched seats are still grantable afterwards.
        assert!(inv
            .reserve(event, TicketClass::Normal, 2, &seats(&["A1", "A3"]), TTL, Uuid::new_v4())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reserve_refuses_short_counter_without_partial_grant() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;

        let granted = inv
            .reserve(event, TicketClass::Vip, 5, &[], TTL, Uuid::new_v4())
            .await
            .unwrap();
        assert!(!granted);
        assert_eq!(inv.availability(event, TicketClass::Vip).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn reserve_on_unseeded_event_grants_nothing() {
        let inv = MemoryInventory::new();
        let granted = inv
            .reserve(Uuid::new_v4(), TicketClass::Normal, 1, &[], TTL, Uuid::new_v4())
            .await
            .unwrap();
        assert!(!granted);
    }

    #[tokio::test]
    async fn release_returns_count_and_frees_seats() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        let ids = seats(&["A1", "A2"]);
        assert!(inv.reserve(event, TicketClass::Normal, 2, &ids, TTL, Uuid::new_v4()).await.unwrap());

        inv.release(event, TicketClass::Normal, 2, &ids).await.unwrap();
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(10));
        assert!(inv.reserve(event, TicketClass::Normal, 2, &ids, TTL, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn release_clamps_at_total() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        let ids = seats(&["A1"]);
        assert!(inv.reserve(event, TicketClass::Normal, 1, &ids, TTL, Uuid::new_v4()).await.unwrap());

        inv.release(event, TicketClass::Normal, 1, &ids).await.unwrap();
        inv.release(event, TicketClass::Normal, 1, &ids).await.unwrap();
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn expired_lock_behaves_as_absent() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        let ids = seats(&["A1"]);
        assert!(inv
            .reserve(event, TicketClass::Normal, 1, &ids, Duration::from_millis(20), Uuid::new_v4())
            .await
            .unwrap());
        assert!(!inv.reserve(event, TicketClass::Normal, 1, &ids, TTL, Uuid::new_v4()).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(inv.purge_expired().await, 1);
        // Expiry only frees the seat id; the counter stays until release.
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(9));
        assert!(inv.reserve(event, TicketClass::Normal, 1, &ids, TTL, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn finalize_pins_locks_without_touching_the_counter() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        let holder = Uuid::new_v4();
        let ids = seats(&["A1", "A2"]);
        assert!(inv
            .reserve(event, TicketClass::Normal, 2, &ids, Duration::from_millis(20), holder)
            .await
            .unwrap());

        inv.finalize(event, &ids, holder).await.unwrap();
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(8));

        // Pinned locks survive both the TTL and a purge.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(inv.purge_expired().await, 0);
        assert!(!inv.reserve(event, TicketClass::Normal, 2, &ids, TTL, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn finalize_replays_and_reasserts_expired_locks() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        let holder = Uuid::new_v4();
        let ids = seats(&["A1"]);
        assert!(inv
            .reserve(event, TicketClass::Normal, 1, &ids, Duration::from_millis(10), holder)
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        inv.purge_expired().await;

        // The hold expired before confirmation landed; finalize restores it.
        inv.finalize(event, &ids, holder).await.unwrap();
        inv.finalize(event, &ids, holder).await.unwrap();
        assert!(!inv.reserve(event, TicketClass::Normal, 1, &ids, TTL, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn adjust_moves_availability_with_the_total() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        assert!(inv
            .reserve(event, TicketClass::Normal, 4, &[], TTL, Uuid::new_v4())
            .await
            .unwrap());

        let update = CapacityUpdate { normal: Some(20), ..Default::default() };
        inv.adjust(event, &update).await.unwrap();
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(16));
        // Only the provided field was applied.
        assert_eq!(inv.availability(event, TicketClass::Vip).await.unwrap(), Some(4));

        let shrink = CapacityUpdate { normal: Some(6), ..Default::default() };
        inv.adjust(event, &shrink).await.unwrap();
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn adjust_rejects_totals_below_seats_taken() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        assert!(inv
            .reserve(event, TicketClass::Normal, 6, &[], TTL, Uuid::new_v4())
            .await
            .unwrap());

        let update = CapacityUpdate { normal: Some(5), ..Default::default() };
        let err = inv.adjust(event, &update).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn adjust_rejects_empty_updates() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;

        let err = inv.adjust(event, &CapacityUpdate::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn adjust_seeds_classes_it_has_not_seen() {
        let event = Uuid::new_v4();
        let inv = MemoryInventory::new();
        let update = CapacityUpdate { vip: Some(9), ..Default::default() };
        inv.adjust(event, &update).await.unwrap();
        assert_eq!(inv.availability(event, TicketClass::Vip).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn reinitialize_resets_counters_but_keeps_locks() {
        let event = Uuid::new_v4();
        let inv = seeded(event, 10, 4).await;
        let ids = seats(&["A1"]);
        assert!(inv.reserve(event, TicketClass::Normal, 1, &ids, TTL, Uuid::new_v4()).await.unwrap());

        inv.initialize(event, &[ClassTotals { class: TicketClass::Normal, total: 30 }])
            .await
            .unwrap();
        assert_eq!(inv.availability(event, TicketClass::Normal).await.unwrap(), Some(30));
        assert!(!inv.reserve(event, TicketClass::Normal, 1, &ids, TTL, Uuid::new_v4()).await.unwrap());
    }
}
