use std::time::Duration;

use async_trait::async_trait;
use tessera_shared::TicketClass;
use uuid::Uuid;

use crate::CoreResult;

/// Seed value for one class counter.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ClassTotals {
    pub class: TicketClass,
    pub total: i64,
}

/// Capacity change with a fixed schema; only the fields that are present are
/// applied. A class total can never drop below the number of seats already
/// taken from it.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CapacityUpdate {
    pub normal: Option<i64>,
    pub vip: Option<i64>,
    pub vvip: Option<i64>,
}

impl CapacityUpdate {
    pub fn get(&self, class: TicketClass) -> Option<i64> {
        match class {
            TicketClass::Normal => self.normal,
            TicketClass::Vip => self.vip,
            TicketClass::Vvip => self.vvip,
        }
    }

    pub fn is_empty(&self) -> bool {
        TicketClass::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

/// Admission control over per-event, per-class seat counters and seat locks.
///
/// `reserve` is the only admission path and is all-or-nothing: either every
/// requested seat gets locked and the counter is decremented in one atomic
/// step, or nothing changes.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Seed (or reseed) the class counters for an event. Existing seat locks
    /// are left alone.
    async fn initialize(&self, event_id: Uuid, totals: &[ClassTotals]) -> CoreResult<()>;

    /// Atomically lock every seat in `seats` for `holder` and take `count`
    /// from the class counter. Returns `false` (granting nothing) when the
    /// counter is missing or short, or when any requested seat is already
    /// locked. Locks expire after `ttl` unless finalized first.
    async fn reserve(
        &self,
        event_id: Uuid,
        class: TicketClass,
        count: i64,
        seats: &[String],
        ttl: Duration,
        holder: Uuid,
    ) -> CoreResult<bool>;

    /// Drop the locks on `seats` and return `count` to the class counter,
    /// clamped at the class total. The counter moves once per call, so a
    /// reservation must be released at most once.
    async fn release(
        &self,
        event_id: Uuid,
        class: TicketClass,
        count: i64,
        seats: &[String],
    ) -> CoreResult<()>;

    /// Pin the seat locks of a confirmed booking so they never expire. The
    /// counter is not touched; the decrement from `reserve` stands. Safe to
    /// replay, and re-asserts locks that already expired.
    async fn finalize(&self, event_id: Uuid, seats: &[String], holder: Uuid) -> CoreResult<()>;

    /// Remaining seats in one class, or `None` if the counter was never
    /// seeded.
    async fn availability(&self, event_id: Uuid, class: TicketClass) -> CoreResult<Option<i64>>;

    /// Apply the provided fields of `update` to the event's class totals,
    /// shifting availability by the same delta.
    async fn adjust(&self, event_id: Uuid, update: &CapacityUpdate) -> CoreResult<()>;
}
