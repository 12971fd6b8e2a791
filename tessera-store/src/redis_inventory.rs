use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tessera_core::{CapacityUpdate, ClassTotals, CoreError, CoreResult, SeatInventory};
use tessera_shared::TicketClass;
use tracing::debug;
use uuid::Uuid;

/// One round trip decides the whole grant: the counter must cover the count
/// and every seat key must be free, otherwise nothing is written.
const RESERVE_SCRIPT: &str = r#"
    local avail = tonumber(redis.call('GET', KEYS[1]))
    if avail == nil or avail < tonumber(ARGV[1]) then
        return 0
    end
    for i = 2, #KEYS do
        if redis.call('EXISTS', KEYS[i]) == 1 then
            return 0
        end
    end
    for i = 2, #KEYS do
        redis.call('SET', KEYS[i], ARGV[3], 'EX', ARGV[2])
    end
    redis.call('DECRBY', KEYS[1], ARGV[1])
    return 1
"#;

/// Unlocks are unconditional; the increment is clamped at the class total.
const RELEASE_SCRIPT: &str = r#"
    for i = 3, #KEYS do
        redis.call('DEL', KEYS[i])
    end
    local avail = redis.call('INCRBY', KEYS[1], ARGV[1])
    local total = tonumber(redis.call('GET', KEYS[2]))
    if total ~= nil and avail > total then
        redis.call('SET', KEYS[1], total)
        avail = total
    end
    return avail
"#;

/// KEYS holds counter/total pairs for every class, ARGV the new totals with
/// '-' for classes the update does not touch. Validates everything before
/// writing anything; returns 0 on success or the 1-based index of the class
/// whose total would drop below the seats already taken.
const ADJUST_SCRIPT: &str = r#"
    for i = 1, #ARGV do
        if ARGV[i] ~= '-' then
            local new_total = tonumber(ARGV[i])
            local avail = tonumber(redis.call('GET', KEYS[i * 2 - 1]))
            local total = tonumber(redis.call('GET', KEYS[i * 2]))
            if avail ~= nil and total ~= nil and new_total < (total - avail) then
                return i
            end
        end
    end
    for i = 1, #ARGV do
        if ARGV[i] ~= '-' then
            local new_total = tonumber(ARGV[i])
            local avail = tonumber(redis.call('GET', KEYS[i * 2 - 1]))
            local total = tonumber(redis.call('GET', KEYS[i * 2]))
            if avail == nil or total == nil then
                redis.call('SET', KEYS[i * 2 - 1], new_total)
                redis.call('SET', KEYS[i * 2], new_total)
            else
                redis.call('SET', KEYS[i * 2], new_total)
                redis.call('SET', KEYS[i * 2 - 1], avail + (new_total - total))
            end
        end
    end
    return 0
"#;

fn counter_key(event_id: Uuid, class: TicketClass) -> String {
    format!("event:{}:seats:{}", event_id, class)
}

fn total_key(event_id: Uuid, class: TicketClass) -> String {
    format!("event:{}:seats:{}:total", event_id, class)
}

fn seat_key(event_id: Uuid, seat: &str) -> String {
    format!("seat:{}:{}", event_id, seat)
}

fn unavailable(e: redis::RedisError) -> CoreError {
    CoreError::Unavailable(e.to_string())
}

/// Redis-backed seat inventory: one counter and one total per event/class,
/// one `SET ... EX` key per held seat. Seat locks expire on their own; the
/// counters only move through `reserve` and `release`.
#[derive(Clone)]
pub struct RedisInventory {
    client: redis::Client,
}

impl RedisInventory {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }
}

#[async_trait]
impl SeatInventory for RedisInventory {
    async fn initialize(&self, event_id: Uuid, totals: &[ClassTotals]) -> CoreResult<()> {
        for t in totals {
            if t.total < 0 {
                return Err(CoreError::Validation(format!(
                    "total for {} must not be negative",
                    t.class
                )));
            }
        }
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for t in totals {
            pipe.set(counter_key(event_id, t.class), t.total).ignore();
            pipe.set(total_key(event_id, t.class), t.total).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(unavailable)?;
        debug!(%event_id, classes = totals.len(), "seat counters seeded");
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
        let mut conn = self.conn().await?;
        let script = redis::Script::new(RESERVE_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(counter_key(event_id, class));
        for seat in seats {
            invocation.key(seat_key(event_id, seat));
        }
        invocation
            .arg(count)
            .arg(ttl.as_secs().max(1))
            .arg(holder.to_string());
        let granted: i64 = invocation.invoke_async(&mut conn).await.map_err(unavailable)?;
        Ok(granted == 1)
    }

    async fn release(
        &self,
        event_id: Uuid,
        class: TicketClass,
        count: i64,
        seats: &[String],
    ) -> CoreResult<()> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(RELEASE_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(counter_key(event_id, class));
        invocation.key(total_key(event_id, class));
        for seat in seats {
            invocation.key(seat_key(event_id, seat));
        }
        invocation.arg(count);
        let _: i64 = invocation.invoke_async(&mut conn).await.map_err(unavailable)?;
        Ok(())
    }

    async fn finalize(&self, event_id: Uuid, seats: &[String], holder: Uuid) -> CoreResult<()> {
        if seats.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for seat in seats {
            // Plain SET drops the TTL, pinning the lock for the sold seat.
            pipe.set(seat_key(event_id, seat), holder.to_string()).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(unavailable)?;
        Ok(())
    }

    async fn availability(&self, event_id: Uuid, class: TicketClass) -> CoreResult<Option<i64>> {
        let mut conn = self.conn().await?;
        let avail: Option<i64> = conn
            .get(counter_key(event_id, class))
            .await
            .map_err(unavailable)?;
        Ok(avail)
    }

    async fn adjust(&self, event_id: Uuid, update: &CapacityUpdate) -> CoreResult<()> {
        if update.is_empty() {
            return Err(CoreError::Validation("no capacity fields provided".into()));
        }
        for class in TicketClass::ALL {
            if update.get(class).is_some_and(|t| t < 0) {
                return Err(CoreError::Validation(format!(
                    "total for {class} must not be negative"
                )));
            }
        }
        let mut conn = self.conn().await?;
        let script = redis::Script::new(ADJUST_SCRIPT);
        let mut invocation = script.prepare_invoke();
        for class in TicketClass::ALL {
            invocation.key(counter_key(event_id, class));
            invocation.key(total_key(event_id, class));
        }
        for class in TicketClass::ALL {
            match update.get(class) {
                Some(total) => invocation.arg(total.to_string()),
                None => invocation.arg("-"),
            };
        }
        let outcome: i64 = invocation.invoke_async(&mut conn).await.map_err(unavailable)?;
        if outcome > 0 {
            let class = TicketClass::ALL[(outcome - 1) as usize];
            let taken_total = update.get(class).unwrap_or_default();
            return Err(CoreError::Validation(format!(
                "total {taken_total} for {class} is below the seats already taken"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_embed_event_class_and_seat() {
        let event = Uuid::nil();
        assert_eq!(
            counter_key(event, TicketClass::Vip),
            "event:00000000-0000-0000-0000-000000000000:seats:vip"
        );
        assert_eq!(
            total_key(event, TicketClass::Normal),
            "event:00000000-0000-0000-0000-000000000000:seats:normal:total"
        );
        assert_eq!(
            seat_key(event, "A-12"),
            "seat:00000000-0000-0000-0000-000000000000:A-12"
        );
    }
}
