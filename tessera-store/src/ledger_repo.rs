use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tessera_core::{
    CoreError, CoreResult, NewReservation, Reservation, ReservationLedger,
};
use tessera_shared::{ReservationStatus, SeatRef, TicketClass};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, user_id, event_id, ticket_class, seat_count, seats, amount, \
                              status, idempotency_key, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    user_id: Uuid,
    event_id: Uuid,
    ticket_class: String,
    seat_count: i32,
    seats: serde_json::Value,
    amount: i64,
    status: String,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReservationRow {
    fn into_reservation(self) -> CoreResult<Reservation> {
        let seats: Vec<SeatRef> = serde_json::from_value(self.seats)
            .map_err(|e| CoreError::Unavailable(format!("ledger row {}: bad seats: {e}", self.id)))?;
        Ok(Reservation {
            id: self.id,
            user_id: self.user_id,
            event_id: self.event_id,
            ticket_class: parse_class(&self.ticket_class)?,
            seat_count: self.seat_count,
            seats,
            amount: self.amount,
            status: parse_status(&self.status)?,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_class(s: &str) -> CoreResult<TicketClass> {
    match s {
        "normal" => Ok(TicketClass::Normal),
        "vip" => Ok(TicketClass::Vip),
        "vvip" => Ok(TicketClass::Vvip),
        other => Err(CoreError::Unavailable(format!("unknown ticket class in ledger: {other}"))),
    }
}

fn parse_status(s: &str) -> CoreResult<ReservationStatus> {
    match s {
        "pending" => Ok(ReservationStatus::Pending),
        "confirmed" => Ok(ReservationStatus::Confirmed),
        "failed" => Ok(ReservationStatus::Failed),
        "cancelled" => Ok(ReservationStatus::Cancelled),
        other => Err(CoreError::Unavailable(format!("unknown status in ledger: {other}"))),
    }
}

fn unavailable(e: sqlx::Error) -> CoreError {
    CoreError::Unavailable(e.to_string())
}

fn rows_into(rows: Vec<ReservationRow>) -> CoreResult<Vec<Reservation>> {
    rows.into_iter().map(ReservationRow::into_reservation).collect()
}

/// Postgres-backed reservation ledger. The status column plus a conditional
/// `UPDATE ... WHERE status = $from` give the compare-and-set, and the unique
/// index on `idempotency_key` turns create replays into `Duplicate`.
#[derive(Clone)]
pub struct PgLedger {
    pool: Pool<Postgres>,
}

impl PgLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationLedger for PgLedger {
    async fn create(&self, new: NewReservation) -> CoreResult<Reservation> {
        let seats = serde_json::to_value(&new.seats)
            .map_err(|e| CoreError::Validation(format!("seats not serializable: {e}")))?;
        let sql = format!(
            "INSERT INTO reservations \
             (id, user_id, event_id, ticket_class, seat_count, seats, amount, status, idempotency_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8) \
             RETURNING {SELECT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(new.id)
            .bind(new.user_id)
            .bind(new.event_id)
            .bind(new.ticket_class.as_str())
            .bind(new.seat_count)
            .bind(&seats)
            .bind(new.amount)
            .bind(&new.idempotency_key)
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(row) => row.into_reservation(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let key = new.idempotency_key.as_deref().unwrap_or_default();
                match self.find_by_key(key).await? {
                    Some(existing) => Err(CoreError::Duplicate { existing: existing.id }),
                    None => Err(CoreError::Unavailable(format!(
                        "unique violation without a matching idempotency key: {db}"
                    ))),
                }
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> CoreResult<Reservation> {
        if !from.can_transition_to(to) {
            let current = self.get(id).await?.ok_or(CoreError::NotFound(id))?.status;
            return Err(CoreError::InvalidTransition { current, attempted: to });
        }
        let sql = format!(
            "UPDATE reservations SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3 \
             RETURNING {SELECT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match updated {
            Some(row) => row.into_reservation(),
            None => {
                let current = self.get(id).await?.ok_or(CoreError::NotFound(id))?.status;
                Err(CoreError::InvalidTransition { current, attempted: to })
            }
        }
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM reservations \
             WHERE status = 'pending' AND created_at < $1 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows_into(rows)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM reservations WHERE id = $1");
        let row = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(ReservationRow::into_reservation).transpose()
    }

    async fn find_by_key(&self, idempotency_key: &str) -> CoreResult<Option<Reservation>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM reservations WHERE idempotency_key = $1");
        let row = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(ReservationRow::into_reservation).transpose()
    }

    async fn for_event(&self, event_id: Uuid) -> CoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM reservations \
             WHERE event_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows_into(rows)
    }

    async fn for_user(&self, user_id: Uuid) -> CoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM reservations \
             WHERE user_id = $1 AND status = 'confirmed' ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows_into(rows)
    }

    async fn all(&self) -> CoreResult<Vec<Reservation>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM reservations ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows_into(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(class: &str, status: &str, seats: serde_json::Value) -> ReservationRow {
        ReservationRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            ticket_class: class.to_string(),
            seat_count: 2,
            seats,
            amount: 9000,
            status: status.to_string(),
            idempotency_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_maps_classes_statuses_and_seats() {
        let seats = serde_json::json!([
            {"id": "V1", "class": "vip"},
            {"id": "V2", "class": "vip"}
        ]);
        let reservation = row("vip", "confirmed", seats).into_reservation().unwrap();
        assert_eq!(reservation.ticket_class, TicketClass::Vip);
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.seat_ids(), vec!["V1", "V2"]);
    }

    #[test]
    fn row_with_unknown_status_is_refused() {
        let err = row("vip", "paid", serde_json::json!([])).into_reservation().unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
    }

    #[test]
    fn row_with_malformed_seats_is_refused() {
        let err = row("vip", "pending", serde_json::json!({"not": "a list"}))
            .into_reservation()
            .unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
    }
}
