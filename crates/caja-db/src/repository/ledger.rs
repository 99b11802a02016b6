//! # Payment Ledger
//!
//! Append-only store of movements: the single source of truth for money
//! in and out of the register.
//!
//! ## Ordering
//! Every read is ordered by `created_at ASC, rowid ASC`, so movements created
//! in the same instant still come back in insertion order. Guarantee folds
//! depend on this.
//!
//! ## Streams
//! `movements_for_session` / `movements_for_rental` return lazy streams.
//! Each call runs a new query, so a stream can be restarted by calling again.

use caja_core::PaymentMovement;
use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const MOVEMENT_COLUMNS: &str = r#"
    id, session_id, amount_cents, tender, direction, category,
    rental_ref, order_ref, client_ref, note, proof_ref, created_at
"#;

/// Repository for `payment_movements`.
#[derive(Debug, Clone)]
pub struct PaymentLedger {
    pool: SqlitePool,
}

impl PaymentLedger {
    /// Creates a new PaymentLedger.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentLedger { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends one movement. There is no update or delete.
    pub async fn append(conn: &mut SqliteConnection, movement: &PaymentMovement) -> DbResult<()> {
        debug!(
            id = %movement.id,
            session_id = %movement.session_id,
            category = ?movement.category,
            amount = %movement.amount(),
            "Appending payment movement"
        );

        sqlx::query(
            r#"
            INSERT INTO payment_movements (
                id, session_id, amount_cents, tender, direction, category,
                rental_ref, order_ref, client_ref, note, proof_ref, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.session_id)
        .bind(movement.amount_cents)
        .bind(movement.tender)
        .bind(movement.direction)
        .bind(movement.category)
        .bind(&movement.rental_ref)
        .bind(&movement.order_ref)
        .bind(&movement.client_ref)
        .bind(&movement.note)
        .bind(&movement.proof_ref)
        .bind(movement.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Lazy Reads
    // =========================================================================

    /// Movements of one session, oldest first.
    pub fn movements_for_session(
        &self,
        session_id: &str,
    ) -> BoxStream<'_, DbResult<PaymentMovement>> {
        debug!(session_id = %session_id, "Streaming session movements");

        sqlx::query_as::<_, PaymentMovement>(
            r#"
            SELECT id, session_id, amount_cents, tender, direction, category,
                   rental_ref, order_ref, client_ref, note, proof_ref, created_at
            FROM payment_movements
            WHERE session_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(session_id.to_owned())
        .fetch(&self.pool)
        .map_err(DbError::from)
        .boxed()
    }

    /// Movements of one rental across all sessions, oldest first.
    pub fn movements_for_rental(
        &self,
        rental_ref: &str,
    ) -> BoxStream<'_, DbResult<PaymentMovement>> {
        debug!(rental_ref = %rental_ref, "Streaming rental movements");

        sqlx::query_as::<_, PaymentMovement>(
            r#"
            SELECT id, session_id, amount_cents, tender, direction, category,
                   rental_ref, order_ref, client_ref, note, proof_ref, created_at
            FROM payment_movements
            WHERE rental_ref = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(rental_ref.to_owned())
        .fetch(&self.pool)
        .map_err(DbError::from)
        .boxed()
    }

    // =========================================================================
    // Collected Reads
    // =========================================================================

    /// Movements of one session, read through an existing connection.
    pub async fn movements_for_session_in(
        conn: &mut SqliteConnection,
        session_id: &str,
    ) -> DbResult<Vec<PaymentMovement>> {
        Self::collect_where(conn, "session_id", session_id).await
    }

    /// Movements of one rental, read through an existing connection.
    pub async fn movements_for_rental_in(
        conn: &mut SqliteConnection,
        rental_ref: &str,
    ) -> DbResult<Vec<PaymentMovement>> {
        Self::collect_where(conn, "rental_ref", rental_ref).await
    }

    async fn collect_where(
        conn: &mut SqliteConnection,
        column: &'static str,
        value: &str,
    ) -> DbResult<Vec<PaymentMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM payment_movements WHERE {column} = ?1 \
             ORDER BY created_at ASC, rowid ASC"
        );
        let movements = sqlx::query_as::<_, PaymentMovement>(&sql)
            .bind(value)
            .fetch_all(conn)
            .await?;

        Ok(movements)
    }

    /// Movements created in `[from, until)`, oldest first.
    pub async fn movements_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<PaymentMovement>> {
        debug!(%from, %until, "Loading movements in range");

        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM payment_movements \
             WHERE created_at >= ?1 AND created_at < ?2 \
             ORDER BY created_at ASC, rowid ASC"
        );
        let movements = sqlx::query_as::<_, PaymentMovement>(&sql)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Number of stored movements.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_movements")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::session::SessionRepository;
    use caja_core::{CashSession, Money, MovementCategory, RecordMovement, TenderMethod};
    use chrono::Duration;

    async fn db_with_open_session() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = CashSession {
            id: "S1".into(),
            opened_by: "op-1".into(),
            opened_at: Utc::now(),
            opening_cash_cents: 100000,
            opening_transfer_cents: 0,
            opening_notes: None,
            closed_at: None,
            counted_cash_cents: None,
            counted_transfer_cents: None,
            cash_variance_cents: None,
            transfer_variance_cents: None,
            closing_notes: None,
        };
        let mut conn = db.pool().acquire().await.unwrap();
        SessionRepository::insert(&mut conn, &session).await.unwrap();
        db
    }

    fn movement(
        id: &str,
        category: MovementCategory,
        cents: i64,
        at: DateTime<Utc>,
    ) -> PaymentMovement {
        let mut request =
            RecordMovement::new("S1", Money::from_cents(cents), TenderMethod::Cash, category);
        if category.requires_rental() {
            request = request.rental("R1");
        }
        PaymentMovement::from_request(id, &request, at)
    }

    #[tokio::test]
    async fn test_streams_are_ordered_and_restartable() {
        let db = db_with_open_session().await;
        let t0 = Utc::now();
        {
            let mut conn = db.pool().acquire().await.unwrap();
            // Same timestamp: insertion order breaks the tie.
            let rows = [
                movement("m1", MovementCategory::DepositHeld, 50000, t0),
                movement("m2", MovementCategory::DepositReturned, 50000, t0),
                movement("m3", MovementCategory::Services, 3000, t0 + Duration::seconds(1)),
            ];
            for m in &rows {
                PaymentLedger::append(&mut conn, m).await.unwrap();
            }
        }

        let ledger = db.ledger();
        for _ in 0..2 {
            let ids: Vec<String> = ledger
                .movements_for_session("S1")
                .map_ok(|m| m.id)
                .try_collect()
                .await
                .unwrap();
            assert_eq!(ids, ["m1", "m2", "m3"]);
        }

        let rental: Vec<PaymentMovement> =
            ledger.movements_for_rental("R1").try_collect().await.unwrap();
        assert_eq!(rental.len(), 2);
        assert_eq!(rental[1].category, MovementCategory::DepositReturned);
    }

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let db = db_with_open_session().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let m = movement("m1", MovementCategory::OtherIncome, 1000, Utc::now());
        PaymentLedger::append(&mut conn, &m).await.unwrap();

        let update = sqlx::query("UPDATE payment_movements SET amount_cents = 1 WHERE id = 'm1'")
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM payment_movements WHERE id = 'm1'")
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn test_schema_rejects_mismatched_direction() {
        let db = db_with_open_session().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut bad = movement("m1", MovementCategory::StaffPayment, 1000, Utc::now());
        bad.direction = caja_core::Direction::Income;

        assert!(PaymentLedger::append(&mut conn, &bad).await.is_err());
    }

    #[tokio::test]
    async fn test_schema_rejects_insert_into_closed_session() {
        let db = db_with_open_session().await;
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query(
            "UPDATE cash_sessions SET closed_at = ?1, counted_cash_cents = 0, open_slot = NULL \
             WHERE id = 'S1'",
        )
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .unwrap();

        let m = movement("m1", MovementCategory::OtherIncome, 1000, Utc::now());
        let err = PaymentLedger::append(&mut conn, &m).await.unwrap_err();
        assert!(
            matches!(err, DbError::QueryFailed(ref msg) if msg.contains("closed")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_movements_between_is_half_open() {
        let db = db_with_open_session().await;
        let t0 = Utc::now();
        {
            let mut conn = db.pool().acquire().await.unwrap();
            for (i, offset) in [0, 10, 20].into_iter().enumerate() {
                let at = t0 + Duration::seconds(offset);
                let m = movement(&format!("m{i}"), MovementCategory::OtherIncome, 100, at);
                PaymentLedger::append(&mut conn, &m).await.unwrap();
            }
        }

        let found = db
            .ledger()
            .movements_between(t0, t0 + Duration::seconds(20))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(db.ledger().count().await.unwrap(), 3);
    }
}
