//! # Session Repository
//!
//! Rows of `cash_sessions`.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. OPEN                                                               │
//! │     └── insert() → open_slot = 1, closed_at = NULL                     │
//! │         (UNIQUE(open_slot) refuses a second open row)                  │
//! │                                                                         │
//! │  2. CLOSE                                                              │
//! │     └── close() → counted/variance filled, open_slot = NULL            │
//! │                                                                         │
//! │  3. IMMUTABLE                                                          │
//! │     └── any further UPDATE or DELETE aborts in a trigger               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::CashSession;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const SESSION_COLUMNS: &str = r#"
    id, opened_by, opened_at, opening_cash_cents, opening_transfer_cents, opening_notes,
    closed_at, counted_cash_cents, counted_transfer_cents,
    cash_variance_cents, transfer_variance_cents, closing_notes
"#;

/// Closing figures written once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosing {
    pub closed_at: DateTime<Utc>,
    pub counted_cash_cents: i64,
    pub cash_variance_cents: i64,
    /// `None` unless transfers were counted.
    pub counted_transfer_cents: Option<i64>,
    pub transfer_variance_cents: Option<i64>,
    pub closing_notes: Option<String>,
}

/// Repository for cash session rows.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Gets a session by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Gets a session by ID through an existing connection.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = ?1");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(session)
    }

    /// The open session, if any.
    pub async fn find_open(&self) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_open_in(&mut conn).await
    }

    /// The open session, read through an existing connection.
    pub async fn find_open_in(conn: &mut SqliteConnection) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE closed_at IS NULL");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .fetch_optional(conn)
            .await?;

        Ok(session)
    }

    /// Most recently opened sessions first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<CashSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions ORDER BY opened_at DESC, rowid DESC LIMIT ?1"
        );
        let sessions = sqlx::query_as::<_, CashSession>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    /// Inserts a freshly opened session.
    ///
    /// Fails with `UniqueViolation` on `cash_sessions.open_slot` when a
    /// session is already open.
    pub async fn insert(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, opened_by = %session.opened_by, "Inserting cash session");

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, opened_by, opened_at, opening_cash_cents, opening_transfer_cents,
                opening_notes, open_slot
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
            "#,
        )
        .bind(&session.id)
        .bind(&session.opened_by)
        .bind(session.opened_at)
        .bind(session.opening_cash_cents)
        .bind(session.opening_transfer_cents)
        .bind(&session.opening_notes)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Writes the closing figures and releases the open slot.
    ///
    /// Returns false when the session was not open (nothing written).
    pub async fn close(
        conn: &mut SqliteConnection,
        id: &str,
        closing: &SessionClosing,
    ) -> DbResult<bool> {
        debug!(id = %id, counted_cash = closing.counted_cash_cents, "Closing cash session");

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                closed_at = ?2,
                counted_cash_cents = ?3,
                cash_variance_cents = ?4,
                counted_transfer_cents = ?5,
                transfer_variance_cents = ?6,
                closing_notes = ?7,
                open_slot = NULL
            WHERE id = ?1 AND closed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(closing.closed_at)
        .bind(closing.counted_cash_cents)
        .bind(closing.cash_variance_cents)
        .bind(closing.counted_transfer_cents)
        .bind(closing.transfer_variance_cents)
        .bind(&closing.closing_notes)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    fn open_session(id: &str) -> CashSession {
        CashSession {
            id: id.into(),
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
        }
    }

    fn closing(counted: i64) -> SessionClosing {
        SessionClosing {
            closed_at: Utc::now(),
            counted_cash_cents: counted,
            cash_variance_cents: counted - 100000,
            counted_transfer_cents: None,
            transfer_variance_cents: None,
            closing_notes: Some("fin del día".into()),
        }
    }

    #[tokio::test]
    async fn test_second_open_row_is_refused_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        SessionRepository::insert(&mut conn, &open_session("S1")).await.unwrap();
        let err = SessionRepository::insert(&mut conn, &open_session("S2"))
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on("cash_sessions.open_slot"), "{err:?}");
    }

    #[tokio::test]
    async fn test_close_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut conn = db.pool().acquire().await.unwrap();
            SessionRepository::insert(&mut conn, &open_session("S1")).await.unwrap();
            assert!(SessionRepository::close(&mut conn, "S1", &closing(98000)).await.unwrap());
            // Already closed: no row matches.
            assert!(!SessionRepository::close(&mut conn, "S1", &closing(1)).await.unwrap());
        }

        let stored = db.sessions().get("S1").await.unwrap().unwrap();
        assert!(!stored.is_open());
        assert_eq!(stored.counted_cash_cents, Some(98000));
        assert_eq!(stored.cash_variance_cents, Some(-2000));
        assert_eq!(stored.counted_transfer_cents, None);
        assert!(db.sessions().find_open().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_session_is_immutable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        SessionRepository::insert(&mut conn, &open_session("S1")).await.unwrap();
        SessionRepository::close(&mut conn, "S1", &closing(100000)).await.unwrap();

        let err: DbError =
            sqlx::query("UPDATE cash_sessions SET closing_notes = 'x' WHERE id = 'S1'")
                .execute(&mut *conn)
                .await
                .unwrap_err()
                .into();
        assert!(matches!(err, DbError::QueryFailed(_)), "{err:?}");

        let err: DbError = sqlx::query("DELETE FROM cash_sessions WHERE id = 'S1'")
            .execute(&mut *conn)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::QueryFailed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut conn = db.pool().acquire().await.unwrap();
            for id in ["S1", "S2", "S3"] {
                SessionRepository::insert(&mut conn, &open_session(id)).await.unwrap();
                SessionRepository::close(&mut conn, id, &closing(100000)).await.unwrap();
            }
        }

        let recent = db.sessions().recent(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S3", "S2"]);
    }
}
