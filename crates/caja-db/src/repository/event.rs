//! # Session Event Repository
//!
//! Append-only history of what happened during a session: opened, each
//! movement, free-text notes, closed.

use caja_core::{SessionEvent, SessionEventKind};
use chrono::Utc;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// Repository for `cash_session_events`.
#[derive(Debug, Clone)]
pub struct SessionEventRepository {
    pool: SqlitePool,
}

impl SessionEventRepository {
    /// Creates a new SessionEventRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionEventRepository { pool }
    }

    /// Appends an event stamped now.
    pub async fn append(
        conn: &mut SqliteConnection,
        session_id: &str,
        kind: SessionEventKind,
        description: impl Into<String>,
        operator_ref: Option<&str>,
        details: Value,
    ) -> DbResult<SessionEvent> {
        let event = SessionEvent {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            kind,
            description: description.into(),
            operator_ref: operator_ref.map(str::to_string),
            details: details.to_string(),
            created_at: Utc::now(),
        };

        debug!(session_id = %session_id, kind = ?kind, "Appending session event");

        sqlx::query(
            r#"
            INSERT INTO cash_session_events (
                id, session_id, kind, description, operator_ref, details, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&event.id)
        .bind(&event.session_id)
        .bind(event.kind)
        .bind(&event.description)
        .bind(&event.operator_ref)
        .bind(&event.details)
        .bind(event.created_at)
        .execute(conn)
        .await?;

        Ok(event)
    }

    /// A session's events, oldest first.
    pub async fn history(&self, session_id: &str) -> DbResult<Vec<SessionEvent>> {
        let events = sqlx::query_as::<_, SessionEvent>(
            r#"
            SELECT id, session_id, kind, description, operator_ref, details, created_at
            FROM cash_session_events
            WHERE session_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::session::SessionRepository;
    use caja_core::CashSession;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_in_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut conn = db.pool().acquire().await.unwrap();
            let session = CashSession {
                id: "S1".into(),
                opened_by: "op-1".into(),
                opened_at: Utc::now(),
                opening_cash_cents: 0,
                opening_transfer_cents: 0,
                opening_notes: None,
                closed_at: None,
                counted_cash_cents: None,
                counted_transfer_cents: None,
                cash_variance_cents: None,
                transfer_variance_cents: None,
                closing_notes: None,
            };
            SessionRepository::insert(&mut conn, &session).await.unwrap();

            SessionEventRepository::append(
                &mut conn,
                "S1",
                SessionEventKind::Opened,
                "Caja abierta",
                Some("op-1"),
                json!({ "opening_cash_cents": 0 }),
            )
            .await
            .unwrap();
            SessionEventRepository::append(
                &mut conn,
                "S1",
                SessionEventKind::Note,
                "Cambio de turno",
                None,
                json!({}),
            )
            .await
            .unwrap();
        }

        let history = db.events().history("S1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, SessionEventKind::Opened);
        assert_eq!(history[0].details_json()["opening_cash_cents"], 0);
        assert_eq!(history[1].kind, SessionEventKind::Note);
        assert_eq!(history[1].operator_ref, None);

        assert!(db.events().history("S2").await.unwrap().is_empty());
    }
}
