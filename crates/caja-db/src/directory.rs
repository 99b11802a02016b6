//! # Directories
//!
//! Operators, rentals and clients are owned by other parts of the business.
//! The ledger only reads them, through these traits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CashSessionManager<D: Directory>                                       │
//! │       │                                                                 │
//! │       ├── open()    ──► OperatorDirectory::find_active_operator         │
//! │       ├── record()  ──► RentalDirectory::find_rental (total, deposit)  │
//! │       └── active_operators() ──► OperatorDirectory::active_operators    │
//! │                                                                         │
//! │  AggregationReporter<D: ClientDirectory>                                │
//! │       └── todays_movements() ──► ClientDirectory::find_client (labels)  │
//! │                                                                         │
//! │  Lookups run outside any ledger transaction, so a directory that        │
//! │  shares the ledger's pool never waits on the ledger's own connection.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;

use caja_core::{Client, Operator, RentalAccount};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

// =============================================================================
// Traits
// =============================================================================

/// Resolves operator references.
pub trait OperatorDirectory: Send + Sync {
    /// Returns the operator only if it exists and is active.
    fn find_active_operator(
        &self,
        operator_ref: &str,
    ) -> impl Future<Output = DbResult<Option<Operator>>> + Send;

    /// Operators who may open the register, by name.
    fn active_operators(&self) -> impl Future<Output = DbResult<Vec<Operator>>> + Send;
}

/// Resolves rental references to their totals and configured deposit.
pub trait RentalDirectory: Send + Sync {
    fn find_rental(
        &self,
        rental_ref: &str,
    ) -> impl Future<Output = DbResult<Option<RentalAccount>>> + Send;
}

/// Client labels. Never required for correctness.
pub trait ClientDirectory: Send + Sync {
    fn find_client(&self, client_ref: &str)
        -> impl Future<Output = DbResult<Option<Client>>> + Send;
}

/// Everything the ledger consumes from outside.
pub trait Directory: OperatorDirectory + RentalDirectory + ClientDirectory {}

impl<T> Directory for T where T: OperatorDirectory + RentalDirectory + ClientDirectory {}

// =============================================================================
// SQLite Implementation
// =============================================================================

/// Directory backed by the `operators`, `rentals` and `clients` tables.
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteDirectory { pool }
    }

    /// Inserts or replaces an operator (seeding and tests).
    pub async fn upsert_operator(&self, operator: &Operator) -> DbResult<()> {
        debug!(id = %operator.id, active = operator.is_active, "Upserting operator");

        sqlx::query(
            r#"
            INSERT INTO operators (id, name, is_active) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, is_active = excluded.is_active
            "#,
        )
        .bind(&operator.id)
        .bind(&operator.name)
        .bind(operator.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces a rental (seeding and tests).
    pub async fn upsert_rental(&self, rental: &RentalAccount) -> DbResult<()> {
        debug!(id = %rental.id, total = rental.total_cents, "Upserting rental");

        sqlx::query(
            r#"
            INSERT INTO rentals (id, client_ref, total_cents, deposit_cents) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                client_ref = excluded.client_ref,
                total_cents = excluded.total_cents,
                deposit_cents = excluded.deposit_cents
            "#,
        )
        .bind(&rental.id)
        .bind(&rental.client_ref)
        .bind(rental.total_cents)
        .bind(rental.deposit_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces a client (seeding and tests).
    pub async fn upsert_client(&self, client: &Client) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl OperatorDirectory for SqliteDirectory {
    async fn find_active_operator(&self, operator_ref: &str) -> DbResult<Option<Operator>> {
        let operator = sqlx::query_as::<_, Operator>(
            "SELECT id, name, is_active FROM operators WHERE id = ?1 AND is_active = 1",
        )
        .bind(operator_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(operator)
    }

    async fn active_operators(&self) -> DbResult<Vec<Operator>> {
        let operators = sqlx::query_as::<_, Operator>(
            "SELECT id, name, is_active FROM operators WHERE is_active = 1 ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(operators)
    }
}

impl RentalDirectory for SqliteDirectory {
    async fn find_rental(&self, rental_ref: &str) -> DbResult<Option<RentalAccount>> {
        let rental = sqlx::query_as::<_, RentalAccount>(
            "SELECT id, client_ref, total_cents, deposit_cents FROM rentals WHERE id = ?1",
        )
        .bind(rental_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rental)
    }
}

impl ClientDirectory for SqliteDirectory {
    async fn find_client(&self, client_ref: &str) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>("SELECT id, name FROM clients WHERE id = ?1")
            .bind(client_ref)
            .fetch_optional(&self.pool)
            .await?;

        Ok(client)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
