//! # Aggregation Reporter
//!
//! Read-only views over the ledger for dashboards.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  todays_movements()       open session ──► movements + totals          │
//! │                           no session   ──► empty, net 0                │
//! │                                                                         │
//! │  flow_between(a, b)       local dates a..=b                            │
//! │  tender_distribution(a,b)      │                                        │
//! │                                ▼                                        │
//! │                 utc_bounds(a, b, offset) ──► SQL range scan            │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                 bucket by local date (caja_core::report)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ranges span closed and open sessions alike. Client labels come from the
//! directory and are resolved after the ledger read has finished.

use std::collections::{BTreeMap, BTreeSet};

use caja_core::report::{self, utc_bounds};
use caja_core::validation::validate_date_range;
use caja_core::{CashFlow, PaymentMovement, TenderDistribution, TodaysMovements};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use tracing::debug;

use crate::directory::{ClientDirectory, SqliteDirectory};
use crate::error::CajaResult;
use crate::pool::Database;
use crate::repository::{PaymentLedger, SessionRepository};

/// Computes dashboard aggregates from the ledger on every call.
#[derive(Debug, Clone)]
pub struct AggregationReporter<D = SqliteDirectory> {
    db: Database,
    directory: D,
    offset: FixedOffset,
}

impl AggregationReporter {
    /// Reporter bucketing days in UTC.
    pub fn new(db: Database) -> Self {
        AggregationReporter::with_offset(db, Utc.fix())
    }

    /// Reporter bucketing days at the given business offset.
    pub fn with_offset(db: Database, offset: FixedOffset) -> Self {
        let directory = db.directory();
        AggregationReporter::with_directory(db, directory, offset)
    }
}

impl<D: ClientDirectory> AggregationReporter<D> {
    /// Reporter with a custom client directory.
    pub fn with_directory(db: Database, directory: D, offset: FixedOffset) -> Self {
        AggregationReporter {
            db,
            directory,
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Movements of the open session in creation order, with totals and a
    /// client label per movement.
    ///
    /// Never fails for lack of a session: returns an empty view instead.
    pub async fn todays_movements(&self) -> CajaResult<TodaysMovements> {
        let mut tx = self.db.pool().begin().await?;

        let Some(session) = SessionRepository::find_open_in(&mut *tx).await? else {
            tx.commit().await?;
            debug!("No open session; returning empty movement list");
            return Ok(TodaysMovements::empty());
        };
        let movements = PaymentLedger::movements_for_session_in(&mut *tx, &session.id).await?;
        tx.commit().await?;

        let labels = self.client_labels(&movements).await?;
        Ok(TodaysMovements::for_session(session.id, movements, &labels))
    }

    /// Per-day income and expense over local dates `start..=end`.
    pub async fn flow_between(&self, start: NaiveDate, end: NaiveDate) -> CajaResult<CashFlow> {
        let movements = self.movements_in(start, end).await?;
        Ok(report::flow_between(&movements, start, end, self.offset)?)
    }

    /// Cash vs transfer share of income over local dates `start..=end`.
    ///
    /// There is no implicit period: callers pass the window their dashboard
    /// shows, e.g. the current month.
    pub async fn tender_distribution(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CajaResult<TenderDistribution> {
        let movements = self.movements_in(start, end).await?;
        Ok(report::tender_distribution(&movements, start, end, self.offset)?)
    }

    /// Names of the clients referenced by `movements`. Unknown references
    /// are left out and shown as-is.
    async fn client_labels(
        &self,
        movements: &[PaymentMovement],
    ) -> CajaResult<BTreeMap<String, String>> {
        let refs: BTreeSet<&str> = movements
            .iter()
            .filter_map(|m| m.client_ref.as_deref())
            .collect();

        let mut labels = BTreeMap::new();
        for client_ref in refs {
            if let Some(client) = self.directory.find_client(client_ref).await? {
                labels.insert(client_ref.to_string(), client.name);
            }
        }
        Ok(labels)
    }

    async fn movements_in(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CajaResult<Vec<PaymentMovement>> {
        validate_date_range(start, end)?;

        let (from, until) = utc_bounds(start, end, self.offset);
        debug!(%start, %end, %from, %until, "Scanning movements for report");
        Ok(self.db.ledger().movements_between(from, until).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::CashSessionManager;
    use crate::pool::DbConfig;
    use caja_core::{
        CashSession, Client, LedgerError, Money, MovementCategory, Operator, RecordMovement,
        RentalAccount, TenderMethod,
    };
    use chrono::{DateTime, TimeZone};

    type Row = (DateTime<Utc>, MovementCategory, TenderMethod, i64);

    fn pesos(major: i64) -> Money {
        Money::from_major_minor(major, 0)
    }

    async fn manager() -> CashSessionManager {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.directory()
            .upsert_operator(&Operator {
                id: "op-1".into(),
                name: "Marta".into(),
                is_active: true,
            })
            .await
            .unwrap();
        CashSessionManager::new(db)
    }

    /// Writes a closed-day session with back-dated movements.
    async fn seed_day(db: &Database, session_id: &str, rows: &[Row]) {
        let mut conn = db.pool().acquire().await.unwrap();
        let session = CashSession {
            id: session_id.into(),
            opened_by: "op-1".into(),
            opened_at: rows[0].0,
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

        for (i, (at, category, tender, major)) in rows.iter().enumerate() {
            let request = RecordMovement::new(session_id, pesos(*major), *tender, *category);
            let movement =
                PaymentMovement::from_request(format!("{session_id}-{i}"), &request, *at);
            PaymentLedger::append(&mut conn, &movement).await.unwrap();
        }

        sqlx::query(
            "UPDATE cash_sessions SET closed_at = ?2, counted_cash_cents = 0, open_slot = NULL \
             WHERE id = ?1",
        )
        .bind(session_id)
        .bind(rows[rows.len() - 1].0)
        .execute(&mut *conn)
        .await
        .unwrap();
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_todays_movements_without_session_is_empty() {
        let manager = manager().await;
        let reporter = AggregationReporter::new(manager.database().clone());

        let today = reporter.todays_movements().await.unwrap();
        assert!(today.session_id.is_none());
        assert!(today.movements.is_empty());
        assert!(today.totals.net_balance().is_zero());
    }

    #[tokio::test]
    async fn test_todays_movements_follow_open_session() {
        let manager = manager().await;
        let reporter = AggregationReporter::new(manager.database().clone());

        let first = manager.open("op-1", pesos(100), None).await.unwrap();
        manager
            .record(RecordMovement::new(
                &first.id,
                pesos(40),
                TenderMethod::Cash,
                MovementCategory::OtherIncome,
            ))
            .await
            .unwrap();
        manager.close(pesos(140), None).await.unwrap();

        let second = manager.open("op-1", pesos(140), None).await.unwrap();
        for (amount, category) in [
            (pesos(70), MovementCategory::OtherIncome),
            (pesos(25), MovementCategory::Services),
        ] {
            manager
                .record(RecordMovement::new(&second.id, amount, TenderMethod::Cash, category))
                .await
                .unwrap();
        }

        let today = reporter.todays_movements().await.unwrap();
        assert_eq!(today.session_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(today.movements.len(), 2);
        assert_eq!(today.movements[0].movement.category, MovementCategory::OtherIncome);
        assert_eq!(today.totals.total_income_cents, pesos(70).cents());
        assert_eq!(today.totals.total_expense_cents, pesos(25).cents());
        assert_eq!(today.totals.net_balance(), pesos(45));
    }

    #[tokio::test]
    async fn test_todays_movements_label_clients() {
        let manager = manager().await;
        let db = manager.database().clone();
        let dir = db.directory();
        dir.upsert_client(&Client {
            id: "C1".into(),
            name: "Ana Pérez".into(),
        })
        .await
        .unwrap();
        dir.upsert_rental(&RentalAccount {
            id: "R1".into(),
            client_ref: Some("C1".into()),
            total_cents: pesos(2000).cents(),
            deposit_cents: pesos(500).cents(),
        })
        .await
        .unwrap();

        let session = manager.open("op-1", pesos(100), None).await.unwrap();
        let requests = [
            // Client comes from the rental.
            RecordMovement::new(
                &session.id,
                pesos(500),
                TenderMethod::Cash,
                MovementCategory::DepositHeld,
            )
            .rental("R1"),
            RecordMovement::new(
                &session.id,
                pesos(30),
                TenderMethod::Transfer,
                MovementCategory::OtherIncome,
            )
            .client("walk-in"),
            RecordMovement::new(
                &session.id,
                pesos(10),
                TenderMethod::Cash,
                MovementCategory::Services,
            ),
        ];
        for request in requests {
            manager.record(request).await.unwrap();
        }

        let today = AggregationReporter::new(db).todays_movements().await.unwrap();
        let labels: Vec<Option<&str>> = today
            .movements
            .iter()
            .map(|line| line.client_label.as_deref())
            .collect();
        assert_eq!(labels, [Some("Ana Pérez"), Some("walk-in"), None]);
        assert_eq!(today.movements[0].movement.client_ref.as_deref(), Some("C1"));
    }

    #[tokio::test]
    async fn test_flow_between_groups_by_local_day() {
        use MovementCategory as C;
        use TenderMethod as T;

        let manager = manager().await;
        let db = manager.database().clone();

        let first_day: [Row; 3] = [
            (at(2024, 3, 1, 14), C::OtherIncome, T::Cash, 100),
            (at(2024, 3, 1, 15), C::Services, T::Cash, 30),
            // 01:00 UTC on the 2nd is still the 1st at UTC−3.
            (at(2024, 3, 2, 1), C::OtherIncome, T::Transfer, 50),
        ];
        seed_day(&db, "S1", &first_day).await;
        let later: [Row; 2] = [
            (at(2024, 3, 3, 13), C::OtherIncome, T::Transfer, 200),
            (at(2024, 3, 5, 13), C::OtherIncome, T::Cash, 999),
        ];
        seed_day(&db, "S2", &later).await;

        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let reporter = AggregationReporter::with_offset(db, offset);
        let flow = reporter
            .flow_between(date(2024, 3, 1), date(2024, 3, 3))
            .await
            .unwrap();

        let days: Vec<(NaiveDate, i64, i64)> = flow
            .days
            .iter()
            .map(|d| (d.date, d.income_cents, d.expense_cents))
            .collect();
        assert_eq!(
            days,
            [
                (date(2024, 3, 1), pesos(150).cents(), pesos(30).cents()),
                (date(2024, 3, 3), pesos(200).cents(), 0),
            ]
        );
        assert_eq!(flow.total_income_cents, pesos(350).cents());
        assert_eq!(flow.total_expense_cents, pesos(30).cents());
    }

    #[tokio::test]
    async fn test_tender_distribution_weighs_income() {
        use MovementCategory as C;
        use TenderMethod as T;

        let manager = manager().await;
        let db = manager.database().clone();

        let rows: [Row; 3] = [
            (at(2024, 3, 1, 12), C::OtherIncome, T::Cash, 300),
            (at(2024, 3, 1, 13), C::OtherIncome, T::Transfer, 100),
            (at(2024, 3, 1, 14), C::StaffPayment, T::Transfer, 500),
        ];
        seed_day(&db, "S1", &rows).await;

        let reporter = AggregationReporter::new(db);
        let split = reporter
            .tender_distribution(date(2024, 3, 1), date(2024, 3, 1))
            .await
            .unwrap();

        assert!(!split.is_default);
        assert_eq!(split.cash.percentage, 75.0);
        assert_eq!(split.transfer.percentage, 25.0);
        assert_eq!(split.cash.movement_count, 1);
    }

    #[tokio::test]
    async fn test_empty_range_returns_neutral_split() {
        let manager = manager().await;
        let reporter = AggregationReporter::new(manager.database().clone());

        let split = reporter
            .tender_distribution(date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        assert!(split.is_default);
        assert_eq!(split.cash.percentage, report::NEUTRAL_SPLIT);
        assert_eq!(split.transfer.percentage, report::NEUTRAL_SPLIT);

        let flow = reporter
            .flow_between(date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        assert!(flow.days.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_is_refused() {
        let manager = manager().await;
        let reporter = AggregationReporter::new(manager.database().clone());

        let err = reporter
            .flow_between(date(2024, 3, 2), date(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(LedgerError::InvalidRange { .. })));

        assert!(reporter
            .tender_distribution(date(2024, 3, 2), date(2024, 3, 1))
            .await
            .is_err());
    }
}
