//! # Balance Reconciler
//!
//! Theoretical per-tender balances and the closing variance.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  theoretical(tender) = opening(tender)                                  │
//! │                      + Σ INCOME  movements on tender in session        │
//! │                      − Σ EXPENSE movements on tender in session        │
//! │                                                                         │
//! │  variance = counted − theoretical                                       │
//! │     > 0  SURPLUS        < 0  SHORTFALL        = 0  EXACT_MATCH         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balances are recomputed from the movements on every call and never
//! stored, so they cannot drift from the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::category::Direction;
use crate::money::Money;
use crate::types::{CashSession, PaymentMovement, TenderMethod};

// =============================================================================
// Report Types
// =============================================================================

/// Derived balance of one tender inside one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderBalance {
    pub tender: TenderMethod,
    pub opening_cents: i64,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub theoretical_cents: i64,
}

impl TenderBalance {
    #[inline]
    pub fn theoretical(&self) -> Money {
        Money::from_cents(self.theoretical_cents)
    }
}

/// How a physical count compares with the theoretical balance.
///
/// `ExactMatch` is its own outcome so callers can say "perfect match"
/// instead of folding zero into surplus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VarianceOutcome {
    Surplus,
    Shortfall,
    ExactMatch,
}

impl VarianceOutcome {
    pub fn from_variance(variance: Money) -> Self {
        if variance.is_positive() {
            VarianceOutcome::Surplus
        } else if variance.is_negative() {
            VarianceOutcome::Shortfall
        } else {
            VarianceOutcome::ExactMatch
        }
    }
}

/// Counted vs theoretical for one tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub tender: TenderMethod,
    pub theoretical_cents: i64,
    pub counted_cents: i64,
    /// counted − theoretical.
    pub variance_cents: i64,
    pub outcome: VarianceOutcome,
}

impl Reconciliation {
    #[inline]
    pub fn variance(&self) -> Money {
        Money::from_cents(self.variance_cents)
    }
}

/// Everything known about a session's money, open or closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionSummary {
    pub session_id: String,
    pub is_open: bool,
    pub movement_count: usize,
    pub cash: TenderBalance,
    pub transfer: TenderBalance,
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    pub total_theoretical_cents: i64,
    pub counted_cash_cents: Option<i64>,
    pub cash_variance_cents: Option<i64>,
    pub counted_transfer_cents: Option<i64>,
    pub transfer_variance_cents: Option<i64>,
}

/// What `close` hands back to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosingReport {
    pub session_id: String,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
    pub opening_cash_cents: i64,
    pub opening_transfer_cents: i64,
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    pub theoretical_cash_cents: i64,
    pub theoretical_transfer_cents: i64,
    pub total_theoretical_cents: i64,
    pub cash: Reconciliation,
    /// Present only when transfers were counted too.
    pub transfer: Option<Reconciliation>,
}

impl ClosingReport {
    /// Signed cash variance.
    pub fn variance(&self) -> Money {
        self.cash.variance()
    }

    pub fn outcome(&self) -> VarianceOutcome {
        self.cash.outcome
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Computes balances for one session from its movements.
///
/// Movements of other sessions are ignored, so the caller may pass a
/// wider slice.
#[derive(Debug, Clone)]
pub struct BalanceReconciler<'a> {
    session: &'a CashSession,
    movements: Vec<&'a PaymentMovement>,
}

impl<'a> BalanceReconciler<'a> {
    pub fn new(session: &'a CashSession, movements: &'a [PaymentMovement]) -> Self {
        BalanceReconciler {
            session,
            movements: movements
                .iter()
                .filter(|m| m.session_id == session.id)
                .collect(),
        }
    }

    fn sum(&self, tender: TenderMethod, direction: Direction) -> Money {
        self.movements
            .iter()
            .filter(|m| m.tender == tender && m.direction == direction)
            .map(|m| m.amount())
            .sum()
    }

    /// Opening, income, expense and theoretical for a tender.
    pub fn tender_balance(&self, tender: TenderMethod) -> TenderBalance {
        let opening = self.session.opening_amount(tender);
        let income = self.sum(tender, Direction::Income);
        let expense = self.sum(tender, Direction::Expense);

        TenderBalance {
            tender,
            opening_cents: opening.cents(),
            income_cents: income.cents(),
            expense_cents: expense.cents(),
            theoretical_cents: (opening + income - expense).cents(),
        }
    }

    /// opening + Σ income − Σ expense for one tender.
    pub fn theoretical_balance(&self, tender: TenderMethod) -> Money {
        self.tender_balance(tender).theoretical()
    }

    /// Sum of both tenders' theoretical balances.
    pub fn total_theoretical(&self) -> Money {
        TenderMethod::ALL
            .into_iter()
            .map(|t| self.theoretical_balance(t))
            .sum()
    }

    /// Compares counted cash with theoretical cash.
    pub fn reconcile(&self, counted_cash: Money) -> Reconciliation {
        self.reconcile_tender(TenderMethod::Cash, counted_cash)
    }

    /// Compares a counted amount with any tender's theoretical balance.
    pub fn reconcile_tender(&self, tender: TenderMethod, counted: Money) -> Reconciliation {
        let theoretical = self.theoretical_balance(tender);
        let variance = counted - theoretical;

        Reconciliation {
            tender,
            theoretical_cents: theoretical.cents(),
            counted_cents: counted.cents(),
            variance_cents: variance.cents(),
            outcome: VarianceOutcome::from_variance(variance),
        }
    }

    /// Full session picture, including stored closing figures if closed.
    pub fn summary(&self) -> SessionSummary {
        let cash = self.tender_balance(TenderMethod::Cash);
        let transfer = self.tender_balance(TenderMethod::Transfer);

        SessionSummary {
            session_id: self.session.id.clone(),
            is_open: self.session.is_open(),
            movement_count: self.movements.len(),
            cash,
            transfer,
            total_income_cents: cash.income_cents + transfer.income_cents,
            total_expense_cents: cash.expense_cents + transfer.expense_cents,
            total_theoretical_cents: cash.theoretical_cents + transfer.theoretical_cents,
            counted_cash_cents: self.session.counted_cash_cents,
            cash_variance_cents: self.session.cash_variance_cents,
            counted_transfer_cents: self.session.counted_transfer_cents,
            transfer_variance_cents: self.session.transfer_variance_cents,
        }
    }

    /// Builds the report persisted and returned by `close`.
    pub fn closing_report(
        &self,
        closed_at: DateTime<Utc>,
        counted_cash: Money,
        counted_transfer: Option<Money>,
    ) -> ClosingReport {
        let summary = self.summary();

        ClosingReport {
            session_id: self.session.id.clone(),
            closed_at,
            opening_cash_cents: self.session.opening_cash_cents,
            opening_transfer_cents: self.session.opening_transfer_cents,
            total_income_cents: summary.total_income_cents,
            total_expense_cents: summary.total_expense_cents,
            theoretical_cash_cents: summary.cash.theoretical_cents,
            theoretical_transfer_cents: summary.transfer.theoretical_cents,
            total_theoretical_cents: summary.total_theoretical_cents,
            cash: self.reconcile(counted_cash),
            transfer: counted_transfer.map(|c| self.reconcile_tender(TenderMethod::Transfer, c)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
