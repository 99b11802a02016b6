//! # Report Aggregation
//!
//! Pure projections over movements for dashboards. The caller (the
//! reporter in caja-db) decides which movements to load; this module only
//! groups and sums them.
//!
//! ## Day Buckets
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  created_at (UTC) ──► + business offset ──► local date ──► bucket      │
//! │                                                                         │
//! │  2024-03-02T02:30Z with offset −03:00  ──►  2024-03-01 23:30  ──►      │
//! │  bucket 2024-03-01                                                      │
//! │                                                                         │
//! │  Only days that saw a movement appear in the output.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::category::Direction;
use crate::error::LedgerResult;
use crate::money::Money;
use crate::types::{PaymentMovement, TenderMethod};
use crate::validation::validate_date_range;

/// Percentages returned when there is no income to split.
pub const NEUTRAL_SPLIT: f64 = 50.0;

// =============================================================================
// Totals
// =============================================================================

/// Income, expense and net over a set of movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementTotals {
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    pub net_balance_cents: i64,
}

impl MovementTotals {
    pub fn from_movements<'a>(movements: impl IntoIterator<Item = &'a PaymentMovement>) -> Self {
        let (income, expense) = movements.into_iter().fold(
            (Money::zero(), Money::zero()),
            |(income, expense), m| match m.direction {
                Direction::Income => (income + m.amount(), expense),
                Direction::Expense => (income, expense + m.amount()),
            },
        );

        MovementTotals {
            total_income_cents: income.cents(),
            total_expense_cents: expense.cents(),
            net_balance_cents: (income - expense).cents(),
        }
    }

    pub fn net_balance(&self) -> Money {
        Money::from_cents(self.net_balance_cents)
    }
}

/// One movement as listed on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementLine {
    #[serde(flatten)]
    pub movement: PaymentMovement,
    /// Client name, or the bare reference when the directory has no entry.
    pub client_label: Option<String>,
}

impl MovementLine {
    /// Attaches the label for the movement's client, if it has one.
    pub fn labelled(movement: PaymentMovement, labels: &BTreeMap<String, String>) -> Self {
        let client_label = movement
            .client_ref
            .as_ref()
            .map(|client_ref| labels.get(client_ref).unwrap_or(client_ref).clone());
        MovementLine {
            movement,
            client_label,
        }
    }
}

/// Movements of the open session with their totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TodaysMovements {
    /// `None` when no session is open.
    pub session_id: Option<String>,
    pub movements: Vec<MovementLine>,
    pub totals: MovementTotals,
}

impl TodaysMovements {
    /// The result when the register is closed: empty, net zero.
    pub fn empty() -> Self {
        TodaysMovements::default()
    }

    /// `labels` maps client references to display names.
    pub fn for_session(
        session_id: impl Into<String>,
        movements: Vec<PaymentMovement>,
        labels: &BTreeMap<String, String>,
    ) -> Self {
        let totals = MovementTotals::from_movements(&movements);
        TodaysMovements {
            session_id: Some(session_id.into()),
            movements: movements
                .into_iter()
                .map(|m| MovementLine::labelled(m, labels))
                .collect(),
            totals,
        }
    }
}

// =============================================================================
// Cash Flow
// =============================================================================

/// Income and expense on one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyFlow {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub income_cents: i64,
    pub expense_cents: i64,
}

/// Per-day totals over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashFlow {
    #[ts(as = "String")]
    pub start: NaiveDate,
    #[ts(as = "String")]
    pub end: NaiveDate,
    /// Ascending by date; days without movements are omitted.
    pub days: Vec<DailyFlow>,
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
}

/// Local calendar date of a timestamp under the business offset.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// UTC instants `[from, until)` covering the local dates `start..=end`.
///
/// Used to narrow the SQL scan before exact bucketing.
pub fn utc_bounds(
    start: NaiveDate,
    end: NaiveDate,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let to_utc = |date: NaiveDate| {
        let local = date.and_time(NaiveTime::MIN);
        local
            .checked_sub_signed(shift)
            .map(|naive| Utc.from_utc_datetime(&naive))
    };

    let from = to_utc(start).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let until = end
        .succ_opt()
        .and_then(to_utc)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (from, until)
}

/// Groups movements into local days within `start..=end`.
///
/// ## Errors
/// `InvalidRange` when `start > end`.
pub fn flow_between(
    movements: &[PaymentMovement],
    start: NaiveDate,
    end: NaiveDate,
    offset: FixedOffset,
) -> LedgerResult<CashFlow> {
    validate_date_range(start, end)?;

    let mut buckets: BTreeMap<NaiveDate, (Money, Money)> = BTreeMap::new();
    for m in movements {
        let day = local_date(m.created_at, offset);
        if day < start || day > end {
            continue;
        }
        let entry = buckets.entry(day).or_default();
        match m.direction {
            Direction::Income => entry.0 += m.amount(),
            Direction::Expense => entry.1 += m.amount(),
        }
    }

    let days: Vec<DailyFlow> = buckets
        .into_iter()
        .map(|(date, (income, expense))| DailyFlow {
            date,
            income_cents: income.cents(),
            expense_cents: expense.cents(),
        })
        .collect();

    Ok(CashFlow {
        start,
        end,
        total_income_cents: days.iter().map(|d| d.income_cents).sum(),
        total_expense_cents: days.iter().map(|d| d.expense_cents).sum(),
        days,
    })
}

// =============================================================================
// Tender Distribution
// =============================================================================

/// One tender's share of income.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderShare {
    pub tender: TenderMethod,
    pub income_cents: i64,
    pub movement_count: usize,
    /// Rounded to one decimal place.
    pub percentage: f64,
}

/// Cash vs transfer share of income over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderDistribution {
    #[ts(as = "String")]
    pub start: NaiveDate,
    #[ts(as = "String")]
    pub end: NaiveDate,
    pub cash: TenderShare,
    pub transfer: TenderShare,
    /// True when there was no income and the neutral split was returned.
    pub is_default: bool,
}

/// Splits INCOME amounts between cash and transfer within `start..=end`.
///
/// With no income at all both shares are [`NEUTRAL_SPLIT`].
pub fn tender_distribution(
    movements: &[PaymentMovement],
    start: NaiveDate,
    end: NaiveDate,
    offset: FixedOffset,
) -> LedgerResult<TenderDistribution> {
    validate_date_range(start, end)?;

    let in_range: Vec<&PaymentMovement> = movements
        .iter()
        .filter(|m| m.direction == Direction::Income)
        .filter(|m| {
            let day = local_date(m.created_at, offset);
            day >= start && day <= end
        })
        .collect();

    let income_of = |tender: TenderMethod| -> (Money, usize) {
        in_range
            .iter()
            .filter(|m| m.tender == tender)
            .fold((Money::zero(), 0), |(sum, n), m| (sum + m.amount(), n + 1))
    };
    let (cash, cash_count) = income_of(TenderMethod::Cash);
    let (transfer, transfer_count) = income_of(TenderMethod::Transfer);
    let total = cash + transfer;
    let is_default = total.is_zero();

    let share = |tender, amount: Money, count| TenderShare {
        tender,
        income_cents: amount.cents(),
        movement_count: count,
        percentage: if is_default {
            NEUTRAL_SPLIT
        } else {
            amount.percentage_of(total)
        },
    };

    Ok(TenderDistribution {
        start,
        end,
        cash: share(TenderMethod::Cash, cash, cash_count),
        transfer: share(TenderMethod::Transfer, transfer, transfer_count),
        is_default,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
