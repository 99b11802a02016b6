//! # Movement Categories
//!
//! The closed set of movement categories and the one table that derives a
//! movement's direction from its category.
//!
//! ## Category Table
//! ```text
//! ┌──────────────────────┬───────────┬────────────────────────────────────┐
//! │ Category             │ Direction │ Scope                              │
//! ├──────────────────────┼───────────┼────────────────────────────────────┤
//! │ DEPOSIT_HELD         │ INCOME    │ rental (deposit collected)         │
//! │ BALANCE              │ INCOME    │ rental (capped by remaining)       │
//! │ DEPOSIT_RETURNED     │ EXPENSE   │ rental (deposit given back)        │
//! │ DEPOSIT_APPLIED      │ EXPENSE   │ rental (deposit kept for damages)  │
//! │ SUPPLY_PURCHASE      │ EXPENSE   │ extraordinary                      │
//! │ STAFF_PAYMENT        │ EXPENSE   │ extraordinary                      │
//! │ SERVICES             │ EXPENSE   │ extraordinary                      │
//! │ MAINTENANCE          │ EXPENSE   │ extraordinary                      │
//! │ OTHER_INCOME         │ INCOME    │ extraordinary                      │
//! │ OTHER_EXPENSE        │ EXPENSE   │ extraordinary                      │
//! └──────────────────────┴───────────┴────────────────────────────────────┘
//! ```
//!
//! Callers never pass a direction. [`MovementCategory::direction`] is the
//! only place the mapping exists; the database repeats it as a CHECK
//! constraint so a hand-written INSERT cannot disagree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::LedgerError;

// =============================================================================
// Direction
// =============================================================================

/// Whether a movement puts money into the register or takes it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    /// Returns +1 for income and -1 for expense.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            Direction::Income => 1,
            Direction::Expense => -1,
        }
    }
}

// =============================================================================
// Movement Category
// =============================================================================

/// One of the ten fixed ledger categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementCategory {
    /// Refundable deposit collected against a rental.
    DepositHeld,
    /// Payment towards a rental's outstanding price.
    Balance,
    /// Deposit handed back to the client.
    DepositReturned,
    /// Deposit kept to cover damages.
    DepositApplied,
    SupplyPurchase,
    StaffPayment,
    Services,
    Maintenance,
    OtherIncome,
    OtherExpense,
}

impl MovementCategory {
    /// All categories in table order.
    pub const ALL: [MovementCategory; 10] = [
        MovementCategory::DepositHeld,
        MovementCategory::Balance,
        MovementCategory::DepositReturned,
        MovementCategory::DepositApplied,
        MovementCategory::SupplyPurchase,
        MovementCategory::StaffPayment,
        MovementCategory::Services,
        MovementCategory::Maintenance,
        MovementCategory::OtherIncome,
        MovementCategory::OtherExpense,
    ];

    /// The direction this category always has.
    pub const fn direction(&self) -> Direction {
        match self {
            MovementCategory::DepositHeld
            | MovementCategory::Balance
            | MovementCategory::OtherIncome => Direction::Income,

            MovementCategory::DepositReturned
            | MovementCategory::DepositApplied
            | MovementCategory::SupplyPurchase
            | MovementCategory::StaffPayment
            | MovementCategory::Services
            | MovementCategory::Maintenance
            | MovementCategory::OtherExpense => Direction::Expense,
        }
    }

    /// Rental-scoped categories must carry a rental reference.
    pub const fn requires_rental(&self) -> bool {
        !self.is_extraordinary()
    }

    /// Categories that move a rental's deposit state.
    pub const fn is_guarantee(&self) -> bool {
        matches!(
            self,
            MovementCategory::DepositHeld
                | MovementCategory::DepositReturned
                | MovementCategory::DepositApplied
        )
    }

    /// Business overhead not tied to a rental.
    pub const fn is_extraordinary(&self) -> bool {
        matches!(
            self,
            MovementCategory::SupplyPurchase
                | MovementCategory::StaffPayment
                | MovementCategory::Services
                | MovementCategory::Maintenance
                | MovementCategory::OtherIncome
                | MovementCategory::OtherExpense
        )
    }

    /// Wire/database name, e.g. `DEPOSIT_HELD`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementCategory::DepositHeld => "DEPOSIT_HELD",
            MovementCategory::Balance => "BALANCE",
            MovementCategory::DepositReturned => "DEPOSIT_RETURNED",
            MovementCategory::DepositApplied => "DEPOSIT_APPLIED",
            MovementCategory::SupplyPurchase => "SUPPLY_PURCHASE",
            MovementCategory::StaffPayment => "STAFF_PAYMENT",
            MovementCategory::Services => "SERVICES",
            MovementCategory::Maintenance => "MAINTENANCE",
            MovementCategory::OtherIncome => "OTHER_INCOME",
            MovementCategory::OtherExpense => "OTHER_EXPENSE",
        }
    }
}

impl fmt::Display for MovementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementCategory {
    type Err = LedgerError;

    /// Case-insensitive; anything outside the table is `UnknownCategory`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        MovementCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| LedgerError::UnknownCategory {
                category: s.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
