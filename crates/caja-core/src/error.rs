//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── LedgerError      - Every refusal the ledger can issue             │
//! │  │   └── GuaranteeRule - Which deposit rule was broken                 │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CajaError        - LedgerError | DbError, returned by services    │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError → CajaError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Kinds
//! Every [`LedgerError`] belongs to exactly one [`ErrorKind`]. Callers use
//! the kind to decide how to present the refusal to the operator:
//!
//! | Kind | Variants | Meaning |
//! |---|---|---|
//! | State | `SessionAlreadyOpen`, `NoOpenSession` | retry the right operation |
//! | Validation | `InvalidAmount`, `UnknownCategory`, `InvalidRange`, `InvalidOperator`, ... | fix the request |
//! | BusinessRule | `GuaranteeRuleViolation`, `BalanceExceeded` | explain the rule |
//! | Consistency | `InconsistentGuaranteeHistory` | stored history is corrupt |
//!
//! Nothing is retried automatically.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::category::MovementCategory;
use crate::guarantee::GuaranteeState;
use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Wrong session state for the request.
    State,
    /// The request itself is malformed.
    Validation,
    /// The request is well formed but a money rule forbids it.
    BusinessRule,
    /// Stored history contradicts the ledger rules.
    Consistency,
}

// =============================================================================
// Guarantee Rule
// =============================================================================

/// The specific deposit rule a request broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum GuaranteeRule {
    /// A deposit was already collected for this rental.
    AlreadyCollected,

    /// Return/apply requested but no deposit is held.
    NotHeld,

    /// The deposit was already returned or applied.
    AlreadySettled,

    /// Collected amount differs from the rental's configured deposit.
    AmountMismatch { expected: Money, requested: Money },

    /// Returned/applied amount is larger than what was held.
    ExceedsHeldAmount { held: Money, requested: Money },
}

impl std::fmt::Display for GuaranteeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuaranteeRule::AlreadyCollected => {
                write!(f, "a deposit has already been collected for this rental")
            }
            GuaranteeRule::NotHeld => write!(f, "no deposit is currently held"),
            GuaranteeRule::AlreadySettled => {
                write!(f, "the deposit has already been returned or applied")
            }
            GuaranteeRule::AmountMismatch {
                expected,
                requested,
            } => write!(f, "deposit must be exactly {expected}, got {requested}"),
            GuaranteeRule::ExceedsHeldAmount { held, requested } => {
                write!(f, "only {held} is held, cannot settle {requested}")
            }
        }
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Every refusal issued by the cash session and payment ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A session is already open; close it first.
    #[error("A cash session is already open: {session_id}")]
    SessionAlreadyOpen { session_id: String },

    /// No session is open, or the referenced session is not the open one.
    ///
    /// ## When This Occurs
    /// ```text
    /// record(session_ref = S1) ──► open session is S2 (or none)
    ///      │
    ///      ▼
    /// NoOpenSession ──► UI asks the operator to open the register
    /// ```
    #[error("No cash session is open")]
    NoOpenSession,

    /// Operator reference does not resolve to an active operator.
    #[error("Operator '{operator_ref}' is not an active operator")]
    InvalidOperator { operator_ref: String },

    /// Amount is zero/negative where a positive amount is required.
    #[error("Invalid {field}: {amount}")]
    InvalidAmount { field: String, amount: Money },

    /// Category is not one of the fixed ledger categories.
    #[error("Unknown movement category: {category}")]
    UnknownCategory { category: String },

    /// Date range is inverted.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    /// A rental-scoped category was requested without a rental reference.
    #[error("Category {category} requires a rental reference")]
    MissingRentalReference { category: MovementCategory },

    /// The rental directory does not know this rental.
    #[error("Rental '{rental_ref}' not found")]
    UnknownRental { rental_ref: String },

    /// A deposit transition was refused.
    #[error("Deposit for rental {rental_ref} is {state}; cannot record {requested}: {rule}")]
    GuaranteeRuleViolation {
        rental_ref: String,
        state: GuaranteeState,
        requested: MovementCategory,
        rule: GuaranteeRule,
    },

    /// A BALANCE payment would pay more than what is owed.
    #[error("Balance payment of {requested} exceeds remaining {remaining} for rental {rental_ref}")]
    BalanceExceeded {
        rental_ref: String,
        remaining: Money,
        requested: Money,
    },

    /// Stored deposit history breaks the transition table.
    ///
    /// Fatal to the read. The state is never guessed.
    #[error(
        "Inconsistent deposit history for rental {rental_ref}: movement {movement_id} ({category}) after state {state}"
    )]
    InconsistentGuaranteeHistory {
        rental_ref: String,
        movement_id: String,
        state: GuaranteeState,
        category: MovementCategory,
    },

    /// Field-level validation failure.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    /// Classifies the error for presentation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::SessionAlreadyOpen { .. } | LedgerError::NoOpenSession => ErrorKind::State,

            LedgerError::InvalidOperator { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::UnknownCategory { .. }
            | LedgerError::InvalidRange { .. }
            | LedgerError::MissingRentalReference { .. }
            | LedgerError::UnknownRental { .. }
            | LedgerError::Validation(_) => ErrorKind::Validation,

            LedgerError::GuaranteeRuleViolation { .. } | LedgerError::BalanceExceeded { .. } => {
                ErrorKind::BusinessRule
            }

            LedgerError::InconsistentGuaranteeHistory { .. } => ErrorKind::Consistency,
        }
    }

    /// Shorthand for an `InvalidAmount` error.
    pub fn invalid_amount(field: impl Into<String>, amount: Money) -> Self {
        LedgerError::InvalidAmount {
            field: field.into(),
            amount,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any ledger rule is consulted.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., malformed amount string).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LedgerError::BalanceExceeded {
            rental_ref: "R1".to_string(),
            remaining: Money::from_cents(200000),
            requested: Money::from_cents(250000),
        };
        assert_eq!(
            err.to_string(),
            "Balance payment of $2500.00 exceeds remaining $2000.00 for rental R1"
        );

        let err = LedgerError::GuaranteeRuleViolation {
            rental_ref: "R1".to_string(),
            state: GuaranteeState::Returned,
            requested: MovementCategory::DepositHeld,
            rule: GuaranteeRule::AlreadyCollected,
        };
        assert!(err.to_string().contains("RETURNED"));
        assert!(err.to_string().contains("DEPOSIT_HELD"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(LedgerError::NoOpenSession.kind(), ErrorKind::State);
        assert_eq!(
            LedgerError::UnknownCategory {
                category: "TIP".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::InconsistentGuaranteeHistory {
                rental_ref: "R1".into(),
                movement_id: "m1".into(),
                state: GuaranteeState::None,
                category: MovementCategory::DepositReturned,
            }
            .kind(),
            ErrorKind::Consistency
        );
    }

    #[test]
    fn test_validation_converts_to_ledger_error() {
        let err: LedgerError = ValidationError::Required {
            field: "operator_ref".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
