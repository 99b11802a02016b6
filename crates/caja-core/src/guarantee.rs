//! # Guarantee State Tracker
//!
//! Derives a rental's deposit state by folding its movement history.
//! Nothing about the deposit is stored as a flag: the ledger is the state.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │           DEPOSIT_HELD           DEPOSIT_RETURNED                       │
//! │   NONE ────────────────► HELD ───────────────────► RETURNED (terminal) │
//! │                            │                                            │
//! │                            │     DEPOSIT_APPLIED                        │
//! │                            └─────────────────────► APPLIED  (terminal) │
//! │                                                                         │
//! │  Anything else is refused before it is written, and if it is ever      │
//! │  found in stored history the fold fails instead of guessing.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::guarantee::{GuaranteeState, GuaranteeStateTracker};
//! use caja_core::{MovementCategory, PaymentMovement};
//!
//! let history: Vec<PaymentMovement> = Vec::new();
//! let tracker = GuaranteeStateTracker::new("R1", &history);
//! assert_eq!(tracker.state().unwrap(), GuaranteeState::None);
//! assert!(tracker
//!     .assert_transition_allowed(MovementCategory::DepositReturned)
//!     .is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::category::MovementCategory;
use crate::error::{GuaranteeRule, LedgerError, LedgerResult};
use crate::money::Money;
use crate::types::PaymentMovement;

// =============================================================================
// Guarantee State
// =============================================================================

/// Deposit state of one rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuaranteeState {
    /// No deposit collected yet.
    #[default]
    None,
    /// Deposit collected and sitting in the register.
    Held,
    /// Deposit handed back. Terminal.
    Returned,
    /// Deposit kept for damages. Terminal.
    Applied,
}

impl GuaranteeState {
    /// RETURNED and APPLIED accept nothing further.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, GuaranteeState::Returned | GuaranteeState::Applied)
    }

    /// Applies one deposit category to this state.
    ///
    /// Non-deposit categories leave the state unchanged.
    pub fn next(self, category: MovementCategory) -> Result<GuaranteeState, GuaranteeRule> {
        use GuaranteeState as S;
        use MovementCategory as C;

        match (self, category) {
            (_, c) if !c.is_guarantee() => Ok(self),

            (S::None, C::DepositHeld) => Ok(S::Held),
            (S::Held, C::DepositReturned) => Ok(S::Returned),
            (S::Held, C::DepositApplied) => Ok(S::Applied),

            (S::Held, C::DepositHeld) => Err(GuaranteeRule::AlreadyCollected),
            (S::None, _) => Err(GuaranteeRule::NotHeld),
            (S::Returned | S::Applied, C::DepositHeld) => Err(GuaranteeRule::AlreadyCollected),
            (S::Returned | S::Applied, _) => Err(GuaranteeRule::AlreadySettled),

            // Held with a non-deposit category is handled by the first arm.
            (S::Held, _) => Ok(self),
        }
    }
}

impl fmt::Display for GuaranteeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuaranteeState::None => "NONE",
            GuaranteeState::Held => "HELD",
            GuaranteeState::Returned => "RETURNED",
            GuaranteeState::Applied => "APPLIED",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// Read-only view over one rental's movements.
///
/// `movements` may contain other rentals' movements; they are ignored.
/// The slice must be in creation order.
#[derive(Debug, Clone)]
pub struct GuaranteeStateTracker<'a> {
    rental_ref: &'a str,
    movements: Vec<&'a PaymentMovement>,
}

impl<'a> GuaranteeStateTracker<'a> {
    pub fn new(rental_ref: &'a str, movements: &'a [PaymentMovement]) -> Self {
        GuaranteeStateTracker {
            rental_ref,
            movements: movements
                .iter()
                .filter(|m| m.concerns_rental(rental_ref))
                .collect(),
        }
    }

    /// Rental this tracker folds.
    pub fn rental_ref(&self) -> &str {
        self.rental_ref
    }

    /// Folds every deposit movement in order.
    ///
    /// ## Errors
    /// `InconsistentGuaranteeHistory` naming the first movement the table
    /// does not allow.
    pub fn state(&self) -> LedgerResult<GuaranteeState> {
        self.movements
            .iter()
            .filter(|m| m.category.is_guarantee())
            .try_fold(GuaranteeState::None, |state, m| {
                state
                    .next(m.category)
                    .map_err(|_| LedgerError::InconsistentGuaranteeHistory {
                        rental_ref: self.rental_ref.to_string(),
                        movement_id: m.id.clone(),
                        state,
                        category: m.category,
                    })
            })
    }

    /// Deposit amount currently sitting in the register (zero unless HELD).
    pub fn held_amount(&self) -> LedgerResult<Money> {
        if self.state()? != GuaranteeState::Held {
            return Ok(Money::zero());
        }
        Ok(self
            .movements
            .iter()
            .filter(|m| m.category == MovementCategory::DepositHeld)
            .map(|m| m.amount())
            .sum())
    }

    /// Checks the state rule for a requested category.
    ///
    /// Returns the state the rental would be in after recording it.
    /// Non-deposit categories are always allowed.
    pub fn assert_transition_allowed(
        &self,
        requested: MovementCategory,
    ) -> LedgerResult<GuaranteeState> {
        let current = self.state()?;
        current
            .next(requested)
            .map_err(|rule| self.violation(current, requested, rule))
    }

    /// Checks the amount rules for a deposit movement.
    ///
    /// ## Rules
    /// - DEPOSIT_HELD must equal `configured_deposit` when that is positive
    /// - DEPOSIT_RETURNED / DEPOSIT_APPLIED may not exceed the held amount
    pub fn assert_amount_allowed(
        &self,
        requested: MovementCategory,
        amount: Money,
        configured_deposit: Money,
    ) -> LedgerResult<()> {
        match requested {
            MovementCategory::DepositHeld
                if configured_deposit.is_positive() && amount != configured_deposit =>
            {
                Err(self.violation(
                    self.state()?,
                    requested,
                    GuaranteeRule::AmountMismatch {
                        expected: configured_deposit,
                        requested: amount,
                    },
                ))
            }
            MovementCategory::DepositReturned | MovementCategory::DepositApplied => {
                let held = self.held_amount()?;
                if amount > held {
                    return Err(self.violation(
                        self.state()?,
                        requested,
                        GuaranteeRule::ExceedsHeldAmount {
                            held,
                            requested: amount,
                        },
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Total paid against the rental through BALANCE movements.
    pub fn balance_paid(&self) -> Money {
        self.movements
            .iter()
            .filter(|m| m.category == MovementCategory::Balance)
            .map(|m| m.amount())
            .sum()
    }

    /// `rental_total − Σ BALANCE`, floored at zero.
    pub fn remaining_balance(&self, rental_total: Money) -> Money {
        (rental_total - self.balance_paid()).floor_zero()
    }

    /// Refuses a BALANCE payment larger than what is still owed.
    pub fn assert_balance_allowed(&self, amount: Money, rental_total: Money) -> LedgerResult<()> {
        let remaining = self.remaining_balance(rental_total);
        if amount > remaining {
            return Err(LedgerError::BalanceExceeded {
                rental_ref: self.rental_ref.to_string(),
                remaining,
                requested: amount,
            });
        }
        Ok(())
    }

    fn violation(
        &self,
        state: GuaranteeState,
        requested: MovementCategory,
        rule: GuaranteeRule,
    ) -> LedgerError {
        LedgerError::GuaranteeRuleViolation {
            rental_ref: self.rental_ref.to_string(),
            state,
            requested,
            rule,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordMovement, TenderMethod};
    use chrono::Utc;

    fn movement(id: &str, rental: &str, category: MovementCategory, cents: i64) -> PaymentMovement {
        let amount = Money::from_cents(cents);
        let request =
            RecordMovement::new("S1", amount, TenderMethod::Cash, category).rental(rental);
        PaymentMovement::from_request(id, &request, Utc::now())
    }

    #[test]
    fn test_happy_path_hold_then_return() {
        let mut history = vec![movement("m1", "R1", MovementCategory::DepositHeld, 50000)];
        let tracker = GuaranteeStateTracker::new("R1", &history);
        assert_eq!(tracker.state().unwrap(), GuaranteeState::Held);
        assert_eq!(tracker.held_amount().unwrap().cents(), 50000);

        history.push(movement("m2", "R1", MovementCategory::DepositReturned, 50000));
        let tracker = GuaranteeStateTracker::new("R1", &history);
        assert_eq!(tracker.state().unwrap(), GuaranteeState::Returned);
        assert!(tracker.held_amount().unwrap().is_zero());
    }

    #[test]
    fn test_second_hold_after_return_is_refused() {
        let history = vec![
            movement("m1", "R1", MovementCategory::DepositHeld, 50000),
            movement("m2", "R1", MovementCategory::DepositReturned, 50000),
        ];
        let tracker = GuaranteeStateTracker::new("R1", &history);

        let err = tracker
            .assert_transition_allowed(MovementCategory::DepositHeld)
            .unwrap_err();
        match err {
            LedgerError::GuaranteeRuleViolation { state, rule, .. } => {
                assert_eq!(state, GuaranteeState::Returned);
                assert_eq!(rule, GuaranteeRule::AlreadyCollected);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_rentals_are_ignored() {
        let history = vec![
            movement("m1", "R2", MovementCategory::DepositHeld, 50000),
            movement("m2", "R2", MovementCategory::DepositApplied, 50000),
        ];
        let tracker = GuaranteeStateTracker::new("R1", &history);
        assert_eq!(tracker.state().unwrap(), GuaranteeState::None);
    }

    #[test]
    fn test_corrupt_history_fails_loudly() {
        let history = vec![
            movement("m1", "R1", MovementCategory::DepositHeld, 50000),
            movement("m2", "R1", MovementCategory::DepositReturned, 50000),
            movement("m3", "R1", MovementCategory::DepositApplied, 50000),
        ];
        let tracker = GuaranteeStateTracker::new("R1", &history);

        match tracker.state().unwrap_err() {
            LedgerError::InconsistentGuaranteeHistory {
                movement_id,
                state,
                category,
                ..
            } => {
                assert_eq!(movement_id, "m3");
                assert_eq!(state, GuaranteeState::Returned);
                assert_eq!(category, MovementCategory::DepositApplied);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Every derived read refuses too.
        assert!(tracker.held_amount().is_err());
        assert!(tracker
            .assert_transition_allowed(MovementCategory::Balance)
            .is_err());
    }

    /// Every sequence of up to four deposit requests: the tracker accepts a
    /// request exactly when the table allows it, and the replayed state of
    /// the accepted prefix equals the table fold.
    #[test]
    fn test_tracker_matches_transition_table_for_all_sequences() {
        let deposit = [
            MovementCategory::DepositHeld,
            MovementCategory::DepositReturned,
            MovementCategory::DepositApplied,
        ];

        let mut sequences: Vec<Vec<MovementCategory>> = vec![vec![]];
        for _ in 0..4 {
            let mut longer = Vec::new();
            for seq in &sequences {
                for c in deposit {
                    let mut next = seq.clone();
                    next.push(c);
                    longer.push(next);
                }
            }
            sequences.extend(longer);
        }

        for seq in sequences {
            let mut ledger: Vec<PaymentMovement> = Vec::new();
            let mut expected = GuaranteeState::None;

            for (i, category) in seq.iter().enumerate() {
                let table = expected.next(*category);
                let tracker = GuaranteeStateTracker::new("R1", &ledger);
                let checked = tracker.assert_transition_allowed(*category);

                match table {
                    Ok(next) => {
                        assert_eq!(checked.unwrap(), next, "{seq:?}");
                        ledger.push(movement(&format!("m{i}"), "R1", *category, 100));
                        expected = next;
                    }
                    Err(_) => assert!(checked.is_err(), "{seq:?} accepted {category}"),
                }
            }

            let tracker = GuaranteeStateTracker::new("R1", &ledger);
            assert_eq!(tracker.state().unwrap(), expected, "{seq:?}");
        }
    }

    #[test]
    fn test_deposit_amount_rules() {
        let empty = Vec::new();
        let tracker = GuaranteeStateTracker::new("R1", &empty);

        assert!(tracker
            .assert_amount_allowed(
                MovementCategory::DepositHeld,
                Money::from_cents(50000),
                Money::from_cents(50000)
            )
            .is_ok());
        // No configured deposit: any positive amount.
        assert!(tracker
            .assert_amount_allowed(
                MovementCategory::DepositHeld,
                Money::from_cents(100),
                Money::zero()
            )
            .is_ok());

        let err = tracker
            .assert_amount_allowed(
                MovementCategory::DepositHeld,
                Money::from_cents(40000),
                Money::from_cents(50000),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::GuaranteeRuleViolation {
                rule: GuaranteeRule::AmountMismatch { .. },
                ..
            }
        ));

        let history = vec![movement("m1", "R1", MovementCategory::DepositHeld, 50000)];
        let tracker = GuaranteeStateTracker::new("R1", &history);
        assert!(tracker
            .assert_amount_allowed(
                MovementCategory::DepositApplied,
                Money::from_cents(30000),
                Money::zero()
            )
            .is_ok());
        let err = tracker
            .assert_amount_allowed(
                MovementCategory::DepositReturned,
                Money::from_cents(60000),
                Money::zero(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::GuaranteeRuleViolation {
                rule: GuaranteeRule::ExceedsHeldAmount { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_remaining_balance() {
        let history = vec![
            movement("m1", "R1", MovementCategory::Balance, 120000),
            movement("m2", "R1", MovementCategory::DepositHeld, 50000),
            movement("m3", "R2", MovementCategory::Balance, 999999),
        ];
        let tracker = GuaranteeStateTracker::new("R1", &history);
        let total = Money::from_cents(200000);

        assert_eq!(tracker.remaining_balance(total).cents(), 80000);
        assert!(tracker.assert_balance_allowed(Money::from_cents(80000), total).is_ok());

        let err = tracker
            .assert_balance_allowed(Money::from_cents(80001), total)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::BalanceExceeded { remaining, .. } if remaining.cents() == 80000
        ));

        // Overpaid history floors at zero.
        assert!(tracker.remaining_balance(Money::from_cents(100000)).is_zero());
    }

    #[test]
    fn test_balance_above_total_is_refused_on_empty_history() {
        let empty = Vec::new();
        let tracker = GuaranteeStateTracker::new("R1", &empty);
        let err = tracker
            .assert_balance_allowed(Money::from_cents(250000), Money::from_cents(200000))
            .unwrap_err();
        assert!(matches!(err, LedgerError::BalanceExceeded { .. }));
    }
}
