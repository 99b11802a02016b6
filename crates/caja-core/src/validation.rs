//! # Validation Module
//!
//! Input checks that run before any ledger rule is consulted.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE                                                   │
//! │  ├── amounts positive / non-negative                                    │
//! │  ├── references non-empty                                               │
//! │  └── note lengths, date ranges                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ledger rules (guarantee tracker, balance cap, open session)  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── CHECK (amount_cents > 0), category ↔ direction CHECK              │
//! │  ├── UNIQUE open_slot (one open session)                                │
//! │  └── append-only triggers                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::Money;
use crate::types::RecordMovement;
use crate::MAX_NOTE_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amounts
// =============================================================================

/// Movement amounts must be strictly positive.
pub fn validate_movement_amount(amount: Money) -> LedgerResult<()> {
    if !amount.is_positive() {
        return Err(LedgerError::invalid_amount("movement amount", amount));
    }
    Ok(())
}

/// Opening cash may be zero but never negative.
pub fn validate_opening_amount(amount: Money) -> LedgerResult<()> {
    if amount.is_negative() {
        return Err(LedgerError::invalid_amount("opening cash", amount));
    }
    Ok(())
}

/// Counted amounts at closing may be zero but never negative.
pub fn validate_counted_amount(field: &str, amount: Money) -> LedgerResult<()> {
    if amount.is_negative() {
        return Err(LedgerError::invalid_amount(field, amount));
    }
    Ok(())
}

// =============================================================================
// Strings
// =============================================================================

/// A reference (operator, session, rental) must not be blank.
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Optional free text, at most [`MAX_NOTE_LENGTH`] characters.
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<()> {
    if let Some(note) = note {
        if note.chars().count() > MAX_NOTE_LENGTH {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_NOTE_LENGTH,
            });
        }
    }
    Ok(())
}

/// Session notes added after opening: required and bounded.
pub fn validate_session_note(text: &str) -> ValidationResult<()> {
    validate_reference("note", text)?;
    validate_note("note", Some(text))
}

// =============================================================================
// Requests
// =============================================================================

/// Shape checks for a movement request.
///
/// ## Checks
/// - amount > 0
/// - session reference present
/// - rental reference present for rental-scoped categories
/// - note length
pub fn validate_record_request(request: &RecordMovement) -> LedgerResult<()> {
    validate_movement_amount(request.amount)?;
    validate_reference("session_ref", &request.session_ref)?;

    let has_rental = request
        .rental_ref
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty());
    if request.category.requires_rental() && !has_rental {
        return Err(LedgerError::MissingRentalReference {
            category: request.category,
        });
    }

    validate_note("note", request.note.as_deref())?;
    Ok(())
}

/// Inclusive date range; start after end is refused.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> LedgerResult<()> {
    if start > end {
        return Err(LedgerError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::MovementCategory;
    use crate::types::TenderMethod;

    #[test]
    fn test_movement_amount() {
        assert!(validate_movement_amount(Money::from_cents(1)).is_ok());
        assert!(matches!(
            validate_movement_amount(Money::zero()),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(validate_movement_amount(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_opening_amount() {
        assert!(validate_opening_amount(Money::zero()).is_ok());
        assert!(validate_opening_amount(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_reference_and_notes() {
        assert!(validate_reference("operator_ref", "emp-1").is_ok());
        assert!(validate_reference("operator_ref", "   ").is_err());

        assert!(validate_note("note", None).is_ok());
        assert!(validate_note("note", Some(&"x".repeat(MAX_NOTE_LENGTH))).is_ok());
        assert!(validate_note("note", Some(&"x".repeat(MAX_NOTE_LENGTH + 1))).is_err());

        assert!(validate_session_note("").is_err());
        assert!(validate_session_note("drawer recounted").is_ok());
    }

    #[test]
    fn test_rental_reference_required() {
        let request = RecordMovement::new(
            "S1",
            Money::from_cents(100),
            TenderMethod::Cash,
            MovementCategory::Balance,
        );
        assert!(matches!(
            validate_record_request(&request),
            Err(LedgerError::MissingRentalReference { .. })
        ));

        assert!(validate_record_request(&request.clone().rental("R1")).is_ok());
        assert!(validate_record_request(&request.rental("  ")).is_err());

        let overhead = RecordMovement::new(
            "S1",
            Money::from_cents(100),
            TenderMethod::Cash,
            MovementCategory::Maintenance,
        );
        assert!(validate_record_request(&overhead).is_ok());
    }

    #[test]
    fn test_date_range() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(validate_date_range(d("2024-03-01"), d("2024-03-01")).is_ok());
        assert!(matches!(
            validate_date_range(d("2024-03-02"), d("2024-03-01")),
            Err(LedgerError::InvalidRange { .. })
        ));
    }
}
