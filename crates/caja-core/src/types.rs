//! # Domain Types
//!
//! Entities stored by the ledger and the records read from directories.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐      │
//! │  │  CashSession    │   │ PaymentMovement  │   │  SessionEvent   │      │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────  │      │
//! │  │  id (UUID)      │◄──│  session_id      │   │  session_id     │      │
//! │  │  opened_by      │   │  amount_cents    │   │  kind           │      │
//! │  │  opening_*      │   │  tender          │   │  details (JSON) │      │
//! │  │  closed_at      │   │  category ──► direction                │      │
//! │  │  counted/var.   │   │  rental_ref?     │   └─────────────────┘      │
//! │  └─────────────────┘   └──────────────────┘                             │
//! │                                                                         │
//! │  Directory records (owned elsewhere, read-only here):                  │
//! │  Operator, RentalAccount, Client                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Movements are immutable once created. A correction is a new movement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::category::{Direction, MovementCategory};
use crate::money::Money;

// =============================================================================
// Tender Method
// =============================================================================

/// How money moved: physical cash or bank transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderMethod {
    Cash,
    Transfer,
}

impl TenderMethod {
    pub const ALL: [TenderMethod; 2] = [TenderMethod::Cash, TenderMethod::Transfer];
}

impl std::fmt::Display for TenderMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenderMethod::Cash => write!(f, "CASH"),
            TenderMethod::Transfer => write!(f, "TRANSFER"),
        }
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// One continuous interval during which the register is open.
///
/// At most one session has `closed_at = None`. Closing fills the `counted_*`
/// and `*_variance_*` fields exactly once; the row never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Operator who opened the register.
    pub opened_by: String,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    /// Cash in the drawer at opening.
    pub opening_cash_cents: i64,

    /// Always zero at opening.
    pub opening_transfer_cents: i64,

    pub opening_notes: Option<String>,

    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Physically counted cash at closing.
    pub counted_cash_cents: Option<i64>,

    /// Counted transfer total, only when the operator reconciled transfers.
    pub counted_transfer_cents: Option<i64>,

    /// counted − theoretical, cash.
    pub cash_variance_cents: Option<i64>,

    /// counted − theoretical, transfer.
    pub transfer_variance_cents: Option<i64>,

    pub closing_notes: Option<String>,
}

impl CashSession {
    /// Returns true while the session accepts movements.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Opening amount for a tender.
    pub fn opening_amount(&self, tender: TenderMethod) -> Money {
        match tender {
            TenderMethod::Cash => Money::from_cents(self.opening_cash_cents),
            TenderMethod::Transfer => Money::from_cents(self.opening_transfer_cents),
        }
    }
}

// =============================================================================
// Payment Movement
// =============================================================================

/// A request to record one movement.
///
/// Carries no direction: the ledger derives it from `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordMovement {
    /// Session the caller believes is open.
    pub session_ref: String,
    pub amount: Money,
    pub tender: TenderMethod,
    pub category: MovementCategory,
    pub rental_ref: Option<String>,
    pub order_ref: Option<String>,
    /// Inferred from the rental when absent.
    pub client_ref: Option<String>,
    pub note: Option<String>,
    /// Receipt / transfer voucher reference.
    pub proof_ref: Option<String>,
    /// Operator recording the movement, for the session history.
    pub operator_ref: Option<String>,
}

impl RecordMovement {
    pub fn new(
        session_ref: impl Into<String>,
        amount: Money,
        tender: TenderMethod,
        category: MovementCategory,
    ) -> Self {
        RecordMovement {
            session_ref: session_ref.into(),
            amount,
            tender,
            category,
            rental_ref: None,
            order_ref: None,
            client_ref: None,
            note: None,
            proof_ref: None,
            operator_ref: None,
        }
    }

    pub fn rental(mut self, rental_ref: impl Into<String>) -> Self {
        self.rental_ref = Some(rental_ref.into());
        self
    }

    pub fn order(mut self, order_ref: impl Into<String>) -> Self {
        self.order_ref = Some(order_ref.into());
        self
    }

    pub fn client(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn proof(mut self, proof_ref: impl Into<String>) -> Self {
        self.proof_ref = Some(proof_ref.into());
        self
    }

    pub fn operator(mut self, operator_ref: impl Into<String>) -> Self {
        self.operator_ref = Some(operator_ref.into());
        self
    }
}

/// One recorded monetary event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMovement {
    pub id: String,
    pub session_id: String,
    /// Strictly positive.
    pub amount_cents: i64,
    pub tender: TenderMethod,
    /// Always `category.direction()`.
    pub direction: Direction,
    pub category: MovementCategory,
    pub rental_ref: Option<String>,
    pub order_ref: Option<String>,
    pub client_ref: Option<String>,
    pub note: Option<String>,
    pub proof_ref: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PaymentMovement {
    /// Builds the row for an already validated request.
    ///
    /// Direction always comes from the category.
    pub fn from_request(
        id: impl Into<String>,
        request: &RecordMovement,
        created_at: DateTime<Utc>,
    ) -> Self {
        PaymentMovement {
            id: id.into(),
            session_id: request.session_ref.clone(),
            amount_cents: request.amount.cents(),
            tender: request.tender,
            direction: request.category.direction(),
            category: request.category,
            rental_ref: request.rental_ref.clone(),
            order_ref: request.order_ref.clone(),
            client_ref: request.client_ref.clone(),
            note: request.note.clone(),
            proof_ref: request.proof_ref.clone(),
            created_at,
        }
    }

    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Amount with the direction's sign applied.
    #[inline]
    pub fn signed_amount(&self) -> Money {
        Money::from_cents(self.amount_cents * self.direction.sign())
    }

    /// Returns true for movements on the given rental.
    pub fn concerns_rental(&self, rental_ref: &str) -> bool {
        self.rental_ref.as_deref() == Some(rental_ref)
    }
}

// =============================================================================
// Session Events
// =============================================================================

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    Opened,
    MovementRecorded,
    Note,
    Closed,
}

/// An entry in a session's history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SessionEvent {
    pub id: String,
    pub session_id: String,
    pub kind: SessionEventKind,
    pub description: String,
    pub operator_ref: Option<String>,
    /// JSON object with event-specific data.
    pub details: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SessionEvent {
    /// Parses `details`. Malformed JSON reads as `null`.
    pub fn details_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.details).unwrap_or(serde_json::Value::Null)
    }
}

// =============================================================================
// Directory Records
// =============================================================================

/// An employee who may operate the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Operator {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// What the ledger needs to know about a rental/order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RentalAccount {
    pub id: String,
    pub client_ref: Option<String>,
    /// Full rental price.
    pub total_cents: i64,
    /// Configured refundable deposit; zero means "not configured".
    pub deposit_cents: i64,
}

impl RentalAccount {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn deposit(&self) -> Money {
        Money::from_cents(self.deposit_cents)
    }
}

/// Client label, used for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_direction_is_derived() {
        let request = RecordMovement::new(
            "S1",
            Money::from_cents(50000),
            TenderMethod::Cash,
            MovementCategory::DepositReturned,
        )
        .rental("R1");
        let movement = PaymentMovement::from_request("m1", &request, Utc::now());

        assert_eq!(movement.direction, Direction::Expense);
        assert_eq!(movement.signed_amount().cents(), -50000);
        assert!(movement.concerns_rental("R1"));
        assert!(!movement.concerns_rental("R2"));
    }

    #[test]
    fn test_session_opening_amounts() {
        let session = CashSession {
            id: "S1".into(),
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
        };
        assert!(session.is_open());
        assert_eq!(session.opening_amount(TenderMethod::Cash).cents(), 100000);
        assert!(session.opening_amount(TenderMethod::Transfer).is_zero());
    }

    #[test]
    fn test_event_details_json() {
        let event = SessionEvent {
            id: "e1".into(),
            session_id: "S1".into(),
            kind: SessionEventKind::Opened,
            description: "opened".into(),
            operator_ref: None,
            details: r#"{"opening_cash_cents":100000}"#.into(),
            created_at: Utc::now(),
        };
        assert_eq!(event.details_json()["opening_cash_cents"], 100000);
    }
}
