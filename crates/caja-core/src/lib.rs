//! # caja-core: Pure Ledger Logic for the Cash Register
//!
//! Every rule about money in the register lives here as pure functions with
//! zero I/O dependencies. The database crate loads rows, hands them to these
//! types, and persists what they decide.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Presentation (HTTP / desktop / dashboards)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   caja-db: CashSessionManager, PaymentLedger, Reporter          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌───────────┐ ┌────────────┐ ┌─────────────────┐ │   │
//! │  │  │ category │ │ guarantee │ │ reconciler │ │ report          │ │   │
//! │  │  │ 10 kinds │ │ NONE→HELD │ │ opening +  │ │ totals, daily   │ │   │
//! │  │  │ →direct. │ │ →RET/APP  │ │ in − out   │ │ flow, tenders   │ │   │
//! │  │  └──────────┘ └───────────┘ └────────────┘ └─────────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Sessions, movements, session events, directory records
//! - [`category`] - The fixed category → direction table
//! - [`guarantee`] - Deposit state fold and transition checks
//! - [`reconciler`] - Theoretical balances and closing variance
//! - [`report`] - Dashboard aggregations
//! - [`money`] - Integer cents
//! - [`validation`] - Input checks
//! - [`error`] - Ledger error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::{BalanceReconciler, CashSession, Money, VarianceOutcome};
//!
//! # let session = CashSession {
//! #     id: "S1".into(), opened_by: "op".into(), opened_at: chrono::Utc::now(),
//! #     opening_cash_cents: 100000, opening_transfer_cents: 0, opening_notes: None,
//! #     closed_at: None, counted_cash_cents: None, counted_transfer_cents: None,
//! #     cash_variance_cents: None, transfer_variance_cents: None, closing_notes: None,
//! # };
//! let reconciler = BalanceReconciler::new(&session, &[]);
//! let result = reconciler.reconcile(Money::from_cents(98000));
//! assert_eq!(result.variance_cents, -2000);
//! assert_eq!(result.outcome, VarianceOutcome::Shortfall);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod category;
pub mod error;
pub mod guarantee;
pub mod money;
pub mod reconciler;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use category::{Direction, MovementCategory};
pub use error::{ErrorKind, GuaranteeRule, LedgerError, LedgerResult, ValidationError};
pub use guarantee::{GuaranteeState, GuaranteeStateTracker};
pub use money::Money;
pub use reconciler::{
    BalanceReconciler, ClosingReport, Reconciliation, SessionSummary, TenderBalance,
    VarianceOutcome,
};
pub use report::{
    CashFlow, DailyFlow, MovementLine, MovementTotals, TenderDistribution, TenderShare,
    TodaysMovements,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a movement note or session note, in characters.
pub const MAX_NOTE_LENGTH: usize = 500;
