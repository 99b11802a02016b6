//! # Cash Session Manager
//!
//! The single writer of the cash ledger: opens and closes the register and
//! records movements, enforcing every ledger rule before anything is written.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(request)                                                        │
//! │       │                                                                 │
//! │       ├── 1. shape checks (amount > 0, rental ref present, note)       │
//! │       ├── 2. directory lookups (rental total, deposit, client)         │
//! │       │                                                                 │
//! │       ▼  ── write gate (one writer at a time) ───────────────────────   │
//! │  BEGIN                                                                  │
//! │       ├── 3. session_ref must be the open session   → NoOpenSession    │
//! │       ├── 4. fold rental history                                        │
//! │       │      deposit: transition + amount   → GuaranteeRuleViolation   │
//! │       │      balance: cap                   → BalanceExceeded          │
//! │       ├── 5. append movement                                            │
//! │       └── 6. append MOVEMENT_RECORDED event                             │
//! │  COMMIT   (nothing is written if any step fails)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Readers
//! Balance, deposit-state and summary reads never take the write gate.
//! Reads that combine several queries run inside one read transaction and
//! see a single committed snapshot.

use std::sync::Arc;

use caja_core::validation::{
    validate_counted_amount, validate_note, validate_opening_amount, validate_record_request,
    validate_reference, validate_session_note,
};
use caja_core::{
    BalanceReconciler, CashSession, ClosingReport, ErrorKind, GuaranteeState,
    GuaranteeStateTracker, LedgerError, Money, MovementCategory, Operator, PaymentMovement,
    Reconciliation, RecordMovement, RentalAccount, SessionEvent, SessionEventKind, SessionSummary,
    TenderMethod, VarianceOutcome,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::directory::{Directory, SqliteDirectory};
use crate::error::{CajaResult, DbError};
use crate::pool::Database;
use crate::repository::session::SessionClosing;
use crate::repository::{PaymentLedger, SessionEventRepository, SessionRepository};

/// Entry point for every ledger operation.
///
/// Clones share the same write gate, so a manager can be handed to many
/// tasks and still admit one writer at a time.
#[derive(Debug, Clone)]
pub struct CashSessionManager<D = SqliteDirectory> {
    db: Database,
    directory: D,
    write_gate: Arc<Mutex<()>>,
}

impl CashSessionManager<SqliteDirectory> {
    /// Manager reading directories from the ledger database itself.
    pub fn new(db: Database) -> Self {
        let directory = db.directory();
        CashSessionManager::with_directory(db, directory)
    }
}

impl<D: Directory> CashSessionManager<D> {
    /// Manager with an external directory implementation.
    pub fn with_directory(db: Database, directory: D) -> Self {
        CashSessionManager {
            db,
            directory,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Opens the register.
    ///
    /// ## Errors
    /// - `InvalidOperator` unless `operator_ref` is an active operator
    /// - `InvalidAmount` for negative opening cash
    /// - `SessionAlreadyOpen` while another session is open
    pub async fn open(
        &self,
        operator_ref: &str,
        opening_cash: Money,
        notes: Option<String>,
    ) -> CajaResult<CashSession> {
        validate_reference("operator_ref", operator_ref)?;
        validate_opening_amount(opening_cash)?;
        validate_note("opening_notes", notes.as_deref())?;

        let Some(operator) = self.directory.find_active_operator(operator_ref).await? else {
            warn!(operator_ref, "Refusing to open register: operator is not active");
            return Err(LedgerError::InvalidOperator {
                operator_ref: operator_ref.to_string(),
            }
            .into());
        };

        let _gate = self.write_gate.lock().await;
        let mut tx = self.db.pool().begin().await?;

        if let Some(open) = SessionRepository::find_open_in(&mut *tx).await? {
            return Err(LedgerError::SessionAlreadyOpen { session_id: open.id }.into());
        }

        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            opened_by: operator.id.clone(),
            opened_at: Utc::now(),
            opening_cash_cents: opening_cash.cents(),
            opening_transfer_cents: 0,
            opening_notes: notes,
            closed_at: None,
            counted_cash_cents: None,
            counted_transfer_cents: None,
            cash_variance_cents: None,
            transfer_variance_cents: None,
            closing_notes: None,
        };

        if let Err(e) = SessionRepository::insert(&mut *tx, &session).await {
            if !e.is_unique_violation_on("cash_sessions.open_slot") {
                return Err(e.into());
            }
            // Another process opened the register between our check and insert.
            tx.rollback().await?;
            let holder = self.db.sessions().find_open().await?;
            return Err(LedgerError::SessionAlreadyOpen {
                session_id: holder.map(|s| s.id).unwrap_or_default(),
            }
            .into());
        }

        SessionEventRepository::append(
            &mut *tx,
            &session.id,
            SessionEventKind::Opened,
            format!("Register opened by {}", operator.name),
            Some(operator.id.as_str()),
            json!({ "opening_cash_cents": session.opening_cash_cents }),
        )
        .await?;

        tx.commit().await?;

        info!(
            session_id = %session.id,
            operator = %operator.id,
            opening_cash = %opening_cash,
            "Cash session opened"
        );

        Ok(session)
    }

    /// The open session, if any. No side effects.
    pub async fn current_open_session(&self) -> CajaResult<Option<CashSession>> {
        Ok(self.db.sessions().find_open().await?)
    }

    /// Closes the open session against a physical cash count.
    ///
    /// Transfer counted/variance fields stay empty.
    pub async fn close(
        &self,
        counted_cash: Money,
        notes: Option<String>,
    ) -> CajaResult<ClosingReport> {
        self.close_with(counted_cash, None, notes).await
    }

    /// Closes the open session counting both cash and transfers.
    pub async fn close_counting_transfer(
        &self,
        counted_cash: Money,
        counted_transfer: Money,
        notes: Option<String>,
    ) -> CajaResult<ClosingReport> {
        self.close_with(counted_cash, Some(counted_transfer), notes)
            .await
    }

    async fn close_with(
        &self,
        counted_cash: Money,
        counted_transfer: Option<Money>,
        notes: Option<String>,
    ) -> CajaResult<ClosingReport> {
        validate_counted_amount("counted_cash", counted_cash)?;
        if let Some(transfer) = counted_transfer {
            validate_counted_amount("counted_transfer", transfer)?;
        }
        validate_note("closing_notes", notes.as_deref())?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.db.pool().begin().await?;

        let Some(session) = SessionRepository::find_open_in(&mut *tx).await? else {
            return Err(LedgerError::NoOpenSession.into());
        };

        let movements = PaymentLedger::movements_for_session_in(&mut *tx, &session.id).await?;
        let report = BalanceReconciler::new(&session, &movements).closing_report(
            Utc::now(),
            counted_cash,
            counted_transfer,
        );

        let closing = SessionClosing {
            closed_at: report.closed_at,
            counted_cash_cents: report.cash.counted_cents,
            cash_variance_cents: report.cash.variance_cents,
            counted_transfer_cents: report.transfer.map(|t| t.counted_cents),
            transfer_variance_cents: report.transfer.map(|t| t.variance_cents),
            closing_notes: notes,
        };

        if !SessionRepository::close(&mut *tx, &session.id, &closing).await? {
            return Err(LedgerError::NoOpenSession.into());
        }

        SessionEventRepository::append(
            &mut *tx,
            &session.id,
            SessionEventKind::Closed,
            format!("Register closed: {:?}", report.outcome()),
            None,
            json!({
                "counted_cash_cents": closing.counted_cash_cents,
                "theoretical_cash_cents": report.theoretical_cash_cents,
                "cash_variance_cents": closing.cash_variance_cents,
                "counted_transfer_cents": closing.counted_transfer_cents,
                "transfer_variance_cents": closing.transfer_variance_cents,
            }),
        )
        .await?;

        tx.commit().await?;

        match report.outcome() {
            VarianceOutcome::ExactMatch => info!(
                session_id = %session.id,
                counted_cash = %counted_cash,
                "Cash session closed with exact match"
            ),
            outcome => warn!(
                session_id = %session.id,
                counted_cash = %counted_cash,
                variance = %report.variance(),
                ?outcome,
                "Cash session closed with variance"
            ),
        }

        Ok(report)
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Records one movement in the open session.
    ///
    /// ## Errors
    /// - `InvalidAmount`, `MissingRentalReference`: request shape
    /// - `UnknownRental`: rental-scoped category with an unknown rental
    /// - `NoOpenSession`: `session_ref` is not the open session
    /// - `GuaranteeRuleViolation`, `BalanceExceeded`: refused by the rental's history
    /// - `InconsistentGuaranteeHistory`: the stored deposit history is corrupt
    pub async fn record(&self, mut request: RecordMovement) -> CajaResult<PaymentMovement> {
        validate_record_request(&request)?;
        if let Some(operator_ref) = request.operator_ref.as_deref() {
            validate_reference("operator_ref", operator_ref)?;
        }

        let rental = self.resolve_rental(&request).await?;
        if request.client_ref.is_none() {
            request.client_ref = rental.as_ref().and_then(|r| r.client_ref.clone());
        }

        let _gate = self.write_gate.lock().await;
        let mut tx = self.db.pool().begin().await?;

        match SessionRepository::find_open_in(&mut *tx).await? {
            Some(open) if open.id == request.session_ref => {}
            _ => {
                debug!(
                    session_ref = %request.session_ref,
                    "Refusing movement: session is not open"
                );
                return Err(LedgerError::NoOpenSession.into());
            }
        }

        if let (true, Some(rental)) = (request.category.requires_rental(), rental.as_ref()) {
            let history = PaymentLedger::movements_for_rental_in(&mut *tx, &rental.id).await?;
            let tracker = GuaranteeStateTracker::new(&rental.id, &history);
            if let Err(e) = check_rental_rules(&tracker, &request, rental) {
                log_refusal(&e);
                return Err(e.into());
            }
        }

        let movement =
            PaymentMovement::from_request(Uuid::new_v4().to_string(), &request, Utc::now());
        PaymentLedger::append(&mut *tx, &movement).await?;

        SessionEventRepository::append(
            &mut *tx,
            &movement.session_id,
            SessionEventKind::MovementRecorded,
            format!("{} {} ({})", movement.category, movement.amount(), movement.tender),
            request.operator_ref.as_deref(),
            json!({
                "movement_id": movement.id,
                "category": movement.category,
                "tender": movement.tender,
                "amount_cents": movement.amount_cents,
                "rental_ref": movement.rental_ref,
            }),
        )
        .await?;

        tx.commit().await?;

        info!(
            movement_id = %movement.id,
            session_id = %movement.session_id,
            category = %movement.category,
            amount = %movement.amount(),
            "Movement recorded"
        );

        Ok(movement)
    }

    /// Looks up the rental referenced by a request.
    ///
    /// Rental-scoped categories require a known rental. Extraordinary
    /// categories may reference one for client inference only.
    async fn resolve_rental(&self, request: &RecordMovement) -> CajaResult<Option<RentalAccount>> {
        let Some(rental_ref) = request.rental_ref.as_deref() else {
            return Ok(None);
        };

        let rental = self.directory.find_rental(rental_ref).await?;
        if rental.is_none() && request.category.requires_rental() {
            return Err(LedgerError::UnknownRental {
                rental_ref: rental_ref.to_string(),
            }
            .into());
        }
        Ok(rental)
    }

    /// Appends a free-text note to the open session's history.
    pub async fn add_note(
        &self,
        text: &str,
        operator_ref: Option<&str>,
    ) -> CajaResult<SessionEvent> {
        validate_session_note(text)?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.db.pool().begin().await?;

        let Some(session) = SessionRepository::find_open_in(&mut *tx).await? else {
            return Err(LedgerError::NoOpenSession.into());
        };

        let event = SessionEventRepository::append(
            &mut *tx,
            &session.id,
            SessionEventKind::Note,
            text.trim(),
            operator_ref,
            json!({}),
        )
        .await?;

        tx.commit().await?;
        Ok(event)
    }

    // =========================================================================
    // Session Reads
    // =========================================================================

    /// Gets a session by ID.
    pub async fn session(&self, session_id: &str) -> CajaResult<CashSession> {
        let session = self
            .db
            .sessions()
            .get(session_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", session_id))?;
        Ok(session)
    }

    /// Most recently opened sessions first.
    pub async fn recent_sessions(&self, limit: u32) -> CajaResult<Vec<CashSession>> {
        Ok(self.db.sessions().recent(limit).await?)
    }

    /// A session's history, oldest first.
    pub async fn history(&self, session_id: &str) -> CajaResult<Vec<SessionEvent>> {
        self.session(session_id).await?;
        Ok(self.db.events().history(session_id).await?)
    }

    /// Balances per tender, totals and (once closed) the stored count.
    pub async fn summary(&self, session_id: &str) -> CajaResult<SessionSummary> {
        let (session, movements) = self.session_snapshot(session_id).await?;
        Ok(BalanceReconciler::new(&session, &movements).summary())
    }

    /// opening + Σ income − Σ expense for one tender, recomputed now.
    pub async fn theoretical_balance(
        &self,
        session_id: &str,
        tender: TenderMethod,
    ) -> CajaResult<Money> {
        let (session, movements) = self.session_snapshot(session_id).await?;
        Ok(BalanceReconciler::new(&session, &movements).theoretical_balance(tender))
    }

    /// Both tenders' theoretical balances added together.
    pub async fn total_theoretical(&self, session_id: &str) -> CajaResult<Money> {
        let (session, movements) = self.session_snapshot(session_id).await?;
        Ok(BalanceReconciler::new(&session, &movements).total_theoretical())
    }

    /// Compares a cash count with the theoretical cash without closing.
    pub async fn reconcile(
        &self,
        session_id: &str,
        counted_cash: Money,
    ) -> CajaResult<Reconciliation> {
        validate_counted_amount("counted_cash", counted_cash)?;
        let (session, movements) = self.session_snapshot(session_id).await?;
        Ok(BalanceReconciler::new(&session, &movements).reconcile(counted_cash))
    }

    /// Session row and its movements from one read transaction.
    async fn session_snapshot(
        &self,
        session_id: &str,
    ) -> CajaResult<(CashSession, Vec<PaymentMovement>)> {
        let mut tx = self.db.pool().begin().await?;

        let session = SessionRepository::get_in(&mut *tx, session_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", session_id))?;
        let movements = PaymentLedger::movements_for_session_in(&mut *tx, session_id).await?;

        tx.commit().await?;
        Ok((session, movements))
    }

    // =========================================================================
    // Rental Reads
    // =========================================================================

    /// Deposit state of a rental, folded from its full history.
    pub async fn state_of(&self, rental_ref: &str) -> CajaResult<GuaranteeState> {
        let history = self.rental_history(rental_ref).await?;
        let state = GuaranteeStateTracker::new(rental_ref, &history)
            .state()
            .inspect_err(log_refusal)?;
        Ok(state)
    }

    /// Deposit currently held for a rental (zero unless HELD).
    pub async fn held_amount(&self, rental_ref: &str) -> CajaResult<Money> {
        let history = self.rental_history(rental_ref).await?;
        let held = GuaranteeStateTracker::new(rental_ref, &history)
            .held_amount()
            .inspect_err(log_refusal)?;
        Ok(held)
    }

    /// What is still owed on a rental: total − Σ BALANCE, floored at zero.
    pub async fn remaining_balance(&self, rental_ref: &str) -> CajaResult<Money> {
        let rental = self
            .directory
            .find_rental(rental_ref)
            .await?
            .ok_or_else(|| LedgerError::UnknownRental {
                rental_ref: rental_ref.to_string(),
            })?;

        let history = self.rental_history(rental_ref).await?;
        Ok(GuaranteeStateTracker::new(rental_ref, &history).remaining_balance(rental.total()))
    }

    async fn rental_history(&self, rental_ref: &str) -> CajaResult<Vec<PaymentMovement>> {
        Ok(self
            .db
            .ledger()
            .movements_for_rental(rental_ref)
            .try_collect()
            .await?)
    }

    /// Operators who may open the register.
    pub async fn active_operators(&self) -> CajaResult<Vec<Operator>> {
        Ok(self.directory.active_operators().await?)
    }
}

/// Deposit and balance rules for a rental-scoped request.
fn check_rental_rules(
    tracker: &GuaranteeStateTracker<'_>,
    request: &RecordMovement,
    rental: &RentalAccount,
) -> Result<(), LedgerError> {
    match request.category {
        MovementCategory::Balance => tracker.assert_balance_allowed(request.amount, rental.total()),
        category if category.is_guarantee() => {
            tracker.assert_transition_allowed(category)?;
            tracker.assert_amount_allowed(category, request.amount, rental.deposit())
        }
        _ => Ok(()),
    }
}

fn log_refusal(err: &LedgerError) {
    match err.kind() {
        ErrorKind::Consistency => error!(error = %err, "Corrupt deposit history"),
        ErrorKind::BusinessRule => warn!(error = %err, "Movement refused"),
        _ => debug!(error = %err, "Request refused"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
