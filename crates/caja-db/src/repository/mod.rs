//! # Repository Module
//!
//! Database repositories for the cash ledger.
//!
//! ## Reads vs. Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reads                                                                  │
//! │    db.sessions().get(id)        ──► &SqlitePool (any connection)       │
//! │    db.ledger().movements_for_session(id)                                │
//! │                                                                         │
//! │  Writes (always inside the manager's transaction)                      │
//! │    SessionRepository::insert(&mut *tx, &session)                       │
//! │    PaymentLedger::append(&mut *tx, &movement)                          │
//! │    SessionEventRepository::append(&mut *tx, &event)                    │
//! │                                                                         │
//! │  `*_in(&mut *tx, ..)` variants read through the same transaction.      │
//! │  Never touch the pool while holding a transaction: the in-memory       │
//! │  database has a single connection.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SessionRepository`] - Cash session rows
//! - [`PaymentLedger`] - Append-only movement store
//! - [`SessionEventRepository`] - Session history log

pub mod event;
pub mod ledger;
pub mod session;

pub use event::SessionEventRepository;
pub use ledger::PaymentLedger;
pub use session::SessionRepository;
