//! # caja-db: Persistence and Services for the Cash Ledger
//!
//! SQLite storage for cash sessions and the payment ledger, plus the two
//! services callers use: [`CashSessionManager`] (the single writer) and
//! [`AggregationReporter`] (read-only dashboards).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Data Flow                                   │
//! │                                                                         │
//! │  Presentation layer (HTTP, desktop, CLI: out of scope)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   CashSessionManager          AggregationReporter               │   │
//! │  │   open / record / close       todays_movements / flow_between   │   │
//! │  │          │                              │                       │   │
//! │  │          ▼                              ▼                       │   │
//! │  │   ┌───────────────┐   ┌─────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │◄──│  Repositories       │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │   │  sessions, ledger,  │  │ (embedded) │  │   │
//! │  │   │   SqlitePool  │   │  events, directory  │  │            │  │   │
//! │  │   └───────────────┘   └─────────────────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Rules and arithmetic come from caja-core (no I/O there).      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── ~/.local/share/caja/caja.db                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `caja.toml` + environment configuration, tracing setup
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Session, movement and event repositories
//! - [`directory`] - Operator / rental / client lookups
//! - [`manager`] - Session lifecycle and movement recording
//! - [`reporter`] - Daily and range aggregates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_core::{Money, MovementCategory, RecordMovement, TenderMethod};
//! use caja_db::{CajaConfig, CashSessionManager, Database};
//!
//! let config = CajaConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let caja = CashSessionManager::new(db);
//!
//! let session = caja.open("op-1", Money::from_major_minor(1000, 0), None).await?;
//! caja.record(
//!     RecordMovement::new(&session.id, Money::from_major_minor(500, 0), TenderMethod::Cash,
//!         MovementCategory::DepositHeld)
//!     .rental("R1"),
//! )
//! .await?;
//! let report = caja.close(Money::from_major_minor(1500, 0), None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod directory;
pub mod error;
pub mod manager;
pub mod migrations;
pub mod pool;
pub mod reporter;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{init_tracing, CajaConfig, ConfigError};
pub use directory::{
    ClientDirectory, Directory, OperatorDirectory, RentalDirectory, SqliteDirectory,
};
pub use error::{CajaError, CajaResult, DbError, DbResult};
pub use manager::CashSessionManager;
pub use pool::{Database, DbConfig};
pub use reporter::AggregationReporter;

// Repository re-exports for convenience
pub use repository::{PaymentLedger, SessionEventRepository, SessionRepository};
