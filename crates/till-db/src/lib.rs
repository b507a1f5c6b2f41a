//! # till-db: Database Layer for the Till register engine
//!
//! SQLite persistence for registers and their ledgers, using sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Data Flow                                   │
//! │                                                                         │
//! │  till-service (RegisterSessionManager, TransactionLedger, ...)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌─────────────┐ │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded)  │ │   │
//! │  │   │               │    │ RegisterRepository │  │ 001_regis.. │ │   │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo    │  │ 002_regis.. │ │   │
//! │  │   └───────────────┘    └────────────────────┘  └─────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (TILL_DB_PATH)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Register and ledger repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//! let open = db.registers().list_open_for_outlet("outlet-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::register::RegisterRepository;
pub use repository::transaction::TransactionRepository;
