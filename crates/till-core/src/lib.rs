//! # till-core: Pure Register Logic
//!
//! State machine rules, balance math and drawer audits for the cash
//! register engine. Everything here is a pure function with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    till-service                                 │   │
//! │  │    open / record / close / status, cache, authorization        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌──────────────┐  ┌─────────┐  │   │
//! │  │   │   types   │  │   money   │  │reconciliation│  │denomina-│  │   │
//! │  │   │ Register  │  │   Money   │  │  balances    │  │  tion   │  │   │
//! │  │   │ Ledger    │  │           │  │  summary     │  │  audit  │  │   │
//! │  │   └───────────┘  └───────────┘  └──────────────┘  └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Register, ledger entries, summaries, requests
//! - [`money`] - Integer money in paise
//! - [`reconciliation`] - Balance identity and discrepancy math
//! - [`denomination`] - Drawer count audit
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::reconciliation::summarize;
//! use till_core::{Money, OpeningBalances};
//!
//! let opening = OpeningBalances {
//!     total: Money::from_major(1000),
//!     cash: Money::from_major(600),
//!     upi: Money::from_major(200),
//!     card: Money::from_major(200),
//! };
//!
//! let summary = summarize(&opening, &[], Money::from_major(990));
//! assert_eq!(summary.discrepancy, Money::from_major(-10));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod denomination;
pub mod error;
pub mod money;
pub mod reconciliation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use denomination::{Denomination, DenominationAuditor, DenominationCount, DenominationSet};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Ledger entries shown per register on the dashboard.
pub const DEFAULT_RECENT_TRANSACTIONS: usize = 10;

/// Largest single amount accepted anywhere in a register (₹1000 crore).
///
/// Keeps every ledger sum far inside `i64` paise.
pub const MAX_AMOUNT: Money = Money::from_major(10_000_000_000);

/// Maximum length of a ledger description.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Maximum length of opening or closing notes.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Maximum length of an external id (outlet, operator, order).
pub const MAX_ID_LENGTH: usize = 128;
