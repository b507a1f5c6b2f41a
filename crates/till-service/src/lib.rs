//! # till-service: Register Engine
//!
//! Composes till-core (rules, reconciliation) and till-db (storage) into the
//! register operations used by the POS front end, order billing and alerting.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          till-service                                   │
//! │                                                                         │
//! │   Caller ──► TillService ─┬─► RegisterSessionManager (open / close)    │
//! │                           ├─► TransactionLedger (record / reverse)     │
//! │                           └─► RegisterStatusAggregator ──► StatusCache │
//! │                                        │                    (memory or │
//! │                                        ▼                     Redis)    │
//! │                                  till-db (SQLite)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use till_service::{init_tracing, Caller, ServiceConfig, TillService};
//!
//! init_tracing();
//! let config = ServiceConfig::from_env()?;
//! let service = TillService::connect(&config).await?;
//!
//! let caller = Caller::staff("op-7");
//! let status = service.register_status(&caller, "outlet-1", "op-7").await?;
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod outlet;
pub mod service;
pub mod session;
pub mod status;

pub use auth::{Caller, OperatorRole};
pub use cache::{InMemoryStatusCache, RedisStatusCache, StatusCache};
pub use config::{ConfigError, ServiceConfig};
pub use error::{ApiError, ErrorCode, ServiceError, ServiceResult};
pub use ledger::TransactionLedger;
pub use outlet::{OutletDirectory, StaticOutletDirectory};
pub use service::TillService;
pub use session::RegisterSessionManager;
pub use status::{OutletSnapshot, RegisterStatusAggregator};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,till=debug,sqlx=warn";

/// Installs the global tracing subscriber.
///
/// Honours `RUST_LOG`. Calling it again (e.g. from several tests) is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
