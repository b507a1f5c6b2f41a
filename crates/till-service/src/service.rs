//! # TillService
//!
//! The operation surface of the register engine. Transport-agnostic: a
//! gRPC, HTTP or desktop command layer calls these methods with an already
//! verified [`Caller`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            TillService                               │
//! │                                                                      │
//! │  caller check ──► outlet check ──► component ──► cache invalidation  │
//! │                                                                      │
//! │  open_register ─────────┐                                            │
//! │  close_register ────────┼──► RegisterSessionManager ──┐              │
//! │  register_history ──────┤                             │              │
//! │  discrepancies ─────────┘                             ├──► SQLite    │
//! │  record_transaction ────┬──► TransactionLedger ───────┤              │
//! │  reverse_transaction ───┘                             │              │
//! │  register_status ───────────► StatusAggregator ──► StatusCache       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authorization runs before anything is read or written. Every error
//! leaves through [`ApiError`].

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use till_core::validation::validate_required_id;
use till_core::{
    ClosedRegister, CloseRegister, DenominationAuditor, Money, OpenRegister, Register,
    RegisterStatus, RegisterTransaction, RecordTransaction,
};
use till_db::{Database, DbConfig};

use crate::auth::Caller;
use crate::cache::{InMemoryStatusCache, RedisStatusCache, StatusCache};
use crate::config::ServiceConfig;
use crate::error::{ApiError, ServiceError, ServiceResult};
use crate::ledger::TransactionLedger;
use crate::outlet::{OutletDirectory, StaticOutletDirectory};
use crate::session::RegisterSessionManager;
use crate::status::RegisterStatusAggregator;

/// Largest page served by the report operations.
pub const MAX_REPORT_LIMIT: u32 = 500;

/// Register engine facade.
#[derive(Clone)]
pub struct TillService {
    sessions: RegisterSessionManager,
    ledger: TransactionLedger,
    status: RegisterStatusAggregator,
    outlets: Arc<dyn OutletDirectory>,
}

impl TillService {
    /// Wires the components around an existing database.
    pub fn new(
        db: Database,
        config: &ServiceConfig,
        cache: Arc<dyn StatusCache>,
        outlets: Arc<dyn OutletDirectory>,
    ) -> Self {
        let auditor = DenominationAuditor::new(config.denomination_set());

        TillService {
            sessions: RegisterSessionManager::new(db.clone(), auditor),
            ledger: TransactionLedger::new(db.clone()),
            status: RegisterStatusAggregator::new(
                db,
                cache,
                config.recent_transactions,
                config.utc_offset,
            ),
            outlets,
        }
    }

    /// Opens the database, picks the cache backend and builds the service.
    ///
    /// An unreachable Redis is not fatal: the service falls back to the
    /// in-process cache.
    pub async fn connect(config: &ServiceConfig) -> ServiceResult<Self> {
        let db = Database::new(
            DbConfig::new(config.database_path.clone()).max_connections(config.db_max_connections),
        )
        .await?;

        let cache: Arc<dyn StatusCache> = match &config.redis_url {
            Some(url) => match RedisStatusCache::connect(url, config.status_cache_ttl).await {
                Ok(cache) => {
                    info!("Connected to Redis status cache");
                    Arc::new(cache)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to Redis, using in-process status cache");
                    Arc::new(InMemoryStatusCache::new(config.status_cache_ttl))
                }
            },
            None => Arc::new(InMemoryStatusCache::new(config.status_cache_ttl)),
        };

        let outlets: Arc<dyn OutletDirectory> = match &config.outlets {
            Some(outlets) => Arc::new(StaticOutletDirectory::new(outlets.iter().cloned())),
            None => Arc::new(StaticOutletDirectory::permissive()),
        };

        Ok(TillService::new(db, config, cache, outlets))
    }

    // =========================================================================
    // Write operations
    // =========================================================================

    /// Opens a register for `request.operator_id` at `request.outlet_id`.
    pub async fn open_register(&self, caller: &Caller, request: OpenRegister) -> Result<Register, ApiError> {
        caller.ensure_acts_as(&request.operator_id)?;
        self.ensure_outlet(&request.outlet_id).await?;

        let register = self.sessions.open(request, Utc::now()).await?;
        self.status.invalidate(&register.outlet_id).await;
        Ok(register)
    }

    /// Appends a ledger entry to an open register owned by `performed_by`.
    pub async fn record_transaction(
        &self,
        caller: &Caller,
        request: RecordTransaction,
    ) -> Result<RegisterTransaction, ApiError> {
        caller.ensure_acts_as(&request.performed_by)?;
        let register = self.sessions.get(&request.register_id).await?;
        ensure_owns(caller, &register)?;

        let entry = self.ledger.record(request, Utc::now()).await?;
        self.status.invalidate(&register.outlet_id).await;
        Ok(entry)
    }

    /// Closes the operator's open register.
    pub async fn close_register(&self, caller: &Caller, request: CloseRegister) -> Result<ClosedRegister, ApiError> {
        caller.ensure_acts_as(&request.operator_id)?;
        if let Some(outlet_id) = &request.outlet_id {
            self.ensure_outlet(outlet_id).await?;
        }

        let closed = self.sessions.close(request, Utc::now()).await?;
        self.status.invalidate(&closed.register.outlet_id).await;
        Ok(closed)
    }

    /// Cancels a ledger entry with an offsetting one, acting as the caller.
    pub async fn reverse_transaction(
        &self,
        caller: &Caller,
        transaction_id: &str,
        reason: &str,
    ) -> Result<RegisterTransaction, ApiError> {
        validate_required_id("transaction_id", transaction_id).map_err(ServiceError::from)?;
        let original = self.ledger.get(transaction_id).await?;
        let register = self.sessions.get(&original.register_id).await?;
        ensure_owns(caller, &register)?;

        let reversal = self
            .ledger
            .reverse(transaction_id, &caller.operator_id, reason, Utc::now())
            .await?;
        self.status.invalidate(&register.outlet_id).await;
        Ok(reversal)
    }

    // =========================================================================
    // Read operations
    // =========================================================================

    /// Dashboard snapshot for `operator_id` at `outlet_id`. May be stale by
    /// up to the cache TTL.
    pub async fn register_status(
        &self,
        caller: &Caller,
        outlet_id: &str,
        operator_id: &str,
    ) -> Result<RegisterStatus, ApiError> {
        caller.ensure_can_view(operator_id)?;
        validate_required_id("outlet_id", outlet_id).map_err(ServiceError::from)?;
        self.ensure_outlet(outlet_id).await?;

        Ok(self.status.status(outlet_id, operator_id).await?)
    }

    /// Closed registers with their summaries, newest first.
    pub async fn register_history(
        &self,
        caller: &Caller,
        outlet_id: &str,
        limit: u32,
    ) -> Result<Vec<ClosedRegister>, ApiError> {
        caller.ensure_can_audit()?;
        self.ensure_outlet(outlet_id).await?;

        Ok(self.sessions.history(outlet_id, clamp_limit(limit)).await?)
    }

    /// Closed registers whose discrepancy is at least `min_abs` either way.
    pub async fn discrepancies(
        &self,
        caller: &Caller,
        outlet_id: &str,
        min_abs: Money,
        limit: u32,
    ) -> Result<Vec<ClosedRegister>, ApiError> {
        caller.ensure_can_audit()?;
        self.ensure_outlet(outlet_id).await?;

        Ok(self
            .sessions
            .discrepancies(outlet_id, min_abs, clamp_limit(limit))
            .await?)
    }

    async fn ensure_outlet(&self, outlet_id: &str) -> ServiceResult<()> {
        if self.outlets.outlet_exists(outlet_id).await? {
            Ok(())
        } else {
            Err(ServiceError::OutletNotFound(outlet_id.to_string()))
        }
    }
}

fn ensure_owns(caller: &Caller, register: &Register) -> ServiceResult<()> {
    if caller.is_admin() || register.opened_by == caller.operator_id {
        return Ok(());
    }
    Err(ServiceError::unauthorized(format!(
        "register {} belongs to {}",
        register.id, register.opened_by
    )))
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_REPORT_LIMIT)
}
