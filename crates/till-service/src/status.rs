//! Register status aggregation for dashboards.
//!
//! Builds one [`OutletSnapshot`] per outlet (every open register, live
//! balances, today's flows, recent entries) and narrows it to the asking
//! operator. Snapshots go through the [`StatusCache`].
//!
//! Each outlet carries a generation that every invalidation bumps. A rebuild
//! is only stored if no invalidation happened while it was being built, so a
//! slow read cannot put pre-write state back into the cache. The generations
//! are per process; other instances sharing Redis are bounded by the TTL.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use till_core::reconciliation::{method_balances, todays_transactions, total_balance};
use till_core::{Money, Register, RegisterStatus, RegisterTransaction, RegisterView, TransactionKind};
use till_db::Database;

use crate::cache::StatusCache;
use crate::error::ServiceResult;

/// Every open register at one outlet, as cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletSnapshot {
    pub outlet_id: String,
    pub active_registers: Vec<RegisterView>,
    pub generated_at: DateTime<Utc>,
}

impl OutletSnapshot {
    /// The snapshot as seen by one operator.
    pub fn status_for(&self, operator_id: &str) -> RegisterStatus {
        let register = self
            .active_registers
            .iter()
            .find(|view| view.operator_id == operator_id)
            .cloned();

        RegisterStatus {
            outlet_id: self.outlet_id.clone(),
            operator_id: operator_id.to_string(),
            has_open_register: register.is_some(),
            register,
            active_registers: self.active_registers.clone(),
            generated_at: self.generated_at,
        }
    }
}

/// Read-side aggregator. Never used to decide a write.
#[derive(Clone)]
pub struct RegisterStatusAggregator {
    db: Database,
    cache: Arc<dyn StatusCache>,
    recent_limit: usize,
    offset: FixedOffset,
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl RegisterStatusAggregator {
    pub fn new(db: Database, cache: Arc<dyn StatusCache>, recent_limit: usize, offset: FixedOffset) -> Self {
        RegisterStatusAggregator {
            db,
            cache,
            recent_limit,
            offset,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Status for `operator_id` at `outlet_id`, from cache when fresh.
    pub async fn status(&self, outlet_id: &str, operator_id: &str) -> ServiceResult<RegisterStatus> {
        let snapshot = self.snapshot(outlet_id).await?;
        Ok(snapshot.status_for(operator_id))
    }

    /// The outlet snapshot, rebuilt and cached on a miss.
    pub async fn snapshot(&self, outlet_id: &str) -> ServiceResult<OutletSnapshot> {
        if let Some(cached) = self.cache.get(outlet_id).await {
            debug!(outlet_id = %outlet_id, "Status cache hit");
            return Ok(cached);
        }

        let generation = self.generation(outlet_id).await;
        let snapshot = self.rebuild(outlet_id, Utc::now()).await?;
        self.store_if_current(&snapshot, generation).await;
        Ok(snapshot)
    }

    /// Marks the outlet's snapshot stale after a write.
    pub async fn invalidate(&self, outlet_id: &str) {
        let mut generations = self.generations.lock().await;
        let generation = generations.entry(outlet_id.to_string()).or_insert(0);
        *generation = generation.wrapping_add(1);
        self.cache.invalidate(outlet_id).await;
    }

    async fn generation(&self, outlet_id: &str) -> u64 {
        self.generations.lock().await.get(outlet_id).copied().unwrap_or(0)
    }

    /// Caches `snapshot` unless the outlet was invalidated after
    /// `generation` was read. The lock is held across the put so an
    /// invalidation cannot land between the check and the write.
    async fn store_if_current(&self, snapshot: &OutletSnapshot, generation: u64) -> bool {
        let generations = self.generations.lock().await;
        if generations.get(&snapshot.outlet_id).copied().unwrap_or(0) != generation {
            debug!(outlet_id = %snapshot.outlet_id, "Dropping snapshot built before an invalidation");
            return false;
        }

        self.cache.put(snapshot).await;
        true
    }

    async fn rebuild(&self, outlet_id: &str, now: DateTime<Utc>) -> ServiceResult<OutletSnapshot> {
        let registers = self.db.registers().list_open_for_outlet(outlet_id).await?;
        let ledger = self.db.transactions();

        let mut active_registers = Vec::with_capacity(registers.len());
        for register in &registers {
            let transactions = ledger.list_for(&register.id).await?;
            active_registers.push(self.build_view(register, transactions, now));
        }

        debug!(
            outlet_id = %outlet_id,
            active = active_registers.len(),
            "Rebuilt outlet status snapshot"
        );

        Ok(OutletSnapshot {
            outlet_id: outlet_id.to_string(),
            active_registers,
            generated_at: now,
        })
    }

    /// Dashboard view of one register from its full ledger (creation order).
    pub fn build_view(
        &self,
        register: &Register,
        transactions: Vec<RegisterTransaction>,
        now: DateTime<Utc>,
    ) -> RegisterView {
        let opening = register.opening_balances();

        let (today_cash_in, today_cash_out) = todays_transactions(&transactions, now, self.offset)
            .into_iter()
            .fold((Money::zero(), Money::zero()), |(cash_in, cash_out), t| match t.kind {
                TransactionKind::CashIn => (cash_in + t.amount, cash_out),
                TransactionKind::CashOut => (cash_in, cash_out + t.amount),
            });

        let balances = method_balances(&opening, &transactions);
        let total = total_balance(&opening, &transactions);

        let recent_transactions = transactions.into_iter().rev().take(self.recent_limit).collect();

        RegisterView {
            register_id: register.id.clone(),
            operator_id: register.opened_by.clone(),
            opened_at: register.opened_at,
            opening,
            balances,
            total_balance: total,
            today_cash_in,
            today_cash_out,
            recent_transactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStatusCache;
    use chrono::TimeZone;
    use std::time::Duration;
    use till_core::{
        DenominationCount, PaymentMethod, RegisterState, TransactionSource,
    };
    use till_db::DbConfig;

    fn register(now: DateTime<Utc>) -> Register {
        Register {
            id: "reg-1".to_string(),
            outlet_id: "outlet-1".to_string(),
            opened_by: "op-1".to_string(),
            state: RegisterState::Open,
            opening_balance: Money::from_major(1000),
            opening_cash_balance: Money::from_major(1000),
            opening_upi_balance: Money::zero(),
            opening_card_balance: Money::zero(),
            opening_denominations: DenominationCount::empty(),
            opening_notes: None,
            opened_at: now,
            closing: None,
            updated_at: now,
        }
    }

    fn entry(n: u32, kind: TransactionKind, method: PaymentMethod, amount: i64, at: DateTime<Utc>) -> RegisterTransaction {
        RegisterTransaction {
            id: format!("t-{n}"),
            register_id: "reg-1".to_string(),
            kind,
            payment_method: method,
            source: TransactionSource::Manual,
            amount: Money::from_major(amount),
            description: format!("entry {n}"),
            reference_id: None,
            performed_by: "op-1".to_string(),
            created_at: at,
        }
    }

    async fn aggregator(recent_limit: usize) -> RegisterStatusAggregator {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        RegisterStatusAggregator::new(
            db,
            Arc::new(InMemoryStatusCache::new(Duration::from_secs(60))),
            recent_limit,
            ist,
        )
    }

    #[tokio::test]
    async fn test_build_view() {
        let aggregator = aggregator(2).await;

        // 2024-03-10 00:30 IST is 2024-03-09 19:00 UTC
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap();
        let yesterday_ist = Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap();
        let today_ist = Utc.with_ymd_and_hms(2024, 3, 9, 19, 0, 0).unwrap();

        let transactions = vec![
            entry(1, TransactionKind::CashIn, PaymentMethod::Cash, 500, yesterday_ist),
            entry(2, TransactionKind::CashIn, PaymentMethod::Upi, 300, today_ist),
            entry(3, TransactionKind::CashOut, PaymentMethod::Cash, 200, today_ist),
        ];

        let view = aggregator.build_view(&register(now), transactions, now);

        assert_eq!(view.total_balance, Money::from_major(1600));
        assert_eq!(view.balances.cash, Money::from_major(1300));
        assert_eq!(view.balances.upi, Money::from_major(300));
        assert_eq!(view.today_cash_in, Money::from_major(300));
        assert_eq!(view.today_cash_out, Money::from_major(200));

        let recent: Vec<&str> = view.recent_transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(recent, vec!["t-3", "t-2"]);
    }

    #[test]
    fn test_status_for_operator() {
        let now = Utc::now();
        let aggregator_view = RegisterView {
            register_id: "reg-1".to_string(),
            operator_id: "op-1".to_string(),
            opened_at: now,
            opening: Default::default(),
            balances: Default::default(),
            total_balance: Money::zero(),
            today_cash_in: Money::zero(),
            today_cash_out: Money::zero(),
            recent_transactions: Vec::new(),
        };
        let snapshot = OutletSnapshot {
            outlet_id: "outlet-1".to_string(),
            active_registers: vec![aggregator_view],
            generated_at: now,
        };

        let own = snapshot.status_for("op-1");
        assert!(own.has_open_register);
        assert_eq!(own.register.unwrap().register_id, "reg-1");

        let other = snapshot.status_for("op-2");
        assert!(!other.has_open_register);
        assert!(other.register.is_none());
        assert_eq!(other.active_registers.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_rebuild_is_not_overwritten() {
        let aggregator = aggregator(10).await;

        let generation = aggregator.generation("outlet-1").await;
        let stale = aggregator.rebuild("outlet-1", Utc::now()).await.unwrap();
        aggregator.invalidate("outlet-1").await;

        assert!(!aggregator.store_if_current(&stale, generation).await);
        assert!(aggregator.cache.get("outlet-1").await.is_none());

        aggregator.snapshot("outlet-1").await.unwrap();
        assert!(aggregator.cache.get("outlet-1").await.is_some());
    }

    #[tokio::test]
    async fn test_empty_outlet_snapshot() {
        let aggregator = aggregator(10).await;
        let status = aggregator.status("outlet-1", "op-1").await.unwrap();
        assert!(!status.has_open_register);
        assert!(status.active_registers.is_empty());
    }
}
