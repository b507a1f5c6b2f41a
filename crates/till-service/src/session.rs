//! # Register Session Manager
//!
//! The write path of the register lifecycle.
//!
//! ```text
//!          open()                      close()
//!    ∅ ─────────────► OPEN ─────────────────────► CLOSED (terminal)
//!                      │  ▲
//!              record  │  │ ledger entries only while OPEN
//!                      ▼  │
//!                  TransactionLedger
//! ```
//!
//! ## Serialization points
//! - **open**: a single INSERT guarded by the partial unique index on
//!   `(outlet_id, opened_by) WHERE status = 'open'`. Of two concurrent opens
//!   exactly one row lands.
//! - **close**: one database transaction whose first statement claims the
//!   register row. The ledger read, the reconciliation and the closing write
//!   all happen under the write lock, so the entries summed are the entries
//!   closed over. Any failure drops the transaction and the register stays
//!   open.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use till_core::reconciliation::{declared_cash_component, method_balances, summarize};
use till_core::validation::{validate_close_request, validate_notes, validate_open_request, validate_required_id};
use till_core::{
    ClosedRegister, CloseRegister, CoreError, DenominationAuditor, Money, OpenRegister, Register,
    RegisterClosing, RegisterState,
};
use till_db::{Database, DbError, RegisterRepository, TransactionRepository};

use crate::error::ServiceResult;

/// Opens and closes registers.
#[derive(Debug, Clone)]
pub struct RegisterSessionManager {
    db: Database,
    auditor: DenominationAuditor,
}

impl RegisterSessionManager {
    pub fn new(db: Database, auditor: DenominationAuditor) -> Self {
        RegisterSessionManager { db, auditor }
    }

    /// Opens a register for the operator at the outlet.
    ///
    /// ## Errors
    /// - `Validation` for malformed amounts, ids or notes, or an opening
    ///   split that does not add up to the total
    /// - `DenominationMismatch` if the count does not equal the cash float
    /// - `RegisterAlreadyOpen` if the operator already has one open there
    pub async fn open(&self, request: OpenRegister, now: DateTime<Utc>) -> ServiceResult<Register> {
        validate_open_request(&request)?;
        let notes = validate_notes(request.notes.as_deref())?;

        let opening = request.opening_balances();
        self.auditor.validate(&request.denominations, opening.cash)?;

        let register = Register {
            id: Uuid::new_v4().to_string(),
            outlet_id: request.outlet_id,
            opened_by: request.operator_id,
            state: RegisterState::Open,
            opening_balance: opening.total,
            opening_cash_balance: opening.cash,
            opening_upi_balance: opening.upi,
            opening_card_balance: opening.card,
            opening_denominations: request.denominations,
            opening_notes: notes,
            opened_at: now,
            closing: None,
            updated_at: now,
        };

        match self.db.registers().insert(&register).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation_on("registers.opened_by") => {
                debug!(
                    outlet_id = %register.outlet_id,
                    operator_id = %register.opened_by,
                    "Open rejected by one-open-register index"
                );
                return Err(CoreError::RegisterAlreadyOpen {
                    outlet_id: register.outlet_id,
                    operator_id: register.opened_by,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            register_id = %register.id,
            outlet_id = %register.outlet_id,
            operator_id = %register.opened_by,
            opening_balance = %register.opening_balance,
            "Register opened"
        );

        Ok(register)
    }

    /// Closes the operator's open register and returns it with its summary.
    ///
    /// A non-zero discrepancy is recorded, never rejected.
    ///
    /// ## Errors
    /// - `NoOpenRegister` if nothing is open (within `outlet_id`, if given)
    /// - `DenominationMismatch` if the count does not equal the cash part of
    ///   `actual_balance`
    pub async fn close(&self, request: CloseRegister, now: DateTime<Utc>) -> ServiceResult<ClosedRegister> {
        validate_close_request(&request)?;
        let notes = validate_notes(request.notes.as_deref())?;

        let mut tx = self.db.begin().await?;

        let mut register = RegisterRepository::claim_open(
            &mut tx,
            &request.operator_id,
            request.outlet_id.as_deref(),
            now,
        )
        .await?
        .ok_or_else(|| CoreError::NoOpenRegister {
            operator_id: request.operator_id.clone(),
        })?;

        let transactions = TransactionRepository::list_for_in(&mut tx, &register.id).await?;
        let opening = register.opening_balances();

        let expected = method_balances(&opening, &transactions);
        let cash_component = declared_cash_component(request.actual_balance, &expected);
        self.auditor.validate(&request.denominations, cash_component)?;

        let summary = summarize(&opening, &transactions, request.actual_balance);

        let closing = RegisterClosing {
            closing_balance: summary.expected_balance,
            actual_balance: summary.actual_balance,
            discrepancy: summary.discrepancy,
            closing_denominations: request.denominations,
            closing_notes: notes,
            closed_at: now,
        };

        RegisterRepository::write_closing(&mut tx, &register.id, &closing).await?;
        tx.commit().await.map_err(DbError::from)?;

        register.state = RegisterState::Closed;
        register.updated_at = now;
        register.closing = Some(closing);

        info!(
            register_id = %register.id,
            outlet_id = %register.outlet_id,
            operator_id = %register.opened_by,
            expected = %summary.expected_balance,
            actual = %summary.actual_balance,
            transactions = summary.transaction_count,
            "Register closed"
        );

        if !summary.discrepancy.is_zero() {
            warn!(
                register_id = %register.id,
                outlet_id = %register.outlet_id,
                discrepancy = %summary.discrepancy,
                "Register closed with a cash discrepancy"
            );
        }

        Ok(ClosedRegister { register, summary })
    }

    /// A register by id.
    pub async fn get(&self, register_id: &str) -> ServiceResult<Register> {
        validate_required_id("register_id", register_id)?;
        self.db
            .registers()
            .get_by_id(register_id)
            .await?
            .ok_or_else(|| CoreError::RegisterNotFound(register_id.to_string()).into())
    }

    /// The operator's open register at the outlet, if any.
    pub async fn find_open(&self, outlet_id: &str, operator_id: &str) -> ServiceResult<Option<Register>> {
        Ok(self.db.registers().find_open(outlet_id, operator_id).await?)
    }

    /// Closed registers at the outlet with their summaries, newest first.
    pub async fn history(&self, outlet_id: &str, limit: u32) -> ServiceResult<Vec<ClosedRegister>> {
        let registers = self.db.registers().list_closed_for_outlet(outlet_id, limit).await?;
        self.with_summaries(registers).await
    }

    /// Closed registers whose discrepancy is at least `min_abs` either way.
    pub async fn discrepancies(
        &self,
        outlet_id: &str,
        min_abs: Money,
        limit: u32,
    ) -> ServiceResult<Vec<ClosedRegister>> {
        let registers = self
            .db
            .registers()
            .list_discrepancies(outlet_id, min_abs, limit)
            .await?;
        self.with_summaries(registers).await
    }

    async fn with_summaries(&self, registers: Vec<Register>) -> ServiceResult<Vec<ClosedRegister>> {
        let ledger = self.db.transactions();
        let mut closed = Vec::with_capacity(registers.len());

        for register in registers {
            let actual = match &register.closing {
                Some(closing) => closing.actual_balance,
                None => {
                    return Err(DbError::corrupt("Register", &register.id, "closed without closing state").into())
                }
            };

            let transactions = ledger.list_for(&register.id).await?;
            let summary = summarize(&register.opening_balances(), &transactions, actual);
            closed.push(ClosedRegister { register, summary });
        }

        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::{Denomination, DenominationCount, OpeningByMethod};
    use till_db::DbConfig;

    async fn manager() -> RegisterSessionManager {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        RegisterSessionManager::new(db, DenominationAuditor::default())
    }

    fn open_request(cash: i64) -> OpenRegister {
        OpenRegister {
            outlet_id: "outlet-1".to_string(),
            operator_id: "op-1".to_string(),
            opening_balance: Money::from_major(cash),
            opening_by_method: OpeningByMethod {
                cash: Money::from_major(cash),
                ..Default::default()
            },
            denominations: DenominationCount::empty().with(Denomination::Note100, cash / 100),
            notes: Some("  morning shift  ".to_string()),
        }
    }

    fn close_request(actual: i64, count: DenominationCount) -> CloseRegister {
        CloseRegister {
            operator_id: "op-1".to_string(),
            outlet_id: None,
            actual_balance: Money::from_major(actual),
            denominations: count,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_open_and_get() {
        let manager = manager().await;
        let register = manager.open(open_request(500), Utc::now()).await.unwrap();

        assert!(register.is_open());
        assert_eq!(register.opening_notes.as_deref(), Some("morning shift"));

        let loaded = manager.get(&register.id).await.unwrap();
        assert_eq!(loaded.id, register.id);
        assert!(manager.find_open("outlet-1", "op-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_rejects_bad_count_and_second_open() {
        let manager = manager().await;

        let mut bad = open_request(500);
        bad.denominations = DenominationCount::empty().with(Denomination::Note100, 4);
        let err = manager.open(bad, Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "DENOMINATION_MISMATCH");

        manager.open(open_request(500), Utc::now()).await.unwrap();
        let err = manager.open(open_request(500), Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "REGISTER_ALREADY_OPEN");
    }

    #[tokio::test]
    async fn test_close_without_open_register() {
        let manager = manager().await;
        let err = manager
            .close(close_request(0, DenominationCount::empty()), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code().as_str(), "NO_OPEN_REGISTER");
    }

    #[tokio::test]
    async fn test_failed_close_leaves_register_open() {
        let manager = manager().await;
        let register = manager.open(open_request(500), Utc::now()).await.unwrap();

        let wrong = DenominationCount::empty().with(Denomination::Note100, 3);
        let err = manager.close(close_request(500, wrong), Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "DENOMINATION_MISMATCH");
        assert!(manager.get(&register.id).await.unwrap().is_open());

        let right = DenominationCount::empty().with(Denomination::Note100, 5);
        let closed = manager.close(close_request(500, right), Utc::now()).await.unwrap();
        assert!(closed.summary.discrepancy.is_zero());
        assert!(!manager.get(&register.id).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_close_short_of_electronic_balances() {
        let manager = manager().await;
        let mut request = open_request(600);
        request.opening_balance = Money::from_major(1000);
        request.opening_by_method.upi = Money::from_major(200);
        request.opening_by_method.card = Money::from_major(200);
        let register = manager.open(request, Utc::now()).await.unwrap();

        let closed = manager
            .close(close_request(300, DenominationCount::empty()), Utc::now())
            .await
            .unwrap();
        assert_eq!(closed.summary.expected_balance, Money::from_major(1000));
        assert_eq!(closed.summary.discrepancy, Money::from_major(-700));
        assert!(!manager.get(&register.id).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_get_unknown_register() {
        let manager = manager().await;
        let err = manager.get("missing").await.unwrap_err();
        assert_eq!(err.code().as_str(), "REGISTER_NOT_FOUND");
    }
}
