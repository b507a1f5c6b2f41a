//! Append-only transaction ledger.
//!
//! Entries are only ever inserted, and only while their register is open.
//! The open check and the insert are one statement, so an entry either lands
//! before a concurrent close claims the register or is refused.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use till_core::validation::{validate_description, validate_record_request, validate_required_id};
use till_core::{CoreError, RecordTransaction, RegisterTransaction, ValidationError};
use till_db::Database;

use crate::error::{ServiceError, ServiceResult};

/// Records and reads register transactions.
#[derive(Debug, Clone)]
pub struct TransactionLedger {
    db: Database,
}

impl TransactionLedger {
    pub fn new(db: Database) -> Self {
        TransactionLedger { db }
    }

    /// Appends an entry to an open register.
    ///
    /// ## Errors
    /// - `Validation` for a non-positive amount or a bad description
    /// - `RegisterNotFound` / `RegisterClosed`
    pub async fn record(&self, request: RecordTransaction, now: DateTime<Utc>) -> ServiceResult<RegisterTransaction> {
        validate_record_request(&request)?;

        let entry = RegisterTransaction {
            id: Uuid::new_v4().to_string(),
            register_id: request.register_id,
            kind: request.kind,
            payment_method: request.payment_method,
            source: request.source,
            amount: request.amount,
            description: request.description.trim().to_string(),
            reference_id: request.reference_id,
            performed_by: request.performed_by,
            created_at: now,
        };

        if !self.db.transactions().insert_if_open(&entry).await? {
            return Err(self.refusal(&entry.register_id).await);
        }

        info!(
            transaction_id = %entry.id,
            register_id = %entry.register_id,
            kind = ?entry.kind,
            method = ?entry.payment_method,
            source = ?entry.source,
            amount = %entry.amount,
            "Transaction recorded"
        );

        Ok(entry)
    }

    /// Appends the entry that cancels `transaction_id`.
    ///
    /// The original stays in the ledger untouched. Each entry can be
    /// reversed once.
    pub async fn reverse(
        &self,
        transaction_id: &str,
        performed_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<RegisterTransaction> {
        validate_required_id("transaction_id", transaction_id)?;
        validate_required_id("performed_by", performed_by)?;

        validate_description(reason)?;
        let description = format!("Reversal: {}", reason.trim());
        validate_description(&description)?;

        let new_id = Uuid::new_v4().to_string();
        let inserted = self
            .db
            .transactions()
            .insert_reversal(&new_id, transaction_id, &description, performed_by, now)
            .await;

        let reversal = match inserted {
            Ok(Some(reversal)) => reversal,
            Ok(None) => {
                let original = self.get(transaction_id).await?;
                return Err(CoreError::RegisterClosed {
                    register_id: original.register_id,
                }
                .into());
            }
            Err(e) if e.is_unique_violation_on("register_transactions.reversal_of") => {
                return Err(ValidationError::Inconsistent {
                    field: "transaction_id".to_string(),
                    reason: "already reversed".to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            transaction_id = %reversal.id,
            reverses = %transaction_id,
            register_id = %reversal.register_id,
            amount = %reversal.amount,
            "Transaction reversed"
        );

        Ok(reversal)
    }

    /// A single entry by id.
    pub async fn get(&self, transaction_id: &str) -> ServiceResult<RegisterTransaction> {
        self.db
            .transactions()
            .get_by_id(transaction_id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()).into())
    }

    /// Every entry of the register in creation order.
    pub async fn list_for(&self, register_id: &str) -> ServiceResult<Vec<RegisterTransaction>> {
        self.ensure_register(register_id).await?;
        Ok(self.db.transactions().list_for(register_id).await?)
    }

    /// The newest `limit` entries, newest first.
    pub async fn recent_for(&self, register_id: &str, limit: u32) -> ServiceResult<Vec<RegisterTransaction>> {
        self.ensure_register(register_id).await?;
        Ok(self.db.transactions().recent_for(register_id, limit).await?)
    }

    async fn ensure_register(&self, register_id: &str) -> ServiceResult<()> {
        match self.db.registers().get_by_id(register_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::RegisterNotFound(register_id.to_string()).into()),
        }
    }

    /// Why a conditional insert wrote nothing.
    async fn refusal(&self, register_id: &str) -> ServiceError {
        match self.db.registers().get_by_id(register_id).await {
            Ok(Some(_)) => {
                debug!(register_id = %register_id, "Entry refused, register is closed");
                CoreError::RegisterClosed {
                    register_id: register_id.to_string(),
                }
                .into()
            }
            Ok(None) => CoreError::RegisterNotFound(register_id.to_string()).into(),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RegisterSessionManager;
    use till_core::{
        CloseRegister, DenominationAuditor, DenominationCount, Money, OpenRegister, OpeningByMethod,
        PaymentMethod, TransactionKind, TransactionSource,
    };
    use till_db::DbConfig;

    async fn setup() -> (RegisterSessionManager, TransactionLedger, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sessions = RegisterSessionManager::new(db.clone(), DenominationAuditor::default());
        let register = sessions
            .open(
                OpenRegister {
                    outlet_id: "outlet-1".to_string(),
                    operator_id: "op-1".to_string(),
                    opening_balance: Money::from_major(200),
                    opening_by_method: OpeningByMethod {
                        upi: Money::from_major(200),
                        ..Default::default()
                    },
                    denominations: DenominationCount::empty(),
                    notes: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (sessions, TransactionLedger::new(db), register.id)
    }

    fn sale(register_id: &str, amount: i64) -> RecordTransaction {
        RecordTransaction {
            register_id: register_id.to_string(),
            kind: TransactionKind::CashIn,
            payment_method: PaymentMethod::Upi,
            source: TransactionSource::Order,
            amount: Money::from_major(amount),
            description: "Order #42".to_string(),
            reference_id: Some("order-42".to_string()),
            performed_by: "op-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let (_, ledger, register_id) = setup().await;

        ledger.record(sale(&register_id, 100), Utc::now()).await.unwrap();
        ledger.record(sale(&register_id, 250), Utc::now()).await.unwrap();

        let entries = ledger.list_for(&register_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, Money::from_major(100));

        let recent = ledger.recent_for(&register_id, 1).await.unwrap();
        assert_eq!(recent[0].amount, Money::from_major(250));
    }

    #[tokio::test]
    async fn test_record_rejections() {
        let (sessions, ledger, register_id) = setup().await;

        let err = ledger.record(sale(&register_id, 0), Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "VALIDATION_ERROR");

        let unknown = Uuid::new_v4().to_string();
        let err = ledger.record(sale(&unknown, 10), Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "REGISTER_NOT_FOUND");

        sessions
            .close(
                CloseRegister {
                    operator_id: "op-1".to_string(),
                    outlet_id: None,
                    actual_balance: Money::from_major(200),
                    denominations: DenominationCount::empty(),
                    notes: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let err = ledger.record(sale(&register_id, 10), Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "REGISTER_CLOSED");
        assert!(ledger.list_for(&register_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_once() {
        let (_, ledger, register_id) = setup().await;
        let original = ledger.record(sale(&register_id, 100), Utc::now()).await.unwrap();

        let reversal = ledger
            .reverse(&original.id, "op-1", "wrong table", Utc::now())
            .await
            .unwrap();
        assert_eq!(reversal.kind, TransactionKind::CashOut);
        assert_eq!(reversal.payment_method, PaymentMethod::Upi);
        assert_eq!(reversal.source, TransactionSource::Manual);
        assert_eq!(reversal.reference_id.as_deref(), Some(original.id.as_str()));
        assert_eq!(reversal.description, "Reversal: wrong table");

        let err = ledger
            .reverse(&original.id, "op-1", "again", Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code().as_str(), "VALIDATION_ERROR");

        let err = ledger.reverse("missing", "op-1", "nope", Utc::now()).await.unwrap_err();
        assert_eq!(err.code().as_str(), "TRANSACTION_NOT_FOUND");
    }
}
