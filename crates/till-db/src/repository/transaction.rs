//! # Transaction Repository
//!
//! The append-only cash movement ledger.
//!
//! ## Write Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_if_open()                                                       │
//! │    INSERT ... SELECT ... WHERE register is open                         │
//! │    One statement: either the register was open when the row landed,    │
//! │    or nothing was written. A close cannot slip in between.             │
//! │                                                                         │
//! │  insert_reversal()                                                      │
//! │    Same shape, copying method and amount from the original entry and   │
//! │    flipping its kind. reversal_of is UNIQUE: one reversal per entry.   │
//! │                                                                         │
//! │  No UPDATE, no DELETE. Triggers reject both.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{Money, PaymentMethod, RegisterTransaction, TransactionKind, TransactionSource};

const TRANSACTION_COLUMNS: &str = r#"
    id, register_id, kind, payment_method, source,
    amount_cents, description, reference_id, performed_by, created_at
"#;

/// Raw `register_transactions` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub register_id: String,
    pub kind: TransactionKind,
    pub payment_method: PaymentMethod,
    pub source: TransactionSource,
    pub amount_cents: i64,
    pub description: String,
    pub reference_id: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRow> for RegisterTransaction {
    fn from(row: TransactionRow) -> Self {
        RegisterTransaction {
            id: row.id,
            register_id: row.register_id,
            kind: row.kind,
            payment_method: row.payment_method,
            source: row.source,
            amount: Money::from_minor(row.amount_cents),
            description: row.description,
            reference_id: row.reference_id,
            performed_by: row.performed_by,
            created_at: row.created_at,
        }
    }
}

fn into_transactions(rows: Vec<TransactionRow>) -> Vec<RegisterTransaction> {
    rows.into_iter().map(RegisterTransaction::from).collect()
}

/// Repository for ledger operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Appends an entry if, and only if, its register is open.
    ///
    /// ## Returns
    /// * `Ok(true)` - the entry was written
    /// * `Ok(false)` - the register is closed or does not exist; nothing
    ///   was written
    pub async fn insert_if_open(&self, entry: &RegisterTransaction) -> DbResult<bool> {
        debug!(
            register_id = %entry.register_id,
            kind = ?entry.kind,
            method = ?entry.payment_method,
            amount = %entry.amount,
            "Appending ledger entry"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO register_transactions (
                id, register_id, kind, payment_method, source,
                amount_cents, description, reference_id, performed_by, created_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
            WHERE EXISTS (
                SELECT 1 FROM registers WHERE id = ?2 AND status = 'open'
            )
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.register_id)
        .bind(entry.kind)
        .bind(entry.payment_method)
        .bind(entry.source)
        .bind(entry.amount.minor())
        .bind(&entry.description)
        .bind(&entry.reference_id)
        .bind(&entry.performed_by)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Appends the offsetting entry for `original_id`.
    ///
    /// The new entry has the opposite kind, the same method and amount,
    /// source `manual`, and `reference_id` pointing at the original.
    ///
    /// ## Returns
    /// * `Ok(Some(entry))` - written
    /// * `Ok(None)` - the original does not exist or its register is not open
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on `register_transactions.reversal_of` when
    /// the original was already reversed.
    pub async fn insert_reversal(
        &self,
        new_id: &str,
        original_id: &str,
        description: &str,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<RegisterTransaction>> {
        debug!(original_id = %original_id, "Appending reversal entry");

        let sql = format!(
            r#"
            INSERT INTO register_transactions (
                id, register_id, kind, payment_method, source,
                amount_cents, description, reference_id, reversal_of, performed_by, created_at
            )
            SELECT
                ?1,
                t.register_id,
                CASE t.kind WHEN 'cash_in' THEN 'cash_out' ELSE 'cash_in' END,
                t.payment_method,
                'manual',
                t.amount_cents,
                ?2,
                t.id,
                t.id,
                ?3,
                ?4
            FROM register_transactions t
            JOIN registers r ON r.id = t.register_id
            WHERE t.id = ?5 AND r.status = 'open'
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(new_id)
            .bind(description)
            .bind(performed_by)
            .bind(now)
            .bind(original_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RegisterTransaction::from))
    }

    /// Gets a ledger entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RegisterTransaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM register_transactions WHERE id = ?1");

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RegisterTransaction::from))
    }

    /// Every entry of a register in creation order.
    pub async fn list_for(&self, register_id: &str) -> DbResult<Vec<RegisterTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::list_for_in(&mut conn, register_id).await
    }

    /// [`list_for`](Self::list_for) on a caller-held connection, used inside
    /// the close transaction.
    pub async fn list_for_in(
        conn: &mut SqliteConnection,
        register_id: &str,
    ) -> DbResult<Vec<RegisterTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM register_transactions
             WHERE register_id = ?1
             ORDER BY created_at, rowid"
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(register_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(into_transactions(rows))
    }

    /// The newest `limit` entries of a register, newest first.
    pub async fn recent_for(&self, register_id: &str, limit: u32) -> DbResult<Vec<RegisterTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM register_transactions
             WHERE register_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(register_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(into_transactions(rows))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::register::RegisterRepository;
    use crate::{Database, DbConfig};
    use till_core::{DenominationCount, Register, RegisterClosing, RegisterState};

    async fn db_with_register() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let register = Register {
            id: uuid::Uuid::new_v4().to_string(),
            outlet_id: "outlet-1".to_string(),
            opened_by: "op-1".to_string(),
            state: RegisterState::Open,
            opening_balance: Money::from_major(1000),
            opening_cash_balance: Money::from_major(600),
            opening_upi_balance: Money::from_major(200),
            opening_card_balance: Money::from_major(200),
            opening_denominations: DenominationCount::empty(),
            opening_notes: None,
            opened_at: now,
            closing: None,
            updated_at: now,
        };
        db.registers().insert(&register).await.unwrap();
        (db, register.id)
    }

    fn entry(register_id: &str, kind: TransactionKind, amount: i64) -> RegisterTransaction {
        RegisterTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            register_id: register_id.to_string(),
            kind,
            payment_method: PaymentMethod::Cash,
            source: TransactionSource::Manual,
            amount: Money::from_major(amount),
            description: "entry".to_string(),
            reference_id: None,
            performed_by: "op-1".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn close(db: &Database, register_id: &str) {
        let mut tx = db.begin().await.unwrap();
        let closing = RegisterClosing {
            closing_balance: Money::from_major(1000),
            actual_balance: Money::from_major(1000),
            discrepancy: Money::zero(),
            closing_denominations: DenominationCount::empty(),
            closing_notes: None,
            closed_at: Utc::now(),
        };
        RegisterRepository::write_closing(&mut tx, register_id, &closing)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let (db, register_id) = db_with_register().await;
        let ledger = db.transactions();

        let first = entry(&register_id, TransactionKind::CashIn, 500);
        let second = entry(&register_id, TransactionKind::CashOut, 50);
        assert!(ledger.insert_if_open(&first).await.unwrap());
        assert!(ledger.insert_if_open(&second).await.unwrap());

        let all = ledger.list_for(&register_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[0].amount, Money::from_major(500));
        assert_eq!(all[1].kind, TransactionKind::CashOut);

        let recent = ledger.recent_for(&register_id, 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);
    }

    #[tokio::test]
    async fn test_insert_rejected_when_closed_or_missing() {
        let (db, register_id) = db_with_register().await;
        let ledger = db.transactions();

        assert!(!ledger
            .insert_if_open(&entry("no-such-register", TransactionKind::CashIn, 10))
            .await
            .unwrap());

        close(&db, &register_id).await;
        assert!(!ledger
            .insert_if_open(&entry(&register_id, TransactionKind::CashIn, 10))
            .await
            .unwrap());
        assert!(ledger.list_for(&register_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_rows_are_append_only() {
        let (db, register_id) = db_with_register().await;
        let first = entry(&register_id, TransactionKind::CashIn, 500);
        db.transactions().insert_if_open(&first).await.unwrap();

        let update = sqlx::query("UPDATE register_transactions SET amount_cents = 1 WHERE id = ?1")
            .bind(&first.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(matches!(update, Err(DbError::Rejected(_))));

        let delete = sqlx::query("DELETE FROM register_transactions WHERE id = ?1")
            .bind(&first.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(matches!(delete, Err(DbError::Rejected(_))));

        // Zero amounts never reach the table
        let zero = entry(&register_id, TransactionKind::CashIn, 0);
        assert!(db.transactions().insert_if_open(&zero).await.is_err());
    }

    #[tokio::test]
    async fn test_reversal() {
        let (db, register_id) = db_with_register().await;
        let ledger = db.transactions();
        let original = entry(&register_id, TransactionKind::CashIn, 500);
        ledger.insert_if_open(&original).await.unwrap();

        let reversal = ledger
            .insert_reversal("rev-1", &original.id, "Wrong drawer", "op-1", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reversal.kind, TransactionKind::CashOut);
        assert_eq!(reversal.amount, original.amount);
        assert_eq!(reversal.source, TransactionSource::Manual);
        assert_eq!(reversal.reference_id.as_deref(), Some(original.id.as_str()));

        let again = ledger
            .insert_reversal("rev-2", &original.id, "Again", "op-1", Utc::now())
            .await
            .unwrap_err();
        assert!(again.is_unique_violation_on("register_transactions.reversal_of"), "{again:?}");

        assert!(ledger
            .insert_reversal("rev-3", "missing", "Nope", "op-1", Utc::now())
            .await
            .unwrap()
            .is_none());

        // The original entry is untouched
        let original_reloaded = ledger.get_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(original_reloaded.kind, TransactionKind::CashIn);
        assert_eq!(original_reloaded.amount, Money::from_major(500));
        assert_eq!(ledger.list_for(&register_id).await.unwrap().len(), 2);
    }
}
