//! # Register Repository
//!
//! Database operations for register sessions.
//!
//! ## Register Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Register Lifecycle                                │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── insert() → status 'open'                                       │
//! │         └── idx_registers_one_open rejects a second open row           │
//! │                                                                         │
//! │  2. CLOSE (one database transaction)                                   │
//! │     └── claim_open()     UPDATE ... RETURNING, takes the write lock    │
//! │     └── list_for_in()    ledger read under that lock                   │
//! │     └── write_closing()  closing fields + status 'closed'              │
//! │                                                                         │
//! │  3. CLOSED                                                             │
//! │     └── registers_closed_immutable trigger rejects every UPDATE        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{DenominationCount, Money, Register, RegisterClosing, RegisterState};

/// Column list shared by every register SELECT / RETURNING.
const REGISTER_COLUMNS: &str = r#"
    id, outlet_id, opened_by, status,
    opening_balance_cents, opening_cash_cents, opening_upi_cents, opening_card_cents,
    opening_denominations, opening_notes, opened_at,
    closing_balance_cents, actual_balance_cents, discrepancy_cents,
    closing_denominations, closing_notes, closed_at,
    updated_at
"#;

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `registers` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegisterRow {
    pub id: String,
    pub outlet_id: String,
    pub opened_by: String,
    pub status: RegisterState,
    pub opening_balance_cents: i64,
    pub opening_cash_cents: i64,
    pub opening_upi_cents: i64,
    pub opening_card_cents: i64,
    pub opening_denominations: String,
    pub opening_notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closing_balance_cents: Option<i64>,
    pub actual_balance_cents: Option<i64>,
    pub discrepancy_cents: Option<i64>,
    pub closing_denominations: Option<String>,
    pub closing_notes: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RegisterRow> for Register {
    type Error = DbError;

    fn try_from(row: RegisterRow) -> DbResult<Self> {
        let opening_denominations = decode_denominations(&row.id, &row.opening_denominations)?;

        let closing = match row.status {
            RegisterState::Open => None,
            RegisterState::Closed => Some(closing_from_row(&row)?),
        };

        Ok(Register {
            id: row.id,
            outlet_id: row.outlet_id,
            opened_by: row.opened_by,
            state: row.status,
            opening_balance: Money::from_minor(row.opening_balance_cents),
            opening_cash_balance: Money::from_minor(row.opening_cash_cents),
            opening_upi_balance: Money::from_minor(row.opening_upi_cents),
            opening_card_balance: Money::from_minor(row.opening_card_cents),
            opening_denominations,
            opening_notes: row.opening_notes,
            opened_at: row.opened_at,
            closing,
            updated_at: row.updated_at,
        })
    }
}

fn closing_from_row(row: &RegisterRow) -> DbResult<RegisterClosing> {
    let missing = |column: &str| DbError::corrupt("register", &row.id, format!("closed without {column}"));

    let closing_balance = row
        .closing_balance_cents
        .ok_or_else(|| missing("closing_balance_cents"))?;
    let actual_balance = row
        .actual_balance_cents
        .ok_or_else(|| missing("actual_balance_cents"))?;
    let discrepancy = row
        .discrepancy_cents
        .ok_or_else(|| missing("discrepancy_cents"))?;
    let denominations = row
        .closing_denominations
        .as_deref()
        .ok_or_else(|| missing("closing_denominations"))?;
    let closed_at = row.closed_at.ok_or_else(|| missing("closed_at"))?;

    Ok(RegisterClosing {
        closing_balance: Money::from_minor(closing_balance),
        actual_balance: Money::from_minor(actual_balance),
        discrepancy: Money::from_minor(discrepancy),
        closing_denominations: decode_denominations(&row.id, denominations)?,
        closing_notes: row.closing_notes.clone(),
        closed_at,
    })
}

fn decode_denominations(register_id: &str, json: &str) -> DbResult<DenominationCount> {
    serde_json::from_str(json)
        .map_err(|e| DbError::corrupt("register", register_id, format!("denominations: {e}")))
}

fn encode_denominations(count: &DenominationCount) -> DbResult<String> {
    serde_json::to_string(count).map_err(|e| DbError::Internal(e.to_string()))
}

fn into_registers(rows: Vec<RegisterRow>) -> DbResult<Vec<Register>> {
    rows.into_iter().map(Register::try_from).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for register database operations.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    /// Creates a new RegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Inserts a freshly opened register.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on `registers.outlet_id, registers.opened_by`
    /// when the operator already has an open register at the outlet. The
    /// partial unique index decides this, so two concurrent inserts can never
    /// both succeed.
    pub async fn insert(&self, register: &Register) -> DbResult<()> {
        debug!(
            id = %register.id,
            outlet_id = %register.outlet_id,
            opened_by = %register.opened_by,
            "Inserting register"
        );

        let opening_denominations = encode_denominations(&register.opening_denominations)?;

        sqlx::query(
            r#"
            INSERT INTO registers (
                id, outlet_id, opened_by, status,
                opening_balance_cents, opening_cash_cents, opening_upi_cents, opening_card_cents,
                opening_denominations, opening_notes, opened_at,
                updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12
            )
            "#,
        )
        .bind(&register.id)
        .bind(&register.outlet_id)
        .bind(&register.opened_by)
        .bind(register.state)
        .bind(register.opening_balance.minor())
        .bind(register.opening_cash_balance.minor())
        .bind(register.opening_upi_balance.minor())
        .bind(register.opening_card_balance.minor())
        .bind(opening_denominations)
        .bind(&register.opening_notes)
        .bind(register.opened_at)
        .bind(register.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a register by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Register>> {
        let sql = format!("SELECT {REGISTER_COLUMNS} FROM registers WHERE id = ?1");

        let row = sqlx::query_as::<_, RegisterRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Register::try_from).transpose()
    }

    /// The operator's open register at an outlet, if any.
    pub async fn find_open(&self, outlet_id: &str, operator_id: &str) -> DbResult<Option<Register>> {
        let sql = format!(
            "SELECT {REGISTER_COLUMNS} FROM registers
             WHERE outlet_id = ?1 AND opened_by = ?2 AND status = 'open'"
        );

        let row = sqlx::query_as::<_, RegisterRow>(&sql)
            .bind(outlet_id)
            .bind(operator_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Register::try_from).transpose()
    }

    /// Every open register at an outlet, oldest first.
    pub async fn list_open_for_outlet(&self, outlet_id: &str) -> DbResult<Vec<Register>> {
        let sql = format!(
            "SELECT {REGISTER_COLUMNS} FROM registers
             WHERE outlet_id = ?1 AND status = 'open'
             ORDER BY opened_at, rowid"
        );

        let rows = sqlx::query_as::<_, RegisterRow>(&sql)
            .bind(outlet_id)
            .fetch_all(&self.pool)
            .await?;

        into_registers(rows)
    }

    /// Closed registers at an outlet, most recently closed first.
    pub async fn list_closed_for_outlet(&self, outlet_id: &str, limit: u32) -> DbResult<Vec<Register>> {
        let sql = format!(
            "SELECT {REGISTER_COLUMNS} FROM registers
             WHERE outlet_id = ?1 AND status = 'closed'
             ORDER BY closed_at DESC, rowid DESC
             LIMIT ?2"
        );

        let rows = sqlx::query_as::<_, RegisterRow>(&sql)
            .bind(outlet_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        into_registers(rows)
    }

    /// Closed registers whose |discrepancy| is at least `min_abs`, most
    /// recently closed first.
    pub async fn list_discrepancies(
        &self,
        outlet_id: &str,
        min_abs: Money,
        limit: u32,
    ) -> DbResult<Vec<Register>> {
        let sql = format!(
            "SELECT {REGISTER_COLUMNS} FROM registers
             WHERE outlet_id = ?1
               AND status = 'closed'
               AND discrepancy_cents != 0
               AND abs(discrepancy_cents) >= ?2
             ORDER BY closed_at DESC, rowid DESC
             LIMIT ?3"
        );

        let rows = sqlx::query_as::<_, RegisterRow>(&sql)
            .bind(outlet_id)
            .bind(min_abs.abs().minor())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        into_registers(rows)
    }

    // =========================================================================
    // Close (transaction-scoped)
    // =========================================================================

    /// Claims the operator's open register for closing.
    ///
    /// Must be the first statement of the close transaction. The UPDATE takes
    /// SQLite's write lock, so no ledger entry can be appended to the register
    /// until the transaction ends, and a concurrent close of the same register
    /// waits and then finds nothing open.
    ///
    /// Without `outlet_id` the most recently opened register is claimed.
    pub async fn claim_open(
        conn: &mut SqliteConnection,
        operator_id: &str,
        outlet_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Register>> {
        let sql = format!(
            "UPDATE registers SET updated_at = ?1
             WHERE id = (
                 SELECT id FROM registers
                 WHERE opened_by = ?2
                   AND status = 'open'
                   AND (?3 IS NULL OR outlet_id = ?3)
                 ORDER BY opened_at DESC, rowid DESC
                 LIMIT 1
             )
             RETURNING {REGISTER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, RegisterRow>(&sql)
            .bind(now)
            .bind(operator_id)
            .bind(outlet_id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(Register::try_from).transpose()
    }

    /// Writes the closing state and flips the register to closed.
    ///
    /// Only an open row is updated; anything else is `NotFound`.
    pub async fn write_closing(
        conn: &mut SqliteConnection,
        register_id: &str,
        closing: &RegisterClosing,
    ) -> DbResult<()> {
        debug!(
            id = %register_id,
            discrepancy = %closing.discrepancy,
            "Writing register closing state"
        );

        let closing_denominations = encode_denominations(&closing.closing_denominations)?;

        let result = sqlx::query(
            r#"
            UPDATE registers SET
                status = 'closed',
                closing_balance_cents = ?2,
                actual_balance_cents = ?3,
                discrepancy_cents = ?4,
                closing_denominations = ?5,
                closing_notes = ?6,
                closed_at = ?7,
                updated_at = ?7
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(register_id)
        .bind(closing.closing_balance.minor())
        .bind(closing.actual_balance.minor())
        .bind(closing.discrepancy.minor())
        .bind(closing_denominations)
        .bind(&closing.closing_notes)
        .bind(closing.closed_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Register (open)", register_id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use till_core::Denomination;

    fn open_register(outlet_id: &str, operator_id: &str) -> Register {
        let now = Utc::now();
        Register {
            id: uuid::Uuid::new_v4().to_string(),
            outlet_id: outlet_id.to_string(),
            opened_by: operator_id.to_string(),
            state: RegisterState::Open,
            opening_balance: Money::from_major(1000),
            opening_cash_balance: Money::from_major(600),
            opening_upi_balance: Money::from_major(200),
            opening_card_balance: Money::from_major(200),
            opening_denominations: DenominationCount::empty()
                .with(Denomination::Note500, 1)
                .with(Denomination::Note100, 1),
            opening_notes: Some("morning".to_string()),
            opened_at: now,
            closing: None,
            updated_at: now,
        }
    }

    fn closing(actual: i64, expected: i64) -> RegisterClosing {
        RegisterClosing {
            closing_balance: Money::from_major(expected),
            actual_balance: Money::from_major(actual),
            discrepancy: Money::from_major(actual - expected),
            closing_denominations: DenominationCount::empty(),
            closing_notes: None,
            closed_at: Utc::now(),
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let register = open_register("outlet-1", "op-1");
        db.registers().insert(&register).await.unwrap();

        let loaded = db.registers().get_by_id(&register.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, register.id);
        assert_eq!(loaded.state, RegisterState::Open);
        assert_eq!(loaded.opening_denominations, register.opening_denominations);
        assert_eq!(loaded.opening_balances(), register.opening_balances());
        assert!(loaded.closing.is_none());

        assert!(db.registers().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_open_rejected_by_index() {
        let db = test_db().await;
        db.registers().insert(&open_register("outlet-1", "op-1")).await.unwrap();

        let err = db
            .registers()
            .insert(&open_register("outlet-1", "op-1"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("registers.opened_by"), "{err:?}");

        // Other outlet, other operator: fine
        db.registers().insert(&open_register("outlet-2", "op-1")).await.unwrap();
        db.registers().insert(&open_register("outlet-1", "op-2")).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_and_close() {
        let db = test_db().await;
        let register = open_register("outlet-1", "op-1");
        db.registers().insert(&register).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let claimed = RegisterRepository::claim_open(&mut tx, "op-1", None, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, register.id);
        RegisterRepository::write_closing(&mut tx, &claimed.id, &closing(1440, 1450))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let closed = db.registers().get_by_id(&register.id).await.unwrap().unwrap();
        assert_eq!(closed.state, RegisterState::Closed);
        let closing = closed.closing.unwrap();
        assert_eq!(closing.discrepancy, Money::from_major(-10));

        // Nothing left to claim
        let mut tx = db.begin().await.unwrap();
        assert!(RegisterRepository::claim_open(&mut tx, "op-1", None, Utc::now())
            .await
            .unwrap()
            .is_none());
        tx.rollback().await.unwrap();

        // The operator can open again once closed
        db.registers().insert(&open_register("outlet-1", "op-1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_scoped_to_outlet() {
        let db = test_db().await;
        let first = open_register("outlet-1", "op-1");
        db.registers().insert(&first).await.unwrap();
        let mut second = open_register("outlet-2", "op-1");
        second.opened_at = first.opened_at + chrono::Duration::seconds(1);
        db.registers().insert(&second).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let claimed = RegisterRepository::claim_open(&mut tx, "op-1", Some("outlet-1"), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, first.id);
        tx.rollback().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let claimed = RegisterRepository::claim_open(&mut tx, "op-1", None, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, second.id);
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_register_is_immutable() {
        let db = test_db().await;
        let register = open_register("outlet-1", "op-1");
        db.registers().insert(&register).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        RegisterRepository::write_closing(&mut tx, &register.id, &closing(1000, 1000))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = sqlx::query("UPDATE registers SET closing_notes = 'edited' WHERE id = ?1")
            .bind(&register.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)), "{err:?}");

        // A second close finds no open row
        let mut conn = db.pool().acquire().await.unwrap();
        let err = RegisterRepository::write_closing(&mut conn, &register.id, &closing(900, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        drop(conn);

        let reloaded = db.registers().get_by_id(&register.id).await.unwrap().unwrap();
        assert_eq!(reloaded.closing.unwrap().actual_balance, Money::from_major(1000));
    }

    #[tokio::test]
    async fn test_history_and_discrepancies() {
        let db = test_db().await;
        for (operator, actual) in [("op-1", 990), ("op-2", 1000), ("op-3", 1025)] {
            let register = open_register("outlet-1", operator);
            db.registers().insert(&register).await.unwrap();
            let mut tx = db.begin().await.unwrap();
            RegisterRepository::write_closing(&mut tx, &register.id, &closing(actual, 1000))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let history = db.registers().list_closed_for_outlet("outlet-1", 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].opened_by, "op-3");

        let flagged = db
            .registers()
            .list_discrepancies("outlet-1", Money::from_major(20), 10)
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].opened_by, "op-3");

        let any = db
            .registers()
            .list_discrepancies("outlet-1", Money::zero(), 10)
            .await
            .unwrap();
        assert_eq!(any.len(), 2);
    }
}
