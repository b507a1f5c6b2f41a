//! # Domain Types
//!
//! Core domain types of the cash drawer engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────────────┐        ┌───────────────────────────┐        │
//! │  │       Register        │ 1    * │   RegisterTransaction     │        │
//! │  │  ───────────────────  │───────►│  ───────────────────────  │        │
//! │  │  id (UUID)            │        │  id (UUID)                │        │
//! │  │  outlet_id, opened_by │        │  register_id (FK)         │        │
//! │  │  state: Open|Closed   │        │  kind: CashIn|CashOut     │        │
//! │  │  opening_* balances   │        │  payment_method, source   │        │
//! │  │  closing: Option<..>  │        │  amount (> 0)             │        │
//! │  └───────────────────────┘        └───────────────────────────┘        │
//! │                                                                         │
//! │  ┌───────────────────────┐        ┌───────────────────────────┐        │
//! │  │   RegisterSummary     │        │    RegisterStatus         │        │
//! │  │  (derived at close)   │        │  (dashboard snapshot)     │        │
//! │  └───────────────────────┘        └───────────────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Direction of a ledger entry is carried by [`TransactionKind`], never by
//! the sign of its amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::denomination::DenominationCount;
use crate::money::Money;

// =============================================================================
// Register State
// =============================================================================

/// Lifecycle state of a register.
///
/// ```text
/// ∅ ──open()──► Open ──close()──► Closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegisterState {
    /// Drawer is in use; transactions may be recorded.
    Open,
    /// Shift is reconciled. Nothing about the register changes again.
    Closed,
}

// =============================================================================
// Transaction Enums
// =============================================================================

/// Direction of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    CashIn,
    CashOut,
}

impl TransactionKind {
    /// The kind that cancels this one out.
    pub const fn opposite(self) -> Self {
        match self {
            TransactionKind::CashIn => TransactionKind::CashOut,
            TransactionKind::CashOut => TransactionKind::CashIn,
        }
    }
}

/// How the money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical notes and coins in the drawer.
    Cash,
    Upi,
    Debit,
    Credit,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Upi,
        PaymentMethod::Debit,
        PaymentMethod::Credit,
    ];

    /// Display bucket. Debit and credit are reported together as "card".
    pub const fn bucket(self) -> TenderBucket {
        match self {
            PaymentMethod::Cash => TenderBucket::Cash,
            PaymentMethod::Upi => TenderBucket::Upi,
            PaymentMethod::Debit | PaymentMethod::Credit => TenderBucket::Card,
        }
    }
}

/// Reporting partition of payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderBucket {
    Cash,
    Upi,
    Card,
}

/// Where a cash movement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    /// Order settlement from the billing pipeline.
    Order,
    /// Manual income or expense entered by the operator.
    Manual,
    /// Settlement adjustment.
    Settlement,
}

// =============================================================================
// Opening Balances
// =============================================================================

/// Opening float split by tender bucket.
///
/// `cash + upi + card` must equal `total`; see
/// [`crate::validation::validate_opening_balances`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OpeningBalances {
    pub total: Money,
    pub cash: Money,
    pub upi: Money,
    pub card: Money,
}

impl OpeningBalances {
    /// Opening amount for a bucket.
    pub fn for_bucket(&self, bucket: TenderBucket) -> Money {
        match bucket {
            TenderBucket::Cash => self.cash,
            TenderBucket::Upi => self.upi,
            TenderBucket::Card => self.card,
        }
    }
}

// =============================================================================
// Register
// =============================================================================

/// One cash-drawer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Register {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Outlet the drawer belongs to (reference only).
    pub outlet_id: String,

    /// Operator (staff member or owner) who opened the drawer.
    pub opened_by: String,

    pub state: RegisterState,

    pub opening_balance: Money,
    pub opening_cash_balance: Money,
    pub opening_upi_balance: Money,
    pub opening_card_balance: Money,
    pub opening_denominations: DenominationCount,
    pub opening_notes: Option<String>,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    /// Present only once the register is closed.
    pub closing: Option<RegisterClosing>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Register {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == RegisterState::Open
    }

    /// Opening balances as one value for the calculator.
    pub fn opening_balances(&self) -> OpeningBalances {
        OpeningBalances {
            total: self.opening_balance,
            cash: self.opening_cash_balance,
            upi: self.opening_upi_balance,
            card: self.opening_card_balance,
        }
    }
}

/// Closing state, written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterClosing {
    /// Expected total computed from the ledger at close time.
    pub closing_balance: Money,
    /// Physically counted total declared by the operator.
    pub actual_balance: Money,
    /// `actual_balance - closing_balance`. Negative is a shortfall.
    pub discrepancy: Money,
    pub closing_denominations: DenominationCount,
    pub closing_notes: Option<String>,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
}

// =============================================================================
// Register Transaction
// =============================================================================

/// One cash movement against a register. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterTransaction {
    pub id: String,
    pub register_id: String,
    pub kind: TransactionKind,
    pub payment_method: PaymentMethod,
    pub source: TransactionSource,
    /// Always strictly positive.
    pub amount: Money,
    pub description: String,
    /// Order id, or the id of the entry this one reverses.
    pub reference_id: Option<String>,
    pub performed_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl RegisterTransaction {
    /// Amount with the direction applied: positive in, negative out.
    #[inline]
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::CashIn => self.amount,
            TransactionKind::CashOut => -self.amount,
        }
    }
}

// =============================================================================
// Derived Balances
// =============================================================================

/// Live balance per raw payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodBalances {
    pub cash: Money,
    pub upi: Money,
    pub debit: Money,
    pub credit: Money,
}

impl MethodBalances {
    /// Debit and credit combined, as shown on dashboards.
    #[inline]
    pub fn card(&self) -> Money {
        self.debit + self.credit
    }

    /// Sum across every method.
    #[inline]
    pub fn total(&self) -> Money {
        self.cash + self.upi + self.card()
    }

    /// Balance for one bucket of the cash/upi/card partition.
    pub fn bucket(&self, bucket: TenderBucket) -> Money {
        match bucket {
            TenderBucket::Cash => self.cash,
            TenderBucket::Upi => self.upi,
            TenderBucket::Card => self.card(),
        }
    }

    /// Everything that is not physical cash.
    #[inline]
    pub fn non_cash(&self) -> Money {
        self.upi + self.card()
    }

    pub(crate) fn slot_mut(&mut self, method: PaymentMethod) -> &mut Money {
        match method {
            PaymentMethod::Cash => &mut self.cash,
            PaymentMethod::Upi => &mut self.upi,
            PaymentMethod::Debit => &mut self.debit,
            PaymentMethod::Credit => &mut self.credit,
        }
    }
}

/// End-of-shift summary returned by close and by history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterSummary {
    /// Sum of all CashIn amounts.
    pub cash_in: Money,
    /// Sum of all CashOut amounts.
    pub cash_out: Money,
    /// `cash_in - cash_out`.
    pub net_position: Money,
    /// Expected balance per method, opening included.
    pub by_method: MethodBalances,
    pub expected_balance: Money,
    pub actual_balance: Money,
    pub discrepancy: Money,
    pub transaction_count: usize,
}

/// Result of a successful close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosedRegister {
    pub register: Register,
    pub summary: RegisterSummary,
}

// =============================================================================
// Status Snapshot
// =============================================================================

/// One open register as shown on the outlet dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterView {
    pub register_id: String,
    pub operator_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opening: OpeningBalances,
    /// Live balances, opening included.
    pub balances: MethodBalances,
    pub total_balance: Money,
    pub today_cash_in: Money,
    pub today_cash_out: Money,
    /// Newest first.
    pub recent_transactions: Vec<RegisterTransaction>,
}

/// Dashboard snapshot for one operator at one outlet.
///
/// Read-only and possibly a few minutes stale. Never used to decide a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterStatus {
    pub outlet_id: String,
    pub operator_id: String,
    pub has_open_register: bool,
    /// The asking operator's own open register.
    pub register: Option<RegisterView>,
    /// Every open register at the outlet, across operators.
    pub active_registers: Vec<RegisterView>,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

// =============================================================================
// Requests
// =============================================================================

/// Opening float split declared by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OpeningByMethod {
    pub cash: Money,
    pub upi: Money,
    pub card: Money,
}

/// Request to open a register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OpenRegister {
    pub outlet_id: String,
    pub operator_id: String,
    pub opening_balance: Money,
    pub opening_by_method: OpeningByMethod,
    #[serde(default)]
    pub denominations: DenominationCount,
    pub notes: Option<String>,
}

impl OpenRegister {
    pub fn opening_balances(&self) -> OpeningBalances {
        OpeningBalances {
            total: self.opening_balance,
            cash: self.opening_by_method.cash,
            upi: self.opening_by_method.upi,
            card: self.opening_by_method.card,
        }
    }
}

/// Request to append a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordTransaction {
    pub register_id: String,
    pub kind: TransactionKind,
    pub payment_method: PaymentMethod,
    pub source: TransactionSource,
    pub amount: Money,
    pub description: String,
    pub reference_id: Option<String>,
    pub performed_by: String,
}

/// Request to close the operator's open register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CloseRegister {
    pub operator_id: String,
    /// Restricts the close to one outlet. Without it the operator's most
    /// recently opened register is closed.
    pub outlet_id: Option<String>,
    pub actual_balance: Money,
    #[serde(default)]
    pub denominations: DenominationCount,
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
