//! # Reconciliation
//!
//! Pure balance math over a register's ledger. No I/O, no clock reads:
//! "now" is always passed in.
//!
//! ## Balance Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total = opening.total + Σ CashIn − Σ CashOut                           │
//! │        = cash + upi + card        (card = debit + credit)               │
//! │                                                                         │
//! │  At close:                                                              │
//! │    expected    = total                                                  │
//! │    discrepancy = actual − expected                                      │
//! │                  > 0  surplus                                           │
//! │                  < 0  shortfall                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Running totals are never stored; everything here is derived on read.

use chrono::{DateTime, FixedOffset, Utc};

use crate::money::Money;
use crate::types::{
    MethodBalances, OpeningBalances, PaymentMethod, RegisterSummary, RegisterTransaction,
    TenderBucket, TransactionKind,
};

/// Balance of one raw payment method: its opening share plus the signed sum
/// of its entries.
///
/// Debit and credit share the opening card float, which is attributed to
/// the debit slot so that `debit + credit` starts at the card opening.
pub fn balance_by_method(
    opening: &OpeningBalances,
    transactions: &[RegisterTransaction],
    method: PaymentMethod,
) -> Money {
    let movements: Money = transactions
        .iter()
        .filter(|t| t.payment_method == method)
        .map(RegisterTransaction::signed_amount)
        .sum();

    opening_for_method(opening, method) + movements
}

/// Balance of one display bucket (cash, upi, card).
pub fn balance_by_bucket(
    opening: &OpeningBalances,
    transactions: &[RegisterTransaction],
    bucket: TenderBucket,
) -> Money {
    let movements: Money = transactions
        .iter()
        .filter(|t| t.payment_method.bucket() == bucket)
        .map(RegisterTransaction::signed_amount)
        .sum();

    opening.for_bucket(bucket) + movements
}

/// Every method's live balance in one pass.
pub fn method_balances(
    opening: &OpeningBalances,
    transactions: &[RegisterTransaction],
) -> MethodBalances {
    let mut balances = MethodBalances::default();
    for method in PaymentMethod::ALL {
        *balances.slot_mut(method) = opening_for_method(opening, method);
    }
    for t in transactions {
        *balances.slot_mut(t.payment_method) += t.signed_amount();
    }
    balances
}

/// Expected drawer total: `opening.total + Σ CashIn − Σ CashOut`.
pub fn total_balance(opening: &OpeningBalances, transactions: &[RegisterTransaction]) -> Money {
    let (cash_in, cash_out) = flows(transactions);
    opening.total + cash_in - cash_out
}

/// `actual − total`. Positive is a surplus, negative a shortfall.
///
/// Informational only: a close with a discrepancy still succeeds.
#[inline]
pub fn discrepancy(actual_balance: Money, total_balance: Money) -> Money {
    actual_balance - total_balance
}

/// Cash a counted drawer should contain when the operator declares
/// `actual_balance` in total.
///
/// UPI and card tenders settle electronically, so the expected non-cash
/// balances are taken as-is and the remainder is what the notes and coins
/// must add up to. Floored at zero: a declared total below the electronic
/// balances means an empty drawer, and the shortfall shows up in the
/// discrepancy instead.
pub fn declared_cash_component(actual_balance: Money, balances: &MethodBalances) -> Money {
    (actual_balance - balances.non_cash()).max(Money::zero())
}

/// `(Σ CashIn, Σ CashOut)` over the entries.
pub fn flows(transactions: &[RegisterTransaction]) -> (Money, Money) {
    transactions
        .iter()
        .fold((Money::zero(), Money::zero()), |(cash_in, cash_out), t| match t.kind {
            TransactionKind::CashIn => (cash_in + t.amount, cash_out),
            TransactionKind::CashOut => (cash_in, cash_out + t.amount),
        })
}

/// End-of-shift summary for a counted total.
pub fn summarize(
    opening: &OpeningBalances,
    transactions: &[RegisterTransaction],
    actual_balance: Money,
) -> RegisterSummary {
    let (cash_in, cash_out) = flows(transactions);
    let expected_balance = opening.total + cash_in - cash_out;

    RegisterSummary {
        cash_in,
        cash_out,
        net_position: cash_in - cash_out,
        by_method: method_balances(opening, transactions),
        expected_balance,
        actual_balance,
        discrepancy: discrepancy(actual_balance, expected_balance),
        transaction_count: transactions.len(),
    }
}

/// Entries created on the same local calendar day as `now`.
///
/// `offset` is the outlet's UTC offset. Read-side convenience for
/// dashboards; balances always use the full ledger.
pub fn todays_transactions<'a>(
    transactions: &'a [RegisterTransaction],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<&'a RegisterTransaction> {
    let today = now.with_timezone(&offset).date_naive();
    transactions
        .iter()
        .filter(|t| t.created_at.with_timezone(&offset).date_naive() == today)
        .collect()
}

fn opening_for_method(opening: &OpeningBalances, method: PaymentMethod) -> Money {
    match method {
        PaymentMethod::Cash => opening.cash,
        PaymentMethod::Upi => opening.upi,
        PaymentMethod::Debit => opening.card,
        PaymentMethod::Credit => Money::zero(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
