//! # Denomination Audit
//!
//! Counting the drawer note by note at open and at close.
//!
//! ## Audit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operator counts drawer                                                │
//! │    ₹500 × 2, ₹20 × 2  ──► DenominationCount                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DenominationAuditor::validate(count, declared cash) ← THIS MODULE     │
//! │       │                                                                 │
//! │       ├── negative count?          → ValidationError                   │
//! │       ├── retired denomination?    → ValidationError::NotAllowed       │
//! │       ├── Σ count × face ≠ declared → CoreError::DenominationMismatch  │
//! │       │                                                                 │
//! │       └── OK → open / close proceeds                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike the close-time discrepancy, which is only recorded, a failed audit
//! rejects the request.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Denomination
// =============================================================================

/// A note or coin face value in circulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Denomination {
    Note2000,
    Note500,
    Note200,
    Note100,
    Note50,
    Note20,
    Note10,
    Coin5,
    Coin2,
    Coin1,
}

impl Denomination {
    /// Every denomination, largest first.
    pub const ALL: [Denomination; 10] = [
        Denomination::Note2000,
        Denomination::Note500,
        Denomination::Note200,
        Denomination::Note100,
        Denomination::Note50,
        Denomination::Note20,
        Denomination::Note10,
        Denomination::Coin5,
        Denomination::Coin2,
        Denomination::Coin1,
    ];

    /// Face value in whole rupees.
    pub const fn face_major(self) -> i64 {
        match self {
            Denomination::Note2000 => 2000,
            Denomination::Note500 => 500,
            Denomination::Note200 => 200,
            Denomination::Note100 => 100,
            Denomination::Note50 => 50,
            Denomination::Note20 => 20,
            Denomination::Note10 => 10,
            Denomination::Coin5 => 5,
            Denomination::Coin2 => 2,
            Denomination::Coin1 => 1,
        }
    }

    #[inline]
    pub const fn face_value(self) -> Money {
        Money::from_major(self.face_major())
    }

    /// Looks up a denomination by its face value in rupees.
    pub fn from_face_major(major: i64) -> Option<Denomination> {
        Denomination::ALL.into_iter().find(|d| d.face_major() == major)
    }

    /// Field name used in payloads and error messages.
    pub const fn field_name(self) -> &'static str {
        match self {
            Denomination::Note2000 => "note_2000",
            Denomination::Note500 => "note_500",
            Denomination::Note200 => "note_200",
            Denomination::Note100 => "note_100",
            Denomination::Note50 => "note_50",
            Denomination::Note20 => "note_20",
            Denomination::Note10 => "note_10",
            Denomination::Coin5 => "coin_5",
            Denomination::Coin2 => "coin_2",
            Denomination::Coin1 => "coin_1",
        }
    }
}

// =============================================================================
// Denomination Count
// =============================================================================

/// Physical count of the drawer, one field per face value.
///
/// Missing fields deserialize as zero, so `{}` is a valid empty drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct DenominationCount {
    pub note_2000: i64,
    pub note_500: i64,
    pub note_200: i64,
    pub note_100: i64,
    pub note_50: i64,
    pub note_20: i64,
    pub note_10: i64,
    pub coin_5: i64,
    pub coin_2: i64,
    pub coin_1: i64,
}

impl DenominationCount {
    /// An empty drawer.
    pub fn empty() -> Self {
        DenominationCount::default()
    }

    /// Count for one denomination.
    pub fn get(&self, denomination: Denomination) -> i64 {
        match denomination {
            Denomination::Note2000 => self.note_2000,
            Denomination::Note500 => self.note_500,
            Denomination::Note200 => self.note_200,
            Denomination::Note100 => self.note_100,
            Denomination::Note50 => self.note_50,
            Denomination::Note20 => self.note_20,
            Denomination::Note10 => self.note_10,
            Denomination::Coin5 => self.coin_5,
            Denomination::Coin2 => self.coin_2,
            Denomination::Coin1 => self.coin_1,
        }
    }

    /// Builder-style setter.
    ///
    /// ```rust
    /// use till_core::denomination::{Denomination, DenominationCount};
    ///
    /// let count = DenominationCount::empty()
    ///     .with(Denomination::Note500, 1)
    ///     .with(Denomination::Note100, 1);
    /// assert_eq!(count.total().unwrap().major(), 600);
    /// ```
    pub fn with(mut self, denomination: Denomination, count: i64) -> Self {
        let slot = match denomination {
            Denomination::Note2000 => &mut self.note_2000,
            Denomination::Note500 => &mut self.note_500,
            Denomination::Note200 => &mut self.note_200,
            Denomination::Note100 => &mut self.note_100,
            Denomination::Note50 => &mut self.note_50,
            Denomination::Note20 => &mut self.note_20,
            Denomination::Note10 => &mut self.note_10,
            Denomination::Coin5 => &mut self.coin_5,
            Denomination::Coin2 => &mut self.coin_2,
            Denomination::Coin1 => &mut self.coin_1,
        };
        *slot = count;
        self
    }

    /// Non-zero slots, largest face value first.
    pub fn entries(&self) -> impl Iterator<Item = (Denomination, i64)> + '_ {
        Denomination::ALL
            .into_iter()
            .map(move |d| (d, self.get(d)))
            .filter(|(_, count)| *count != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Weighted sum `Σ count × face value`. `None` on overflow.
    pub fn total(&self) -> Option<Money> {
        self.entries().try_fold(Money::zero(), |acc, (d, count)| {
            d.face_value().checked_times(count).and_then(|v| acc.checked_add(v))
        })
    }
}

// =============================================================================
// Denomination Set
// =============================================================================

/// The denominations an outlet accepts in a drawer count.
///
/// Defaults to every denomination; retired notes can be removed through
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominationSet {
    accepted: Vec<Denomination>,
}

impl DenominationSet {
    /// Every denomination in circulation.
    pub fn standard() -> Self {
        DenominationSet {
            accepted: Denomination::ALL.to_vec(),
        }
    }

    /// Returns the set without the given denomination.
    pub fn without(mut self, retired: Denomination) -> Self {
        self.accepted.retain(|d| *d != retired);
        self
    }

    pub fn accepts(&self, denomination: Denomination) -> bool {
        self.accepted.contains(&denomination)
    }

    pub fn accepted(&self) -> &[Denomination] {
        &self.accepted
    }
}

impl Default for DenominationSet {
    fn default() -> Self {
        DenominationSet::standard()
    }
}

// =============================================================================
// Auditor
// =============================================================================

/// Validates drawer counts against declared cash amounts.
#[derive(Debug, Clone, Default)]
pub struct DenominationAuditor {
    set: DenominationSet,
}

impl DenominationAuditor {
    pub fn new(set: DenominationSet) -> Self {
        DenominationAuditor { set }
    }

    pub fn denomination_set(&self) -> &DenominationSet {
        &self.set
    }

    /// Checks that `denominations` adds up to exactly `declared_cash`.
    ///
    /// ## Rules
    /// - every count is zero or more
    /// - only accepted denominations may have a non-zero count
    /// - the weighted sum equals the declared amount (zero with an empty
    ///   count is accepted)
    ///
    /// ## Example
    /// ```rust
    /// use till_core::denomination::{Denomination, DenominationAuditor, DenominationCount};
    /// use till_core::Money;
    ///
    /// let auditor = DenominationAuditor::default();
    /// let count = DenominationCount::empty().with(Denomination::Note500, 2);
    ///
    /// assert!(auditor.validate(&count, Money::from_major(1000)).is_ok());
    /// assert!(auditor.validate(&count, Money::from_major(900)).is_err());
    /// ```
    pub fn validate(&self, denominations: &DenominationCount, declared_cash: Money) -> CoreResult<()> {
        for denomination in Denomination::ALL {
            let count = denominations.get(denomination);

            if count < 0 {
                return Err(ValidationError::MustNotBeNegative {
                    field: format!("denominations.{}", denomination.field_name()),
                }
                .into());
            }

            if count > 0 && !self.set.accepts(denomination) {
                return Err(ValidationError::NotAllowed {
                    field: "denominations".to_string(),
                    allowed: self
                        .set
                        .accepted()
                        .iter()
                        .map(|d| d.field_name().to_string())
                        .collect(),
                }
                .into());
            }
        }

        let counted = denominations.total().ok_or_else(|| ValidationError::InvalidFormat {
            field: "denominations".to_string(),
            reason: "count is too large".to_string(),
        })?;

        if counted != declared_cash {
            return Err(CoreError::DenominationMismatch {
                counted,
                declared: declared_cash,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
