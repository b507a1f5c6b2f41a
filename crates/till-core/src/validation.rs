//! # Validation Module
//!
//! Input validation for register requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request shape (serde)                                        │
//! │  └── Enum values, missing fields                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Amount signs, opening split, text lengths, id formats             │
//! │  └── Runs before any read or write                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (amount_cents > 0)                                          │
//! │  ├── UNIQUE open register per operator and outlet                      │
//! │  └── Triggers: closed registers and ledger rows are immutable          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_amount_positive, validate_description};
//! use till_core::Money;
//!
//! validate_amount_positive(Money::from_major(500)).unwrap();
//! validate_description("Vegetable purchase").unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CloseRegister, OpenRegister, OpeningBalances, RecordTransaction};
use crate::{MAX_AMOUNT, MAX_DESCRIPTION_LENGTH, MAX_ID_LENGTH, MAX_NOTES_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a ledger amount.
///
/// ## Rules
/// - Must be positive (> 0); direction comes from the transaction kind
/// - At most [`MAX_AMOUNT`]
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_amount_positive;
/// use till_core::Money;
///
/// assert!(validate_amount_positive(Money::from_minor(1)).is_ok());
/// assert!(validate_amount_positive(Money::zero()).is_err());
/// assert!(validate_amount_positive(Money::from_major(-50)).is_err());
/// ```
pub fn validate_amount_positive(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    validate_at_most_max("amount", amount)
}

/// Validates that a balance is zero or more, and at most [`MAX_AMOUNT`].
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    validate_at_most_max(field, amount)
}

fn validate_at_most_max(field: &str, amount: Money) -> ValidationResult<()> {
    if amount > MAX_AMOUNT {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

/// Validates the opening float and its split.
///
/// ## Rules
/// - total and every bucket are zero or more
/// - `cash + upi + card == total`
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Open Register                                                          │
/// │                                                                         │
/// │  Operator enters: total 1000, cash 600, upi 200, card 200              │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_opening_balances ← THIS FUNCTION                             │
/// │       │                                                                 │
/// │       ├── any negative?      → MustNotBeNegative                       │
/// │       ├── 600+200+200 ≠ 1000? → Inconsistent                           │
/// │       │                                                                 │
/// │       └── OK → count the cash drawer                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_opening_balances(opening: &OpeningBalances) -> ValidationResult<()> {
    validate_non_negative("opening_balance", opening.total)?;
    validate_non_negative("opening_by_method.cash", opening.cash)?;
    validate_non_negative("opening_by_method.upi", opening.upi)?;
    validate_non_negative("opening_by_method.card", opening.card)?;

    let split = opening
        .cash
        .checked_add(opening.upi)
        .and_then(|sum| sum.checked_add(opening.card));

    if split != Some(opening.total) {
        return Err(ValidationError::Inconsistent {
            field: "opening_by_method".to_string(),
            reason: format!(
                "cash {} + upi {} + card {} must equal opening balance {}",
                opening.cash, opening.upi, opening.card, opening.total
            ),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a free-text ledger description.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_DESCRIPTION_LENGTH`] characters
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LENGTH,
        });
    }

    Ok(())
}

/// Validates optional operator notes and normalizes blank notes to `None`.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LENGTH,
        });
    }

    Ok(Some(notes.to_string()))
}

/// Validates an outlet, operator or reference id.
///
/// Ids come from other systems, so only presence and length are checked.
pub fn validate_required_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.chars().count() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// Register and transaction ids are generated here as UUID v4, so anything
/// else cannot exist.
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_uuid;
///
/// assert!(validate_uuid("register_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("register_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Shape checks for an open request. The denomination audit runs separately.
pub fn validate_open_request(request: &OpenRegister) -> ValidationResult<()> {
    validate_required_id("outlet_id", &request.outlet_id)?;
    validate_required_id("operator_id", &request.operator_id)?;
    validate_opening_balances(&request.opening_balances())?;
    validate_notes(request.notes.as_deref())?;
    Ok(())
}

/// Shape checks for a ledger entry.
pub fn validate_record_request(request: &RecordTransaction) -> ValidationResult<()> {
    validate_uuid("register_id", &request.register_id)?;
    validate_amount_positive(request.amount)?;
    validate_description(&request.description)?;
    validate_required_id("performed_by", &request.performed_by)?;
    if let Some(reference) = &request.reference_id {
        validate_required_id("reference_id", reference)?;
    }
    Ok(())
}

/// Shape checks for a close request.
pub fn validate_close_request(request: &CloseRegister) -> ValidationResult<()> {
    validate_required_id("operator_id", &request.operator_id)?;
    if let Some(outlet_id) = &request.outlet_id {
        validate_required_id("outlet_id", outlet_id)?;
    }
    validate_non_negative("actual_balance", request.actual_balance)?;
    validate_notes(request.notes.as_deref())?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
