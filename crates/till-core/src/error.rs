//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Register state machine / audit failures        │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  till-service errors                                                   │
//! │  ├── ServiceError     - Core + Db + authorization                      │
//! │  └── ApiError         - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (register id, operator id, amounts)
//! 3. Every variant has a stable reason code via [`CoreError::reason_code`]

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Register engine errors.
///
/// These are rejections: a request that produced one of these changed no
/// state. A cash discrepancy at close is NOT an error and never appears here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No register with this id.
    #[error("Register not found: {0}")]
    RegisterNotFound(String),

    /// Close was requested but the operator has nothing open.
    #[error("Operator {operator_id} has no open register")]
    NoOpenRegister { operator_id: String },

    /// A second open for the same operator at the same outlet.
    ///
    /// ## When This Occurs
    /// ```text
    /// open(outlet A, operator 7) ──► OK, register R1 OPEN
    ///      │
    ///      ▼
    /// open(outlet A, operator 7) ──► RegisterAlreadyOpen
    ///      │
    ///      ▼
    /// UI shows: "Close your current register first"
    /// ```
    #[error("Operator {operator_id} already has an open register at outlet {outlet_id}")]
    RegisterAlreadyOpen {
        outlet_id: String,
        operator_id: String,
    },

    /// A write was attempted against a closed register.
    #[error("Register {register_id} is closed")]
    RegisterClosed { register_id: String },

    /// No ledger entry with this id.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Counted notes and coins do not add up to the declared cash.
    #[error("Denomination count {counted} does not match declared cash {declared}")]
    DenominationMismatch { counted: Money, declared: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Stable, machine-readable reason code for this rejection.
    pub fn reason_code(&self) -> &'static str {
        match self {
            CoreError::RegisterNotFound(_) => "REGISTER_NOT_FOUND",
            CoreError::NoOpenRegister { .. } => "NO_OPEN_REGISTER",
            CoreError::RegisterAlreadyOpen { .. } => "REGISTER_ALREADY_OPEN",
            CoreError::RegisterClosed { .. } => "REGISTER_CLOSED",
            CoreError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            CoreError::DenominationMismatch { .. } => "DENOMINATION_MISMATCH",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or more.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Amount above the largest value a register accepts.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: Money },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Fields that must agree with each other do not.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::DenominationMismatch {
            counted: Money::from_major(1030),
            declared: Money::from_major(1040),
        };
        assert_eq!(
            err.to_string(),
            "Denomination count ₹1030.00 does not match declared cash ₹1040.00"
        );

        let err = CoreError::RegisterClosed {
            register_id: "r-1".to_string(),
        };
        assert_eq!(err.to_string(), "Register r-1 is closed");
    }

    #[test]
    fn test_reason_codes() {
        let err = CoreError::RegisterAlreadyOpen {
            outlet_id: "o-1".to_string(),
            operator_id: "op-1".to_string(),
        };
        assert_eq!(err.reason_code(), "REGISTER_ALREADY_OPEN");

        let err = CoreError::NoOpenRegister {
            operator_id: "op-1".to_string(),
        };
        assert_eq!(err.reason_code(), "NO_OPEN_REGISTER");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.reason_code(), "VALIDATION_ERROR");
        assert_eq!(core_err.to_string(), "Validation error: amount must be positive");
    }
}
