//! # Service and API Errors
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the register engine                    │
//! │                                                                         │
//! │  Component (session / ledger / status)                                 │
//! │  ServiceResult<T>                                                       │
//! │       │                                                                 │
//! │       ├── ValidationError ──► CoreError::Validation ──┐                │
//! │       ├── CoreError (state machine, audit) ───────────┤                │
//! │       ├── DbError (storage) ──────────────────────────┤                │
//! │       ├── OutletNotFound / Unauthorized ──────────────┤                │
//! │       │                                               ▼                │
//! │       │                                        ServiceError            │
//! │       ▼                                               │                │
//! │  TillService (facade) ─────────────────────────────── ▼                │
//! │                                                   ApiError             │
//! │                                           { code, message }            │
//! │                                                                         │
//! │  Storage details never reach ApiError; they are logged instead.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use till_core::{CoreError, ValidationError};
use till_db::DbError;

// =============================================================================
// Service Error
// =============================================================================

/// Errors raised inside till-service components.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Register rule or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure with no domain meaning.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The outlet directory does not know this outlet.
    #[error("Outlet not found: {0}")]
    OutletNotFound(String),

    /// The caller may not act on this operator's registers.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

impl ServiceError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ServiceError::Unauthorized(message.into())
    }

    /// The reason code callers will see.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Core(err) => match err {
                CoreError::RegisterNotFound(_) => ErrorCode::RegisterNotFound,
                CoreError::NoOpenRegister { .. } => ErrorCode::NoOpenRegister,
                CoreError::RegisterAlreadyOpen { .. } => ErrorCode::RegisterAlreadyOpen,
                CoreError::RegisterClosed { .. } => ErrorCode::RegisterClosed,
                CoreError::TransactionNotFound(_) => ErrorCode::TransactionNotFound,
                CoreError::DenominationMismatch { .. } => ErrorCode::DenominationMismatch,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            ServiceError::Db(_) => ErrorCode::Internal,
            ServiceError::OutletNotFound(_) => ErrorCode::OutletNotFound,
            ServiceError::Unauthorized(_) => ErrorCode::Unauthorized,
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// API Error
// =============================================================================

/// Error returned from every `TillService` operation.
///
/// ## Serialization
/// ```json
/// {
///   "code": "REGISTER_ALREADY_OPEN",
///   "message": "Operator op-7 already has an open register at outlet outlet-1"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable reason code
    pub code: ErrorCode,

    /// Human-readable message, safe to display
    pub message: String,
}

/// Reason codes for rejected operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed input (400)
    ValidationError,

    /// Counted notes do not add up to the declared cash (400)
    DenominationMismatch,

    /// Operator already has an open register at the outlet (409)
    RegisterAlreadyOpen,

    /// Write attempted on a closed register (409)
    RegisterClosed,

    /// Close requested with nothing open (404)
    NoOpenRegister,

    RegisterNotFound,

    TransactionNotFound,

    OutletNotFound,

    /// Caller identity does not match the operator (403)
    Unauthorized,

    /// Storage or other unexpected failure (500)
    Internal,
}

impl ErrorCode {
    /// The wire form, e.g. `"REGISTER_CLOSED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::DenominationMismatch => "DENOMINATION_MISMATCH",
            ErrorCode::RegisterAlreadyOpen => "REGISTER_ALREADY_OPEN",
            ErrorCode::RegisterClosed => "REGISTER_CLOSED",
            ErrorCode::NoOpenRegister => "NO_OPEN_REGISTER",
            ErrorCode::RegisterNotFound => "REGISTER_NOT_FOUND",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::OutletNotFound => "OUTLET_NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates an internal error with a generic message.
    pub fn internal() -> Self {
        ApiError::new(ErrorCode::Internal, "The register service failed to complete the request")
    }
}

/// Converts service errors to API errors.
///
/// Storage errors are logged here and replaced with a generic message.
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Register storage operation failed");
                ApiError::internal()
            }
            other => ApiError::new(other.code(), other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ServiceError::from(err).into()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::Money;

    #[test]
    fn test_core_errors_keep_reason_codes() {
        let cases: Vec<CoreError> = vec![
            CoreError::RegisterNotFound("r".into()),
            CoreError::NoOpenRegister { operator_id: "op".into() },
            CoreError::RegisterAlreadyOpen {
                outlet_id: "o".into(),
                operator_id: "op".into(),
            },
            CoreError::RegisterClosed { register_id: "r".into() },
            CoreError::TransactionNotFound("t".into()),
            CoreError::DenominationMismatch {
                counted: Money::from_major(1030),
                declared: Money::from_major(1040),
            },
            ValidationError::Required { field: "x".into() }.into(),
        ];

        for err in cases {
            let reason = err.reason_code();
            let api = ApiError::from(err);
            assert_eq!(api.code.as_str(), reason);
        }
    }

    #[test]
    fn test_storage_errors_are_hidden() {
        let api = ApiError::from(ServiceError::Db(DbError::QueryFailed(
            "no such table: registers".to_string(),
        )));
        assert_eq!(api.code, ErrorCode::Internal);
        assert!(!api.message.contains("registers"));
    }

    #[test]
    fn test_serialization() {
        let api = ApiError::new(ErrorCode::RegisterClosed, "Register r-1 is closed");
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "REGISTER_CLOSED");
        assert_eq!(json["message"], "Register r-1 is closed");
        assert_eq!(api.to_string(), "[REGISTER_CLOSED] Register r-1 is closed");
    }
}
