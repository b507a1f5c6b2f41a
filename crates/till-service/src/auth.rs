//! Caller identity and the ownership rules applied before any state is touched.
//!
//! Authentication happens upstream; a `Caller` is already verified.

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// What the authenticated operator is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorRole {
    /// Front-of-house staff: own registers only.
    Staff,
    /// Outlet owner: own registers, plus read access to every operator.
    Owner,
    /// Administrative override: may act on any register.
    Admin,
}

/// A verified operator identity supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub operator_id: String,
    pub role: OperatorRole,
}

impl Caller {
    pub fn new(operator_id: impl Into<String>, role: OperatorRole) -> Self {
        Caller {
            operator_id: operator_id.into(),
            role,
        }
    }

    pub fn staff(operator_id: impl Into<String>) -> Self {
        Caller::new(operator_id, OperatorRole::Staff)
    }

    pub fn owner(operator_id: impl Into<String>) -> Self {
        Caller::new(operator_id, OperatorRole::Owner)
    }

    pub fn admin(operator_id: impl Into<String>) -> Self {
        Caller::new(operator_id, OperatorRole::Admin)
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == OperatorRole::Admin
    }

    /// Write access: the caller must be `operator_id`, unless admin.
    pub fn ensure_acts_as(&self, operator_id: &str) -> ServiceResult<()> {
        if self.is_admin() || self.operator_id == operator_id {
            return Ok(());
        }
        Err(ServiceError::unauthorized(format!(
            "operator {} cannot act as {}",
            self.operator_id, operator_id
        )))
    }

    /// Read access to one operator's status.
    pub fn ensure_can_view(&self, operator_id: &str) -> ServiceResult<()> {
        match self.role {
            OperatorRole::Admin | OperatorRole::Owner => Ok(()),
            OperatorRole::Staff if self.operator_id == operator_id => Ok(()),
            OperatorRole::Staff => Err(ServiceError::unauthorized(format!(
                "operator {} cannot view registers of {}",
                self.operator_id, operator_id
            ))),
        }
    }

    /// Outlet-wide reports (history, discrepancies).
    pub fn ensure_can_audit(&self) -> ServiceResult<()> {
        match self.role {
            OperatorRole::Admin | OperatorRole::Owner => Ok(()),
            OperatorRole::Staff => Err(ServiceError::unauthorized(format!(
                "operator {} cannot read outlet reports",
                self.operator_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acts_as() {
        assert!(Caller::staff("op-1").ensure_acts_as("op-1").is_ok());
        assert!(Caller::staff("op-1").ensure_acts_as("op-2").is_err());
        assert!(Caller::owner("owner").ensure_acts_as("op-2").is_err());
        assert!(Caller::admin("root").ensure_acts_as("op-2").is_ok());
    }

    #[test]
    fn test_view_and_audit() {
        assert!(Caller::staff("op-1").ensure_can_view("op-1").is_ok());
        assert!(Caller::staff("op-1").ensure_can_view("op-2").is_err());
        assert!(Caller::owner("owner").ensure_can_view("op-2").is_ok());

        assert!(Caller::staff("op-1").ensure_can_audit().is_err());
        assert!(Caller::owner("owner").ensure_can_audit().is_ok());
    }
}
