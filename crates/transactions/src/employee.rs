use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult};

/// Who filed the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub name: String,
    pub department: String,
    pub position: String,
}

impl Employee {
    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("employee name", &self.name)?;
        DomainError::require_text("employee department", &self.department)?;
        DomainError::require_text("employee position", &self.position)?;
        Ok(())
    }
}

pub(crate) fn require_positive_quantity(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be greater than zero (got {quantity})"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_employee() -> Employee {
    Employee {
        name: "Budi".to_string(),
        department: "Finance".to_string(),
        position: "Staff".to_string(),
    }
}
