use core::str::FromStr;
use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// What happens to children when their parent row is deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete the children too.
    Cascade,
    /// Keep the children and clear their parent reference.
    SetNull,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::Cascade => "cascade",
            DeletePolicy::SetNull => "set_null",
        }
    }
}

impl core::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(DeletePolicy::Cascade),
            "set_null" | "setnull" | "set-null" => Ok(DeletePolicy::SetNull),
            other => Err(DomainError::validation(format!(
                "unknown delete policy '{other}' (expected cascade or set_null)"
            ))),
        }
    }
}

/// Deletion policy for each parent/child relationship in the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPolicy {
    /// Storage -> categories.
    pub storage_categories: DeletePolicy,
    /// Category -> items.
    pub category_items: DeletePolicy,
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        Self {
            storage_categories: DeletePolicy::Cascade,
            category_items: DeletePolicy::SetNull,
        }
    }
}
