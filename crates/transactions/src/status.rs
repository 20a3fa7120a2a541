use core::str::FromStr;
use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Transaction status lifecycle, shared by all kinds.
///
/// Which transitions are legal depends on the kind; see [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Incomplete,
    Completed,
    Returned,
    Rejected,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::Approved,
        TransactionStatus::Incomplete,
        TransactionStatus::Completed,
        TransactionStatus::Returned,
        TransactionStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Incomplete => "incomplete",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Returned => "returned",
            TransactionStatus::Rejected => "rejected",
        }
    }

    /// Parse a requested target status coming from outside.
    ///
    /// Unrecognized strings are an illegal transition out of `from`.
    pub fn parse_target(raw: &str, from: TransactionStatus) -> Result<Self, DomainError> {
        raw.parse()
            .map_err(|_| DomainError::illegal_transition(from.as_str(), raw.trim()))
    }
}

impl core::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| DomainError::validation(format!("unknown status '{}'", s.trim())))
    }
}
