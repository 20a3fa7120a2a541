//! Transaction kinds and the flat, kind-prefixed external identifier.

use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use stockroom_core::{DomainError, TransactionId};

/// Discriminator of the three transaction collections.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Loan,
    Inquiry,
    Insertion,
}

impl TransactionKind {
    /// Listing/export order.
    pub const ALL: [TransactionKind; 3] = [
        TransactionKind::Loan,
        TransactionKind::Inquiry,
        TransactionKind::Insertion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Loan => "loan",
            TransactionKind::Inquiry => "inquiry",
            TransactionKind::Insertion => "insertion",
        }
    }

    /// Prefix used in the external identifier (`insert_`, not `insertion_`).
    pub fn prefix(&self) -> &'static str {
        match self {
            TransactionKind::Loan => "loan",
            TransactionKind::Inquiry => "inquiry",
            TransactionKind::Insertion => "insert",
        }
    }

    /// Tag written in the `kind` column of export rows.
    pub fn export_tag(&self) -> &'static str {
        match self {
            TransactionKind::Loan => "LoanTransaction",
            TransactionKind::Inquiry => "InquiryTransaction",
            TransactionKind::Insertion => "InsertionTransaction",
        }
    }

    pub fn from_prefix(prefix: &str) -> Result<Self, DomainError> {
        match prefix {
            "loan" => Ok(TransactionKind::Loan),
            "inquiry" => Ok(TransactionKind::Inquiry),
            "insert" => Ok(TransactionKind::Insertion),
            other => Err(DomainError::invalid_kind(other)),
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loan" => Ok(TransactionKind::Loan),
            "inquiry" => Ok(TransactionKind::Inquiry),
            "insertion" | "insert" => Ok(TransactionKind::Insertion),
            other => Err(DomainError::invalid_kind(other)),
        }
    }
}

/// `(kind, id)` pair addressing one transaction across all three collections.
///
/// Serialized only at the boundary, as `"<prefix>_<uuid>"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionRef {
    pub kind: TransactionKind,
    pub id: TransactionId,
}

impl TransactionRef {
    pub fn new(kind: TransactionKind, id: TransactionId) -> Self {
        Self { kind, id }
    }
}

impl core::fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.id)
    }
}

impl FromStr for TransactionRef {
    type Err = DomainError;

    /// Unknown or missing prefix is `InvalidTransactionKind`; a bad UUID is `InvalidId`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s.split_once('_').unwrap_or((s, ""));
        let kind = TransactionKind::from_prefix(prefix)?;
        let id = rest.parse::<TransactionId>()?;
        Ok(Self { kind, id })
    }
}

impl Serialize for TransactionRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
