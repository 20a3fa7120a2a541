//! Optimistic concurrency primitives for mutable records.

/// A record whose every persisted update bumps a monotonically increasing version.
pub trait Versioned {
    /// Version of the state as it was last read from (or written to) the store.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a record update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (administrative overwrites, migrations).
    Any,
    /// Require the stored record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    /// Expectation that the stored record is still the one `record` was read from.
    pub fn of<V: Versioned>(record: &V) -> Self {
        ExpectedVersion::Exact(record.version())
    }
}
