//! Paging for list queries.

use serde::{Deserialize, Serialize};

/// Page size used when the caller gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Hard cap on a single page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Limit/offset window over an insertion-ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// 1-based page number to a window: page < 1 reads page 1, limit < 1 uses `default_limit`.
    pub fn page(page: i64, limit: i64, default_limit: u32) -> Self {
        let page = page.max(1);
        let limit = if limit < 1 {
            default_limit.clamp(1, MAX_PAGE_SIZE)
        } else {
            u32::try_from(limit).unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)
        };
        let offset = (page - 1).saturating_mul(i64::from(limit));
        Self {
            limit,
            offset: u32::try_from(offset).unwrap_or(u32::MAX),
        }
    }

    /// Cut this window out of an in-memory slice.
    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}
