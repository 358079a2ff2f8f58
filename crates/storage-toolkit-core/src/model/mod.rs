//! Result shapes served to the console UI.

pub mod duplicate;
pub mod statistics;

pub use duplicate::{DuplicateFile, DuplicateFilter, DuplicateGroup, DuplicateStats, GroupSort, ScanPhase};
pub use statistics::{CategoryStats, StatisticsData, TotalStats};

use serde::{Deserialize, Serialize};

/// One page of a larger result set. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: usize,
    pub size: usize,
    pub total: usize,
    pub items: Vec<T>,
}

impl<T: Clone> ListResult<T> {
    /// Cut page `page` of capacity `size` out of `all`. Pages past the end are empty.
    pub fn from_slice(all: &[T], page: usize, size: usize) -> Self {
        let total = all.len();
        let start = page.saturating_sub(1).saturating_mul(size);
        let items = if start < total {
            let end = start.saturating_add(size).min(total);
            all[start..end].to_vec()
        } else {
            Vec::new()
        };
        Self {
            page,
            size,
            total,
            items,
        }
    }
}
