use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalStats {
    pub attachment_count: u64,
    pub total_size: u64,
    pub policy_count: usize,
    pub group_count: usize,
}

/// One bucket of a statistics breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    /// Unique within its breakdown.
    pub key: String,
    pub name: String,
    pub icon: String,
    pub count: u64,
    pub size: u64,
    /// Share of the breakdown's total size, 0-100 with two decimals.
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsData {
    pub total: TotalStats,
    pub by_type: Vec<CategoryStats>,
    pub by_policy: Vec<CategoryStats>,
    pub by_group: Vec<CategoryStats>,
}
