//! Storage usage broken down by media type, storage policy and attachment group.

use crate::error::Error;
use crate::model::{CategoryStats, StatisticsData, TotalStats};
use crate::storage::ObjectStore;
use ahash::AHashMap;
use std::sync::Arc;
use tracing::debug;

const UNGROUPED_KEY: &str = "_ungrouped";

/// Coarse media category used by the type breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl MediaCategory {
    /// Breakdown order.
    pub const ALL: [MediaCategory; 5] = [
        MediaCategory::Image,
        MediaCategory::Video,
        MediaCategory::Audio,
        MediaCategory::Document,
        MediaCategory::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Document => "document",
            MediaCategory::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaCategory::Image => "图片",
            MediaCategory::Video => "视频",
            MediaCategory::Audio => "音频",
            MediaCategory::Document => "文档",
            MediaCategory::Other => "其他",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            MediaCategory::Other => "file",
            other => other.key(),
        }
    }
}

pub fn classify_media_type(media_type: Option<&str>) -> MediaCategory {
    let Some(media_type) = media_type.map(str::trim).filter(|m| !m.is_empty()) else {
        return MediaCategory::Other;
    };

    if media_type.starts_with("image/") {
        MediaCategory::Image
    } else if media_type.starts_with("video/") {
        MediaCategory::Video
    } else if media_type.starts_with("audio/") {
        MediaCategory::Audio
    } else if is_document(media_type) {
        MediaCategory::Document
    } else {
        MediaCategory::Other
    }
}

fn is_document(media_type: &str) -> bool {
    media_type == "application/pdf"
        || media_type.starts_with("application/msword")
        || media_type.starts_with("application/vnd.openxmlformats-officedocument")
        || media_type.starts_with("application/vnd.ms-")
        || media_type.starts_with("text/")
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    count: u64,
    size: u64,
}

impl Tally {
    fn add(&mut self, size: u64) {
        self.count += 1;
        self.size += size;
    }
}

fn tally_total<'a>(tallies: impl Iterator<Item = &'a Tally>) -> u64 {
    tallies.map(|t| t.size).sum()
}

/// `part` as a percentage of `total`, two decimals. Zero when `total` is zero.
pub fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10000.0).round() / 100.0
}

fn bucket(key: String, name: String, icon: &str, tally: Tally, dimension_total: u64) -> CategoryStats {
    CategoryStats {
        key,
        name,
        icon: icon.to_string(),
        count: tally.count,
        size: tally.size,
        percent: percent_of(tally.size, dimension_total),
    }
}

/// Recomputes storage statistics from the object store on every call.
pub struct StatisticsAggregator {
    store: Arc<dyn ObjectStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn compute_statistics(&self) -> Result<StatisticsData, Error> {
        let policies = self.store.list_policies().map_err(Error::into_unavailable)?;
        let groups = self.store.list_groups().map_err(Error::into_unavailable)?;
        let mut objects = self.store.list_objects().map_err(Error::into_unavailable)?;
        objects.sort_by(|a, b| a.name.cmp(&b.name));

        let mut by_type: AHashMap<MediaCategory, Tally> = AHashMap::new();
        let mut by_policy: AHashMap<&str, Tally> = AHashMap::new();
        let mut by_group: AHashMap<&str, Tally> = AHashMap::new();
        let mut total_size = 0u64;

        for object in &objects {
            let size = object.size.unwrap_or(0);
            total_size += size;

            by_type
                .entry(classify_media_type(object.media_type.as_deref()))
                .or_default()
                .add(size);

            if let Some(policy) = non_blank(&object.policy_name)
                .filter(|p| policies.iter().any(|known| known.name == *p))
            {
                by_policy.entry(policy).or_default().add(size);
            }

            let group = non_blank(&object.group_name)
                .filter(|g| groups.iter().any(|known| known.name == *g))
                .unwrap_or(UNGROUPED_KEY);
            by_group.entry(group).or_default().add(size);
        }

        let type_total = tally_total(by_type.values());
        let by_type_stats = MediaCategory::ALL
            .iter()
            .map(|category| {
                let tally = by_type.get(category).copied().unwrap_or_default();
                bucket(
                    category.key().to_string(),
                    category.label().to_string(),
                    category.icon(),
                    tally,
                    type_total,
                )
            })
            .collect();

        let policy_total = tally_total(by_policy.values());
        let mut sorted_policies: Vec<_> = policies.iter().collect();
        sorted_policies.sort_by(|a, b| a.name.cmp(&b.name));
        let mut by_policy_stats: Vec<CategoryStats> = sorted_policies
            .into_iter()
            .map(|policy| {
                let tally = by_policy.get(policy.name.as_str()).copied().unwrap_or_default();
                bucket(
                    format!("policy-{}", policy.name),
                    policy.display_name.clone(),
                    "storage",
                    tally,
                    policy_total,
                )
            })
            .collect();
        by_policy_stats.sort_by(|a, b| b.size.cmp(&a.size));

        let group_total = tally_total(by_group.values());
        let mut sorted_groups: Vec<_> = groups.iter().collect();
        sorted_groups.sort_by(|a, b| a.name.cmp(&b.name));
        let ungrouped = by_group.get(UNGROUPED_KEY).copied().unwrap_or_default();
        let mut by_group_stats = vec![bucket(
            format!("group-{}", UNGROUPED_KEY),
            "未分组".to_string(),
            "folder",
            ungrouped,
            group_total,
        )];
        by_group_stats.extend(sorted_groups.into_iter().map(|group| {
            let tally = by_group.get(group.name.as_str()).copied().unwrap_or_default();
            bucket(
                format!("group-{}", group.name),
                group.display_name.clone(),
                "folder",
                tally,
                group_total,
            )
        }));
        by_group_stats.sort_by(|a, b| b.size.cmp(&a.size));

        debug!(
            "Computed statistics for {} attachments ({} bytes)",
            objects.len(),
            total_size
        );

        Ok(StatisticsData {
            total: TotalStats {
                attachment_count: objects.len() as u64,
                total_size,
                policy_count: policies.len(),
                group_count: groups.len(),
            },
            by_type: by_type_stats,
            by_policy: by_policy_stats,
            by_group: by_group_stats,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
