use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Reported for files whose references have never been counted.
pub const REFERENCE_COUNT_UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    #[default]
    Idle,
    Scanning,
    Completed,
    Error,
}

/// Snapshot of the duplicate scan, safe to poll while a scan runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateStats {
    pub phase: ScanPhase,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub total_count: u64,
    pub scanned_count: u64,
    pub duplicate_group_count: u64,
    pub duplicate_file_count: u64,
    pub savable_size: u64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFile {
    pub attachment_name: String,
    pub display_name: String,
    pub media_type: Option<String>,
    pub permalink: Option<String>,
    pub upload_time: Option<DateTime<Utc>>,
    pub group_name: Option<String>,
    pub group_display_name: Option<String>,
    /// `-1` until references have been counted at least once.
    pub reference_count: i64,
    pub is_recommended: bool,
}

/// Byte-identical attachments sharing one content hash and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub file_size: u64,
    pub file_count: usize,
    pub savable_size: u64,
    pub recommended_keep: Option<String>,
    pub preview_url: Option<String>,
    pub media_type: Option<String>,
    pub files: Vec<DuplicateFile>,
}

impl DuplicateGroup {
    pub fn new(content_hash: String, file_size: u64, files: Vec<DuplicateFile>) -> Self {
        let mut group = Self {
            content_hash,
            file_size,
            file_count: 0,
            savable_size: 0,
            recommended_keep: None,
            preview_url: None,
            media_type: None,
            files,
        };
        group.refresh();
        group
    }

    /// Recompute every derived field from `files`.
    pub fn refresh(&mut self) {
        self.file_count = self.files.len();
        self.savable_size = self
            .file_size
            .saturating_mul(self.file_count.saturating_sub(1) as u64);

        self.recommended_keep = select_recommended_keep(&self.files);
        for file in &mut self.files {
            file.is_recommended = self.recommended_keep.as_deref() == Some(&file.attachment_name);
        }

        let preview = self.files.iter().find(|f| f.permalink.is_some());
        self.preview_url = preview.and_then(|f| f.permalink.clone());
        self.media_type = preview
            .or_else(|| self.files.first())
            .and_then(|f| f.media_type.clone());
    }

    pub fn contains(&self, attachment_name: &str) -> bool {
        self.files.iter().any(|f| f.attachment_name == attachment_name)
    }
}

/// Highest reference count wins, then earliest upload (unknown times last), then the smallest name.
pub fn select_recommended_keep(files: &[DuplicateFile]) -> Option<String> {
    files
        .iter()
        .min_by(|a, b| {
            b.reference_count
                .cmp(&a.reference_count)
                .then_with(|| compare_upload_time(a.upload_time, b.upload_time))
                .then_with(|| a.attachment_name.cmp(&b.attachment_name))
        })
        .map(|f| f.attachment_name.clone())
}

fn compare_upload_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupSort {
    #[default]
    SavableSize,
    FileSize,
    FileCount,
}

/// Optional narrowing and ordering for duplicate listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFilter {
    /// Prefix match against the group media type, e.g. `image/`.
    pub media_type: Option<String>,
    #[serde(default)]
    pub sort: GroupSort,
}

impl DuplicateFilter {
    pub fn matches(&self, group: &DuplicateGroup) -> bool {
        match self.media_type.as_deref() {
            None | Some("") => true,
            Some(prefix) => group
                .media_type
                .as_deref()
                .is_some_and(|media_type| media_type.starts_with(prefix)),
        }
    }

    /// Descending by the chosen key; ties fall back to the content hash so pages stay stable.
    pub fn compare(&self, a: &DuplicateGroup, b: &DuplicateGroup) -> Ordering {
        let primary = match self.sort {
            GroupSort::SavableSize => b.savable_size.cmp(&a.savable_size),
            GroupSort::FileSize => b.file_size.cmp(&a.file_size),
            GroupSort::FileCount => b.file_count.cmp(&a.file_count),
        };
        primary.then_with(|| a.content_hash.cmp(&b.content_hash))
    }
}
