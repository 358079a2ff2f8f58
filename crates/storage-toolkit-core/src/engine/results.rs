use crate::model::{DuplicateFilter, DuplicateGroup, DuplicateStats, ListResult};

/// Duplicate groups from the last completed scan, kept in default listing order.
#[derive(Debug, Clone, Default)]
pub(crate) struct DuplicateResults {
    groups: Vec<DuplicateGroup>,
}

impl DuplicateResults {
    pub fn new(mut groups: Vec<DuplicateGroup>) -> Self {
        groups.retain(|g| g.file_count > 1);
        let order = DuplicateFilter::default();
        groups.sort_by(|a, b| order.compare(a, b));
        Self { groups }
    }

    pub fn group_count(&self) -> u64 {
        self.groups.len() as u64
    }

    pub fn file_count(&self) -> u64 {
        self.groups.iter().map(|g| g.file_count as u64).sum()
    }

    pub fn savable_size(&self) -> u64 {
        self.groups.iter().map(|g| g.savable_size).sum()
    }

    /// Copy the duplicate totals into a stats snapshot.
    pub fn apply_totals(&self, stats: &mut DuplicateStats) {
        stats.duplicate_group_count = self.group_count();
        stats.duplicate_file_count = self.file_count();
        stats.savable_size = self.savable_size();
    }

    pub fn page(&self, page: usize, size: usize, filter: &DuplicateFilter) -> ListResult<DuplicateGroup> {
        let mut selected: Vec<&DuplicateGroup> =
            self.groups.iter().filter(|g| filter.matches(g)).collect();
        selected.sort_by(|a, b| filter.compare(a, b));

        let result = ListResult::from_slice(&selected, page, size);
        ListResult {
            page: result.page,
            size: result.size,
            total: result.total,
            items: result.items.into_iter().cloned().collect(),
        }
    }

    pub fn contains(&self, attachment_name: &str) -> bool {
        self.groups.iter().any(|g| g.contains(attachment_name))
    }

    /// Remove one file from its group, re-deriving the group. Groups left with one member
    /// are dropped. Returns the updated group, or `None` if it was dropped or the name is unknown.
    pub fn remove_file(&mut self, attachment_name: &str) -> Option<DuplicateGroup> {
        let index = self.groups.iter().position(|g| g.contains(attachment_name))?;
        let group = &mut self.groups[index];
        group.files.retain(|f| f.attachment_name != attachment_name);
        group.refresh();

        if group.file_count <= 1 {
            self.groups.remove(index);
            return None;
        }

        let updated = group.clone();
        let order = DuplicateFilter::default();
        self.groups.sort_by(|a, b| order.compare(a, b));
        Some(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DuplicateFile, GroupSort};

    fn file(name: &str, media_type: &str) -> DuplicateFile {
        DuplicateFile {
            attachment_name: name.to_string(),
            display_name: name.to_string(),
            media_type: Some(media_type.to_string()),
            permalink: None,
            upload_time: None,
            group_name: None,
            group_display_name: None,
            reference_count: -1,
            is_recommended: false,
        }
    }

    fn group(hash: &str, size: u64, names: &[&str], media_type: &str) -> DuplicateGroup {
        DuplicateGroup::new(
            hash.to_string(),
            size,
            names.iter().map(|n| file(n, media_type)).collect(),
        )
    }

    fn sample() -> DuplicateResults {
        DuplicateResults::new(vec![
            group("h1", 100, &["a1", "a2"], "image/png"),
            group("h2", 50, &["b1", "b2", "b3", "b4"], "video/mp4"),
            group("h3", 500, &["c1", "c2"], "image/jpeg"),
        ])
    }

    #[test]
    fn test_default_order_is_savable_size_descending() {
        let results = sample();
        let page = results.page(1, 10, &DuplicateFilter::default());
        let hashes: Vec<&str> = page.items.iter().map(|g| g.content_hash.as_str()).collect();
        assert_eq!(hashes, vec!["h3", "h2", "h1"]);
        assert_eq!(results.savable_size(), 400 + 150 + 100);
        assert_eq!(results.file_count(), 8);
    }

    #[test]
    fn test_filter_by_media_type_and_sort() {
        let results = sample();
        let filter = DuplicateFilter {
            media_type: Some("image/".to_string()),
            sort: GroupSort::FileSize,
        };
        let page = results.page(1, 10, &filter);
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].content_hash, "h3");

        let by_count = DuplicateFilter {
            media_type: None,
            sort: GroupSort::FileCount,
        };
        assert_eq!(results.page(1, 1, &by_count).items[0].content_hash, "h2");
    }

    #[test]
    fn test_pagination_lengths() {
        let results = sample();
        let filter = DuplicateFilter::default();
        assert_eq!(results.page(1, 2, &filter).items.len(), 2);
        assert_eq!(results.page(2, 2, &filter).items.len(), 1);
        assert_eq!(results.page(3, 2, &filter).items.len(), 0);
        assert_eq!(results.page(3, 2, &filter).total, 3);
    }

    #[test]
    fn test_removing_from_pair_drops_group() {
        let mut results = sample();
        assert!(results.remove_file("a1").is_none());
        assert_eq!(results.group_count(), 2);
        assert!(!results.contains("a2"));
    }

    #[test]
    fn test_removing_from_larger_group_rederives() {
        let mut results = sample();
        let updated = results.remove_file("b1").unwrap();
        assert_eq!(updated.file_count, 3);
        assert_eq!(updated.savable_size, 100);
        assert_eq!(updated.recommended_keep.as_deref(), Some("b2"));
        assert!(updated.files.iter().any(|f| f.is_recommended && f.attachment_name == "b2"));
    }

    #[test]
    fn test_remove_unknown_name() {
        let mut results = sample();
        assert!(results.remove_file("zzz").is_none());
        assert_eq!(results.group_count(), 3);
    }
}
