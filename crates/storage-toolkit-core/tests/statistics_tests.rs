use std::sync::Arc;

use storage_toolkit_core::storage::{AttachmentGroup, StoragePolicy, StoredObject};
use storage_toolkit_core::{Error, MemoryStore, ObjectStore, StatisticsAggregator};

fn object(name: &str, media_type: &str, size: u64, policy: &str, group: Option<&str>) -> StoredObject {
    StoredObject {
        name: name.to_string(),
        display_name: name.to_string(),
        media_type: Some(media_type.to_string()),
        size: Some(size),
        policy_name: Some(policy.to_string()),
        group_name: group.map(str::to_string),
        upload_time: None,
        permalink: None,
    }
}

fn populated_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_policy(StoragePolicy {
        name: "default".to_string(),
        display_name: "Local storage".to_string(),
        template: "local".to_string(),
    });
    store.add_policy(StoragePolicy {
        name: "archive".to_string(),
        display_name: "Archive".to_string(),
        template: "local".to_string(),
    });
    store.add_policy(StoragePolicy {
        name: "empty".to_string(),
        display_name: "Unused".to_string(),
        template: "s3os".to_string(),
    });
    store.add_group(AttachmentGroup {
        name: "photos".to_string(),
        display_name: "Photos".to_string(),
    });

    store.insert_object(object("a", "image/png", 100, "default", Some("photos")), "h1");
    store.insert_object(object("b", "image/jpeg", 200, "default", None), "h2");
    store.insert_object(object("c", "video/mp4", 600, "archive", None), "h3");
    store.insert_object(object("d", "application/pdf", 50, "default", Some("gone")), "h4");
    store.insert_object(object("e", "application/zip", 50, "archive", None), "h5");
    store
}

#[test]
fn test_totals() {
    let aggregator = StatisticsAggregator::new(populated_store());
    let data = aggregator.compute_statistics().unwrap();
    assert_eq!(data.total.attachment_count, 5);
    assert_eq!(data.total.total_size, 1000);
    assert_eq!(data.total.policy_count, 3);
    assert_eq!(data.total.group_count, 1);
}

#[test]
fn test_type_breakdown_has_fixed_order_and_percentages() {
    let data = StatisticsAggregator::new(populated_store())
        .compute_statistics()
        .unwrap();
    let keys: Vec<&str> = data.by_type.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["image", "video", "audio", "document", "other"]);

    let image = &data.by_type[0];
    assert_eq!(image.count, 2);
    assert_eq!(image.size, 300);
    assert_eq!(image.percent, 30.0);
    assert_eq!(image.icon, "image");

    let audio = &data.by_type[2];
    assert_eq!(audio.count, 0);
    assert_eq!(audio.percent, 0.0);

    assert_eq!(data.by_type[4].icon, "file");
    let count: u64 = data.by_type.iter().map(|c| c.count).sum();
    assert_eq!(count, 5);
    let percent: f64 = data.by_type.iter().map(|c| c.percent).sum();
    assert!((percent - 100.0).abs() < 0.05);
}

#[test]
fn test_policy_breakdown_lists_all_policies_by_size() {
    let data = StatisticsAggregator::new(populated_store())
        .compute_statistics()
        .unwrap();
    let keys: Vec<&str> = data.by_policy.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["policy-archive", "policy-default", "policy-empty"]);
    assert_eq!(data.by_policy[0].name, "Archive");
    assert_eq!(data.by_policy[0].size, 650);
    assert_eq!(data.by_policy[0].percent, 65.0);
    assert_eq!(data.by_policy[2].count, 0);
    assert!(data.by_policy.iter().all(|c| c.icon == "storage"));
}

#[test]
fn test_group_breakdown_folds_unknown_groups_into_ungrouped() {
    let data = StatisticsAggregator::new(populated_store())
        .compute_statistics()
        .unwrap();
    assert_eq!(data.by_group.len(), 2);
    let ungrouped = &data.by_group[0];
    assert_eq!(ungrouped.key, "group-_ungrouped");
    assert_eq!(ungrouped.name, "未分组");
    assert_eq!(ungrouped.count, 4);
    assert_eq!(ungrouped.size, 900);
    assert_eq!(data.by_group[1].key, "group-photos");
    assert_eq!(data.by_group[1].percent, 10.0);
    let count: u64 = data.by_group.iter().map(|c| c.count).sum();
    assert_eq!(count, data.total.attachment_count);
}

#[test]
fn test_empty_store_is_all_zero() {
    let store = Arc::new(MemoryStore::new());
    let data = StatisticsAggregator::new(store).compute_statistics().unwrap();
    assert_eq!(data.total.attachment_count, 0);
    assert_eq!(data.total.total_size, 0);
    assert_eq!(data.by_type.len(), 5);
    assert!(data.by_type.iter().all(|c| c.count == 0 && c.percent == 0.0));
    assert!(data.by_policy.is_empty());
    assert_eq!(data.by_group.len(), 1);
    assert_eq!(data.by_group[0].percent, 0.0);
}

#[test]
fn test_repeated_computation_is_identical() {
    let aggregator = StatisticsAggregator::new(populated_store());
    let first = aggregator.compute_statistics().unwrap();
    let second = aggregator.compute_statistics().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unavailable_store_fails() {
    let store = populated_store();
    store.set_unavailable(Some("catalogue locked"));
    let aggregator = StatisticsAggregator::new(store);
    assert!(matches!(
        aggregator.compute_statistics(),
        Err(Error::StorageUnavailable(_))
    ));
}

#[test]
fn test_missing_sizes_count_as_zero() {
    let store = Arc::new(MemoryStore::new());
    let mut unsized_obj = object("x", "text/plain", 0, "default", None);
    unsized_obj.size = None;
    store.insert_object(unsized_obj, "h");
    let data = StatisticsAggregator::new(store).compute_statistics().unwrap();
    assert_eq!(data.total.attachment_count, 1);
    assert_eq!(data.by_type[3].count, 1);
    assert_eq!(data.by_type[3].size, 0);
}

#[test]
fn test_unregistered_policy_is_left_out_of_policy_breakdown() {
    let store = Arc::new(MemoryStore::new());
    store.add_policy(StoragePolicy {
        name: "default".to_string(),
        display_name: "Local storage".to_string(),
        template: "local".to_string(),
    });
    store.insert_object(object("kept", "image/png", 100, "default", None), "h1");
    store.insert_object(object("orphan", "image/png", 100, "ghost", None), "h2");

    let data = StatisticsAggregator::new(store).compute_statistics().unwrap();
    assert_eq!(data.total.attachment_count, 2);
    assert_eq!(data.by_policy.len(), 1);
    assert_eq!(data.by_policy[0].key, "policy-default");
    assert_eq!(data.by_policy[0].count, 1);
    assert_eq!(data.by_policy[0].percent, 100.0);

    let percent: f64 = data.by_policy.iter().map(|c| c.percent).sum();
    assert!((percent - 100.0).abs() < 0.05);
    let group_percent: f64 = data.by_group.iter().map(|c| c.percent).sum();
    assert!((group_percent - 100.0).abs() < 0.05);
}

/// Backend whose listings fail with an I/O error rather than `StorageUnavailable`.
struct BrokenStore;

impl ObjectStore for BrokenStore {
    fn list_objects(&self) -> Result<Vec<StoredObject>, Error> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "catalogue unreadable",
        )))
    }

    fn list_policies(&self) -> Result<Vec<StoragePolicy>, Error> {
        Ok(Vec::new())
    }

    fn list_groups(&self) -> Result<Vec<AttachmentGroup>, Error> {
        Ok(Vec::new())
    }

    fn content_hash(&self, object: &StoredObject) -> Result<String, Error> {
        Err(Error::NotFound(object.name.clone()))
    }

    fn reference_count(&self, _name: &str) -> Result<Option<u32>, Error> {
        Ok(None)
    }

    fn delete_object(&self, name: &str) -> Result<(), Error> {
        Err(Error::NotFound(name.to_string()))
    }
}

#[test]
fn test_backend_listing_errors_surface_as_unavailable() {
    let aggregator = StatisticsAggregator::new(Arc::new(BrokenStore));
    match aggregator.compute_statistics() {
        Err(Error::StorageUnavailable(message)) => assert!(message.contains("catalogue unreadable")),
        other => panic!("unexpected result: {:?}", other),
    }
}
