use storage_toolkit_core::storage::models::*;
use storage_toolkit_core::storage::Database;

fn make_record(name: &str, path: &str, size: i64) -> AttachmentRecord {
    AttachmentRecord {
        name: name.to_string(),
        display_name: path.rsplit('/').next().unwrap_or(path).to_string(),
        media_type: Some("image/png".to_string()),
        size: Some(size),
        policy_name: Some("default".to_string()),
        group_name: None,
        file_path: path.to_string(),
        permalink: Some(format!("/upload/{}", path)),
        uploaded_at: Some("2024-03-01T10:00:00+00:00".to_string()),
    }
}

#[test]
fn test_upsert_and_list_attachments() {
    let db = Database::open_in_memory().unwrap();
    let records = vec![
        make_record("b", "2024/b.png", 200),
        make_record("a", "2024/a.png", 100),
    ];
    assert_eq!(db.upsert_attachments(&records).unwrap(), 2);

    let listed = db.list_attachments().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "a");
    assert_eq!(db.attachment_count().unwrap(), 2);

    let object = listed[0].to_stored_object();
    assert_eq!(object.size, Some(100));
    assert_eq!(
        object.upload_time.map(|t| t.to_rfc3339()),
        Some("2024-03-01T10:00:00+00:00".to_string())
    );
}

#[test]
fn test_upsert_updates_existing_row() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_attachments(&[make_record("a", "a.png", 100)]).unwrap();
    let mut changed = make_record("a", "a.png", 150);
    changed.group_name = Some("photos".to_string());
    db.upsert_attachments(&[changed]).unwrap();

    let record = db.get_attachment("a").unwrap().unwrap();
    assert_eq!(record.size, Some(150));
    assert_eq!(record.group_name.as_deref(), Some("photos"));
    assert_eq!(db.attachment_count().unwrap(), 1);
}

#[test]
fn test_policies_and_groups_round_trip() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_policy(&StoragePolicy {
        name: "default".to_string(),
        display_name: "Local".to_string(),
        template: "local".to_string(),
    })
    .unwrap();
    db.upsert_policy(&StoragePolicy {
        name: "default".to_string(),
        display_name: "Local disk".to_string(),
        template: "local".to_string(),
    })
    .unwrap();
    db.upsert_group(&AttachmentGroup {
        name: "photos".to_string(),
        display_name: "Photos".to_string(),
    })
    .unwrap();

    let policies = db.list_policies().unwrap();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].display_name, "Local disk");
    assert_eq!(db.list_groups().unwrap().len(), 1);
}

#[test]
fn test_reference_counting() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_attachments(&[make_record("a", "a.png", 1), make_record("b", "b.png", 1)])
        .unwrap();
    assert!(!db.references_counted().unwrap());
    assert_eq!(db.reference_count("a").unwrap(), None);

    db.add_reference("a", "post/1").unwrap();
    db.add_reference("a", "post/1").unwrap();
    db.add_reference("a", "post/2").unwrap();
    assert!(db.references_counted().unwrap());
    assert_eq!(db.reference_count("a").unwrap(), Some(2));
    assert_eq!(db.reference_count("b").unwrap(), Some(0));

    assert_eq!(db.remove_reference("a", "post/1").unwrap(), 1);
    let references = db.get_references("a").unwrap();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].source, "post/2");
}

#[test]
fn test_delete_attachment_drops_references() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_attachments(&[make_record("a", "a.png", 1)]).unwrap();
    db.add_reference("a", "post/1").unwrap();

    assert_eq!(db.delete_attachment("a").unwrap(), 1);
    assert_eq!(db.delete_attachment("a").unwrap(), 0);
    assert!(db.get_attachment("a").unwrap().is_none());
    assert!(db.get_references("a").unwrap().is_empty());
}

#[test]
fn test_truncate_all() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_attachments(&[make_record("a", "a.png", 1)]).unwrap();
    db.add_reference("a", "post/1").unwrap();
    db.truncate_all().unwrap();
    assert_eq!(db.attachment_count().unwrap(), 0);
    assert!(!db.references_counted().unwrap());
}
