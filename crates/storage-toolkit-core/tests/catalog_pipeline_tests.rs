use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use storage_toolkit_core::model::ScanPhase;
use storage_toolkit_core::storage::ImportOptions;
use storage_toolkit_core::storage::AttachmentGroup;
use storage_toolkit_core::{CatalogStore, ObjectStore, ScanEngine, StatisticsAggregator};

/// Layout:
///   root/
///     2024/
///       cover.png        ("shared image bytes")
///       notes.txt        ("unique notes")
///     2025/
///       cover-copy.png   ("shared image bytes")  <- duplicate of 2024/cover.png
///       clip.mp4         (4KB of 0xAA)
///       clip-copy.mp4    (4KB of 0xAA)           <- duplicate within same folder
///     empty.bin          (0 bytes, skipped)
fn create_attachment_tree(root: &Path) {
    fs::create_dir_all(root.join("2024")).unwrap();
    fs::create_dir_all(root.join("2025")).unwrap();
    fs::write(root.join("2024/cover.png"), b"shared image bytes").unwrap();
    fs::write(root.join("2024/notes.txt"), b"unique notes").unwrap();
    fs::write(root.join("2025/cover-copy.png"), b"shared image bytes").unwrap();
    fs::write(root.join("2025/clip.mp4"), vec![0xAAu8; 4096]).unwrap();
    fs::write(root.join("2025/clip-copy.mp4"), vec![0xAAu8; 4096]).unwrap();
    fs::write(root.join("empty.bin"), b"").unwrap();
}

fn imported_catalog(root: &Path) -> Arc<CatalogStore> {
    let catalog = CatalogStore::open_in_memory(root).unwrap();
    catalog.ensure_policy("default", "local").unwrap();
    catalog
        .add_group(&AttachmentGroup {
            name: "media".to_string(),
            display_name: "Media".to_string(),
        })
        .unwrap();
    let summary = catalog
        .import_directory(
            root,
            &ImportOptions {
                policy_name: "default".to_string(),
                group_name: Some("media".to_string()),
                ignore_globs: Vec::new(),
            },
        )
        .unwrap();
    assert_eq!(summary.discovered, 5);
    Arc::new(catalog)
}

#[test]
fn test_scan_catalogue_finds_duplicate_files() {
    let dir = tempdir().unwrap();
    create_attachment_tree(dir.path());
    let catalog = imported_catalog(dir.path());
    let engine = ScanEngine::new(catalog.clone());

    engine.start_scan().unwrap();
    engine.wait_for_scan();

    let stats = engine.stats();
    assert_eq!(stats.phase, ScanPhase::Completed);
    assert_eq!(stats.total_count, 5);
    assert_eq!(stats.scanned_count, 5);
    assert_eq!(stats.duplicate_group_count, 2);
    assert_eq!(stats.duplicate_file_count, 4);
    assert_eq!(stats.savable_size, 4096 + 18);

    let page = engine.list_duplicates(1, 10, None).unwrap();
    let largest = &page.items[0];
    assert_eq!(largest.file_size, 4096);
    assert_eq!(largest.media_type.as_deref(), Some("video/mp4"));
    assert!(largest
        .files
        .iter()
        .all(|f| f.group_display_name.as_deref() == Some("Media")));
    assert!(largest.preview_url.as_deref().unwrap().starts_with("/upload/2025/"));
}

#[test]
fn test_delete_duplicate_removes_file_from_disk() {
    let dir = tempdir().unwrap();
    create_attachment_tree(dir.path());
    let catalog = imported_catalog(dir.path());
    let engine = ScanEngine::new(catalog.clone());
    engine.start_scan().unwrap();
    engine.wait_for_scan();

    let page = engine.list_duplicates(1, 10, None).unwrap();
    let image_group = page
        .items
        .iter()
        .find(|g| g.file_size == 18)
        .unwrap()
        .clone();
    let victim = image_group
        .files
        .iter()
        .find(|f| !f.is_recommended)
        .unwrap();

    engine.delete_duplicate(&victim.attachment_name).unwrap();

    assert_eq!(engine.stats().duplicate_group_count, 1);
    assert_eq!(catalog.list_objects().unwrap().len(), 4);
    let remaining_pngs = ["2024/cover.png", "2025/cover-copy.png"]
        .iter()
        .filter(|p| dir.path().join(p).exists())
        .count();
    assert_eq!(remaining_pngs, 1);
}

#[test]
fn test_references_drive_recommendation() {
    let dir = tempdir().unwrap();
    create_attachment_tree(dir.path());
    let catalog = imported_catalog(dir.path());

    let copy = catalog
        .list_objects()
        .unwrap()
        .into_iter()
        .find(|o| o.display_name == "cover-copy.png")
        .unwrap();
    catalog.add_reference(&copy.name, "post/welcome").unwrap();

    let engine = ScanEngine::new(catalog.clone());
    engine.start_scan().unwrap();
    engine.wait_for_scan();

    let page = engine.list_duplicates(1, 10, None).unwrap();
    let image_group = page.items.iter().find(|g| g.file_size == 18).unwrap();
    assert_eq!(image_group.recommended_keep.as_deref(), Some(copy.name.as_str()));
}

#[test]
fn test_statistics_over_catalogue() {
    let dir = tempdir().unwrap();
    create_attachment_tree(dir.path());
    let catalog = imported_catalog(dir.path());

    let data = StatisticsAggregator::new(catalog).compute_statistics().unwrap();
    assert_eq!(data.total.attachment_count, 5);
    assert_eq!(data.total.total_size, 18 * 2 + 12 + 4096 * 2);
    assert_eq!(data.total.policy_count, 1);
    assert_eq!(data.total.group_count, 1);

    let video = data.by_type.iter().find(|c| c.key == "video").unwrap();
    assert_eq!(video.count, 2);
    let document = data.by_type.iter().find(|c| c.key == "document").unwrap();
    assert_eq!(document.count, 1);

    assert_eq!(data.by_group[0].key, "group-media");
    assert_eq!(data.by_group[0].percent, 100.0);
}

#[test]
fn test_catalogue_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let files = dir.path().join("files");
    fs::create_dir_all(&files).unwrap();
    fs::write(files.join("a.txt"), b"a").unwrap();
    let db_path = dir.path().join("catalog.db");
    let db_path = db_path.to_str().unwrap();

    {
        let catalog = CatalogStore::open(db_path, &files).unwrap();
        catalog.ensure_policy("default", "local").unwrap();
        catalog
            .import_directory(
                &files,
                &ImportOptions {
                    policy_name: "default".to_string(),
                    group_name: None,
                    ignore_globs: Vec::new(),
                },
            )
            .unwrap();
    }

    let reopened = CatalogStore::open(db_path, &files).unwrap();
    assert_eq!(reopened.attachment_count().unwrap(), 1);
    reopened.truncate().unwrap();
    assert_eq!(reopened.attachment_count().unwrap(), 0);
    assert!(files.join("a.txt").exists());
}
