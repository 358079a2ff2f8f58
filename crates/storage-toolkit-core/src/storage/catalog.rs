use super::models::{AttachmentGroup, AttachmentRecord, AttachmentReference, StoragePolicy, StoredObject};
use super::sqlite::Database;
use super::ObjectStore;
use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher;
use crate::scanner::{self, DiscoveredFile};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Length of generated attachment names (hex chars of the path digest).
const ATTACHMENT_NAME_LEN: usize = 16;
const PERMALINK_PREFIX: &str = "/upload/";

/// Attachment catalogue in SQLite, content on disk under `root`.
pub struct CatalogStore {
    db: Mutex<Database>,
    root: PathBuf,
}

/// Where imported files are registered.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub policy_name: String,
    pub group_name: Option<String>,
    pub ignore_globs: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub discovered: usize,
    pub imported: usize,
}

impl CatalogStore {
    pub fn open(catalog_path: &str, root: impl Into<PathBuf>) -> Result<Self, Error> {
        let db = Database::open(catalog_path)?;
        debug!("Opened attachment catalogue {}", catalog_path);
        Ok(Self::with_database(db, root.into()))
    }

    pub fn open_in_memory(root: impl Into<PathBuf>) -> Result<Self, Error> {
        Ok(Self::with_database(Database::open_in_memory()?, root.into()))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::open(&config.catalog_path, &config.storage_root)
    }

    fn with_database(db: Database, root: PathBuf) -> Self {
        Self {
            db: Mutex::new(db),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_policy(&self, policy: &StoragePolicy) -> Result<(), Error> {
        self.db().upsert_policy(policy)?;
        Ok(())
    }

    /// Create the policy with `template` unless one with that name exists.
    pub fn ensure_policy(&self, name: &str, template: &str) -> Result<StoragePolicy, Error> {
        let db = self.db();
        if let Some(existing) = db.list_policies()?.into_iter().find(|p| p.name == name) {
            return Ok(existing);
        }
        let policy = StoragePolicy {
            name: name.to_string(),
            display_name: name.to_string(),
            template: template.to_string(),
        };
        db.upsert_policy(&policy)?;
        info!("Created storage policy {} ({})", name, template);
        Ok(policy)
    }

    pub fn add_group(&self, group: &AttachmentGroup) -> Result<(), Error> {
        self.db().upsert_group(group)?;
        Ok(())
    }

    pub fn attachment(&self, name: &str) -> Result<Option<AttachmentRecord>, Error> {
        Ok(self.db().get_attachment(name)?)
    }

    pub fn attachment_count(&self) -> Result<u64, Error> {
        let count = self.db().attachment_count()?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Walk `dir` and register every file in it as an attachment.
    ///
    /// Re-importing a file updates its row; the attachment name is derived from its path.
    pub fn import_directory(&self, dir: &Path, options: &ImportOptions) -> Result<ImportSummary, Error> {
        {
            let db = self.db();
            if !db.list_policies()?.iter().any(|p| p.name == options.policy_name) {
                return Err(Error::NotFound(format!(
                    "storage policy {}",
                    options.policy_name
                )));
            }
            if let Some(group) = &options.group_name {
                if !db.list_groups()?.iter().any(|g| &g.name == group) {
                    return Err(Error::NotFound(format!("attachment group {}", group)));
                }
            }
        }

        let dir = dir.canonicalize()?;
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let ignore: Vec<&str> = options.ignore_globs.iter().map(String::as_str).collect();
        let files = scanner::collect_files(&dir, &ignore)?;
        info!("Discovered {} files under {}", files.len(), dir.display());

        let records: Vec<AttachmentRecord> = files
            .iter()
            .map(|file| record_for(&root, file, options))
            .collect();
        let imported = self.db().upsert_attachments(&records)?;

        Ok(ImportSummary {
            discovered: files.len(),
            imported,
        })
    }

    /// Record that `source` links to the attachment.
    pub fn add_reference(&self, attachment_name: &str, source: &str) -> Result<(), Error> {
        let db = self.db();
        if db.get_attachment(attachment_name)?.is_none() {
            return Err(Error::NotFound(format!("attachment {}", attachment_name)));
        }
        db.add_reference(attachment_name, source)?;
        Ok(())
    }

    /// Returns whether a reference was removed.
    pub fn remove_reference(&self, attachment_name: &str, source: &str) -> Result<bool, Error> {
        Ok(self.db().remove_reference(attachment_name, source)? > 0)
    }

    pub fn references(&self, attachment_name: &str) -> Result<Vec<AttachmentReference>, Error> {
        Ok(self.db().get_references(attachment_name)?)
    }

    /// Empty the catalogue. Files on disk are left alone.
    pub fn truncate(&self) -> Result<(), Error> {
        self.db().truncate_all()?;
        Ok(())
    }

    fn resolve(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn lookup(&self, name: &str) -> Result<AttachmentRecord, Error> {
        self.db()
            .get_attachment(name)?
            .ok_or_else(|| Error::NotFound(format!("attachment {}", name)))
    }
}

fn record_for(root: &Path, file: &DiscoveredFile, options: &ImportOptions) -> AttachmentRecord {
    let relative = file.path.strip_prefix(root).ok();
    let stored_path = match relative {
        Some(rel) => rel.to_string_lossy().replace('\\', "/"),
        None => file.path.to_string_lossy().into_owned(),
    };
    let name: String = hasher::hash_data(stored_path.as_bytes())
        .chars()
        .take(ATTACHMENT_NAME_LEN)
        .collect();
    let display_name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| stored_path.clone());
    let uploaded_at = fs::metadata(&file.path)
        .and_then(|m| m.modified())
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    AttachmentRecord {
        name,
        display_name,
        media_type: mime_guess::from_path(&file.path)
            .first()
            .map(|m| m.essence_str().to_string()),
        size: i64::try_from(file.size).ok(),
        policy_name: Some(options.policy_name.clone()),
        group_name: options.group_name.clone(),
        permalink: relative.map(|_| format!("{}{}", PERMALINK_PREFIX, stored_path)),
        file_path: stored_path,
        uploaded_at,
    }
}

fn unavailable(e: rusqlite::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

impl ObjectStore for CatalogStore {
    fn list_objects(&self) -> Result<Vec<StoredObject>, Error> {
        let records = self.db().list_attachments().map_err(unavailable)?;
        Ok(records.iter().map(AttachmentRecord::to_stored_object).collect())
    }

    fn list_policies(&self) -> Result<Vec<StoragePolicy>, Error> {
        self.db().list_policies().map_err(unavailable)
    }

    fn list_groups(&self) -> Result<Vec<AttachmentGroup>, Error> {
        self.db().list_groups().map_err(unavailable)
    }

    fn content_hash(&self, object: &StoredObject) -> Result<String, Error> {
        let record = self.lookup(&object.name)?;
        let path = self.resolve(&record.file_path);
        Ok(hasher::hash_file(&path)?)
    }

    fn reference_count(&self, name: &str) -> Result<Option<u32>, Error> {
        Ok(self.db().reference_count(name)?)
    }

    fn delete_object(&self, name: &str) -> Result<(), Error> {
        let record = self.lookup(name)?;
        let path = self.resolve(&record.file_path);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("File for attachment {} already missing: {}", name, path.display())
            }
            Err(e) => return Err(Error::Io(e)),
        }
        self.db().delete_attachment(name)?;
        Ok(())
    }
}
