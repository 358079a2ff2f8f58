pub mod catalog;
pub mod memory;
pub mod models;
pub mod queries;
pub mod sqlite;

pub use catalog::{CatalogStore, ImportOptions, ImportSummary};
pub use memory::MemoryStore;
pub use models::{AttachmentGroup, StoragePolicy, StoredObject};
pub use sqlite::Database;

use crate::error::Error;

/// The object storage backend the scan engine and statistics read from.
///
/// Listing failures of any variant are reported to callers as `Error::StorageUnavailable`;
/// per-object failures (`content_hash`, `reference_count`) are treated as skippable.
pub trait ObjectStore: Send + Sync {
    fn list_objects(&self) -> Result<Vec<StoredObject>, Error>;

    fn list_policies(&self) -> Result<Vec<StoragePolicy>, Error>;

    fn list_groups(&self) -> Result<Vec<AttachmentGroup>, Error>;

    /// Hex digest of the object's content.
    fn content_hash(&self, object: &StoredObject) -> Result<String, Error>;

    /// Number of places linking to the object, `None` if references were never counted.
    fn reference_count(&self, name: &str) -> Result<Option<u32>, Error>;

    /// Remove the object; `Error::NotFound` if the store does not know it.
    fn delete_object(&self, name: &str) -> Result<(), Error>;
}
