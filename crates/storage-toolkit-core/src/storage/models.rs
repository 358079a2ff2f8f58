use chrono::{DateTime, Utc};

/// An attachment as the storage backend describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Stable identifier, unique across the store.
    pub name: String,
    pub display_name: String,
    pub media_type: Option<String>,
    pub size: Option<u64>,
    pub policy_name: Option<String>,
    pub group_name: Option<String>,
    pub upload_time: Option<DateTime<Utc>>,
    pub permalink: Option<String>,
}

/// A named storage backend attachments are stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePolicy {
    pub name: String,
    pub display_name: String,
    pub template: String,
}

/// A user-facing folder attachments are organised into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentGroup {
    pub name: String,
    pub display_name: String,
}

/// Catalogue row for an attachment.
#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    pub name: String,
    pub display_name: String,
    pub media_type: Option<String>,
    pub size: Option<i64>,
    pub policy_name: Option<String>,
    pub group_name: Option<String>,
    /// Resolved against the storage root; absolute paths are used as-is.
    pub file_path: String,
    pub permalink: Option<String>,
    pub uploaded_at: Option<String>,
}

impl AttachmentRecord {
    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            media_type: self.media_type.clone(),
            size: self.size.and_then(|s| u64::try_from(s).ok()),
            policy_name: self.policy_name.clone(),
            group_name: self.group_name.clone(),
            upload_time: self
                .uploaded_at
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
            permalink: self.permalink.clone(),
        }
    }
}

/// A place in the wider system that links to an attachment.
#[derive(Debug, Clone)]
pub struct AttachmentReference {
    pub id: i64,
    pub attachment_name: String,
    pub source: String,
    pub recorded_at: String,
}
