use super::models::*;
use super::sqlite::Database;
use rusqlite::{params, OptionalExtension, Result, Row};
use tracing::debug;

const ATTACHMENT_COLUMNS: &str = "name, display_name, media_type, size, policy_name, group_name, \
     file_path, permalink, uploaded_at";

fn attachment_from_row(row: &Row<'_>) -> Result<AttachmentRecord> {
    Ok(AttachmentRecord {
        name: row.get(0)?,
        display_name: row.get(1)?,
        media_type: row.get(2)?,
        size: row.get(3)?,
        policy_name: row.get(4)?,
        group_name: row.get(5)?,
        file_path: row.get(6)?,
        permalink: row.get(7)?,
        uploaded_at: row.get(8)?,
    })
}

impl Database {
    // ── Policies & Groups ────────────────────────────────────────

    pub fn upsert_policy(&self, policy: &StoragePolicy) -> Result<()> {
        self.connection().execute(
            "INSERT INTO storage_policy (name, display_name, template) VALUES (?1, ?2, ?3) \
             ON CONFLICT(name) DO UPDATE SET \
                 display_name = excluded.display_name, \
                 template = excluded.template",
            params![policy.name, policy.display_name, policy.template],
        )?;
        Ok(())
    }

    pub fn list_policies(&self) -> Result<Vec<StoragePolicy>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT name, display_name, template FROM storage_policy ORDER BY name")?;
        let policies = stmt
            .query_map([], |row| {
                Ok(StoragePolicy {
                    name: row.get(0)?,
                    display_name: row.get(1)?,
                    template: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(policies)
    }

    pub fn upsert_group(&self, group: &AttachmentGroup) -> Result<()> {
        self.connection().execute(
            "INSERT INTO attachment_group (name, display_name) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET display_name = excluded.display_name",
            params![group.name, group.display_name],
        )?;
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<AttachmentGroup>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT name, display_name FROM attachment_group ORDER BY name")?;
        let groups = stmt
            .query_map([], |row| {
                Ok(AttachmentGroup {
                    name: row.get(0)?,
                    display_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(groups)
    }

    // ── Attachments ──────────────────────────────────────────────

    /// Insert or refresh attachments keyed on name. Returns rows written.
    pub fn upsert_attachments(&self, attachments: &[AttachmentRecord]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO attachment \
                 (name, display_name, media_type, size, policy_name, group_name, \
                  file_path, permalink, uploaded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(name) DO UPDATE SET \
                     display_name = excluded.display_name, \
                     media_type = excluded.media_type, \
                     size = excluded.size, \
                     policy_name = excluded.policy_name, \
                     group_name = excluded.group_name, \
                     file_path = excluded.file_path, \
                     permalink = excluded.permalink, \
                     uploaded_at = excluded.uploaded_at",
            )?;
            for attachment in attachments {
                count += stmt.execute(params![
                    attachment.name,
                    attachment.display_name,
                    attachment.media_type,
                    attachment.size,
                    attachment.policy_name,
                    attachment.group_name,
                    attachment.file_path,
                    attachment.permalink,
                    attachment.uploaded_at,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Upserted {} attachments", count);
        Ok(count)
    }

    pub fn list_attachments(&self) -> Result<Vec<AttachmentRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM attachment ORDER BY name",
            ATTACHMENT_COLUMNS
        ))?;
        let attachments = stmt
            .query_map([], attachment_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(attachments)
    }

    pub fn get_attachment(&self, name: &str) -> Result<Option<AttachmentRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM attachment WHERE name = ?1", ATTACHMENT_COLUMNS),
                params![name],
                attachment_from_row,
            )
            .optional()
    }

    pub fn attachment_count(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM attachment", [], |row| row.get(0))
    }

    /// Delete an attachment and the references pointing at it. Returns rows removed from `attachment`.
    pub fn delete_attachment(&self, name: &str) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "DELETE FROM attachment_reference WHERE attachment_name = ?1",
            params![name],
        )?;
        let removed = tx.execute("DELETE FROM attachment WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(removed)
    }

    // ── References ───────────────────────────────────────────────

    /// Record that `source` links to `attachment_name`. Marks references as counted.
    pub fn add_reference(&self, attachment_name: &str, source: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO attachment_reference (attachment_name, source, recorded_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(attachment_name, source) DO UPDATE SET recorded_at = excluded.recorded_at",
            params![attachment_name, source, now],
        )?;
        tx.execute(
            "INSERT INTO reference_scan (id, last_counted_at) VALUES (1, ?1) \
             ON CONFLICT(id) DO UPDATE SET last_counted_at = excluded.last_counted_at",
            params![now],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove_reference(&self, attachment_name: &str, source: &str) -> Result<usize> {
        self.connection().execute(
            "DELETE FROM attachment_reference WHERE attachment_name = ?1 AND source = ?2",
            params![attachment_name, source],
        )
    }

    pub fn get_references(&self, attachment_name: &str) -> Result<Vec<AttachmentReference>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, attachment_name, source, recorded_at FROM attachment_reference \
             WHERE attachment_name = ?1 ORDER BY source",
        )?;
        let references = stmt
            .query_map(params![attachment_name], |row| {
                Ok(AttachmentReference {
                    id: row.get(0)?,
                    attachment_name: row.get(1)?,
                    source: row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(references)
    }

    pub fn references_counted(&self) -> Result<bool> {
        let counted: Option<Option<String>> = self
            .connection()
            .query_row(
                "SELECT last_counted_at FROM reference_scan WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(matches!(counted, Some(Some(_))))
    }

    /// `None` until references have been recorded at least once.
    pub fn reference_count(&self, attachment_name: &str) -> Result<Option<u32>> {
        if !self.references_counted()? {
            return Ok(None);
        }
        let count: u32 = self.connection().query_row(
            "SELECT COUNT(*) FROM attachment_reference WHERE attachment_name = ?1",
            params![attachment_name],
            |row| row.get(0),
        )?;
        Ok(Some(count))
    }
}
