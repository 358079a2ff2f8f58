use super::results::DuplicateResults;
use super::state::ScanRun;
use super::Shared;
use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::fingerprint::{FingerprintGroup, FingerprintIndex};
use crate::model::duplicate::REFERENCE_COUNT_UNKNOWN;
use crate::model::{DuplicateFile, DuplicateGroup};
use crate::progress::ProgressReporter;
use crate::storage::{ObjectStore, StoredObject};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const PROGRESS_LOG_INTERVAL: u64 = 50;
/// Objects hashed per worker between two cancellation checks.
const BATCH_PER_WORKER: usize = 8;

/// One background duplicate scan.
pub(crate) struct ScanJob {
    pub store: Arc<dyn ObjectStore>,
    pub shared: Arc<Shared>,
    pub run: Arc<ScanRun>,
    pub analysis: AnalysisConfig,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl ScanJob {
    pub fn run(self) {
        let started = Instant::now();
        info!("Starting duplicate scan (generation {})", self.run.generation);

        match self.collect() {
            Ok(Some(groups)) => self.finish(groups, started),
            Ok(None) => {
                info!("Duplicate scan cancelled after {} objects", self.run.scanned());
                self.reporter.on_scan_cancelled();
            }
            Err(e) => self.fail(e),
        }
    }

    fn collect(&self) -> Result<Option<Vec<DuplicateGroup>>, Error> {
        let objects = self.scan_targets()?;
        let total = objects.len() as u64;
        self.run.set_total(total);
        self.reporter.on_scan_start(total);
        info!("Found {} attachments, computing content hashes...", total);

        let group_names: HashMap<String, String> = self
            .store
            .list_groups()
            .map_err(Error::into_unavailable)?
            .into_iter()
            .map(|g| (g.name, g.display_name))
            .collect();

        let concurrency = self.analysis.concurrency();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("duplicate-hash-{}", i))
            .build()
            .map_err(|e| Error::Other(format!("failed to build hashing pool: {}", e)))?;

        let index = FingerprintIndex::new();
        for batch in objects.chunks(concurrency * BATCH_PER_WORKER) {
            if self.run.is_cancelled() {
                return Ok(None);
            }
            pool.install(|| {
                batch
                    .par_iter()
                    .for_each(|object| self.fingerprint(object, &index, total))
            });
        }
        if self.run.is_cancelled() {
            return Ok(None);
        }

        debug!(
            "Hashed {}/{} attachments, {} indexed",
            self.run.scanned(),
            total,
            index.object_count()
        );

        let by_name: HashMap<&str, &StoredObject> =
            objects.iter().map(|o| (o.name.as_str(), o)).collect();
        let groups = index
            .groups_with_duplicates()
            .map(|group| self.build_group(group, &by_name, &group_names))
            .collect();
        Ok(Some(groups))
    }

    /// Objects covered by this scan, in identifier order.
    fn scan_targets(&self) -> Result<Vec<StoredObject>, Error> {
        let mut objects = self.store.list_objects().map_err(Error::into_unavailable)?;

        let templates = &self.analysis.scan_policy_templates;
        if !templates.is_empty() {
            let allowed: HashSet<String> = self
                .store
                .list_policies()
                .map_err(Error::into_unavailable)?
                .into_iter()
                .filter(|p| templates.contains(&p.template))
                .map(|p| p.name)
                .collect();
            if allowed.is_empty() {
                info!("No storage policy uses templates {:?}, nothing to scan", templates);
            } else {
                debug!("Scanning policies: {:?}", allowed);
            }
            objects.retain(|o| {
                o.policy_name
                    .as_ref()
                    .is_some_and(|policy| allowed.contains(policy))
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn fingerprint(&self, object: &StoredObject, index: &FingerprintIndex, total: u64) {
        if self.run.is_cancelled() {
            return;
        }

        let recorded = self
            .store
            .content_hash(object)
            .and_then(|hash| index.record(&object.name, Some(&hash), object.size));
        if let Err(e) = recorded {
            warn!("Skipping attachment {}: {}", object.name, e);
        }

        let scanned = self.run.advance();
        if scanned % PROGRESS_LOG_INTERVAL == 0 {
            info!("Hashed {}/{} attachments...", scanned, total);
        }
        self.reporter.on_scan_progress(scanned, total);
    }

    fn build_group(
        &self,
        group: FingerprintGroup,
        objects: &HashMap<&str, &StoredObject>,
        group_names: &HashMap<String, String>,
    ) -> DuplicateGroup {
        let files = group
            .members
            .iter()
            .filter_map(|name| objects.get(name.as_str()))
            .map(|object| DuplicateFile {
                attachment_name: object.name.clone(),
                display_name: object.display_name.clone(),
                media_type: object.media_type.clone(),
                permalink: object.permalink.clone(),
                upload_time: object.upload_time,
                group_name: object.group_name.clone(),
                group_display_name: object
                    .group_name
                    .as_ref()
                    .and_then(|g| group_names.get(g).cloned()),
                reference_count: self.reference_count(&object.name),
                is_recommended: false,
            })
            .collect();

        DuplicateGroup::new(group.fingerprint.hash, group.fingerprint.size, files)
    }

    fn reference_count(&self, name: &str) -> i64 {
        match self.store.reference_count(name) {
            Ok(Some(count)) => i64::from(count),
            Ok(None) => REFERENCE_COUNT_UNKNOWN,
            Err(e) => {
                warn!("Could not count references to {}: {}", name, e);
                REFERENCE_COUNT_UNKNOWN
            }
        }
    }

    fn finish(&self, groups: Vec<DuplicateGroup>, started: Instant) {
        let results = DuplicateResults::new(groups);
        let group_count = results.group_count();

        {
            let mut state = self.shared.lock_state();
            if !state.owns(&self.run) {
                debug!(
                    "Discarding results of superseded scan (generation {})",
                    self.run.generation
                );
                return;
            }
            *self.shared.write_results() = Some(results);
            state.complete(Utc::now());
        }

        let duration = started.elapsed().as_secs_f64();
        info!(
            "Duplicate scan completed in {:.2}s: {} groups",
            duration, group_count
        );
        self.reporter
            .on_scan_complete(group_count as usize, duration);
    }

    fn fail(&self, e: Error) {
        let message = e.to_string();
        {
            let mut state = self.shared.lock_state();
            if !state.owns(&self.run) {
                debug!("Ignoring failure of superseded scan: {}", message);
                return;
            }
            state.fail(message.clone());
        }
        error!("Duplicate scan failed: {}", message);
        self.reporter.on_scan_failed(&message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanPhase;
    use crate::progress::SilentReporter;
    use crate::storage::MemoryStore;

    fn job_for(shared: &Arc<Shared>, run: Arc<ScanRun>) -> ScanJob {
        ScanJob {
            store: Arc::new(MemoryStore::new()),
            shared: Arc::clone(shared),
            run,
            analysis: AnalysisConfig::default(),
            reporter: Arc::new(SilentReporter),
        }
    }

    fn pair() -> DuplicateGroup {
        let file = |name: &str| DuplicateFile {
            attachment_name: name.to_string(),
            display_name: name.to_string(),
            media_type: None,
            permalink: None,
            upload_time: None,
            group_name: None,
            group_display_name: None,
            reference_count: REFERENCE_COUNT_UNKNOWN,
            is_recommended: false,
        };
        DuplicateGroup::new("h".to_string(), 10, vec![file("a"), file("b")])
    }

    #[test]
    fn test_superseded_run_results_are_discarded() {
        let shared = Arc::new(Shared::default());
        let stale = shared.lock_state().begin(Utc::now());
        let current = shared.lock_state().begin(Utc::now());

        job_for(&shared, stale).finish(vec![pair()], Instant::now());
        assert!(shared.read_results().is_none());
        assert_eq!(shared.lock_state().phase, ScanPhase::Scanning);

        job_for(&shared, current).finish(vec![pair()], Instant::now());
        assert_eq!(shared.lock_state().phase, ScanPhase::Completed);
        assert!(shared.read_results().as_ref().is_some_and(|r| r.group_count() == 1));
    }

    #[test]
    fn test_superseded_run_failure_is_ignored() {
        let shared = Arc::new(Shared::default());
        let stale = shared.lock_state().begin(Utc::now());
        let _current = shared.lock_state().begin(Utc::now());

        job_for(&shared, stale).fail(Error::StorageUnavailable("offline".to_string()));
        let state = shared.lock_state();
        assert_eq!(state.phase, ScanPhase::Scanning);
        assert!(state.error_message.is_none());
    }
}
