//! Background duplicate scan and the result set it maintains.
//!
//! One scan runs at a time on its own thread. Status and listings are served from the
//! last completed scan while a new one is in flight.

mod results;
mod state;
mod worker;

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::model::{DuplicateFilter, DuplicateGroup, DuplicateStats, ListResult, ScanPhase};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::storage::ObjectStore;
use chrono::Utc;
use results::DuplicateResults;
use state::ScanState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use tracing::{error, info, warn};
use worker::ScanJob;

/// Lock order: `deletion` before `state` before `results`.
#[derive(Default)]
pub(crate) struct Shared {
    deletion: Mutex<()>,
    state: Mutex<ScanState>,
    results: RwLock<Option<DuplicateResults>>,
}

impl Shared {
    fn lock_deletion(&self) -> MutexGuard<'_, ()> {
        self.deletion.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_results(&self) -> RwLockReadGuard<'_, Option<DuplicateResults>> {
        self.results.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_results(&self) -> RwLockWriteGuard<'_, Option<DuplicateResults>> {
        self.results.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ScanEngine {
    store: Arc<dyn ObjectStore>,
    analysis: AnalysisConfig,
    reporter: Arc<dyn ProgressReporter>,
    shared: Arc<Shared>,
}

impl ScanEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            analysis: AnalysisConfig::default(),
            reporter: Arc::new(SilentReporter),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn with_analysis_config(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Start a background scan and return the stats as of the trigger.
    ///
    /// Fails with `AlreadyRunning` while another scan is in flight, unless that scan has
    /// exceeded the configured timeout, in which case it is cancelled and replaced.
    pub fn start_scan(&self) -> Result<DuplicateStats, Error> {
        {
            let mut state = self.shared.lock_state();
            let now = Utc::now();
            if state.phase == ScanPhase::Scanning {
                if !state.is_stuck(self.analysis.scan_timeout(), now) {
                    return Err(Error::AlreadyRunning);
                }
                warn!(
                    "Previous duplicate scan exceeded {} minutes, starting a new one",
                    self.analysis.scan_timeout_minutes
                );
            }

            let run = state.begin(now);
            let job = ScanJob {
                store: Arc::clone(&self.store),
                shared: Arc::clone(&self.shared),
                run,
                analysis: self.analysis.clone(),
                reporter: Arc::clone(&self.reporter),
            };

            match thread::Builder::new()
                .name("duplicate-scan".to_string())
                .spawn(move || job.run())
            {
                Ok(handle) => state.worker = Some(handle),
                Err(e) => {
                    state.fail(format!("failed to start scan worker: {}", e));
                    return Err(Error::Io(e));
                }
            }
        }

        info!("Duplicate scan triggered");
        Ok(self.stats())
    }

    /// Cooperatively stop a running scan. The previous completed results stay authoritative.
    pub fn cancel_scan(&self) -> DuplicateStats {
        if self.shared.lock_state().cancel() {
            info!("Duplicate scan cancellation requested");
        }
        self.stats()
    }

    /// Current status. Never blocks on a running scan.
    ///
    /// Duplicate totals reflect the last completed scan and read zero while scanning.
    pub fn stats(&self) -> DuplicateStats {
        let state = self.shared.lock_state();
        let mut stats = state.snapshot();
        if stats.phase != ScanPhase::Scanning {
            if let Some(results) = self.shared.read_results().as_ref() {
                results.apply_totals(&mut stats);
            }
        }
        stats
    }

    /// Block until the most recently started scan worker has exited.
    pub fn wait_for_scan(&self) {
        let worker = self.shared.lock_state().worker.take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                error!("Duplicate scan worker panicked");
                let mut state = self.shared.lock_state();
                if state.phase == ScanPhase::Scanning {
                    state.fail("scan worker panicked".to_string());
                }
            }
        }
    }

    pub fn list_duplicates(
        &self,
        page: usize,
        size: usize,
        filter: Option<&DuplicateFilter>,
    ) -> Result<ListResult<DuplicateGroup>, Error> {
        if page == 0 || size == 0 {
            return Err(Error::InvalidInput(format!(
                "page and size must be at least 1 (got page={}, size={})",
                page, size
            )));
        }

        let results = self.shared.read_results();
        let results = results.as_ref().ok_or(Error::NoResultsYet)?;
        let default_filter = DuplicateFilter::default();
        Ok(results.page(page, size, filter.unwrap_or(&default_filter)))
    }

    /// Delete one duplicate from storage and from its group.
    ///
    /// Deletes run one at a time. The results lock is only taken to look up and to update
    /// the group, so status and listings stay responsive while storage is busy.
    pub fn delete_duplicate(&self, attachment_name: &str) -> Result<(), Error> {
        let _deletion = self.shared.lock_deletion();
        {
            let results = self.shared.read_results();
            let results = results.as_ref().ok_or(Error::NoResultsYet)?;
            if !results.contains(attachment_name) {
                return Err(Error::NotFound(format!(
                    "attachment {} is not in any duplicate group",
                    attachment_name
                )));
            }
        }

        match self.store.delete_object(attachment_name) {
            Ok(()) => {}
            Err(Error::NotFound(_)) => {
                warn!("Attachment {} was already gone from storage", attachment_name)
            }
            Err(e) => return Err(e),
        }

        let mut results = self.shared.write_results();
        let Some(results) = results.as_mut() else {
            info!(
                "Deleted duplicate {}; results were cleared meanwhile",
                attachment_name
            );
            return Ok(());
        };
        match results.remove_file(attachment_name) {
            Some(group) => info!(
                "Deleted duplicate {}; {} copies remain, keep {:?}",
                attachment_name, group.file_count, group.recommended_keep
            ),
            None => info!(
                "Deleted duplicate {}; its group has no duplicates left",
                attachment_name
            ),
        }
        Ok(())
    }

    /// Forget all results and return to a fresh idle state.
    pub fn clear_results(&self) -> Result<(), Error> {
        let mut state = self.shared.lock_state();
        if state.phase == ScanPhase::Scanning {
            return Err(Error::AlreadyRunning);
        }
        *self.shared.write_results() = None;
        state.reset();
        info!("Duplicate results cleared");
        Ok(())
    }
}
