use crate::model::{DuplicateStats, ScanPhase};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Counters and cancel flag for one scan, shared with its worker thread.
#[derive(Debug)]
pub(crate) struct ScanRun {
    pub generation: u64,
    cancelled: AtomicBool,
    total: AtomicU64,
    scanned: AtomicU64,
}

impl ScanRun {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            cancelled: AtomicBool::new(false),
            total: AtomicU64::new(0),
            scanned: AtomicU64::new(0),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Returns the new scanned count.
    pub fn advance(&self) -> u64 {
        self.scanned.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn scanned(&self) -> u64 {
        self.scanned.load(Ordering::Relaxed)
    }
}

/// Phase machine for the duplicate scan. Guarded by the engine's state mutex.
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    pub phase: ScanPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub total_count: u64,
    pub scanned_count: u64,
    pub error_message: Option<String>,
    generation: u64,
    run: Option<Arc<ScanRun>>,
    pub worker: Option<JoinHandle<()>>,
}

impl ScanState {
    /// Whether the running scan has outlived `timeout` and may be superseded.
    pub fn is_stuck(&self, timeout: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(timeout) = timeout else {
            return false;
        };
        match self.start_time {
            Some(started) => (now - started)
                .to_std()
                .map(|elapsed| elapsed > timeout)
                .unwrap_or(false),
            None => true,
        }
    }

    /// Enter `scanning` with fresh counters. Any previous run is cancelled and orphaned.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Arc<ScanRun> {
        if let Some(previous) = self.run.take() {
            previous.cancel();
        }
        self.generation += 1;
        let run = Arc::new(ScanRun::new(self.generation));
        self.phase = ScanPhase::Scanning;
        self.start_time = Some(now);
        self.total_count = 0;
        self.scanned_count = 0;
        self.error_message = None;
        self.run = Some(Arc::clone(&run));
        run
    }

    /// True while `run` is still the scan this state is tracking.
    pub fn owns(&self, run: &ScanRun) -> bool {
        self.run_generation() == Some(run.generation)
    }

    /// Generation of the tracked run, if one is in flight.
    pub fn run_generation(&self) -> Option<u64> {
        self.run.as_ref().map(|run| run.generation)
    }

    fn settle(&mut self, phase: ScanPhase) {
        if let Some(run) = self.run.take() {
            self.total_count = run.total();
            self.scanned_count = run.scanned();
        }
        self.phase = phase;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.settle(ScanPhase::Completed);
        self.last_scan_time = Some(now);
        self.error_message = None;
    }

    pub fn fail(&mut self, message: String) {
        self.settle(ScanPhase::Error);
        self.error_message = Some(message);
    }

    /// Cancel the running scan, if any. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        if self.phase != ScanPhase::Scanning {
            return false;
        }
        if let Some(run) = self.run.as_ref() {
            run.cancel();
        }
        self.settle(ScanPhase::Idle);
        true
    }

    /// Back to a fresh idle state. Only valid when no scan is running.
    pub fn reset(&mut self) {
        self.phase = ScanPhase::Idle;
        self.start_time = None;
        self.last_scan_time = None;
        self.total_count = 0;
        self.scanned_count = 0;
        self.error_message = None;
    }

    /// Phase, timing and progress fields; duplicate totals are filled in by the caller.
    pub fn snapshot(&self) -> DuplicateStats {
        let (total_count, scanned_count) = match &self.run {
            Some(run) => (run.total(), run.scanned()),
            None => (self.total_count, self.scanned_count),
        };
        DuplicateStats {
            phase: self.phase,
            last_scan_time: self.last_scan_time,
            start_time: self.start_time,
            total_count,
            scanned_count,
            duplicate_group_count: 0,
            duplicate_file_count: 0,
            savable_size: 0,
            error_message: self.error_message.clone(),
        }
    }
}
