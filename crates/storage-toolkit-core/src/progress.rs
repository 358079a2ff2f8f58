/// Trait for reporting duplicate scan progress.
///
/// The CLI implements it with indicatif; the HTTP service polls `ScanEngine::stats` instead.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _total_objects: u64) {}
    fn on_scan_progress(&self, _scanned: u64, _total: u64) {}
    fn on_scan_complete(&self, _duplicate_groups: usize, _duration_secs: f64) {}
    fn on_scan_failed(&self, _message: &str) {}
    fn on_scan_cancelled(&self) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
