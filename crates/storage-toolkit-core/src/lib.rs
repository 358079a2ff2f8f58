pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod hasher;
pub mod model;
pub mod progress;
pub mod scanner;
pub mod statistics;
pub mod storage;

pub use config::AppConfig;
pub use engine::ScanEngine;
pub use error::Error;
pub use fingerprint::FingerprintIndex;
pub use progress::{ProgressReporter, SilentReporter};
pub use statistics::StatisticsAggregator;
pub use storage::{CatalogStore, MemoryStore, ObjectStore};
