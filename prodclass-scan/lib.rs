//! Parallel best-match search over a product catalog.

pub mod aggregator;
pub mod builder;
pub mod error;
pub mod partition;
pub mod scanner;

pub use aggregator::{Candidate, ResultAggregator, ScanOutcome, WorkerReport, NO_MATCH_LABEL, NO_MATCH_SCORE};
pub use builder::ScannerBuilder;
pub use error::{ScanError, ScanResult};
pub use partition::partition;
pub use scanner::CatalogScanner;
