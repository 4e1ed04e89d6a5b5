use prodclass_core::{DescriptorAlgorithm, DescriptorKind, DetectorAlgorithm, MatcherKind, ScanConfig, SelectorKind};

use crate::error::ScanResult;
use crate::scanner::CatalogScanner;

/// Fluent API builder for [`CatalogScanner`]
#[derive(Debug, Clone, Default)]
pub struct ScannerBuilder {
    config: ScanConfig,
}

impl ScannerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing configuration
    pub fn from_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Set the nearest-neighbour backend
    pub fn matcher(mut self, matcher: MatcherKind) -> Self {
        self.config.matcher = matcher;
        self
    }

    /// Set the match selection rule
    pub fn selector(mut self, selector: SelectorKind) -> Self {
        self.config.selector = selector;
        self
    }

    /// Set the descriptor kind, which decides the distance norm
    pub fn descriptor_kind(mut self, kind: DescriptorKind) -> Self {
        self.config.descriptor_kind = kind;
        self
    }

    /// Set the ratio used by the k=2 selector
    pub fn ratio_threshold(mut self, ratio: f32) -> Self {
        self.config.ratio_threshold = ratio;
        self
    }

    /// Set the score below which the best match is reported as "none"
    pub fn reject_threshold(mut self, threshold: f64) -> Self {
        self.config.reject_threshold = threshold;
        self
    }

    /// Set the number of scan workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Record the extractor pipeline the catalog was built with
    pub fn extractor(mut self, detector: DetectorAlgorithm, descriptor: DescriptorAlgorithm) -> Self {
        self.config.detector = Some(detector);
        self.config.descriptor = Some(descriptor);
        self
    }

    /// Apply the FLANN preset for real-valued descriptors
    pub fn preset_flann(mut self) -> Self {
        let workers = self.config.workers;
        self.config = ScanConfig::flann_preset().with_workers(workers);
        self
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Convert the builder into a `ScanConfig`
    pub fn to_config(self) -> ScanConfig {
        self.config
    }

    /// Validate the configuration and build the scanner
    pub fn build(self) -> ScanResult<CatalogScanner> {
        CatalogScanner::new(&self.config)
    }
}
