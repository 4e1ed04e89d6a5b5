use std::path::Path;

use log::info;
use prodclass_core::{Catalog, ConfigError, ConfigResult, FeatureExtractor, FeatureSet, ScanConfig};
use prodclass_scan::{CatalogScanner, ScanError, ScanOutcome};

pub mod loader;

pub use loader::{load_catalog, load_feature_set, save_feature_set, CatalogError, CatalogResult};
pub use prodclass_core;
pub use prodclass_scan;

/// Setup failures of a [`ProductClassifier`]; classification itself never fails
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type ClassifyResult<T> = Result<T, ClassifyError>;

/// High-level product classifier: a loaded catalog plus a configured scanner
pub struct ProductClassifier {
    catalog: Catalog,
    scanner: CatalogScanner,
}

impl ProductClassifier {
    /// Create a classifier over an already loaded catalog
    pub fn new(catalog: Catalog, config: &ScanConfig) -> ClassifyResult<Self> {
        let scanner = CatalogScanner::new(config)?;
        Ok(Self { catalog, scanner })
    }

    /// Load the catalog stored under `root` and create a classifier for it
    pub fn open<P: AsRef<Path>>(root: P, config: &ScanConfig) -> ClassifyResult<Self> {
        let catalog = load_catalog(root.as_ref())?;
        Self::new(catalog, config)
    }

    /// Identify the product in one frame's features
    pub fn classify(&self, query: &FeatureSet) -> ScanOutcome {
        self.scanner.scan(query, &self.catalog)
    }

    /// Extract features from a grayscale frame and classify them
    pub fn classify_image<E: FeatureExtractor>(
        &self,
        extractor: &E,
        gray: &[u8],
        width: usize,
        height: usize,
    ) -> ScanOutcome {
        let query = extractor.extract(gray, width, height);
        info!(
            "Extracted {} {} descriptors from {}x{} frame",
            query.keypoint_count(),
            extractor.encoding(),
            width,
            height
        );
        self.classify(&query)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn scanner(&self) -> &CatalogScanner {
        &self.scanner
    }
}

/// Command-line overrides applied on top of a base configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub matcher: Option<String>,
    pub selector: Option<String>,
    pub descriptor_kind: Option<String>,
    pub detector: Option<String>,
    pub descriptor: Option<String>,
    pub workers: Option<usize>,
    pub ratio_threshold: Option<f32>,
    pub reject_threshold: Option<f64>,
}

impl ConfigOverrides {
    /// Parse every given name and return the validated configuration
    pub fn apply(&self, mut config: ScanConfig) -> ConfigResult<ScanConfig> {
        if let Some(name) = &self.matcher {
            config.matcher = name.parse()?;
        }
        if let Some(name) = &self.selector {
            config.selector = name.parse()?;
        }
        if let Some(name) = &self.descriptor_kind {
            config.descriptor_kind = name.parse()?;
        }
        if let Some(name) = &self.detector {
            config.detector = Some(name.parse()?);
        }
        if let Some(name) = &self.descriptor {
            config.descriptor = Some(name.parse()?);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ratio) = self.ratio_threshold {
            config.ratio_threshold = ratio;
        }
        if let Some(threshold) = self.reject_threshold {
            config.reject_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Console lines for one classified frame, timed by the scan itself
pub fn frame_report(outcome: &ScanOutcome) -> String {
    format!(
        "Product: {}\nScore: {}\nProduct classification elapsed time in {} s",
        outcome.label(),
        outcome.score,
        outcome.elapsed.as_secs_f64()
    )
}

/// Load a configuration file, choosing the format by extension
pub fn load_config(path: &Path) -> ConfigResult<ScanConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ScanConfig::load_json(path),
        _ => ScanConfig::load_toml(path),
    }
}
