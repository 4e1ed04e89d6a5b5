//! Data model and configuration shared by the catalog matching crates.

pub mod catalog;
pub mod config;
pub mod error;
pub mod feature;

pub use catalog::{Catalog, CatalogEntry};
pub use config::{
    default_workers, DescriptorAlgorithm, DescriptorKind, DetectorAlgorithm, MatcherKind, ScanConfig,
    SelectorKind, DEFAULT_RATIO_THRESHOLD, DEFAULT_REJECT_THRESHOLD,
};
pub use error::{ConfigError, ConfigResult, FeatureError, FeatureResult};
pub use feature::{DescriptorEncoding, DescriptorMatrix, FeatureExtractor, FeatureSet, Keypoint};
