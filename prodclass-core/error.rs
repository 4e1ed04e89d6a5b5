/// Errors raised while building or validating a [`ScanConfig`](crate::ScanConfig).
///
/// These are setup errors: they surface before any scan starts and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown matcher type: {0} (expected MAT_BF or MAT_FLANN)")]
    UnknownMatcher(String),

    #[error("Unknown selector type: {0} (expected SEL_NN or SEL_KNN)")]
    UnknownSelector(String),

    #[error("Unknown descriptor kind: {0} (expected DES_BINARY or DES_HOG)")]
    UnknownDescriptorKind(String),

    #[error("Unknown detector type: {0}")]
    UnknownDetector(String),

    #[error("Unknown descriptor type: {0}")]
    UnknownDescriptor(String),

    #[error("Invalid ratio threshold: {0} (must be in (0, 1])")]
    InvalidRatio(f32),

    #[error("Invalid rejection threshold: {0} (must be finite and >= 0)")]
    InvalidRejectThreshold(f64),

    #[error("Invalid worker count: {0} (must be >= 1)")]
    InvalidWorkerCount(usize),

    #[error("Descriptor {descriptor} produces {actual} descriptors but matcher expects {expected}")]
    EncodingMismatch {
        descriptor: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Configuration I/O error: {0}")]
    Io(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Problems with a single feature set.
///
/// During a scan these never propagate to the caller; the offending catalog
/// entry is skipped instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureError {
    #[error("Keypoint count {keypoints} does not match descriptor row count {rows}")]
    RowCountMismatch { keypoints: usize, rows: usize },

    #[error("Descriptor matrix is empty")]
    EmptyDescriptors,

    #[error("Descriptor width mismatch: query has {query} columns, reference has {reference}")]
    WidthMismatch { query: usize, reference: usize },

    #[error("Hamming distance requires binary descriptors")]
    HammingOnReal,

    #[error("Descriptor buffer length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidBufferLength { expected_len: usize, actual_len: usize },

    #[error("Descriptor dimensions {rows}x{cols} overflow the addressable buffer size")]
    DimensionOverflow { rows: usize, cols: usize },
}

pub type FeatureResult<T> = Result<T, FeatureError>;
