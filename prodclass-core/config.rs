use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::feature::DescriptorEncoding;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nearest-neighbour search backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatcherKind {
    /// Exhaustive search with the norm implied by the descriptor kind
    #[cfg_attr(feature = "serde", serde(rename = "MAT_BF"))]
    BruteForce,
    /// L2 search over descriptors converted to `f32`
    #[cfg_attr(feature = "serde", serde(rename = "MAT_FLANN"))]
    Flann,
}

/// Rule deciding which neighbours count as matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectorKind {
    /// Keep the single nearest neighbour of every query descriptor
    #[cfg_attr(feature = "serde", serde(rename = "SEL_NN"))]
    NearestNeighbor,
    /// k=2 search followed by the distance ratio test
    #[cfg_attr(feature = "serde", serde(rename = "SEL_KNN"))]
    KNearest,
}

/// Descriptor family the matcher should assume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DescriptorKind {
    #[cfg_attr(feature = "serde", serde(rename = "DES_BINARY"))]
    Binary,
    /// Gradient histogram style real-valued descriptors
    #[cfg_attr(feature = "serde", serde(rename = "DES_HOG"))]
    Real,
}

impl DescriptorKind {
    pub fn encoding(self) -> DescriptorEncoding {
        match self {
            DescriptorKind::Binary => DescriptorEncoding::Binary,
            DescriptorKind::Real => DescriptorEncoding::Real,
        }
    }
}

/// Keypoint detector used by the external feature extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum DetectorAlgorithm {
    ShiTomasi,
    Harris,
    Fast,
    Brisk,
    Orb,
    Akaze,
    Sift,
}

/// Descriptor used by the external feature extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum DescriptorAlgorithm {
    Brief,
    Orb,
    Freak,
    Akaze,
    Sift,
    Brisk,
}

impl DescriptorAlgorithm {
    /// Encoding of the descriptors this algorithm emits
    pub fn encoding(self) -> DescriptorEncoding {
        match self {
            DescriptorAlgorithm::Sift => DescriptorEncoding::Real,
            DescriptorAlgorithm::Brief
            | DescriptorAlgorithm::Orb
            | DescriptorAlgorithm::Freak
            | DescriptorAlgorithm::Akaze
            | DescriptorAlgorithm::Brisk => DescriptorEncoding::Binary,
        }
    }
}

macro_rules! named_variants {
    ($ty:ident, $err:ident, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical configuration name
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ConfigError::$err(other.to_string())),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_variants!(MatcherKind, UnknownMatcher, {
    BruteForce => "MAT_BF",
    Flann => "MAT_FLANN",
});

named_variants!(SelectorKind, UnknownSelector, {
    NearestNeighbor => "SEL_NN",
    KNearest => "SEL_KNN",
});

named_variants!(DescriptorKind, UnknownDescriptorKind, {
    Binary => "DES_BINARY",
    Real => "DES_HOG",
});

named_variants!(DetectorAlgorithm, UnknownDetector, {
    ShiTomasi => "SHITOMASI",
    Harris => "HARRIS",
    Fast => "FAST",
    Brisk => "BRISK",
    Orb => "ORB",
    Akaze => "AKAZE",
    Sift => "SIFT",
});

named_variants!(DescriptorAlgorithm, UnknownDescriptor, {
    Brief => "BRIEF",
    Orb => "ORB",
    Freak => "FREAK",
    Akaze => "AKAZE",
    Sift => "SIFT",
    Brisk => "BRISK",
});

/// Lowe's distance ratio for the k=2 selector
pub const DEFAULT_RATIO_THRESHOLD: f32 = 0.8;

/// Best scores below this are reported as "no product"
pub const DEFAULT_REJECT_THRESHOLD: f64 = 0.05;

/// Number of scan workers when none is configured
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Complete matching and scanning configuration.
///
/// Built once at startup and shared by reference; nothing mutates it after
/// [`ScanConfig::validate`] has passed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanConfig {
    pub matcher: MatcherKind,
    pub selector: SelectorKind,
    pub descriptor_kind: DescriptorKind,
    pub ratio_threshold: f32,
    pub reject_threshold: f64,
    pub workers: usize,
    /// Detector the catalog and queries were extracted with
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub detector: Option<DetectorAlgorithm>,
    /// Descriptor the catalog and queries were extracted with
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub descriptor: Option<DescriptorAlgorithm>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherKind::BruteForce,
            selector: SelectorKind::KNearest,
            descriptor_kind: DescriptorKind::Binary,
            ratio_threshold: DEFAULT_RATIO_THRESHOLD,
            reject_threshold: DEFAULT_REJECT_THRESHOLD,
            workers: default_workers(),
            detector: None,
            descriptor: None,
        }
    }
}

impl ScanConfig {
    /// Configuration for real-valued descriptors matched through the FLANN path
    pub fn flann_preset() -> Self {
        Self {
            matcher: MatcherKind::Flann,
            descriptor_kind: DescriptorKind::Real,
            detector: Some(DetectorAlgorithm::Sift),
            descriptor: Some(DescriptorAlgorithm::Sift),
            ..Self::default()
        }
    }

    /// Builds a configuration from the textual algorithm names
    pub fn from_names(matcher: &str, selector: &str, descriptor_kind: &str) -> ConfigResult<Self> {
        let config = Self {
            matcher: matcher.parse()?,
            selector: selector.parse()?,
            descriptor_kind: descriptor_kind.parse()?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// True when descriptors are compared bitwise
    pub fn uses_hamming(&self) -> bool {
        self.matcher == MatcherKind::BruteForce && self.descriptor_kind == DescriptorKind::Binary
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return Err(ConfigError::InvalidRatio(self.ratio_threshold));
        }
        if !self.reject_threshold.is_finite() || self.reject_threshold < 0.0 {
            return Err(ConfigError::InvalidRejectThreshold(self.reject_threshold));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.workers));
        }
        if let Some(descriptor) = self.descriptor {
            if self.uses_hamming() && descriptor.encoding() != DescriptorEncoding::Binary {
                return Err(ConfigError::EncodingMismatch {
                    descriptor: descriptor.to_string(),
                    expected: self.descriptor_kind.encoding().to_string(),
                    actual: descriptor.encoding().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "ScanConfig: matcher={}, selector={}, descriptor_kind={}, ratio={:.2}, reject<{:.3}, workers={}",
            self.matcher,
            self.selector,
            self.descriptor_kind,
            self.ratio_threshold,
            self.reject_threshold,
            self.workers
        )
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> ConfigResult<Self> {
        Self::from_json(&read_config_file(path.as_ref())?)
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> ConfigResult<Self> {
        Self::from_toml(&read_config_file(path.as_ref())?)
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> ConfigResult<()> {
        write_config_file(path.as_ref(), &self.to_json()?)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> ConfigResult<()> {
        write_config_file(path.as_ref(), &self.to_toml()?)
    }
}

#[cfg(feature = "serde")]
fn read_config_file(path: &std::path::Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
}

#[cfg(feature = "serde")]
fn write_config_file(path: &std::path::Path, contents: &str) -> ConfigResult<()> {
    std::fs::write(path, contents).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("MAT_BF".parse::<MatcherKind>(), Ok(MatcherKind::BruteForce));
        assert_eq!("MAT_FLANN".parse::<MatcherKind>(), Ok(MatcherKind::Flann));
        assert_eq!("SEL_NN".parse::<SelectorKind>(), Ok(SelectorKind::NearestNeighbor));
        assert_eq!("SEL_KNN".parse::<SelectorKind>(), Ok(SelectorKind::KNearest));
        assert_eq!("DES_HOG".parse::<DescriptorKind>(), Ok(DescriptorKind::Real));
        assert_eq!("SHITOMASI".parse::<DetectorAlgorithm>(), Ok(DetectorAlgorithm::ShiTomasi));
        assert_eq!("FREAK".parse::<DescriptorAlgorithm>(), Ok(DescriptorAlgorithm::Freak));
    }

    #[test]
    fn test_unknown_names_fail() {
        assert_eq!(
            "MAT_KD".parse::<MatcherKind>(),
            Err(ConfigError::UnknownMatcher("MAT_KD".to_string()))
        );
        assert!(matches!(
            "SEL_ALL".parse::<SelectorKind>(),
            Err(ConfigError::UnknownSelector(_))
        ));
        assert!(matches!(
            "orb".parse::<DescriptorAlgorithm>(),
            Err(ConfigError::UnknownDescriptor(_))
        ));
        assert!(ScanConfig::from_names("MAT_BF", "SEL_KNN", "DES_FLOAT").is_err());
    }

    #[test]
    fn test_display_round_trips_name() {
        for kind in [MatcherKind::BruteForce, MatcherKind::Flann] {
            assert_eq!(kind.to_string().parse::<MatcherKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_default_is_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.uses_hamming());
        assert!(config.workers >= 1);
        assert!(ScanConfig::flann_preset().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ScanConfig::default();
        config.ratio_threshold = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRatio(_))));

        let mut config = ScanConfig::default();
        config.reject_threshold = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRejectThreshold(_))));

        let config = ScanConfig::default().with_workers(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidWorkerCount(0)));
    }

    #[test]
    fn test_hamming_on_sift_rejected() {
        let mut config = ScanConfig::default();
        config.descriptor = Some(DescriptorAlgorithm::Sift);
        assert!(matches!(config.validate(), Err(ConfigError::EncodingMismatch { .. })));

        config.matcher = MatcherKind::Flann;
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_uses_config_names() {
        let config = ScanConfig::flann_preset().with_workers(3);
        let text = config.to_toml().unwrap();
        assert!(text.contains("MAT_FLANN"));
        assert!(text.contains("DES_HOG"));
        assert_eq!(ScanConfig::from_toml(&text).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ScanConfig::from_json(r#"{ "selector": "SEL_NN", "workers": 2 }"#).unwrap();
        assert_eq!(config.selector, SelectorKind::NearestNeighbor);
        assert_eq!(config.matcher, MatcherKind::BruteForce);
        assert_eq!(config.workers, 2);

        assert!(ScanConfig::from_json(r#"{ "matcher": "MAT_XYZ" }"#).is_err());
        assert!(ScanConfig::from_json(r#"{ "workers": 0 }"#).is_err());
    }
}
