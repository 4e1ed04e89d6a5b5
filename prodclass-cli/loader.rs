//! On-disk catalog layout.
//!
//! ```text
//! <root>/keypoints/<id>.txt     one "x y size response octave angle" line per keypoint
//! <root>/descriptors/<id>.json  {"encoding": "binary", "rows": R, "cols": C, "data": [...]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use prodclass_core::{Catalog, CatalogEntry, DescriptorEncoding, DescriptorMatrix, FeatureError, FeatureSet, Keypoint};
use serde::{Deserialize, Serialize};

pub const KEYPOINT_DIR: &str = "keypoints";
pub const DESCRIPTOR_DIR: &str = "descriptors";
pub const KEYPOINT_EXT: &str = "txt";
pub const DESCRIPTOR_EXT: &str = "json";

/// Failures while reading or writing catalog and query files.
///
/// Every variant names the offending path; a single bad file fails the whole load.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Keypoint {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid descriptor file {path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: value {value} is not a byte in a binary descriptor")]
    DescriptorValue { path: PathBuf, value: f32 },

    #[error("{path}: {source}")]
    Feature {
        path: PathBuf,
        #[source]
        source: FeatureError,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError + '_ {
    move |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// JSON form of a descriptor matrix
#[derive(Debug, Serialize, Deserialize)]
struct DescriptorFile {
    encoding: DescriptorEncoding,
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

/// Parses keypoint lines; blank lines are ignored
pub fn parse_keypoints(text: &str, path: &Path) -> CatalogResult<Vec<Keypoint>> {
    let mut keypoints = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fail = |message: String| CatalogError::Keypoint {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            return Err(fail(format!("expected 6 fields, found {}", fields.len())));
        }
        let float = |i: usize| -> CatalogResult<f32> {
            fields[i]
                .parse::<f32>()
                .map_err(|e| fail(format!("field {} ({:?}): {}", i + 1, fields[i], e)))
        };

        keypoints.push(Keypoint {
            x: float(0)?,
            y: float(1)?,
            size: float(2)?,
            response: float(3)?,
            octave: fields[4]
                .parse::<i32>()
                .map_err(|e| fail(format!("field 5 ({:?}): {}", fields[4], e)))?,
            angle: float(5)?,
        });
    }
    Ok(keypoints)
}

pub fn load_keypoints(path: &Path) -> CatalogResult<Vec<Keypoint>> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    parse_keypoints(&text, path)
}

pub fn load_descriptors(path: &Path) -> CatalogResult<DescriptorMatrix> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let file: DescriptorFile = serde_json::from_str(&text).map_err(|source| CatalogError::Descriptor {
        path: path.to_path_buf(),
        source,
    })?;

    let matrix = match file.encoding {
        DescriptorEncoding::Real => DescriptorMatrix::real(file.rows, file.cols, file.data),
        DescriptorEncoding::Binary => {
            let bytes = file
                .data
                .iter()
                .map(|&v| {
                    if v.fract() == 0.0 && (0.0..=255.0).contains(&v) {
                        Ok(v as u8)
                    } else {
                        Err(CatalogError::DescriptorValue {
                            path: path.to_path_buf(),
                            value: v,
                        })
                    }
                })
                .collect::<CatalogResult<Vec<u8>>>()?;
            DescriptorMatrix::binary(file.rows, file.cols, bytes)
        }
    };
    matrix.map_err(|source| CatalogError::Feature {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a keypoint file and its descriptor file as one feature set.
///
/// The pair is not validated here; malformed sets are skipped at scan time.
pub fn load_feature_set(keypoints: &Path, descriptors: &Path) -> CatalogResult<FeatureSet> {
    Ok(FeatureSet::new(load_keypoints(keypoints)?, load_descriptors(descriptors)?))
}

/// Writes a feature set in the catalog file format
pub fn save_feature_set(set: &FeatureSet, keypoints: &Path, descriptors: &Path) -> CatalogResult<()> {
    let text: String = set
        .keypoints()
        .iter()
        .map(|k| format!("{} {} {} {} {} {}\n", k.x, k.y, k.size, k.response, k.octave, k.angle))
        .collect();
    fs::write(keypoints, text).map_err(io_error(keypoints))?;

    let matrix = set.descriptors();
    let file = DescriptorFile {
        encoding: matrix.encoding(),
        rows: matrix.rows(),
        cols: matrix.cols(),
        data: matrix.to_real().into_owned(),
    };
    let json = serde_json::to_string(&file).map_err(|source| CatalogError::Descriptor {
        path: descriptors.to_path_buf(),
        source,
    })?;
    fs::write(descriptors, json).map_err(io_error(descriptors))
}

/// Loads every product under `root`, ordered by identifier
pub fn load_catalog(root: &Path) -> CatalogResult<Catalog> {
    let keypoint_dir = root.join(KEYPOINT_DIR);
    let descriptor_dir = root.join(DESCRIPTOR_DIR);

    let mut products: Vec<(String, PathBuf)> = Vec::new();
    for dir_entry in fs::read_dir(&keypoint_dir).map_err(io_error(&keypoint_dir))? {
        let path = dir_entry.map_err(io_error(&keypoint_dir))?.path();
        let is_keypoint_file = path.extension().is_some_and(|ext| ext == KEYPOINT_EXT);
        match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if is_keypoint_file => products.push((stem.to_string(), path.clone())),
            _ => warn!("Ignoring {}", path.display()),
        }
    }
    products.sort_by(|a, b| a.0.cmp(&b.0));

    let entries = products
        .into_iter()
        .map(|(identifier, keypoint_path)| {
            let descriptor_path = descriptor_dir.join(format!("{}.{}", identifier, DESCRIPTOR_EXT));
            let features = load_feature_set(&keypoint_path, &descriptor_path)?;
            Ok(CatalogEntry::new(identifier, features))
        })
        .collect::<CatalogResult<Vec<_>>>()?;

    info!("Loaded {} catalog entries from {}", entries.len(), root.display());
    Ok(Catalog::new(entries))
}
