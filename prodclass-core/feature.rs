use std::borrow::Cow;

use crate::error::{FeatureError, FeatureResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Salient image location with scale, strength and orientation metadata
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood
    pub size: f32,
    pub response: f32,
    /// Pyramid octave the keypoint was extracted from
    pub octave: i32,
    /// Orientation in degrees, -1 when not applicable
    pub angle: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            response: 0.0,
            octave: 0,
            angle: -1.0,
        }
    }
}

/// Numeric encoding of descriptor rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DescriptorEncoding {
    /// Packed bit strings, one byte per 8 bits (BRIEF, ORB, BRISK, ...)
    Binary,
    /// Floating point vectors (SIFT, HOG-like)
    Real,
}

impl std::fmt::Display for DescriptorEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorEncoding::Binary => write!(f, "binary"),
            DescriptorEncoding::Real => write!(f, "real"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DescriptorData {
    Binary(Vec<u8>),
    Real(Vec<f32>),
}

/// Row-major descriptor buffer, one row per keypoint
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorMatrix {
    rows: usize,
    cols: usize,
    data: DescriptorData,
}

impl DescriptorMatrix {
    /// Wraps a binary buffer of `rows * cols` bytes
    pub fn binary(rows: usize, cols: usize, data: Vec<u8>) -> FeatureResult<Self> {
        check_len(rows, cols, data.len())?;
        Ok(Self {
            rows,
            cols,
            data: DescriptorData::Binary(data),
        })
    }

    /// Wraps a real-valued buffer of `rows * cols` floats
    pub fn real(rows: usize, cols: usize, data: Vec<f32>) -> FeatureResult<Self> {
        check_len(rows, cols, data.len())?;
        Ok(Self {
            rows,
            cols,
            data: DescriptorData::Real(data),
        })
    }

    /// Builds a binary matrix from equally sized rows
    pub fn binary_from_rows<R: AsRef<[u8]>>(rows: &[R]) -> FeatureResult<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let data: Vec<u8> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::binary(rows.len(), cols, data)
    }

    /// Builds a real-valued matrix from equally sized rows
    pub fn real_from_rows<R: AsRef<[f32]>>(rows: &[R]) -> FeatureResult<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let data: Vec<f32> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::real(rows.len(), cols, data)
    }

    pub fn empty(encoding: DescriptorEncoding) -> Self {
        let data = match encoding {
            DescriptorEncoding::Binary => DescriptorData::Binary(Vec::new()),
            DescriptorEncoding::Real => DescriptorData::Real(Vec::new()),
        };
        Self { rows: 0, cols: 0, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn encoding(&self) -> DescriptorEncoding {
        match self.data {
            DescriptorData::Binary(_) => DescriptorEncoding::Binary,
            DescriptorData::Real(_) => DescriptorEncoding::Real,
        }
    }

    /// Raw bytes, if the matrix is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.data {
            DescriptorData::Binary(d) => Some(d),
            DescriptorData::Real(_) => None,
        }
    }

    /// Raw floats, if the matrix is real-valued
    pub fn as_real(&self) -> Option<&[f32]> {
        match &self.data {
            DescriptorData::Real(d) => Some(d),
            DescriptorData::Binary(_) => None,
        }
    }

    /// Float view of the buffer.
    ///
    /// Binary matrices are widened byte by byte into a new buffer; real
    /// matrices are borrowed as-is.
    pub fn to_real(&self) -> Cow<'_, [f32]> {
        match &self.data {
            DescriptorData::Real(d) => Cow::Borrowed(d.as_slice()),
            DescriptorData::Binary(d) => Cow::Owned(d.iter().map(|&b| b as f32).collect()),
        }
    }
}

fn check_len(rows: usize, cols: usize, actual_len: usize) -> FeatureResult<()> {
    let expected_len = rows
        .checked_mul(cols)
        .ok_or(FeatureError::DimensionOverflow { rows, cols })?;
    if expected_len != actual_len {
        return Err(FeatureError::InvalidBufferLength {
            expected_len,
            actual_len,
        });
    }
    Ok(())
}

/// Keypoints plus their descriptors for one image.
///
/// Row `i` of the descriptor matrix describes keypoint `i`. Construction does
/// not enforce this; call [`FeatureSet::validate`] where it matters.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    keypoints: Vec<Keypoint>,
    descriptors: DescriptorMatrix,
}

impl FeatureSet {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: DescriptorMatrix) -> Self {
        Self {
            keypoints,
            descriptors,
        }
    }

    pub fn empty(encoding: DescriptorEncoding) -> Self {
        Self::new(Vec::new(), DescriptorMatrix::empty(encoding))
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &DescriptorMatrix {
        &self.descriptors
    }

    pub fn keypoint_count(&self) -> usize {
        self.keypoints.len()
    }

    pub fn encoding(&self) -> DescriptorEncoding {
        self.descriptors.encoding()
    }

    /// Checks that the set is usable as a match reference
    pub fn validate(&self) -> FeatureResult<()> {
        if self.descriptors.is_empty() {
            return Err(FeatureError::EmptyDescriptors);
        }
        if self.keypoints.len() != self.descriptors.rows() {
            return Err(FeatureError::RowCountMismatch {
                keypoints: self.keypoints.len(),
                rows: self.descriptors.rows(),
            });
        }
        Ok(())
    }
}

/// Detector plus descriptor pipeline producing a [`FeatureSet`] from a grayscale image.
///
/// Implementations live outside this workspace; the engine only needs the
/// resulting feature set and the encoding of its descriptors.
pub trait FeatureExtractor {
    /// Encoding of the descriptors this extractor produces
    fn encoding(&self) -> DescriptorEncoding;

    /// Extracts features from a row-major 8-bit grayscale image
    fn extract(&self, gray: &[u8], width: usize, height: usize) -> FeatureSet;
}
