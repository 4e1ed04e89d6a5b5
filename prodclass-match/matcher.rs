use std::borrow::Cow;

use prodclass_core::{
    DescriptorKind, DescriptorMatrix, FeatureError, FeatureResult, FeatureSet, MatcherKind, ScanConfig,
    SelectorKind, DEFAULT_RATIO_THRESHOLD,
};

use crate::norm::{hamming, l2, passes_ratio_test, two_nearest, Neighbors, Norm};

/// Outcome of matching a query against one reference feature set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Query descriptors that survived selection
    pub matched_pairs: usize,
    /// Keypoints in the reference set
    pub reference_keypoints: usize,
}

impl MatchResult {
    /// `matched_pairs / reference_keypoints`, or `None` for a reference without keypoints
    pub fn score(&self) -> Option<f64> {
        if self.reference_keypoints == 0 {
            return None;
        }
        Some(self.matched_pairs as f64 / self.reference_keypoints as f64)
    }
}

/// Descriptor rows stored the way the active norm consumes them
#[derive(Debug, Clone)]
enum Rows<'a> {
    Binary(&'a [u8]),
    Real(Cow<'a, [f32]>),
}

impl<'a> Rows<'a> {
    fn prepare(norm: Norm, matrix: &'a DescriptorMatrix) -> FeatureResult<Self> {
        match norm {
            Norm::Hamming => matrix.as_binary().map(Rows::Binary).ok_or(FeatureError::HammingOnReal),
            Norm::L2 => Ok(Rows::Real(matrix.to_real())),
        }
    }
}

/// Query descriptors converted once for repeated matching
#[derive(Debug, Clone)]
pub struct PreparedQuery<'q> {
    rows: Rows<'q>,
    row_count: usize,
    cols: usize,
}

impl PreparedQuery<'_> {
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// Brute force descriptor matcher with NN or ratio-test selection.
///
/// Matching is a pure function of the two feature sets; one matcher can be
/// shared by any number of threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorMatcher {
    norm: Norm,
    selector: SelectorKind,
    ratio_threshold: f32,
}

impl Default for DescriptorMatcher {
    fn default() -> Self {
        Self::for_kind(DescriptorKind::Binary)
    }
}

impl DescriptorMatcher {
    pub fn new(norm: Norm, selector: SelectorKind, ratio_threshold: f32) -> Self {
        Self {
            norm,
            selector,
            ratio_threshold,
        }
    }

    /// Brute force ratio-test matcher for the given descriptor kind
    pub fn for_kind(kind: DescriptorKind) -> Self {
        let config = ScanConfig {
            matcher: MatcherKind::BruteForce,
            selector: SelectorKind::KNearest,
            descriptor_kind: kind,
            ratio_threshold: DEFAULT_RATIO_THRESHOLD,
            ..ScanConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(Norm::resolve(config), config.selector, config.ratio_threshold)
    }

    pub fn norm(&self) -> Norm {
        self.norm
    }

    pub fn selector(&self) -> SelectorKind {
        self.selector
    }

    pub fn ratio_threshold(&self) -> f32 {
        self.ratio_threshold
    }

    /// Converts the query descriptors into the storage the norm needs
    pub fn prepare_query<'q>(&self, query: &'q FeatureSet) -> FeatureResult<PreparedQuery<'q>> {
        let matrix = query.descriptors();
        Ok(PreparedQuery {
            rows: Rows::prepare(self.norm, matrix)?,
            row_count: matrix.rows(),
            cols: matrix.cols(),
        })
    }

    /// Matches a prepared query against one reference set.
    ///
    /// Fails when the reference is malformed or incompatible with the query;
    /// callers scanning a catalog treat that as "no candidate".
    pub fn match_prepared(&self, query: &PreparedQuery<'_>, reference: &FeatureSet) -> FeatureResult<MatchResult> {
        reference.validate()?;
        let ref_matrix = reference.descriptors();
        let cols = ref_matrix.cols();
        if cols == 0 {
            return Err(FeatureError::EmptyDescriptors);
        }

        let reference_keypoints = reference.keypoint_count();
        if query.row_count == 0 {
            return Ok(MatchResult {
                matched_pairs: 0,
                reference_keypoints,
            });
        }
        if query.cols != cols {
            return Err(FeatureError::WidthMismatch {
                query: query.cols,
                reference: cols,
            });
        }

        let matched_pairs = match (&query.rows, Rows::prepare(self.norm, ref_matrix)?) {
            (Rows::Binary(q), Rows::Binary(r)) => self.count_accepted(*q, r, cols, |a, b| hamming(a, b) as f32),
            (Rows::Real(q), Rows::Real(r)) => self.count_accepted(&**q, &*r, cols, l2),
            _ => return Err(FeatureError::HammingOnReal),
        };

        Ok(MatchResult {
            matched_pairs,
            reference_keypoints,
        })
    }

    /// Prepares the query and matches it against one reference set
    pub fn match_sets(&self, query: &FeatureSet, reference: &FeatureSet) -> FeatureResult<MatchResult> {
        let prepared = self.prepare_query(query)?;
        self.match_prepared(&prepared, reference)
    }

    fn count_accepted<T, D>(&self, query: &[T], reference: &[T], cols: usize, distance: D) -> usize
    where
        D: Fn(&[T], &[T]) -> f32,
    {
        let reference_rows = reference.len() / cols;
        if self.selector == SelectorKind::KNearest && reference_rows < 2 {
            return 0;
        }

        query
            .chunks_exact(cols)
            .filter(|&q| {
                let neighbors = two_nearest(reference.chunks_exact(cols).map(|r| distance(q, r)));
                self.accepts(neighbors)
            })
            .count()
    }

    fn accepts(&self, neighbors: Neighbors) -> bool {
        match (self.selector, neighbors.nearest, neighbors.second) {
            (SelectorKind::NearestNeighbor, Some(_), _) => true,
            (SelectorKind::KNearest, Some(nearest), Some(second)) => {
                passes_ratio_test(nearest, second, self.ratio_threshold)
            }
            _ => false,
        }
    }
}

/// Brute force k=2 ratio-test matching with the norm implied by `kind`
pub fn match_feature_sets(query: &FeatureSet, reference: &FeatureSet, kind: DescriptorKind) -> FeatureResult<MatchResult> {
    DescriptorMatcher::for_kind(kind).match_sets(query, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodclass_core::{DescriptorEncoding, Keypoint};

    fn keypoints(n: usize) -> Vec<Keypoint> {
        (0..n).map(|i| Keypoint::new(i as f32, 0.0, 5.0)).collect()
    }

    fn binary_set(rows: &[[u8; 2]]) -> FeatureSet {
        FeatureSet::new(keypoints(rows.len()), DescriptorMatrix::binary_from_rows(rows).unwrap())
    }

    fn real_set(rows: &[[f32; 2]]) -> FeatureSet {
        FeatureSet::new(keypoints(rows.len()), DescriptorMatrix::real_from_rows(rows).unwrap())
    }

    #[test]
    fn test_score_formula() {
        let result = MatchResult {
            matched_pairs: 9,
            reference_keypoints: 10,
        };
        assert_eq!(result.score(), Some(0.9));

        let empty = MatchResult {
            matched_pairs: 0,
            reference_keypoints: 0,
        };
        assert_eq!(empty.score(), None);
    }

    #[test]
    fn test_distinct_descriptors_match() {
        let reference = binary_set(&[[0x00, 0x00], [0xFF, 0xFF], [0x0F, 0xF0]]);
        let query = binary_set(&[[0x00, 0x01], [0xFF, 0xFE]]);

        let result = match_feature_sets(&query, &reference, DescriptorKind::Binary).unwrap();
        assert_eq!(result.matched_pairs, 2);
        assert_eq!(result.reference_keypoints, 3);
    }

    #[test]
    fn test_ambiguous_descriptor_rejected() {
        // Query row sits exactly between two references
        let reference = binary_set(&[[0x00, 0x00], [0x03, 0x00]]);
        let query = binary_set(&[[0x01, 0x00]]);

        let result = match_feature_sets(&query, &reference, DescriptorKind::Binary).unwrap();
        assert_eq!(result.matched_pairs, 0);
    }

    #[test]
    fn test_single_reference_row_yields_no_ratio_matches() {
        let reference = binary_set(&[[0x00, 0x00]]);
        let query = binary_set(&[[0x00, 0x00]]);

        let result = match_feature_sets(&query, &reference, DescriptorKind::Binary).unwrap();
        assert_eq!(result.matched_pairs, 0);
        assert_eq!(result.score(), Some(0.0));

        let nn = DescriptorMatcher::new(Norm::Hamming, SelectorKind::NearestNeighbor, 0.8);
        assert_eq!(nn.match_sets(&query, &reference).unwrap().matched_pairs, 1);
    }

    #[test]
    fn test_nearest_neighbor_accepts_every_query_row() {
        let reference = binary_set(&[[0x00, 0x00], [0x03, 0x00]]);
        let query = binary_set(&[[0x01, 0x00], [0xAA, 0xAA], [0x00, 0x00]]);
        let nn = DescriptorMatcher::new(Norm::Hamming, SelectorKind::NearestNeighbor, 0.8);

        assert_eq!(nn.match_sets(&query, &reference).unwrap().matched_pairs, 3);
    }

    #[test]
    fn test_l2_on_real_descriptors() {
        let reference = real_set(&[[0.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        let query = real_set(&[[0.5, 0.5], [5.0, 5.0]]);

        let result = match_feature_sets(&query, &reference, DescriptorKind::Real).unwrap();
        // (5, 5) is equidistant from all three references
        assert_eq!(result.matched_pairs, 1);
    }

    #[test]
    fn test_nan_reference_row_not_a_candidate() {
        let reference = real_set(&[[f32::NAN, 0.0], [0.0, 0.0], [10.0, 10.0]]);
        let query = real_set(&[[0.5, 0.5]]);

        let knn = match_feature_sets(&query, &reference, DescriptorKind::Real).unwrap();
        assert_eq!(knn.matched_pairs, 1);

        let nan_only = real_set(&[[f32::NAN, f32::NAN], [f32::NAN, 1.0]]);
        let nn = DescriptorMatcher::new(Norm::L2, SelectorKind::NearestNeighbor, 0.8);
        assert_eq!(nn.match_sets(&query, &nan_only).unwrap().matched_pairs, 0);
    }

    #[test]
    fn test_flann_converts_binary_to_float() {
        let config = ScanConfig {
            matcher: MatcherKind::Flann,
            ..ScanConfig::default()
        };
        let matcher = DescriptorMatcher::from_config(&config);
        assert_eq!(matcher.norm(), Norm::L2);

        let reference = binary_set(&[[0, 0], [200, 200]]);
        let query = binary_set(&[[10, 10]]);
        let result = matcher.match_sets(&query, &reference).unwrap();
        assert_eq!(result.matched_pairs, 1);

        // Mixed encodings meet in float space
        let real_reference = real_set(&[[0.0, 0.0], [200.0, 200.0]]);
        assert_eq!(matcher.match_sets(&query, &real_reference).unwrap().matched_pairs, 1);
    }

    #[test]
    fn test_hamming_on_real_reference_fails() {
        let reference = real_set(&[[0.0, 0.0], [1.0, 1.0]]);
        let query = binary_set(&[[0, 0]]);

        let result = match_feature_sets(&query, &reference, DescriptorKind::Binary);
        assert_eq!(result, Err(FeatureError::HammingOnReal));
    }

    #[test]
    fn test_malformed_reference_fails() {
        let query = binary_set(&[[0, 0]]);

        let mismatched = FeatureSet::new(
            keypoints(4),
            DescriptorMatrix::binary_from_rows(&[[0u8, 0], [1, 1]]).unwrap(),
        );
        assert!(matches!(
            match_feature_sets(&query, &mismatched, DescriptorKind::Binary),
            Err(FeatureError::RowCountMismatch { .. })
        ));

        let empty = FeatureSet::empty(DescriptorEncoding::Binary);
        assert_eq!(
            match_feature_sets(&query, &empty, DescriptorKind::Binary),
            Err(FeatureError::EmptyDescriptors)
        );
    }

    #[test]
    fn test_width_mismatch_fails() {
        let reference = binary_set(&[[0, 0], [1, 1]]);
        let query = FeatureSet::new(keypoints(1), DescriptorMatrix::binary_from_rows(&[[0u8, 0, 0]]).unwrap());

        assert_eq!(
            match_feature_sets(&query, &reference, DescriptorKind::Binary),
            Err(FeatureError::WidthMismatch { query: 3, reference: 2 })
        );
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let reference = binary_set(&[[0, 0], [1, 1]]);
        let query = FeatureSet::empty(DescriptorEncoding::Binary);

        let result = match_feature_sets(&query, &reference, DescriptorKind::Binary).unwrap();
        assert_eq!(result.matched_pairs, 0);
        assert_eq!(result.score(), Some(0.0));
    }

    #[test]
    fn test_prepared_query_reused() {
        let matcher = DescriptorMatcher::default();
        let query = binary_set(&[[0x00, 0x01], [0xFF, 0xFE]]);
        let prepared = matcher.prepare_query(&query).unwrap();
        assert_eq!(prepared.row_count(), 2);
        assert_eq!(prepared.cols(), 2);

        let a = binary_set(&[[0x00, 0x00], [0xFF, 0xFF]]);
        let b = binary_set(&[[0x00, 0x00], [0x00, 0x00]]);
        assert_eq!(matcher.match_prepared(&prepared, &a).unwrap().matched_pairs, 2);
        assert_eq!(matcher.match_prepared(&prepared, &b).unwrap().matched_pairs, 0);
    }
}
