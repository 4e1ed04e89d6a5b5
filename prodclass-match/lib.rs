//! Similarity scoring between two feature sets.

pub mod matcher;
pub mod norm;

pub use matcher::{match_feature_sets, DescriptorMatcher, MatchResult, PreparedQuery};
pub use norm::{passes_ratio_test, two_nearest, Neighbors, Norm};
