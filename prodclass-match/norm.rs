use prodclass_core::{MatcherKind, ScanConfig};

/// Distance used to compare two descriptor rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Norm {
    /// Number of differing bits
    Hamming,
    /// Euclidean distance over `f32` components
    L2,
}

impl Norm {
    /// Picks the norm implied by the matcher backend and descriptor kind
    pub fn resolve(config: &ScanConfig) -> Self {
        match config.matcher {
            MatcherKind::BruteForce if config.uses_hamming() => Norm::Hamming,
            MatcherKind::BruteForce | MatcherKind::Flann => Norm::L2,
        }
    }
}

#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[inline]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Smallest and second smallest distance seen in a k=2 search
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Neighbors {
    pub nearest: Option<f32>,
    pub second: Option<f32>,
}

/// Single pass k=2 nearest neighbour selection.
///
/// A distance equal to the current nearest becomes the second nearest, so two
/// identical candidates always produce `nearest == second`. Non-finite
/// distances are not candidates.
pub fn two_nearest<I: IntoIterator<Item = f32>>(distances: I) -> Neighbors {
    let mut n = Neighbors::default();
    for d in distances.into_iter().filter(|d| d.is_finite()) {
        match n.nearest {
            Some(best) if d < best => {
                n.second = Some(best);
                n.nearest = Some(d);
            }
            Some(_) => {
                if n.second.map_or(true, |s| d < s) {
                    n.second = Some(d);
                }
            }
            None => n.nearest = Some(d),
        }
    }
    n
}

/// Lowe's ratio test: the nearest match must be clearly better than the runner-up
#[inline]
pub fn passes_ratio_test(nearest: f32, second: f32, ratio: f32) -> bool {
    nearest < ratio * second
}
