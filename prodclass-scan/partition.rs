use std::ops::Range;

/// Splits `[0, catalog_size)` into `workers` contiguous ranges.
///
/// Range `i` covers `floor(i * N / W) .. floor((i + 1) * N / W)` and the last
/// range always ends at `N`. With fewer entries than workers some ranges are
/// empty. A worker count of zero is treated as one.
pub fn partition(catalog_size: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let bound = |i: usize| -> usize {
        if i == workers {
            catalog_size
        } else {
            (i as u128 * catalog_size as u128 / workers as u128) as usize
        }
    };

    (0..workers).map(|i| bound(i)..bound(i + 1)).collect()
}
