use std::ops::Range;
use std::time::Instant;

use log::{debug, trace, warn};
use prodclass_core::{Catalog, FeatureSet, ScanConfig};
use prodclass_match::{DescriptorMatcher, PreparedQuery};
use rayon::prelude::*;

use crate::aggregator::{ResultAggregator, ScanOutcome, WorkerReport};
use crate::error::ScanResult;
use crate::partition::partition;

/// Matches a query against every catalog entry on a fixed pool of workers.
///
/// Each scan cuts the catalog into one contiguous partition per worker. Workers
/// only touch their own [`WorkerReport`]; the reports are reduced on the
/// calling thread once all of them are back.
pub struct CatalogScanner {
    matcher: DescriptorMatcher,
    aggregator: ResultAggregator,
    workers: usize,
    pool: rayon::ThreadPool,
}

impl CatalogScanner {
    /// Creates a scanner with its own pool of `config.workers` threads
    pub fn new(config: &ScanConfig) -> ScanResult<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("catalog-scan-{}", i))
            .build()?;

        debug!("Catalog scanner ready: {}", config.summary());

        Ok(Self {
            matcher: DescriptorMatcher::from_config(config),
            aggregator: ResultAggregator::new(config.reject_threshold),
            workers: config.workers,
            pool,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn matcher(&self) -> &DescriptorMatcher {
        &self.matcher
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    /// Finds the catalog entry that best matches `query`.
    ///
    /// Never fails: malformed entries are skipped, and a malformed query or an
    /// empty catalog produces a "none" outcome.
    pub fn scan(&self, query: &FeatureSet, catalog: &Catalog) -> ScanOutcome {
        let start = Instant::now();

        if query.keypoint_count() != query.descriptors().rows() {
            warn!(
                "Query has {} keypoints but {} descriptor rows, skipping scan",
                query.keypoint_count(),
                query.descriptors().rows()
            );
            return ScanOutcome::no_match(self.workers, start.elapsed());
        }

        let prepared = match self.matcher.prepare_query(query) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!("Query descriptors unusable: {}", err);
                return ScanOutcome::no_match(self.workers, start.elapsed());
            }
        };

        let ranges = partition(catalog.len(), self.workers);
        let reports: Vec<WorkerReport<'_>> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(worker, range)| self.scan_partition(worker, range, &prepared, catalog))
                .collect()
        });

        let outcome = self.aggregator.aggregate(&reports, start.elapsed());
        debug!("Scan finished: {}", outcome);
        outcome
    }

    /// Sequentially matches one partition, keeping only the local best
    fn scan_partition<'c>(
        &self,
        worker: usize,
        range: Range<usize>,
        query: &PreparedQuery<'_>,
        catalog: &'c Catalog,
    ) -> WorkerReport<'c> {
        let mut report = WorkerReport::new(worker, range.clone());

        for entry in &catalog.entries()[range] {
            match self.matcher.match_prepared(query, entry.features()) {
                Ok(result) => match result.score() {
                    Some(score) => report.observe(entry.identifier(), score),
                    None => {
                        trace!("Skipping {}: no reference keypoints", entry.identifier());
                        report.skip();
                    }
                },
                Err(err) => {
                    trace!("Skipping {}: {}", entry.identifier(), err);
                    report.skip();
                }
            }
        }

        debug!(
            "Worker {} scanned {:?}: {} scored, {} skipped, best {:?}",
            worker, report.range, report.scored, report.skipped, report.best
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodclass_core::{CatalogEntry, DescriptorEncoding, DescriptorMatrix, Keypoint};

    const WIDTH: usize = 16;

    /// Descriptor with a single saturated byte; distinct codes are 8 bits apart per byte
    fn code(i: usize) -> [u8; WIDTH] {
        let mut d = [0u8; WIDTH];
        d[i] = 0xFF;
        d
    }

    fn features(codes: &[usize]) -> FeatureSet {
        let rows: Vec<[u8; WIDTH]> = codes.iter().map(|&c| code(c)).collect();
        let kps = codes.iter().map(|&c| Keypoint::new(c as f32, 0.0, 7.0)).collect();
        FeatureSet::new(kps, DescriptorMatrix::binary_from_rows(&rows).unwrap())
    }

    fn scanner(workers: usize) -> CatalogScanner {
        CatalogScanner::new(&ScanConfig::default().with_workers(workers)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = CatalogScanner::new(&ScanConfig::default().with_workers(0));
        assert!(matches!(result, Err(crate::ScanError::Config(_))));
    }

    #[test]
    fn test_empty_catalog() {
        let outcome = scanner(3).scan(&features(&[0, 1]), &Catalog::default());
        assert_eq!(outcome.label(), "none");
        assert_eq!(outcome.score, crate::NO_MATCH_SCORE);
        assert_eq!(outcome.workers, 3);
        assert_eq!(outcome.entries_scored, 0);
    }

    #[test]
    fn test_malformed_entry_skipped() {
        let broken = FeatureSet::new(
            vec![Keypoint::default(); 5],
            DescriptorMatrix::binary_from_rows(&[code(0), code(1)]).unwrap(),
        );
        let catalog = Catalog::new(vec![
            CatalogEntry::new("broken", broken),
            CatalogEntry::new("empty", FeatureSet::empty(DescriptorEncoding::Binary)),
            CatalogEntry::new("good", features(&[0, 1, 2, 3])),
        ]);

        let outcome = scanner(2).scan(&features(&[0, 1]), &catalog);
        assert_eq!(outcome.label(), "good");
        assert_eq!(outcome.score, 0.5);
        assert_eq!(outcome.entries_scored, 1);
        assert_eq!(outcome.entries_skipped, 2);
    }

    #[test]
    fn test_malformed_query_returns_none() {
        let query = FeatureSet::new(
            vec![Keypoint::default(); 3],
            DescriptorMatrix::binary_from_rows(&[code(0)]).unwrap(),
        );
        let catalog = Catalog::new(vec![CatalogEntry::new("good", features(&[0, 1]))]);

        let outcome = scanner(1).scan(&query, &catalog);
        assert!(!outcome.is_match());
        assert_eq!(outcome.entries_scored, 0);
    }

    #[test]
    fn test_more_workers_than_entries() {
        let catalog = Catalog::new(vec![
            CatalogEntry::new("a", features(&[0, 1])),
            CatalogEntry::new("b", features(&[2, 3, 4, 5])),
        ]);

        let outcome = scanner(8).scan(&features(&[2, 3, 4]), &catalog);
        assert_eq!(outcome.label(), "b");
        assert_eq!(outcome.score, 0.75);
        assert_eq!(outcome.workers, 8);
        assert_eq!(outcome.entries_scored, 2);
    }

    #[test]
    fn test_parallel_scans_agree() {
        let catalog: Catalog = (0..12)
            .map(|i| CatalogEntry::new(format!("item{}", i), features(&[i, (i + 1) % WIDTH, (i + 2) % WIDTH])))
            .collect();
        let query = features(&[5, 6]);

        let expected = scanner(1).scan(&query, &catalog);
        for workers in [2, 3, 5, 12, 16] {
            let outcome = scanner(workers).scan(&query, &catalog);
            assert_eq!(outcome.identifier, expected.identifier, "workers={}", workers);
            assert_eq!(outcome.score, expected.score, "workers={}", workers);
        }
    }
}
