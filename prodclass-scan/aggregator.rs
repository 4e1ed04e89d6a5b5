use std::fmt;
use std::ops::Range;
use std::time::Duration;

use log::debug;

/// Score reported when no catalog entry could be scored at all
pub const NO_MATCH_SCORE: f64 = -1.0;

/// Display label for a rejected or empty outcome
pub const NO_MATCH_LABEL: &str = "none";

/// Best scoring entry seen so far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'c> {
    pub identifier: &'c str,
    pub score: f64,
}

/// Everything one worker learned about its partition.
///
/// Reports are private to their worker until the scan joins; only then are
/// they handed to the [`ResultAggregator`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport<'c> {
    pub worker: usize,
    pub range: Range<usize>,
    pub best: Option<Candidate<'c>>,
    pub scored: usize,
    pub skipped: usize,
}

impl<'c> WorkerReport<'c> {
    pub fn new(worker: usize, range: Range<usize>) -> Self {
        Self {
            worker,
            range,
            best: None,
            scored: 0,
            skipped: 0,
        }
    }

    /// Records a scored entry; an equal score never replaces the earlier one
    pub fn observe(&mut self, identifier: &'c str, score: f64) {
        self.scored += 1;
        if self.best.map_or(true, |best| score > best.score) {
            self.best = Some(Candidate { identifier, score });
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }
}

/// Result of one scan, consumed by the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Winning product, `None` when nothing cleared the rejection threshold
    pub identifier: Option<String>,
    /// Highest score in the catalog, or [`NO_MATCH_SCORE`] when nothing was scored
    pub score: f64,
    pub elapsed: Duration,
    pub workers: usize,
    pub entries_scored: usize,
    pub entries_skipped: usize,
}

impl ScanOutcome {
    /// Outcome for a scan that never compared anything
    pub fn no_match(workers: usize, elapsed: Duration) -> Self {
        Self {
            identifier: None,
            score: NO_MATCH_SCORE,
            elapsed,
            workers,
            entries_scored: 0,
            entries_skipped: 0,
        }
    }

    /// Identifier, or `"none"` when rejected
    pub fn label(&self) -> &str {
        self.identifier.as_deref().unwrap_or(NO_MATCH_LABEL)
    }

    pub fn is_match(&self) -> bool {
        self.identifier.is_some()
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (score {:.4}, {} scored, {} skipped, {} workers, {:.2?})",
            self.label(),
            self.score,
            self.entries_scored,
            self.entries_skipped,
            self.workers,
            self.elapsed
        )
    }
}

/// Reduces per-worker bests to the global best.
///
/// The reduction runs on a single thread after every worker has finished.
/// The highest score wins; among equal scores the lowest worker index wins,
/// so the result does not depend on the order workers finished in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultAggregator {
    reject_threshold: f64,
}

impl ResultAggregator {
    pub fn new(reject_threshold: f64) -> Self {
        Self { reject_threshold }
    }

    pub fn reject_threshold(&self) -> f64 {
        self.reject_threshold
    }

    /// Picks the global best from the worker reports
    pub fn best<'c>(&self, reports: &[WorkerReport<'c>]) -> Option<(usize, Candidate<'c>)> {
        let mut best: Option<(usize, Candidate<'c>)> = None;
        for report in reports {
            let Some(candidate) = report.best else {
                continue;
            };
            let replace = match best {
                None => true,
                Some((worker, current)) => {
                    candidate.score > current.score
                        || (candidate.score == current.score && report.worker < worker)
                }
            };
            if replace {
                best = Some((report.worker, candidate));
            }
        }
        best
    }

    /// Builds the scan outcome, applying the rejection threshold
    pub fn aggregate(&self, reports: &[WorkerReport<'_>], elapsed: Duration) -> ScanOutcome {
        let entries_scored = reports.iter().map(|r| r.scored).sum();
        let entries_skipped = reports.iter().map(|r| r.skipped).sum();

        let (identifier, score) = match self.best(reports) {
            Some((worker, candidate)) => {
                debug!(
                    "Best candidate {} with score {:.4} from worker {}",
                    candidate.identifier, candidate.score, worker
                );
                let identifier = if candidate.score < self.reject_threshold {
                    None
                } else {
                    Some(candidate.identifier.to_string())
                };
                (identifier, candidate.score)
            }
            None => (None, NO_MATCH_SCORE),
        };

        ScanOutcome {
            identifier,
            score,
            elapsed,
            workers: reports.len(),
            entries_scored,
            entries_skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report<'c>(worker: usize, best: Option<(&'c str, f64)>) -> WorkerReport<'c> {
        let mut r = WorkerReport::new(worker, worker..worker + 1);
        if let Some((id, score)) = best {
            r.observe(id, score);
        }
        r
    }

    #[test]
    fn test_local_best_first_seen_wins() {
        let mut r = WorkerReport::new(0, 0..3);
        r.observe("a", 0.4);
        r.observe("b", 0.4);
        r.observe("c", 0.1);
        assert_eq!(r.best.map(|c| c.identifier), Some("a"));
        assert_eq!(r.scored, 3);

        r.observe("d", 0.41);
        assert_eq!(r.best.map(|c| c.identifier), Some("d"));
    }

    #[test]
    fn test_highest_score_wins() {
        let aggregator = ResultAggregator::new(0.05);
        let reports = [report(0, Some(("banana", 0.2))), report(1, Some(("apple", 0.9)))];
        let outcome = aggregator.aggregate(&reports, Duration::ZERO);
        assert_eq!(outcome.identifier.as_deref(), Some("apple"));
        assert_eq!(outcome.score, 0.9);
        assert_eq!(outcome.entries_scored, 2);
        assert_eq!(outcome.workers, 2);
    }

    #[test]
    fn test_tie_goes_to_lowest_worker() {
        let aggregator = ResultAggregator::new(0.05);
        let reports = [report(1, Some(("y", 0.5))), report(0, Some(("x", 0.5)))];
        assert_eq!(aggregator.aggregate(&reports, Duration::ZERO).label(), "x");

        let reports = [report(0, Some(("x", 0.5))), report(1, Some(("y", 0.5)))];
        assert_eq!(aggregator.aggregate(&reports, Duration::ZERO).label(), "x");
    }

    #[test]
    fn test_weak_best_rejected_but_score_kept() {
        let aggregator = ResultAggregator::new(0.05);
        let reports = [report(0, Some(("chitato", 0.03))), report(1, None)];
        let outcome = aggregator.aggregate(&reports, Duration::ZERO);
        assert_eq!(outcome.identifier, None);
        assert_eq!(outcome.label(), NO_MATCH_LABEL);
        assert_eq!(outcome.score, 0.03);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let aggregator = ResultAggregator::new(0.05);
        let outcome = aggregator.aggregate(&[report(0, Some(("lays", 0.05)))], Duration::ZERO);
        assert_eq!(outcome.label(), "lays");
    }

    #[test]
    fn test_no_candidates() {
        let aggregator = ResultAggregator::new(0.05);
        let mut empty = report(0, None);
        empty.skip();
        let outcome = aggregator.aggregate(&[empty, report(1, None)], Duration::from_millis(3));
        assert!(!outcome.is_match());
        assert_eq!(outcome.score, NO_MATCH_SCORE);
        assert_eq!(outcome.entries_skipped, 1);
        assert_eq!(outcome.elapsed, Duration::from_millis(3));
    }

    #[test]
    fn test_display() {
        let outcome = ScanOutcome::no_match(4, Duration::ZERO);
        assert!(outcome.to_string().starts_with("none (score -1.0000"));
    }
}
