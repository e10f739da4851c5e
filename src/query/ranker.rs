//! Sorting, normalization, and windowing of query results.

use serde::Serialize;

use crate::query::evaluator::RankMap;

/// One result as it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankedResult {
    pub file_index: u32,
    /// Accumulated rank before normalization.
    pub rank: u64,
    pub occurrences: u64,
    /// Rank scaled so the best result is 100; never below 1.
    pub display_rank: u32,
}

/// A window over the sorted results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankedResults {
    /// Number of files matched, before skipping and limiting.
    pub total: usize,
    pub results: Vec<RankedResult>,
}

/// Sort by rank (highest first, then by file index), normalize against the
/// highest rank, and keep `limit` results after the first `skip`.
pub fn rank_results(results: RankMap, skip: usize, limit: usize) -> RankedResults {
    let total = results.len();
    let mut sorted: Vec<(u32, u64, u64)> = results
        .into_iter()
        .map(|(file, score)| (file, score.rank, score.occurrences))
        .collect();
    sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let highest = sorted.first().map_or(0, |r| r.1);
    let results = sorted
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|(file_index, rank, occurrences)| RankedResult {
            file_index,
            rank,
            occurrences,
            display_rank: normalize(rank, highest),
        })
        .collect();

    RankedResults { total, results }
}

fn normalize(rank: u64, highest: u64) -> u32 {
    if highest == 0 {
        return 100;
    }
    let scaled = (rank as f64 * 100.0 / highest as f64).round() as u32;
    scaled.clamp(1, 100)
}
