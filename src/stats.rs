//! Run statistics.
//!
//! [`StatsAccumulator`] folds file records in any order: every field is a
//! sum, a histogram, or a max-by-size with a deterministic tie-break, so
//! batches may be merged regardless of completion order.
//! [`StatsAccumulator::finalize`] freezes the result into
//! [`RunStatistics`] exactly once per run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::output::FileRecord;
use crate::walker::NO_EXTENSION;

/// The largest documented file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestFile {
    pub path: String,
    pub size: u64,
}

impl LargestFile {
    fn larger(self, other: LargestFile) -> LargestFile {
        // Equal sizes keep the lexicographically smaller path.
        match self.size.cmp(&other.size) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal if self.path <= other.path => self,
            std::cmp::Ordering::Equal => other,
        }
    }
}

/// Mutable totals for documented files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsAccumulator {
    documented_files: usize,
    documented_size: u64,
    extension_histogram: BTreeMap<String, usize>,
    largest_file: Option<LargestFile>,
    token_estimate: usize,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one documented file into the totals.
    pub fn record(&mut self, record: &FileRecord) {
        self.documented_files += 1;
        self.documented_size += record.size;
        self.token_estimate += record.tokens;

        let extension = record
            .extension
            .clone()
            .unwrap_or_else(|| NO_EXTENSION.to_string());
        *self.extension_histogram.entry(extension).or_default() += 1;

        let candidate = LargestFile {
            path: record.path.clone(),
            size: record.size,
        };
        self.largest_file = Some(match self.largest_file.take() {
            Some(current) => current.larger(candidate),
            None => candidate,
        });
    }

    /// Combine two accumulators.
    pub fn merge(mut self, other: StatsAccumulator) -> StatsAccumulator {
        self.documented_files += other.documented_files;
        self.documented_size += other.documented_size;
        self.token_estimate += other.token_estimate;
        for (extension, count) in other.extension_histogram {
            *self.extension_histogram.entry(extension).or_default() += count;
        }
        self.largest_file = match (self.largest_file, other.largest_file) {
            (Some(a), Some(b)) => Some(a.larger(b)),
            (a, b) => a.or(b),
        };
        self
    }

    pub fn documented_files(&self) -> usize {
        self.documented_files
    }

    pub fn token_estimate(&self) -> usize {
        self.token_estimate
    }

    /// Freeze the totals.
    ///
    /// `total_files` and `total_size` describe every candidate that passed
    /// the inclusion policy, documented or not.
    pub fn finalize(
        self,
        total_files: usize,
        total_size: u64,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> RunStatistics {
        let average_file_size = if self.documented_files == 0 {
            0
        } else {
            self.documented_size / self.documented_files as u64
        };

        RunStatistics {
            total_files,
            documented_files: self.documented_files,
            skipped_files: total_files.saturating_sub(self.documented_files),
            total_size,
            documented_size: self.documented_size,
            average_file_size,
            extension_histogram: self.extension_histogram,
            largest_file: self.largest_file,
            token_estimate: self.token_estimate,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        }
    }
}

/// Frozen statistics for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub total_files: usize,
    pub documented_files: usize,
    pub skipped_files: usize,
    pub total_size: u64,
    pub documented_size: u64,
    pub average_file_size: u64,
    pub extension_histogram: BTreeMap<String, usize>,
    pub largest_file: Option<LargestFile>,
    pub token_estimate: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord::new(path, "x".repeat(size as usize), size)
    }

    #[test]
    fn test_record_and_finalize() {
        let mut acc = StatsAccumulator::new();
        acc.record(&record("src/a.ts", 100));
        acc.record(&record("src/b.ts", 300));
        acc.record(&record("Makefile", 50));

        let start = Utc::now();
        let stats = acc.finalize(5, 1000, start, start + Duration::milliseconds(42));

        assert_eq!(stats.documented_files, 3);
        assert_eq!(stats.skipped_files, 2);
        assert_eq!(stats.documented_size, 450);
        assert_eq!(stats.average_file_size, 150);
        assert_eq!(stats.token_estimate, 113);
        assert_eq!(stats.extension_histogram.get(".ts"), Some(&2));
        assert_eq!(stats.extension_histogram.get(NO_EXTENSION), Some(&1));
        assert_eq!(stats.largest_file.unwrap().path, "src/b.ts");
        assert_eq!(stats.duration_ms, 42);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let records = [
            record("a.rs", 10),
            record("b.rs", 40),
            record("c.md", 40),
            record("d.md", 5),
        ];

        let mut left = StatsAccumulator::new();
        left.record(&records[0]);
        left.record(&records[1]);
        let mut right = StatsAccumulator::new();
        right.record(&records[2]);
        right.record(&records[3]);

        let mut sequential = StatsAccumulator::new();
        for r in records.iter().rev() {
            sequential.record(r);
        }

        assert_eq!(left.clone().merge(right.clone()), right.merge(left.clone()));
        assert_eq!(left.clone().merge(StatsAccumulator::new()), left);

        let mut forward = StatsAccumulator::new();
        for r in &records {
            forward.record(r);
        }
        assert_eq!(forward, sequential);
        assert_eq!(forward.largest_file.unwrap().path, "b.rs");
    }

    #[test]
    fn test_empty_run() {
        let start = Utc::now();
        let stats = StatsAccumulator::new().finalize(0, 0, start, start);
        assert_eq!(stats.average_file_size, 0);
        assert!(stats.largest_file.is_none());
    }
}
