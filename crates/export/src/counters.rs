use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress counters for one run. Only ever increased.
#[derive(Debug, Default)]
pub(crate) struct ExportCounters {
    folders_total: AtomicU64,
    threads_total: AtomicU64,
    folders_processed: AtomicU64,
    threads_processed: AtomicU64,
}
impl ExportCounters {
    /// Adds to both totals and returns the new `(folders_total, threads_total)`.
    pub(crate) fn add_totals(&self, folders: usize, threads: usize) -> (u64, u64) {
        let folders = self.folders_total.fetch_add(folders as u64, Ordering::Relaxed) + folders as u64;
        let threads = self.threads_total.fetch_add(threads as u64, Ordering::Relaxed) + threads as u64;
        (folders, threads)
    }

    pub(crate) fn folder_processed(&self) -> u64 {
        self.folders_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn thread_processed(&self) -> u64 {
        self.threads_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            folders_total: self.folders_total.load(Ordering::Relaxed),
            threads_total: self.threads_total.load(Ordering::Relaxed),
            folders_processed: self.folders_processed.load(Ordering::Relaxed),
            threads_processed: self.threads_processed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub folders_total: u64,
    pub threads_total: u64,
    pub folders_processed: u64,
    pub threads_processed: u64,
}
impl CountersSnapshot {
    /// Share of counted threads processed so far, as a whole percentage.
    pub fn percent(&self) -> u8 {
        percent(self.threads_processed, self.threads_total)
    }
}

pub(crate) fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_counters_accumulate() {
        let counters = ExportCounters::default();
        assert_eq!(counters.add_totals(2, 3), (2, 3));
        assert_eq!(counters.add_totals(0, 4), (2, 7));
        assert_eq!(counters.thread_processed(), 1);
        assert_eq!(counters.folder_processed(), 1);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot, CountersSnapshot { folders_total: 2, threads_total: 7, folders_processed: 1, threads_processed: 1 });
        assert_eq!(snapshot.percent(), 14);
    }

    #[rstest]
    #[case(0, 0, 100)]
    #[case(0, 3, 0)]
    #[case(1, 3, 33)]
    #[case(3, 3, 100)]
    #[case(5, 3, 100)]
    fn test_percent(#[case] done: u64, #[case] total: u64, #[case] expected: u8) {
        assert_eq!(percent(done, total), expected);
    }
}
