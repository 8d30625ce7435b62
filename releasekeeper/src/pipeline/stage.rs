//! Ordered pass stages and their progress bands.

use std::fmt;

/// One stage of a vendor pass, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Ask the adapter for candidates and validate them.
    Discover,
    /// Register new candidates and their bundle membership.
    Reconcile,
    /// Acquire artifacts not yet on disk.
    Download,
    /// Apply readiness rules to every bundle.
    Evaluate,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Discover,
        Stage::Reconcile,
        Stage::Download,
        Stage::Evaluate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Reconcile => "reconcile",
            Stage::Download => "download",
            Stage::Evaluate => "evaluate",
        }
    }

    /// Overall progress range covered by this stage, start and end.
    pub fn band(&self) -> (u8, u8) {
        match self {
            Stage::Discover => (0, 10),
            Stage::Reconcile => (10, 30),
            Stage::Download => (30, 90),
            Stage::Evaluate => (90, 100),
        }
    }

    /// Overall progress after `done` of `total` units of this stage.
    pub fn progress_at(&self, done: usize, total: usize) -> u8 {
        let (start, end) = self.band();
        if total == 0 {
            return end;
        }
        let span = (end - start) as usize;
        start + (span * done.min(total) / total) as u8
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_contiguous() {
        let mut expected_start = 0;
        for stage in Stage::ALL {
            let (start, end) = stage.band();
            assert_eq!(start, expected_start, "{} starts out of order", stage);
            assert!(end > start);
            expected_start = end;
        }
        assert_eq!(expected_start, 100);
    }

    #[test]
    fn test_progress_at() {
        assert_eq!(Stage::Download.progress_at(0, 4), 30);
        assert_eq!(Stage::Download.progress_at(2, 4), 60);
        assert_eq!(Stage::Download.progress_at(4, 4), 90);
        assert_eq!(Stage::Download.progress_at(9, 4), 90);
        assert_eq!(Stage::Reconcile.progress_at(0, 0), 30);
    }
}
