//! Progress reporting contract between long-running work and its job.
//!
//! The rendering engine and the dynamic code pipeline push percentages into
//! a [`ProgressSink`]; the job decides how to consume them.

/// Upper bound of every progress value.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Receiver of progress updates for one job.
pub trait ProgressSink: Send + Sync {
    /// Report that `percent` (0-100) of the work is done.
    fn report(&self, percent: u8);

    /// Whether the job has been asked to stop. Long loops poll this between
    /// units of work.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Percentage of `done` out of `total`, clamped to `0..=100`.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return PROGRESS_COMPLETE;
    }
    (done.saturating_mul(100) / total).min(u64::from(PROGRESS_COMPLETE)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_rounds_down_and_clamps() {
        assert_eq!(percent_of(0, 225), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(225, 225), 100);
        assert_eq!(percent_of(500, 225), 100);
        assert_eq!(percent_of(0, 0), 100);
    }
}
