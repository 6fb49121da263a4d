//! Per-cycle snapshot handed to the user.

use crate::extent::Extent;

/// Immutable snapshot of the loop state at the start of a cycle.
///
/// The driver owns the live state and hands each cycle a copy; the only
/// field that travels back is the stop request, read by the driver after
/// the user call returns.
#[derive(Debug, Clone, Copy)]
pub struct CycleEvent {
    pub(crate) event_index: u64,
    pub(crate) missed_count: u64,
    pub(crate) total_missed: u64,
    pub(crate) interval: Extent,
    pub(crate) interval_elapsed: Extent,
    pub(crate) interval_average: Extent,
    pub(crate) frequency: f64,
    pub(crate) interval_jitter: Extent,
    pub(crate) natural_elapsed: Extent,
    pub(crate) discrete_elapsed: Extent,
    pub(crate) stop_requested: bool,
}

impl CycleEvent {
    /// 0-based cycle index; skips ahead when cycles were missed.
    pub fn event_index(&self) -> u64 {
        self.event_index
    }

    /// Cycles missed on the immediately preceding cycle.
    pub fn missed_count(&self) -> u64 {
        self.missed_count
    }

    /// Accumulated missed cycles over the whole run.
    pub fn total_missed(&self) -> u64 {
        self.total_missed
    }

    /// Target interval currently configured for the loop.
    pub fn interval(&self) -> Extent {
        self.interval
    }

    /// Wall time between the previous and current cycle start, adjusted by
    /// natural drift.
    pub fn interval_elapsed(&self) -> Extent {
        self.interval_elapsed
    }

    /// Windowed mean of [`interval_elapsed`](Self::interval_elapsed).
    pub fn interval_average(&self) -> Extent {
        self.interval_average
    }

    /// `1 / interval_average` in Hz; zero when the average is zero.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Windowed standard deviation of measured intervals around the
    /// configured interval.
    pub fn interval_jitter(&self) -> Extent {
        self.interval_jitter
    }

    /// Wall time since the loop's first cycle start.
    pub fn natural_elapsed(&self) -> Extent {
        self.natural_elapsed
    }

    /// Sum of all measured intervals so far.
    pub fn discrete_elapsed(&self) -> Extent {
        self.discrete_elapsed
    }

    /// Asks the loop to stop after this cycle completes.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether a stop has been requested on this snapshot.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested
    }
}
