//! Per-cycle book-keeping: drift tracking, rolling statistics, missed-cycle
//! detection.
//!
//! The update step runs after each cycle's user work and residual delay. It
//! measures the raw elapsed time, folds in the natural drift (the amount by
//! which the discrete interval sum has fallen away from natural wall time),
//! carries the previous residual into the next delay estimate, and corrects
//! that estimate by the windowed average drift once enough samples exist.
//! The `mod interval` operations clamp every correction to within one
//! interval, so a user function that briefly blocks for many intervals is
//! surfaced as missed cycles instead of runaway compensation.
//!
//! All timestamps enter through parameters, so tests can drive synthetic
//! timelines.

use std::collections::VecDeque;
use std::time::Instant;

use crate::event::CycleEvent;
use crate::extent::Extent;
use crate::{MAX_SAMPLE_WINDOW, SAMPLE_THRESHOLD};

/// Internal loop state owned by the driver, one per run.
#[derive(Debug)]
pub(crate) struct LoopState {
    interval: Extent,
    next_delay: Extent,
    current_tick_ts: Instant,
    natural_start_ts: Option<Instant>,
    event_index: u64,
    missed_count: u64,
    total_missed: u64,
    interval_elapsed: Extent,
    discrete_elapsed: Extent,
    natural_elapsed: Extent,
    interval_average: Extent,
    frequency: f64,
    interval_jitter: Extent,
    samples: VecDeque<Extent>,
    sample_threshold: usize,
}

impl LoopState {
    /// Creates the state for a loop entering its first cycle at `start`.
    pub(crate) fn new(interval: Extent, start: Instant) -> Self {
        let interval = coerce_interval(interval);
        Self {
            interval,
            next_delay: Extent::ZERO,
            current_tick_ts: start,
            natural_start_ts: None,
            event_index: 0,
            missed_count: 0,
            total_missed: 0,
            interval_elapsed: Extent::ZERO,
            discrete_elapsed: Extent::ZERO,
            natural_elapsed: Extent::ZERO,
            interval_average: Extent::ZERO,
            frequency: 0.0,
            interval_jitter: Extent::ZERO,
            samples: VecDeque::with_capacity(window_capacity(interval)),
            sample_threshold: SAMPLE_THRESHOLD,
        }
    }

    /// Residual the driver should sleep after the current cycle's user work.
    pub(crate) fn next_delay(&self) -> Extent {
        self.next_delay
    }

    #[cfg(test)]
    pub(crate) fn event_index(&self) -> u64 {
        self.event_index
    }

    #[cfg(test)]
    pub(crate) fn total_missed(&self) -> u64 {
        self.total_missed
    }

    #[cfg(test)]
    pub(crate) fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Immutable snapshot of the public fields for the next cycle.
    pub(crate) fn snapshot(&self) -> CycleEvent {
        CycleEvent {
            event_index: self.event_index,
            missed_count: self.missed_count,
            total_missed: self.total_missed,
            interval: self.interval,
            interval_elapsed: self.interval_elapsed,
            interval_average: self.interval_average,
            frequency: self.frequency,
            interval_jitter: self.interval_jitter,
            natural_elapsed: self.natural_elapsed,
            discrete_elapsed: self.discrete_elapsed,
            stop_requested: false,
        }
    }

    /// Per-cycle update, executed after the user work and residual delay.
    ///
    /// `now` is the current cycle boundary; `interval` is re-read from the
    /// loop so the configured interval can change between cycles.
    pub(crate) fn update(&mut self, now: Instant, interval: Extent) {
        let interval = coerce_interval(interval);
        self.interval = interval;

        let prev = self.current_tick_ts;
        let first = self.natural_start_ts.is_none();
        let raw = if first {
            Extent::ZERO
        } else {
            Extent::from(now.duration_since(prev))
        };
        self.current_tick_ts = now;

        // Discrete ticks accumulate less (or more) than natural wall time;
        // fold the drift into the measurement before accumulating it.
        let natural_drift = if first {
            Extent::ZERO
        } else {
            (self.natural_elapsed - self.discrete_elapsed) % interval
        };
        let interval_elapsed = raw + natural_drift;
        self.interval_elapsed = interval_elapsed;

        // Carry the residual the driver just slept into the next estimate.
        let carried = self.next_delay;
        let mut next_delay = interval - (interval_elapsed - carried);

        self.discrete_elapsed = self.discrete_elapsed + interval_elapsed;
        if first {
            self.natural_start_ts = Some(prev);
            self.natural_elapsed = self.discrete_elapsed;
        } else if let Some(start) = self.natural_start_ts {
            self.natural_elapsed = Extent::from(now.duration_since(start));
        }

        // The average used for drift correction is the window as of the
        // previous cycle: an anomalous stall must surface as missed cycles,
        // not fold itself into its own correction.
        let average_before = self.interval_average;
        let samples_before = self.samples.len();

        // The first update only anchors the clocks; its zero measurement is
        // not a timing sample.
        if !first {
            self.push_sample(interval_elapsed);
        }

        if samples_before >= self.sample_threshold / 2 {
            let average_drift = (average_before - interval) % interval;
            next_delay = next_delay - average_drift;
        }

        if next_delay.is_nan() || next_delay <= Extent::ZERO {
            // The loop fell behind; report the skipped cycles and realign to
            // the next interval boundary instead of compensating.
            let behind = (-next_delay).ticks().max(0);
            let missed = 1 + (behind / interval.ticks()) as u64;
            self.missed_count = missed;
            self.total_missed += missed;
            next_delay = interval;
        } else {
            self.missed_count = 0;
            if next_delay > interval {
                next_delay = interval;
            }
        }
        self.next_delay = next_delay;

        self.event_index += 1 + self.missed_count;
    }

    fn push_sample(&mut self, sample: Extent) {
        let capacity = window_capacity(self.interval);
        while self.samples.len() >= capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        let count = self.samples.len() as f64;
        let mut sum = 0.0;
        let mut squared_deviation = 0.0;
        let interval_secs = self.interval.as_seconds();
        for sample in &self.samples {
            let secs = sample.as_seconds();
            sum += secs;
            let deviation = secs - interval_secs;
            squared_deviation += deviation * deviation;
        }

        let average_secs = sum / count;
        self.interval_average = Extent::from_seconds(average_secs);
        self.frequency = if average_secs > 0.0 {
            average_secs.recip()
        } else {
            0.0
        };
        self.interval_jitter = Extent::from_seconds((squared_deviation / count).sqrt());
    }
}

/// Any non-positive (or NaN) interval is coerced to one clock tick.
fn coerce_interval(interval: Extent) -> Extent {
    if interval > Extent::ZERO {
        interval
    } else {
        Extent::from_ticks(1)
    }
}

/// Rolling window capacity: one second's worth of cycles, at least the
/// sample threshold, bounded so a microsecond-scale interval cannot demand
/// an unbounded allocation.
fn window_capacity(interval: Extent) -> usize {
    let ticks = interval.ticks().max(1);
    let per_second = (Extent::ONE.ticks() + ticks - 1) / ticks;
    per_second.clamp(SAMPLE_THRESHOLD as i64, MAX_SAMPLE_WINDOW as i64) as usize
}
