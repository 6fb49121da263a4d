//! Precision delay primitive.
//!
//! Blocking and cooperative waits for an arbitrary sub-millisecond duration.
//! Neither form ever sleeps monolithically on unreliable OS primitives: the
//! wait is composed of ≤ 1 ms one-shot sleeps plus a final tight spin whose
//! budget is governed by [`PrecisionOption`]. The spin tail exists because a
//! 1 ms OS sleep overshoots by several hundred microseconds; the tail closes
//! that gap deterministically. The 1 ms chunking keeps the caller responsive
//! to cancellation and lets the OS schedule other work between chunks.

use std::time::{Duration, Instant};

use crate::cancel::CancelObserver;
use crate::clock;
use crate::error::LoopResult;
use crate::extent::Extent;
use crate::platform::{min_period_ms, OneShotTimer, PeriodGuard};
use crate::precision::PrecisionOption;
use crate::CHUNK_MS;

/// Blocks the calling thread for `dur`.
///
/// Returns the actual elapsed time, which is ≥ `dur` unless `cancel` was
/// signalled first or `dur` is not positive (immediate return). The platform
/// interrupt rate is raised for the duration of the wait and always
/// restored.
///
/// # Errors
///
/// [`LoopError::PlatformTimer`](crate::LoopError::PlatformTimer) when the
/// platform one-shot timer cannot be created or armed. The failure is fatal
/// to this call only.
pub fn delay(
    dur: Extent,
    precision: PrecisionOption,
    cancel: &CancelObserver,
) -> LoopResult<Extent> {
    if dur.is_nan() || dur <= Extent::ZERO {
        return Ok(Extent::ZERO);
    }
    clock::ensure_resolution()?;

    let start = clock::now();
    let spin_budget = precision.spin_budget(min_period_ms());
    let _period = PeriodGuard::acquire();
    let mut timer = OneShotTimer::new()?;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let elapsed = clock::elapsed(start);
        if elapsed >= dur {
            break;
        }
        if spin_budget > Extent::ZERO && dur - elapsed <= spin_budget {
            spin_until(start, dur, cancel);
            break;
        }
        timer.wait(CHUNK_MS)?;
    }

    Ok(clock::elapsed(start))
}

/// Cooperative form of [`delay`].
///
/// The 1 ms chunks are cooperative suspension points; the final spin is
/// synchronous and CPU-bound by design. Same contract and errors as the
/// blocking form.
pub async fn delay_async(
    dur: Extent,
    precision: PrecisionOption,
    cancel: &CancelObserver,
) -> LoopResult<Extent> {
    if dur.is_nan() || dur <= Extent::ZERO {
        return Ok(Extent::ZERO);
    }
    clock::ensure_resolution()?;

    let start = clock::now();
    let spin_budget = precision.spin_budget(min_period_ms());
    let _period = PeriodGuard::acquire();

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let elapsed = clock::elapsed(start);
        if elapsed >= dur {
            break;
        }
        if spin_budget > Extent::ZERO && dur - elapsed <= spin_budget {
            spin_until(start, dur, cancel);
            break;
        }
        tokio::time::sleep(Duration::from_millis(u64::from(CHUNK_MS))).await;
    }

    Ok(clock::elapsed(start))
}

/// Busy-spins until `dur` has elapsed since `start` or `cancel` is set.
fn spin_until(start: Instant, dur: Extent, cancel: &CancelObserver) {
    while clock::elapsed(start) < dur {
        if cancel.is_cancelled() {
            return;
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSource;

    #[test]
    fn test_non_positive_returns_immediately() {
        let cancel = CancelObserver::never();
        let start = Instant::now();

        for dur in [Extent::ZERO, Extent::from_millis(-5.0), Extent::NAN] {
            let elapsed = delay(dur, PrecisionOption::Maximum, &cancel).expect("delay failed");
            assert_eq!(elapsed, Extent::ZERO);
        }

        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_elapsed_at_least_requested() {
        let cancel = CancelObserver::never();
        let dur = Extent::from_millis(3.0);

        let elapsed = delay(dur, PrecisionOption::High, &cancel).expect("delay failed");

        assert!(elapsed >= dur, "elapsed {elapsed} below requested {dur}");
    }

    #[test]
    fn test_cancelled_before_call_returns_promptly() {
        let source = CancelSource::new();
        source.cancel();
        let start = Instant::now();

        let elapsed = delay(
            Extent::from_seconds(10.0),
            PrecisionOption::Default,
            &source.observer(),
        )
        .expect("delay failed");

        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(elapsed < Extent::from_seconds(10.0));
    }

    #[test]
    fn test_cancelled_mid_delay_returns_promptly() {
        let source = CancelSource::new();
        let observer = source.observer();

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            source.cancel();
        });

        let start = Instant::now();
        let elapsed = delay(Extent::from_seconds(5.0), PrecisionOption::High, &observer)
            .expect("delay failed");
        canceller.join().expect("canceller panicked");

        // Generous bound: CI schedulers can stall the canceller thread.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(elapsed < Extent::from_seconds(5.0));
    }

    #[tokio::test]
    async fn test_async_elapsed_at_least_requested() {
        let cancel = CancelObserver::never();
        let dur = Extent::from_millis(3.0);

        let elapsed = delay_async(dur, PrecisionOption::Medium, &cancel)
            .await
            .expect("delay failed");

        assert!(elapsed >= dur);
    }

    #[tokio::test]
    async fn test_async_non_positive_returns_immediately() {
        let cancel = CancelObserver::never();
        let elapsed = delay_async(Extent::ZERO, PrecisionOption::Maximum, &cancel)
            .await
            .expect("delay failed");
        assert_eq!(elapsed, Extent::ZERO);
    }
}
