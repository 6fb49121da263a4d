//! Monotonic clock access.
//!
//! Thin wrapper over the platform high-resolution monotonic counter. The
//! counter is independent of wall-clock changes; it may drift a few
//! milliseconds per hour relative to calendar time, which is acceptable
//! because the loop's goal is monotonic periodicity, not wall-clock
//! agreement.

use std::sync::OnceLock;
use std::time::Instant;

use crate::error::{LoopError, LoopResult};
use crate::extent::Extent;

/// Worst acceptable clock granule in nanoseconds (1 µs).
const MAX_GRANULE_NS: u64 = 1_000;

/// Current monotonic timestamp.
#[inline]
pub fn now() -> Instant {
    Instant::now()
}

/// Time elapsed since `since` as an [`Extent`].
#[inline]
pub fn elapsed(since: Instant) -> Extent {
    Extent::from(Instant::now().duration_since(since))
}

/// Fails fast when the platform monotonic counter cannot supply at least
/// 1 µs effective resolution.
///
/// The probe runs once per process and its verdict is cached.
pub fn ensure_resolution() -> LoopResult<()> {
    static PROBE: OnceLock<Result<(), u64>> = OnceLock::new();

    PROBE
        .get_or_init(probe_granule)
        .map_err(|granule_ns| LoopError::ClockResolution { granule_ns })
}

/// Measures the smallest observable positive clock step.
fn probe_granule() -> Result<(), u64> {
    const MAX_SPINS: u32 = 1_000_000;
    let mut finest = u64::MAX;

    for _ in 0..3 {
        let start = Instant::now();
        let mut spins = 0;
        let step = loop {
            let nanos = start.elapsed().as_nanos() as u64;
            if nanos > 0 {
                break nanos;
            }
            spins += 1;
            if spins >= MAX_SPINS {
                // The counter never advanced; report it as unusable.
                break u64::MAX;
            }
            std::hint::spin_loop();
        };
        finest = finest.min(step);
    }

    if finest <= MAX_GRANULE_NS {
        Ok(())
    } else {
        Err(finest)
    }
}
