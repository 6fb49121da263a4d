//! Linux-specific timer service.
//!
//! One-shot wakes use `clock_nanosleep` on the monotonic clock. Linux needs
//! no period raising: the tick source is already millisecond-accurate for
//! the chunk lengths the delay primitive uses.

use libc::{
    clock_nanosleep, sched_param, sched_setscheduler, timespec, CLOCK_MONOTONIC, EINTR,
    SCHED_FIFO,
};

use crate::error::{LoopError, LoopResult};

/// Best one-shot resolution the platform will guarantee, in milliseconds.
pub(crate) fn min_period_ms() -> u32 {
    1
}

/// Period raising is a no-op on Linux; the guard exists so acquisition and
/// release stay strictly paired across platforms.
pub(crate) struct PeriodGuard;

impl PeriodGuard {
    pub(crate) fn acquire() -> Self {
        Self
    }
}

/// One-shot wake scoped to a single delay call.
pub(crate) struct OneShotTimer;

impl OneShotTimer {
    pub(crate) fn new() -> LoopResult<Self> {
        Ok(Self)
    }

    /// Blocks for `ms` milliseconds on the monotonic clock.
    pub(crate) fn wait(&mut self, ms: u32) -> LoopResult<()> {
        let ts = timespec {
            tv_sec: i64::from(ms / 1_000),
            tv_nsec: i64::from(ms % 1_000) * 1_000_000,
        };

        loop {
            let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &ts, std::ptr::null_mut()) };
            match rc {
                0 => return Ok(()),
                EINTR => continue,
                code => return Err(LoopError::PlatformTimer { code }),
            }
        }
    }
}

/// Raises the calling thread to SCHED_FIFO.
///
/// Returns whether the raise took effect; it fails without CAP_SYS_NICE and
/// that is tolerated.
pub(crate) fn raise_thread_priority() -> bool {
    let param = sched_param { sched_priority: 80 };
    unsafe { sched_setscheduler(0, SCHED_FIFO, &param) == 0 }
}
