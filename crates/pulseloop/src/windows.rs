//! Windows-specific timer service.
//!
//! Period control goes through the winmm interrupt-rate API; one-shot wakes
//! use a waitable timer armed with a relative due time in 100 ns units.

use std::sync::OnceLock;

use ::windows::Win32::Foundation::{CloseHandle, HANDLE};
use ::windows::Win32::Media::{
    timeBeginPeriod, timeEndPeriod, timeGetDevCaps, TIMECAPS, TIMERR_NOERROR,
};
use ::windows::Win32::System::Threading::{
    CreateWaitableTimerW, GetCurrentThread, SetThreadPriority, SetWaitableTimer,
    WaitForSingleObject, INFINITE, THREAD_PRIORITY_TIME_CRITICAL,
};
use tracing::warn;

use crate::error::{LoopError, LoopResult};

/// Best one-shot resolution the platform will guarantee, in milliseconds.
pub(crate) fn min_period_ms() -> u32 {
    static MIN_PERIOD: OnceLock<u32> = OnceLock::new();

    *MIN_PERIOD.get_or_init(|| {
        let mut caps = TIMECAPS::default();
        let status =
            unsafe { timeGetDevCaps(&mut caps, std::mem::size_of::<TIMECAPS>() as u32) };
        if status == TIMERR_NOERROR {
            caps.wPeriodMin.max(1)
        } else {
            1
        }
    })
}

/// Scoped raise of the process interrupt rate.
///
/// `timeBeginPeriod` and `timeEndPeriod` are process-global and must be
/// balanced; the guard releases on every path. Failure to raise the period
/// is non-fatal: delays still run, just with coarser sleeps.
pub(crate) struct PeriodGuard {
    period_ms: u32,
    raised: bool,
}

impl PeriodGuard {
    pub(crate) fn acquire() -> Self {
        let period_ms = min_period_ms();
        let raised = unsafe { timeBeginPeriod(period_ms) } == TIMERR_NOERROR;
        if !raised {
            static WARNED: OnceLock<()> = OnceLock::new();
            WARNED.get_or_init(|| {
                warn!(period_ms, "failed to raise platform timer period");
            });
        }
        Self { period_ms, raised }
    }
}

impl Drop for PeriodGuard {
    fn drop(&mut self) {
        if self.raised {
            unsafe {
                timeEndPeriod(self.period_ms);
            }
        }
    }
}

/// A waitable timer scoped to a single delay call.
///
/// Each delay call creates its own timer, so an arming failure cannot poison
/// later calls.
pub(crate) struct OneShotTimer {
    handle: HANDLE,
}

impl OneShotTimer {
    pub(crate) fn new() -> LoopResult<Self> {
        let handle = unsafe { CreateWaitableTimerW(None, true, None) }
            .map_err(|e| LoopError::PlatformTimer { code: e.code().0 })?;
        Ok(Self { handle })
    }

    /// Arms the timer for `ms` milliseconds and blocks until it fires.
    pub(crate) fn wait(&mut self, ms: u32) -> LoopResult<()> {
        let due_time = relative_due_time_100ns(ms);
        unsafe {
            SetWaitableTimer(self.handle, &due_time, 0, None, None, false)
                .map_err(|e| LoopError::PlatformTimer { code: e.code().0 })?;
            WaitForSingleObject(self.handle, INFINITE);
        }
        Ok(())
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Raises the calling thread to TIME_CRITICAL priority.
///
/// Returns whether the raise took effect; failure is tolerated.
pub(crate) fn raise_thread_priority() -> bool {
    unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL).is_ok() }
}

/// Converts milliseconds to a relative due time in 100 ns units.
fn relative_due_time_100ns(ms: u32) -> i64 {
    let ticks_100ns = i64::from(ms) * 10_000;
    -ticks_100ns.max(1)
}
