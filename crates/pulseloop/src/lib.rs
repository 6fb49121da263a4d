//! Monotonic, drift-corrected, sub-millisecond periodic scheduling.
//!
//! This crate provides precise cycle scheduling on general-purpose operating
//! systems whose native timing services give, at best, ~1 ms resolution with
//! substantial jitter. It includes:
//!
//! - **[`Extent`]**: nullable high-resolution duration with NaN-absorbing
//!   arithmetic over both durations and plain seconds
//! - **[`delay`] / [`delay_async`]**: precision waits composing short OS
//!   sleeps with a bounded busy-spin tail
//! - **[`PrecisionThread`]**: a background worker running a user cycle
//!   function at a fixed interval with drift correction and jitter statistics
//! - **[`PrecisionTimer`]**: the same loop behind a single observer slot
//! - **[`PrecisionTask`]**: the cooperative (tokio) variant of the loop
//!
//! The loop continuously corrects the residual delay after each cycle so that
//! the sum of discrete intervals tracks the natural wall time elapsed since
//! start. Cycles the loop could not schedule in time are reported as missed,
//! never re-executed.
//!
//! # Example
//!
//! ```no_run
//! use pulseloop::{Extent, PrecisionOption, PrecisionThread};
//!
//! let mut worker = PrecisionThread::new(
//!     |event| {
//!         if event.event_index() >= 750 {
//!             event.request_stop();
//!         }
//!         Ok(())
//!     },
//!     Extent::from_hertz(75.0),
//!     PrecisionOption::High,
//! );
//! worker.start().expect("loop start failed");
//! worker.wait_for_exit().expect("loop failed");
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod clock;
pub mod extent;

mod cancel;
mod delay;
mod driver;
mod error;
mod event;
mod precision;
mod state;
mod task;
mod thread;
mod timer;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod fallback;

#[cfg(target_os = "windows")]
pub(crate) use crate::windows as platform;

#[cfg(target_os = "linux")]
pub(crate) use crate::linux as platform;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) use crate::fallback as platform;

pub mod prelude;

pub use cancel::{CancelObserver, CancelSource};
pub use delay::{delay, delay_async};
pub use error::{CycleError, ErrorDirective, LoopError, LoopResult};
pub use event::CycleEvent;
pub use extent::Extent;
pub use precision::PrecisionOption;
pub use task::{CycleFuture, PrecisionTask};
pub use thread::PrecisionThread;
pub use timer::PrecisionTimer;

/// Chunk length in milliseconds for the interruptible portion of a delay.
///
/// The delay primitive never sleeps monolithically: it composes wakes of this
/// length so cancellation is observed promptly and the OS can schedule other
/// work between chunks.
pub const CHUNK_MS: u32 = 1;

/// Minimum number of interval samples before average-drift correction engages.
pub const SAMPLE_THRESHOLD: usize = 10;

/// Hard cap on the rolling sample window, bounding its allocation.
pub const MAX_SAMPLE_WINDOW: usize = 65_536;
