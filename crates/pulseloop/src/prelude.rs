//! Prelude module for common loop types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the crate.

pub use crate::cancel::{CancelObserver, CancelSource};
pub use crate::delay::{delay, delay_async};
pub use crate::error::{CycleError, ErrorDirective, LoopError, LoopResult};
pub use crate::event::CycleEvent;
pub use crate::extent::Extent;
pub use crate::precision::PrecisionOption;
pub use crate::task::{CycleFuture, PrecisionTask};
pub use crate::thread::PrecisionThread;
pub use crate::timer::PrecisionTimer;
pub use crate::{CHUNK_MS, SAMPLE_THRESHOLD};
