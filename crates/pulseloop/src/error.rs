//! Error types for the precision loop and delay primitives.

/// Error raised by a user cycle function.
///
/// Cycle functions are free to fail with any error type; the loop routes the
/// boxed failure through the failure hook and, when the hook decides to exit,
/// attaches it to the completion result.
pub type CycleError = Box<dyn std::error::Error + Send + Sync>;

/// Loop and delay errors.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// `start` was invoked more than once.
    #[error("precision loop already started")]
    AlreadyStarted,

    /// A lifecycle method was invoked after disposal.
    #[error("precision loop disposed")]
    Disposed,

    /// The platform one-shot timer could not be created or armed.
    ///
    /// Fatal to the single delay call that scheduled it; later delay calls
    /// start from a fresh timer and are unaffected.
    #[error("platform timer failure (os error {code})")]
    PlatformTimer {
        /// Native error code reported by the platform.
        code: i32,
    },

    /// The monotonic clock cannot supply the required resolution.
    #[error("monotonic clock resolution too coarse ({granule_ns} ns)")]
    ClockResolution {
        /// Smallest observed clock step in nanoseconds.
        granule_ns: u64,
    },

    /// The cycle worker could not be spawned.
    #[error("failed to spawn cycle worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The user cycle function failed and the failure hook requested exit.
    #[error("user cycle failed: {0}")]
    UserCycle(#[source] CycleError),

    /// The cycle worker panicked instead of returning.
    #[error("cycle worker panicked")]
    WorkerPanicked,
}

/// Result alias for loop operations.
pub type LoopResult<T = ()> = Result<T, LoopError>;

/// Decision returned by the cycle failure hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDirective {
    /// Keep cycling; the failure is dropped after the hook returns.
    Continue,
    /// Stop the loop; the failure is attached to the completion result.
    Exit,
}
