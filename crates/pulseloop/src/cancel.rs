//! Monotonic cancellation token.
//!
//! The loop driver owns a [`CancelSource`]; the delay primitive holds only a
//! [`CancelObserver`] — a weak view that cannot keep the source alive past
//! the loop's own lifetime. Once set, cancellation stays set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Owning side of a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    flag: Arc<AtomicBool>,
}

impl CancelSource {
    /// Creates a fresh, un-cancelled source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// A weak observer of this source.
    pub fn observer(&self) -> CancelObserver {
        CancelObserver {
            flag: Arc::downgrade(&self.flag),
        }
    }
}

/// Observing side of a cancellation token.
///
/// Holds only a weak reference: when the owning source is gone, the observer
/// reads as cancelled, since whatever the token guarded has ended.
#[derive(Debug, Clone)]
pub struct CancelObserver {
    flag: Weak<AtomicBool>,
}

impl CancelObserver {
    /// An observer that never reports cancellation.
    ///
    /// Useful for standalone delay calls that have nothing to interrupt
    /// them.
    pub fn never() -> Self {
        static NEVER: OnceLock<Arc<AtomicBool>> = OnceLock::new();
        let flag = NEVER.get_or_init(|| Arc::new(AtomicBool::new(false)));
        Self {
            flag: Arc::downgrade(flag),
        }
    }

    /// Whether cancellation has been signalled (or the source dropped).
    pub fn is_cancelled(&self) -> bool {
        match self.flag.upgrade() {
            Some(flag) => flag.load(Ordering::Acquire),
            None => true,
        }
    }
}
