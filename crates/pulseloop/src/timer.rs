//! Callback-timer façade over the precision loop.

use std::sync::{Arc, Mutex};

use crate::error::{LoopError, LoopResult};
use crate::event::CycleEvent;
use crate::extent::Extent;
use crate::precision::PrecisionOption;
use crate::thread::PrecisionThread;

type Handler = Box<dyn FnMut(&mut CycleEvent) + Send>;

/// A periodic timer exposing a single observer slot fired on each cycle.
///
/// The slot holds at most one subscriber; subscribing again replaces it. An
/// empty slot ticks idle. The observer runs on the timer's worker thread.
///
/// # Example
///
/// ```no_run
/// use pulseloop::{Extent, PrecisionOption, PrecisionTimer};
///
/// let mut timer = PrecisionTimer::new(Extent::from_hertz(75.0), PrecisionOption::Maximum);
/// timer.subscribe(|event| {
///     if event.missed_count() > 0 {
///         eprintln!("missed {} cycles", event.missed_count());
///     }
/// });
/// timer.start().expect("timer start failed");
/// ```
pub struct PrecisionTimer {
    inner: PrecisionThread,
    slot: Arc<Mutex<Option<Handler>>>,
}

impl PrecisionTimer {
    /// Creates a timer ticking every `interval`.
    pub fn new(interval: Extent, precision: PrecisionOption) -> Self {
        let slot: Arc<Mutex<Option<Handler>>> = Arc::new(Mutex::new(None));
        let cycle_slot = Arc::clone(&slot);

        let inner = PrecisionThread::new(
            move |event| {
                if let Ok(mut guard) = cycle_slot.lock() {
                    if let Some(handler) = guard.as_mut() {
                        handler(event);
                    }
                }
                Ok(())
            },
            interval,
            precision,
        )
        .with_name("precision-timer");

        Self { inner, slot }
    }

    /// Fills the observer slot, replacing any previous subscriber.
    pub fn subscribe<H>(&self, handler: H)
    where
        H: FnMut(&mut CycleEvent) + Send + 'static,
    {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(Box::new(handler));
        }
    }

    /// Empties the observer slot; the timer keeps ticking idle.
    pub fn unsubscribe(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }

    /// Installs the finished hook.
    pub fn on_finished<H>(mut self, hook: H) -> Self
    where
        H: FnOnce(Option<&LoopError>) + Send + 'static,
    {
        self.inner = self.inner.on_finished(hook);
        self
    }

    /// Starts the timer. See [`PrecisionThread::start`] for errors.
    pub fn start(&mut self) -> LoopResult<()> {
        self.inner.start()
    }

    /// Signals the timer to stop without blocking. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Changes the target interval; picked up between cycles.
    pub fn set_interval(&self, interval: Extent) {
        self.inner.set_interval(interval);
    }

    /// Blocks until the timer has finalized. See
    /// [`PrecisionThread::wait_for_exit`].
    pub fn wait_for_exit(&mut self) -> LoopResult<()> {
        self.inner.wait_for_exit()
    }
}
