//! Background-thread façade over the precision loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::driver::{self, ControlBlock, Hooks};
use crate::error::{CycleError, ErrorDirective, LoopError, LoopResult};
use crate::event::CycleEvent;
use crate::extent::Extent;
use crate::platform;
use crate::precision::PrecisionOption;

type BoxedCycle = Box<dyn FnMut(&mut CycleEvent) -> Result<(), CycleError> + Send>;

struct Staged {
    cycle: BoxedCycle,
    hooks: Hooks,
}

/// Runs a user cycle function at a fixed interval on a dedicated background
/// OS thread.
///
/// The cycle function executes on that thread and must not block it
/// indefinitely; cancellation cannot pre-empt a cycle that is already
/// running.
///
/// # Example
///
/// ```no_run
/// use pulseloop::{Extent, PrecisionOption, PrecisionThread};
///
/// let mut worker = PrecisionThread::new(
///     |event| {
///         println!("cycle {} at {:.1} Hz", event.event_index(), event.frequency());
///         Ok(())
///     },
///     Extent::from_millis(10.0),
///     PrecisionOption::High,
/// );
/// worker.start().expect("loop start failed");
/// // ... later ...
/// worker.dispose();
/// worker.wait_for_exit().expect("loop failed");
/// ```
pub struct PrecisionThread {
    ctrl: Arc<ControlBlock>,
    staged: Option<Staged>,
    worker: Option<JoinHandle<LoopResult<()>>>,
    name: String,
    high_priority: bool,
}

impl PrecisionThread {
    /// Creates a loop that will run `cycle` every `interval`.
    ///
    /// A non-positive interval is coerced to one clock tick when the loop
    /// starts.
    pub fn new<F>(cycle: F, interval: Extent, precision: PrecisionOption) -> Self
    where
        F: FnMut(&mut CycleEvent) -> Result<(), CycleError> + Send + 'static,
    {
        Self {
            ctrl: ControlBlock::new(interval, precision),
            staged: Some(Staged {
                cycle: Box::new(cycle),
                hooks: Hooks::default(),
            }),
            worker: None,
            name: "precision-cycle".to_string(),
            high_priority: false,
        }
    }

    /// Sets the worker thread name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Requests elevated scheduling priority for the worker thread.
    ///
    /// Failure to raise the priority is tolerated; the loop runs either way.
    pub fn with_high_priority(mut self, enabled: bool) -> Self {
        self.high_priority = enabled;
        self
    }

    /// Installs the cycle failure hook.
    ///
    /// Without one, any cycle failure exits the loop.
    pub fn on_cycle_error<H>(mut self, hook: H) -> Self
    where
        H: FnMut(&CycleError) -> ErrorDirective + Send + 'static,
    {
        if let Some(staged) = self.staged.as_mut() {
            staged.hooks.on_error = Some(Box::new(hook));
        }
        self
    }

    /// Installs the finished hook, invoked exactly once on exit with the
    /// exit error, if any.
    pub fn on_finished<H>(mut self, hook: H) -> Self
    where
        H: FnOnce(Option<&LoopError>) + Send + 'static,
    {
        if let Some(staged) = self.staged.as_mut() {
            staged.hooks.on_finished = Some(Box::new(hook));
        }
        self
    }

    /// Starts the loop on its worker thread.
    ///
    /// # Errors
    ///
    /// [`LoopError::AlreadyStarted`] on a second call,
    /// [`LoopError::Disposed`] after disposal, [`LoopError::Spawn`] when the
    /// worker thread cannot be created.
    pub fn start(&mut self) -> LoopResult<()> {
        self.ctrl.begin_start()?;
        let Some(staged) = self.staged.take() else {
            return Err(LoopError::AlreadyStarted);
        };

        let ctrl = Arc::clone(&self.ctrl);
        let high_priority = self.high_priority;
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            if high_priority && !platform::raise_thread_priority() {
                debug!("high-priority scheduling unavailable for cycle worker");
            }
            driver::run_blocking(ctrl, staged.hooks, staged.cycle)
        });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.ctrl.dispose();
                self.ctrl.finish();
                Err(LoopError::Spawn(err))
            }
        }
    }

    /// Signals the loop to stop without blocking. Idempotent.
    pub fn dispose(&self) {
        self.ctrl.dispose();
    }

    /// Changes the target interval; picked up between cycles.
    pub fn set_interval(&self, interval: Extent) {
        self.ctrl.set_interval(interval);
    }

    /// Blocks until the loop has finalized and its finished hook returned.
    ///
    /// Resolves `Ok(())` on cancellation or a user stop request; returns the
    /// recorded failure otherwise. A loop that never started resolves
    /// immediately.
    pub fn wait_for_exit(&mut self) -> LoopResult<()> {
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| {
                error!("cycle worker panicked");
                Err(LoopError::WorkerPanicked)
            }),
            None => Ok(()),
        }
    }
}

impl Drop for PrecisionThread {
    fn drop(&mut self) {
        self.ctrl.dispose();
    }
}
