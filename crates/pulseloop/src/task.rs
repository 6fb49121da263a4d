//! Asynchronous-task façade over the precision loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::error;

use crate::cancel::CancelObserver;
use crate::driver::{self, ControlBlock, Hooks};
use crate::error::{CycleError, ErrorDirective, LoopError, LoopResult};
use crate::event::CycleEvent;
use crate::extent::Extent;
use crate::precision::PrecisionOption;

/// Future returned by an asynchronous cycle function.
///
/// The cycle receives its snapshot by value and returns it, carrying a
/// possible stop request back to the driver.
pub type CycleFuture = Pin<Box<dyn Future<Output = Result<CycleEvent, CycleError>> + Send>>;

type BoxedAsyncCycle = Box<dyn FnMut(CycleEvent, CancelObserver) -> CycleFuture + Send>;

struct Staged {
    cycle: BoxedAsyncCycle,
    hooks: Hooks,
}

/// Runs an asynchronous user cycle function at a fixed interval as a
/// long-running tokio task.
///
/// The 1 ms chunks of the residual delay are cooperative suspension points;
/// the final spin is synchronous and CPU-bound by design. Exactly one
/// execution of the cycle function is in flight at a time.
///
/// # Example
///
/// ```no_run
/// use pulseloop::{CycleEvent, Extent, PrecisionOption, PrecisionTask};
///
/// # async fn demo() {
/// let mut task = PrecisionTask::new(
///     |mut event: CycleEvent, _cancel| async move {
///         if event.event_index() >= 100 {
///             event.request_stop();
///         }
///         Ok(event)
///     },
///     Extent::from_millis(10.0),
///     PrecisionOption::Medium,
/// );
/// task.start().expect("task start failed");
/// task.wait_for_exit().await.expect("task failed");
/// # }
/// ```
pub struct PrecisionTask {
    ctrl: Arc<ControlBlock>,
    staged: Option<Staged>,
    worker: Option<tokio::task::JoinHandle<LoopResult<()>>>,
}

impl PrecisionTask {
    /// Creates a loop that will await `cycle` every `interval`.
    pub fn new<F, Fut>(mut cycle: F, interval: Extent, precision: PrecisionOption) -> Self
    where
        F: FnMut(CycleEvent, CancelObserver) -> Fut + Send + 'static,
        Fut: Future<Output = Result<CycleEvent, CycleError>> + Send + 'static,
    {
        let boxed: BoxedAsyncCycle = Box::new(move |event, cancel| Box::pin(cycle(event, cancel)));
        Self {
            ctrl: ControlBlock::new(interval, precision),
            staged: Some(Staged {
                cycle: boxed,
                hooks: Hooks::default(),
            }),
            worker: None,
        }
    }

    /// Installs the cycle failure hook.
    pub fn on_cycle_error<H>(mut self, hook: H) -> Self
    where
        H: FnMut(&CycleError) -> ErrorDirective + Send + 'static,
    {
        if let Some(staged) = self.staged.as_mut() {
            staged.hooks.on_error = Some(Box::new(hook));
        }
        self
    }

    /// Installs the finished hook.
    pub fn on_finished<H>(mut self, hook: H) -> Self
    where
        H: FnOnce(Option<&LoopError>) + Send + 'static,
    {
        if let Some(staged) = self.staged.as_mut() {
            staged.hooks.on_finished = Some(Box::new(hook));
        }
        self
    }

    /// Spawns the loop task.
    ///
    /// # Errors
    ///
    /// [`LoopError::AlreadyStarted`] on a second call,
    /// [`LoopError::Disposed`] after disposal.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, as `tokio::spawn` does.
    pub fn start(&mut self) -> LoopResult<()> {
        self.ctrl.begin_start()?;
        let Some(staged) = self.staged.take() else {
            return Err(LoopError::AlreadyStarted);
        };

        let ctrl = Arc::clone(&self.ctrl);
        self.worker = Some(tokio::spawn(driver::run_async(
            ctrl,
            staged.hooks,
            staged.cycle,
        )));
        Ok(())
    }

    /// Signals the loop to stop without blocking. Idempotent.
    pub fn dispose(&self) {
        self.ctrl.dispose();
    }

    /// Changes the target interval; picked up between cycles.
    pub fn set_interval(&self, interval: Extent) {
        self.ctrl.set_interval(interval);
    }

    /// Resolves after the loop has finalized and its finished hook returned.
    ///
    /// Resolves `Ok(())` on cancellation or a user stop request; returns the
    /// recorded failure otherwise. A loop that never started resolves
    /// immediately.
    pub async fn wait_for_exit(&mut self) -> LoopResult<()> {
        match self.worker.take() {
            Some(worker) => match worker.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!("cycle worker panicked");
                    }
                    Err(LoopError::WorkerPanicked)
                }
            },
            None => Ok(()),
        }
    }
}

impl Drop for PrecisionTask {
    fn drop(&mut self) {
        self.ctrl.dispose();
    }
}
