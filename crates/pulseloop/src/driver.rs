//! Precision loop driver.
//!
//! One driver underlies all three façades: the shared [`ControlBlock`]
//! carries the lifecycle state machine, the cancellation source, and the
//! interval (re-read every cycle so it can change between cycles); the two
//! run functions execute the same cycle body, differing only in how the user
//! function is invoked and how the residual delay suspends.
//!
//! Lifecycle: `Created → Running → Finishing → Disposed`. `start` is legal
//! at most once; `dispose` is idempotent, cancels without blocking, and the
//! running cycle finalizes on its own worker. The finished hook runs exactly
//! once, before the completion handle resolves.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::cancel::{CancelObserver, CancelSource};
use crate::clock;
use crate::delay;
use crate::error::{CycleError, ErrorDirective, LoopError, LoopResult};
use crate::event::CycleEvent;
use crate::extent::Extent;
use crate::precision::PrecisionOption;
use crate::state::LoopState;
use crate::task::CycleFuture;

/// Lifecycle states of a loop instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Created,
    Running,
    Finishing,
    Disposed,
}

/// State shared between a façade and its worker.
pub(crate) struct ControlBlock {
    /// Serializes `dispose` against `start`; never held on the cycle path.
    phase: Mutex<Phase>,
    cancel: CancelSource,
    interval_ticks: AtomicI64,
    precision: PrecisionOption,
}

impl ControlBlock {
    pub(crate) fn new(interval: Extent, precision: PrecisionOption) -> Arc<Self> {
        Arc::new(Self {
            phase: Mutex::new(Phase::Created),
            cancel: CancelSource::new(),
            interval_ticks: AtomicI64::new(interval.ticks()),
            precision,
        })
    }

    /// Transitions `Created → Running`.
    pub(crate) fn begin_start(&self) -> LoopResult<()> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        match *phase {
            Phase::Created => {
                *phase = Phase::Running;
                Ok(())
            }
            Phase::Running | Phase::Finishing => Err(LoopError::AlreadyStarted),
            Phase::Disposed => Err(LoopError::Disposed),
        }
    }

    /// Requests cancellation without blocking. Idempotent.
    pub(crate) fn dispose(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        match *phase {
            Phase::Created => *phase = Phase::Disposed,
            Phase::Running => *phase = Phase::Finishing,
            Phase::Finishing | Phase::Disposed => {}
        }
        drop(phase);
        self.cancel.cancel();
    }

    /// Transitions `Running → Finishing` for an internally requested stop
    /// (user stop flag or fatal cycle failure). Idempotent.
    pub(crate) fn begin_finish(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == Phase::Running {
            *phase = Phase::Finishing;
        }
        drop(phase);
        self.cancel.cancel();
    }

    /// Marks finalization complete.
    pub(crate) fn finish(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        *phase = Phase::Disposed;
    }

    pub(crate) fn set_interval(&self, interval: Extent) {
        self.interval_ticks.store(interval.ticks(), Ordering::Release);
    }

    pub(crate) fn interval(&self) -> Extent {
        Extent::from_ticks(self.interval_ticks.load(Ordering::Acquire))
    }

    #[cfg(test)]
    pub(crate) fn cancel_source(&self) -> &CancelSource {
        &self.cancel
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// User-installable hooks, taken by the worker at start.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) on_error: Option<Box<dyn FnMut(&CycleError) -> ErrorDirective + Send>>,
    pub(crate) on_finished: Option<Box<dyn FnOnce(Option<&LoopError>) + Send>>,
}

/// Runs the loop to completion on the calling thread.
pub(crate) fn run_blocking<F>(
    ctrl: Arc<ControlBlock>,
    mut hooks: Hooks,
    mut cycle: F,
) -> LoopResult<()>
where
    F: FnMut(&mut CycleEvent) -> Result<(), CycleError>,
{
    let outcome = drive_blocking(&ctrl, &mut hooks, &mut cycle);
    if let Some(finished) = hooks.on_finished.take() {
        finished(outcome.as_ref().err());
    }
    ctrl.finish();
    debug!("precision loop finished");
    outcome
}

fn drive_blocking<F>(
    ctrl: &ControlBlock,
    hooks: &mut Hooks,
    cycle: &mut F,
) -> LoopResult<()>
where
    F: FnMut(&mut CycleEvent) -> Result<(), CycleError>,
{
    clock::ensure_resolution()?;
    let observer = ctrl.cancel.observer();
    let mut state = LoopState::new(ctrl.interval(), clock::now());
    let mut exit_error: Option<CycleError> = None;
    debug!(interval = %ctrl.interval(), "precision loop running");

    while !ctrl.cancel.is_cancelled() {
        let mut event = state.snapshot();
        let outcome = cycle(&mut event);
        let exit = resolve_cycle(
            ctrl,
            hooks,
            event.is_stop_requested(),
            outcome.err(),
            &mut exit_error,
        );

        let residual = state.next_delay();
        if residual > Extent::ZERO {
            if let Err(err) = delay::delay(residual, ctrl.precision, &observer) {
                warn!(error = %err, "residual delay failed");
            }
        }
        state.update(clock::now(), ctrl.interval());

        if exit {
            break;
        }
    }

    match exit_error {
        Some(source) => Err(LoopError::UserCycle(source)),
        None => Ok(()),
    }
}

/// Runs the loop to completion as a cooperative task.
pub(crate) async fn run_async<F>(
    ctrl: Arc<ControlBlock>,
    mut hooks: Hooks,
    mut cycle: F,
) -> LoopResult<()>
where
    F: FnMut(CycleEvent, CancelObserver) -> CycleFuture + Send,
{
    let outcome = drive_async(&ctrl, &mut hooks, &mut cycle).await;
    if let Some(finished) = hooks.on_finished.take() {
        finished(outcome.as_ref().err());
    }
    ctrl.finish();
    debug!("precision loop finished");
    outcome
}

async fn drive_async<F>(
    ctrl: &ControlBlock,
    hooks: &mut Hooks,
    cycle: &mut F,
) -> LoopResult<()>
where
    F: FnMut(CycleEvent, CancelObserver) -> CycleFuture + Send,
{
    clock::ensure_resolution()?;
    let observer = ctrl.cancel.observer();
    let mut state = LoopState::new(ctrl.interval(), clock::now());
    let mut exit_error: Option<CycleError> = None;
    debug!(interval = %ctrl.interval(), "precision loop running");

    while !ctrl.cancel.is_cancelled() {
        let event = state.snapshot();
        let (stop_requested, error) = match cycle(event, ctrl.cancel.observer()).await {
            Ok(returned) => (returned.is_stop_requested(), None),
            Err(err) => (false, Some(err)),
        };
        let exit = resolve_cycle(ctrl, hooks, stop_requested, error, &mut exit_error);

        let residual = state.next_delay();
        if residual > Extent::ZERO {
            if let Err(err) = delay::delay_async(residual, ctrl.precision, &observer).await {
                warn!(error = %err, "residual delay failed");
            }
        }
        state.update(clock::now(), ctrl.interval());

        if exit {
            break;
        }
    }

    match exit_error {
        Some(source) => Err(LoopError::UserCycle(source)),
        None => Ok(()),
    }
}

/// Applies the stop flag and failure hook after a user cycle returns.
///
/// Returns whether the loop should exit after the pending state update.
fn resolve_cycle(
    ctrl: &ControlBlock,
    hooks: &mut Hooks,
    stop_requested: bool,
    error: Option<CycleError>,
    exit_error: &mut Option<CycleError>,
) -> bool {
    let mut exit = false;

    if stop_requested {
        ctrl.begin_finish();
        exit = true;
    }

    if let Some(err) = error {
        let directive = match hooks.on_error.as_mut() {
            Some(hook) => hook(&err),
            None => ErrorDirective::Exit,
        };
        match directive {
            ErrorDirective::Continue => {
                debug!(error = %err, "cycle failure ignored by failure hook");
            }
            ErrorDirective::Exit => {
                ctrl.begin_finish();
                *exit_error = Some(err);
                exit = true;
            }
        }
    }

    exit
}
