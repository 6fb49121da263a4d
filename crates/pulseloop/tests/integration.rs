//! Integration tests for the precision loop.
//!
//! Timing assertions are deliberately tolerant: CI machines stall threads
//! for tens of milliseconds, so the tests pin down structural invariants and
//! leave tight timing claims to the benchmarks.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulseloop::{
    CycleEvent, ErrorDirective, Extent, LoopError, PrecisionOption, PrecisionTask,
    PrecisionThread, PrecisionTimer,
};

fn collect_events(events: &Arc<Mutex<Vec<CycleEvent>>>, event: &CycleEvent) {
    if let Ok(mut all) = events.lock() {
        all.push(*event);
    }
}

#[test]
fn test_thread_loop_statistics() {
    let events: Arc<Mutex<Vec<CycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    let mut worker = PrecisionThread::new(
        move |event| {
            collect_events(&sink, event);
            if event.event_index() >= 25 {
                event.request_stop();
            }
            Ok(())
        },
        Extent::from_millis(10.0),
        PrecisionOption::High,
    );

    worker.start().expect("start failed");
    worker.wait_for_exit().expect("loop failed");

    let events = events.lock().expect("events poisoned");
    assert!(events.len() >= 2, "expected several cycles");

    // Event indices advance by exactly one plus the reported misses.
    for pair in events.windows(2) {
        assert_eq!(
            pair[1].event_index() - pair[0].event_index(),
            1 + pair[1].missed_count(),
            "index advance mismatch at event {}",
            pair[1].event_index()
        );
    }

    // Discrete elapsed is exactly the sum of emitted interval measurements.
    let mut discrete_sum = 0i64;
    for event in events.iter() {
        discrete_sum += event.interval_elapsed().ticks();
        assert_eq!(event.discrete_elapsed().ticks(), discrete_sum);
    }

    // Accumulated misses match the per-cycle reports.
    let total: u64 = events.iter().map(|e| e.missed_count()).sum();
    let last = events.last().expect("no events");
    assert_eq!(last.total_missed(), total);

    // Statistics are sane once the window has warmed up.
    assert!(last.interval_jitter() >= Extent::ZERO);
    assert!(last.interval_average() > Extent::ZERO);
    assert!(last.frequency() > 0.0);

    // Discrete and natural clocks stay close; generous margin for CI.
    let gap = (last.discrete_elapsed() - last.natural_elapsed()).as_millis();
    assert!(gap.abs() < 20.0, "clock gap {gap} ms");
}

#[test]
fn test_stalled_cycle_reports_missed() {
    let events: Arc<Mutex<Vec<CycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);

    let mut worker = PrecisionThread::new(
        move |event| {
            collect_events(&sink, event);
            let call = counter.fetch_add(1, Ordering::SeqCst);
            if call == 3 {
                std::thread::sleep(Duration::from_millis(70));
            }
            if call >= 12 {
                event.request_stop();
            }
            Ok(())
        },
        Extent::from_millis(20.0),
        PrecisionOption::High,
    );

    worker.start().expect("start failed");
    worker.wait_for_exit().expect("loop failed");

    let events = events.lock().expect("events poisoned");

    // The 70 ms stall at a 20 ms interval skips at least two boundaries.
    assert!(
        events.iter().any(|e| e.missed_count() >= 2),
        "no missed cycles reported"
    );
    for pair in events.windows(2) {
        assert_eq!(
            pair[1].event_index() - pair[0].event_index(),
            1 + pair[1].missed_count()
        );
    }
    let total: u64 = events.iter().map(|e| e.missed_count()).sum();
    assert_eq!(events.last().expect("no events").total_missed(), total);
}

#[test]
fn test_stop_flag_halts_loop() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);

    let mut worker = PrecisionThread::new(
        move |event| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 10 {
                event.request_stop();
            }
            Ok(())
        },
        Extent::from_millis(5.0),
        PrecisionOption::Default,
    );

    worker.start().expect("start failed");
    worker.wait_for_exit().expect("loop failed");

    let at_exit = calls.load(Ordering::SeqCst);
    assert_eq!(at_exit, 10);

    // No further cycles after the completion resolves.
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(calls.load(Ordering::SeqCst), at_exit);
}

#[test]
fn test_start_then_immediate_dispose_resolves() {
    let finished = Arc::new(AtomicUsize::new(0));
    let hook_counter = Arc::clone(&finished);

    let mut worker = PrecisionThread::new(
        |_| Ok(()),
        Extent::from_millis(10.0),
        PrecisionOption::Default,
    )
    .on_finished(move |error| {
        assert!(error.is_none(), "cancellation is not an error");
        hook_counter.fetch_add(1, Ordering::SeqCst);
    });

    worker.start().expect("start failed");
    worker.dispose();
    worker.dispose();
    worker.wait_for_exit().expect("cancelled loop must resolve Ok");

    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_user_error_attaches_to_completion() {
    let finished_error = Arc::new(AtomicUsize::new(0));
    let hook_counter = Arc::clone(&finished_error);

    let mut worker = PrecisionThread::new(
        |event| {
            if event.event_index() >= 2 {
                return Err("boom".into());
            }
            Ok(())
        },
        Extent::from_millis(1.0),
        PrecisionOption::Default,
    )
    .on_finished(move |error| {
        if error.is_some() {
            hook_counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    worker.start().expect("start failed");
    let err = worker.wait_for_exit().expect_err("loop must fail");

    assert!(matches!(err, LoopError::UserCycle(_)));
    assert!(err.to_string().contains("boom"));
    assert_eq!(finished_error.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failure_hook_can_continue() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);
    let hook_calls = Arc::new(AtomicU64::new(0));
    let hook_counter = Arc::clone(&hook_calls);

    let mut worker = PrecisionThread::new(
        move |event| {
            counter.fetch_add(1, Ordering::SeqCst);
            if event.event_index() >= 5 {
                event.request_stop();
            }
            Err("transient".into())
        },
        Extent::from_millis(1.0),
        PrecisionOption::Default,
    )
    .on_cycle_error(move |_| {
        hook_counter.fetch_add(1, Ordering::SeqCst);
        ErrorDirective::Continue
    });

    worker.start().expect("start failed");
    worker.wait_for_exit().expect("continued loop must resolve Ok");

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(
        hook_calls.load(Ordering::SeqCst),
        calls.load(Ordering::SeqCst)
    );
}

#[test]
fn test_interval_change_is_observed() {
    let events: Arc<Mutex<Vec<CycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    let mut worker = PrecisionThread::new(
        move |event| {
            collect_events(&sink, event);
            Ok(())
        },
        Extent::from_millis(5.0),
        PrecisionOption::Default,
    );

    worker.start().expect("start failed");
    std::thread::sleep(Duration::from_millis(40));
    worker.set_interval(Extent::from_millis(15.0));
    std::thread::sleep(Duration::from_millis(80));
    worker.dispose();
    worker.wait_for_exit().expect("loop failed");

    let events = events.lock().expect("events poisoned");
    assert!(events
        .iter()
        .any(|e| e.interval() == Extent::from_millis(5.0)));
    assert!(events
        .iter()
        .any(|e| e.interval() == Extent::from_millis(15.0)));
}

#[test]
fn test_non_positive_interval_still_runs() {
    let mut worker = PrecisionThread::new(
        |event| {
            if event.event_index() >= 2 {
                event.request_stop();
            }
            Ok(())
        },
        Extent::ZERO,
        PrecisionOption::Default,
    );

    worker.start().expect("start failed");
    worker.wait_for_exit().expect("coerced interval loop failed");
}

#[test]
fn test_timer_single_observer_slot() {
    let fired = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&fired);

    let mut timer = PrecisionTimer::new(Extent::from_millis(5.0), PrecisionOption::Default);
    timer.subscribe(move |event| {
        if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 5 {
            event.request_stop();
        }
    });

    timer.start().expect("timer start failed");
    timer.wait_for_exit().expect("timer failed");

    assert_eq!(fired.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_task_runs_and_stops() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);

    let mut task = PrecisionTask::new(
        move |mut event: CycleEvent, _cancel| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 5 {
                    event.request_stop();
                }
                Ok(event)
            }
        },
        Extent::from_millis(5.0),
        PrecisionOption::Default,
    );

    task.start().expect("task start failed");
    task.wait_for_exit().await.expect("task failed");

    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_task_dispose_resolves() {
    let mut task = PrecisionTask::new(
        |event: CycleEvent, _cancel| async move { Ok(event) },
        Extent::from_millis(5.0),
        PrecisionOption::Default,
    );

    task.start().expect("task start failed");
    tokio::time::sleep(Duration::from_millis(20)).await;
    task.dispose();
    task.wait_for_exit().await.expect("cancelled task must resolve Ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_task_error_attaches_to_completion() {
    let mut task = PrecisionTask::new(
        |event: CycleEvent, _cancel| async move {
            if event.event_index() >= 2 {
                return Err("task boom".into());
            }
            Ok(event)
        },
        Extent::from_millis(1.0),
        PrecisionOption::Default,
    );

    task.start().expect("task start failed");
    let err = task.wait_for_exit().await.expect_err("task must fail");
    assert!(matches!(err, LoopError::UserCycle(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_task_observes_cancellation_mid_cycle() {
    let mut task = PrecisionTask::new(
        |mut event: CycleEvent, cancel| async move {
            // A cooperative cycle polls the observer during long work.
            for _ in 0..100 {
                if cancel.is_cancelled() {
                    event.request_stop();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            Ok(event)
        },
        Extent::from_millis(5.0),
        PrecisionOption::Default,
    );

    task.start().expect("task start failed");
    tokio::time::sleep(Duration::from_millis(10)).await;
    task.dispose();
    task.wait_for_exit().await.expect("task failed");
}

#[test]
fn test_delay_mean_close_to_target() {
    let cancel = pulseloop::CancelObserver::never();
    let target = Extent::from_millis(5.0);
    let mut total = Extent::ZERO;
    const RUNS: usize = 5;

    for _ in 0..RUNS {
        let elapsed = pulseloop::delay(target, PrecisionOption::Maximum, &cancel)
            .expect("delay failed");
        assert!(elapsed >= target);
        total = total + elapsed;
    }

    let mean = total / RUNS as f64;
    // Generous upper bound: CI schedulers overshoot freely.
    assert!(mean < Extent::from_millis(25.0), "mean {mean}");
}
