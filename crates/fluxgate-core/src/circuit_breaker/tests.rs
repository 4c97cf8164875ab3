#![allow(clippy::unwrap_used)]

use super::*;
use fluxgate_types::TransportError;
use std::sync::atomic::AtomicUsize;

fn breaker(threshold: u32) -> Arc<CircuitBreaker> {
    CircuitBreaker::new("db1:9160,0 secs", "db1", threshold, 1_000).unwrap()
}

fn record_states(breaker: &CircuitBreaker) -> Arc<parking_lot::Mutex<Vec<CircuitState>>> {
    let states = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    breaker.on_state_changed(Arc::new(move |event: &CircuitStateChanged| {
        sink.lock().push(event.new_state);
    }));
    states
}

fn refused() -> TransportError {
    TransportError::Refused { endpoint: "db1:9160".to_string(), message: "refused".to_string() }
}

fn timed_out() -> TransportError {
    TransportError::TimedOut { endpoint: "db1:9160".to_string(), timeout_ms: 500 }
}

#[test]
fn test_new_breaker_is_closed_with_full_service_level() {
    let breaker = breaker(2);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
    assert!((breaker.service_level() - 100.0).abs() < f64::EPSILON);
    assert!(breaker.is_ignored(FailureKind::Socket));
}

#[test]
fn test_invalid_arguments_rejected() {
    assert!(CircuitBreaker::new("", "db1", 2, 1_000).is_err());
    assert!(CircuitBreaker::new("id", " ", 2, 1_000).is_err());
    assert!(CircuitBreaker::new("id", "db1", 0, 1_000).is_err());
    assert!(CircuitBreaker::new("id", "db1", 2, 0).is_err());

    let breaker = breaker(2);
    assert!(breaker.set_threshold(0).is_err());
    assert!(breaker.set_reset_interval(0).is_err());
    assert!(breaker.set_node("").is_err());
    assert_eq!(breaker.threshold(), 2);
}

#[test]
fn test_breaker_trips_on_failure_after_threshold() {
    for threshold in 1..=10 {
        let breaker = breaker(threshold);
        for _ in 0..threshold {
            breaker.failure_occurred();
        }
        assert_eq!(breaker.state(), CircuitState::Closed, "threshold {threshold}");
        assert_eq!(breaker.failure_count(), threshold);

        breaker.failure_occurred();
        assert_eq!(breaker.state(), CircuitState::Open, "threshold {threshold}");
        assert_eq!(breaker.failure_count(), threshold);
    }
}

#[test]
fn test_service_level_follows_failure_count() {
    let breaker = breaker(4);
    breaker.failure_occurred();
    assert!((breaker.service_level() - 75.0).abs() < f64::EPSILON);
    breaker.failure_occurred();
    assert!((breaker.service_level() - 50.0).abs() < f64::EPSILON);
    breaker.operation_succeeded();
    assert!((breaker.service_level() - 75.0).abs() < f64::EPSILON);
}

#[test]
fn test_success_never_drives_count_negative() {
    let breaker = breaker(2);
    let levels = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&levels);
    breaker.on_service_level_changed(Arc::new(move |_: &CircuitBreaker| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    breaker.operation_succeeded();
    assert_eq!(breaker.failure_count(), 0);
    assert_eq!(levels.load(Ordering::SeqCst), 0);

    breaker.failure_occurred();
    breaker.operation_succeeded();
    breaker.operation_succeeded();
    assert_eq!(breaker.failure_count(), 0);
    assert_eq!(levels.load(Ordering::SeqCst), 2);
}

#[test]
fn test_trip_and_reset_emit_once() {
    let breaker = breaker(2);
    let states = record_states(&breaker);

    breaker.trip();
    breaker.trip();
    breaker.failure_occurred();
    assert_eq!(breaker.total_trips(), 1);

    breaker.reset();
    breaker.reset();
    assert_eq!(breaker.failure_count(), 0);

    assert_eq!(*states.lock(), vec![CircuitState::Open, CircuitState::Closed]);
}

#[test]
fn test_reset_from_open_zeroes_failures() {
    let breaker = breaker(1);
    breaker.failure_occurred();
    breaker.failure_occurred();
    assert!(breaker.is_open());

    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[test]
fn test_event_carries_node_identity() {
    let breaker = breaker(1);
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let sink = Arc::clone(&seen);
    breaker.on_state_changed(Arc::new(move |event: &CircuitStateChanged| {
        *sink.lock() = Some(event.clone());
    }));

    breaker.set_node("db1.internal").unwrap();
    breaker.trip();

    let event = seen.lock().clone().unwrap();
    assert_eq!(event.node_id, "db1:9160,0 secs");
    assert_eq!(event.host, "db1.internal");
    assert_eq!(event.new_state, CircuitState::Open);
}

#[test]
fn test_unsubscribed_listener_not_called() {
    let breaker = breaker(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let id = breaker.on_state_changed(Arc::new(move |_: &CircuitStateChanged| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(breaker.unsubscribe(id));
    breaker.trip();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_state_committed_before_listener_runs() {
    let breaker = breaker(1);
    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let weak = Arc::downgrade(&breaker);
    breaker.on_state_changed(Arc::new(move |_: &CircuitStateChanged| {
        if let Some(breaker) = weak.upgrade() {
            sink.lock().push(breaker.state());
        }
    }));

    breaker.trip();
    breaker.reset();
    assert_eq!(*observed.lock(), vec![CircuitState::Open, CircuitState::Closed]);
}

#[test]
fn test_concurrent_failures_are_not_lost() {
    let breaker = CircuitBreaker::new("db1:9160,0 secs", "db1", 1_000, 1_000).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..100 {
                    breaker.failure_occurred();
                }
            });
        }
    });

    assert_eq!(breaker.failure_count(), 800);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn test_concurrent_failures_trip_exactly_once() {
    let breaker = breaker(10);
    let states = record_states(&breaker);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    breaker.failure_occurred();
                }
            });
        }
    });

    assert!(breaker.is_open());
    assert!(breaker.failure_count() <= breaker.threshold());
    assert_eq!(*states.lock(), vec![CircuitState::Open]);
}

#[test]
fn test_racing_reset_is_notified_after_trip() {
    let breaker = breaker(1);
    let states = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let entered_tx = parking_lot::Mutex::new(entered_tx);
    let sink = Arc::clone(&states);
    breaker.on_state_changed(Arc::new(move |event: &CircuitStateChanged| {
        if event.new_state == CircuitState::Open {
            entered_tx.lock().send(()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        sink.lock().push(event.new_state);
    }));

    std::thread::scope(|scope| {
        scope.spawn(|| breaker.trip());
        entered_rx.recv().unwrap();
        breaker.reset();
    });

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(*states.lock(), vec![CircuitState::Open, CircuitState::Closed]);
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_goes_half_open_after_interval() {
    let breaker = breaker(1);
    let states = record_states(&breaker);

    breaker.failure_occurred();
    breaker.failure_occurred();
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // One-shot: no further transition without new outcomes
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(*states.lock(), vec![CircuitState::Open, CircuitState::HalfOpen]);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_success_closes() {
    let breaker = breaker(1);
    breaker.trip();
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.operation_succeeded();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens_and_rearms() {
    let breaker = breaker(3);
    let states = record_states(&breaker);
    breaker.trip();
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    breaker.failure_occurred();
    assert!(breaker.is_open());
    assert_eq!(breaker.total_trips(), 2);

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(
        *states.lock(),
        vec![CircuitState::Open, CircuitState::HalfOpen, CircuitState::Open, CircuitState::HalfOpen]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_pending_timer() {
    let breaker = breaker(1);
    let states = record_states(&breaker);
    breaker.trip();
    breaker.reset();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(*states.lock(), vec![CircuitState::Open, CircuitState::Closed]);
}

#[tokio::test(start_paused = true)]
async fn test_changing_interval_restarts_running_timer() {
    let breaker = breaker(1);
    breaker.trip();

    tokio::time::sleep(Duration::from_millis(500)).await;
    breaker.set_reset_interval(5_000).unwrap();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(4_100)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test]
async fn test_execute_counts_outcomes() {
    let breaker = breaker(1);

    let value = breaker.execute(|| async { Ok::<_, TransportError>(7) }).await.unwrap();
    assert_eq!(value, 7);

    let err = breaker.execute(|| async { Err::<(), _>(timed_out()) }).await.unwrap_err();
    assert!(matches!(err, ExecuteError::OperationFailed { .. }));
    assert_eq!(breaker.failure_count(), 1);

    breaker.execute(|| async { Err::<(), _>(timed_out()) }).await.unwrap_err();
    assert!(breaker.is_open());

    let err = breaker.execute(|| async { Ok::<_, TransportError>(1) }).await.unwrap_err();
    assert!(err.is_open());
    assert!(err.to_string().contains("db1:9160,0 secs"));
}

#[tokio::test]
async fn test_execute_passes_ignored_kinds_through() {
    let breaker = breaker(1);

    let err = breaker.execute(|| async { Err::<(), _>(refused()) }).await.unwrap_err();
    assert!(matches!(err, ExecuteError::Ignored(TransportError::Refused { .. })));
    assert_eq!(breaker.failure_count(), 0);

    breaker.set_ignored_kinds([]);
    let err = breaker.execute(|| async { Err::<(), _>(refused()) }).await.unwrap_err();
    assert!(matches!(err.into_inner(), Some(TransportError::Refused { .. })));
    assert_eq!(breaker.failure_count(), 1);
}

#[test]
fn test_manager_add_get_remove() {
    let manager = CircuitBreakerManager::new();

    assert!(manager.add_breaker("node-a", "db1", 2, 1_000).unwrap());
    assert!(!manager.add_breaker("node-a", "db1", 2, 1_000).unwrap());
    assert_eq!(manager.len(), 1);

    assert!(manager.get_breaker("node-a").unwrap().is_some());
    assert!(manager.get_breaker("node-b").unwrap().is_none());
    assert!(manager.get_breaker("").is_err());

    assert!(manager.remove_breaker("node-a").unwrap().is_some());
    assert!(manager.remove_breaker("node-a").unwrap().is_none());
    assert!(manager.remove_breaker(" ").is_err());
    assert!(manager.is_empty());
}

#[test]
fn test_manager_rejects_invalid_breaker_arguments() {
    let manager = CircuitBreakerManager::new();
    assert!(manager.add_breaker("", "db1", 2, 1_000).is_err());
    assert!(manager.add_breaker("node-a", "", 2, 1_000).is_err());
    assert!(manager.add_breaker("node-a", "db1", 0, 1_000).is_err());
    assert!(manager.add_breaker("node-a", "db1", 2, 0).is_err());
    assert!(manager.is_empty());
}

#[test]
fn test_manager_forwards_to_named_breaker() {
    let manager = CircuitBreakerManager::new();
    manager.add_breaker("node-a", "db1", 1, 1_000).unwrap();
    manager.add_breaker("node-b", "db2", 1, 1_000).unwrap();

    assert!(manager.forward_failure("node-a"));
    assert!(manager.forward_failure("node-a"));
    assert!(!manager.forward_failure("missing"));
    assert!(!manager.forward_success("missing"));

    let a = manager.get_breaker("node-a").unwrap().unwrap();
    let b = manager.get_breaker("node-b").unwrap().unwrap();
    assert!(a.is_open());
    assert_eq!(b.state(), CircuitState::Closed);

    let summary = manager.summary();
    assert_eq!(summary, BreakerSummary { closed: 1, open: 1, half_open: 0, total_trips: 1 });
}

#[test]
fn test_manager_wires_global_listeners() {
    let opened = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let levels = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&opened);
    let counter = Arc::clone(&levels);
    let manager = CircuitBreakerManager::with_listeners(
        Some(Arc::new(move |event: &CircuitStateChanged| {
            sink.lock().push(event.node_id.clone());
        })),
        Some(Arc::new(move |_: &CircuitBreaker| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );
    manager.add_breaker("node-a", "db1", 1, 1_000).unwrap();
    manager.add_breaker("node-b", "db2", 1, 1_000).unwrap();

    manager.forward_failure("node-b");
    manager.forward_failure("node-b");
    manager.forward_success("node-a");

    assert_eq!(*opened.lock(), vec!["node-b".to_string()]);
    assert_eq!(levels.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_may_reenter_manager() {
    let manager = Arc::new(CircuitBreakerManager::new());
    manager.add_breaker("node-a", "db1", 1, 1_000).unwrap();

    let breaker = manager.get_breaker("node-a").unwrap().unwrap();
    let inner = Arc::clone(&manager);
    breaker.on_state_changed(Arc::new(move |event: &CircuitStateChanged| {
        inner.remove_breaker(&event.node_id).unwrap();
    }));

    manager.forward_failure("node-a");
    manager.forward_failure("node-a");
    assert!(manager.is_empty());
}
