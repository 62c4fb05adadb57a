//! End-to-end breaker behavior driven through `BreakerHandle::execute` on paused time.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use agent_reliability::services::{BreakerError, CircuitState, FallbackTrigger};
use agent_reliability::{FailureKind, OperationError};
use common::{breaker, breaker_config};

async fn failing_call(
    handle: &agent_reliability::services::BreakerHandle,
    calls: &AtomicU32,
) -> Result<&'static str, BreakerError<OperationError>> {
    handle
        .execute(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OperationError::msg("upstream 503"))
            },
            || async { Ok("cached answer") },
            None,
        )
        .await
}

async fn healthy_call(
    handle: &agent_reliability::services::BreakerHandle,
    calls: &AtomicU32,
) -> Result<&'static str, BreakerError<OperationError>> {
    handle
        .execute(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("fresh answer")
            },
            || async { Ok("cached answer") },
            None,
        )
        .await
}

#[tokio::test(start_paused = true)]
async fn test_open_then_probe_then_close() {
    let (handle, sink) = breaker(breaker_config(3, 1000, 1));
    let calls = AtomicU32::new(0);

    // Failures below the threshold are surfaced to the caller
    for _ in 0..2 {
        let err = failing_call(&handle, &calls).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OperationFailure);
    }
    assert_eq!(handle.state().await, CircuitState::Closed);

    // The tripping failure is answered by the fallback
    assert_eq!(failing_call(&handle, &calls).await.unwrap(), "cached answer");
    assert_eq!(handle.state().await, CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // While open the operation is not invoked at all
    tokio::time::advance(Duration::from_millis(500)).await;
    assert_eq!(healthy_call(&handle, &calls).await.unwrap(), "cached answer");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // After the reset timeout one probe runs and closes the circuit
    tokio::time::advance(Duration::from_millis(1000)).await;
    assert_eq!(healthy_call(&handle, &calls).await.unwrap(), "fresh answer");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(handle.state().await, CircuitState::Closed);

    let metrics = handle.metrics().await;
    assert_eq!(metrics.consecutive_failures, 0);
    assert_eq!(metrics.fallbacks, 2);
    assert_eq!(metrics.rejected, 1);
    assert_eq!(metrics.open_count, 1);
    assert!(metrics.opened_at.is_none());
    // closed -> open, open -> half_open, half_open -> closed
    assert_eq!(sink.counter("circuit_breaker.state_change"), 3);
    assert_eq!(sink.counter("circuit_breaker.requests"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_single_failure_after_recovery_stays_closed() {
    let (handle, _sink) = breaker(breaker_config(3, 1000, 1));
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        failing_call(&handle, &calls).await.ok();
    }
    assert_eq!(handle.state().await, CircuitState::Open);

    tokio::time::advance(Duration::from_millis(1500)).await;
    assert_eq!(healthy_call(&handle, &calls).await.unwrap(), "fresh answer");
    assert_eq!(handle.state().await, CircuitState::Closed);

    // The failures that tripped the circuit no longer count
    let err = failing_call(&handle, &calls).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::OperationFailure);
    assert_eq!(handle.state().await, CircuitState::Closed);

    let metrics = handle.metrics().await;
    assert_eq!(metrics.consecutive_failures, 1);
    assert_eq!(metrics.recent_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens() {
    let (handle, _) = breaker(breaker_config(1, 1000, 2));
    let calls = AtomicU32::new(0);

    failing_call(&handle, &calls).await.unwrap();
    assert_eq!(handle.state().await, CircuitState::Open);

    tokio::time::advance(Duration::from_millis(1100)).await;
    assert_eq!(failing_call(&handle, &calls).await.unwrap(), "cached answer");
    assert_eq!(calls.load(Ordering::SeqCst), 2, "the probe must have run");

    let metrics = handle.metrics().await;
    assert_eq!(metrics.state, CircuitState::Open);
    assert_eq!(metrics.open_count, 2);
    assert_eq!(metrics.time_since_opened_ms, Some(0));

    // Reopening restarts the reset timer
    tokio::time::advance(Duration::from_millis(900)).await;
    healthy_call(&handle, &calls).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_needs_all_probe_successes() {
    let (handle, _) = breaker(breaker_config(1, 100, 2));
    let calls = AtomicU32::new(0);

    failing_call(&handle, &calls).await.unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;

    healthy_call(&handle, &calls).await.unwrap();
    assert_eq!(handle.state().await, CircuitState::HalfOpen);
    healthy_call(&handle, &calls).await.unwrap();
    assert_eq!(handle.state().await, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_beyond_probe_budget_use_fallback() {
    let (handle, sink) = breaker(breaker_config(1, 100, 1));
    let calls = AtomicU32::new(0);
    failing_call(&handle, &calls).await.unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;

    let slow_probe = handle.execute(
        || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, OperationError>("probe")
        },
        || async { Ok("fallback") },
        None,
    );
    let second = handle.execute(
        || async { Ok::<_, OperationError>("second") },
        || async { Ok("fallback") },
        None,
    );
    let (first, second) = tokio::join!(slow_probe, second);

    assert_eq!(first.unwrap(), "probe");
    assert_eq!(second.unwrap(), "fallback");
    assert_eq!(handle.state().await, CircuitState::Closed);
    assert_eq!(sink.counter("circuit_breaker.rejected"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_failure() {
    let (handle, sink) = breaker(breaker_config(2, 1000, 1));

    let err = handle
        .execute(
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, OperationError>(())
            },
            || async { Ok(()) },
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::TimeoutFailure);
    assert!(matches!(err, BreakerError::Timeout { after, .. } if after == Duration::from_millis(100)));
    let metrics = handle.metrics().await;
    assert_eq!(metrics.timeouts, 1);
    assert_eq!(metrics.consecutive_failures, 1);
    assert_eq!(sink.counter("circuit_breaker.timeout"), 1);

    let events = sink.errors();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_type, "timeout_failure");
    assert_eq!(events[0].attributes["circuit_state"], "closed");
    assert_eq!(events[0].attributes["consecutive_failures"], "1");
}

#[tokio::test]
async fn test_fallback_failure_carries_both_causes() {
    let (handle, sink) = breaker(breaker_config(1, 60_000, 1));

    let err = handle
        .execute(
            || async { Err::<(), _>(OperationError::msg("model overloaded")) },
            || async { Err(OperationError::new("cache_miss", "no cached answer")) },
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::FallbackFailure);
    match &err {
        BreakerError::FallbackFailed {
            trigger, fallback, ..
        } => {
            assert!(matches!(trigger, FallbackTrigger::Operation(e) if e.message == "model overloaded"));
            assert_eq!(fallback.kind, "cache_miss");
        }
        other => panic!("expected fallback failure, got {other}"),
    }
    let text = err.to_string();
    assert!(text.contains("Both primary operation and fallback failed"));
    assert!(sink
        .errors()
        .iter()
        .any(|event| event.error_type == "fallback_failure"));
}

#[tokio::test]
async fn test_disabled_breaker_passes_through() {
    let mut config = breaker_config(1, 60_000, 1);
    config.enabled = false;
    let (handle, sink) = breaker(config);
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let err = failing_call(&handle, &calls).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OperationFailure);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(handle.state().await, CircuitState::Closed);
    assert_eq!(sink.counter("circuit_breaker.requests"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_force_open_and_close() {
    let (handle, _) = breaker(breaker_config(5, 60_000, 1));
    let calls = AtomicU32::new(0);

    handle.force_open().await;
    assert_eq!(healthy_call(&handle, &calls).await.unwrap(), "cached answer");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    handle.force_close().await;
    assert_eq!(healthy_call(&handle, &calls).await.unwrap(), "fresh answer");
}
