//! Circuit breaker behaviour under concurrent load.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serving_resilience::resilience::{
    CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};

mod common;

fn fast_breaker(name: &str) -> Arc<CircuitBreaker> {
    let config = CircuitBreakerConfig::default()
        .with_failure_threshold(3)
        .with_recovery_timeout_seconds(1.0)
        .with_success_threshold(2);
    Arc::new(CircuitBreaker::new(name, config))
}

async fn fail(breaker: &CircuitBreaker) {
    let res: Result<(), CallError<&str>> = breaker.call(|| async { Err("boom") }).await;
    assert!(matches!(res, Err(CallError::Operation("boom"))));
}

#[tokio::test]
async fn test_concurrent_rejection_never_invokes_operation() {
    let breaker = fast_breaker("model-a");
    for _ in 0..3 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let invocations = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();
    for _ in 0..50 {
        let breaker = breaker.clone();
        let invocations = invocations.clone();
        handles.push(tokio::spawn(async move {
            breaker
                .call(|| async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                })
                .await
        }));
    }

    for handle in handles {
        let res = handle.await.unwrap();
        assert!(res.unwrap_err().is_open());
    }

    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    let stats = breaker.stats();
    assert_eq!(stats.total_rejections, 50);
    assert_eq!(stats.total_requests, 53);
}

#[tokio::test]
async fn test_counter_identity_under_mixed_load() {
    let breaker = Arc::new(CircuitBreaker::new(
        "mixed",
        CircuitBreakerConfig::default()
            .with_failure_threshold(4)
            .with_recovery_timeout_seconds(0.05),
    ));

    let mut handles = Vec::new();
    for i in 0..200u32 {
        let breaker = breaker.clone();
        handles.push(tokio::spawn(async move {
            let _ = breaker
                .call(|| async move {
                    tokio::time::sleep(Duration::from_millis((i % 5) as u64)).await;
                    if i % 3 == 0 {
                        Err("flaky")
                    } else {
                        Ok(i)
                    }
                })
                .await;
        }));
        if i % 20 == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = breaker.stats();
    assert_eq!(stats.total_requests, 200);
    assert_eq!(
        stats.total_requests,
        stats.total_successes + stats.total_failures + stats.total_rejections
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_recovery_cycle() {
    let breaker = fast_breaker("cycle");
    for _ in 0..3 {
        fail(&breaker).await;
    }

    tokio::time::advance(Duration::from_millis(500)).await;
    let res: Result<(), CallError<()>> = breaker.call(|| async { Ok(()) }).await;
    assert!(res.unwrap_err().is_open());

    tokio::time::advance(Duration::from_millis(500)).await;
    let res: Result<u32, CallError<()>> = breaker.call(|| async { Ok(1) }).await;
    assert_eq!(res.unwrap(), 1);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let res: Result<u32, CallError<()>> = breaker.call(|| async { Ok(2) }).await;
    assert_eq!(res.unwrap(), 2);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_only_one_trial_while_half_open() {
    let breaker = fast_breaker("trial");
    for _ in 0..3 {
        fail(&breaker).await;
    }
    tokio::time::advance(Duration::from_secs(1)).await;

    let backend = common::CountingBackend::slow("ok", Duration::from_millis(200));
    let request = serving_resilience::GenerateRequest::new("probe");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let breaker = breaker.clone();
        let backend = backend.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            use serving_resilience::fallback::InferenceBackend;
            breaker.call(|| backend.invoke(&request)).await.is_ok()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(backend.calls(), 1);
    assert_eq!(breaker.stats().total_rejections, 9);
}

#[tokio::test]
async fn test_registry_is_shared_across_tasks() {
    let registry = Arc::new(CircuitBreakerRegistry::new());

    let mut handles = Vec::new();
    for i in 0..16u32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let config = CircuitBreakerConfig::default().with_failure_threshold(i + 1);
            registry.get_or_create("shared", config)
        }));
    }

    let mut breakers = Vec::new();
    for handle in handles {
        breakers.push(handle.await.unwrap());
    }

    assert_eq!(registry.len(), 1);
    let first = &breakers[0];
    assert!(breakers.iter().all(|b| Arc::ptr_eq(b, first)));
}

#[tokio::test]
async fn test_reset_after_trip_allows_immediate_call() {
    let registry = CircuitBreakerRegistry::new();
    let breaker = registry.get_or_create("manual", CircuitBreakerConfig::default());
    for _ in 0..3 {
        fail(&breaker).await;
    }
    assert_eq!(registry.open_circuits(), vec!["manual".to_string()]);

    assert!(registry.reset("manual"));
    let res: Result<&str, CallError<()>> = breaker.call(|| async { Ok("through") }).await;
    assert_eq!(res.unwrap(), "through");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(registry.open_circuits().is_empty());
}
