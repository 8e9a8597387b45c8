// tests/dependency_waiter.rs

use std::time::{Duration, Instant};

use cronlock::deps::DependencyWaiter;
use cronlock::errors::CronlockError;
use cronlock::lock::{LockCoordinator, LockId};
use cronlock_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

#[tokio::test]
async fn returns_immediately_when_nothing_is_held() {
    init_tracing();
    let dir = tempdir().unwrap();
    let waiter = DependencyWaiter::new(LockCoordinator::new(dir.path()));

    with_timeout(waiter.wait_all(&[])).await.unwrap();
    with_timeout(waiter.wait_all(&[LockId::new("a", None), LockId::new("b", None)]))
        .await
        .unwrap();
}

#[tokio::test]
async fn waits_until_every_dependency_is_released() {
    init_tracing();
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let a = LockId::new("a", None);
    let b = LockId::new("b", None);

    let lock_a = locks.acquire(&a).unwrap();
    let lock_b = locks.acquire(&b).unwrap();

    let releaser = {
        let locks = locks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            locks.release(lock_a).unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            locks.release(lock_b).unwrap();
        })
    };

    let started = Instant::now();
    let waiter = DependencyWaiter::new(locks.clone()).with_poll_interval(Duration::from_millis(20));
    with_timeout(waiter.wait_all(&[a.clone(), b.clone()])).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(!locks.is_held(&a).unwrap());
    assert!(!locks.is_held(&b).unwrap());
    releaser.await.unwrap();
}

#[tokio::test]
async fn optional_timeout_reports_pending_jobs() {
    init_tracing();
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let _held = locks.acquire(&LockId::new("slow", Some("prod"))).unwrap();

    let waiter = DependencyWaiter::new(locks.clone())
        .with_poll_interval(Duration::from_millis(20))
        .with_timeout(Some(Duration::from_millis(150)));

    let result = with_timeout(waiter.wait_all(&[
        LockId::new("slow", Some("prod")),
        LockId::new("fast", Some("prod")),
    ]))
    .await;

    match result {
        Err(CronlockError::DependencyTimeout { pending, .. }) => {
            assert_eq!(pending, vec!["slow".to_string()]);
        }
        Err(e) => panic!("Expected DependencyTimeout, got {:?}", e),
        Ok(()) => panic!("Expected DependencyTimeout, got Ok"),
    }
}

#[tokio::test]
async fn dependency_in_other_environment_does_not_block() {
    init_tracing();
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let _other = locks.acquire(&LockId::new("a", Some("staging"))).unwrap();

    let waiter = DependencyWaiter::new(locks);
    with_timeout(waiter.wait_all(&[LockId::new("a", Some("prod"))]))
        .await
        .unwrap();
}
