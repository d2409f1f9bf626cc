//! Scope teardown, destroy failures and calls caught in flight.

mod common;

use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;

use common::{TestFactory, manager, scope};
use stockpile_pool::prelude::*;

fn counting_hook() -> (Arc<AtomicUsize>, Arc<dyn ReclaimHook>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let hook: Arc<dyn ReclaimHook> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (calls, hook)
}

#[tokio::test]
async fn teardown_destroys_idle_and_active_once() {
    let manager = manager(TestFactory::new());
    let s = scope(1, "level");

    manager.create_pool(&s, "enemy", 2).await.expect("warm");
    let a = manager.acquire(&s, "enemy").await.expect("acquire");
    let b = manager.acquire(&s, "enemy").await.expect("acquire");
    let c = manager.acquire(&s, "enemy").await.expect("acquire");
    b.deactivate();
    assert_eq!(manager.stats(&s, "enemy"), PoolStats::new(3, 2));

    let report = manager.teardown_scope(&s);
    assert_eq!(report.scope, s);
    assert_eq!(report.destroyed, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.deferred, 0);

    assert_eq!(manager.factory().destroyed("enemy"), 3);
    assert!([&a, &b, &c].iter().all(|i| i.is_destroyed() && !i.is_active()));
    assert_eq!(manager.stats(&s, "enemy"), PoolStats::default());
    assert!(!manager.has_scope(&s));

    // A second teardown finds nothing left.
    let again = manager.teardown_scope(&s);
    assert_eq!(again.destroyed, 0);
    assert_eq!(manager.factory().destroyed("enemy"), 3);
}

#[tokio::test]
async fn scope_can_be_reused_after_teardown() {
    let manager = manager(TestFactory::new());
    let level = scope(1, "level");
    let menu = scope(2, "menu");

    let old = manager.acquire(&level, "enemy").await.expect("acquire");
    let kept = manager.acquire(&menu, "enemy").await.expect("acquire");
    manager.create_pool(&level, "coin", 4).await.expect("warm");

    let report = manager.teardown_scope(&level);
    assert_eq!(report.destroyed, 5);

    // Other scopes are untouched.
    assert!(!kept.is_destroyed());
    assert_eq!(manager.stats(&menu, "enemy"), PoolStats::new(1, 1));

    // The same scope starts over with fresh pools.
    let fresh = manager.acquire(&level, "enemy").await.expect("acquire");
    assert!(!fresh.ptr_eq(&old));
    assert_eq!(manager.stats(&level, "enemy"), PoolStats::new(1, 1));
    assert_eq!(manager.stats(&level, "coin"), PoolStats::default());
}

#[tokio::test]
async fn destroy_failures_do_not_stop_the_sweep() {
    let manager = manager(TestFactory::new().failing_destroy("cursed"));
    let s = scope(1, "level");

    manager.create_pool(&s, "cursed", 2).await.expect("warm");
    manager.create_pool(&s, "plain", 3).await.expect("warm");

    let report = manager.teardown_scope(&s);
    assert_eq!(report.failed, 2);
    assert_eq!(report.destroyed, 3);
    assert_eq!(manager.factory().destroyed("plain"), 3);
    assert_eq!(manager.scope_stats(&s), Vec::new());
}

#[tokio::test]
async fn invalidated_instances_are_not_destroyed_again() {
    let manager = manager(TestFactory::new());
    let s = scope(1, "level");

    let a = manager.acquire(&s, "crate").await.expect("acquire");
    let _b = manager.acquire(&s, "crate").await.expect("acquire");
    a.mark_destroyed();

    let report = manager.teardown_scope(&s);
    assert_eq!(report.destroyed, 1);
    assert_eq!(manager.factory().destroyed("crate"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn teardown_during_construction_disposes_the_lock() {
    let manager = manager(TestFactory::new().gated("boss"));
    let s = scope(1, "level");

    let holder = {
        let manager = manager.clone();
        let s = s.clone();
        tokio::spawn(async move { manager.acquire(&s, "boss").await })
    };
    manager.factory().wait_gated().await;

    let waiter = {
        let manager = manager.clone();
        let s = s.clone();
        tokio::spawn(async move { manager.acquire(&s, "boss").await })
    };
    // Let the waiter queue up on the key lock.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let report = manager.teardown_scope(&s);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.destroyed, 0);

    manager.factory().open_gate(2);
    let held = holder.await.expect("join");
    assert!(matches!(held, Err(PoolError::LockDisposed { .. })), "{held:?}");
    let waited = waiter.await.expect("join");
    assert!(matches!(waited, Err(PoolError::LockDisposed { .. })), "{waited:?}");

    // The instance built for the torn-down scope did not outlive it.
    assert_eq!(manager.factory().constructed("boss"), 1);
    assert_eq!(manager.factory().destroyed("boss"), 1);
}

#[tokio::test]
async fn reset_during_construction_destroys_nothing() {
    let manager = manager(TestFactory::new().gated("boss"));
    let s = scope(1, "level");
    manager.create_pool(&s, "minion", 2).await.expect("warm");

    let holder = {
        let manager = manager.clone();
        let s = s.clone();
        tokio::spawn(async move { manager.acquire(&s, "boss").await })
    };
    manager.factory().wait_gated().await;

    assert_eq!(manager.reset(), 1);
    assert!(!manager.has_scope(&s));

    manager.factory().open_gate(1);
    let held = holder.await.expect("join");
    assert!(matches!(held, Err(PoolError::LockDisposed { .. })), "{held:?}");

    // Everything built before the reset, and the instance that finished
    // after it, is forgotten rather than destroyed.
    assert_eq!(manager.factory().total_constructed(), 3);
    assert_eq!(manager.factory().total_destroyed(), 0);

    // A later teardown of the same scope only sees what it built itself.
    let fresh = manager.acquire(&s, "minion").await.expect("acquire");
    let report = manager.teardown_scope(&s);
    assert_eq!(report.destroyed, 1);
    assert!(fresh.is_destroyed());
    assert_eq!(manager.factory().total_destroyed(), 1);
}

#[tokio::test]
async fn teardown_all_reclaims_once() {
    let (calls, hook) = counting_hook();
    let manager = PoolManager::with_settings(
        Arc::new(TestFactory::new()),
        PoolConfig::default(),
        hook,
    );

    for handle in 1..=3 {
        let s = scope(handle, "room");
        manager.create_pool(&s, "chair", 2).await.expect("warm");
    }
    assert_eq!(manager.scope_count(), 3);

    let reports = manager.teardown_all();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.destroyed == 2));
    assert_eq!(manager.factory().total_destroyed(), 6);
    assert_eq!(manager.scope_count(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reclaim_can_be_disabled() {
    let (calls, hook) = counting_hook();
    let manager = PoolManager::with_settings(
        Arc::new(TestFactory::new()),
        PoolConfig::new().with_reclaim_after_teardown(false),
        hook,
    );
    let s = scope(1, "level");
    manager.create_pool(&s, "enemy", 1).await.expect("warm");

    manager.teardown_scope(&s);
    manager.teardown_all();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn teardown_of_unknown_scope_still_reclaims() {
    let (calls, hook) = counting_hook();
    let manager = PoolManager::with_settings(
        Arc::new(TestFactory::new()),
        PoolConfig::default(),
        hook,
    );

    let report = manager.teardown_scope(&scope(42, "never"));
    assert_eq!(report.destroyed + report.failed + report.deferred, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn late_deactivation_is_harmless() {
    let manager = manager(TestFactory::new());
    let s = scope(1, "level");
    let instance = manager.acquire(&s, "enemy").await.expect("acquire");

    manager.teardown_scope(&s);
    assert!(!instance.deactivate(), "retired instances are already inactive");
    instance.mark_destroyed();
    instance.set_active(false);

    assert_eq!(manager.factory().destroyed("enemy"), 1);
    assert_eq!(manager.stats(&s, "enemy"), PoolStats::default());
}
