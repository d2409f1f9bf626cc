//! End-to-end: a server running `PoolPlugin`, driven by host signals.

mod common;

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::TestFactory;
use stockpile_pool::prelude::*;
use stockpile_system::server::Server;
use stockpile_system::signal::HostSignals;

struct Harness {
    server: Server,
    signals: HostSignals,
    manager: PoolManager<TestFactory>,
    reclaims: Arc<AtomicUsize>,
}

fn harness(config: PoolConfig) -> Harness {
    let reclaims = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reclaims);

    let mut server = Server::new();
    server.add_plugins(
        PoolPlugin::new(TestFactory::new())
            .with_config(config)
            .with_reclaim_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    );
    server.finish();

    let signals = server.api::<HostSignals>().expect("signals").clone();
    let manager = server
        .get_global::<PoolManager<TestFactory>>()
        .expect("manager")
        .clone();

    Harness {
        server,
        signals,
        manager,
        reclaims,
    }
}

#[tokio::test]
async fn scope_lifetime_follows_host_signals() {
    let h = harness(PoolConfig::new().with_warm_up("bullet", 8));

    let level = h.signals.begin_scope("level-1");
    assert!(h.manager.has_scope(&level));
    assert_eq!(h.manager.warm_scope(&level).await.expect("warm"), 8);

    let shot = h.manager.acquire(&level, "bullet").await.expect("acquire");
    assert_eq!(h.manager.stats(&level, "bullet"), PoolStats::new(8, 1));
    assert_eq!(h.manager.factory().constructed("bullet"), 8);

    h.signals.end_scope(&level);
    assert!(!h.manager.has_scope(&level));
    assert!(shot.is_destroyed());
    assert_eq!(h.manager.factory().destroyed("bullet"), 8);
    assert_eq!(h.reclaims.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn overlapping_scopes_are_independent() {
    let h = harness(PoolConfig::default());

    let hub = h.signals.begin_scope("hub");
    let dungeon = h.signals.begin_scope("dungeon");
    let in_hub = h.manager.acquire(&hub, "torch").await.expect("acquire");
    let in_dungeon = h.manager.acquire(&dungeon, "torch").await.expect("acquire");

    h.signals.end_scope(&dungeon);
    assert!(in_dungeon.is_destroyed());
    assert!(!in_hub.is_destroyed());
    assert_eq!(h.manager.scopes(), vec![hub]);
}

#[tokio::test]
async fn shutdown_signal_tears_everything_down() {
    let mut h = harness(PoolConfig::default());

    for label in ["a", "b", "c"] {
        let s = h.signals.begin_scope(label);
        h.manager.create_pool(&s, "prop", 2).await.expect("warm");
    }

    h.signals.shutdown();
    assert_eq!(h.manager.scope_count(), 0);
    assert_eq!(h.manager.factory().total_destroyed(), 6);
    assert_eq!(h.signals.subscriber_count(), 0);
    assert_eq!(h.reclaims.load(Ordering::SeqCst), 1);

    // Server cleanup after a shutdown finds nothing left to do.
    h.server.cleanup();
    assert_eq!(h.manager.factory().total_destroyed(), 6);
}

#[tokio::test]
async fn server_cleanup_tears_down_live_scopes() {
    let mut h = harness(PoolConfig::default());
    let s = h.signals.begin_scope("menu");
    let _button = h.manager.acquire(&s, "button").await.expect("acquire");

    h.server.cleanup();
    assert_eq!(h.manager.scope_count(), 0);
    assert_eq!(h.manager.factory().destroyed("button"), 1);

    // Signals after cleanup no longer reach the manager.
    let late = h.signals.begin_scope("late");
    assert!(!h.manager.has_scope(&late));
}

#[tokio::test]
async fn reloaded_server_clears_the_earlier_session() {
    let manager = PoolManager::new(TestFactory::new());

    // First session ends without a cleanup, as when the host reloads.
    let mut first = Server::new();
    first.add_plugins(PoolPlugin::from_manager(manager.clone()));
    first.finish();
    let stale = first.api::<HostSignals>().expect("signals").begin_scope("level-1");
    let kept = manager.acquire(&stale, "enemy").await.expect("acquire");
    drop(first);
    assert!(manager.has_scope(&stale));

    let mut second = Server::new();
    second.add_plugins(PoolPlugin::from_manager(manager.clone()));
    second.finish();

    assert!(!manager.has_scope(&stale));
    assert_eq!(manager.scope_count(), 0);
    assert_eq!(manager.factory().destroyed("enemy"), 0);
    assert!(!kept.is_destroyed());

    let signals = second.api::<HostSignals>().expect("signals").clone();
    let level = signals.begin_scope("level-1");
    assert!(manager.has_scope(&level));
    let fresh = manager.acquire(&level, "enemy").await.expect("acquire");
    assert!(!fresh.ptr_eq(&kept));

    second.cleanup();
    assert_eq!(manager.factory().destroyed("enemy"), 1);
}
