//! Scene playback demo.
//!
//! # Usage
//!
//! ```bash
//! scenes [wave_size]
//! ```
//!
//! Set `RUST_LOG=stockpile_pool=debug` to watch pools being warmed, reused
//! and torn down.

use core::time::Duration;

use example::{SpriteFactory, Stage, StageError, Wave};
use stockpile_core_plugins::TracingPlugin;
use stockpile_pool::prelude::*;
use stockpile_system::server::Server;

const DEFAULT_WAVE: usize = 8;

#[tokio::main]
async fn main() -> Result<(), StageError> {
    // Logging lives on its own server so the stage stays a plain pool host.
    let mut logging = Server::new();
    logging.add_plugins(TracingPlugin::default());
    logging.finish();

    let wave_size = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_WAVE);

    let factory = SpriteFactory::new([
        ("slime", 4),
        ("bat", 6),
        ("coin", 1),
        ("4c1d/torch", 3),
    ])
    .with_load_time(Duration::from_millis(5));
    let config = PoolConfig::new()
        .with_warm_up("slime", wave_size / 2)
        .with_warm_up("coin", wave_size);
    let stage = Stage::new(factory, config)?;

    let torch = PoolKey::from(AssetRef::new("4c1d").with_sub_asset("torch"));
    let scenes = [
        (
            "forest",
            vec![
                Wave::new("slime", wave_size),
                Wave::new("coin", wave_size),
                Wave::new("slime", wave_size),
            ],
        ),
        (
            "cave",
            vec![
                Wave::new("bat", wave_size),
                Wave::new(torch, 2),
                Wave::new("bat", wave_size * 2),
            ],
        ),
    ];

    for (label, waves) in &scenes {
        let summary = stage.play(label, waves).await?;
        tracing::info!(
            scene = %summary.scope,
            spawned = summary.spawned,
            peak_total = summary.peak.total,
            "scene finished"
        );
    }

    let stats = stage.shutdown();
    tracing::info!(built = stats.built, freed = stats.freed, "stage closed");
    logging.cleanup();
    Ok(())
}
