//! Example host built on Stockpile.
//!
//! A game-like host plays a series of scenes. Each scene is a scope: sprites
//! spawned in it come from per-scene pools, are reused from wave to wave, and
//! are all destroyed when the scene ends.
//!
//! ```text
//! begin_scope("forest") ─ warm_scope ─┬─ wave: acquire ×N (concurrent)
//!                                     │         deactivate ×N
//!                                     ├─ wave: acquire ×N (reused)
//!                                     │         deactivate ×N
//!                                     └─ end_scope ─ destroy all
//! ```

mod sprites;
mod stage;

pub use sprites::{Sprite, SpriteFactory};
pub use stage::{SceneSummary, SpriteFactoryStats, Stage, StageError, Wave};
