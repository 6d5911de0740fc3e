//! Core engine modules - cache, clock, selector, workers
//!
//! These modules form the frame engine, independent of any UI.

pub mod clock;
pub mod engine;
pub mod global_cache;
pub mod selector;
pub mod workers;

// Re-exports for convenience
pub use clock::{AnimationClock, ListenerId};
pub use engine::Engine;
pub use global_cache::{CacheStats, FrameCache};
pub use selector::{FrameSelector, LoadState, frame_index};
pub use workers::{QueuedPool, Workers};
