//! GIFSCRUB - animated image frames driven by an external clock
//!
//! Decodes multi-frame images from network, asset, file or memory sources,
//! caches decoded frame sets per source, and maps a progress value in [0,1]
//! to the frame to paint.

// Core engine (cache, clock, selector, workers)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;

// Re-export commonly used types from core
pub use crate::core::{AnimationClock, Engine, FrameCache, FrameSelector, LoadState, QueuedPool, Workers};

// Re-export entities
pub use config::Settings;
pub use entities::{Frame, FrameSet, LoadError, SourceDescriptor, SourceKey};
