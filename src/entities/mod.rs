//! Entities module - data types and the capabilities the engine consumes
//!
//! - `source`: where bytes come from and how cache keys are derived
//! - `frame`: decoded frames and immutable frame sets
//! - `fetch`, `loader`: default byte fetching and decoding
//! - `traits`: capability interfaces (worker pool, fetcher, bundle, codec)

pub mod errors;
pub mod fetch;
pub mod frame;
pub mod loader;
pub mod source;
pub mod traits;

pub use errors::{DecodeError, FetchError, LoadError};
pub use fetch::{DefaultFetcher, DirBundle, MemoryBundle};
pub use frame::{Frame, FrameSet};
pub use loader::ImageCodec;
pub use source::{SourceDescriptor, SourceKey};
pub use traits::{AssetBundle, ByteFetcher, Codec, Job, WorkerPool};
