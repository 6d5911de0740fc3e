//! Abstract traits for dependency inversion.
//!
//! These traits define the capabilities the selector consumes: running
//! background work, resolving a source to bytes, and decoding bytes into
//! frames. Default implementations live in `entities::fetch`,
//! `entities::loader` and `core::workers`; tests and embedders plug in
//! their own.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use super::errors::{DecodeError, FetchError};
use super::frame::FrameSet;
use super::source::SourceDescriptor;

/// Boxed unit of background work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Abstract worker pool interface.
///
/// Allows selectors to schedule the fetch-and-decode unit without knowing
/// the concrete thread pool implementation.
pub trait WorkerPool: Send + Sync {
    /// Execute closure on a worker.
    fn execute(&self, f: Job);

    /// Execute closure with epoch-based cancellation.
    ///
    /// If `epoch` no longer holds `expected` when a worker picks the job up,
    /// the closure is skipped. Once started, a job always runs to completion.
    fn execute_with_epoch(&self, epoch: Arc<AtomicU64>, expected: u64, f: Job);
}

/// Resolves a source descriptor to its raw bytes.
///
/// Called on a worker thread; blocking is fine.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<u8>, FetchError>;
}

/// Asset bundle lookup by resolved bundle key.
pub trait AssetBundle: Send + Sync {
    fn load(&self, key: &str) -> Result<Vec<u8>, FetchError>;
}

/// Decodes raw bytes into an ordered frame set.
pub trait Codec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<FrameSet, DecodeError>;
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute(&self, f: Job) {
        (**self).execute(f)
    }

    fn execute_with_epoch(&self, epoch: Arc<AtomicU64>, expected: u64, f: Job) {
        (**self).execute_with_epoch(epoch, expected, f)
    }
}

impl<T: ByteFetcher + ?Sized> ByteFetcher for Arc<T> {
    fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(source)
    }
}

impl<T: AssetBundle + ?Sized> AssetBundle for Arc<T> {
    fn load(&self, key: &str) -> Result<Vec<u8>, FetchError> {
        (**self).load(key)
    }
}

impl<T: Codec + ?Sized> Codec for Arc<T> {
    fn decode(&self, bytes: &[u8]) -> Result<FrameSet, DecodeError> {
        (**self).decode(bytes)
    }
}
