//! Engine: the collaborators every selector is built with
//!
//! Bundles the frame cache handle, the worker pool, the byte fetcher and the
//! codec. Cloning is cheap and clones share everything, so one engine per
//! application (or per test) is the norm.

use log::info;
use std::sync::Arc;

use super::global_cache::FrameCache;
use super::selector::FrameSelector;
use super::workers::Workers;
use crate::config::Settings;
use crate::entities::{ByteFetcher, Codec, DefaultFetcher, DirBundle, ImageCodec, WorkerPool};

#[derive(Clone)]
pub struct Engine {
    cache: FrameCache,
    workers: Arc<dyn WorkerPool>,
    fetcher: Arc<dyn ByteFetcher>,
    codec: Arc<dyn Codec>,
}

impl Engine {
    pub fn new(
        cache: FrameCache,
        workers: Arc<dyn WorkerPool>,
        fetcher: Arc<dyn ByteFetcher>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            cache,
            workers,
            fetcher,
            codec,
        }
    }

    /// Engine on the process-wide cache with default fetch strategies and
    /// codec, sized from settings
    pub fn from_settings(settings: &Settings) -> Self {
        let threads = settings.worker_count();
        let fetcher = DefaultFetcher::new(Arc::new(DirBundle::new(&settings.asset_root)))
            .with_default_headers(settings.request_headers())
            .with_max_body_bytes(settings.max_body_bytes);

        info!(
            "Engine init: {} workers, assets at {}, body limit {} MB",
            threads,
            settings.asset_root.display(),
            settings.max_body_bytes / 1024 / 1024
        );

        Self::new(
            FrameCache::global(),
            Arc::new(Workers::new(threads)),
            Arc::new(fetcher),
            Arc::new(ImageCodec::new()),
        )
    }

    /// Same collaborators, different cache
    pub fn with_cache(mut self, cache: FrameCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_workers(mut self, workers: Arc<dyn WorkerPool>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// New selector sharing this engine
    pub fn selector(&self) -> FrameSelector {
        FrameSelector::new(self.clone())
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn workers(&self) -> Arc<dyn WorkerPool> {
        Arc::clone(&self.workers)
    }

    pub fn fetcher(&self) -> Arc<dyn ByteFetcher> {
        Arc::clone(&self.fetcher)
    }

    pub fn codec(&self) -> Arc<dyn Codec> {
        Arc::clone(&self.codec)
    }
}
