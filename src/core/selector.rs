//! Frame selection driven by an external clock
//!
//! **Why**: The displayed frame of an animated image follows a progress value
//! owned by someone else (an animation controller, a scrubber), not the
//! image's own per-frame delays.
//!
//! **Used by**: Presentation code, which binds a source, feeds progress and
//! paints `current_frame()` (or a placeholder while it is `None`).
//!
//! # State machine
//!
//! ```text
//! Unbound --bind--> Fetching --ok--> Ready
//!                       |  \--err--> Failed
//!   bind(other) from Ready/Failed --> Fetching (or Ready on cache hit)
//!   dispose() from anywhere --> Disposed (terminal)
//! ```
//!
//! # Request tokens
//!
//! Every bind issues a new token (the selector's epoch). A load carries the
//! token it was started with; when it completes, the result is applied only
//! if the token is still current and the selector is not disposed. Workers
//! also skip jobs whose token went stale before they started.
//!
//! # Delivery
//!
//! Loads finish on worker threads but are applied on the caller's thread:
//! results queue in a channel and are drained by `poll()`, `on_progress()`,
//! `current_frame()` and `render()`. Callbacks run after the selector's lock
//! is released, so they may call back into the selector.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, trace, warn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use super::clock::{AnimationClock, ListenerId, clamp_progress};
use super::engine::Engine;
use crate::entities::{Frame, FrameSet, LoadError, SourceDescriptor, SourceKey};

type ReadyHook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&LoadError) + Send + Sync>;
type Deferred = Vec<Box<dyn FnOnce()>>;

/// Longest single block inside `wait()`
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Observable selector state
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    /// Nothing bound yet
    Unbound,
    /// Fetch and decode in flight
    Fetching,
    /// Frames available
    Ready,
    /// Fetch or decode failed; bind another source or retry()
    Failed(LoadError),
    /// Terminal, every call is a no-op
    Disposed,
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, LoadState::Disposed)
    }
}

/// Frame index for `progress` in a set of `len` frames.
///
/// Fraction of the whole sequence: `floor((len - 1) * progress)`.
/// Progress is clamped to [0,1] first, so the result is always a valid index.
pub fn frame_index(len: usize, progress: f64) -> usize {
    if len <= 1 {
        return 0;
    }
    let last = len - 1;
    let idx = (last as f64 * clamp_progress(progress)).floor() as usize;
    idx.min(last)
}

/// Result of one fetch-and-decode unit
struct Completion {
    request: u64,
    key: SourceKey,
    result: Result<FrameSet, LoadError>,
}

struct SelectorState {
    state: LoadState,
    source: Option<SourceDescriptor>,
    key: Option<SourceKey>,
    frames: Option<FrameSet>,
    index: usize,
    /// Latest progress seen, applied when frames arrive
    progress: f64,
    subscription: Option<(AnimationClock, ListenerId)>,
    on_ready: Option<ReadyHook>,
    on_error: Option<ErrorHook>,
}

struct Shared {
    state: Mutex<SelectorState>,
    /// Current request token
    epoch: Arc<AtomicU64>,
    sender: Sender<Completion>,
    completions: Receiver<Completion>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply one finished load if it is still wanted
    fn apply(&self, st: &mut SelectorState, done: Completion, deferred: &mut Deferred) {
        if st.state.is_disposed() {
            trace!("Dropping load of {} after dispose", done.key);
            return;
        }
        let current = self.epoch.load(Ordering::Acquire);
        if done.request != current {
            trace!("Dropping stale load of {} (request {} != {})", done.key, done.request, current);
            return;
        }

        match done.result {
            Ok(frames) => {
                debug!("Ready: {} ({} frames)", done.key, frames.len());
                st.index = frame_index(frames.len(), st.progress);
                st.frames = Some(frames);
                st.state = LoadState::Ready;
                if let Some(cb) = st.on_ready.clone() {
                    deferred.push(Box::new(move || cb()));
                }
            }
            Err(err) => {
                warn!("Load of {} failed: {}", done.key, err);
                st.state = LoadState::Failed(err.clone());
                if let Some(cb) = st.on_error.clone() {
                    deferred.push(Box::new(move || cb(&err)));
                }
            }
        }
    }

    fn drain(&self, st: &mut SelectorState, deferred: &mut Deferred) {
        while let Ok(done) = self.completions.try_recv() {
            self.apply(st, done, deferred);
        }
    }

    fn poll(&self) {
        let mut deferred = Deferred::new();
        {
            let mut st = self.lock();
            self.drain(&mut st, &mut deferred);
        }
        run(deferred);
    }

    fn on_progress(&self, p: f64) -> bool {
        let p = clamp_progress(p);
        let mut deferred = Deferred::new();
        let changed = {
            let mut st = self.lock();
            if st.state.is_disposed() {
                return false;
            }
            let before = st.frames.as_ref().map(|_| st.index);
            self.drain(&mut st, &mut deferred);
            st.progress = p;

            let after = st.frames.as_ref().map(|f| frame_index(f.len(), p));
            if let Some(idx) = after {
                if Some(idx) != before {
                    trace!("Frame {} at progress {:.3}", idx, p);
                }
                st.index = idx;
            }
            after != before
        };
        run(deferred);
        changed
    }

    fn current_frame(&self) -> Option<Frame> {
        let mut deferred = Deferred::new();
        let frame = {
            let mut st = self.lock();
            self.drain(&mut st, &mut deferred);
            let idx = st.index;
            st.frames.as_ref().and_then(|f| f.get(idx).cloned())
        };
        run(deferred);
        frame
    }
}

fn run(deferred: Deferred) {
    for f in deferred {
        f();
    }
}

/// Per-instance driver: source binding, load tracking, progress → frame.
///
/// Dropping a selector disposes it.
pub struct FrameSelector {
    shared: Arc<Shared>,
    engine: Engine,
}

impl FrameSelector {
    pub fn new(engine: Engine) -> Self {
        let (sender, completions) = crossbeam_channel::unbounded();
        let state = SelectorState {
            state: LoadState::Unbound,
            source: None,
            key: None,
            frames: None,
            index: 0,
            progress: 0.0,
            subscription: None,
            on_ready: None,
            on_error: None,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                epoch: Arc::new(AtomicU64::new(0)),
                sender,
                completions,
            }),
            engine,
        }
    }

    /// Bind a source.
    ///
    /// No-op if the source derives the same key as the bound one. Otherwise
    /// the previous frames are dropped from this selector and the new source
    /// is taken from the cache (synchronously Ready) or loaded in the
    /// background (Fetching).
    pub fn bind(&self, source: SourceDescriptor) {
        // File keys touch the filesystem, derive before locking
        let key = source.key();
        let mut deferred = Deferred::new();

        let request = {
            let mut st = self.shared.lock();
            if st.state.is_disposed() {
                warn!("bind({:?}) on disposed selector ignored", source);
                return;
            }
            if st.key.as_ref() == Some(&key) {
                trace!("bind: {} already bound", key);
                return;
            }

            let request = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
            st.source = Some(source.clone());
            st.key = Some(key.clone());
            st.frames = None;
            st.index = 0;

            if self.take_cached(&mut st, &key, &mut deferred) {
                None
            } else {
                st.state = LoadState::Fetching;
                Some(request)
            }
        };

        if let Some(request) = request {
            debug!("Fetching {} from {} source (request {})", key, source.kind(), request);
            self.spawn_load(request, source, key);
        }
        run(deferred);
    }

    /// Reload the bound source after a failure.
    ///
    /// Returns false if the selector is not in the Failed state.
    pub fn retry(&self) -> bool {
        let mut deferred = Deferred::new();
        let job = {
            let mut st = self.shared.lock();
            let (LoadState::Failed(_), Some(source), Some(key)) =
                (&st.state, st.source.clone(), st.key.clone())
            else {
                return false;
            };

            let request = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
            if self.take_cached(&mut st, &key, &mut deferred) {
                None
            } else {
                st.state = LoadState::Fetching;
                Some((request, source, key))
            }
        };

        if let Some((request, source, key)) = job {
            debug!("Retrying {} (request {})", key, request);
            self.spawn_load(request, source, key);
        }
        run(deferred);
        true
    }

    /// Ready from the cache if it holds `key`
    fn take_cached(&self, st: &mut SelectorState, key: &SourceKey, deferred: &mut Deferred) -> bool {
        let Some(frames) = self.engine.cache().lookup(key) else {
            return false;
        };

        debug!("Cache hit: {} ({} frames)", key, frames.len());
        st.index = frame_index(frames.len(), st.progress);
        st.frames = Some(frames);
        st.state = LoadState::Ready;
        if let Some(cb) = st.on_ready.clone() {
            deferred.push(Box::new(move || cb()));
        }
        true
    }

    fn spawn_load(&self, request: u64, source: SourceDescriptor, key: SourceKey) {
        let cache = self.engine.cache().clone();
        let fetcher = self.engine.fetcher();
        let codec = self.engine.codec();
        let sender = self.shared.sender.clone();

        self.engine.workers().execute_with_epoch(
            Arc::clone(&self.shared.epoch),
            request,
            Box::new(move || {
                let started = Instant::now();
                let result = fetcher
                    .fetch(&source)
                    .map_err(LoadError::from)
                    .and_then(|bytes| codec.decode(&bytes).map_err(LoadError::from))
                    .map(|frames| cache.get_or_insert(key.clone(), || frames).0);

                trace!("Load of {} finished in {:?}", key, started.elapsed());
                // Receiver outlives us unless the selector was dropped
                let _ = sender.send(Completion { request, key, result });
            }),
        );
    }

    /// Apply finished loads. Hosts without an attached clock call this once
    /// per frame.
    pub fn poll(&self) {
        self.shared.poll();
    }

    /// Block until the current load finishes or `timeout` passes.
    ///
    /// Returns the state reached. Meant for tools and tests; UI code polls.
    pub fn wait(&self, timeout: Duration) -> LoadState {
        let deadline = Instant::now() + timeout;
        loop {
            let mut deferred = Deferred::new();
            let state = {
                let mut st = self.shared.lock();
                self.shared.drain(&mut st, &mut deferred);
                st.state.clone()
            };
            run(deferred);

            if state != LoadState::Fetching {
                return state;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return state;
            }

            // Another thread (an attached clock) may drain the completion
            // first, so re-check the state every slice
            match self.shared.completions.recv_timeout(remaining.min(WAIT_SLICE)) {
                Ok(done) => {
                    let mut deferred = Deferred::new();
                    {
                        let mut st = self.shared.lock();
                        self.shared.apply(&mut st, done, &mut deferred);
                    }
                    run(deferred);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return self.state(),
            }
        }
    }

    /// Feed a progress value in [0,1].
    ///
    /// Returns true if the frame to paint changed. Without frames the value
    /// is only remembered, so the first frame shown after loading matches it.
    pub fn on_progress(&self, progress: f64) -> bool {
        self.shared.on_progress(progress)
    }

    /// Subscribe to a clock, replacing any previous subscription.
    ///
    /// The clock's current progress is applied immediately.
    pub fn attach(&self, clock: &AnimationClock) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let id = clock.subscribe(move |p| {
            if let Some(shared) = weak.upgrade() {
                shared.on_progress(p);
            }
        });

        let previous = {
            let mut st = self.shared.lock();
            if st.state.is_disposed() {
                drop(st);
                clock.unsubscribe(id);
                return;
            }
            st.subscription.replace((clock.clone(), id))
        };
        if let Some((old, old_id)) = previous {
            old.unsubscribe(old_id);
        }

        self.shared.on_progress(clock.progress());
    }

    /// Unsubscribe from the clock, if any. Idempotent.
    pub fn detach(&self) {
        let subscription = self.shared.lock().subscription.take();
        if let Some((clock, id)) = subscription {
            clock.unsubscribe(id);
        }
    }

    /// Frame to paint, or None while nothing is loaded
    pub fn current_frame(&self) -> Option<Frame> {
        self.shared.current_frame()
    }

    /// Paint the current frame, or call `placeholder` with the state when
    /// there is none (loading, failed, unbound).
    pub fn render<T>(
        &self,
        paint: impl FnOnce(&Frame) -> T,
        placeholder: impl FnOnce(&LoadState) -> T,
    ) -> T {
        match self.current_frame() {
            Some(frame) => paint(&frame),
            None => placeholder(&self.state()),
        }
    }

    /// Called every time frames become available, cache hits included
    pub fn on_ready<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut st = self.shared.lock();
        if !st.state.is_disposed() {
            st.on_ready = Some(Arc::new(callback));
        }
    }

    /// Called when a load fails
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&LoadError) + Send + Sync + 'static,
    {
        let mut st = self.shared.lock();
        if !st.state.is_disposed() {
            st.on_error = Some(Arc::new(callback));
        }
    }

    pub fn state(&self) -> LoadState {
        self.shared.lock().state.clone()
    }

    /// Index of the frame to paint (0 until frames are loaded)
    pub fn frame_index(&self) -> usize {
        self.shared.lock().index
    }

    /// Number of loaded frames, 0 until ready
    pub fn frame_count(&self) -> usize {
        self.shared.lock().frames.as_ref().map_or(0, FrameSet::len)
    }

    /// Loaded frames, if any
    pub fn frames(&self) -> Option<FrameSet> {
        self.shared.lock().frames.clone()
    }

    /// Bound source, if any
    pub fn source(&self) -> Option<SourceDescriptor> {
        self.shared.lock().source.clone()
    }

    /// Cache key of the bound source, if any
    pub fn key(&self) -> Option<SourceKey> {
        self.shared.lock().key.clone()
    }

    /// Tear down. Idempotent; all later calls and completions are no-ops.
    pub fn dispose(&self) {
        let subscription = {
            let mut st = self.shared.lock();
            if st.state.is_disposed() {
                return;
            }
            // Invalidate any load in flight
            self.shared.epoch.fetch_add(1, Ordering::AcqRel);
            st.state = LoadState::Disposed;
            st.frames = None;
            st.index = 0;
            st.on_ready = None;
            st.on_error = None;
            debug!("Selector disposed ({:?})", st.key);
            st.subscription.take()
        };

        if let Some((clock, id)) = subscription {
            clock.unsubscribe(id);
        }
    }
}

impl Drop for FrameSelector {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for FrameSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("FrameSelector")
            .field("state", &st.state)
            .field("key", &st.key)
            .field("index", &st.index)
            .field("frames", &st.frames.as_ref().map(FrameSet::len))
            .finish()
    }
}
