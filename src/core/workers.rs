//! Thread pools for the fetch-and-decode unit
//!
//! `Workers` uses work-stealing deques:
//! - New tasks go to the global injector, polled before stealing
//! - Workers steal from each other when idle
//!
//! `QueuedPool` keeps jobs until the host drains them on its own thread.
//!
//! Both support epoch checks: a job tagged with an epoch value is skipped if
//! its selector re-bound or was disposed before the job started.

use crossbeam::deque::{Injector, Worker};
use log::trace;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::entities::{Job, WorkerPool};

/// Wrap a job so it only runs while `epoch` still holds `expected`
fn epoch_guarded(epoch: Arc<AtomicU64>, expected: u64, f: Job) -> Job {
    Box::new(move || {
        // Checked at execution time, not enqueue time
        if epoch.load(Ordering::Acquire) == expected {
            f();
        } else {
            trace!("Skipping stale job (epoch {} != {})", epoch.load(Ordering::Relaxed), expected);
        }
    })
}

/// Background worker pool with work-stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4);
/// workers.execute(Box::new(move || {
///     let bytes = fetcher.fetch(&source);
///     // ...
/// }));
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,           // Global queue for external tasks
    handles: Vec<thread::JoinHandle<()>>,   // Thread handles for proper shutdown
    shutdown: Arc<AtomicBool>,              // Shutdown signal
}

impl Workers {
    /// Create worker pool with work-stealing deques.
    ///
    /// Recommended: `num_cpus::get() * 3 / 4` (leave 25% for the UI thread).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers_local: Vec<Worker<Job>> = Vec::new();
        let mut stealers = Vec::new();
        let mut handles = Vec::new();

        // Create per-worker deques
        for _ in 0..num_threads {
            let worker: Worker<Job> = Worker::new_fifo();
            stealers.push(worker.stealer());
            workers_local.push(worker);
        }

        // Spawn worker threads
        for (worker_id, worker) in workers_local.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("gifscrub-worker-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);

                    loop {
                        // 1. Own queue first
                        if let Some(job) = worker.pop() {
                            job();
                            continue;
                        }

                        // 2. Global injector
                        if let Some(job) = injector.steal_batch_and_pop(&worker).success() {
                            job();
                            continue;
                        }

                        // 3. Steal from other workers
                        if let Some(job) = stealers.iter().find_map(|s| s.steal().success()) {
                            job();
                            continue;
                        }

                        // 4. Drain before honoring shutdown
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }

                        // 5. No work - short sleep to avoid CPU spin
                        thread::sleep(std::time::Duration::from_millis(1));
                    }

                    trace!("Worker {} stopped", worker_id);
                })
                .expect("Failed to spawn worker thread");

            handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);

        Self {
            injector,
            handles,
            shutdown,
        }
    }

    /// Number of worker threads
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl WorkerPool for Workers {
    fn execute(&self, f: Job) {
        self.injector.push(f);
    }

    fn execute_with_epoch(&self, epoch: Arc<AtomicU64>, expected: u64, f: Job) {
        self.injector.push(epoch_guarded(epoch, expected, f));
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        use std::time::{Duration, Instant};

        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // A blocked network fetch can outlive the pool; don't wait on it forever
        let deadline = Instant::now() + Duration::from_millis(500);

        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, exiting anyway");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped gracefully", num_threads);
    }
}

/// Pool that runs jobs on the caller's thread when drained.
///
/// For hosts that schedule loads from their own event loop (idle callbacks,
/// single-threaded runtimes) and for deterministic tests.
#[derive(Default)]
pub struct QueuedPool {
    queue: Mutex<VecDeque<Job>>,
}

impl QueuedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting to run
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run the oldest job. Returns false if the queue was empty.
    pub fn run_one(&self) -> bool {
        // Lock released before running, jobs may enqueue more work
        let job = self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while self.run_one() {
            count += 1;
        }
        count
    }
}

impl WorkerPool for QueuedPool {
    fn execute(&self, f: Job) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).push_back(f);
    }

    fn execute_with_epoch(&self, epoch: Arc<AtomicU64>, expected: u64, f: Job) {
        self.execute(epoch_guarded(epoch, expected, f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_workers_run_jobs() {
        let workers = Workers::new(2);
        let (tx, rx) = crossbeam_channel::unbounded();

        for i in 0..10 {
            let tx = tx.clone();
            workers.execute(Box::new(move || {
                tx.send(i).unwrap();
            }));
        }

        let mut got: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_workers_skip_stale_epoch() {
        let workers = Workers::new(1);
        let epoch = Arc::new(AtomicU64::new(5));
        let (tx, rx) = crossbeam_channel::unbounded();

        let stale = tx.clone();
        workers.execute_with_epoch(Arc::clone(&epoch), 4, Box::new(move || {
            stale.send("stale").unwrap();
        }));
        workers.execute_with_epoch(Arc::clone(&epoch), 5, Box::new(move || {
            tx.send("current").unwrap();
        }));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "current");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_queued_pool_runs_on_drain() {
        let pool = QueuedPool::new();
        let epoch = Arc::new(AtomicU64::new(1));
        let hits = Arc::new(AtomicU64::new(0));

        for expected in [1, 1, 2] {
            let hits = Arc::clone(&hits);
            pool.execute_with_epoch(Arc::clone(&epoch), expected, Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(pool.pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Bumping the epoch before draining cancels the queued jobs for 1
        epoch.store(2, Ordering::SeqCst);
        assert_eq!(pool.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!pool.run_one());
    }
}
