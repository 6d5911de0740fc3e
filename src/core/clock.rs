//! Externally driven animation clock.
//!
//! The clock owns no timer. A driver (display refresh callback, animation
//! controller, test) calls `set_progress(p)` and every subscriber is invoked
//! with the new value.
//!
//! Callback order: FIFO (first-subscribed, first-called).
//! Callbacks run outside the listener lock, so a callback may subscribe or
//! unsubscribe (itself included) without deadlocking.

use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Progress callback
type Listener = Arc<dyn Fn(f64) + Send + Sync>;

/// Handle returned by subscribe(), used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Clamp progress into [0,1]; NaN maps to 0
pub fn clamp_progress(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

#[derive(Default)]
struct ClockInner {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    // f64 bits
    progress: AtomicU64,
}

/// Shared progress source. Clones refer to the same clock.
#[derive(Clone, Default)]
pub struct AnimationClock {
    inner: Arc<ClockInner>,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to progress updates.
    ///
    /// # Example
    /// ```ignore
    /// let id = clock.subscribe(move |p| println!("progress {p}"));
    /// clock.set_progress(0.5);
    /// clock.unsubscribe(id);
    /// ```
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        trace!("Clock listener {:?} subscribed", id);
        id
    }

    /// Remove a listener. Idempotent: returns false if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if removed {
            trace!("Clock listener {:?} unsubscribed", id);
        }
        removed
    }

    /// Store new progress (clamped to [0,1]) and notify listeners
    pub fn set_progress(&self, p: f64) {
        let p = clamp_progress(p);
        self.inner.progress.store(p.to_bits(), Ordering::Relaxed);

        // Snapshot so callbacks run without holding the lock
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for cb in listeners {
            cb(p);
        }
    }

    /// Last progress value set
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.inner.progress.load(Ordering::Relaxed))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(1.5), 1.0);
        assert_eq!(clamp_progress(0.25), 0.25);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
    }

    #[test]
    fn test_subscribe_and_notify_in_order() {
        let clock = AnimationClock::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            clock.subscribe(move |p| seen.lock().unwrap().push((tag, p)));
        }

        clock.set_progress(0.5);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 0.5), ("b", 0.5)]);
        assert_eq!(clock.progress(), 0.5);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let clock = AnimationClock::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let id = clock.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        clock.set_progress(0.1);
        assert!(clock.unsubscribe(id));
        assert!(!clock.unsubscribe(id));
        clock.set_progress(0.2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let clock = AnimationClock::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let handle = clock.clone();
        let slot_cb = Arc::clone(&slot);
        let id = clock.subscribe(move |_| {
            if let Some(id) = *slot_cb.lock().unwrap() {
                handle.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        clock.set_progress(1.0);
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let clock = AnimationClock::new();
        let last = Arc::new(Mutex::new(None));
        let l = Arc::clone(&last);
        clock.subscribe(move |p| *l.lock().unwrap() = Some(p));

        clock.set_progress(3.0);
        assert_eq!(*last.lock().unwrap(), Some(1.0));
    }
}
