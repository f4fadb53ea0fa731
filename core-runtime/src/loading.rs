//! # Loading State
//!
//! Application-wide "something is loading" flag with an explicit owner.
//!
//! The tracker is created once by the hub and handed to whoever needs it.
//! Work in progress is represented by [`LoadingGuard`]s: the flag is `true`
//! while at least one guard is alive or while an owner has forced it on with
//! [`LoadingTracker::set_loading`]. Subscribers observe changes through a
//! `tokio::sync::watch` receiver.
//!
//! ```rust
//! use core_runtime::LoadingTracker;
//!
//! let tracker = LoadingTracker::new();
//! let rx = tracker.subscribe();
//!
//! {
//!     let _guard = tracker.begin();
//!     assert!(*rx.borrow());
//! }
//!
//! assert!(!*rx.borrow());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Inner {
    sender: watch::Sender<bool>,
    active_guards: AtomicUsize,
    forced: AtomicBool,
}

impl Inner {
    fn refresh(&self) {
        // Recomputed under the channel lock so concurrent updates settle on
        // the latest counter values.
        self.sender.send_if_modified(|current| {
            let next = self.active_guards.load(Ordering::SeqCst) > 0
                || self.forced.load(Ordering::SeqCst);
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Shared loading flag.
///
/// Cloning shares the same flag.
#[derive(Clone)]
pub struct LoadingTracker {
    inner: Arc<Inner>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                sender,
                active_guards: AtomicUsize::new(0),
                forced: AtomicBool::new(false),
            }),
        }
    }

    /// Marks work as in progress until the returned guard is dropped.
    pub fn begin(&self) -> LoadingGuard {
        self.inner.active_guards.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh();
        LoadingGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Forces the flag on or off independently of guards.
    ///
    /// Turning it off does not hide work still held by live guards.
    pub fn set_loading(&self, loading: bool) {
        self.inner.forced.store(loading, Ordering::SeqCst);
        self.inner.refresh();
    }

    pub fn is_loading(&self) -> bool {
        *self.inner.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.sender.subscribe()
    }

    /// Number of guards currently alive
    pub fn active(&self) -> usize {
        self.inner.active_guards.load(Ordering::SeqCst)
    }
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoadingTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingTracker")
            .field("loading", &self.is_loading())
            .field("active", &self.active())
            .finish()
    }
}

/// RAII marker for in-progress work.
#[must_use = "loading ends as soon as the guard is dropped"]
pub struct LoadingGuard {
    inner: Arc<Inner>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.inner.active_guards.fetch_sub(1, Ordering::SeqCst);
        self.inner.refresh();
    }
}

impl fmt::Debug for LoadingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoadingGuard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_are_reference_counted() {
        let tracker = LoadingTracker::new();
        assert!(!tracker.is_loading());

        let first = tracker.begin();
        let second = tracker.begin();
        assert!(tracker.is_loading());
        assert_eq!(tracker.active(), 2);

        drop(first);
        assert!(tracker.is_loading());

        drop(second);
        assert!(!tracker.is_loading());
    }

    #[test]
    fn test_set_loading_combines_with_guards() {
        let tracker = LoadingTracker::new();

        tracker.set_loading(true);
        assert!(tracker.is_loading());

        let guard = tracker.begin();
        tracker.set_loading(false);
        assert!(tracker.is_loading());

        drop(guard);
        assert!(!tracker.is_loading());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let tracker = LoadingTracker::new();
        let mut rx = tracker.subscribe();

        let guard = tracker.clone().begin();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        drop(guard);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
