//! Tracking and cross-task cancellation of in-flight gateway calls.
//!
//! The registry is the one structure touched from both the serialized
//! worker and external cancellers (a `disconnect` arriving from another
//! task), so it is the one place that takes a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// Cancellation handle for one in-flight call.
///
/// Cancellation is level-triggered: a handle cancelled before the call
/// even starts still resolves the call as cancelled, and cancelling twice
/// is a no-op.
#[derive(Debug, Clone)]
pub struct CallHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CallHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a cancel between the
            // check and the await cannot be missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    fn same_as(&self, other: &CallHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CallHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Which of the two tracked calls a handle occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSlot {
    /// The worker's current outbound call, including drain-loop polls.
    Current,
    /// The background long-poll.
    LongPoll,
}

#[derive(Debug, Default)]
struct Slots {
    current: Option<CallHandle>,
    long_poll: Option<CallHandle>,
}

impl Slots {
    fn entry(&mut self, slot: CallSlot) -> &mut Option<CallHandle> {
        match slot {
            CallSlot::Current => &mut self.current,
            CallSlot::LongPoll => &mut self.long_poll,
        }
    }
}

/// Tracks the single current call and the single long-poll call.
#[derive(Debug, Default)]
pub struct CallRegistry {
    slots: Mutex<Slots>,
    closed: AtomicBool,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and track a fresh handle on `slot`, replacing any prior
    /// reference without cancelling it. Clearing after completion is the
    /// caller's responsibility.
    ///
    /// After [`close`](Self::close) the handle comes back already
    /// cancelled, so work that was queued behind a disconnect resolves as
    /// cancelled instead of starting a fresh call.
    pub fn begin(&self, slot: CallSlot) -> CallHandle {
        let handle = CallHandle::new();
        if self.closed.load(Ordering::SeqCst) {
            handle.cancel();
            return handle;
        }
        *self.slots().entry(slot) = Some(handle.clone());
        handle
    }

    /// Clear `slot` if it still tracks `handle`.
    pub fn finish(&self, slot: CallSlot, handle: &CallHandle) {
        let mut slots = self.slots();
        let entry = slots.entry(slot);
        if entry.as_ref().is_some_and(|tracked| tracked.same_as(handle)) {
            *entry = None;
        }
    }

    /// True when a long-poll call is outstanding.
    pub fn long_poll_active(&self) -> bool {
        self.slots().long_poll.is_some()
    }

    /// Cancel the tracked call on `slot`, if any, and drop the reference.
    pub fn cancel(&self, slot: CallSlot) {
        let taken = self.slots().entry(slot).take();
        if let Some(handle) = taken {
            handle.cancel();
        }
    }

    /// Cancel both tracked calls. Called on every disconnect and on every
    /// error path; safe to call repeatedly.
    pub fn cancel_all(&self) {
        self.cancel(CallSlot::Current);
        self.cancel(CallSlot::LongPoll);
    }

    /// Shut the registry down: cancel both tracked calls and make every
    /// later `begin` hand out a pre-cancelled handle. Used by disconnect
    /// only — error paths keep the registry open so a later reconnect
    /// attempt can issue calls again.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel_all();
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        // A poisoned lock only means a cancelling task panicked mid-store;
        // the map of handles is still coherent.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_level_triggered() {
        let handle = CallHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_even_if_already_cancelled() {
        let handle = CallHandle::new();
        handle.cancel();
        handle.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wakes_a_waiter() {
        let handle = CallHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        handle.cancel();
        task.await.unwrap();
    }

    #[test]
    fn finish_only_clears_its_own_handle() {
        let registry = CallRegistry::new();
        let first = registry.begin(CallSlot::Current);
        let second = registry.begin(CallSlot::Current);
        registry.finish(CallSlot::Current, &first);
        // `second` replaced `first`, so the slot must still be occupied.
        let third = registry.begin(CallSlot::LongPoll);
        assert!(registry.long_poll_active());
        registry.finish(CallSlot::LongPoll, &third);
        assert!(!registry.long_poll_active());
        registry.finish(CallSlot::Current, &second);
    }

    #[test]
    fn cancel_all_cancels_both_slots() {
        let registry = CallRegistry::new();
        let current = registry.begin(CallSlot::Current);
        let poll = registry.begin(CallSlot::LongPoll);
        registry.cancel_all();
        assert!(current.is_cancelled());
        assert!(poll.is_cancelled());
        assert!(!registry.long_poll_active());
        // Second round has nothing to do and must not panic.
        registry.cancel_all();
    }

    #[test]
    fn begin_after_close_is_born_cancelled() {
        let registry = CallRegistry::new();
        let before = registry.begin(CallSlot::Current);
        registry.close();
        assert!(before.is_cancelled());
        let after = registry.begin(CallSlot::Current);
        assert!(after.is_cancelled());
        assert!(!registry.long_poll_active());
    }
}
