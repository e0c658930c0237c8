//! Per-watcher change feed.
//!
//! `recv` and plain iteration block; `try_recv` and `drain` return what is
//! queued; `until_quiet` stops once no change arrives for a while.
//!
//! Each feed holds a bounded queue. A watcher that stops reading loses the
//! newest changes instead of growing without limit; [`ChangeIterator::missed`]
//! says how many.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::event::ChangeEvent;

/// Write side of one change feed, held by the cache
pub(crate) struct Watcher {
    tx: mpsc::SyncSender<ChangeEvent>,
    missed: Arc<AtomicU64>,
}

impl Watcher {
    /// Queue `event`; returns false once the feed was dropped
    pub(crate) fn offer(&self, event: ChangeEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::TrySendError::Full(_)) => {
                self.missed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::TrySendError::Disconnected(_)) => false,
        }
    }
}

/// A feed holding at most `capacity` unread changes
pub(crate) fn feed(capacity: usize) -> (Watcher, ChangeIterator) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let missed = Arc::new(AtomicU64::new(0));
    let watcher = Watcher {
        tx,
        missed: Arc::clone(&missed),
    };
    (watcher, ChangeIterator { rx, missed })
}

/// Changes applied to a [`StateCache`](crate::StateCache) after this
/// watcher was created, in revision order.
///
/// Ends when the cache is dropped. Revisions skip ahead after changes were
/// [`missed`](Self::missed); take a fresh snapshot to catch up.
pub struct ChangeIterator {
    rx: mpsc::Receiver<ChangeEvent>,
    missed: Arc<AtomicU64>,
}

impl ChangeIterator {
    /// Changes dropped so far because the queue was full
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    pub fn recv(&self) -> Option<ChangeEvent> {
        self.rx.recv().ok()
    }

    /// `None` on timeout or when the cache is gone
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Queued changes, without waiting for more
    pub fn drain(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        self.rx.try_iter()
    }

    /// Changes until `quiet` passes without one
    pub fn until_quiet(&self, quiet: Duration) -> impl Iterator<Item = ChangeEvent> + '_ {
        std::iter::from_fn(move || self.recv_timeout(quiet))
    }

    /// Blocking feed of changes to one property
    pub fn property<'a>(&'a self, name: &'a str) -> impl Iterator<Item = ChangeEvent> + 'a {
        std::iter::from_fn(move || self.recv()).filter(move |event| event.property == name)
    }
}

impl Iterator for ChangeIterator {
    type Item = ChangeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
