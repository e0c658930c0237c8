//! Frame fan-out to independent consumers.
//!
//! Every subscriber owns a bounded backlog. [`FrameDistributor::publish`]
//! only ever appends to backlogs and never waits; a subscriber whose backlog
//! is full is cut off on the spot, its queued frames are released and its
//! subscription ends with a [`BackpressureError`].

use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::config::DistributorConfig;
use crate::error::{BackpressureError, Result};
use crate::frame::StreamFrame;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistributorStats {
    /// Frames passed to `publish`
    pub published: u64,
    /// Frames taken by subscribers
    pub delivered: u64,
    /// Subscribers cut off for falling behind
    pub disconnected: u64,
    /// Currently attached subscribers
    pub subscribers: usize,
}

/// Registration token for one subscriber
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

impl SubscriberHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotStatus {
    Active,
    /// Cut off for backpressure; the error has not been yielded yet
    Overflowed,
    /// Detached, failed or the distributor closed
    Ended,
}

struct SlotState {
    backlog: VecDeque<Arc<StreamFrame>>,
    status: SlotStatus,
}

struct Slot {
    state: Mutex<SlotState>,
    notify: Notify,
}

impl Slot {
    /// Release the backlog and end the subscription
    fn end(&self) {
        let mut state = self.state.lock();
        state.backlog.clear();
        state.status = SlotStatus::Ended;
        drop(state);
        self.notify.notify_one();
    }
}

struct Inner {
    slots: Mutex<HashMap<u64, Arc<Slot>>>,
    next_id: AtomicU64,
    backlog: usize,
    closed: Mutex<bool>,
    published: AtomicU64,
    delivered: AtomicU64,
    disconnected: AtomicU64,
}

/// Distributes frames to any number of subscribers.
///
/// Cloning gives another handle to the same distributor.
///
/// ```rust,ignore
/// let distributor = FrameDistributor::new(DistributorConfig::default())?;
/// let (handle, mut frames) = distributor.attach();
///
/// tokio::spawn(async move {
///     while let Some(Ok(frame)) = frames.recv().await {
///         println!("{} bytes", frame.len());
///     }
/// });
///
/// distributor.publish(frame);
/// distributor.detach(handle);
/// ```
#[derive(Clone)]
pub struct FrameDistributor {
    inner: Arc<Inner>,
}

impl FrameDistributor {
    pub fn new(config: DistributorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                backlog: config.backlog,
                closed: Mutex::new(false),
                published: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                disconnected: AtomicU64::new(0),
            }),
        })
    }

    /// Register a new subscriber.
    ///
    /// It receives every frame published from now on. Attaching to a closed
    /// distributor yields a subscription that ends immediately.
    pub fn attach(&self) -> (SubscriberHandle, FrameSubscription) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        // Held until the slot is registered so `close` cannot miss it
        let closed = self.inner.closed.lock();
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                backlog: VecDeque::with_capacity(self.inner.backlog),
                status: if *closed { SlotStatus::Ended } else { SlotStatus::Active },
            }),
            notify: Notify::new(),
        });

        if !*closed {
            self.inner.slots.lock().insert(id, Arc::clone(&slot));
            debug!(subscriber = id, "subscriber attached");
        }
        drop(closed);

        let subscription = FrameSubscription {
            id,
            slot,
            backlog: self.inner.backlog,
            distributor: Arc::downgrade(&self.inner),
        };
        (SubscriberHandle(id), subscription)
    }

    /// Remove a subscriber; its queued frames are released and its
    /// subscription ends
    pub fn detach(&self, handle: SubscriberHandle) {
        if let Some(slot) = self.inner.slots.lock().remove(&handle.0) {
            slot.end();
            debug!(subscriber = handle.0, "subscriber detached");
        }
    }

    /// Queue a frame for every subscriber.
    ///
    /// Never waits. Returns the number of subscribers the frame was queued
    /// for.
    pub fn publish(&self, frame: StreamFrame) -> usize {
        let frame = Arc::new(frame);
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut slots = self.inner.slots.lock();
        let mut overflowed = Vec::new();
        let mut queued = 0;

        for (id, slot) in slots.iter() {
            let mut state = slot.state.lock();
            if state.status != SlotStatus::Active {
                continue;
            }
            if state.backlog.len() >= self.inner.backlog {
                state.backlog.clear();
                state.status = SlotStatus::Overflowed;
                overflowed.push(*id);
            } else {
                state.backlog.push_back(Arc::clone(&frame));
                queued += 1;
            }
            drop(state);
            slot.notify.notify_one();
        }

        for id in overflowed {
            slots.remove(&id);
            self.inner.disconnected.fetch_add(1, Ordering::Relaxed);
            warn!(subscriber = id, backlog = self.inner.backlog, "subscriber fell behind, disconnecting");
        }

        queued
    }

    /// End every subscription once its backlog is drained; later publishes
    /// go nowhere
    pub fn close(&self) {
        let slots: Vec<Arc<Slot>> = {
            let mut closed = self.inner.closed.lock();
            *closed = true;
            let drained: Vec<Arc<Slot>> = self.inner.slots.lock().drain().map(|(_, slot)| slot).collect();
            drained
        };
        for slot in slots {
            let mut state = slot.state.lock();
            if state.status == SlotStatus::Active {
                state.status = SlotStatus::Ended;
            }
            drop(state);
            slot.notify.notify_one();
        }
        debug!("frame distributor closed");
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn stats(&self) -> DistributorStats {
        DistributorStats {
            published: self.inner.published.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            disconnected: self.inner.disconnected.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

impl std::fmt::Debug for FrameDistributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDistributor")
            .field("backlog", &self.inner.backlog)
            .field("stats", &self.stats())
            .finish()
    }
}

pub type SubscriptionItem = std::result::Result<Arc<StreamFrame>, BackpressureError>;

/// Frames for one subscriber, in publish order.
///
/// Ends with `None` after a detach or close, or with one
/// `Err(BackpressureError)` followed by `None` after falling behind.
/// Dropping the subscription detaches it.
pub struct FrameSubscription {
    id: u64,
    slot: Arc<Slot>,
    backlog: usize,
    distributor: Weak<Inner>,
}

impl FrameSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next frame
    pub async fn recv(&mut self) -> Option<SubscriptionItem> {
        loop {
            if let Some(item) = self.poll_slot() {
                return item;
            }
            self.slot.notify.notified().await;
        }
    }

    /// Take a queued frame without waiting
    pub fn try_recv(&mut self) -> Option<SubscriptionItem> {
        self.poll_slot().flatten()
    }

    /// Frames currently queued
    pub fn backlog(&self) -> usize {
        self.slot.state.lock().backlog.len()
    }

    pub fn into_stream(self) -> impl Stream<Item = SubscriptionItem> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|item| (item, subscription))
        })
    }

    /// `None` if nothing is ready yet, `Some(None)` at the end
    fn poll_slot(&mut self) -> Option<Option<SubscriptionItem>> {
        let mut state = self.slot.state.lock();
        if let Some(frame) = state.backlog.pop_front() {
            if let Some(inner) = self.distributor.upgrade() {
                inner.delivered.fetch_add(1, Ordering::Relaxed);
            }
            return Some(Some(Ok(frame)));
        }
        match state.status {
            SlotStatus::Active => None,
            SlotStatus::Overflowed => {
                state.status = SlotStatus::Ended;
                Some(Some(Err(BackpressureError {
                    backlog: self.backlog,
                })))
            }
            SlotStatus::Ended => Some(None),
        }
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.distributor.upgrade() {
            inner.slots.lock().remove(&self.id);
        }
        self.slot.end();
    }
}

impl std::fmt::Debug for FrameSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSubscription").field("id", &self.id).finish()
    }
}
