//! The consumer side of one event subscription.

use futures::Stream;
use lumix_state::PropertyValue;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::EventError;

/// One notification after it was applied to the state cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// GENA event sequence number
    pub seq: Option<u32>,
    /// Properties in document order, with canonical names
    pub properties: Vec<(String, PropertyValue)>,
    /// State revision after the last property was applied
    pub revision: Option<u64>,
}

pub type EventItem = Result<Notification, EventError>;

/// Sequence of applied notifications for one subscription.
///
/// Ends after yielding a single `Err(EventError::Disconnected)` when the
/// lease is lost or the callback listener stops, and yields `None` from then
/// on. Dropping the stream cancels the subscription; [`EventStream::cancel`]
/// does the same and waits for the UNSUBSCRIBE to be sent.
///
/// # Examples
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut events = subscriber.subscribe(&camera).await?;
/// while let Some(item) = events.next().await {
///     match item {
///         Ok(notification) => println!("r{:?}: {:?}", notification.revision, notification.properties),
///         Err(e) => eprintln!("subscription ended: {}", e),
///     }
/// }
/// ```
pub struct EventStream {
    sid: String,
    items: mpsc::UnboundedReceiver<EventItem>,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl EventStream {
    pub(crate) fn new(
        sid: String,
        items: mpsc::UnboundedReceiver<EventItem>,
        cancel_tx: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            sid,
            items,
            cancel_tx: Some(cancel_tx),
            task: Some(task),
            finished: false,
        }
    }

    /// Subscription ID granted by the camera
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Wait for the next item
    pub async fn next(&mut self) -> Option<EventItem> {
        if self.finished {
            return None;
        }
        let item = self.items.recv().await;
        self.observe(&item);
        item
    }

    /// Wait for the next item for at most `timeout`.
    ///
    /// Returns `None` on timeout as well as at the end of the stream; use
    /// [`EventStream::is_finished`] to tell them apart.
    pub async fn next_timeout(&mut self, timeout: Duration) -> Option<EventItem> {
        tokio::time::timeout(timeout, self.next()).await.ok().flatten()
    }

    /// Take an already delivered item without waiting
    pub fn try_next(&mut self) -> Option<EventItem> {
        if self.finished {
            return None;
        }
        match self.items.try_recv() {
            Ok(item) => {
                let item = Some(item);
                self.observe(&item);
                item
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop the subscription and wait until UNSUBSCRIBE was attempted
    pub async fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(sid = %self.sid, "event stream cancelled");
    }

    fn observe(&mut self, item: &Option<EventItem>) {
        if matches!(item, None | Some(Err(_))) {
            self.finished = true;
        }
    }
}

impl Stream for EventStream {
    type Item = EventItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.items.poll_recv(cx) {
            Poll::Ready(item) => {
                self.observe(&item);
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        // The loop treats a dropped sender as cancellation
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("sid", &self.sid)
            .field("finished", &self.finished)
            .finish()
    }
}
