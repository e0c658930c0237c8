//! Event routing for HTTP callback notifications.
//!
//! The `EventRouter` keeps one channel per registered subscription ID. The
//! camera sends its initial NOTIFY as soon as it accepts a SUBSCRIBE, which can
//! be before the subscriber has learned its SID. Notifications for unknown
//! SIDs are therefore held for a short time and replayed on registration.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, trace};

/// How long a notification for an unknown SID is held.
const HOLD_RETENTION: Duration = Duration::from_secs(5);

/// Maximum number of held notifications.
const HOLD_CAPACITY: usize = 32;

/// One UPnP event notification as received over HTTP.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// The subscription ID from the SID header
    pub subscription_id: String,
    /// Event key from the SEQ header, if present and numeric
    pub seq: Option<u32>,
    /// Address of the peer that sent the request
    pub remote: Option<SocketAddr>,
    /// The raw XML event body
    pub event_xml: String,
}

/// Result of routing one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Delivered to the registered subscription
    Delivered,
    /// SID not registered yet; held for replay
    Held,
    /// The subscription is gone; the notification was discarded
    Dropped,
}

/// Routes notifications from the HTTP listener to per-subscription channels.
#[derive(Clone, Default)]
pub struct EventRouter {
    routes: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<NotificationPayload>>>>,
    held: Arc<Mutex<VecDeque<(Instant, NotificationPayload)>>>,
}

impl EventRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription ID and return the channel its notifications
    /// are delivered on.
    ///
    /// Any held notifications for this SID are replayed into the channel in
    /// arrival order before this returns.
    ///
    /// # Example
    ///
    /// ```
    /// # use callback_server::router::EventRouter;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let router = EventRouter::new();
    /// let _rx = router.register("uuid:subscription-123".to_string()).await;
    /// assert!(router.is_registered("uuid:subscription-123").await);
    /// # }
    /// ```
    pub async fn register(&self, subscription_id: String) -> mpsc::UnboundedReceiver<NotificationPayload> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut routes = self.routes.write().await;
        {
            let mut held = self.held.lock().await;
            let now = Instant::now();
            let mut remaining = VecDeque::with_capacity(held.len());
            for (at, payload) in held.drain(..) {
                if now.duration_since(at) > HOLD_RETENTION {
                    continue;
                }
                if payload.subscription_id == subscription_id {
                    debug!(sid = %subscription_id, seq = ?payload.seq, "replaying held notification");
                    let _ = tx.send(payload);
                } else {
                    remaining.push_back((at, payload));
                }
            }
            *held = remaining;
        }
        routes.insert(subscription_id, tx);
        rx
    }

    /// Unregister a subscription ID.
    ///
    /// Later notifications for it are dropped. The channel returned by
    /// `register` is closed once the last sender is gone.
    pub async fn unregister(&self, subscription_id: &str) {
        self.routes.write().await.remove(subscription_id);
    }

    /// Drop every route and held notification.
    ///
    /// Called when the listener stops; every channel handed out by
    /// `register` closes.
    pub async fn close_all(&self) {
        let closed = {
            let mut routes = self.routes.write().await;
            let count = routes.len();
            routes.clear();
            count
        };
        self.held.lock().await.clear();
        debug!(closed, "all routes closed");
    }

    /// Whether a subscription ID is currently registered.
    pub async fn is_registered(&self, subscription_id: &str) -> bool {
        self.routes.read().await.contains_key(subscription_id)
    }

    /// Route an incoming notification.
    pub async fn route(&self, payload: NotificationPayload) -> RouteOutcome {
        {
            let routes = self.routes.read().await;
            if let Some(tx) = routes.get(&payload.subscription_id) {
                return match tx.send(payload) {
                    Ok(()) => RouteOutcome::Delivered,
                    Err(mpsc::error::SendError(payload)) => {
                        drop(routes);
                        trace!(sid = %payload.subscription_id, "receiver gone, removing route");
                        self.unregister(&payload.subscription_id).await;
                        RouteOutcome::Dropped
                    }
                };
            }
        }

        let mut held = self.held.lock().await;
        let now = Instant::now();
        while held
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) > HOLD_RETENTION)
        {
            held.pop_front();
        }
        if held.len() >= HOLD_CAPACITY {
            held.pop_front();
        }
        debug!(sid = %payload.subscription_id, "holding notification for unregistered SID");
        held.push_back((now, payload));
        RouteOutcome::Held
    }
}
