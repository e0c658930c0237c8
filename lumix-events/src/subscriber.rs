//! Subscription lifecycle: SUBSCRIBE, notification intake, renewal and
//! UNSUBSCRIBE.

use callback_server::{CallbackServer, EventRouter, NotificationPayload};
use lumix_discovery::DeviceDescriptor;
use lumix_state::{StateCache, StateUpdate, UpdateSource};
use soap_client::SoapClient;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::EventConfig;
use crate::error::{EventError, Result};
use crate::propertyset::parse_propertyset;
use crate::stream::{EventItem, EventStream, Notification};

/// Subscribes to camera events and applies them to the shared state.
///
/// Owns the HTTP callback listener; every [`EventStream`] it hands out
/// receives notifications through it. Shutting the subscriber down ends all
/// of its streams with [`EventError::Disconnected`].
pub struct EventSubscriber {
    server: CallbackServer,
    soap: SoapClient,
    state: Arc<StateCache>,
    config: EventConfig,
}

impl EventSubscriber {
    /// Start the callback listener
    pub async fn start(state: Arc<StateCache>, config: EventConfig) -> Result<Self> {
        Self::with_soap_client(state, config, SoapClient::new()).await
    }

    /// Start with a preconfigured SOAP client (timeouts, user agent)
    pub async fn with_soap_client(
        state: Arc<StateCache>,
        config: EventConfig,
        soap: SoapClient,
    ) -> Result<Self> {
        config.validate()?;
        let server = CallbackServer::start(config.server_config()).await?;
        info!(callback_url = %server.callback_url(), "event listener started");
        Ok(Self {
            server,
            soap,
            state,
            config,
        })
    }

    /// URL advertised in the CALLBACK header
    pub fn callback_url(&self) -> String {
        self.server.callback_url()
    }

    /// Subscribe to the camera's state notifications
    pub async fn subscribe(&self, camera: &DeviceDescriptor) -> Result<EventStream> {
        let event_url = camera
            .event_url()
            .ok_or_else(|| EventError::NoEventService(camera.friendly_name.clone()))?;
        let sender = camera.host.parse::<IpAddr>().ok();
        self.subscribe_url(event_url, sender).await
    }

    /// Subscribe to an explicit event URL.
    ///
    /// With sender verification enabled, notifications whose peer address is
    /// not `expected_sender` are dropped.
    pub async fn subscribe_url(&self, event_url: &str, expected_sender: Option<IpAddr>) -> Result<EventStream> {
        let callback_url = self.server.callback_url();
        let requested = self.config.requested_lease.as_secs().clamp(1, u32::MAX as u64) as u32;

        let soap = self.soap.clone();
        let url = event_url.to_string();
        let response = tokio::task::spawn_blocking(move || soap.subscribe(&url, &callback_url, requested))
            .await
            .map_err(|e| EventError::SubscribeFailed(e.to_string()))??;

        info!(event_url, sid = %response.sid, lease_secs = response.timeout_seconds, "subscribed");

        let router = Arc::clone(self.server.router());
        let notifications = router.register(response.sid.clone()).await;
        let (items_tx, items_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let subscription = Subscription {
            sid: response.sid.clone(),
            event_url: event_url.to_string(),
            expected_sender: expected_sender.filter(|_| self.config.verify_sender),
            soap: self.soap.clone(),
            state: Arc::clone(&self.state),
            router,
            config: self.config.clone(),
            items: items_tx,
            last_seq: None,
        };
        let lease = Duration::from_secs(response.timeout_seconds.into());
        let task = tokio::spawn(subscription.run(notifications, cancel_rx, lease));

        Ok(EventStream::new(response.sid, items_rx, cancel_tx, task))
    }

    /// Stop the callback listener; all streams end with `Disconnected`
    pub async fn shutdown(self) -> Result<()> {
        self.server.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for EventSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscriber")
            .field("callback_url", &self.server.callback_url())
            .finish()
    }
}

/// How a subscription loop ended
enum Exit {
    Cancelled,
    LeaseLost,
    ListenerGone,
}

struct Subscription {
    sid: String,
    event_url: String,
    expected_sender: Option<IpAddr>,
    soap: SoapClient,
    state: Arc<StateCache>,
    router: Arc<EventRouter>,
    config: EventConfig,
    items: mpsc::UnboundedSender<EventItem>,
    last_seq: Option<u32>,
}

impl Subscription {
    async fn run(
        mut self,
        mut notifications: mpsc::UnboundedReceiver<NotificationPayload>,
        mut cancel_rx: oneshot::Receiver<()>,
        lease: Duration,
    ) {
        let mut deadline = Instant::now() + lease;
        let mut next_renewal = self.renewal_time(Instant::now(), deadline);
        let mut failures = 0u32;

        let exit = loop {
            tokio::select! {
                _ = &mut cancel_rx => break Exit::Cancelled,

                payload = notifications.recv() => match payload {
                    Some(payload) => self.handle(payload),
                    None => break Exit::ListenerGone,
                },

                _ = sleep_until(next_renewal) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Exit::LeaseLost;
                    }

                    let renewal = self.renew();
                    let result = tokio::select! {
                        result = renewal => result,
                        _ = &mut cancel_rx => break Exit::Cancelled,
                    };

                    let now = Instant::now();
                    match result {
                        Ok(granted) => {
                            failures = 0;
                            deadline = now + granted;
                            next_renewal = self.renewal_time(now, deadline);
                            debug!(sid = %self.sid, lease_secs = granted.as_secs(), "subscription renewed");
                        }
                        Err(reason) => {
                            failures += 1;
                            let retry = now + self.config.backoff(failures);
                            next_renewal = retry.min(deadline);
                            warn!(sid = %self.sid, attempt = failures, %reason, "renewal failed");
                        }
                    }
                }
            }
        };

        self.router.unregister(&self.sid).await;

        match exit {
            Exit::Cancelled => {
                self.unsubscribe().await;
            }
            Exit::LeaseLost => {
                warn!(sid = %self.sid, "lease expired without renewal");
                let _ = self
                    .items
                    .send(Err(EventError::Disconnected("subscription lease lost".to_string())));
            }
            Exit::ListenerGone => {
                warn!(sid = %self.sid, "callback listener stopped");
                self.unsubscribe().await;
                let _ = self
                    .items
                    .send(Err(EventError::Disconnected("callback listener stopped".to_string())));
            }
        }
    }

    /// Renewal point: the configured fraction of the remaining lease
    fn renewal_time(&self, now: Instant, deadline: Instant) -> Instant {
        now + deadline.saturating_duration_since(now).mul_f64(self.config.renewal_fraction)
    }

    async fn renew(&self) -> std::result::Result<Duration, String> {
        let soap = self.soap.clone();
        let url = self.event_url.clone();
        let sid = self.sid.clone();
        let requested = self.config.requested_lease.as_secs().clamp(1, u32::MAX as u64) as u32;
        match tokio::task::spawn_blocking(move || soap.renew_subscription(&url, &sid, requested)).await {
            Ok(Ok(granted)) => Ok(Duration::from_secs(granted.into())),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn unsubscribe(&self) {
        let soap = self.soap.clone();
        let url = self.event_url.clone();
        let sid = self.sid.clone();
        match tokio::task::spawn_blocking(move || soap.unsubscribe(&url, &sid)).await {
            Ok(Ok(())) => debug!(sid = %self.sid, "unsubscribed"),
            Ok(Err(e)) => debug!(sid = %self.sid, error = %e, "unsubscribe failed"),
            Err(e) => debug!(sid = %self.sid, error = %e, "unsubscribe task failed"),
        }
    }

    fn handle(&mut self, payload: NotificationPayload) {
        if let Some(expected) = self.expected_sender {
            let from = payload.remote.map(|addr| addr.ip());
            if from != Some(expected) {
                warn!(sid = %self.sid, ?from, %expected, "dropping notification from unexpected sender");
                return;
            }
        }

        self.track_seq(payload.seq);

        let properties = match parse_propertyset(&payload.event_xml) {
            Ok(properties) => properties,
            Err(reason) => {
                warn!(sid = %self.sid, seq = ?payload.seq, %reason, "dropping malformed notification");
                return;
            }
        };

        let source = UpdateSource::Event { seq: payload.seq };
        let revision = self.state.apply_all(
            properties
                .iter()
                .map(|(name, value)| StateUpdate::new(name.clone(), value.clone(), source.clone())),
        );
        trace!(sid = %self.sid, seq = ?payload.seq, ?revision, count = properties.len(), "notification applied");

        let _ = self.items.send(Ok(Notification {
            seq: payload.seq,
            properties,
            revision,
        }));
    }

    /// Log gaps in the event sequence; notifications are applied regardless
    fn track_seq(&mut self, seq: Option<u32>) {
        let Some(seq) = seq else { return };
        if let Some(last) = self.last_seq {
            // SEQ wraps to 1, never back to 0
            let expected = if last == u32::MAX { 1 } else { last + 1 };
            if seq != expected {
                warn!(sid = %self.sid, expected, received = seq, "event sequence gap");
            }
        }
        self.last_seq = Some(seq);
    }
}
