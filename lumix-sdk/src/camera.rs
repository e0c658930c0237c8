//! One connected camera

use lumix_control::{catalog, Command, CommandClient, CommandOutcome};
use lumix_discovery::DeviceDescriptor;
use lumix_events::{EventStream, EventSubscriber};
use lumix_liveview::{FrameDistributor, FrameSubscription, StreamReceiver, StreamStats, SubscriberHandle};
use lumix_state::{CameraState, ChangeIterator, StateCache};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::error::{Result, SdkError};

/// A camera with its command client, state cache and live-view fan-out.
///
/// Commands block; use [`invoke_async`](Self::invoke_async) from async code.
/// Event subscriptions and live view need a tokio runtime.
///
/// Connecting opens a remote session on the camera. When created inside a
/// tokio runtime the camera also polls `getstate` in the background, which
/// keeps the session open and the state cache current.
///
/// ```rust,ignore
/// use lumix_sdk::{catalog, CameraConfig, LumixCamera};
///
/// let mut camera = LumixCamera::discover(CameraConfig::default())?;
/// camera.invoke(&catalog::set_mode(catalog::CameraMode::Rec))?;
///
/// let mut events = camera.subscribe_events().await?;
/// let (_viewer, mut frames) = camera.attach_viewer();
/// camera.start_live_view("0.0.0.0:49152".parse()?).await?;
///
/// while let Some(Ok(frame)) = frames.recv().await {
///     println!("{} bytes, battery {:?}", frame.len(), camera.state().get_i64("battery-level"));
/// }
/// ```
pub struct LumixCamera {
    config: CameraConfig,
    descriptor: Arc<DeviceDescriptor>,
    state: Arc<StateCache>,
    client: Arc<CommandClient>,
    events: Option<EventSubscriber>,
    live_view: Option<LiveView>,
    distributor: FrameDistributor,
    keepalive: Option<JoinHandle<()>>,
}

/// Running receive-and-publish pump
struct LiveView {
    local_addr: SocketAddr,
    cancel_tx: oneshot::Sender<()>,
    task: JoinHandle<StreamStats>,
}

impl LumixCamera {
    /// Find the first camera on the network. Blocks for up to the discovery timeout.
    pub fn discover(config: CameraConfig) -> Result<Self> {
        config.validate()?;
        let descriptor = lumix_discovery::discover_with(config.discovery_config())?;
        Self::from_descriptor(descriptor, config)
    }

    /// Connect to a camera whose description URL is already known
    pub fn connect(location: &str, config: CameraConfig) -> Result<Self> {
        config.validate()?;
        let descriptor = lumix_discovery::describe(location, &config.discovery_config())?;
        Self::from_descriptor(descriptor, config)
    }

    pub fn from_descriptor(descriptor: DeviceDescriptor, config: CameraConfig) -> Result<Self> {
        let descriptor = Arc::new(descriptor);
        let state = Arc::new(StateCache::new());
        let client = Arc::new(open_client(&descriptor, &state, &config)?);
        let distributor = FrameDistributor::new(config.distributor.clone())?;

        info!(
            camera = %descriptor.friendly_name,
            model = %descriptor.model_name,
            endpoint = %descriptor.endpoint,
            "connected to camera"
        );

        let keepalive = spawn_keepalive(&client, config.keepalive_interval());
        Ok(Self {
            config,
            descriptor,
            state,
            client,
            events: None,
            live_view: None,
            distributor,
            keepalive,
        })
    }

    /// Re-read the camera's description and start over with an empty state.
    ///
    /// Event subscriptions taken before the reconnect keep running against
    /// the old description; take new ones afterwards.
    pub fn reconnect(&mut self) -> Result<()> {
        let descriptor = lumix_discovery::describe(&self.descriptor.location, &self.config.discovery_config())?;
        let descriptor = Arc::new(descriptor);
        let client = Arc::new(open_client(&descriptor, &self.state, &self.config)?);

        self.stop_keepalive();
        self.descriptor = descriptor;
        self.client = client;
        let revision = self.state.reset();
        self.keepalive = spawn_keepalive(&self.client, self.config.keepalive_interval());
        info!(camera = %self.descriptor.friendly_name, revision, "reconnected to camera");
        Ok(())
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Id of the camera's remote session, if one is open
    pub fn session(&self) -> Option<String> {
        self.client.session()
    }

    /// Camera address, when the description names it by IP
    pub fn ip(&self) -> Option<IpAddr> {
        self.descriptor.host.parse().ok()
    }

    /// Send a command and wait for the reply
    pub fn invoke(&self, command: &Command) -> Result<CommandOutcome> {
        Ok(self.client.invoke(command)?)
    }

    /// [`invoke`](Self::invoke) on the blocking thread pool
    pub async fn invoke_async(&self, command: Command) -> Result<CommandOutcome> {
        let client = Arc::clone(&self.client);
        let outcome = tokio::task::spawn_blocking(move || client.invoke(&command)).await??;
        Ok(outcome)
    }

    /// Read the full camera state into the cache
    pub fn refresh_state(&self) -> Result<CameraState> {
        self.invoke(&catalog::get_state())?;
        Ok(self.state.get())
    }

    /// Latest known state
    pub fn state(&self) -> CameraState {
        self.state.get()
    }

    pub fn state_cache(&self) -> Arc<StateCache> {
        Arc::clone(&self.state)
    }

    /// Blocking iterator over state changes from now on
    pub fn changes(&self) -> ChangeIterator {
        self.state.changes()
    }

    /// Subscribe to the camera's state notifications.
    ///
    /// The callback listener is started on first use and shared by later
    /// subscriptions.
    pub async fn subscribe_events(&mut self) -> Result<EventStream> {
        let subscriber = match self.events.take() {
            Some(subscriber) => subscriber,
            None => {
                let config = self.config.event_config(self.ip());
                EventSubscriber::start(Arc::clone(&self.state), config).await?
            }
        };

        let result = subscriber.subscribe(&self.descriptor).await;
        self.events = Some(subscriber);
        Ok(result?)
    }

    /// URL the camera posts notifications to, once events were subscribed
    pub fn callback_url(&self) -> Option<String> {
        self.events.as_ref().map(EventSubscriber::callback_url)
    }

    /// Start live view on `bind` and publish frames to attached viewers.
    ///
    /// Binds the socket first, switches the camera to recording mode, then
    /// asks it to stream to the bound port. Returns the bound address.
    pub async fn start_live_view(&mut self, bind: SocketAddr) -> Result<SocketAddr> {
        if self.live_view.is_some() {
            return Err(SdkError::LiveViewActive);
        }

        let source = StreamReceiver::start(self.config.stream_config(bind, self.ip())).await?;
        let local_addr = source.local_addr();

        for command in [
            catalog::set_mode(catalog::CameraMode::Rec),
            catalog::start_stream(local_addr.port()),
        ] {
            if let Err(e) = self.invoke_async(command).await {
                source.cancel().await;
                return Err(e);
            }
        }

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let distributor = self.distributor.clone();
        let task = tokio::spawn(async move {
            let mut source = source;
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => break,
                    frame = source.recv() => match frame {
                        Some(frame) => {
                            distributor.publish(frame);
                        }
                        None => break,
                    },
                }
            }
            if let Some(error) = source.failure() {
                warn!(error = %error, "live view receiver stopped");
            }
            let stats = source.stats();
            source.cancel().await;
            stats
        });

        info!(%local_addr, camera = %self.descriptor.friendly_name, "live view started");
        self.live_view = Some(LiveView {
            local_addr,
            cancel_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Stop the camera's stream and the receiver.
    ///
    /// The stop command is best effort; the socket is released either way.
    /// Attached viewers stay attached for the next session.
    pub async fn stop_live_view(&mut self) -> Result<StreamStats> {
        let live_view = self.live_view.take().ok_or(SdkError::LiveViewInactive)?;

        if let Err(e) = self.invoke_async(catalog::stop_stream()).await {
            warn!(error = %e, "camera did not acknowledge stop stream");
        }

        let _ = live_view.cancel_tx.send(());
        let stats = live_view.task.await?;
        info!(local_addr = %live_view.local_addr, ?stats, "live view stopped");
        Ok(stats)
    }

    /// Bound address of the running live view
    pub fn live_view_addr(&self) -> Option<SocketAddr> {
        self.live_view.as_ref().map(|live_view| live_view.local_addr)
    }

    /// Add a live-view consumer
    pub fn attach_viewer(&self) -> (SubscriberHandle, FrameSubscription) {
        self.distributor.attach()
    }

    pub fn detach_viewer(&self, handle: SubscriberHandle) {
        self.distributor.detach(handle);
    }

    pub fn distributor(&self) -> &FrameDistributor {
        &self.distributor
    }

    fn stop_keepalive(&mut self) {
        if let Some(task) = self.keepalive.take() {
            task.abort();
        }
    }

    /// Stop live view, end every viewer and event subscription
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop_keepalive();
        if self.live_view.is_some() {
            self.stop_live_view().await?;
        }
        self.distributor.close();

        if let Some(events) = self.events.take() {
            events.shutdown().await?;
        }
        debug!(camera = %self.descriptor.friendly_name, "camera shut down");
        Ok(())
    }
}

impl Drop for LumixCamera {
    fn drop(&mut self) {
        self.stop_keepalive();
    }
}

/// Command client with a remote session, when the camera serves `cam.cgi`
fn open_client(
    descriptor: &Arc<DeviceDescriptor>,
    state: &Arc<StateCache>,
    config: &CameraConfig,
) -> Result<CommandClient> {
    let client = CommandClient::new(Arc::clone(descriptor), Arc::clone(state), &config.client_config())?;
    if client.cam_cgi_url().is_some() {
        client.open_session(&config.device_name)?;
    } else {
        debug!(camera = %descriptor.friendly_name, "camera has no cam.cgi, UPnP actions only");
    }
    Ok(client)
}

/// Poll `getstate` every `interval` while the session is open.
///
/// Needs a tokio runtime; returns `None` outside one or when disabled.
fn spawn_keepalive(client: &Arc<CommandClient>, interval: Option<Duration>) -> Option<JoinHandle<()>> {
    let interval = interval?;
    client.session()?;
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    let client = Arc::clone(client);

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let client = Arc::clone(&client);
            match tokio::task::spawn_blocking(move || client.invoke(&catalog::get_state())).await {
                Ok(Ok(_)) => {}
                Ok(Err(error)) => warn!(error = %error, "keepalive getstate failed"),
                Err(error) => {
                    warn!(error = %error, "keepalive task failed");
                    break;
                }
            }
        }
    }))
}

impl std::fmt::Debug for LumixCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumixCamera")
            .field("camera", &self.descriptor.friendly_name)
            .field("endpoint", &self.descriptor.endpoint)
            .field("session", &self.client.session().is_some())
            .field("revision", &self.state.revision())
            .field("live_view", &self.live_view_addr())
            .field("viewers", &self.distributor.subscriber_count())
            .finish()
    }
}
