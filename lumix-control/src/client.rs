use lumix_discovery::{DeviceDescriptor, ServiceEndpoint};
use lumix_state::{PropertyValue, StateCache, StateUpdate, UpdateSource};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::camcgi::{self, CamQuery, CamReply};
use crate::command::{Command, EffectSource, Route};
use crate::config::ClientConfig;
use crate::error::{CommandError, Result};
use crate::reply::Reply;
use crate::transport::{ControlRequest, ControlResponse, ControlTransport, HttpTransport};

/// Successful result of one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub reply: Reply,
    /// State revision after the reply's properties were applied, if it
    /// reported any
    pub revision: Option<u64>,
}

/// Typed success payload or typed failure of one invocation
pub type CommandResult = Result<CommandOutcome>;

/// Where a validated command goes
enum Target<'a> {
    Action {
        service: &'a ServiceEndpoint,
        arguments: Vec<(String, String)>,
    },
    Query {
        url: &'a str,
        query: &'a CamQuery,
    },
}

/// Issues commands to one camera and folds their replies into the state cache.
///
/// One exchange is in flight at a time. Concurrent callers queue on an
/// internal lock that is held until the reply's properties are applied, so
/// state changes land in the order the commands were sent. Each caller
/// blocks until its own reply or timeout. Nothing is retried here.
///
/// `cam.cgi` commands need a remote session; open one with
/// [`open_session`](Self::open_session) first.
///
/// ```rust,ignore
/// use lumix_control::{catalog, CommandClient, ClientConfig};
///
/// let client = CommandClient::new(descriptor, state, &ClientConfig::default())?;
/// client.open_session("my-laptop")?;
/// let outcome = client.invoke(&catalog::focus_step(catalog::FocusStep::TeleFast))?;
/// assert_eq!(outcome.revision, Some(state.revision()));
/// ```
pub struct CommandClient {
    descriptor: Arc<DeviceDescriptor>,
    transport: Arc<dyn ControlTransport>,
    state: Arc<StateCache>,
    reject_when_busy: bool,
    cam_cgi_url: Option<String>,
    session: RwLock<Option<String>>,
    exchange: Mutex<()>,
}

impl CommandClient {
    /// Create a client that talks HTTP to the camera
    pub fn new(
        descriptor: Arc<DeviceDescriptor>,
        state: Arc<StateCache>,
        config: &ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let transport: HttpTransport = config.transport();
        let mut client = Self::with_transport(descriptor, state, Arc::new(transport));
        client.reject_when_busy = config.reject_when_busy;
        client.cam_cgi_url = cam_cgi_url(&client.descriptor, config.cam_cgi_port);
        Ok(client)
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        descriptor: Arc<DeviceDescriptor>,
        state: Arc<StateCache>,
        transport: Arc<dyn ControlTransport>,
    ) -> Self {
        let cam_cgi_url = cam_cgi_url(&descriptor, 80);
        Self {
            descriptor,
            transport,
            state,
            reject_when_busy: true,
            cam_cgi_url,
            session: RwLock::new(None),
            exchange: Mutex::new(()),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// URL of the camera's `cam.cgi`, when it has one
    pub fn cam_cgi_url(&self) -> Option<&str> {
        self.cam_cgi_url.as_deref()
    }

    /// Id of the open remote session
    pub fn session(&self) -> Option<String> {
        self.session.read().clone()
    }

    /// Reuse a session id the camera granted earlier
    pub fn resume_session(&self, session: impl Into<String>) {
        *self.session.write() = Some(session.into());
    }

    /// Forget the session; `cam.cgi` commands fail until a new one is opened
    pub fn close_session(&self) {
        if self.session.write().take().is_some() {
            debug!(camera = %self.descriptor.friendly_name, "remote session closed");
        }
    }

    /// Run the camera's access handshake and open a remote session.
    ///
    /// Asks for a challenge (`accctrl`/`req_acc_g`), answers it
    /// (`req_acc_e`) until the camera grants a session id, then announces
    /// this client as `device_name`. Later `cam.cgi` requests carry the id
    /// in the `X-SESSION_ID` header.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnsupportedCommand`] if the camera has no `cam.cgi`
    /// - [`CommandError::Rejected`] if the camera does not grant remote access
    /// - [`CommandError::MalformedResponse`] if an answer cannot be read or
    ///   names another camera
    pub fn open_session(&self, device_name: &str) -> Result<String> {
        let url = self
            .cam_cgi_url
            .as_deref()
            .ok_or_else(|| CommandError::UnsupportedCommand("accctrl".to_string()))?;
        let _exchange = self.exchange.lock();

        let challenge = self.query_fields(url, &CamQuery::new("accctrl").with_type("req_acc_g"), None)?;
        let challenge = challenge
            .first()
            .ok_or_else(|| CommandError::MalformedResponse("accctrl: no challenge".to_string()))?;
        let (value, value2) = camcgi::access_response(challenge)?;

        let answer = CamQuery::new("accctrl")
            .with_type("req_acc_e")
            .with_value(value)
            .with_value2(value2);
        let mut session = None;
        // The first grant may come without an id
        for _ in 0..2 {
            let grant = self.query_fields(url, &answer, None)?;
            self.check_grant(&grant)?;
            if let Some(id) = grant.get(3).filter(|id| !id.is_empty()) {
                session = Some(id.clone());
                break;
            }
        }
        let session = session.ok_or_else(|| {
            CommandError::MalformedResponse("accctrl: access granted without a session id".to_string())
        })?;

        let announce = CamQuery::new("setsetting")
            .with_type("device_name")
            .with_value(device_name);
        self.send_query(url, &announce, Some(&session), "setsetting")?;

        *self.session.write() = Some(session.clone());
        info!(camera = %self.descriptor.friendly_name, device_name, "remote session opened");
        Ok(session)
    }

    /// Send `command` and wait for the reply.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnsupportedCommand`] if the camera did not declare
    ///   the action, or has no `cam.cgi` for the mode (nothing is sent)
    /// - [`CommandError::InvalidArguments`] on an argument count mismatch
    /// - [`CommandError::CameraBusy`] for idle-only commands while the camera
    ///   is operated locally
    /// - [`CommandError::NotConnected`] for `cam.cgi` commands without a session
    /// - [`CommandError::Transport`], a device error or
    ///   [`CommandError::MalformedResponse`] from the exchange itself
    pub fn invoke(&self, command: &Command) -> CommandResult {
        let target = self.target(command)?;

        let _exchange = self.exchange.lock();

        if self.reject_when_busy && command.is_idle_only() && self.state.get().is_busy() {
            return Err(CommandError::CameraBusy(command.name().to_string()));
        }

        let response = match &target {
            Target::Action { service, arguments } => {
                debug!(action = command.name(), url = %service.control_url, "invoking");
                self.transport.send(&ControlRequest::Action {
                    control_url: &service.control_url,
                    service_type: &service.service_type,
                    action: command.name(),
                    arguments,
                })
            }
            Target::Query { url, query } => {
                let session = self.session.read().clone();
                if query.needs_session() && session.is_none() {
                    return Err(CommandError::NotConnected(command.name().to_string()));
                }
                debug!(command = command.name(), mode = query.mode(), "invoking");
                self.transport.send(&ControlRequest::Query {
                    url,
                    query,
                    session: session.as_deref(),
                })
            }
        };

        let reply = response
            .and_then(|response| decode(command, response))
            .map_err(|error| {
                warn!(command = command.name(), error = %error, "command failed");
                error
            })?;

        let updates = state_updates(command, &reply);
        let revision = self.state.apply_all(updates);
        debug!(command = command.name(), ?revision, "command succeeded");

        Ok(CommandOutcome { reply, revision })
    }

    /// Validate `command` against what the camera offers; no traffic
    fn target<'a>(&'a self, command: &'a Command) -> Result<Target<'a>> {
        match command.route() {
            Route::Action => {
                let (service, declared) = self
                    .descriptor
                    .find_action(command.name())
                    .ok_or_else(|| CommandError::UnsupportedCommand(command.name().to_string()))?;

                if declared.inputs.len() != command.args().len() {
                    return Err(CommandError::InvalidArguments {
                        command: command.name().to_string(),
                        expected: declared.inputs.len(),
                        actual: command.args().len(),
                    });
                }

                let arguments = declared
                    .inputs
                    .iter()
                    .cloned()
                    .zip(command.args().iter().cloned())
                    .collect();
                Ok(Target::Action { service, arguments })
            }
            Route::Query(query) => match self.cam_cgi_url.as_deref() {
                Some(url) if query.is_known_mode() => Ok(Target::Query { url, query }),
                _ => Err(CommandError::UnsupportedCommand(command.name().to_string())),
            },
        }
    }

    /// One `cam.cgi` exchange outside [`invoke`](Self::invoke); the caller
    /// holds the exchange lock
    fn send_query(&self, url: &str, query: &CamQuery, session: Option<&str>, name: &str) -> Result<CamReply> {
        debug!(mode = query.mode(), "sending handshake request");
        match self.transport.send(&ControlRequest::Query { url, query, session })? {
            ControlResponse::Query(raw) => camcgi::parse_reply(name, &raw),
            ControlResponse::Action(_) => Err(CommandError::MalformedResponse(format!(
                "{}: expected a cam.cgi answer",
                name
            ))),
        }
    }

    fn query_fields(&self, url: &str, query: &CamQuery, session: Option<&str>) -> Result<Vec<String>> {
        match self.send_query(url, query, session, query.mode())? {
            CamReply::Fields(fields) => Ok(fields),
            CamReply::Document(_) => Err(CommandError::MalformedResponse(format!(
                "{}: expected a text answer",
                query.mode()
            ))),
        }
    }

    /// A grant reads `<friendly name>,remote,open[,<session id>]`
    fn check_grant(&self, grant: &[String]) -> Result<()> {
        match grant {
            [name, ..] if name != &self.descriptor.friendly_name => Err(CommandError::MalformedResponse(format!(
                "accctrl: granted by {}, expected {}",
                name, self.descriptor.friendly_name
            ))),
            [_, role, status, ..] if role == "remote" && status == "open" => Ok(()),
            _ => {
                warn!(?grant, "camera refused remote access");
                Err(CommandError::Rejected("accctrl".to_string()))
            }
        }
    }
}

/// `cam.cgi` lives on the camera's plain HTTP port; only Panasonic devices
/// serve it
fn cam_cgi_url(descriptor: &DeviceDescriptor, port: u16) -> Option<String> {
    if !descriptor.manufacturer.to_lowercase().contains("panasonic") || descriptor.host.is_empty() {
        return None;
    }
    let host = &descriptor.host;
    Some(match port {
        80 => format!("http://{}/cam.cgi", host),
        port => format!("http://{}:{}/cam.cgi", host, port),
    })
}

fn decode(command: &Command, response: ControlResponse) -> Result<Reply> {
    let reply = match response {
        ControlResponse::Action(element) => Reply::decode(command.schema(), &element),
        ControlResponse::Query(raw) => {
            let answer = camcgi::parse_reply(command.name(), &raw)?;
            Reply::decode_query(command.schema(), &answer)
        }
    };
    match reply {
        Reply::Unrecognized(reason) => Err(CommandError::MalformedResponse(format!(
            "{}: {}",
            command.name(),
            reason
        ))),
        reply => Ok(reply),
    }
}

/// Property updates reported by a successful reply, in order
fn state_updates(command: &Command, reply: &Reply) -> Vec<StateUpdate> {
    let source = || UpdateSource::Command {
        action: command.name().to_string(),
    };

    let mut updates: Vec<StateUpdate> = command
        .effects()
        .iter()
        .filter_map(|effect| {
            let raw = match &effect.source {
                EffectSource::Argument(index) => command.args().get(*index).map(String::as_str),
                EffectSource::Output(name) => reply.value(name),
                EffectSource::Constant(value) => Some(value.as_str()),
            }?;
            Some(StateUpdate::new(
                effect.property.clone(),
                PropertyValue::parse(raw),
                source(),
            ))
        })
        .collect();

    if let Reply::State(properties) = reply {
        updates.extend(
            properties
                .iter()
                .map(|(name, value)| StateUpdate::new(name.clone(), value.clone(), source())),
        );
    }

    updates
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("endpoint", &self.descriptor.endpoint)
            .field("cam_cgi_url", &self.cam_cgi_url)
            .field("session", &self.session.read().is_some())
            .field("reject_when_busy", &self.reject_when_busy)
            .finish()
    }
}
