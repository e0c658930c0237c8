//! Transport seam between the command client and the network.

use soap_client::SoapClient;
use std::time::Duration;
use tracing::debug;
use xmltree::Element;

use crate::camcgi::{CamQuery, RawReply};
use crate::error::{CommandError, Result};

/// One control exchange
#[derive(Debug, Clone, Copy)]
pub enum ControlRequest<'a> {
    /// UPnP SOAP action on a declared service
    Action {
        control_url: &'a str,
        service_type: &'a str,
        action: &'a str,
        arguments: &'a [(String, String)],
    },
    /// `cam.cgi` query, sent with the session id once one is open
    Query {
        url: &'a str,
        query: &'a CamQuery,
        session: Option<&'a str>,
    },
}

/// Undecoded answer, matching the request kind
#[derive(Debug, Clone, PartialEq)]
pub enum ControlResponse {
    /// The `<ActionResponse>` element
    Action(Element),
    Query(RawReply),
}

/// Sends one control request and returns the camera's answer.
///
/// Implemented by [`HttpTransport`]; tests substitute a stub.
pub trait ControlTransport: Send + Sync {
    fn send(&self, request: &ControlRequest<'_>) -> Result<ControlResponse>;
}

/// SOAP for UPnP actions, plain GET for `cam.cgi`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    soap: SoapClient,
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        Self {
            soap: SoapClient::with_timeouts(connect_timeout, read_timeout).with_user_agent(user_agent.clone()),
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect_timeout)
                .timeout_read(read_timeout)
                .build(),
            user_agent,
        }
    }

    fn query(&self, url: &str, query: &CamQuery, session: Option<&str>) -> Result<RawReply> {
        let mut request = self
            .agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .set("Connection", "Keep-Alive");
        for (name, value) in query.params() {
            request = request.query(name, value);
        }
        if let Some(session) = session {
            request = request.set("X-SESSION_ID", session);
        }

        debug!(url, mode = query.mode(), "sending cam.cgi request");
        match request.call() {
            Ok(response) => {
                let content_type = response.content_type().to_string();
                let body = response
                    .into_string()
                    .map_err(|e| CommandError::Transport(e.to_string()))?;
                Ok(RawReply { content_type, body })
            }
            Err(ureq::Error::Status(status, _)) => Err(CommandError::Transport(format!(
                "{} failed: HTTP {}",
                query.mode(),
                status
            ))),
            Err(e) => Err(CommandError::Transport(e.to_string())),
        }
    }
}

impl ControlTransport for HttpTransport {
    fn send(&self, request: &ControlRequest<'_>) -> Result<ControlResponse> {
        match *request {
            ControlRequest::Action {
                control_url,
                service_type,
                action,
                arguments,
            } => Ok(ControlResponse::Action(self.soap.call(
                control_url,
                service_type,
                action,
                arguments,
            )?)),
            ControlRequest::Query { url, query, session } => {
                Ok(ControlResponse::Query(self.query(url, query, session)?))
            }
        }
    }
}
