//! Private SOAP client for UPnP camera communication
//!
//! This crate provides a minimal SOAP client for invoking actions on the
//! camera's UPnP control URLs. It also handles the GENA side of event
//! subscriptions using SUBSCRIBE/UNSUBSCRIBE requests.

mod error;

pub use error::SoapError;

use std::time::Duration;
use tracing::debug;
use xmltree::Element;

const DEFAULT_USER_AGENT: &str = "lumix-remote/0.1 UPnP/1.0";

/// Response from a UPnP subscription request
#[derive(Debug, Clone)]
pub struct SubscriptionResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Actual timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

/// A minimal SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl SoapClient {
    /// Create a new SOAP client with default configuration
    ///
    /// Connect timeout is 5 seconds, read timeout 10 seconds.
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    /// Create a SOAP client with explicit connect and read timeouts
    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Override the User-Agent header sent with every request
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Invoke `action` on a service control URL and return the parsed
    /// `<action>Response` element
    ///
    /// Arguments are written in the given order, each as
    /// `<name>value</name>` with the value XML-escaped.
    pub fn call(
        &self,
        control_url: &str,
        service_type: &str,
        action: &str,
        arguments: &[(String, String)],
    ) -> Result<Element, SoapError> {
        let payload: String = arguments
            .iter()
            .map(|(name, value)| format!("<{name}>{}</{name}>", escape_xml(value)))
            .collect();

        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:{action} xmlns:u="{service_type}">{payload}</u:{action}>
    </s:Body>
</s:Envelope>"#
        );

        let soap_action = format!("\"{}#{}\"", service_type, action);
        debug!(control_url, action, "sending SOAP request");

        let result = self
            .agent
            .post(control_url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .set("User-Agent", &self.user_agent)
            .send_string(&body);

        let xml_text = match result {
            Ok(response) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            // Faults are delivered with HTTP 500 and still carry an envelope
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                match Element::parse(text.as_bytes()) {
                    Ok(xml) => return self.extract_response(&xml, action),
                    Err(_) => {
                        return Err(SoapError::Network(format!(
                            "{action} failed: HTTP {status}"
                        )))
                    }
                }
            }
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml = Element::parse(xml_text.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;

        self.extract_response(&xml, action)
    }

    /// Subscribe to UPnP events at an event subscription URL
    ///
    /// # Arguments
    /// * `event_url` - Absolute event subscription URL of the service
    /// * `callback_url` - URL where NOTIFY requests should be sent
    /// * `timeout_seconds` - Requested lease in seconds
    ///
    /// # Returns
    /// A `SubscriptionResponse` containing the SID and the granted lease
    pub fn subscribe(
        &self,
        event_url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let response = self
            .agent
            .request("SUBSCRIBE", event_url)
            .set("HOST", host_of(event_url))
            .set("User-Agent", &self.user_agent)
            .set("CALLBACK", &format!("<{}>", callback_url))
            .set("NT", "upnp:event")
            .set("TIMEOUT", &format!("Second-{}", timeout_seconds))
            .call()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        if response.status() != 200 {
            return Err(SoapError::Network(format!(
                "SUBSCRIBE failed: HTTP {}",
                response.status()
            )));
        }

        let sid = response
            .header("SID")
            .ok_or_else(|| SoapError::Parse("Missing SID header in SUBSCRIBE response".to_string()))?
            .to_string();

        let granted = response
            .header("TIMEOUT")
            .and_then(parse_timeout_header)
            .unwrap_or(timeout_seconds);

        debug!(event_url, sid = %sid, granted, "subscription accepted");

        Ok(SubscriptionResponse {
            sid,
            timeout_seconds: granted,
        })
    }

    /// Renew an existing UPnP subscription
    ///
    /// Returns the lease granted by the device, falling back to the requested
    /// value when the device omits the TIMEOUT header.
    pub fn renew_subscription(
        &self,
        event_url: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32, SoapError> {
        let response = self
            .agent
            .request("SUBSCRIBE", event_url)
            .set("HOST", host_of(event_url))
            .set("SID", sid)
            .set("TIMEOUT", &format!("Second-{}", timeout_seconds))
            .call()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        if response.status() != 200 {
            return Err(SoapError::Network(format!(
                "SUBSCRIBE renewal failed: HTTP {}",
                response.status()
            )));
        }

        Ok(response
            .header("TIMEOUT")
            .and_then(parse_timeout_header)
            .unwrap_or(timeout_seconds))
    }

    /// Cancel a UPnP subscription
    pub fn unsubscribe(&self, event_url: &str, sid: &str) -> Result<(), SoapError> {
        let response = self
            .agent
            .request("UNSUBSCRIBE", event_url)
            .set("HOST", host_of(event_url))
            .set("SID", sid)
            .call()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        if response.status() != 200 {
            return Err(SoapError::Network(format!(
                "UNSUBSCRIBE failed: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    fn extract_response(&self, xml: &Element, action: &str) -> Result<Element, SoapError> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

        if let Some(fault) = body.get_child("Fault") {
            let error_code = fault
                .get_child("detail")
                .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")))
                .and_then(|e| e.get_child("errorCode"))
                .and_then(|c| c.get_text())
                .and_then(|t| t.trim().parse::<u16>().ok())
                .unwrap_or(500);
            return Err(SoapError::Fault(error_code));
        }

        let response_name = format!("{}Response", action);
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a GENA TIMEOUT header value such as `Second-300`
///
/// `infinite` maps to `u32::MAX`.
pub fn parse_timeout_header(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("infinite") || value.eq_ignore_ascii_case("Second-infinite") {
        return Some(u32::MAX);
    }
    value
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("Second-"))
        .and_then(|_| value[7..].parse::<u32>().ok())
}

/// Extract the `host[:port]` authority from an absolute URL
fn host_of(url: &str) -> &str {
    let rest = url.split("//").nth(1).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
