//! Device description (ddd) and service description (SCPD) parsing.
//!
//! The camera serves a standard UPnP device description listing its
//! services. Each service points at an SCPD document declaring the actions
//! it accepts and their in/out arguments.

use serde::Deserialize;
use url::Url;

use crate::error::{DiscoveryError, Result};
use crate::{ActionSpec, DeviceDescriptor, ServiceEndpoint};

/// UPnP device description root element.
#[derive(Debug, Deserialize)]
pub struct Root {
    #[serde(rename = "URLBase")]
    pub url_base: Option<String>,
    pub device: DeviceDescription,
}

impl Root {
    /// Parse a device description document.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::ParseError` if the XML is malformed or missing required fields.
    pub fn from_xml(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::ParseError(format!("Failed to parse device XML: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: String,
    pub service_list: Option<ServiceList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceList {
    #[serde(default)]
    pub service: Vec<ServiceDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: String,
    #[serde(rename = "SCPDURL")]
    pub scpd_url: String,
    #[serde(rename = "controlURL")]
    pub control_url: String,
    #[serde(rename = "eventSubURL", default)]
    pub event_sub_url: String,
}

impl DeviceDescription {
    pub fn services(&self) -> &[ServiceDescription] {
        self.service_list
            .as_ref()
            .map(|list| list.service.as_slice())
            .unwrap_or(&[])
    }

    /// Build the public descriptor once every service's actions are known.
    ///
    /// `services` pairs each service of this description with its resolved
    /// endpoint, in document order.
    pub fn into_descriptor(
        self,
        location: &str,
        host: String,
        services: Vec<ServiceEndpoint>,
    ) -> DeviceDescriptor {
        let endpoint = services
            .iter()
            .find(|service| !service.actions.is_empty())
            .or_else(|| services.first())
            .map(|service| service.control_url.clone())
            .unwrap_or_else(|| location.to_string());

        DeviceDescriptor {
            id: self.udn,
            friendly_name: self.friendly_name,
            model_name: self.model_name,
            manufacturer: self.manufacturer,
            serial_number: self.serial_number,
            location: location.to_string(),
            host,
            endpoint,
            services,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scpd {
    action_list: Option<ActionList>,
}

#[derive(Debug, Deserialize)]
struct ActionList {
    #[serde(default)]
    action: Vec<ActionXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionXml {
    name: String,
    argument_list: Option<ArgumentList>,
}

#[derive(Debug, Deserialize)]
struct ArgumentList {
    #[serde(default)]
    argument: Vec<ArgumentXml>,
}

#[derive(Debug, Deserialize)]
struct ArgumentXml {
    name: String,
    direction: String,
}

/// Parse the action list of a service description document
pub fn parse_scpd(xml: &str) -> Result<Vec<ActionSpec>> {
    let scpd: Scpd = quick_xml::de::from_str(xml)
        .map_err(|e| DiscoveryError::ParseError(format!("Failed to parse SCPD XML: {}", e)))?;

    let actions = scpd
        .action_list
        .map(|list| list.action)
        .unwrap_or_default()
        .into_iter()
        .map(|action| {
            let mut spec = ActionSpec {
                name: action.name,
                inputs: Vec::new(),
                outputs: Vec::new(),
            };
            for argument in action.argument_list.map(|l| l.argument).unwrap_or_default() {
                if argument.direction.trim().eq_ignore_ascii_case("out") {
                    spec.outputs.push(argument.name);
                } else {
                    spec.inputs.push(argument.name);
                }
            }
            spec
        })
        .collect();

    Ok(actions)
}

/// Resolve a possibly relative URL from a description document.
///
/// Relative URLs resolve against `URLBase` when the document has one,
/// otherwise against the description's own location.
pub fn resolve_url(location: &str, url_base: Option<&str>, reference: &str) -> Result<String> {
    let base = url_base
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(location);
    let base = Url::parse(base.trim())
        .map_err(|e| DiscoveryError::ParseError(format!("Invalid base URL {}: {}", base, e)))?;
    base.join(reference.trim())
        .map(String::from)
        .map_err(|e| DiscoveryError::ParseError(format!("Invalid URL {}: {}", reference, e)))
}

/// Extract the host (IP address or name) from a URL.
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}
