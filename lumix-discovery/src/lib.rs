//! Lumix camera discovery
//!
//! Finds cameras on the local network with SSDP, then reads their UPnP
//! device description and service descriptions to learn the control
//! endpoint and the actions the camera accepts.
//!
//! # Quick Start
//!
//! ```no_run
//! use lumix_discovery::discover;
//! use std::time::Duration;
//!
//! let camera = discover(Duration::from_secs(3))?;
//! println!("{} at {}", camera.friendly_name, camera.endpoint);
//! for action in camera.actions() {
//!     println!("  {}({})", action.name, action.inputs.join(", "));
//! }
//! # Ok::<(), lumix_discovery::DiscoveryError>(())
//! ```
//!
//! # Iterator-based Discovery
//!
//! ```no_run
//! use lumix_discovery::{get_iter, DeviceEvent};
//!
//! for event in get_iter() {
//!     match event {
//!         DeviceEvent::Found(camera) => println!("Found: {}", camera.friendly_name),
//!     }
//! }
//! ```

mod config;
pub mod device;
mod discovery;
mod error;
mod ssdp;

pub use config::{DeviceSignature, DiscoveryConfig};
pub use discovery::{resolve_descriptor, resolve_descriptor_until, DiscoveryIterator, DocumentFetcher, HttpFetcher};
pub use error::{DiscoveryError, Result};
pub use ssdp::SsdpResponse;

use std::time::Duration;

/// An action declared in a service description, with its argument names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    /// In-argument names, in declaration order
    pub inputs: Vec<String>,
    /// Out-argument names, in declaration order
    pub outputs: Vec<String>,
}

/// One UPnP service of the camera, with absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub event_sub_url: Option<String>,
    pub actions: Vec<ActionSpec>,
}

/// Everything needed to talk to a discovered camera.
///
/// Immutable once created; a reconnect produces a new descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Unique device identifier (UDN), e.g. "uuid:4D454930-0100-1000-8001-A8C0B6C1D2E3"
    pub id: String,
    pub friendly_name: String,
    pub model_name: String,
    pub manufacturer: String,
    pub serial_number: Option<String>,
    /// URL of the device description document
    pub location: String,
    /// Host part of `location`
    pub host: String,
    /// Control URL of the primary service
    pub endpoint: String,
    pub services: Vec<ServiceEndpoint>,
}

impl DeviceDescriptor {
    /// All declared actions across services
    pub fn actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.services.iter().flat_map(|service| service.actions.iter())
    }

    /// Whether the camera declared an action with this name
    pub fn advertises(&self, action: &str) -> bool {
        self.find_action(action).is_some()
    }

    /// Find the service declaring `action` together with its spec
    pub fn find_action(&self, action: &str) -> Option<(&ServiceEndpoint, &ActionSpec)> {
        self.services.iter().find_map(|service| {
            service
                .actions
                .iter()
                .find(|spec| spec.name == action)
                .map(|spec| (service, spec))
        })
    }

    /// Event subscription URL for camera state notifications.
    ///
    /// The camera publishes its state on the ConnectionManager service; any
    /// other eventing service is used as a fallback.
    pub fn event_url(&self) -> Option<&str> {
        self.services
            .iter()
            .filter(|service| service.event_sub_url.is_some())
            .max_by_key(|service| service.service_type.contains(":ConnectionManager:"))
            .and_then(|service| service.event_sub_url.as_deref())
    }
}

/// Events emitted during discovery.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A camera was found on the network
    Found(DeviceDescriptor),
}

/// Find the first camera that answers within `timeout`.
///
/// # Errors
///
/// [`DiscoveryError::NotFound`] if no camera answers in time,
/// [`DiscoveryError::NetworkError`] if the search cannot be started.
pub fn discover(timeout: Duration) -> Result<DeviceDescriptor> {
    discover_with(DiscoveryConfig::with_timeout(timeout))
}

/// Find the first camera using a custom configuration.
pub fn discover_with(config: DiscoveryConfig) -> Result<DeviceDescriptor> {
    DiscoveryIterator::new(config)?.first_camera()
}

/// Read the description documents of a camera at a known location.
///
/// Skips SSDP entirely; useful when the camera's address is already known.
pub fn describe(location: &str, config: &DiscoveryConfig) -> Result<DeviceDescriptor> {
    let fetcher = HttpFetcher::new(config.fetch_timeout)?;
    resolve_descriptor(&fetcher, location, config)?.ok_or_else(|| DiscoveryError::MalformedResponse {
        location: location.to_string(),
        reason: format!("manufacturer does not match {}", config.signature.manufacturer),
    })
}

/// Iterate over all cameras found with a default 3-second timeout.
pub fn get_iter() -> DiscoveryIterator {
    get_iter_with_config(DiscoveryConfig::default())
}

/// Iterate over all cameras found within `timeout`.
pub fn get_iter_with_timeout(timeout: Duration) -> DiscoveryIterator {
    get_iter_with_config(DiscoveryConfig::with_timeout(timeout))
}

/// Iterate over all cameras using a custom configuration.
///
/// If the search cannot be started the iterator is empty; the failure is
/// logged.
pub fn get_iter_with_config(config: DiscoveryConfig) -> DiscoveryIterator {
    match DiscoveryIterator::new(config.clone()) {
        Ok(iter) => iter,
        Err(e) => {
            tracing::warn!(error = %e, "discovery could not start");
            DiscoveryIterator::empty(config)
        }
    }
}

/// Collect every camera that answers within `timeout`.
pub fn get_with_timeout(timeout: Duration) -> Vec<DeviceDescriptor> {
    get_iter_with_timeout(timeout)
        .map(|event| match event {
            DeviceEvent::Found(camera) => camera,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> DeviceDescriptor {
        let action = |name: &str| ActionSpec {
            name: name.to_string(),
            inputs: vec![],
            outputs: vec![],
        };
        DeviceDescriptor {
            id: "uuid:cam".to_string(),
            friendly_name: "G9M2".to_string(),
            model_name: "DC-G9M2".to_string(),
            manufacturer: "Panasonic".to_string(),
            serial_number: None,
            location: "http://10.0.0.2:60606/Lumix/Server0/ddd".to_string(),
            host: "10.0.0.2".to_string(),
            endpoint: "http://10.0.0.2:60606/Server0/CDS_control".to_string(),
            services: vec![
                ServiceEndpoint {
                    service_type: "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
                    service_id: "urn:upnp-org:serviceId:ContentDirectory".to_string(),
                    control_url: "http://10.0.0.2:60606/Server0/CDS_control".to_string(),
                    event_sub_url: Some("http://10.0.0.2:60606/Server0/CDS_event".to_string()),
                    actions: vec![action("Browse")],
                },
                ServiceEndpoint {
                    service_type: "urn:schemas-upnp-org:service:ConnectionManager:1".to_string(),
                    service_id: "urn:upnp-org:serviceId:ConnectionManager".to_string(),
                    control_url: "http://10.0.0.2:60606/Server0/CMS_control".to_string(),
                    event_sub_url: Some("http://10.0.0.2:60606/Server0/CMS_event".to_string()),
                    actions: vec![action("GetProtocolInfo")],
                },
            ],
        }
    }

    #[test]
    fn test_advertises_and_find_action() {
        let camera = descriptor();
        assert!(camera.advertises("Browse"));
        assert!(!camera.advertises("SetZoom"));

        let (service, spec) = camera.find_action("GetProtocolInfo").unwrap();
        assert_eq!(spec.name, "GetProtocolInfo");
        assert!(service.control_url.ends_with("CMS_control"));
        assert_eq!(camera.actions().count(), 2);
    }

    #[test]
    fn test_event_url_prefers_connection_manager() {
        let camera = descriptor();
        assert_eq!(camera.event_url(), Some("http://10.0.0.2:60606/Server0/CMS_event"));
    }

    #[test]
    fn test_event_url_falls_back_to_any_eventing_service() {
        let mut camera = descriptor();
        camera.services[1].event_sub_url = None;
        assert_eq!(camera.event_url(), Some("http://10.0.0.2:60606/Server0/CDS_event"));

        camera.services[0].event_sub_url = None;
        assert_eq!(camera.event_url(), None);
    }
}
