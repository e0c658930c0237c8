//! Discovery configuration

use std::time::Duration;

use crate::error::{DiscoveryError, Result};
use crate::ssdp::SsdpResponse;

/// Identifies which SSDP responders are cameras worth resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSignature {
    /// LOCATION path served by the camera's device description.
    ///
    /// Default: `/Lumix/Server0/ddd`
    pub location_path: String,

    /// Case-insensitive keywords matched against the SERVER, USN and ST headers.
    ///
    /// Default: `["panasonic", "lumix"]`
    pub keywords: Vec<String>,

    /// Substring the description's `manufacturer` must contain (case-insensitive).
    ///
    /// Default: `Panasonic`
    pub manufacturer: String,
}

impl Default for DeviceSignature {
    fn default() -> Self {
        Self {
            location_path: "/Lumix/Server0/ddd".to_string(),
            keywords: vec!["panasonic".to_string(), "lumix".to_string()],
            manufacturer: "Panasonic".to_string(),
        }
    }
}

impl DeviceSignature {
    /// Cheap header-level check, done before any HTTP request
    pub fn matches_response(&self, response: &SsdpResponse, search_target: &str) -> bool {
        if url::Url::parse(&response.location)
            .map(|url| url.path() == self.location_path)
            .unwrap_or(false)
        {
            return true;
        }

        if search_target != "ssdp:all" && response.urn == search_target {
            return true;
        }

        let headers = [
            Some(response.usn.as_str()),
            Some(response.urn.as_str()),
            response.server.as_deref(),
        ];
        headers.into_iter().flatten().any(|header| {
            let header = header.to_lowercase();
            self.keywords
                .iter()
                .any(|keyword| header.contains(&keyword.to_lowercase()))
        })
    }

    /// Check the manufacturer reported by the device description
    pub fn matches_manufacturer(&self, manufacturer: &str) -> bool {
        manufacturer
            .to_lowercase()
            .contains(&self.manufacturer.to_lowercase())
    }
}

/// Configuration for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long to wait for SSDP responses.
    ///
    /// Default: 3 seconds
    pub timeout: Duration,

    /// SSDP search target (`ST` header).
    ///
    /// Default: `urn:schemas-upnp-org:device:MediaServer:1`
    pub search_target: String,

    /// Timeout for fetching description documents.
    ///
    /// Default: 5 seconds
    pub fetch_timeout: Duration,

    /// Camera-family signature.
    pub signature: DeviceSignature,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            search_target: "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
            fetch_timeout: Duration::from_secs(5),
            signature: DeviceSignature::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Default configuration with a custom search timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(DiscoveryError::InvalidConfig(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }

        if self.search_target.trim().is_empty() {
            return Err(DiscoveryError::InvalidConfig(
                "search_target must not be empty".to_string(),
            ));
        }

        if !self.signature.location_path.starts_with('/') {
            return Err(DiscoveryError::InvalidConfig(
                "signature.location_path must be an absolute path".to_string(),
            ));
        }

        Ok(())
    }
}
