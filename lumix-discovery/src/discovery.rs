//! Core discovery logic and iterator implementation.
//!
//! The discovery algorithm:
//! 1. Sends SSDP M-SEARCH requests (repeated until the deadline)
//! 2. Drops responses that do not carry the camera signature
//! 3. Fetches the device description and every service's SCPD via HTTP,
//!    each fetch capped by what is left of the search deadline
//! 4. Yields each distinct camera once as a [`DeviceEvent::Found`]
//!
//! A device is only remembered once it resolved (or turned out not to be a
//! camera); a failed fetch is retried on the device's next answer.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::device::{extract_host, parse_scpd, resolve_url, Root};
use crate::error::{DiscoveryError, Result};
use crate::ssdp::{SsdpClient, SsdpResponse};
use crate::{DeviceDescriptor, DeviceEvent, ServiceEndpoint};

/// Source of description documents.
///
/// Discovery only needs `GET url -> body`; keeping that behind a trait lets
/// resolution run against canned documents. `timeout` bounds the whole
/// request.
pub trait DocumentFetcher: Send {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// Blocking HTTP fetcher used by default.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::NetworkError(format!(
                "Fetching {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to read response body: {}", e)))
    }
}

/// Fetch and parse the description documents behind `location`.
///
/// Returns `Ok(None)` when the device is well-formed but its manufacturer
/// does not match the signature. Any fetch or parse failure is reported as
/// [`DiscoveryError::MalformedResponse`].
pub fn resolve_descriptor(
    fetcher: &dyn DocumentFetcher,
    location: &str,
    config: &DiscoveryConfig,
) -> Result<Option<DeviceDescriptor>> {
    resolve_descriptor_until(fetcher, location, config, None)
}

/// [`resolve_descriptor`] that gives up at `deadline`.
///
/// Every fetch waits at most `config.fetch_timeout` or the time left before
/// `deadline`, whichever is shorter. Nothing is fetched once the deadline
/// has passed.
pub fn resolve_descriptor_until(
    fetcher: &dyn DocumentFetcher,
    location: &str,
    config: &DiscoveryConfig,
    deadline: Option<Instant>,
) -> Result<Option<DeviceDescriptor>> {
    let malformed = |reason: String| DiscoveryError::MalformedResponse {
        location: location.to_string(),
        reason,
    };
    let fetch = |url: &str| -> Result<String> {
        let timeout = fetch_budget(config.fetch_timeout, deadline)
            .ok_or_else(|| malformed(format!("discovery deadline passed before fetching {}", url)))?;
        fetcher.fetch(url, timeout).map_err(|e| malformed(e.to_string()))
    };

    let host = extract_host(location).ok_or_else(|| malformed("LOCATION has no host".to_string()))?;
    let xml = fetch(location)?;
    let root = Root::from_xml(&xml).map_err(|e| malformed(e.to_string()))?;

    if !config.signature.matches_manufacturer(&root.device.manufacturer) {
        debug!(location, manufacturer = %root.device.manufacturer, "skipping device from another manufacturer");
        return Ok(None);
    }

    let url_base = root.url_base.as_deref();
    let mut services = Vec::with_capacity(root.device.services().len());
    for service in root.device.services() {
        let scpd_url = resolve_url(location, url_base, &service.scpd_url).map_err(|e| malformed(e.to_string()))?;
        let control_url =
            resolve_url(location, url_base, &service.control_url).map_err(|e| malformed(e.to_string()))?;
        let event_sub_url = if service.event_sub_url.trim().is_empty() {
            None
        } else {
            Some(resolve_url(location, url_base, &service.event_sub_url).map_err(|e| malformed(e.to_string()))?)
        };

        let scpd = fetch(&scpd_url)?;
        let actions = parse_scpd(&scpd).map_err(|e| malformed(e.to_string()))?;
        debug!(service = %service.service_type, actions = actions.len(), "service resolved");

        services.push(ServiceEndpoint {
            service_type: service.service_type.clone(),
            service_id: service.service_id.clone(),
            control_url,
            event_sub_url,
            actions,
        });
    }

    Ok(Some(root.device.into_descriptor(location, host, services)))
}

/// Timeout for the next fetch, or `None` once `deadline` has passed
fn fetch_budget(fetch_timeout: Duration, deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        None => Some(fetch_timeout),
        Some(deadline) => {
            let left = deadline.checked_duration_since(Instant::now())?;
            if left.is_zero() {
                None
            } else {
                Some(left.min(fetch_timeout))
            }
        }
    }
}

/// Iterator that discovers cameras on the local network.
///
/// Yields `DeviceEvent::Found` once per distinct camera. Duplicate answers
/// (the same device responding to several search targets or to repeated
/// M-SEARCH requests) are ignored, and the UDP socket is released when the
/// iterator is dropped.
///
/// # Examples
///
/// ```no_run
/// use lumix_discovery::{get_iter, DeviceEvent};
///
/// for event in get_iter() {
///     match event {
///         DeviceEvent::Found(camera) => {
///             println!("Found: {} at {}", camera.friendly_name, camera.host);
///         }
///     }
/// }
/// ```
pub struct DiscoveryIterator {
    responses: Box<dyn Iterator<Item = Result<SsdpResponse>> + Send>,
    fetcher: Box<dyn DocumentFetcher>,
    config: DiscoveryConfig,
    deadline: Instant,
    seen_devices: HashSet<String>,
    seen_udns: HashSet<String>,
}

impl DiscoveryIterator {
    /// Start an SSDP search with the given configuration
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        let responses = SsdpClient::new()?.search(&config.search_target, config.timeout)?;
        Ok(Self {
            responses: Box::new(responses),
            fetcher: Box::new(fetcher),
            deadline: Instant::now() + config.timeout,
            config,
            seen_devices: HashSet::new(),
            seen_udns: HashSet::new(),
        })
    }

    /// Build an iterator over a fixed set of SSDP responses.
    ///
    /// Used to exercise filtering, deduplication and resolution without a
    /// network. The search deadline is `config.timeout` from now, as for a
    /// live search.
    pub fn with_source(
        responses: impl IntoIterator<Item = SsdpResponse>,
        fetcher: impl DocumentFetcher + 'static,
        config: DiscoveryConfig,
    ) -> Self {
        let responses: Vec<Result<SsdpResponse>> = responses.into_iter().map(Ok).collect();
        Self {
            responses: Box::new(responses.into_iter()),
            fetcher: Box::new(fetcher),
            deadline: Instant::now() + config.timeout,
            config,
            seen_devices: HashSet::new(),
            seen_udns: HashSet::new(),
        }
    }

    /// Create an empty iterator that yields no results.
    /// Used as a fallback when initialization fails.
    pub(crate) fn empty(config: DiscoveryConfig) -> Self {
        Self::with_source(Vec::new(), NoFetcher, config)
    }

    /// Consume the iterator and return the first camera found.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::NotFound`] if the search ends without a match.
    pub fn first_camera(mut self) -> Result<DeviceDescriptor> {
        match self.next() {
            Some(DeviceEvent::Found(camera)) => Ok(camera),
            None => Err(DiscoveryError::NotFound {
                timeout: self.config.timeout,
            }),
        }
    }
}

/// Device key from a USN, without the `::urn:...` suffix
fn device_key(usn: &str) -> &str {
    usn.split("::").next().unwrap_or(usn)
}

impl Iterator for DiscoveryIterator {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let response = match self.responses.next()? {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "SSDP search ended early");
                    return None;
                }
            };

            let key = device_key(&response.usn);
            if self.seen_devices.contains(key) {
                continue;
            }

            if !self
                .config
                .signature
                .matches_response(&response, &self.config.search_target)
            {
                continue;
            }

            let resolved = resolve_descriptor_until(
                self.fetcher.as_ref(),
                &response.location,
                &self.config,
                Some(self.deadline),
            );
            let camera = match resolved {
                Ok(Some(camera)) => {
                    self.seen_devices.insert(key.to_string());
                    camera
                }
                Ok(None) => {
                    self.seen_devices.insert(key.to_string());
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "camera did not resolve, retrying on its next answer");
                    continue;
                }
            };

            if !self.seen_udns.insert(camera.id.clone()) {
                continue;
            }

            info!(
                id = %camera.id,
                name = %camera.friendly_name,
                model = %camera.model_name,
                host = %camera.host,
                "camera found"
            );
            return Some(DeviceEvent::Found(camera));
        }
    }
}

struct NoFetcher;

impl DocumentFetcher for NoFetcher {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<String> {
        Err(DiscoveryError::NetworkError(format!("no fetcher available for {}", url)))
    }
}
