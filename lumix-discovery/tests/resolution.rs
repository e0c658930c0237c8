//! Discovery resolution against canned description documents.

use lumix_discovery::{
    describe, resolve_descriptor_until, DeviceEvent, DiscoveryConfig, DiscoveryError, DiscoveryIterator,
    DocumentFetcher, SsdpResponse,
};
use rstest::rstest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DDD: &str = include_str!("fixtures/ddd.xml");
const CAM_SCPD: &str = include_str!("fixtures/cam_scpd.xml");
const CMS_SCPD: &str = include_str!("fixtures/cms_scpd.xml");

const HOST: &str = "http://192.168.54.1:60606";
const LOCATION: &str = "http://192.168.54.1:60606/Lumix/Server0/ddd";
const USN: &str = "uuid:4D454930-0100-1000-8001-A8C0B6C1D2E3";

/// Serves documents from a map and records every request with its timeout
#[derive(Clone, Default)]
struct MapFetcher {
    documents: HashMap<String, String>,
    requests: Arc<Mutex<Vec<(String, Duration)>>>,
    /// Requests for these URLs fail once each, then succeed
    flaky: Arc<Mutex<Vec<String>>>,
}

impl MapFetcher {
    fn camera() -> Self {
        let mut fetcher = Self::default();
        fetcher.insert(LOCATION, DDD);
        fetcher.insert(&format!("{HOST}/Server0/CAM_scpd"), CAM_SCPD);
        fetcher.insert(&format!("{HOST}/Server0/CMS_scpd"), CMS_SCPD);
        fetcher
    }

    fn insert(&mut self, url: &str, body: &str) {
        self.documents.insert(url.to_string(), body.to_string());
    }

    fn fail_once(&self, url: &str) {
        self.flaky.lock().unwrap().push(url.to_string());
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    fn timeouts(&self) -> Vec<Duration> {
        self.requests.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

impl DocumentFetcher for MapFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> lumix_discovery::Result<String> {
        self.requests.lock().unwrap().push((url.to_string(), timeout));
        let mut flaky = self.flaky.lock().unwrap();
        if let Some(index) = flaky.iter().position(|u| u == url) {
            flaky.remove(index);
            return Err(DiscoveryError::NetworkError(format!("Fetching {url} returned HTTP 500")));
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| DiscoveryError::NetworkError(format!("404 {url}")))
    }
}

fn response(location: &str, usn: &str, st: &str) -> SsdpResponse {
    SsdpResponse {
        location: location.to_string(),
        urn: st.to_string(),
        usn: format!("{usn}::{st}"),
        server: Some("Linux/4.4 UPnP/1.0 Panasonic-UPnP-MW/1.0".to_string()),
    }
}

fn config() -> DiscoveryConfig {
    DiscoveryConfig::with_timeout(Duration::from_millis(500))
}

#[test]
fn test_resolves_camera_with_actions() {
    let responses = vec![response(LOCATION, USN, "upnp:rootdevice")];
    let camera = DiscoveryIterator::with_source(responses, MapFetcher::camera(), config())
        .first_camera()
        .unwrap();

    assert_eq!(camera.id, USN);
    assert_eq!(camera.friendly_name, "G9M2-A1B2C3");
    assert_eq!(camera.model_name, "DC-G9M2");
    assert_eq!(camera.host, "192.168.54.1");
    assert_eq!(camera.endpoint, format!("{HOST}/Server0/CAM_control"));
    assert_eq!(camera.event_url(), Some(format!("{HOST}/Server0/CMS_event").as_str()));

    let (_, zoom) = camera.find_action("SetZoom").unwrap();
    assert_eq!(zoom.inputs, vec!["Position".to_string()]);
    let (_, focus) = camera.find_action("SetFocus").unwrap();
    assert_eq!(focus.outputs, vec!["FocusPosition".to_string()]);
    assert!(camera.advertises("GetProtocolInfo"));
    assert!(!camera.advertises("Browse"));
}

#[test]
fn test_no_responses_is_not_found() {
    let result = DiscoveryIterator::with_source(Vec::new(), MapFetcher::default(), config()).first_camera();
    assert!(matches!(result, Err(DiscoveryError::NotFound { .. })));
}

#[test]
fn test_duplicate_responses_are_resolved_once() {
    let fetcher = MapFetcher::camera();
    let responses = vec![
        response(LOCATION, USN, "upnp:rootdevice"),
        response(LOCATION, USN, "urn:schemas-upnp-org:device:MediaServer:1"),
        response(LOCATION, USN, "upnp:rootdevice"),
    ];

    let found: Vec<_> = DiscoveryIterator::with_source(responses, fetcher.clone(), config()).collect();

    assert_eq!(found.len(), 1);
    // ddd plus two SCPDs, fetched once
    assert_eq!(fetcher.request_count(), 3);
}

#[test]
fn test_transient_fetch_failure_is_retried_on_next_answer() {
    let fetcher = MapFetcher::camera();
    fetcher.fail_once(LOCATION);
    let responses = vec![
        response(LOCATION, USN, "upnp:rootdevice"),
        response(LOCATION, USN, "upnp:rootdevice"),
    ];

    let camera = DiscoveryIterator::with_source(responses, fetcher.clone(), config())
        .first_camera()
        .unwrap();

    assert_eq!(camera.id, USN);
    assert_eq!(fetcher.requests_for(LOCATION), 2);
}

#[test]
fn test_device_that_keeps_failing_is_not_found() {
    let fetcher = MapFetcher::camera();
    fetcher.fail_once(LOCATION);
    fetcher.fail_once(LOCATION);
    let responses = vec![
        response(LOCATION, USN, "upnp:rootdevice"),
        response(LOCATION, USN, "upnp:rootdevice"),
    ];

    let result = DiscoveryIterator::with_source(responses, fetcher.clone(), config()).first_camera();

    assert!(matches!(result, Err(DiscoveryError::NotFound { .. })));
    assert_eq!(fetcher.requests_for(LOCATION), 2);
}

#[test]
fn test_fetches_are_capped_by_search_deadline() {
    let fetcher = MapFetcher::camera();
    let config = DiscoveryConfig {
        timeout: Duration::from_millis(300),
        fetch_timeout: Duration::from_secs(5),
        ..DiscoveryConfig::default()
    };
    let responses = vec![response(LOCATION, USN, "upnp:rootdevice")];

    DiscoveryIterator::with_source(responses, fetcher.clone(), config)
        .first_camera()
        .unwrap();

    let timeouts = fetcher.timeouts();
    assert_eq!(timeouts.len(), 3);
    assert!(timeouts.iter().all(|t| *t <= Duration::from_millis(300)), "{timeouts:?}");
}

#[test]
fn test_nothing_is_fetched_after_deadline() {
    let fetcher = MapFetcher::camera();

    let result = resolve_descriptor_until(&fetcher, LOCATION, &config(), Some(Instant::now()));

    assert!(matches!(result, Err(DiscoveryError::MalformedResponse { .. })));
    assert_eq!(fetcher.request_count(), 0);
}

#[test]
fn test_describe_uses_full_fetch_timeout() {
    let fetcher = MapFetcher::camera();
    let config = config();

    lumix_discovery::resolve_descriptor(&fetcher, LOCATION, &config).unwrap();

    assert!(fetcher.timeouts().iter().all(|t| *t == config.fetch_timeout));
}

#[test]
fn test_malformed_camera_is_skipped_and_search_continues() {
    let mut fetcher = MapFetcher::camera();
    let broken = "http://192.168.54.9:60606/Lumix/Server0/ddd";
    fetcher.insert(broken, "<root><device><friendlyName>half");

    let responses = vec![
        response(broken, "uuid:broken", "upnp:rootdevice"),
        response(LOCATION, USN, "upnp:rootdevice"),
    ];
    let found: Vec<_> = DiscoveryIterator::with_source(responses, fetcher, config())
        .map(|DeviceEvent::Found(camera)| camera)
        .collect();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, USN);
}

#[rstest]
#[case::sonos_speaker(
    "http://10.0.0.9:1400/xml/device_description.xml",
    "urn:schemas-upnp-org:device:ZonePlayer:1",
    Some("Linux UPnP/1.0 Sonos/70.3")
)]
#[case::generic_router("http://10.0.0.1:5000/rootDesc.xml", "upnp:rootdevice", Some("miniupnpd/2.1"))]
#[case::no_server_header("http://10.0.0.3/desc.xml", "upnp:rootdevice", None)]
fn test_non_camera_responses_are_not_fetched(
    #[case] location: &str,
    #[case] st: &str,
    #[case] server: Option<&str>,
) {
    let fetcher = MapFetcher::default();
    let responses = vec![SsdpResponse {
        location: location.to_string(),
        urn: st.to_string(),
        usn: format!("uuid:other::{st}"),
        server: server.map(str::to_string),
    }];

    let found = DiscoveryIterator::with_source(responses, fetcher.clone(), config()).count();

    assert_eq!(found, 0);
    assert_eq!(fetcher.request_count(), 0);
}

#[test]
fn test_other_manufacturer_is_ignored() {
    let mut fetcher = MapFetcher::camera();
    fetcher.insert(LOCATION, &DDD.replace("<manufacturer>Panasonic</manufacturer>", "<manufacturer>Acme</manufacturer>"));

    let responses = vec![response(LOCATION, USN, "upnp:rootdevice")];
    let found = DiscoveryIterator::with_source(responses, fetcher.clone(), config()).count();

    assert_eq!(found, 0);
    // SCPDs are not fetched for a non-camera
    assert_eq!(fetcher.request_count(), 1);
}

#[test]
fn test_missing_scpd_is_malformed() {
    let mut fetcher = MapFetcher::default();
    fetcher.insert(LOCATION, DDD);
    fetcher.insert(&format!("{HOST}/Server0/CAM_scpd"), CAM_SCPD);

    let result = lumix_discovery::resolve_descriptor(&fetcher, LOCATION, &config());
    assert!(matches!(result, Err(DiscoveryError::MalformedResponse { .. })));
}

#[test]
fn test_describe_over_http() {
    let mut server = mockito::Server::new();
    let base = server.url();
    let ddd = server
        .mock("GET", "/Lumix/Server0/ddd")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(DDD)
        .create();
    let cam = server.mock("GET", "/Server0/CAM_scpd").with_body(CAM_SCPD).create();
    let cms = server.mock("GET", "/Server0/CMS_scpd").with_body(CMS_SCPD).create();

    let camera = describe(&format!("{base}/Lumix/Server0/ddd"), &config()).unwrap();

    ddd.assert();
    cam.assert();
    cms.assert();
    assert_eq!(camera.endpoint, format!("{base}/Server0/CAM_control"));
    assert_eq!(camera.host, "127.0.0.1");
}

#[test]
fn test_describe_http_error_is_malformed() {
    let mut server = mockito::Server::new();
    let _ddd = server.mock("GET", "/Lumix/Server0/ddd").with_status(404).create();

    let result = describe(&format!("{}/Lumix/Server0/ddd", server.url()), &config());
    assert!(matches!(result, Err(DiscoveryError::MalformedResponse { .. })));
}
