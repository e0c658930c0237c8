//! CommandClient behaviour against stub and mock-HTTP transports.

use lumix_control::{
    catalog, CamQuery, ClientConfig, Command, CommandClient, CommandError, ControlRequest, ControlResponse,
    ControlTransport, EffectSource, RawReply, Reply,
};
use lumix_discovery::{ActionSpec, DeviceDescriptor, ServiceEndpoint};
use lumix_state::{keys, PropertyValue, StateCache, StateUpdate, UpdateSource};
use mockito::Matcher;
use rstest::rstest;
use soap_client::SoapError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use xmltree::Element;

const SERVICE: &str = "urn:schemas-panasonic-com:service:CameraControl:1";
const CAMERA: &str = "G9M2-A1B2C3";

fn action(name: &str, inputs: &[&str], outputs: &[&str]) -> ActionSpec {
    ActionSpec {
        name: name.to_string(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
    }
}

fn descriptor_at(host: &str, control_url: &str) -> Arc<DeviceDescriptor> {
    Arc::new(DeviceDescriptor {
        id: "uuid:4D454930-0100-1000-8001-A8C0B6C1D2E3".to_string(),
        friendly_name: CAMERA.to_string(),
        model_name: "DC-G9M2".to_string(),
        manufacturer: "Panasonic".to_string(),
        serial_number: None,
        location: format!("http://{host}:60606/Lumix/Server0/ddd"),
        host: host.to_string(),
        endpoint: control_url.to_string(),
        services: vec![ServiceEndpoint {
            service_type: SERVICE.to_string(),
            service_id: "urn:panasonic-com:serviceId:CameraControl".to_string(),
            control_url: control_url.to_string(),
            event_sub_url: None,
            actions: vec![
                action("SetZoom", &["Position"], &[]),
                action("Capture", &[], &[]),
            ],
        }],
    })
}

fn descriptor(control_url: &str) -> Arc<DeviceDescriptor> {
    descriptor_at("192.168.54.1", control_url)
}

/// One request as the stub saw it
#[derive(Debug, Clone)]
struct Sent {
    /// Action name, or the `cam.cgi` mode
    target: String,
    params: Vec<(String, String)>,
    session: Option<String>,
}

impl Sent {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

type Responder = Box<dyn Fn(&Sent) -> lumix_control::Result<ControlResponse> + Send + Sync>;

/// Records every request and answers with a canned responder
struct StubTransport {
    sent: Mutex<Vec<Sent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    respond: Responder,
}

impl StubTransport {
    fn new(respond: impl Fn(&Sent) -> lumix_control::Result<ControlResponse> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            respond: Box::new(respond),
        })
    }

    /// Acknowledges everything
    fn healthy() -> Arc<Self> {
        Self::new(|sent| {
            Ok(if sent.params.is_empty() {
                action_ack(&sent.target)
            } else {
                xml("<camrply><result>ok</result></camrply>")
            })
        })
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl ControlTransport for StubTransport {
    fn send(&self, request: &ControlRequest<'_>) -> lumix_control::Result<ControlResponse> {
        let sent = match *request {
            ControlRequest::Action { action, .. } => Sent {
                target: action.to_string(),
                params: Vec::new(),
                session: None,
            },
            ControlRequest::Query { query, session, .. } => Sent {
                target: query.mode().to_string(),
                params: query
                    .params()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                session: session.map(str::to_string),
            },
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.sent.lock().unwrap().push(sent.clone());
        thread::sleep(Duration::from_millis(2));
        let result = (self.respond)(&sent);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn element(xml: &str) -> Element {
    Element::parse(xml.as_bytes()).unwrap()
}

fn action_ack(action: &str) -> ControlResponse {
    ControlResponse::Action(element(&format!("<u:{action}Response xmlns:u=\"{SERVICE}\"/>")))
}

fn xml(body: &str) -> ControlResponse {
    ControlResponse::Query(RawReply::xml(body))
}

fn text(body: &str) -> ControlResponse {
    ControlResponse::Query(RawReply::text(body))
}

fn client(transport: Arc<StubTransport>) -> (CommandClient, Arc<StateCache>) {
    let state = Arc::new(StateCache::new());
    let client = CommandClient::with_transport(descriptor("http://stub/control"), Arc::clone(&state), transport);
    (client, state)
}

/// Client with a session already granted
fn connected(transport: Arc<StubTransport>) -> (CommandClient, Arc<StateCache>) {
    let (client, state) = client(transport);
    client.resume_session("4D454930");
    (client, state)
}

#[test]
fn test_unadvertised_action_is_rejected_without_traffic() {
    let transport = StubTransport::healthy();
    let (client, state) = connected(Arc::clone(&transport));

    let result = client.invoke(&Command::new("PowerOff"));

    assert!(matches!(result, Err(CommandError::UnsupportedCommand(name)) if name == "PowerOff"));
    assert_eq!(transport.count(), 0);
    assert_eq!(state.revision(), 0);
}

#[test]
fn test_unknown_mode_is_rejected_without_traffic() {
    let transport = StubTransport::healthy();
    let (client, _state) = connected(Arc::clone(&transport));

    let result = client.invoke(&Command::query("reboot", CamQuery::new("reboot")));

    assert!(matches!(result, Err(CommandError::UnsupportedCommand(name)) if name == "reboot"));
    assert_eq!(transport.count(), 0);
}

#[test]
fn test_camera_without_cam_cgi_rejects_catalog_commands() {
    let transport = StubTransport::healthy();
    let mut descriptor = (*descriptor("http://stub/control")).clone();
    descriptor.manufacturer = "Acme".to_string();
    let client = CommandClient::with_transport(Arc::new(descriptor), Arc::new(StateCache::new()), transport.clone());
    client.resume_session("4D454930");

    assert_eq!(client.cam_cgi_url(), None);
    assert!(matches!(
        client.invoke(&catalog::capture()),
        Err(CommandError::UnsupportedCommand(_))
    ));
    assert!(matches!(
        client.open_session("laptop"),
        Err(CommandError::UnsupportedCommand(_))
    ));
    assert_eq!(transport.count(), 0);
}

#[test]
fn test_query_without_session_is_not_connected() {
    let transport = StubTransport::healthy();
    let (client, state) = client(Arc::clone(&transport));

    assert!(matches!(
        client.invoke(&catalog::capture()),
        Err(CommandError::NotConnected(name)) if name == "capture"
    ));
    assert_eq!(transport.count(), 0);
    assert_eq!(state.revision(), 0);
}

#[test]
fn test_queries_carry_the_session() {
    let transport = StubTransport::healthy();
    let (client, state) = connected(Arc::clone(&transport));

    let outcome = client.invoke(&catalog::start_stream(49152)).unwrap();

    assert_eq!(outcome.reply, Reply::Ack);
    assert_eq!(state.get().get_i64(keys::STREAM_PORT), Some(49152));
    let sent = transport.sent();
    assert_eq!(sent[0].target, "startstream");
    assert_eq!(sent[0].param("value"), Some("49152"));
    assert_eq!(sent[0].session.as_deref(), Some("4D454930"));
}

#[test]
fn test_set_zoom_action_updates_state() {
    let transport = StubTransport::healthy();
    let (client, state) = client(Arc::clone(&transport));
    let command = Command::new("SetZoom")
        .arg(50)
        .reports(keys::ZOOM_POSITION, EffectSource::Argument(0));

    let outcome = client.invoke(&command).unwrap();

    assert_eq!(outcome.reply, Reply::Ack);
    assert_eq!(outcome.revision, Some(1));
    assert_eq!(state.get().get_i64(keys::ZOOM_POSITION), Some(50));
    assert_eq!(transport.sent()[0].target, "SetZoom");
}

#[rstest]
#[case::missing(Command::new("SetZoom"), 1, 0)]
#[case::extra(Command::new("Capture").arg("now"), 0, 1)]
fn test_argument_count_mismatch(#[case] command: Command, #[case] expected: usize, #[case] actual: usize) {
    let transport = StubTransport::healthy();
    let (client, _state) = client(Arc::clone(&transport));

    match client.invoke(&command) {
        Err(CommandError::InvalidArguments {
            expected: e, actual: a, ..
        }) => {
            assert_eq!((e, a), (expected, actual));
        }
        other => panic!("expected InvalidArguments, got {:?}", other),
    }
    assert_eq!(transport.count(), 0);
}

#[rstest]
#[case::busy("err_busy", "busy")]
#[case::param("err_param", "param")]
#[case::reject("err_reject", "reject")]
#[case::other("err_nospace", "other")]
fn test_device_results_are_distinct_errors(#[case] result: &'static str, #[case] kind: &str) {
    let transport = StubTransport::new(move |_| Ok(xml(&format!("<camrply><result>{result}</result></camrply>"))));
    let (client, state) = connected(transport);

    match (kind, client.invoke(&catalog::set_mode(catalog::CameraMode::Rec))) {
        ("busy", Err(CommandError::DeviceBusy(name))) => assert_eq!(name, "recmode"),
        ("param", Err(CommandError::InvalidParameter(_))) => {}
        ("reject", Err(CommandError::Rejected(_))) => {}
        ("other", Err(CommandError::DeviceStatus { status, .. })) => assert_eq!(status, "err_nospace"),
        (kind, other) => panic!("expected {kind}, got {:?}", other),
    }
    assert_eq!(state.revision(), 0);
}

#[rstest]
#[case::fault(SoapError::Fault(701), "device")]
#[case::network(SoapError::Network("connection reset".to_string()), "transport")]
#[case::parse(SoapError::Parse("Missing SetZoomResponse element".to_string()), "malformed")]
fn test_action_failures_leave_state_untouched(#[case] error: SoapError, #[case] kind: &str) {
    let error = Mutex::new(Some(error));
    let transport = StubTransport::new(move |_| Err(error.lock().unwrap().take().unwrap().into()));
    let (client, state) = client(transport);
    let command = Command::new("SetZoom")
        .arg(10)
        .reports(keys::ZOOM_POSITION, EffectSource::Argument(0));

    match (kind, client.invoke(&command)) {
        ("device", Err(CommandError::Device { code: 701 })) => {}
        ("transport", Err(CommandError::Transport(_))) => {}
        ("malformed", Err(CommandError::MalformedResponse(_))) => {}
        (kind, other) => panic!("expected {kind} error, got {:?}", other),
    }
    assert_eq!(state.revision(), 0);
    assert!(state.get().get(keys::ZOOM_POSITION).is_none());
}

#[test]
fn test_focus_step_applies_reported_position() {
    let transport = StubTransport::new(|_| Ok(text("ok,564,1024,0,0")));
    let (client, state) = connected(Arc::clone(&transport));

    let outcome = client.invoke(&catalog::focus_step(catalog::FocusStep::TeleNormal)).unwrap();

    assert_eq!(outcome.reply.value("FocusPosition"), Some("564"));
    assert_eq!(state.get().get_i64(keys::FOCUS_POSITION), Some(564));
    let sent = transport.sent();
    assert_eq!(sent[0].param("type"), Some("focus"));
    assert_eq!(sent[0].param("value"), Some("tele-normal"));
}

#[test]
fn test_focus_reply_without_fields_is_malformed() {
    let transport = StubTransport::new(|_| Ok(text("ok")));
    let (client, state) = connected(transport);

    let result = client.invoke(&catalog::focus_step(catalog::FocusStep::WideFast));

    assert!(matches!(result, Err(CommandError::MalformedResponse(_))));
    assert_eq!(state.revision(), 0);
}

#[test]
fn test_get_state_applies_every_property() {
    let transport = StubTransport::new(|_| {
        Ok(xml(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <camrply><result>ok</result><state><batt>3/3</batt><cammode>rec</cammode><rec>off</rec></state></camrply>",
        ))
    });
    let (client, state) = connected(transport);

    let outcome = client.invoke(&catalog::get_state()).unwrap();

    assert_eq!(outcome.revision, Some(3));
    let snapshot = state.get();
    assert_eq!(snapshot.get(keys::BATTERY_LEVEL), Some(&PropertyValue::from("3/3")));
    assert_eq!(snapshot.get(keys::CAMERA_MODE), Some(&PropertyValue::from("rec")));
    assert_eq!(snapshot.get(keys::RECORDING_STATUS), Some(&PropertyValue::from("off")));
}

#[test]
fn test_busy_camera_rejects_idle_only_commands() {
    let transport = StubTransport::healthy();
    let (client, state) = connected(Arc::clone(&transport));
    state.apply(StateUpdate::new(keys::SYNC_STATUS, "busy", UpdateSource::Event { seq: Some(0) }));

    for command in [
        catalog::start_stream(49152),
        catalog::stop_stream(),
        catalog::focus_step(catalog::FocusStep::TeleFast),
        catalog::set_mode(catalog::CameraMode::Play),
        catalog::power_off(),
    ] {
        assert!(
            matches!(client.invoke(&command), Err(CommandError::CameraBusy(_))),
            "{} should be refused",
            command.name()
        );
    }
    assert_eq!(transport.count(), 0);

    // Shutter and autofocus still work
    assert!(client.invoke(&catalog::capture()).is_ok());
    assert!(client.invoke(&catalog::oneshot_af()).is_ok());
    assert_eq!(transport.count(), 2);
}

#[test]
fn test_concurrent_invocations_are_serialized() {
    let transport = StubTransport::healthy();
    let (client, state) = connected(Arc::clone(&transport));
    let client = Arc::new(client);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || client.invoke(&catalog::start_stream(49152)).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(transport.count(), 8);
    assert_eq!(state.revision(), 8);
}

#[test]
fn test_state_changes_follow_send_order() {
    let state = Arc::new(StateCache::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let transport = {
        let state = Arc::clone(&state);
        let observed = Arc::clone(&observed);
        let replies = AtomicUsize::new(0);
        StubTransport::new(move |_| {
            // What the previous exchange left in the cache when this one starts
            observed.lock().unwrap().push(state.get().get_i64(keys::FOCUS_POSITION));
            let n = replies.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                thread::sleep(Duration::from_millis(100));
            }
            Ok(text(&format!("ok,{n},1024")))
        })
    };
    let client = Arc::new(CommandClient::with_transport(
        descriptor("http://stub/control"),
        Arc::clone(&state),
        transport,
    ));
    client.resume_session("4D454930");
    let changes = state.changes();

    let first = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.invoke(&catalog::focus_step(catalog::FocusStep::TeleFast)))
    };
    thread::sleep(Duration::from_millis(20));
    let second = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.invoke(&catalog::focus_step(catalog::FocusStep::TeleFast)))
    };
    let first = first.join().unwrap().unwrap();
    let second = second.join().unwrap().unwrap();

    assert_eq!(*observed.lock().unwrap(), vec![None, Some(1)]);
    assert_eq!(first.revision, Some(1));
    assert_eq!(second.revision, Some(2));
    let feed: Vec<_> = changes.drain().map(|change| change.value).collect();
    assert_eq!(feed, vec![Some(PropertyValue::Integer(1)), Some(PropertyValue::Integer(2))]);
    assert_eq!(state.get().get_i64(keys::FOCUS_POSITION), Some(2));
}

fn handshake_responder(grants_before_session: usize) -> Arc<StubTransport> {
    let grants = AtomicUsize::new(0);
    StubTransport::new(move |sent| match (sent.target.as_str(), sent.param("type")) {
        ("accctrl", Some("req_acc_g")) => Ok(text("ok,12345678")),
        ("accctrl", Some("req_acc_e")) => {
            if grants.fetch_add(1, Ordering::SeqCst) < grants_before_session {
                Ok(text(&format!("ok,{CAMERA},remote,open")))
            } else {
                Ok(text(&format!("ok,{CAMERA},remote,open,4D454930")))
            }
        }
        _ => Ok(xml("<camrply><result>ok</result></camrply>")),
    })
}

#[test]
fn test_open_session_runs_access_handshake() {
    let transport = handshake_responder(1);
    let (client, _state) = client(Arc::clone(&transport));

    let session = client.open_session("my-laptop").unwrap();

    assert_eq!(session, "4D454930");
    assert_eq!(client.session().as_deref(), Some("4D454930"));

    let sent = transport.sent();
    let steps: Vec<_> = sent
        .iter()
        .map(|s| (s.target.as_str(), s.param("type").unwrap_or_default()))
        .collect();
    assert_eq!(
        steps,
        [
            ("accctrl", "req_acc_g"),
            ("accctrl", "req_acc_e"),
            ("accctrl", "req_acc_e"),
            ("setsetting", "device_name"),
        ]
    );
    assert_eq!(
        sent[1].param("value"),
        Some("4d62702648650d264867043f48671922407b042255670422481706224a66042240670126")
    );
    assert_eq!(sent[1].param("value2"), Some("87636454"));
    assert!(sent[..3].iter().all(|s| s.session.is_none()));
    assert_eq!(sent[3].param("value"), Some("my-laptop"));
    assert_eq!(sent[3].session.as_deref(), Some("4D454930"));
}

#[test]
fn test_open_session_without_id_fails() {
    let transport = handshake_responder(usize::MAX);
    let (client, _state) = client(Arc::clone(&transport));

    assert!(matches!(
        client.open_session("my-laptop"),
        Err(CommandError::MalformedResponse(_))
    ));
    assert_eq!(client.session(), None);
    // Challenge plus two answers, no announcement
    assert_eq!(transport.count(), 3);
}

#[rstest]
#[case::other_camera("ok,GH5-XYZ,remote,open,1", "malformed")]
#[case::refused("ok,G9M2-A1B2C3,remote,closed", "rejected")]
#[case::short("ok,G9M2-A1B2C3", "rejected")]
fn test_open_session_checks_grant(#[case] grant: &'static str, #[case] kind: &str) {
    let transport = StubTransport::new(move |sent| match sent.param("type") {
        Some("req_acc_g") => Ok(text("ok,12345678")),
        _ => Ok(text(grant)),
    });
    let (client, _state) = client(transport);

    match (kind, client.open_session("my-laptop")) {
        ("malformed", Err(CommandError::MalformedResponse(_))) => {}
        ("rejected", Err(CommandError::Rejected(name))) => assert_eq!(name, "accctrl"),
        (kind, other) => panic!("expected {kind}, got {:?}", other),
    }
    assert_eq!(client.session(), None);
}

#[test]
fn test_close_session_disconnects() {
    let transport = StubTransport::healthy();
    let (client, _state) = connected(Arc::clone(&transport));

    client.close_session();

    assert!(matches!(
        client.invoke(&catalog::capture()),
        Err(CommandError::NotConnected(_))
    ));
    assert_eq!(transport.count(), 0);
}

fn cam_cgi_client(server: &mockito::Server) -> (CommandClient, Arc<StateCache>) {
    let config = ClientConfig {
        cam_cgi_port: server.socket_address().port(),
        ..ClientConfig::fast()
    };
    let state = Arc::new(StateCache::new());
    let client = CommandClient::new(
        descriptor_at("127.0.0.1", "http://127.0.0.1:1/unused"),
        Arc::clone(&state),
        &config,
    )
    .unwrap();
    (client, state)
}

fn query(pairs: &[(&str, &str)]) -> Matcher {
    Matcher::AllOf(
        pairs
            .iter()
            .map(|(name, value)| Matcher::UrlEncoded(name.to_string(), value.to_string()))
            .collect(),
    )
}

#[test]
fn test_handshake_over_http() {
    let mut server = mockito::Server::new();
    let challenge = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "accctrl"), ("type", "req_acc_g")]))
        .match_header("User-Agent", "LUMIX Sync")
        .with_header("content-type", "text/plain")
        .with_body("ok,12345678")
        .create();
    let grant = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "accctrl"), ("type", "req_acc_e"), ("value2", "87636454")]))
        .with_header("content-type", "text/plain")
        .with_body(format!("ok,{CAMERA},remote,open,4D454930"))
        .create();
    let announce = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "setsetting"), ("type", "device_name"), ("value", "my laptop")]))
        .match_header("X-SESSION_ID", "4D454930")
        .with_header("content-type", "text/xml")
        .with_body("<?xml version=\"1.0\"?><camrply><result>ok</result></camrply>")
        .create();
    let capture = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "camcmd"), ("value", "capture")]))
        .match_header("X-SESSION_ID", "4D454930")
        .with_header("content-type", "text/xml")
        .with_body("<?xml version=\"1.0\"?><camrply><result>ok</result></camrply>")
        .create();

    let (client, _state) = cam_cgi_client(&server);
    client.open_session("my laptop").unwrap();
    client.invoke(&catalog::capture()).unwrap();

    challenge.assert();
    grant.assert();
    announce.assert();
    capture.assert();
}

#[test]
fn test_device_errors_over_http() {
    let mut server = mockito::Server::new();
    let _busy = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "camcmd"), ("value", "video_recstart")]))
        .with_header("content-type", "text/xml")
        .with_body("<?xml version=\"1.0\"?><camrply><result>err_busy</result></camrply>")
        .create();
    let _reject = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "startstream")]))
        .with_header("content-type", "text/plain")
        .with_body("err_reject")
        .create();
    let _missing = server
        .mock("GET", "/cam.cgi")
        .match_query(query(&[("mode", "stopstream")]))
        .with_status(404)
        .create();

    let (client, state) = cam_cgi_client(&server);
    client.resume_session("4D454930");

    assert!(matches!(
        client.invoke(&catalog::start_recording()),
        Err(CommandError::DeviceBusy(_))
    ));
    assert!(matches!(
        client.invoke(&catalog::start_stream(49152)),
        Err(CommandError::Rejected(_))
    ));
    assert!(matches!(
        client.invoke(&catalog::stop_stream()),
        Err(CommandError::Transport(_))
    ));
    assert_eq!(state.revision(), 0);
}

#[test]
fn test_soap_round_trip_over_http() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/Server0/CAM_control")
        .match_header("SOAPACTION", format!("\"{SERVICE}#SetZoom\"").as_str())
        .match_header("User-Agent", "LUMIX Sync")
        .match_body(Matcher::Regex("<Position>42</Position>".to_string()))
        .with_status(200)
        .with_header("content-type", "text/xml; charset=\"utf-8\"")
        .with_body(format!(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body><u:SetZoomResponse xmlns:u="{SERVICE}"/></s:Body>
</s:Envelope>"#
        ))
        .create();

    let state = Arc::new(StateCache::new());
    let url = format!("{}/Server0/CAM_control", server.url());
    let client = CommandClient::new(descriptor(&url), Arc::clone(&state), &ClientConfig::fast()).unwrap();
    let command = Command::new("SetZoom")
        .arg(42)
        .reports(keys::ZOOM_POSITION, EffectSource::Argument(0));

    client.invoke(&command).unwrap();

    mock.assert();
    assert_eq!(state.get().get_i64(keys::ZOOM_POSITION), Some(42));
}

#[test]
fn test_upnp_fault_over_http() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/Server0/CAM_control")
        .with_status(500)
        .with_body(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>701</errorCode></UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#,
        )
        .create();

    let url = format!("{}/Server0/CAM_control", server.url());
    let client = CommandClient::new(descriptor(&url), Arc::new(StateCache::new()), &ClientConfig::fast()).unwrap();

    assert!(matches!(
        client.invoke(&Command::new("Capture")),
        Err(CommandError::Device { code: 701 })
    ));
}
