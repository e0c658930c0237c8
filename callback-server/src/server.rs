//! HTTP server for receiving UPnP event notifications.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use warp::Filter;

use crate::error::CallbackError;
use crate::router::{EventRouter, NotificationPayload, RouteOutcome};

/// Settings for the callback listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port range to try binding to, inclusive
    /// Default: (49153, 49200)
    pub port_range: (u16, u16),

    /// Path advertised in the CALLBACK header
    /// Default: "/Camera/event"
    pub callback_path: String,

    /// Address used to pick the local interface for the callback URL.
    /// The camera's own address is the best choice on an isolated camera
    /// network.
    /// Default: None (route towards a public address)
    pub route_hint: Option<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port_range: (49153, 49200),
            callback_path: "/Camera/event".to_string(),
            route_hint: None,
        }
    }
}

/// HTTP callback server for receiving UPnP event notifications.
///
/// The server accepts NOTIFY on any path, validates the GENA headers and
/// hands each notification to the [`EventRouter`]. Unknown methods and
/// malformed headers are rejected with an HTTP error status.
pub struct CallbackServer {
    port: u16,
    base_url: String,
    callback_path: String,
    event_router: Arc<EventRouter>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind an available port in the configured range and start serving.
    ///
    /// Resolves once the listener is accepting connections.
    pub async fn start(config: ServerConfig) -> Result<Self, CallbackError> {
        let (start, end) = config.port_range;
        let port = Self::find_available_port(start, end)
            .ok_or(CallbackError::NoAvailablePort { start, end })?;

        let local_ip =
            Self::detect_local_ip(config.route_hint).ok_or(CallbackError::LocalAddressUnavailable)?;

        let base_url = format!("http://{local_ip}:{port}");
        let event_router = Arc::new(EventRouter::new());

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let server_handle = Self::start_server(port, event_router.clone(), shutdown_rx, ready_tx);

        ready_rx.recv().await.ok_or(CallbackError::StartupFailed)?;

        let callback_path = if config.callback_path.starts_with('/') {
            config.callback_path
        } else {
            format!("/{}", config.callback_path)
        };

        Ok(Self {
            port,
            base_url,
            callback_path,
            event_router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Base URL of the listener, `http://<local_ip>:<port>`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL to advertise in the CALLBACK header of a SUBSCRIBE.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url, self.callback_path)
    }

    /// Port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Router used to register subscription IDs.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.event_router
    }

    /// Whether the HTTP task is still running.
    pub fn is_running(&self) -> bool {
        self.server_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop accepting requests and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) -> Result<(), CallbackError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    fn find_available_port(start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(port))
    }

    fn is_port_available(port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    }

    /// Determine the local address used to reach `hint`.
    ///
    /// A connected UDP socket reveals the outbound interface; nothing is sent.
    fn detect_local_ip(hint: Option<IpAddr>) -> Option<IpAddr> {
        let target = match hint {
            Some(ip) => SocketAddr::new(ip, 80),
            None => SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80),
        };
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(target).ok()?;
        Some(socket.local_addr().ok()?.ip())
    }

    fn start_server(
        port: u16,
        event_router: Arc<EventRouter>,
        mut shutdown_rx: mpsc::Receiver<()>,
        ready_tx: mpsc::Sender<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let notify_route = warp::method()
                .and(warp::path::full())
                .and(warp::addr::remote())
                .and(warp::header::optional::<String>("sid"))
                .and(warp::header::optional::<String>("nt"))
                .and(warp::header::optional::<String>("nts"))
                .and(warp::header::optional::<String>("seq"))
                .and(warp::body::bytes())
                .and_then({
                    let router = event_router.clone();
                    move |method: warp::http::Method,
                          path: warp::path::FullPath,
                          remote: Option<SocketAddr>,
                          sid: Option<String>,
                          nt: Option<String>,
                          nts: Option<String>,
                          seq: Option<String>,
                          body: bytes::Bytes| {
                        let router = router.clone();
                        async move {
                            if method.as_str() != "NOTIFY" {
                                return Err(warp::reject::not_found());
                            }

                            debug!(
                                path = path.as_str(),
                                remote = ?remote,
                                sid = ?sid,
                                seq = ?seq,
                                bytes = body.len(),
                                "incoming NOTIFY"
                            );

                            let subscription_id = match Self::validate_upnp_headers(sid, &nt, &nts) {
                                Some(sid) => sid,
                                None => {
                                    warn!(remote = ?remote, "rejecting NOTIFY with invalid UPnP headers");
                                    return Err(warp::reject::custom(InvalidUpnpHeaders));
                                }
                            };

                            let payload = NotificationPayload {
                                subscription_id,
                                seq: seq.and_then(|s| s.trim().parse::<u32>().ok()),
                                remote,
                                event_xml: String::from_utf8_lossy(&body).into_owned(),
                            };

                            match router.route(payload).await {
                                RouteOutcome::Delivered | RouteOutcome::Held => Ok(
                                    warp::reply::with_status("", warp::http::StatusCode::OK),
                                ),
                                RouteOutcome::Dropped => Err(warp::reject::custom(UnknownSubscription)),
                            }
                        }
                    }
                });

            let routes = notify_route.recover(handle_rejection);

            let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    shutdown_rx.recv().await;
                },
            );

            info!(%addr, "callback server listening");
            let _ = ready_tx.send(()).await;
            server.await;
            event_router.close_all().await;
            debug!(%addr, "callback server stopped");
        })
    }

    /// Validate GENA event headers and return the subscription ID.
    ///
    /// SID is required. NT and NTS must be `upnp:event` / `upnp:propchange`
    /// when present.
    fn validate_upnp_headers(
        sid: Option<String>,
        nt: &Option<String>,
        nts: &Option<String>,
    ) -> Option<String> {
        if nt.as_deref().is_some_and(|v| v != "upnp:event") {
            return None;
        }
        if nts.as_deref().is_some_and(|v| v != "upnp:propchange") {
            return None;
        }
        sid.filter(|s| !s.trim().is_empty())
    }
}

/// Custom rejection for invalid UPnP headers.
#[derive(Debug)]
struct InvalidUpnpHeaders;

impl warp::reject::Reject for InvalidUpnpHeaders {}

/// The SID belonged to a subscription that has since been dropped.
#[derive(Debug)]
struct UnknownSubscription;

impl warp::reject::Reject for UnknownSubscription {}

async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<InvalidUpnpHeaders>().is_some() {
        (warp::http::StatusCode::BAD_REQUEST, "Invalid UPnP headers")
    } else if err.find::<UnknownSubscription>().is_some() {
        // GENA: unknown SID answers 412 so the device drops the subscription
        (warp::http::StatusCode::PRECONDITION_FAILED, "Unknown subscription")
    } else {
        (warp::http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(message, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_upnp_headers() {
        let sid = || Some("uuid:sub-1".to_string());
        let nt = Some("upnp:event".to_string());
        let nts = Some("upnp:propchange".to_string());

        assert_eq!(
            CallbackServer::validate_upnp_headers(sid(), &nt, &nts),
            Some("uuid:sub-1".to_string())
        );
        assert_eq!(
            CallbackServer::validate_upnp_headers(sid(), &None, &None),
            Some("uuid:sub-1".to_string())
        );
        assert!(CallbackServer::validate_upnp_headers(None, &nt, &nts).is_none());
        assert!(CallbackServer::validate_upnp_headers(
            sid(),
            &Some("upnp:other".to_string()),
            &nts
        )
        .is_none());
        assert!(CallbackServer::validate_upnp_headers(
            sid(),
            &nt,
            &Some("ssdp:alive".to_string())
        )
        .is_none());
        assert!(CallbackServer::validate_upnp_headers(Some("  ".to_string()), &nt, &nts).is_none());
    }

    #[test]
    fn test_find_available_port_in_range() {
        let port = CallbackServer::find_available_port(52100, 52150);
        assert!(port.is_some_and(|p| (52100..=52150).contains(&p)));
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port_range, (49153, 49200));
        assert_eq!(config.callback_path, "/Camera/event");
        assert!(config.route_hint.is_none());
    }
}
