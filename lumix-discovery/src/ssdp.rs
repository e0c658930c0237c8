//! SSDP (Simple Service Discovery Protocol) client
//!
//! Sends M-SEARCH requests to the UPnP multicast group and yields the parsed
//! unicast responses until a deadline passes. The request is repeated once per
//! resend interval, since a single multicast datagram is easily lost on Wi-Fi.

use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{DiscoveryError, Result};

const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";
const RESEND_INTERVAL: Duration = Duration::from_secs(1);

/// SSDP response headers relevant to camera discovery
#[derive(Debug, Clone, PartialEq)]
pub struct SsdpResponse {
    pub location: String,
    pub urn: String,
    pub usn: String,
    pub server: Option<String>,
}

/// SSDP client for device discovery
pub(crate) struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    pub fn new() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to bind UDP socket: {}", e)))?;

        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set multicast loop: {}", e)))?;

        Ok(Self { socket })
    }

    /// Send an M-SEARCH request and return an iterator over responses that
    /// arrive before `timeout` elapses
    pub fn search(self, search_target: &str, timeout: Duration) -> Result<SsdpResponseIterator> {
        let request = build_search_request(search_target);
        send_request(&self.socket, &request)?;
        debug!(search_target, timeout_ms = timeout.as_millis() as u64, "M-SEARCH sent");

        let now = Instant::now();
        Ok(SsdpResponseIterator {
            socket: self.socket,
            request,
            deadline: now + timeout,
            next_resend: now + RESEND_INTERVAL,
            buffer: [0; 2048],
            finished: false,
        })
    }
}

fn build_search_request(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 1\r\n\
         ST: {}\r\n\
         USER-AGENT: lumix-remote/0.1 UPnP/1.0\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, search_target
    )
}

fn send_request(socket: &UdpSocket, request: &str) -> Result<()> {
    socket
        .send_to(request.as_bytes(), SSDP_MULTICAST_ADDR)
        .map(|_| ())
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to send M-SEARCH: {}", e)))
}

/// Iterator for SSDP responses; owns the socket so it is released on drop
pub(crate) struct SsdpResponseIterator {
    socket: UdpSocket,
    request: String,
    deadline: Instant,
    next_resend: Instant,
    buffer: [u8; 2048],
    finished: bool,
}

impl Iterator for SsdpResponseIterator {
    type Item = Result<SsdpResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            let now = Instant::now();
            if now >= self.deadline {
                self.finished = true;
                return None;
            }

            if now >= self.next_resend {
                if let Err(e) = send_request(&self.socket, &self.request) {
                    self.finished = true;
                    return Some(Err(e));
                }
                trace!("M-SEARCH resent");
                self.next_resend = now + RESEND_INTERVAL;
            }

            let wait = self.deadline.min(self.next_resend).saturating_duration_since(now);
            // A zero read timeout is rejected by the socket
            let wait = wait.max(Duration::from_millis(1));
            if let Err(e) = self.socket.set_read_timeout(Some(wait)) {
                self.finished = true;
                return Some(Err(DiscoveryError::NetworkError(format!(
                    "Failed to set read timeout: {}",
                    e
                ))));
            }

            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, from)) => {
                    let Ok(text) = std::str::from_utf8(&self.buffer[..size]) else {
                        continue;
                    };
                    match parse_ssdp_response(text) {
                        Some(response) => {
                            trace!(%from, location = %response.location, "SSDP response");
                            return Some(Ok(response));
                        }
                        None => continue,
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(DiscoveryError::NetworkError(format!("Socket error: {}", e))));
                }
            }
        }
    }
}

/// Parse an SSDP response from HTTP text
pub(crate) fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut urn = None;
    let mut usn = None;
    let mut server = None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        } else if let Some(value) = extract_header_value(line, "ST:") {
            urn = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "SERVER:") {
            server = Some(value);
        }
    }

    match (location, urn, usn) {
        (Some(location), Some(urn), Some(usn)) => Some(SsdpResponse {
            location,
            urn,
            usn,
            server,
        }),
        _ => None,
    }
}

/// Extract header value from a line like "HEADER: value"
fn extract_header_value(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len() && line.is_char_boundary(header.len()) && line[..header.len()].eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}
