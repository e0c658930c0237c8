//! UDP receive loop.

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::frame::StreamFrame;
use crate::reassembly::{Reassembler, StreamStats};

/// Binds the live-view socket and runs the receive loop.
pub struct StreamReceiver;

impl StreamReceiver {
    /// Bind `config.bind_address` and start receiving.
    ///
    /// The socket is owned by a dedicated task. Completed frames are handed
    /// to the returned [`FrameSource`] without waiting; when its buffer is
    /// full, frames are dropped and counted.
    ///
    /// Transient receive errors (ICMP port unreachable, interrupted calls)
    /// are counted and retried after a growing pause. Any other socket error
    /// ends the source; [`FrameSource::failure`] reports it.
    pub async fn start(config: StreamConfig) -> Result<FrameSource> {
        config.validate()?;
        let socket = UdpSocket::bind(config.bind_address)
            .await
            .map_err(|source| StreamError::Bind {
                address: config.bind_address,
                source,
            })?;
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "live-view receiver listening");

        Self::start_with_reassembler(socket, Reassembler::new(&config), config)
    }

    /// Start on an already bound socket with a custom reassembler
    pub fn start_with_reassembler(
        socket: UdpSocket,
        reassembler: Reassembler,
        config: StreamConfig,
    ) -> Result<FrameSource> {
        let local_addr = socket.local_addr()?;
        let (frames_tx, frames_rx) = mpsc::channel(config.source_capacity);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let stats = Arc::new(Mutex::new(StreamStats::default()));
        let failure = Arc::new(Mutex::new(None));

        let receive_loop = ReceiveLoop {
            socket,
            reassembler,
            config,
            frames: frames_tx,
            stats: Arc::clone(&stats),
            failure: Arc::clone(&failure),
        };
        let task = tokio::spawn(receive_loop.run(cancel_rx));

        Ok(FrameSource {
            local_addr,
            frames: frames_rx,
            cancel_tx: Some(cancel_tx),
            task: Some(task),
            stats,
            failure,
        })
    }
}

/// Errors worth another `recv_from`: ICMP feedback from earlier sends,
/// interrupted calls and spurious wakeups
fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
    )
}

/// Pause between retries after consecutive transient errors
#[derive(Debug)]
struct Backoff {
    current: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_millis(1);
    const MAX: Duration = Duration::from_millis(250);

    fn new() -> Self {
        Self { current: Duration::ZERO }
    }

    fn next_delay(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            Self::INITIAL
        } else {
            (self.current * 2).min(Self::MAX)
        };
        self.current
    }

    fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}

enum Step {
    Frames(Vec<StreamFrame>),
    Retry(Duration),
    Fail(io::Error),
}

struct ReceiveLoop {
    socket: UdpSocket,
    reassembler: Reassembler,
    config: StreamConfig,
    frames: mpsc::Sender<StreamFrame>,
    stats: Arc<Mutex<StreamStats>>,
    failure: Arc<Mutex<Option<(io::ErrorKind, String)>>>,
}

impl ReceiveLoop {
    async fn run(mut self, mut cancel_rx: oneshot::Receiver<()>) {
        let mut buffer = vec![0u8; self.config.max_datagram_size];
        let period = (self.config.idle_timeout / 2).max(Duration::from_millis(1));
        let mut idle_check = tokio::time::interval(period);
        idle_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut backoff = Backoff::new();

        loop {
            let step = tokio::select! {
                _ = &mut cancel_rx => break,

                received = self.socket.recv_from(&mut buffer) => match received {
                    Ok((len, from)) if self.accepts(from) => {
                        backoff.reset();
                        let datagram = Bytes::copy_from_slice(&buffer[..len]);
                        Step::Frames(self.reassembler.push(datagram, Instant::now()))
                    }
                    Ok((_, from)) => {
                        backoff.reset();
                        trace!(%from, "ignoring datagram from unexpected sender");
                        self.reassembler.stats_mut().foreign += 1;
                        Step::Frames(Vec::new())
                    }
                    Err(e) if is_transient(e.kind()) => {
                        self.reassembler.stats_mut().receive_errors += 1;
                        let delay = backoff.next_delay();
                        debug!(error = %e, ?delay, "live-view receive error, retrying");
                        Step::Retry(delay)
                    }
                    Err(e) => Step::Fail(e),
                },

                _ = idle_check.tick() => Step::Frames(self.reassembler.expire(Instant::now())),
            };

            let frames = match step {
                Step::Frames(frames) => frames,
                Step::Retry(delay) => {
                    *self.stats.lock() = self.reassembler.stats();
                    tokio::select! {
                        _ = &mut cancel_rx => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
                Step::Fail(e) => {
                    warn!(error = %e, kind = ?e.kind(), "live-view socket failed, stopping receiver");
                    self.reassembler.stats_mut().receive_errors += 1;
                    *self.failure.lock() = Some((e.kind(), e.to_string()));
                    break;
                }
            };

            let open = self.deliver(frames);
            *self.stats.lock() = self.reassembler.stats();
            if !open {
                debug!("frame source dropped, stopping receiver");
                break;
            }
        }

        *self.stats.lock() = self.reassembler.stats();
        info!(stats = ?self.reassembler.stats(), "live-view receiver stopped");
    }

    fn accepts(&self, from: SocketAddr) -> bool {
        self.config
            .expected_sender
            .map_or(true, |expected| expected == from.ip())
    }

    /// Hand frames to the consumer; false once it is gone
    fn deliver(&mut self, frames: Vec<StreamFrame>) -> bool {
        for frame in frames {
            match self.frames.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(frame)) => {
                    trace!(sequence = ?frame.sequence, "frame source full, dropping frame");
                    self.reassembler.stats_mut().overflowed += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return false,
            }
        }
        true
    }
}

/// Frames produced by a [`StreamReceiver`].
///
/// Yields frames until cancelled or until the socket fails. Dropping the
/// source stops the receive loop and releases the socket.
pub struct FrameSource {
    local_addr: SocketAddr,
    frames: mpsc::Receiver<StreamFrame>,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    stats: Arc<Mutex<StreamStats>>,
    failure: Arc<Mutex<Option<(io::ErrorKind, String)>>>,
}

impl FrameSource {
    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next frame; `None` after cancellation
    pub async fn recv(&mut self) -> Option<StreamFrame> {
        self.frames.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamFrame> {
        self.frames.try_recv().ok()
    }

    /// Snapshot of the receive counters
    pub fn stats(&self) -> StreamStats {
        *self.stats.lock()
    }

    /// The socket error that ended the receive loop, if one did
    pub fn failure(&self) -> Option<StreamError> {
        self.failure.lock().as_ref().map(|(kind, message)| StreamError::Receive {
            kind: *kind,
            message: message.clone(),
        })
    }

    /// Stop the receive loop and wait until the socket is released
    pub async fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "live-view receiver task failed");
            }
        }
    }
}

impl Stream for FrameSource {
    type Item = StreamFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx)
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::icmp_unreachable(io::ErrorKind::ConnectionRefused, true)]
    #[case::icmp_reset(io::ErrorKind::ConnectionReset, true)]
    #[case::interrupted(io::ErrorKind::Interrupted, true)]
    #[case::spurious_wakeup(io::ErrorKind::WouldBlock, true)]
    #[case::closed_descriptor(io::ErrorKind::NotConnected, false)]
    #[case::permission(io::ErrorKind::PermissionDenied, false)]
    #[case::invalid(io::ErrorKind::InvalidInput, false)]
    #[case::other(io::ErrorKind::Other, false)]
    fn test_receive_error_classification(#[case] kind: io::ErrorKind, #[case] transient: bool) {
        assert_eq!(is_transient(kind), transient);
    }

    #[test]
    fn test_backoff_grows_to_cap_and_resets() {
        let mut backoff = Backoff::new();
        let delays: Vec<Duration> = (0..10).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Backoff::INITIAL);
        assert_eq!(delays[1], Duration::from_millis(2));
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*delays.last().unwrap(), Backoff::MAX);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Backoff::INITIAL);
    }

    #[tokio::test]
    async fn test_refused_datagrams_do_not_stop_the_receiver() {
        // Sending to a closed port from the receiving socket makes the
        // kernel report ConnectionRefused on the next recv_from
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap();
        drop(closed);
        socket.connect(closed_addr).await.unwrap();
        let _ = socket.send(b"ping").await;

        let config = StreamConfig::bind(socket.local_addr().unwrap());
        let reassembler = Reassembler::new(&config);
        let source = StreamReceiver::start_with_reassembler(socket, reassembler, config).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(source.failure().is_none());
        source.cancel().await;
    }
}
