//! UDP session owning the socket and the receive loop
//!
//! The session has two observable states, `Stopped` and `Listening`. While
//! listening, a tokio task owns the bound socket and runs the receive loop,
//! itself a small state machine:
//!
//! ```text
//! Bound ──► Receiving ──► Closed(ExitReason)
//!               │
//!               ├─ stop()              → Stopped
//!               ├─ receive error       → SocketError
//!               └─ dispatcher dropped  → DispatcherGone
//! ```
//!
//! Whatever the reason, a closed loop reports the last seen client as
//! disconnected (if there ever was one) and then drops the socket.

use statum::{machine, state};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::protocol::InputSample;

/// Port the sender app targets unless configured otherwise
pub const DEFAULT_PORT: u16 = 9999;

/// Largest UDP payload, so no datagram is ever truncated or refused by the OS
const RECV_BUFFER_SIZE: usize = 65_536;

/// Notifications emitted by the receive loop, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Socket bound, receive loop about to run
    Started(SocketAddr),

    /// First valid datagram from a new endpoint
    ClientSeen(SocketAddr),

    Sample {
        sample: InputSample,
        from: SocketAddr,
    },

    /// Loop exited after a client had been observed
    ClientDisconnected(SocketAddr),

    /// Loop exited; `error` is set when a socket error ended it
    Stopped { error: Option<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to bind UDP port {port}: {source}")]
    BindError {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Socket error: {0}")]
    SocketError(#[from] io::Error),

    #[error("Session already listening on {0}")]
    AlreadyListening(SocketAddr),

    #[error("Receive task failed: {0}")]
    TaskError(String),
}

/// Lifecycle of a [`UdpSession`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Listening(SocketAddr),
}

/// Why the receive loop ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Stopped,
    SocketError { kind: io::ErrorKind, message: String },
    DispatcherGone,
}

impl From<&io::Error> for ExitReason {
    fn from(e: &io::Error) -> Self {
        ExitReason::SocketError {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Bound,
    Receiving,
    Closed(ExitReason),
}

#[machine]
#[derive(Debug)]
pub struct ReceiveLoop<S: LoopState> {
    socket: UdpSocket,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,

    // Written only by the loop, read as a snapshot elsewhere
    client: watch::Sender<Option<SocketAddr>>,

    received: u64,
    malformed: u64,
}

impl<S: LoopState> ReceiveLoop<S> {
    pub fn client(&self) -> Option<SocketAddr> {
        *self.client.borrow()
    }
}

impl ReceiveLoop<Bound> {
    pub fn create(
        socket: UdpSocket,
        events: mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
        client: watch::Sender<Option<SocketAddr>>,
    ) -> Self {
        Self::new(socket, events, cancel, client, 0, 0)
    }

    pub fn start(self) -> ReceiveLoop<Receiving> {
        debug!("Receive loop entering Receiving state");
        self.transition()
    }
}

impl ReceiveLoop<Receiving> {
    /// Receives until cancelled, a receive error occurs, or the dispatcher is gone
    pub async fn run_until_stopped(mut self) -> ReceiveLoop<Closed> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        let reason = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Stop requested, leaving receive loop");
                    break ExitReason::Stopped;
                }

                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => {
                        let Some(bytes) = buf.get(..len) else {
                            continue;
                        };
                        if let Err(reason) = self.handle_datagram(bytes, from).await {
                            break reason;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving data: {}", e);
                        break ExitReason::from(&e);
                    }
                }
            }
        };

        self.close(reason)
    }

    /// Leaves the receive loop for `reason`
    pub fn close(self, reason: ExitReason) -> ReceiveLoop<Closed> {
        info!(
            "Receive loop closed ({:?}): {} datagrams, {} malformed",
            reason, self.received, self.malformed
        );
        self.transition_with(reason)
    }

    async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) -> Result<(), ExitReason> {
        self.received = self.received.saturating_add(1);
        debug!("Received packet of size {} bytes from {}", bytes.len(), from);

        let sample = match InputSample::decode(bytes) {
            Ok(sample) => sample,
            Err(e) => {
                self.malformed = self.malformed.saturating_add(1);
                warn!("Dropping datagram from {}: {}", from, e);
                return Ok(());
            }
        };
        debug!("Parsed packet: {}", sample);

        let new_client = *self.client.borrow() != Some(from);
        if new_client {
            info!("Client {} connected", from);
            self.client.send_replace(Some(from));
            self.emit(SessionEvent::ClientSeen(from)).await?;
        }

        self.emit(SessionEvent::Sample { sample, from }).await
    }

    async fn emit(&self, event: SessionEvent) -> Result<(), ExitReason> {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(ExitReason::Stopped),
            sent = self.events.send(event) => sent.map_err(|e| {
                warn!("Dispatcher dropped, discarding {:?}", e.0);
                ExitReason::DispatcherGone
            }),
        }
    }
}

impl ReceiveLoop<Closed> {
    /// Emits the closing notifications and releases the socket
    pub async fn finish(self) -> ExitReason {
        let reason = self
            .get_state_data()
            .cloned()
            .unwrap_or(ExitReason::Stopped);

        if let Some(addr) = self.client() {
            info!("Client {} disconnected", addr);
            if self
                .events
                .send(SessionEvent::ClientDisconnected(addr))
                .await
                .is_err()
            {
                debug!("No dispatcher left for disconnect of {}", addr);
            }
        }

        let error = match &reason {
            ExitReason::SocketError { message, .. } => Some(message.clone()),
            _ => None,
        };
        if self
            .events
            .send(SessionEvent::Stopped { error })
            .await
            .is_err()
        {
            debug!("No dispatcher left for stop notification");
        }

        reason
    }
}

/// Running receive task and the handles to stop and observe it
#[derive(Debug)]
struct ActiveSession {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<ExitReason>,
}

/// UDP listener for remote input samples
///
/// `start` binds and spawns the receive task, `stop` cancels it and waits for
/// it to exit. Both are safe to call in any state.
#[derive(Debug)]
pub struct UdpSession {
    events: mpsc::Sender<SessionEvent>,
    active: Option<ActiveSession>,
    client: watch::Receiver<Option<SocketAddr>>,
}

impl UdpSession {
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        let (_, client) = watch::channel(None);
        Self {
            events,
            active: None,
            client,
        }
    }

    /// Binds `port` on all interfaces and starts receiving
    ///
    /// # Errors
    ///
    /// [`SessionError::BindError`] if the port cannot be bound, in which case
    /// the session stays stopped.
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr, SessionError> {
        self.start_on(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
            .await
    }

    /// Like [`UdpSession::start`] with an explicit bind address
    pub async fn start_on(&mut self, addr: SocketAddr) -> Result<SocketAddr, SessionError> {
        if let Some(active) = &self.active {
            if !active.task.is_finished() {
                return Err(SessionError::AlreadyListening(active.local_addr));
            }
            // Loop died on its own; collect it before rebinding
            if let Err(e) = self.stop().await {
                warn!("Previous session ended with error: {}", e);
            }
        }

        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| SessionError::BindError {
                port: addr.port(),
                source,
            })?;
        let local_addr = socket.local_addr()?;

        let cancel = CancellationToken::new();
        let (client_tx, client_rx) = watch::channel(None);
        self.client = client_rx;

        let receive_loop =
            ReceiveLoop::create(socket, self.events.clone(), cancel.clone(), client_tx);

        if self
            .events
            .send(SessionEvent::Started(local_addr))
            .await
            .is_err()
        {
            debug!("No dispatcher attached to session on {}", local_addr);
        }

        let task = tokio::spawn(async move {
            let closed = receive_loop.start().run_until_stopped().await;
            closed.finish().await
        });

        info!("Server started on {}", local_addr);
        self.active = Some(ActiveSession {
            local_addr,
            cancel,
            task,
        });
        Ok(local_addr)
    }

    /// Stops the receive loop and waits for it to exit
    ///
    /// # Errors
    ///
    /// [`SessionError::SocketError`] if the loop had already ended on a
    /// receive error, [`SessionError::TaskError`] if the task panicked.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        let Some(active) = self.active.take() else {
            debug!("Stop requested on stopped session");
            return Ok(());
        };

        active.cancel.cancel();
        let result = match active.task.await {
            Ok(ExitReason::SocketError { kind, message }) => {
                Err(SessionError::SocketError(io::Error::new(kind, message)))
            }
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Receive task panicked: {}", e);
                Err(SessionError::TaskError(e.to_string()))
            }
        };

        info!("Server on {} stopped", active.local_addr);
        result
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            Some(active) if !active.task.is_finished() => SessionState::Listening(active.local_addr),
            _ => SessionState::Stopped,
        }
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state(), SessionState::Listening(_))
    }

    /// Last client endpoint seen by the current or most recent loop
    pub fn client_endpoint(&self) -> Option<SocketAddr> {
        *self.client.borrow()
    }
}

impl Drop for UdpSession {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session channel closed")
    }

    async fn start_loopback(
        events: mpsc::Sender<SessionEvent>,
    ) -> (UdpSession, SocketAddr, UdpSocket) {
        let mut session = UdpSession::new(events);
        let addr = session
            .start_on("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        (session, addr, sender)
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = UdpSession::new(tx);
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forwards_valid_samples_and_tracks_client() {
        let (tx, mut rx) = mpsc::channel(8);
        let (mut session, addr, sender) = start_loopback(tx).await;
        assert_eq!(session.state(), SessionState::Listening(addr));
        assert_eq!(next_event(&mut rx).await, SessionEvent::Started(addr));

        let sample = InputSample {
            buttons: 0x0002,
            left_x: -300,
            ..InputSample::ZERO
        };
        sender.send_to(&sample.encode(), addr).await.unwrap();
        let from = sender.local_addr().unwrap();

        assert_eq!(next_event(&mut rx).await, SessionEvent::ClientSeen(from));
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::Sample { sample, from }
        );
        assert_eq!(session.client_endpoint(), Some(from));

        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn malformed_datagram_keeps_listening() {
        let (tx, mut rx) = mpsc::channel(8);
        let (mut session, addr, sender) = start_loopback(tx).await;
        assert_eq!(next_event(&mut rx).await, SessionEvent::Started(addr));

        sender.send_to(&[0u8; 10], addr).await.unwrap();
        sender.send_to(&[0u8; 40], addr).await.unwrap();
        sender.send_to(&[0xAB; 600], addr).await.unwrap();
        sender.send_to(&vec![0xCD; 4096], addr).await.unwrap();
        sender.send_to(&InputSample::ZERO.encode(), addr).await.unwrap();

        let from = sender.local_addr().unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::ClientSeen(from));
        assert!(matches!(
            next_event(&mut rx).await,
            SessionEvent::Sample { sample, .. } if sample == InputSample::ZERO
        ));
        assert!(session.is_listening());

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_reports_disconnect_once() {
        let (tx, mut rx) = mpsc::channel(16);
        let (mut session, addr, sender) = start_loopback(tx).await;
        let from = sender.local_addr().unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::Started(addr));

        for _ in 0..3 {
            sender.send_to(&InputSample::ZERO.encode(), addr).await.unwrap();
        }
        assert_eq!(next_event(&mut rx).await, SessionEvent::ClientSeen(from));
        for _ in 0..3 {
            assert!(matches!(next_event(&mut rx).await, SessionEvent::Sample { .. }));
        }

        session.stop().await.unwrap();
        session.stop().await.unwrap();

        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::ClientDisconnected(from)
        );
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::Stopped { error: None }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_without_client_sends_no_disconnect() {
        let (tx, mut rx) = mpsc::channel(8);
        let (mut session, addr, _sender) = start_loopback(tx).await;
        session.stop().await.unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::Started(addr));
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::Stopped { error: None }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn bind_conflict_leaves_session_stopped() {
        let (tx, _rx) = mpsc::channel(8);
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let mut session = UdpSession::new(tx);
        let err = session.start_on(addr).await.unwrap_err();
        assert!(matches!(err, SessionError::BindError { port, .. } if port == addr.port()));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn second_start_while_listening_is_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        let (mut session, addr, _sender) = start_loopback(tx).await;
        let err = session
            .start_on("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyListening(a) if a == addr));
        session.stop().await.unwrap();

        // restart after stop is allowed
        session
            .start_on("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn socket_error_exit_reports_disconnect_and_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client: SocketAddr = "127.0.0.1:40404".parse().unwrap();
        let (client_tx, _client_rx) = watch::channel(Some(client));

        let reason = ExitReason::SocketError {
            kind: io::ErrorKind::ConnectionReset,
            message: "connection reset by peer".to_string(),
        };
        let closed = ReceiveLoop::create(socket, tx, CancellationToken::new(), client_tx)
            .start()
            .close(reason.clone());

        assert_eq!(closed.finish().await, reason);
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::ClientDisconnected(client)
        );
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::Stopped {
                error: Some("connection reset by peer".to_string())
            }
        );
        assert!(rx.try_recv().is_err());
    }

    /// Installs a receive task that has already died on a socket error
    async fn install_failed_loop(session: &mut UdpSession) {
        let task = tokio::spawn(async {
            ExitReason::SocketError {
                kind: io::ErrorKind::ConnectionReset,
                message: "connection reset by peer".to_string(),
            }
        });
        timeout(Duration::from_secs(2), async {
            while !task.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("failed task never finished");

        session.active = Some(ActiveSession {
            local_addr: "127.0.0.1:9".parse().unwrap(),
            cancel: CancellationToken::new(),
            task,
        });
    }

    #[tokio::test]
    async fn dead_loop_reads_as_stopped_and_stop_returns_the_error() {
        let (tx, _rx) = mpsc::channel(8);
        let mut session = UdpSession::new(tx);
        install_failed_loop(&mut session).await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.is_listening());

        let err = session.stop().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::SocketError(ref e) if e.kind() == io::ErrorKind::ConnectionReset
        ));
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_after_dead_loop_reaps_it() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = UdpSession::new(tx);
        install_failed_loop(&mut session).await;

        let addr = session
            .start_on("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Listening(addr));
        assert_eq!(next_event(&mut rx).await, SessionEvent::Started(addr));

        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
    }
}
