//! Operator-facing entry point
//!
//! [`Bridge`] wires a [`UdpSession`] to a [`DispatcherHandle`] and exposes the
//! operations a control panel needs: start and stop the server, plug and
//! unplug the controller, read the status.

use std::net::{IpAddr, SocketAddr};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::config::BridgeConfig;
use crate::controller::ControllerSink;
use crate::dispatch::{BridgeEvent, BridgeStatus, DispatchError, Dispatcher, DispatcherHandle};
use crate::network::{SessionError, SessionState, UdpSession};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug)]
pub struct Bridge {
    session: UdpSession,
    dispatcher: DispatcherHandle,
    bind_address: IpAddr,
}

impl Bridge {
    /// Spawns the dispatcher around `sink`
    ///
    /// Returns the receiver for [`BridgeEvent`]s. Must be called from within a
    /// tokio runtime.
    pub fn new(
        sink: Box<dyn ControllerSink>,
        config: &BridgeConfig,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (session_tx, session_rx) = mpsc::channel(config.event_buffer.max(1));
        let (observer_tx, observer_rx) = mpsc::unbounded_channel();

        let dispatcher = DispatcherHandle::spawn(Dispatcher::new(sink, observer_tx), session_rx);

        let bridge = Self {
            session: UdpSession::new(session_tx),
            dispatcher,
            bind_address: config.bind_address,
        };
        (bridge, observer_rx)
    }

    /// Starts listening on `port` of the configured bind address
    pub async fn start_server(&mut self, port: u16) -> Result<SocketAddr, BridgeError> {
        let addr = SocketAddr::new(self.bind_address, port);
        match self.session.start_on(addr).await {
            Ok(local) => Ok(local),
            Err(e) => {
                error!("Failed to start server: {}", e);
                Err(e.into())
            }
        }
    }

    pub async fn stop_server(&mut self) -> Result<(), BridgeError> {
        Ok(self.session.stop().await?)
    }

    pub async fn connect_controller(&self) -> Result<(), BridgeError> {
        Ok(self.dispatcher.connect_controller().await?)
    }

    pub async fn disconnect_controller(&self) -> Result<(), BridgeError> {
        Ok(self.dispatcher.disconnect_controller().await?)
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn status(&self) -> BridgeStatus {
        self.dispatcher.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.dispatcher.subscribe()
    }

    pub fn client_endpoint(&self) -> Option<SocketAddr> {
        self.session.client_endpoint()
    }

    /// Stops the server, then unplugs the controller
    pub async fn shutdown(&mut self) -> Result<(), BridgeError> {
        info!("Shutting down bridge");
        if let Err(e) = self.session.stop().await {
            error!("Server stopped with error: {}", e);
        }
        self.dispatcher.shutdown().await?;
        Ok(())
    }
}
