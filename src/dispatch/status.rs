//! Observer-facing view of the bridge
//!
//! A presentation layer reads [`BridgeStatus`] snapshots from a watch channel
//! and consumes [`BridgeEvent`]s for its log. The latest sample is only
//! part of the snapshot. Neither gives access to the session or the sink.

use std::net::SocketAddr;

use crate::controller::HomeTransition;
use crate::protocol::InputSample;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServerStatus {
    #[default]
    Stopped,
    Listening(SocketAddr),
}

/// Most recent remote endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientStatus {
    pub addr: SocketAddr,
    /// False once the session reported the client as disconnected
    pub connected: bool,
}

/// Snapshot of everything an operator display shows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeStatus {
    pub server: ServerStatus,
    pub client: Option<ClientStatus>,
    pub controller_connected: bool,
    pub home_pressed: bool,
    pub last_sample: Option<InputSample>,
}

impl BridgeStatus {
    pub fn server_label(&self) -> String {
        match self.server {
            ServerStatus::Stopped => "Status: Server stopped".to_string(),
            ServerStatus::Listening(addr) => {
                format!("Status: Server running on port {}", addr.port())
            }
        }
    }

    pub fn client_label(&self) -> String {
        match self.client {
            None => "Client: None".to_string(),
            Some(ClientStatus {
                addr,
                connected: true,
            }) => format!("Client: {addr}"),
            Some(ClientStatus {
                addr,
                connected: false,
            }) => format!("Client: {addr} (disconnected)"),
        }
    }

    pub fn controller_label(&self) -> &'static str {
        if self.controller_connected {
            "Virtual Controller: Connected"
        } else {
            "Virtual Controller: Disconnected"
        }
    }

    pub fn home_label(&self) -> &'static str {
        if self.home_pressed {
            "Home: Pressed"
        } else {
            "Home: Released"
        }
    }

    pub fn hat_label(&self) -> String {
        let hat = self
            .last_sample
            .map(|sample| sample.hat())
            .unwrap_or_default();
        format!("Hat: {}", hat)
    }

    pub fn dpad_label(&self) -> String {
        let mask = self.last_sample.map(|s| s.dpad_mask()).unwrap_or(0);
        format!("D-pad mask: 0x{:04x}", mask)
    }
}

/// Notification for log and UI consumers
#[derive(Clone, Debug)]
pub enum BridgeEvent {
    ServerStarted(SocketAddr),
    ServerStopped { error: Option<String> },
    ClientSeen(SocketAddr),
    ClientDisconnected(SocketAddr),
    ControllerConnected,
    ControllerDisconnected,
    HomeChanged(HomeTransition),
    SinkFailed(String),
}

impl BridgeEvent {
    /// Line for the operator log
    pub fn log_line(&self) -> String {
        match self {
            BridgeEvent::ServerStarted(addr) => format!("Server started on port {}", addr.port()),
            BridgeEvent::ServerStopped { error: None } => "Server stopped".to_string(),
            BridgeEvent::ServerStopped { error: Some(e) } => {
                format!("Server stopped after socket error: {e}")
            }
            BridgeEvent::ClientSeen(addr) => format!("Client {addr} connected"),
            BridgeEvent::ClientDisconnected(addr) => format!("Client {addr} disconnected"),
            BridgeEvent::ControllerConnected => "Virtual controller connected".to_string(),
            BridgeEvent::ControllerDisconnected => "Virtual controller disconnected".to_string(),
            BridgeEvent::HomeChanged(transition) => format!(
                "HOME button {} at {}",
                transition.edge,
                transition.timestamp.format("%H:%M:%S.%3f")
            ),
            BridgeEvent::SinkFailed(e) => format!("Error updating controller: {e}"),
        }
    }
}
