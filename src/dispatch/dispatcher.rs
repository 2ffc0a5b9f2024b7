//! Dispatcher task
//!
//! Owns the [`ControllerSink`] and the [`InputApplier`]. Session events and
//! controller commands arrive on two channels and are handled one at a time
//! on a single task, so sink calls are never interleaved.
//!
//! ```text
//! UdpSession ─[SessionEvent]──┐
//!                             ├─► Dispatcher ──► ControllerSink
//! Bridge ─[DispatchCommand]───┘        │
//!                                      ├─[watch]─► BridgeStatus
//!                                      └─[mpsc]──► BridgeEvent
//! ```
//!
//! Samples only reach observers through the status watch, which always holds
//! the latest one. The event channel is unbounded and carries nothing per
//! sample, so lifecycle and HOME notifications are never dropped.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::status::{BridgeEvent, BridgeStatus, ClientStatus, ServerStatus};
use crate::controller::{ControllerSink, SinkError};
use crate::mapping::InputApplier;
use crate::network::SessionEvent;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Controller error: {0}")]
    Sink(#[from] SinkError),

    #[error("Dispatcher is no longer running")]
    ChannelClosed,
}

type Response = oneshot::Sender<Result<(), DispatchError>>;

/// Requests answered by the dispatcher task
#[derive(Debug)]
pub enum DispatchCommand {
    ConnectController { response_tx: Response },
    DisconnectController { response_tx: Response },
    /// Disconnects the controller and ends the task
    Shutdown { response_tx: Response },
}

pub struct Dispatcher {
    applier: InputApplier,
    sink: Box<dyn ControllerSink>,
    controller_connected: bool,
    status: watch::Sender<BridgeStatus>,
    observers: mpsc::UnboundedSender<BridgeEvent>,
}

impl Dispatcher {
    pub fn new(
        sink: Box<dyn ControllerSink>,
        observers: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Self {
        let (status, _) = watch::channel(BridgeStatus::default());
        Self {
            applier: InputApplier::new(),
            sink,
            controller_connected: false,
            status,
            observers,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    pub fn controller_connected(&self) -> bool {
        self.controller_connected
    }

    pub fn applier(&self) -> &InputApplier {
        &self.applier
    }

    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Started(addr) => {
                self.status
                    .send_modify(|status| status.server = ServerStatus::Listening(addr));
                self.notify(BridgeEvent::ServerStarted(addr));
            }
            SessionEvent::ClientSeen(addr) => {
                self.status.send_modify(|status| {
                    status.client = Some(ClientStatus {
                        addr,
                        connected: true,
                    })
                });
                self.notify(BridgeEvent::ClientSeen(addr));
            }
            SessionEvent::Sample { sample, from } => {
                debug!("Dispatching sample from {}", from);
                if self.controller_connected {
                    match self.applier.apply(&sample, &mut self.sink) {
                        Ok(Some(transition)) => self.notify(BridgeEvent::HomeChanged(transition)),
                        Ok(None) => {}
                        Err(e) => {
                            error!("Error updating controller: {}", e);
                            self.notify(BridgeEvent::SinkFailed(e.to_string()));
                        }
                    }
                }
                self.status.send_modify(|status| {
                    status.last_sample = Some(sample);
                    status.home_pressed = sample.home_pressed();
                });
            }
            SessionEvent::ClientDisconnected(addr) => {
                self.status.send_modify(|status| {
                    status.client = Some(ClientStatus {
                        addr,
                        connected: false,
                    });
                    status.home_pressed = false;
                });
                self.notify(BridgeEvent::ClientDisconnected(addr));
            }
            SessionEvent::Stopped { error } => {
                self.status.send_modify(|status| {
                    status.server = ServerStatus::Stopped;
                    status.last_sample = None;
                    status.home_pressed = false;
                });
                self.notify(BridgeEvent::ServerStopped { error });
            }
        }
    }

    /// Connects the sink and sends it the zero state
    ///
    /// Connecting an already connected controller is a no-op.
    pub fn connect_controller(&mut self) -> Result<(), DispatchError> {
        if self.controller_connected {
            warn!("{} already connected", self.sink.name());
            return Ok(());
        }

        self.sink.connect()?;
        self.controller_connected = true;
        info!("Virtual controller {} connected", self.sink.name());

        if let Err(e) = self.applier.reset_to_zero(&mut self.sink) {
            error!("Failed to reset controller state: {}", e);
        }

        self.status
            .send_modify(|status| status.controller_connected = true);
        self.notify(BridgeEvent::ControllerConnected);
        Ok(())
    }

    /// Sends the zero state, then disconnects the sink
    ///
    /// The sink is disconnected even when the zero state cannot be delivered.
    pub fn disconnect_controller(&mut self) {
        if !self.controller_connected {
            debug!("Controller already disconnected");
            return;
        }

        if let Err(e) = self.applier.reset_to_zero(&mut self.sink) {
            error!("Failed to reset controller state: {}", e);
        }
        self.sink.disconnect();
        self.controller_connected = false;
        info!("Virtual controller {} disconnected", self.sink.name());

        self.status.send_modify(|status| {
            status.controller_connected = false;
            status.home_pressed = false;
        });
        self.notify(BridgeEvent::ControllerDisconnected);
    }

    fn notify(&self, event: BridgeEvent) {
        if let Err(e) = self.observers.send(event) {
            debug!("No observer left for {:?}", e.0);
        }
    }
}

/// Handle to a dispatcher running in a tokio task
#[derive(Debug)]
pub struct DispatcherHandle {
    commands: mpsc::Sender<DispatchCommand>,
    status: watch::Receiver<BridgeStatus>,
    task: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    pub fn spawn(mut dispatcher: Dispatcher, mut session_rx: mpsc::Receiver<SessionEvent>) -> Self {
        let (commands, mut command_rx) = mpsc::channel::<DispatchCommand>(16);
        let status = dispatcher.subscribe();

        let task = tokio::spawn(async move {
            debug!("Dispatcher running");
            loop {
                tokio::select! {
                    biased;

                    command = command_rx.recv() => match command {
                        Some(DispatchCommand::ConnectController { response_tx }) => {
                            let result = dispatcher.connect_controller();
                            if response_tx.send(result).is_err() {
                                error!("Failed to send response");
                            }
                        }
                        Some(DispatchCommand::DisconnectController { response_tx }) => {
                            dispatcher.disconnect_controller();
                            if response_tx.send(Ok(())).is_err() {
                                error!("Failed to send response");
                            }
                        }
                        Some(DispatchCommand::Shutdown { response_tx }) => {
                            // Deliver whatever the session reported before it stopped
                            while let Ok(event) = session_rx.try_recv() {
                                dispatcher.handle_session_event(event);
                            }
                            dispatcher.disconnect_controller();
                            if response_tx.send(Ok(())).is_err() {
                                error!("Failed to send response");
                            }
                            break;
                        }
                        None => {
                            dispatcher.disconnect_controller();
                            break;
                        }
                    },

                    Some(event) = session_rx.recv() => dispatcher.handle_session_event(event),
                }
            }
            info!(
                "Dispatcher stopped after {} applied samples",
                dispatcher.applier().applied()
            );
        });

        Self {
            commands,
            status,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.clone()
    }

    pub fn status(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    pub async fn connect_controller(&self) -> Result<(), DispatchError> {
        self.request(|response_tx| DispatchCommand::ConnectController { response_tx })
            .await
    }

    pub async fn disconnect_controller(&self) -> Result<(), DispatchError> {
        self.request(|response_tx| DispatchCommand::DisconnectController { response_tx })
            .await
    }

    /// Disconnects the controller and waits for the task to exit
    pub async fn shutdown(&mut self) -> Result<(), DispatchError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let result = self
            .request(|response_tx| DispatchCommand::Shutdown { response_tx })
            .await;
        if let Err(e) = task.await {
            error!("Dispatcher task panicked: {}", e);
            return Err(DispatchError::ChannelClosed);
        }
        result
    }

    async fn request(
        &self,
        command: impl FnOnce(Response) -> DispatchCommand,
    ) -> Result<(), DispatchError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.commands
            .send(command(response_tx))
            .await
            .map_err(|_| DispatchError::ChannelClosed)?;
        response_rx.await.map_err(|_| DispatchError::ChannelClosed)?
    }
}
