//! Glue between the UDP session and the controller sink
//!
//! - [`dispatcher`] - task that applies samples and answers controller commands
//! - [`status`] - snapshot and event types handed to observers

pub mod dispatcher;
pub mod status;

pub use dispatcher::{DispatchCommand, DispatchError, Dispatcher, DispatcherHandle};
pub use status::{BridgeEvent, BridgeStatus, ClientStatus, ServerStatus};
