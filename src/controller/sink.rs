//! Controller sink interface
//!
//! The bridge never talks to a virtual device driver directly. It issues
//! button and axis commands against a [`ControllerSink`], and the sink decides
//! how those reach the operating system. A sink stages every command and only
//! makes the new state visible on [`ControllerSink::commit`].

use crate::protocol::Button;
use serde::{Deserialize, Serialize};

/// Analog stick selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickType {
    Left,
    Right,
}

/// Analog trigger selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Left,
    Right,
}

/// Errors reported by a sink implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// A mutating call reached a sink that is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// The virtual device facility is missing or refused the device
    #[error("Virtual controller unavailable: {0}")]
    Unavailable(String),

    /// The device rejected an update
    #[error("Virtual controller error: {0}")]
    Device(String),
}

/// Destination for controller state changes
///
/// Press and release are expected to be idempotent. Calls are fast and never
/// block on I/O; the caller guarantees they are never issued concurrently.
pub trait ControllerSink: Send + 'static {
    /// Creates or plugs in the virtual device
    fn connect(&mut self) -> Result<(), SinkError>;

    /// Removes the virtual device. Callers zero the state first.
    fn disconnect(&mut self);

    fn press_button(&mut self, button: Button) -> Result<(), SinkError>;

    fn release_button(&mut self, button: Button) -> Result<(), SinkError>;

    fn set_axis(&mut self, stick: JoystickType, x: i16, y: i16) -> Result<(), SinkError>;

    fn set_trigger(&mut self, trigger: TriggerType, value: u8) -> Result<(), SinkError>;

    /// Publishes all staged changes at once
    fn commit(&mut self) -> Result<(), SinkError>;

    /// Name used in log output
    fn name(&self) -> String {
        "controller sink".to_string()
    }
}

impl<T: ControllerSink + ?Sized> ControllerSink for Box<T> {
    fn connect(&mut self) -> Result<(), SinkError> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn press_button(&mut self, button: Button) -> Result<(), SinkError> {
        (**self).press_button(button)
    }

    fn release_button(&mut self, button: Button) -> Result<(), SinkError> {
        (**self).release_button(button)
    }

    fn set_axis(&mut self, stick: JoystickType, x: i16, y: i16) -> Result<(), SinkError> {
        (**self).set_axis(stick, x, y)
    }

    fn set_trigger(&mut self, trigger: TriggerType, value: u8) -> Result<(), SinkError> {
        (**self).set_trigger(trigger, value)
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        (**self).commit()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
