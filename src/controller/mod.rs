//! Controller side of the bridge
//!
//! - [`state`] - last applied sample and HOME edge tracking
//! - [`sink`] - interface to the virtual device driver
//! - [`virtual_pad`] - in-process Xbox 360 report sink
//!
//! ```text
//! InputSample ──► InputApplier ──► ControllerSink ──► host OS
//!                     │
//!               ControllerState
//! ```

pub mod sink;
pub mod state;
pub mod virtual_pad;

pub use sink::{ControllerSink, JoystickType, SinkError, TriggerType};
pub use state::{ControllerState, HomeEdge, HomeTransition};
pub use virtual_pad::{VirtualPad, XusbReport};
