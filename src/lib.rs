//! Bridge from a remote UDP input source to a virtual Xbox 360
//! controller.
//!
//! ```text
//! UDP socket ──► UdpSession ──► Dispatcher ──► InputApplier ──► ControllerSink
//!                (decode)          │
//!                                  └──► BridgeStatus / BridgeEvent
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod logging;
pub mod mapping;
pub mod network;
pub mod protocol;

pub use bridge::{Bridge, BridgeError};
pub use config::{BridgeConfig, ConfigError};
