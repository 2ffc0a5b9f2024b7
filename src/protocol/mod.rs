//! Wire protocol of the remote input source
//!
//! The sender emits one fire-and-forget UDP datagram per input sample. This
//! module turns those datagrams into [`InputSample`] values and names the bits
//! of the button mask.
//!
//! 1. [`packet`] - 16-byte datagram codec
//! 2. [`buttons`] - button bit table and report policy

pub mod buttons;
pub mod packet;

pub use buttons::{Button, ReportPolicy, BUTTON_MAP};
pub use packet::{DecodeError, HatPosition, InputSample, PACKET_SIZE};
