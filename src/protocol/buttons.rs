//! Button bit table for the input protocol
//!
//! Maps each bit of the 16-bit `buttons` field to a named controller button.
//! The table is fixed and total: bits outside of it (0x0080 today) are ignored
//! and never make a packet invalid.
//!
//! ```text
//!  bit     button            bit     button
//!  0x0001  DPadUp            0x0100  LeftShoulder
//!  0x0002  DPadRight         0x0200  RightShoulder
//!  0x0004  DPadDown          0x0400  LeftThumb
//!  0x0008  DPadLeft          0x0800  RightThumb
//!  0x0010  Start             0x1000  A
//!  0x0020  Back              0x2000  B
//!  0x0040  Guide (HOME)      0x4000  X
//!  0x0080  (unused)          0x8000  Y
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw protocol bit values
pub mod bits {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_RIGHT: u16 = 0x0002;
    pub const DPAD_DOWN: u16 = 0x0004;
    pub const DPAD_LEFT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const HOME: u16 = 0x0040;
    /// Defined by the protocol, carries no button
    pub const UNUSED: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const LEFT_THUMB: u16 = 0x0400;
    pub const RIGHT_THUMB: u16 = 0x0800;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;

    /// The four D-pad bits
    pub const DPAD_MASK: u16 = DPAD_UP | DPAD_RIGHT | DPAD_DOWN | DPAD_LEFT;
}

/// Named buttons of an Xbox 360 class controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    DPadUp,
    DPadRight,
    DPadDown,
    DPadLeft,
    Start,
    Back,
    Guide,
    LeftShoulder,
    RightShoulder,
    LeftThumb,
    RightThumb,
    A,
    B,
    X,
    Y,
}

/// How a button's state is reported to observers
///
/// Both policies drive the sink from the current level on every sample. Edge
/// logged buttons additionally produce a state change event when their level
/// differs from the previous sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportPolicy {
    Level,
    EdgeLogged,
}

/// Protocol bit to button, in bit order
pub const BUTTON_MAP: [(u16, Button); 15] = [
    (bits::DPAD_UP, Button::DPadUp),
    (bits::DPAD_RIGHT, Button::DPadRight),
    (bits::DPAD_DOWN, Button::DPadDown),
    (bits::DPAD_LEFT, Button::DPadLeft),
    (bits::START, Button::Start),
    (bits::BACK, Button::Back),
    (bits::HOME, Button::Guide),
    (bits::LEFT_SHOULDER, Button::LeftShoulder),
    (bits::RIGHT_SHOULDER, Button::RightShoulder),
    (bits::LEFT_THUMB, Button::LeftThumb),
    (bits::RIGHT_THUMB, Button::RightThumb),
    (bits::A, Button::A),
    (bits::B, Button::B),
    (bits::X, Button::X),
    (bits::Y, Button::Y),
];

/// Order in which pressed buttons are listed for the operator
pub const DISPLAY_ORDER: [Button; 15] = [
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Start,
    Button::Back,
    Button::Guide,
    Button::LeftShoulder,
    Button::RightShoulder,
    Button::LeftThumb,
    Button::RightThumb,
    Button::A,
    Button::B,
    Button::X,
    Button::Y,
];

impl Button {
    /// Every named button, in protocol bit order
    pub const ALL: [Button; 15] = [
        Button::DPadUp,
        Button::DPadRight,
        Button::DPadDown,
        Button::DPadLeft,
        Button::Start,
        Button::Back,
        Button::Guide,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::LeftThumb,
        Button::RightThumb,
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
    ];

    /// Protocol bit carrying this button
    pub fn bit(self) -> u16 {
        match self {
            Button::DPadUp => bits::DPAD_UP,
            Button::DPadRight => bits::DPAD_RIGHT,
            Button::DPadDown => bits::DPAD_DOWN,
            Button::DPadLeft => bits::DPAD_LEFT,
            Button::Start => bits::START,
            Button::Back => bits::BACK,
            Button::Guide => bits::HOME,
            Button::LeftShoulder => bits::LEFT_SHOULDER,
            Button::RightShoulder => bits::RIGHT_SHOULDER,
            Button::LeftThumb => bits::LEFT_THUMB,
            Button::RightThumb => bits::RIGHT_THUMB,
            Button::A => bits::A,
            Button::B => bits::B,
            Button::X => bits::X,
            Button::Y => bits::Y,
        }
    }

    /// Whether the bit for this button is set in `mask`
    pub fn is_set(self, mask: u16) -> bool {
        mask & self.bit() != 0
    }

    pub fn report_policy(self) -> ReportPolicy {
        match self {
            Button::Guide => ReportPolicy::EdgeLogged,
            _ => ReportPolicy::Level,
        }
    }

    /// Short label used in the operator display
    pub fn label(self) -> &'static str {
        match self {
            Button::DPadUp => "UP",
            Button::DPadRight => "RIGHT",
            Button::DPadDown => "DOWN",
            Button::DPadLeft => "LEFT",
            Button::Start => "START",
            Button::Back => "BACK",
            Button::Guide => "HOME",
            Button::LeftShoulder => "LB",
            Button::RightShoulder => "RB",
            Button::LeftThumb => "LS",
            Button::RightThumb => "RS",
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Buttons set in `mask`, in protocol bit order
pub fn pressed(mask: u16) -> impl Iterator<Item = Button> {
    BUTTON_MAP
        .into_iter()
        .filter(move |(bit, _)| mask & bit != 0)
        .map(|(_, button)| button)
}
