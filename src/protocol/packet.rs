//! Packet codec for the 16-byte input datagram
//!
//! Every datagram carries one complete input sample, little-endian:
//!
//! ```text
//! offset  size  field
//!  0      2     buttons        u16 bit mask (see `protocol::buttons`)
//!  2      2     left_x         i16
//!  4      2     left_y         i16
//!  6      2     right_x        i16
//!  8      2     right_y        i16
//! 10      1     left_trigger   u8
//! 11      1     right_trigger  u8
//! 12      4     reserved       ignored
//! ```
//!
//! There is no checksum or sequence number. Any correctly sized buffer decodes.

use crate::protocol::buttons::{self, bits, Button};
use std::fmt;

/// Size of every valid datagram in bytes
pub const PACKET_SIZE: usize = 16;

/// Errors produced while decoding a datagram
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed packet: expected {PACKET_SIZE} bytes, got {0}")]
    MalformedLength(usize),
}

/// One decoded input snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InputSample {
    pub buttons: u16,
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

impl InputSample {
    /// Sample with every button released, sticks centered and triggers at rest
    pub const ZERO: InputSample = InputSample {
        buttons: 0,
        left_x: 0,
        left_y: 0,
        right_x: 0,
        right_y: 0,
        left_trigger: 0,
        right_trigger: 0,
    };

    /// Decodes one datagram payload
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedLength`] unless `bytes` is exactly
    /// [`PACKET_SIZE`] long.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: &[u8; PACKET_SIZE] = bytes
            .try_into()
            .map_err(|_| DecodeError::MalformedLength(bytes.len()))?;

        let [b0, b1, lx0, lx1, ly0, ly1, rx0, rx1, ry0, ry1, lt, rt, _, _, _, _] = *raw;

        Ok(Self {
            buttons: u16::from_le_bytes([b0, b1]),
            left_x: i16::from_le_bytes([lx0, lx1]),
            left_y: i16::from_le_bytes([ly0, ly1]),
            right_x: i16::from_le_bytes([rx0, rx1]),
            right_y: i16::from_le_bytes([ry0, ry1]),
            left_trigger: lt,
            right_trigger: rt,
        })
    }

    /// Encodes the sample the way the sender app does, reserved bytes zeroed
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];
        let fields = [
            self.buttons.to_le_bytes(),
            self.left_x.to_le_bytes(),
            self.left_y.to_le_bytes(),
            self.right_x.to_le_bytes(),
            self.right_y.to_le_bytes(),
            [self.left_trigger, self.right_trigger],
        ];
        for (chunk, field) in out.chunks_exact_mut(2).zip(fields) {
            chunk.copy_from_slice(&field);
        }
        out
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        button.is_set(self.buttons)
    }

    pub fn home_pressed(&self) -> bool {
        self.buttons & bits::HOME != 0
    }

    /// D-pad bits only
    pub fn dpad_mask(&self) -> u16 {
        self.buttons & bits::DPAD_MASK
    }

    pub fn hat(&self) -> HatPosition {
        HatPosition::from_buttons(self.buttons)
    }

    /// Multi-line text shown to the operator for the latest sample
    pub fn describe(&self) -> String {
        let names: Vec<&str> = buttons::DISPLAY_ORDER
            .iter()
            .filter(|button| self.is_pressed(**button))
            .map(|button| button.label())
            .collect();
        let names = if names.is_empty() {
            "None".to_string()
        } else {
            names.join(", ")
        };

        format!(
            "Buttons: {} (0x{:04x})\nLeft Stick: ({}, {})\nRight Stick: ({}, {})\nTriggers: Left={}, Right={}",
            names,
            self.buttons,
            self.left_x,
            self.left_y,
            self.right_x,
            self.right_y,
            self.left_trigger,
            self.right_trigger
        )
    }
}

impl TryFrom<&[u8]> for InputSample {
    type Error = DecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}

impl fmt::Display for InputSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buttons={:04x}, LX={}, LY={}, RX={}, RY={}, LT={}, RT={}",
            self.buttons,
            self.left_x,
            self.left_y,
            self.right_x,
            self.right_y,
            self.left_trigger,
            self.right_trigger
        )
    }
}

/// Hat switch position derived from the D-pad bits
///
/// Up wins over down and left wins over right when both are set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HatPosition {
    pub x: i8,
    pub y: i8,
}

impl HatPosition {
    pub fn from_buttons(mask: u16) -> Self {
        let y = if mask & bits::DPAD_UP != 0 {
            1
        } else if mask & bits::DPAD_DOWN != 0 {
            -1
        } else {
            0
        };
        let x = if mask & bits::DPAD_LEFT != 0 {
            -1
        } else if mask & bits::DPAD_RIGHT != 0 {
            1
        } else {
            0
        };
        Self { x, y }
    }
}

impl fmt::Display for HatPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_every_other_length() {
        for len in (0..PACKET_SIZE).chain([17, 20, 32, 512]) {
            let buf = vec![0xAB; len];
            assert_eq!(
                InputSample::decode(&buf),
                Err(DecodeError::MalformedLength(len))
            );
        }
    }

    #[test]
    fn dpad_right_scenario() {
        let buf = [
            0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let sample = InputSample::decode(&buf).unwrap();

        assert!(sample.is_pressed(Button::DPadRight));
        for button in Button::ALL.into_iter().filter(|b| *b != Button::DPadRight) {
            assert!(!sample.is_pressed(button), "{button} should be released");
        }
        assert_eq!((sample.left_x, sample.left_y), (0, 0));
        assert_eq!((sample.right_x, sample.right_y), (0, 0));
        assert_eq!((sample.left_trigger, sample.right_trigger), (0, 0));
    }

    #[test]
    fn decodes_little_endian_fields_and_ignores_reserved() {
        let buf = [
            0x40, 0x10, // buttons 0x1040
            0x00, 0x80, // left_x -32768
            0xFF, 0x7F, // left_y 32767
            0xFF, 0xFF, // right_x -1
            0x34, 0x12, // right_y 0x1234
            0x80, 0xFF, // triggers
            0xDE, 0xAD, 0xBE, 0xEF,
        ];
        let sample = InputSample::decode(&buf).unwrap();

        assert_eq!(sample.buttons, 0x1040);
        assert_eq!(sample.left_x, i16::MIN);
        assert_eq!(sample.left_y, i16::MAX);
        assert_eq!(sample.right_x, -1);
        assert_eq!(sample.right_y, 0x1234);
        assert_eq!(sample.left_trigger, 0x80);
        assert_eq!(sample.right_trigger, 0xFF);
        assert!(sample.home_pressed());
    }

    #[test]
    fn encoded_sample_decodes_to_same_fields() {
        let sample = InputSample {
            buttons: 0xF3C5,
            left_x: -12_000,
            left_y: 31_000,
            right_x: i16::MIN,
            right_y: i16::MAX,
            left_trigger: 7,
            right_trigger: 250,
        };
        let bytes = sample.encode();
        assert_eq!(&bytes[12..], &[0, 0, 0, 0]);
        assert_eq!(InputSample::decode(&bytes), Ok(sample));
    }

    #[test]
    fn describe_lists_buttons_in_display_order() {
        let sample = InputSample {
            buttons: bits::DPAD_RIGHT | bits::DPAD_UP | bits::HOME | bits::A,
            left_x: 10,
            left_y: -20,
            right_x: 0,
            right_y: 5,
            left_trigger: 1,
            right_trigger: 2,
        };
        assert_eq!(
            sample.describe(),
            "Buttons: UP, RIGHT, HOME, A (0x1043)\nLeft Stick: (10, -20)\nRight Stick: (0, 5)\nTriggers: Left=1, Right=2"
        );
        assert!(InputSample::ZERO.describe().starts_with("Buttons: None (0x0000)"));
    }

    #[test]
    fn hat_prefers_up_and_left() {
        let all = bits::DPAD_MASK;
        assert_eq!(HatPosition::from_buttons(all), HatPosition { x: -1, y: 1 });
        assert_eq!(
            HatPosition::from_buttons(bits::DPAD_DOWN | bits::DPAD_RIGHT),
            HatPosition { x: 1, y: -1 }
        );
        assert_eq!(HatPosition::from_buttons(bits::A), HatPosition::default());

        let sample = InputSample {
            buttons: bits::DPAD_DOWN | bits::B,
            ..InputSample::ZERO
        };
        assert_eq!(sample.dpad_mask(), bits::DPAD_DOWN);
        assert_eq!(sample.hat().to_string(), "(0,-1)");
    }
}
