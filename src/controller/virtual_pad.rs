//! In-process Xbox 360 controller sink
//!
//! Keeps an XUSB style report the same way a ViGEm X360 target does: commands
//! edit a staged report and [`ControllerSink::commit`] publishes it through a
//! watch channel. Whatever binds the published report to a kernel-visible
//! device subscribes to that channel.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::sink::{ControllerSink, JoystickType, SinkError, TriggerType};
use crate::protocol::Button;

/// XUSB button bits as used by XInput
pub mod xusb {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const GUIDE: u16 = 0x0400;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

/// XUSB bit for a named button
pub fn xusb_bit(button: Button) -> u16 {
    match button {
        Button::DPadUp => xusb::DPAD_UP,
        Button::DPadRight => xusb::DPAD_RIGHT,
        Button::DPadDown => xusb::DPAD_DOWN,
        Button::DPadLeft => xusb::DPAD_LEFT,
        Button::Start => xusb::START,
        Button::Back => xusb::BACK,
        Button::Guide => xusb::GUIDE,
        Button::LeftShoulder => xusb::LEFT_SHOULDER,
        Button::RightShoulder => xusb::RIGHT_SHOULDER,
        Button::LeftThumb => xusb::LEFT_THUMB,
        Button::RightThumb => xusb::RIGHT_THUMB,
        Button::A => xusb::A,
        Button::B => xusb::B,
        Button::X => xusb::X,
        Button::Y => xusb::Y,
    }
}

/// Report of a virtual Xbox 360 controller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XusbReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl XusbReport {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & xusb_bit(button) != 0
    }
}

#[derive(Debug)]
pub struct VirtualPad {
    connected: bool,
    staged: XusbReport,
    published: watch::Sender<XusbReport>,
    commits: u64,
}

impl VirtualPad {
    pub fn new() -> Self {
        let (published, _) = watch::channel(XusbReport::default());
        Self {
            connected: false,
            staged: XusbReport::default(),
            published,
            commits: 0,
        }
    }

    /// Receiver for every committed report
    pub fn subscribe(&self) -> watch::Receiver<XusbReport> {
        self.published.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Report currently visible to the host
    pub fn report(&self) -> XusbReport {
        *self.published.borrow()
    }

    /// Number of commits since creation
    pub fn commits(&self) -> u64 {
        self.commits
    }

    fn ensure_connected(&self) -> Result<(), SinkError> {
        if self.connected {
            Ok(())
        } else {
            Err(SinkError::NotConnected)
        }
    }
}

impl Default for VirtualPad {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerSink for VirtualPad {
    fn connect(&mut self) -> Result<(), SinkError> {
        if self.connected {
            warn!("Virtual pad already connected");
            return Ok(());
        }
        self.staged = XusbReport::default();
        self.connected = true;
        info!("Virtual Xbox 360 pad plugged in");
        Ok(())
    }

    fn disconnect(&mut self) {
        if !self.connected {
            debug!("Virtual pad already unplugged");
            return;
        }
        self.connected = false;
        self.staged = XusbReport::default();
        self.published.send_replace(XusbReport::default());
        info!("Virtual Xbox 360 pad unplugged");
    }

    fn press_button(&mut self, button: Button) -> Result<(), SinkError> {
        self.ensure_connected()?;
        self.staged.buttons |= xusb_bit(button);
        Ok(())
    }

    fn release_button(&mut self, button: Button) -> Result<(), SinkError> {
        self.ensure_connected()?;
        self.staged.buttons &= !xusb_bit(button);
        Ok(())
    }

    fn set_axis(&mut self, stick: JoystickType, x: i16, y: i16) -> Result<(), SinkError> {
        self.ensure_connected()?;
        match stick {
            JoystickType::Left => {
                self.staged.thumb_lx = x;
                self.staged.thumb_ly = y;
            }
            JoystickType::Right => {
                self.staged.thumb_rx = x;
                self.staged.thumb_ry = y;
            }
        }
        Ok(())
    }

    fn set_trigger(&mut self, trigger: TriggerType, value: u8) -> Result<(), SinkError> {
        self.ensure_connected()?;
        match trigger {
            TriggerType::Left => self.staged.left_trigger = value,
            TriggerType::Right => self.staged.right_trigger = value,
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        self.ensure_connected()?;
        self.published.send_replace(self.staged);
        self.commits = self.commits.saturating_add(1);
        debug!("Committed report: {:?}", self.staged);
        Ok(())
    }

    fn name(&self) -> String {
        "virtual Xbox 360 pad".to_string()
    }
}
