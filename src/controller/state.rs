use chrono::{DateTime, Local};
use std::fmt;

use crate::protocol::{Button, InputSample, ReportPolicy};

/// Direction of a HOME level change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HomeEdge {
    Pressed,
    Released,
}

impl fmt::Display for HomeEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HomeEdge::Pressed => write!(f, "Pressed"),
            HomeEdge::Released => write!(f, "Released"),
        }
    }
}

/// HOME state change observed between two consecutive samples
#[derive(Clone, Debug)]
pub struct HomeTransition {
    pub edge: HomeEdge,
    pub timestamp: DateTime<Local>,
}

/// Last applied sample plus the HOME edge tracker
///
/// Only used to detect HOME transitions for observers. Button commands are
/// always derived from the current sample alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    last: Option<InputSample>,
    home_pressed: bool,
}

impl ControllerState {
    /// State before any sample was applied
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&InputSample> {
        self.last.as_ref()
    }

    pub fn home_pressed(&self) -> bool {
        self.home_pressed
    }

    /// Edge produced by moving from this state to `sample`, if any
    pub fn home_edge(&self, sample: &InputSample) -> Option<HomeEdge> {
        match (self.home_pressed, edge_logged_pressed(sample)) {
            (false, true) => Some(HomeEdge::Pressed),
            (true, false) => Some(HomeEdge::Released),
            _ => None,
        }
    }

    /// State after `sample` has been applied
    pub fn advance(&self, sample: InputSample) -> Self {
        Self {
            last: Some(sample),
            home_pressed: edge_logged_pressed(&sample),
        }
    }
}

/// Level of the buttons whose changes are reported as edges
fn edge_logged_pressed(sample: &InputSample) -> bool {
    Button::ALL
        .into_iter()
        .filter(|button| button.report_policy() == ReportPolicy::EdgeLogged)
        .any(|button| sample.is_pressed(button))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::buttons::bits;

    fn with_buttons(buttons: u16) -> InputSample {
        InputSample {
            buttons,
            ..InputSample::ZERO
        }
    }

    #[test]
    fn starts_empty_and_released() {
        let state = ControllerState::new();
        assert!(state.last().is_none());
        assert!(!state.home_pressed());
    }

    #[test]
    fn edge_only_on_level_change() {
        let released = ControllerState::new();
        assert_eq!(released.home_edge(&with_buttons(bits::A)), None);
        assert_eq!(
            released.home_edge(&with_buttons(bits::HOME)),
            Some(HomeEdge::Pressed)
        );

        let held = released.advance(with_buttons(bits::HOME | bits::B));
        assert!(held.home_pressed());
        assert_eq!(held.home_edge(&with_buttons(bits::HOME)), None);
        assert_eq!(held.home_edge(&with_buttons(0)), Some(HomeEdge::Released));
        assert_eq!(held.last(), Some(&with_buttons(bits::HOME | bits::B)));
    }

    #[test]
    fn only_edge_logged_buttons_produce_edges() {
        for button in Button::ALL {
            let edge = ControllerState::new().home_edge(&with_buttons(button.bit()));
            let expected = match button.report_policy() {
                ReportPolicy::EdgeLogged => Some(HomeEdge::Pressed),
                ReportPolicy::Level => None,
            };
            assert_eq!(edge, expected, "{button}");
        }
    }
}
