//! Applies decoded samples to a controller sink
//!
//! Every cycle issues a full level update: all 15 buttons are pressed or
//! released from the current mask, both sticks and both triggers are set, and
//! the cycle ends with a single commit. The previous state is only consulted
//! to detect HOME transitions for observers.

use chrono::Local;
use tracing::{debug, info};

use crate::controller::{
    ControllerSink, ControllerState, HomeEdge, HomeTransition, JoystickType, SinkError,
    TriggerType,
};
use crate::protocol::buttons::pressed;
use crate::protocol::{Button, InputSample, ReportPolicy};

/// Outcome of one apply cycle
#[derive(Clone, Debug)]
pub struct Applied {
    pub state: ControllerState,
    pub home: Option<HomeTransition>,
}

/// Drives `sink` to the levels in `sample` and commits
///
/// # Errors
///
/// Returns the first [`SinkError`] raised by the sink. Nothing is committed in
/// that case and the caller keeps `previous`.
pub fn apply<S: ControllerSink + ?Sized>(
    sample: &InputSample,
    previous: &ControllerState,
    sink: &mut S,
) -> Result<Applied, SinkError> {
    for button in Button::ALL {
        if sample.is_pressed(button) {
            sink.press_button(button)?;
        } else {
            sink.release_button(button)?;
        }
    }

    sink.set_axis(JoystickType::Left, sample.left_x, sample.left_y)?;
    sink.set_axis(JoystickType::Right, sample.right_x, sample.right_y)?;
    sink.set_trigger(TriggerType::Left, sample.left_trigger)?;
    sink.set_trigger(TriggerType::Right, sample.right_trigger)?;
    sink.commit()?;

    let home = previous.home_edge(sample).map(|edge| {
        let transition = HomeTransition {
            edge,
            timestamp: Local::now(),
        };
        info!(
            "{} button {} at {}",
            Button::Guide,
            match edge {
                HomeEdge::Pressed => "pressed",
                HomeEdge::Released => "released",
            },
            transition.timestamp.format("%H:%M:%S.%3f")
        );
        transition
    });

    Ok(Applied {
        state: previous.advance(*sample),
        home,
    })
}

/// Releases every button, centers both sticks, rests both triggers, commits
///
/// # Errors
///
/// Returns the first [`SinkError`] raised by the sink.
pub fn reset_to_zero<S: ControllerSink + ?Sized>(sink: &mut S) -> Result<(), SinkError> {
    for button in Button::ALL {
        sink.release_button(button)?;
    }
    sink.set_axis(JoystickType::Left, 0, 0)?;
    sink.set_axis(JoystickType::Right, 0, 0)?;
    sink.set_trigger(TriggerType::Left, 0)?;
    sink.set_trigger(TriggerType::Right, 0)?;
    sink.commit()
}

/// Owner of the [`ControllerState`] between apply cycles
#[derive(Debug, Default)]
pub struct InputApplier {
    state: ControllerState,
    applied: u64,
}

impl InputApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Number of samples successfully committed
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Applies one sample and returns the HOME transition it caused, if any
    pub fn apply<S: ControllerSink + ?Sized>(
        &mut self,
        sample: &InputSample,
        sink: &mut S,
    ) -> Result<Option<HomeTransition>, SinkError> {
        let Applied { state, home } = apply(sample, &self.state, sink)?;
        self.state = state;
        self.applied = self.applied.saturating_add(1);

        for button in
            pressed(sample.buttons).filter(|b| b.report_policy() == ReportPolicy::Level)
        {
            debug!("{} is pressed in applied sample", button);
        }

        Ok(home)
    }

    /// Zeroes the sink and forgets the previous sample
    pub fn reset_to_zero<S: ControllerSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<(), SinkError> {
        debug!("Sending zero state to {}", sink.name());
        self.state = ControllerState::default();
        reset_to_zero(sink)
    }
}
