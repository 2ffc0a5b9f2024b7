//! Translation of decoded input samples into controller sink commands.

pub mod applier;

pub use applier::{apply, reset_to_zero, Applied, InputApplier};
