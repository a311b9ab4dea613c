//! Shared types for the Tapedeck recording timeline.

mod action;
mod recording;
mod screenshot;
mod stats;
mod window;

pub use action::*;
pub use recording::*;
pub use screenshot::*;
pub use stats::*;
pub use window::*;
