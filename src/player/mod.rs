//! Media player backends

mod backend;
mod simulated;

pub use backend::*;
pub use simulated::SimulatedPlayer;
