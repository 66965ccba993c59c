//! Pause events and the ordered pause map

mod event;
mod store;

pub use event::*;
pub use store::*;
