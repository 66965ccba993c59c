//! pausesync
//!
//! Records where and for how long a viewer pauses a media source, and replays
//! those pauses automatically on later playback.

pub mod config;
pub mod error;
pub mod logging;
pub mod pause;
pub mod player;
pub mod recorder;
pub mod session;
pub mod sync;
