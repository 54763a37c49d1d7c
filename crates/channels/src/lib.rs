//! Terminal channels for Parley.
//!
//! - **Line input**: reads user messages line by line (stdin by default)
//! - **Console speaker**: prints replies and, for voice sessions, holds
//!   for the simulated playback time

pub mod cli;
pub mod console;

pub use cli::LineInput;
pub use console::ConsoleSpeaker;
