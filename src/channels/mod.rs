//! Channel adapters feeding raw readings into the session.
//!
//! - `pull`: request/response fetches of the latest reading and of history
//! - `push`: socket.io connection delivering readings as they occur

mod pull;
mod push;

pub use pull::{HttpPullChannel, PullChannel};
pub use push::{PushChannel, READING_EVENTS};
