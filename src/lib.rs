//! wipdbg: JavaScript debugger session runtime over the Webkit Inspector Protocol
//!
//! This library attaches to a browser tab, runs the protocol handshake, and
//! exposes scripts, breakpoints, stack frames and variable mirrors of the
//! suspended debuggee.

pub mod config;
pub mod error;

pub mod mirror;
pub mod model;
pub mod protocol;
pub mod session;
pub mod wip;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use protocol::profile::{BackendProfile, ProfileSelection};
pub use session::{DebugEvent, DebugSession, SessionState};

/// wipdbg library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
