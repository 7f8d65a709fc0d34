//! Session Management Module
//!
//! - [`InstanceRegistry`]: identifier-addressed registry of live sessions
//! - [`Session`]: one environment instance behind its own guard
//!
//! Sessions live until the process exits; there is no removal.

pub mod manager;
pub mod state;

pub use manager::{InstanceRegistry, DEFAULT_ID_LEN};
pub use state::{Session, SessionInfo, SessionInner};
