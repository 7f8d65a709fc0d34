//! Monitor Module
//!
//! Per-session recording of episode statistics:
//! - [`state`]: the `Inactive`/`Recording` state machine and start options
//! - [`recorder`]: on-disk stats and manifest files

pub mod recorder;
pub mod state;

pub use recorder::{EpisodeStats, Manifest, StatsRecorder};
pub use state::{MonitorController, MonitorOptions, MonitorState};
