//! Monitor state machine.
//!
//! ```text
//! Inactive --start(directory, force, resume)--> Recording --close()--> Inactive
//! ```
//!
//! Starting while recording and closing while inactive are both rejected
//! with [`GymError::Conflict`].

use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::envs::EnvHandle;
use crate::error::{GymError, GymResult};

/// Recording state of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MonitorState {
    Inactive,
    Recording { directory: PathBuf },
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::Inactive
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Recording { directory } => write!(f, "recording to {}", directory.display()),
        }
    }
}

/// Policy for pre-existing recording files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorOptions {
    /// Delete existing `openaigym.*` files in the directory
    #[serde(default)]
    pub force: bool,
    /// Keep existing files and add to them
    #[serde(default)]
    pub resume: bool,
}

impl MonitorOptions {
    /// `force` and `resume` are alternative policies; asking for both is an error.
    pub fn validate(&self) -> GymResult<()> {
        if self.force && self.resume {
            return Err(GymError::InvalidArgument(
                "force and resume are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Drives the recording state machine for one session.
///
/// Callers must hold the session guard; the recording itself is delegated
/// to the environment handle.
#[derive(Debug, Default)]
pub struct MonitorController {
    state: MonitorState,
}

impl MonitorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, MonitorState::Recording { .. })
    }

    /// `Inactive -> Recording`
    pub fn start(&mut self, env: &mut EnvHandle, directory: &str, options: MonitorOptions) -> GymResult<()> {
        if let MonitorState::Recording { directory: current } = &self.state {
            return Err(GymError::Conflict(format!(
                "Monitor is already recording to {}; close it first",
                current.display()
            )));
        }
        if directory.trim().is_empty() {
            return Err(GymError::missing_field("directory"));
        }
        options.validate()?;

        let directory = PathBuf::from(directory);
        env.start_recording(&directory, options)?;
        info!("Monitor for {} recording to {}", env.spec_id(), directory.display());
        self.state = MonitorState::Recording { directory };
        Ok(())
    }

    /// `Recording -> Inactive`, flushing recorded data. Returns the manifest path.
    pub fn close(&mut self, env: &mut EnvHandle) -> GymResult<PathBuf> {
        if !self.is_recording() {
            return Err(GymError::Conflict("Monitor is not recording".to_string()));
        }
        // Leave the state machine inactive even if the flush fails; the
        // recorder has been consumed either way.
        self.state = MonitorState::Inactive;
        let manifest = env.close_recording()?;
        info!("Monitor for {} closed", env.spec_id());
        Ok(manifest)
    }
}
