//! Session State Management
//!
//! One live environment instance plus its identifier, spec name, monitor
//! state and the guard that serializes operations on it.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::envs::EnvHandle;
use crate::monitor::{MonitorController, MonitorState};

/// Everything mutated by session operations. Only reachable through
/// [`Session::lock`].
#[derive(Debug)]
pub struct SessionInner {
    /// The underlying simulation instance
    pub env: EnvHandle,
    /// Recording state machine
    pub monitor: MonitorController,
}

/// A live simulation session
#[derive(Debug)]
pub struct Session {
    id: String,
    env_spec_name: String,
    created_at: DateTime<Utc>,
    guard: Mutex<SessionInner>,
}

impl Session {
    /// Wrap a freshly constructed environment
    pub fn new(id: impl Into<String>, env: EnvHandle) -> Self {
        Self {
            id: id.into(),
            env_spec_name: env.spec_id().to_string(),
            created_at: Utc::now(),
            guard: Mutex::new(SessionInner {
                env,
                monitor: MonitorController::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn env_spec_name(&self) -> &str {
        &self.env_spec_name
    }

    /// Acquire the session guard. Blocks while another operation on this
    /// session is in flight; other sessions are unaffected.
    pub fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.guard.lock()
    }

    /// Snapshot for API responses. Takes the guard.
    pub fn info(&self) -> SessionInfo {
        let inner = self.lock();
        SessionInfo {
            instance_id: self.id.clone(),
            env_spec_name: self.env_spec_name.clone(),
            monitor: inner.monitor.state().clone(),
            created_at: self.created_at.to_rfc3339(),
            episodes: inner.env.episodes(),
            total_steps: inner.env.total_steps(),
            episode_steps: inner.env.elapsed_steps(),
            max_episode_steps: inner.env.max_episode_steps(),
            reward_threshold: inner.env.reward_threshold(),
        }
    }
}

/// Serializable session info for API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub instance_id: String,
    pub env_spec_name: String,
    pub monitor: MonitorState,
    pub created_at: String,
    pub episodes: u64,
    pub total_steps: u64,
    pub episode_steps: u64,
    /// Time limit per episode, if any
    pub max_episode_steps: Option<u64>,
    /// Average reward over 100 episodes at which the task counts as solved
    pub reward_threshold: Option<f64>,
}
