//! Environment handle owned by a session.
//!
//! Wraps a raw [`Environment`] with the catalog's episode time limit,
//! step counters, and the recording facility used by the monitor.

use std::path::{Path, PathBuf};

use log::warn;
use serde_json::Value;

use super::environment::{Environment, StepOutcome};
use crate::error::{GymError, GymResult};
use crate::monitor::{MonitorOptions, StatsRecorder};
use crate::spaces::{Space, SpaceValue};

/// Info key set when an episode ends because of the time limit.
pub const TIME_LIMIT_TRUNCATED: &str = "TimeLimit.truncated";

pub struct EnvHandle {
    spec_id: String,
    env: Box<dyn Environment>,
    max_episode_steps: Option<u64>,
    reward_threshold: Option<f64>,
    /// Steps taken in the current episode
    elapsed_steps: u64,
    /// Steps taken over the handle's lifetime
    total_steps: u64,
    /// Number of resets performed
    episodes: u64,
    needs_reset: bool,
    episode_done: bool,
    recorder: Option<StatsRecorder>,
}

impl EnvHandle {
    pub fn new(spec_id: impl Into<String>, env: Box<dyn Environment>, max_episode_steps: Option<u64>) -> Self {
        Self {
            spec_id: spec_id.into(),
            env,
            max_episode_steps,
            reward_threshold: None,
            elapsed_steps: 0,
            total_steps: 0,
            episodes: 0,
            needs_reset: true,
            episode_done: false,
            recorder: None,
        }
    }

    pub fn with_reward_threshold(mut self, threshold: Option<f64>) -> Self {
        self.reward_threshold = threshold;
        self
    }

    pub fn spec_id(&self) -> &str {
        &self.spec_id
    }

    pub fn max_episode_steps(&self) -> Option<u64> {
        self.max_episode_steps
    }

    pub fn reward_threshold(&self) -> Option<f64> {
        self.reward_threshold
    }

    pub fn action_space(&self) -> &Space {
        self.env.action_space()
    }

    pub fn observation_space(&self) -> &Space {
        self.env.observation_space()
    }

    pub fn elapsed_steps(&self) -> u64 {
        self.elapsed_steps
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn reset(&mut self) -> SpaceValue {
        let observation = self.env.reset();
        self.elapsed_steps = 0;
        self.episodes += 1;
        self.needs_reset = false;
        self.episode_done = false;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.on_reset();
        }
        observation
    }

    /// Advance one step. `action` must already belong to the action space.
    pub fn step(&mut self, action: &SpaceValue) -> GymResult<StepOutcome> {
        if self.needs_reset {
            return Err(GymError::Conflict(format!(
                "Cannot step {} before it has been reset",
                self.spec_id
            )));
        }
        if self.episode_done {
            warn!(
                "Stepping {} after its episode ended; results are undefined until reset",
                self.spec_id
            );
        }

        let mut outcome = self.env.step(action)?;
        self.elapsed_steps += 1;
        self.total_steps += 1;

        if let Some(limit) = self.max_episode_steps {
            if self.elapsed_steps >= limit && !outcome.done {
                outcome.done = true;
                outcome.info.insert(TIME_LIMIT_TRUNCATED.to_string(), Value::Bool(true));
            }
        }
        self.episode_done = outcome.done;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.on_step(outcome.reward, outcome.done);
        }
        Ok(outcome)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn start_recording(&mut self, directory: &Path, options: MonitorOptions) -> GymResult<()> {
        if self.recorder.is_some() {
            return Err(GymError::Conflict(format!(
                "{} already has an open recorder",
                self.spec_id
            )));
        }
        self.recorder = Some(StatsRecorder::open(directory, self.spec_id.clone(), options)?);
        Ok(())
    }

    /// Flush and detach the recorder, returning the written manifest.
    pub fn close_recording(&mut self) -> GymResult<PathBuf> {
        let recorder = self.recorder.take().ok_or_else(|| {
            GymError::Conflict(format!("{} has no open recorder", self.spec_id))
        })?;
        recorder.close()
    }
}

impl std::fmt::Debug for EnvHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvHandle")
            .field("spec_id", &self.spec_id)
            .field("elapsed_steps", &self.elapsed_steps)
            .field("total_steps", &self.total_steps)
            .field("episodes", &self.episodes)
            .field("recording", &self.recorder.is_some())
            .finish()
    }
}
