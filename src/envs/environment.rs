//! Environment capability contract.

use serde_json::{Map, Value};

use crate::error::GymResult;
use crate::spaces::{Space, SpaceValue};

/// Result of advancing an environment by one action.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: SpaceValue,
    pub reward: f64,
    pub done: bool,
    /// Auxiliary diagnostics. Values must already be JSON-safe.
    pub info: Map<String, Value>,
}

impl StepOutcome {
    pub fn new(observation: SpaceValue, reward: f64, done: bool) -> Self {
        Self {
            observation,
            reward,
            done,
            info: Map::new(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: Value) -> Self {
        self.info.insert(key.into(), value);
        self
    }
}

/// A simulation the catalog can construct.
///
/// Implementations are driven from one thread at a time; the session
/// guard serializes every call. Actions passed to [`step`](Self::step)
/// have already been validated against [`action_space`](Self::action_space).
pub trait Environment: Send + 'static {
    fn action_space(&self) -> &Space;

    fn observation_space(&self) -> &Space;

    /// Start a new episode and return its initial observation.
    fn reset(&mut self) -> SpaceValue;

    /// Advance the simulation by one action.
    fn step(&mut self, action: &SpaceValue) -> GymResult<StepOutcome>;
}
