//! Environment Catalog
//!
//! Maps environment ids such as `CartPole-v0` to constructors.

use dashmap::DashMap;
use log::{debug, error, info};
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::cartpole::CartPole;
use super::environment::Environment;
use super::frozen_lake::{FrozenLake, MAP_4X4};
use super::handle::EnvHandle;
use super::pendulum::Pendulum;
use crate::error::{GymError, GymResult};

/// Constructs a fresh environment instance
pub type EnvFactory = Arc<dyn Fn() -> Box<dyn Environment> + Send + Sync>;

/// Registration entry for one environment kind
#[derive(Clone)]
pub struct EnvSpec {
    pub id: String,
    /// Episodes end (truncated) after this many steps
    pub max_episode_steps: Option<u64>,
    pub reward_threshold: Option<f64>,
    factory: EnvFactory,
}

impl EnvSpec {
    pub fn new<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Environment> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            max_episode_steps: None,
            reward_threshold: None,
            factory: Arc::new(factory),
        }
    }

    pub fn with_max_episode_steps(mut self, steps: u64) -> Self {
        self.max_episode_steps = Some(steps);
        self
    }

    pub fn with_reward_threshold(mut self, threshold: f64) -> Self {
        self.reward_threshold = Some(threshold);
        self
    }

    /// Build an instance, refusing environments whose spaces are malformed.
    pub fn make(&self) -> GymResult<EnvHandle> {
        let env = (self.factory)();
        for (role, space) in [("action", env.action_space()), ("observation", env.observation_space())] {
            space.validate().map_err(|e| {
                error!("Environment {} declares a bad {} space: {}", self.id, role, e);
                GymError::Internal(format!("Environment {} has an invalid {} space: {}", self.id, role, e))
            })?;
        }
        Ok(EnvHandle::new(self.id.clone(), env, self.max_episode_steps)
            .with_reward_threshold(self.reward_threshold))
    }
}

impl std::fmt::Debug for EnvSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSpec")
            .field("id", &self.id)
            .field("max_episode_steps", &self.max_episode_steps)
            .field("reward_threshold", &self.reward_threshold)
            .finish()
    }
}

/// `[namespace/]Name-vN`
fn env_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[\w:-]+/)?([\w:.-]+)-v(\d+)$").expect("env id pattern is valid")
    })
}

/// Registry of environment kinds that sessions can be created from
pub struct EnvCatalog {
    specs: DashMap<String, EnvSpec>,
}

impl EnvCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self {
            specs: DashMap::new(),
        }
    }

    /// Catalog holding the built-in environments
    pub fn with_builtin() -> Self {
        let catalog = Self::new();
        catalog.register(
            EnvSpec::new("CartPole-v0", || Box::new(CartPole::new()))
                .with_max_episode_steps(200)
                .with_reward_threshold(195.0),
        );
        catalog.register(
            EnvSpec::new("CartPole-v1", || Box::new(CartPole::new()))
                .with_max_episode_steps(500)
                .with_reward_threshold(475.0),
        );
        catalog.register(
            EnvSpec::new("Pendulum-v0", || Box::new(Pendulum::new())).with_max_episode_steps(200),
        );
        catalog.register(
            EnvSpec::new("FrozenLake-v0", || Box::new(FrozenLake::new(&MAP_4X4, true)))
                .with_max_episode_steps(100)
                .with_reward_threshold(0.78),
        );
        catalog
    }

    /// Add or replace an environment kind
    pub fn register(&self, spec: EnvSpec) {
        let id = spec.id.clone();
        if self.specs.insert(id.clone(), spec).is_some() {
            info!("Replaced environment registration for {}", id);
        } else {
            debug!("Registered environment {}", id);
        }
    }

    pub fn contains(&self, env_id: &str) -> bool {
        self.specs.contains_key(env_id)
    }

    /// Look up the spec for `env_id`
    pub fn spec(&self, env_id: &str) -> GymResult<EnvSpec> {
        if !env_id_pattern().is_match(env_id) {
            return Err(GymError::InvalidArgument(format!(
                "Attempted to look up malformed environment ID: {}",
                env_id
            )));
        }
        self.specs
            .get(env_id)
            .map(|spec| spec.value().clone())
            .ok_or_else(|| GymError::InvalidArgument(format!("No registered env with id: {}", env_id)))
    }

    /// Construct a fresh instance of `env_id`
    pub fn make(&self, env_id: &str) -> GymResult<EnvHandle> {
        // Clone out of the map so the factory never runs under a shard lock.
        self.spec(env_id)?.make()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.specs.iter().map(|s| s.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl Default for EnvCatalog {
    fn default() -> Self {
        Self::with_builtin()
    }
}
