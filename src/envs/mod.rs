//! Environments Module
//!
//! The environment catalog sessions are created from:
//! - [`Environment`] capability contract (reset, step, spaces)
//! - [`EnvHandle`] wrapper adding time limits, counters and recording
//! - [`EnvCatalog`] id-to-constructor registry with the built-in
//!   `CartPole`, `Pendulum` and `FrozenLake` kinds

pub mod cartpole;
pub mod catalog;
pub mod environment;
pub mod frozen_lake;
pub mod handle;
pub mod pendulum;

pub use catalog::{EnvCatalog, EnvFactory, EnvSpec};
pub use environment::{Environment, StepOutcome};
pub use handle::{EnvHandle, TIME_LIMIT_TRUNCATED};
