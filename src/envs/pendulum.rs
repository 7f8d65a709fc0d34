//! Torque-controlled inverted pendulum swing-up.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::environment::{Environment, StepOutcome};
use crate::error::{GymError, GymResult};
use crate::spaces::{Space, SpaceValue};

const MAX_SPEED: f64 = 8.0;
const MAX_TORQUE: f64 = 2.0;
const DT: f64 = 0.05;
const GRAVITY: f64 = 10.0;
const MASS: f64 = 1.0;
const LENGTH: f64 = 1.0;

pub struct Pendulum {
    action_space: Space,
    observation_space: Space,
    theta: f64,
    theta_dot: f64,
    rng: StdRng,
}

impl Pendulum {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            action_space: Space::uniform_box(vec![1], -MAX_TORQUE, MAX_TORQUE),
            observation_space: Space::Box {
                shape: vec![3],
                low: vec![-1.0, -1.0, -MAX_SPEED],
                high: vec![1.0, 1.0, MAX_SPEED],
            },
            theta: 0.0,
            theta_dot: 0.0,
            rng,
        }
    }

    fn observation(&self) -> SpaceValue {
        SpaceValue::Box(vec![self.theta.cos(), self.theta.sin(), self.theta_dot])
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle into `[-pi, pi)`.
fn angle_normalize(x: f64) -> f64 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Pendulum {
    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn reset(&mut self) -> SpaceValue {
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.observation()
    }

    fn step(&mut self, action: &SpaceValue) -> GymResult<StepOutcome> {
        let torque = match action.as_box() {
            Some([u]) => u.clamp(-MAX_TORQUE, MAX_TORQUE),
            _ => {
                return Err(GymError::InvalidArgument(format!(
                    "Pendulum expects a single torque, got {:?}",
                    action
                )))
            }
        };

        let th = self.theta;
        let thdot = self.theta_dot;
        let cost = angle_normalize(th).powi(2) + 0.1 * thdot.powi(2) + 0.001 * torque.powi(2);

        let new_thdot = thdot
            + (-3.0 * GRAVITY / (2.0 * LENGTH) * (th + PI).sin()
                + 3.0 / (MASS * LENGTH * LENGTH) * torque)
                * DT;
        self.theta = th + new_thdot * DT;
        self.theta_dot = new_thdot.clamp(-MAX_SPEED, MAX_SPEED);

        Ok(StepOutcome::new(self.observation(), -cost, false))
    }
}
