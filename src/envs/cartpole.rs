//! Classic cart-pole balancing task.
//!
//! Parameters and Euler integration follow the classic Barto, Sutton and
//! Anderson formulation: cart 1.0 kg, pole 0.1 kg, pole half-length
//! 0.5 m, force 10 N, gravity 9.8 m/s², dt 0.02 s.

use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::environment::{Environment, StepOutcome};
use crate::error::{GymError, GymResult};
use crate::spaces::{Space, SpaceValue};

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
const HALF_LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * HALF_LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

/// Pole angle at which the episode fails (12 degrees).
const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
/// Cart position at which the episode fails.
const X_THRESHOLD: f64 = 2.4;

pub struct CartPole {
    action_space: Space,
    observation_space: Space,
    /// `[x, x_dot, theta, theta_dot]`
    state: [f64; 4],
    /// `None` while the pole is up, then counts steps taken past failure.
    steps_beyond_done: Option<u32>,
    rng: StdRng,
}

impl CartPole {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let high = [
            X_THRESHOLD * 2.0,
            f32::MAX as f64,
            THETA_THRESHOLD * 2.0,
            f32::MAX as f64,
        ];
        Self {
            action_space: Space::Discrete { n: 2 },
            observation_space: Space::Box {
                shape: vec![4],
                low: high.iter().map(|h| -h).collect(),
                high: high.to_vec(),
            },
            state: [0.0; 4],
            steps_beyond_done: None,
            rng,
        }
    }

    fn observation(&self) -> SpaceValue {
        SpaceValue::Box(self.state.to_vec())
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for CartPole {
    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn reset(&mut self) -> SpaceValue {
        for v in self.state.iter_mut() {
            *v = self.rng.gen_range(-0.05..0.05);
        }
        self.steps_beyond_done = None;
        self.observation()
    }

    fn step(&mut self, action: &SpaceValue) -> GymResult<StepOutcome> {
        let push_right = match action.as_discrete() {
            Some(0) => false,
            Some(1) => true,
            _ => {
                return Err(GymError::InvalidArgument(format!(
                    "CartPole expects action 0 or 1, got {:?}",
                    action
                )))
            }
        };

        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if push_right { FORCE_MAG } else { -FORCE_MAG };
        let (sin_theta, cos_theta) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin_theta) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (HALF_LENGTH * (4.0 / 3.0 - MASS_POLE * cos_theta * cos_theta / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];

        let [x, _, theta, _] = self.state;
        let done = !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&theta);

        let reward = if !done {
            1.0
        } else {
            match self.steps_beyond_done {
                None => {
                    self.steps_beyond_done = Some(0);
                    1.0
                }
                Some(n) => {
                    if n == 0 {
                        warn!("CartPole stepped after the episode ended; call reset first");
                    }
                    self.steps_beyond_done = Some(n + 1);
                    0.0
                }
            }
        };

        Ok(StepOutcome::new(self.observation(), reward, done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_near_upright() {
        let mut env = CartPole::with_seed(7);
        let obs = env.reset();
        let data = obs.as_box().unwrap();
        assert_eq!(data.len(), 4);
        assert!(data.iter().all(|v| v.abs() <= 0.05));
        assert!(env.observation_space().contains(&obs));
    }

    #[test]
    fn test_fresh_step_is_not_done() {
        let mut env = CartPole::with_seed(1);
        env.reset();
        let outcome = env.step(&SpaceValue::Discrete(1)).unwrap();
        assert!(!outcome.done);
        assert_eq!(outcome.reward, 1.0);
        assert_eq!(outcome.observation.as_box().unwrap().len(), 4);
    }

    #[test]
    fn test_push_right_accelerates_right() {
        let mut env = CartPole::with_seed(3);
        env.reset();
        let before = env.state[1];
        env.step(&SpaceValue::Discrete(1)).unwrap();
        assert!(env.state[1] > before);
    }

    #[test]
    fn test_constant_push_eventually_fails() {
        let mut env = CartPole::with_seed(11);
        env.reset();
        let mut steps = 0;
        loop {
            let outcome = env.step(&SpaceValue::Discrete(0)).unwrap();
            steps += 1;
            if outcome.done {
                assert_eq!(outcome.reward, 1.0);
                break;
            }
            assert!(steps < 500, "pole never fell");
        }
        // stepping past the end yields no reward
        let after = env.step(&SpaceValue::Discrete(0)).unwrap();
        assert!(after.done);
        assert_eq!(after.reward, 0.0);
    }

    #[test]
    fn test_rejects_foreign_action() {
        let mut env = CartPole::with_seed(0);
        env.reset();
        assert!(env.step(&SpaceValue::Box(vec![1.0])).is_err());
    }
}
