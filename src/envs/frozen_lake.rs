//! Grid-world where the agent crosses a slippery frozen lake.
//!
//! Tiles: `S` start, `F` frozen, `H` hole (episode ends, no reward),
//! `G` goal (episode ends, reward 1). On a slippery lake the agent moves
//! in the intended direction or one of the two perpendicular ones, each
//! with probability 1/3.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::environment::{Environment, StepOutcome};
use crate::error::{GymError, GymResult};
use crate::spaces::{json_number, Space, SpaceValue};

pub const MAP_4X4: [&str; 4] = ["SFFF", "FHFH", "FFFH", "HFFG"];

const LEFT: u64 = 0;
const DOWN: u64 = 1;
const RIGHT: u64 = 2;
const UP: u64 = 3;

pub struct FrozenLake {
    action_space: Space,
    observation_space: Space,
    tiles: Vec<Vec<u8>>,
    rows: usize,
    cols: usize,
    slippery: bool,
    position: usize,
    rng: StdRng,
}

impl FrozenLake {
    pub fn new(map: &[&str], slippery: bool) -> Self {
        Self::with_rng(map, slippery, StdRng::from_entropy())
    }

    pub fn with_seed(map: &[&str], slippery: bool, seed: u64) -> Self {
        Self::with_rng(map, slippery, StdRng::seed_from_u64(seed))
    }

    fn with_rng(map: &[&str], slippery: bool, rng: StdRng) -> Self {
        let tiles: Vec<Vec<u8>> = map.iter().map(|row| row.as_bytes().to_vec()).collect();
        let rows = tiles.len();
        let cols = tiles.first().map_or(0, Vec::len);
        let mut lake = Self {
            action_space: Space::Discrete { n: 4 },
            observation_space: Space::Discrete {
                n: (rows * cols) as u64,
            },
            tiles,
            rows,
            cols,
            slippery,
            position: 0,
            rng,
        };
        lake.position = lake.start();
        lake
    }

    fn start(&self) -> usize {
        self.tiles
            .iter()
            .flatten()
            .position(|t| *t == b'S')
            .unwrap_or(0)
    }

    fn tile(&self, position: usize) -> u8 {
        self.tiles[position / self.cols][position % self.cols]
    }

    fn moved(&self, position: usize, direction: u64) -> usize {
        let (mut row, mut col) = (position / self.cols, position % self.cols);
        match direction {
            LEFT => col = col.saturating_sub(1),
            DOWN => row = (row + 1).min(self.rows - 1),
            RIGHT => col = (col + 1).min(self.cols - 1),
            UP => row = row.saturating_sub(1),
            _ => {}
        }
        row * self.cols + col
    }
}

impl Environment for FrozenLake {
    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn reset(&mut self) -> SpaceValue {
        self.position = self.start();
        SpaceValue::Discrete(self.position as u64)
    }

    fn step(&mut self, action: &SpaceValue) -> GymResult<StepOutcome> {
        let intended = match action.as_discrete() {
            Some(a) if a < 4 => a,
            _ => {
                return Err(GymError::InvalidArgument(format!(
                    "FrozenLake expects an action in [0, 4), got {:?}",
                    action
                )))
            }
        };

        // Stepping from a terminal tile leaves the agent in place.
        if matches!(self.tile(self.position), b'H' | b'G') {
            return Ok(StepOutcome::new(SpaceValue::Discrete(self.position as u64), 0.0, true)
                .with_info("prob", json_number(1.0)));
        }

        let (direction, prob) = if self.slippery {
            let offset = self.rng.gen_range(0..3u64);
            ((intended + 3 + offset) % 4, 1.0 / 3.0)
        } else {
            (intended, 1.0)
        };

        self.position = self.moved(self.position, direction);
        let tile = self.tile(self.position);
        let reward = if tile == b'G' { 1.0 } else { 0.0 };
        let done = matches!(tile, b'H' | b'G');

        Ok(
            StepOutcome::new(SpaceValue::Discrete(self.position as u64), reward, done)
                .with_info("prob", json_number(prob)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn prob_of(outcome: &StepOutcome) -> Option<f64> {
        outcome.info.get("prob").and_then(Value::as_f64)
    }

    #[test]
    fn test_reset_to_start() {
        let mut env = FrozenLake::with_seed(&MAP_4X4, true, 0);
        assert_eq!(env.reset(), SpaceValue::Discrete(0));
        assert_eq!(env.observation_space(), &Space::Discrete { n: 16 });
    }

    #[test]
    fn test_deterministic_path_to_goal() {
        let mut env = FrozenLake::with_seed(&MAP_4X4, false, 0);
        env.reset();
        let path = [DOWN, DOWN, RIGHT, RIGHT, DOWN, RIGHT];
        let mut last = None;
        for a in path {
            last = Some(env.step(&SpaceValue::Discrete(a)).unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.observation, SpaceValue::Discrete(15));
        assert_eq!(last.reward, 1.0);
        assert!(last.done);
        assert_eq!(prob_of(&last), Some(1.0));
    }

    #[test]
    fn test_hole_ends_episode() {
        let mut env = FrozenLake::with_seed(&MAP_4X4, false, 0);
        env.reset();
        env.step(&SpaceValue::Discrete(DOWN)).unwrap();
        let outcome = env.step(&SpaceValue::Discrete(RIGHT)).unwrap();
        assert_eq!(outcome.observation, SpaceValue::Discrete(5));
        assert!(outcome.done);
        assert_eq!(outcome.reward, 0.0);
    }

    #[test]
    fn test_walls_clamp_movement() {
        let mut env = FrozenLake::with_seed(&MAP_4X4, false, 0);
        env.reset();
        let outcome = env.step(&SpaceValue::Discrete(LEFT)).unwrap();
        assert_eq!(outcome.observation, SpaceValue::Discrete(0));
        let outcome = env.step(&SpaceValue::Discrete(UP)).unwrap();
        assert_eq!(outcome.observation, SpaceValue::Discrete(0));
    }

    #[test]
    fn test_slippery_reports_probability() {
        let mut env = FrozenLake::with_seed(&MAP_4X4, true, 42);
        env.reset();
        let outcome = env.step(&SpaceValue::Discrete(RIGHT)).unwrap();
        let prob = prob_of(&outcome).unwrap();
        assert!((prob - 1.0 / 3.0).abs() < 1e-12);
    }
}
