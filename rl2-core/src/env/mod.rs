pub mod rl2_env;

use crate::path::InfoMap;
use candle_core::{Result, Tensor};
use std::fmt::Debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Space {
    Discrete(usize),
    Continuous { size: usize },
}

impl Space {
    /// Flat size. Discrete actions are one-hot encoded, so their size is the number of choices.
    pub fn size(&self) -> usize {
        match &self {
            Self::Discrete(size) => *size,
            Self::Continuous { size } => *size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDescription {
    pub observation_space: Space,
    pub action_space: Space,
}

impl EnvironmentDescription {
    pub fn new(observation_space: Space, action_space: Space) -> Self {
        Self {
            observation_space,
            action_space,
        }
    }

    pub fn action_size(&self) -> usize {
        self.action_space.size()
    }

    pub fn observation_size(&self) -> usize {
        self.observation_space.size()
    }
}

pub struct SnapShot {
    pub state: Tensor,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub env_info: InfoMap,
}

pub trait Env {
    fn reset(&mut self, seed: u64) -> Result<Tensor>;
    fn step(&mut self, action: &Tensor) -> Result<SnapShot>;
    fn env_description(&self) -> EnvironmentDescription;
}

/// An environment family that can be switched between tasks, e.g. bandits with different arm
/// probabilities.
pub trait TaskEnv: Env {
    type Task: Clone + Debug;

    fn sample_tasks(&mut self, n_tasks: usize) -> Vec<Self::Task>;
    fn set_task(&mut self, task: &Self::Task);
}
