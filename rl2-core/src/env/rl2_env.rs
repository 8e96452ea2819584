use super::{Env, EnvironmentDescription, SnapShot, Space, TaskEnv};
use candle_core::{DType, Device, Result, Tensor};

/// Feeds the previous action, reward and done flag back into the observation, so that a
/// recurrent policy can infer the task from its own experience.
///
/// The augmented observation is `[obs, prev_action, prev_reward, prev_done]`.
pub struct Rl2Env<E: TaskEnv> {
    inner: E,
    device: Device,
}

impl<E: TaskEnv> Rl2Env<E> {
    pub fn new(inner: E, device: Device) -> Self {
        Self { inner, device }
    }

    fn augment(&self, obs: &Tensor, action: &Tensor, reward: f32, done: bool) -> Result<Tensor> {
        let done = if done { 1f32 } else { 0. };
        let tail = Tensor::new(&[reward, done], &self.device)?;
        Tensor::cat(
            &[
                obs.flatten_all()?.to_dtype(DType::F32)?,
                action.flatten_all()?.to_dtype(DType::F32)?,
                tail,
            ],
            0,
        )
    }
}

impl<E: TaskEnv> Env for Rl2Env<E> {
    fn reset(&mut self, seed: u64) -> Result<Tensor> {
        let obs = self.inner.reset(seed)?;
        let action_size = self.inner.env_description().action_size();
        let no_action = Tensor::zeros(action_size, DType::F32, &self.device)?;
        self.augment(&obs, &no_action, 0., false)
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot> {
        let snapshot = self.inner.step(action)?;
        let state = self.augment(&snapshot.state, action, snapshot.reward, snapshot.terminated)?;
        Ok(SnapShot { state, ..snapshot })
    }

    fn env_description(&self) -> EnvironmentDescription {
        let inner = self.inner.env_description();
        let observation_size = inner.observation_size() + inner.action_size() + 2;
        EnvironmentDescription::new(
            Space::Continuous {
                size: observation_size,
            },
            inner.action_space,
        )
    }
}

impl<E: TaskEnv> TaskEnv for Rl2Env<E> {
    type Task = E::Task;

    fn sample_tasks(&mut self, n_tasks: usize) -> Vec<Self::Task> {
        self.inner.sample_tasks(n_tasks)
    }

    fn set_task(&mut self, task: &Self::Task) {
        self.inner.set_task(task)
    }
}
