use crate::{
    env::{EnvironmentDescription, SnapShot, TaskEnv},
    path::{Path, TaskPaths},
    policies::Policy,
    rng::with_rng,
    utils::tensor_utils::stack_tensor_dict_list,
};
use candle_core::{Result, Tensor};
use rand::Rng;
use tracing::debug;

pub trait MetaSampler {
    fn env_description(&self) -> EnvironmentDescription;

    /// Collects one round of paths, grouped by task.
    fn obtain_samples<P: Policy>(&mut self, itr: usize, policy: &mut P) -> Result<TaskPaths>;

    fn total_env_steps(&self) -> usize;
}

/// Samples `meta_batch_size` tasks per round and collects `episodes_per_task` episodes on each.
/// The policy is reset once per task, so a recurrent policy carries its hidden state from one
/// episode of a task into the next.
pub struct Rl2Sampler<E: TaskEnv> {
    env: E,
    meta_batch_size: usize,
    episodes_per_task: usize,
    max_path_length: usize,
    total_env_steps: usize,
}

impl<E: TaskEnv> Rl2Sampler<E> {
    pub fn new(
        env: E,
        meta_batch_size: usize,
        episodes_per_task: usize,
        max_path_length: usize,
    ) -> Self {
        Self {
            env,
            meta_batch_size,
            episodes_per_task,
            max_path_length,
            total_env_steps: 0,
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    fn rollout<P: Policy>(&mut self, policy: &mut P) -> Result<Path> {
        let seed = with_rng(|rng| rng.random::<u64>());
        let mut observation = self.env.reset(seed)?;
        let mut observations = vec![];
        let mut actions = vec![];
        let mut rewards = vec![];
        let mut dones = vec![];
        let mut env_infos = vec![];
        let mut agent_infos = vec![];
        for _ in 0..self.max_path_length {
            let (action, agent_info) = policy.get_action(&observation)?;
            let SnapShot {
                state,
                reward,
                terminated,
                truncated,
                env_info,
            } = self.env.step(&action)?;
            observations.push(observation);
            actions.push(action);
            rewards.push(reward);
            dones.push(terminated);
            env_infos.push(env_info);
            agent_infos.push(agent_info);
            self.total_env_steps += 1;
            observation = state;
            if terminated || truncated {
                break;
            }
        }
        Path::new(
            Tensor::stack(&observations, 0)?,
            Tensor::stack(&actions, 0)?,
            rewards,
            dones,
            stack_tensor_dict_list(&env_infos)?,
            stack_tensor_dict_list(&agent_infos)?,
        )
    }
}

impl<E: TaskEnv> MetaSampler for Rl2Sampler<E> {
    fn env_description(&self) -> EnvironmentDescription {
        self.env.env_description()
    }

    fn obtain_samples<P: Policy>(&mut self, itr: usize, policy: &mut P) -> Result<TaskPaths> {
        let tasks = self.env.sample_tasks(self.meta_batch_size);
        let mut task_paths = TaskPaths::new();
        for (task_id, task) in tasks.iter().enumerate() {
            self.env.set_task(task);
            policy.reset(&[true])?;
            let paths = (0..self.episodes_per_task)
                .map(|_| self.rollout(policy))
                .collect::<Result<Vec<_>>>()?;
            debug!(itr, task_id, ?task, episodes = paths.len(), "collected task");
            task_paths.insert(task_id, paths)?;
        }
        debug!(
            itr,
            paths = task_paths.num_paths(),
            steps = task_paths.total_steps(),
            "sampling round done"
        );
        Ok(task_paths)
    }

    fn total_env_steps(&self) -> usize {
        self.total_env_steps
    }
}
