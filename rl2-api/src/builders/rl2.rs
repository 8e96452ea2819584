use crate::{
    builders::{agent::AgentBuilder, policy::PolicyBuilder},
    trainer::Trainer,
};
use candle_core::{DType, Device, Result, bail};
use candle_nn::{VarBuilder, VarMap};
use rl2_agents::AgentKind;
use rl2_core::{
    algorithm::Rl2,
    env::{Env, TaskEnv, rl2_env::Rl2Env},
    policies::Policy,
    sampler::Rl2Sampler,
};
use tracing::{info, warn};

pub struct Rl2Builder {
    pub meta_batch_size: usize,
    pub episodes_per_task: usize,
    /// Maximum length of a single episode
    pub max_path_length: usize,
    pub n_epochs: usize,
    pub discount: f32,
    pub device: Device,
    pub policy_builder: PolicyBuilder,
    pub agent_builder: AgentBuilder,
}

impl Default for Rl2Builder {
    fn default() -> Self {
        Self {
            meta_batch_size: 10,
            episodes_per_task: 4,
            max_path_length: 100,
            n_epochs: 100,
            discount: 0.99,
            device: Device::Cpu,
            policy_builder: PolicyBuilder::default(),
            agent_builder: AgentBuilder::default(),
        }
    }
}

pub struct Rl2Experiment<E: TaskEnv> {
    pub algo: Rl2<AgentKind>,
    pub trainer: Trainer<Rl2Sampler<Rl2Env<E>>>,
}

impl<E: TaskEnv> Rl2Experiment<E> {
    pub fn train(&mut self) -> Result<Option<f32>> {
        self.algo.train(&mut self.trainer)
    }
}

impl Rl2Builder {
    pub fn build<E: TaskEnv>(&self, env: E) -> Result<Rl2Experiment<E>> {
        if self.meta_batch_size == 0 || self.episodes_per_task == 0 || self.max_path_length == 0 {
            bail!(
                "meta_batch_size ({}), episodes_per_task ({}) and max_path_length ({}) must be positive",
                self.meta_batch_size,
                self.episodes_per_task,
                self.max_path_length
            );
        }
        let env = Rl2Env::new(env, self.device.clone());
        let env_description = env.env_description();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let policy = self.policy_builder.build(&env_description, &vb)?;
        if !policy.recurrent() {
            warn!("policy is not recurrent, it cannot carry experience across episodes of a task");
        }
        // the inner algorithm sees all episodes of a task as one sequence
        let inner_max_path_length = self.max_path_length * self.episodes_per_task;
        let agent =
            self.agent_builder
                .build(policy, varmap, self.discount, inner_max_path_length)?;
        let algo = Rl2::new(agent, self.max_path_length);
        let sampler = Rl2Sampler::new(
            env,
            self.meta_batch_size,
            self.episodes_per_task,
            self.max_path_length,
        );
        info!(
            meta_batch_size = self.meta_batch_size,
            episodes_per_task = self.episodes_per_task,
            max_path_length = self.max_path_length,
            "built RL2 experiment"
        );
        Ok(Rl2Experiment {
            algo,
            trainer: Trainer::new(sampler, self.n_epochs),
        })
    }
}
