use crate::{
    path::TaskPaths,
    policies::Policy,
    processor::{ProcessedSamples, Rl2Processor},
    tabular::Tabular,
    utils::reward_history::RewardHistory,
};
use candle_core::Result;
use tracing::{debug, info};

macro_rules! break_on_hook_res {
    ($hook_res:expr) => {
        if $hook_res {
            break;
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainPhase {
    Idle,
    CollectingSamples,
    ProcessingSamples,
    Optimizing,
    Logging,
}

/// Mutable state carried from one epoch to the next.
#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    pub step_itr: usize,
    /// Undiscounted returns of the most recent episodes
    pub episode_reward_mean: RewardHistory,
}

/// The single task algorithm RL² wraps. It receives the per task view of the processed samples,
/// where all episodes of a task form one sequence.
pub trait InnerAlgorithm {
    type Policy: Policy;

    fn policy(&self) -> &Self::Policy;

    fn policy_mut(&mut self) -> &mut Self::Policy;

    fn discount(&self) -> f32;

    /// Pad length of the per task sequences this algorithm trains on
    fn max_path_length(&self) -> usize;

    fn optimize_policy(
        &mut self,
        itr: usize,
        samples: &ProcessedSamples,
        tabular: &mut dyn Tabular,
    ) -> Result<()>;

    fn log_diagnostics(&self, _samples: &ProcessedSamples, _tabular: &mut dyn Tabular) -> Result<()> {
        Ok(())
    }
}

/// What the training loop needs from its surroundings: a sampler, an epoch budget and a place
/// to record diagnostics.
pub trait EpochContext {
    fn n_epochs(&self) -> usize;

    fn obtain_samples<P: Policy>(&mut self, itr: usize, policy: &mut P) -> Result<TaskPaths>;

    fn total_env_steps(&self) -> usize;

    fn tabular(&mut self) -> &mut dyn Tabular;

    /// Called once the epoch's diagnostics are all recorded.
    fn end_epoch(&mut self, epoch: usize) -> Result<()>;
}

pub trait Rl2Hooks {
    /// Returning true skips training altogether.
    fn init_hook(&mut self) -> bool;

    /// Returning true stops training after the current epoch.
    fn post_epoch_hook(&mut self, epoch: usize, samples: &ProcessedSamples) -> bool;
}

pub struct DefaultRl2Hooks;

impl Rl2Hooks for DefaultRl2Hooks {
    fn init_hook(&mut self) -> bool {
        false
    }

    fn post_epoch_hook(&mut self, epoch: usize, samples: &ProcessedSamples) -> bool {
        debug!(epoch, average_return = samples.average_return, "epoch finished");
        false
    }
}

/// RL²: fast reinforcement learning via slow reinforcement learning.
pub struct Rl2<A: InnerAlgorithm> {
    inner_algo: A,
    processor: Rl2Processor,
    state: TrainingState,
    phase: TrainPhase,
    hooks: Box<dyn Rl2Hooks>,
}

impl<A: InnerAlgorithm> Rl2<A> {
    /// `max_path_length` bounds single episodes. It differs from the inner algorithm's maximum
    /// path length, which bounds a whole task's concatenated episodes.
    pub fn new(inner_algo: A, max_path_length: usize) -> Self {
        let processor = Rl2Processor::new(
            max_path_length,
            inner_algo.max_path_length(),
            inner_algo.discount(),
        );
        Self {
            inner_algo,
            processor,
            state: TrainingState::default(),
            phase: TrainPhase::Idle,
            hooks: Box::new(DefaultRl2Hooks),
        }
    }

    pub fn with_hooks(mut self, hooks: impl Rl2Hooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn phase(&self) -> TrainPhase {
        self.phase
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn processor(&self) -> &Rl2Processor {
        &self.processor
    }

    pub fn max_path_length(&self) -> usize {
        self.processor.max_path_length
    }

    pub fn inner_algo(&self) -> &A {
        &self.inner_algo
    }

    pub fn policy(&self) -> &A::Policy {
        self.inner_algo.policy()
    }

    /// Runs every epoch of `ctx` and returns the average return of the last one. A failing epoch
    /// leaves the driver `Idle` and its updates up to the failure in place.
    pub fn train<C: EpochContext>(&mut self, ctx: &mut C) -> Result<Option<f32>> {
        let mut last_return = None;
        if self.hooks.init_hook() {
            return Ok(last_return);
        }
        for epoch in 0..ctx.n_epochs() {
            let samples = match self.run_epoch(epoch, ctx) {
                Ok(samples) => samples,
                Err(err) => {
                    self.phase = TrainPhase::Idle;
                    return Err(err);
                }
            };
            last_return = Some(samples.average_return);
            break_on_hook_res!(self.hooks.post_epoch_hook(epoch, &samples));
        }
        Ok(last_return)
    }

    fn run_epoch<C: EpochContext>(
        &mut self,
        epoch: usize,
        ctx: &mut C,
    ) -> Result<ProcessedSamples> {
        let itr = self.state.step_itr;
        self.phase = TrainPhase::CollectingSamples;
        debug!(epoch, itr, "obtaining samples");
        let paths = ctx.obtain_samples(itr, self.inner_algo.policy_mut())?;
        let total_env_steps = ctx.total_env_steps();
        ctx.tabular()
            .record("TotalEnvSteps", total_env_steps as f64);

        let samples = self.train_once(itr, &paths, ctx.tabular())?;

        self.phase = TrainPhase::Logging;
        ctx.end_epoch(epoch)?;
        self.state.step_itr += 1;
        self.phase = TrainPhase::Idle;
        Ok(samples)
    }

    /// One policy update from one round of paths.
    pub fn train_once(
        &mut self,
        itr: usize,
        paths: &TaskPaths,
        tabular: &mut dyn Tabular,
    ) -> Result<ProcessedSamples> {
        let samples = self.process_samples(itr, paths, tabular)?;
        self.inner_algo.log_diagnostics(&samples, tabular)?;
        self.phase = TrainPhase::Optimizing;
        info!(itr, "Optimizing policy...");
        self.inner_algo.optimize_policy(itr, &samples, tabular)?;
        Ok(samples)
    }

    pub fn process_samples(
        &mut self,
        itr: usize,
        paths: &TaskPaths,
        tabular: &mut dyn Tabular,
    ) -> Result<ProcessedSamples> {
        self.phase = TrainPhase::ProcessingSamples;
        self.processor.process_samples(
            itr,
            paths,
            self.inner_algo.policy().distribution(),
            &mut self.state.episode_reward_mean,
            tabular,
        )
    }
}
