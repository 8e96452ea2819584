use candle_core::Result;
use rl2_core::{
    algorithm::EpochContext,
    path::TaskPaths,
    policies::Policy,
    sampler::MetaSampler,
    tabular::{Tabular, TabularLog},
};
use std::collections::BTreeMap;
use tracing::info;

/// Drives a sampler for a fixed number of epochs and keeps every dumped tabular row.
pub struct Trainer<S: MetaSampler> {
    sampler: S,
    n_epochs: usize,
    tabular: TabularLog,
    history: Vec<BTreeMap<String, f64>>,
}

impl<S: MetaSampler> Trainer<S> {
    pub fn new(sampler: S, n_epochs: usize) -> Self {
        Self {
            sampler,
            n_epochs,
            tabular: TabularLog::new(),
            history: vec![],
        }
    }

    pub fn history(&self) -> &[BTreeMap<String, f64>] {
        &self.history
    }
}

impl<S: MetaSampler> EpochContext for Trainer<S> {
    fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    fn obtain_samples<P: Policy>(&mut self, itr: usize, policy: &mut P) -> Result<TaskPaths> {
        self.sampler.obtain_samples(itr, policy)
    }

    fn total_env_steps(&self) -> usize {
        self.sampler.total_env_steps()
    }

    fn tabular(&mut self) -> &mut dyn Tabular {
        &mut self.tabular
    }

    fn end_epoch(&mut self, epoch: usize) -> Result<()> {
        info!(epoch, "epoch summary");
        let row = self.tabular.dump();
        self.history.push(row);
        Ok(())
    }
}
