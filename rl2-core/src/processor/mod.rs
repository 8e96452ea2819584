pub mod statistics;

use crate::{
    distributions::Distribution,
    path::{ConcatenatedPath, InfoMap, Path, TaskPaths},
    tabular::{Prefixed, Tabular},
    utils::{
        reward_history::RewardHistory,
        tensor_utils::{pad_tensor_n, stack_and_pad_tensor_dict},
    },
};
use candle_core::{Device, Result, Tensor, bail};
use statistics::{log_performance, masked_mean, success_rate};

/// Rows of paths stacked into fixed size `[N, max_len, ...]` tensors. Every field is zero past a
/// row's real length, `valids` is one within it.
#[derive(Debug, Clone)]
pub struct StackedBatch {
    pub observations: Tensor,
    pub actions: Tensor,
    pub rewards: Tensor,
    pub dones: Tensor,
    pub returns: Tensor,
    pub valids: Tensor,
    /// Lengths of the paths making up each row
    pub lengths: Vec<Vec<usize>>,
    pub env_infos: InfoMap,
    pub agent_infos: InfoMap,
}

impl StackedBatch {
    pub fn num_rows(&self) -> usize {
        self.lengths.len()
    }

    pub fn row_lengths(&self) -> Vec<usize> {
        self.lengths.iter().map(|l| l.iter().sum()).collect()
    }

    /// Pad length of the rows
    pub fn max_len(&self) -> Result<usize> {
        self.valids.dim(1)
    }
}

/// Output of one processing round, handed to the inner algorithm.
#[derive(Debug, Clone)]
pub struct ProcessedSamples {
    /// One row per task, holding all of that task's paths back to back
    pub meta: StackedBatch,
    /// One row per path
    pub individual: StackedBatch,
    pub concatenated: Vec<ConcatenatedPath>,
    pub undiscounted_returns: Vec<f32>,
    pub average_return: f32,
}

fn pad_per_step(
    rows: impl Iterator<Item = Vec<f32>>,
    max_len: usize,
    device: &Device,
) -> Result<Tensor> {
    let rows = rows
        .map(|row| {
            let len = row.len();
            Tensor::from_vec(row, len, device)
        })
        .collect::<Result<Vec<_>>>()?;
    pad_tensor_n(&rows, max_len)
}

/// Pads `paths` to `max_len` and stacks them. A path longer than `max_len` is an error.
pub fn stack_paths(max_len: usize, paths: &[ConcatenatedPath]) -> Result<StackedBatch> {
    let Some(first) = paths.first() else {
        bail!("cannot stack an empty list of paths");
    };
    if let Some(path) = paths.iter().find(|p| p.len() > max_len) {
        bail!(
            "path of length {} exceeds the configured maximum path length {max_len}",
            path.len()
        );
    }
    let device = first.observations.device();
    let observations = paths
        .iter()
        .map(|p| p.observations.clone())
        .collect::<Vec<_>>();
    let actions = paths.iter().map(|p| p.actions.clone()).collect::<Vec<_>>();
    let env_infos = paths.iter().map(|p| &p.env_infos).collect::<Vec<_>>();
    let agent_infos = paths.iter().map(|p| &p.agent_infos).collect::<Vec<_>>();
    Ok(StackedBatch {
        observations: pad_tensor_n(&observations, max_len)?,
        actions: pad_tensor_n(&actions, max_len)?,
        rewards: pad_per_step(paths.iter().map(|p| p.rewards.clone()), max_len, device)?,
        dones: pad_per_step(
            paths
                .iter()
                .map(|p| p.dones.iter().map(|d| if *d { 1f32 } else { 0. }).collect::<Vec<_>>()),
            max_len,
            device,
        )?,
        returns: pad_per_step(paths.iter().map(|p| p.returns.clone()), max_len, device)?,
        valids: pad_per_step(paths.iter().map(|p| p.valids.clone()), max_len, device)?,
        lengths: paths.iter().map(|p| p.lengths.clone()).collect(),
        env_infos: stack_and_pad_tensor_dict(&env_infos, max_len)?,
        agent_infos: stack_and_pad_tensor_dict(&agent_infos, max_len)?,
    })
}

/// Reshapes per task rollouts for RL². The paths of each task are concatenated into a single
/// row so a recurrent policy sees them as one long episode, and every path is additionally kept
/// on its own row for performance evaluation.
#[derive(Debug, Clone)]
pub struct Rl2Processor {
    /// Pad length of the per path view
    pub max_path_length: usize,
    /// Pad length of the per task view, i.e. the inner algorithm's maximum path length
    pub meta_max_path_length: usize,
    pub discount: f32,
}

impl Rl2Processor {
    pub fn new(max_path_length: usize, meta_max_path_length: usize, discount: f32) -> Self {
        Self {
            max_path_length,
            meta_max_path_length,
            discount,
        }
    }

    pub fn concatenate_paths(&self, paths: &[Path]) -> Result<ConcatenatedPath> {
        ConcatenatedPath::from_paths(paths, self.discount)
    }

    pub fn process_samples<Dist: Distribution>(
        &self,
        itr: usize,
        task_paths: &TaskPaths,
        distribution: &Dist,
        reward_history: &mut RewardHistory,
        tabular: &mut dyn Tabular,
    ) -> Result<ProcessedSamples> {
        if task_paths.is_empty() {
            bail!("no paths were collected");
        }
        let concatenated = task_paths
            .iter()
            .map(|(_, paths)| self.concatenate_paths(paths))
            .collect::<Result<Vec<_>>>()?;
        let individual_paths = task_paths
            .paths()
            .map(|path| self.concatenate_paths(std::slice::from_ref(path)))
            .collect::<Result<Vec<_>>>()?;

        let meta = stack_paths(self.meta_max_path_length, &concatenated)?;
        let individual = stack_paths(self.max_path_length, &individual_paths)?;

        let entropy = masked_mean(&distribution.entropy(&meta.agent_infos)?, &meta.valids)?;

        let paths = task_paths.paths().collect::<Vec<_>>();
        let undiscounted_returns = log_performance(
            itr,
            &paths,
            self.discount,
            &mut Prefixed::new(&mut *tabular, "Evaluation/"),
        );
        reward_history.extend(undiscounted_returns.iter().copied());

        if let Some(rate) = success_rate(paths.iter().copied())? {
            tabular.record("SuccessRate", rate);
        }
        tabular.record("Entropy", entropy as f64);
        tabular.record("Perplexity", (entropy as f64).exp());
        if let Some(mean) = reward_history.mean() {
            tabular.record("Extras/EpisodeRewardMean", mean as f64);
        }

        let average_return =
            undiscounted_returns.iter().sum::<f32>() / undiscounted_returns.len() as f32;
        Ok(ProcessedSamples {
            meta,
            individual,
            concatenated,
            undiscounted_returns,
            average_return,
        })
    }
}
