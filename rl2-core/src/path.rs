use crate::utils::tensor_utils::{concat_tensor_dict_list, discount_cumsum};
use candle_core::{Result, Tensor, bail};
use derive_more::{Deref, DerefMut};
use std::collections::BTreeMap;

pub type TaskId = usize;

/// Named per-step tensors (env infos, agent infos). The leading dimension of every value is the
/// time axis. Keys are kept ordered so that stacking is deterministic.
#[derive(Debug, Clone, Default, Deref, DerefMut)]
pub struct InfoMap(pub BTreeMap<String, Tensor>);

impl InfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Tensor) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn same_keys(&self, other: &InfoMap) -> bool {
        self.keys().eq(other.keys())
    }

    pub fn narrow(&self, start: usize, len: usize) -> Result<Self> {
        self.iter()
            .map(|(key, value)| Ok((key.clone(), value.narrow(0, start, len)?)))
            .collect()
    }
}

impl FromIterator<(String, Tensor)> for InfoMap {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn check_len(field: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        bail!("path field `{field}` has {found} steps, expected {expected}");
    }
    Ok(())
}

/// A single trajectory. Every per-step field shares the same length.
#[derive(Debug, Clone)]
pub struct Path {
    pub observations: Tensor,
    pub actions: Tensor,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub env_infos: InfoMap,
    pub agent_infos: InfoMap,
}

impl Path {
    pub fn new(
        observations: Tensor,
        actions: Tensor,
        rewards: Vec<f32>,
        dones: Vec<bool>,
        env_infos: InfoMap,
        agent_infos: InfoMap,
    ) -> Result<Self> {
        let path = Self {
            observations,
            actions,
            rewards,
            dones,
            env_infos,
            agent_infos,
        };
        path.validate()?;
        Ok(path)
    }

    pub fn validate(&self) -> Result<()> {
        let len = self.rewards.len();
        if len == 0 {
            bail!("path has no steps");
        }
        check_len("observations", self.observations.dim(0)?, len)?;
        check_len("actions", self.actions.dim(0)?, len)?;
        check_len("dones", self.dones.len(), len)?;
        for (key, value) in self.env_infos.iter() {
            check_len(&format!("env_infos.{key}"), value.dim(0)?, len)?;
        }
        for (key, value) in self.agent_infos.iter() {
            check_len(&format!("agent_infos.{key}"), value.dim(0)?, len)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn undiscounted_return(&self) -> f32 {
        self.rewards.iter().sum()
    }

    pub fn terminated(&self) -> bool {
        self.dones.iter().any(|d| *d)
    }
}

/// Paths of one sampling round grouped by task, in the order the tasks were sampled.
#[derive(Debug, Clone, Default)]
pub struct TaskPaths {
    tasks: Vec<(TaskId, Vec<Path>)>,
}

impl TaskPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: TaskId, paths: Vec<Path>) -> Result<()> {
        if self.tasks.iter().any(|(id, _)| *id == task) {
            bail!("task {task} was already collected in this round");
        }
        if paths.is_empty() {
            bail!("task {task} has no paths");
        }
        self.tasks.push((task, paths));
        Ok(())
    }

    pub fn get(&self, task: TaskId) -> Option<&[Path]> {
        self.tasks
            .iter()
            .find(|(id, _)| *id == task)
            .map(|(_, paths)| paths.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &[Path])> {
        self.tasks.iter().map(|(id, paths)| (*id, paths.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.tasks.iter().flat_map(|(_, paths)| paths.iter())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn num_paths(&self) -> usize {
        self.tasks.iter().map(|(_, paths)| paths.len()).sum()
    }

    pub fn total_steps(&self) -> usize {
        self.paths().map(Path::len).sum()
    }
}

/// All paths of one task joined along the time axis. `lengths` keeps the original path
/// boundaries, `returns` holds the discounted returns of each path computed independently.
#[derive(Debug, Clone)]
pub struct ConcatenatedPath {
    pub observations: Tensor,
    pub actions: Tensor,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub returns: Vec<f32>,
    pub valids: Vec<f32>,
    pub lengths: Vec<usize>,
    pub env_infos: InfoMap,
    pub agent_infos: InfoMap,
}

impl ConcatenatedPath {
    pub fn from_paths(paths: &[Path], discount: f32) -> Result<Self> {
        if paths.is_empty() {
            bail!("cannot concatenate an empty list of paths");
        }
        for path in paths {
            path.validate()?;
        }
        let observations = paths.iter().map(|p| &p.observations).collect::<Vec<_>>();
        let actions = paths.iter().map(|p| &p.actions).collect::<Vec<_>>();
        let env_infos = paths.iter().map(|p| &p.env_infos).collect::<Vec<_>>();
        let agent_infos = paths.iter().map(|p| &p.agent_infos).collect::<Vec<_>>();
        let lengths: Vec<usize> = paths.iter().map(Path::len).collect();
        let total: usize = lengths.iter().sum();
        Ok(Self {
            observations: Tensor::cat(&observations, 0)?,
            actions: Tensor::cat(&actions, 0)?,
            rewards: paths.iter().flat_map(|p| p.rewards.iter().copied()).collect(),
            dones: paths.iter().flat_map(|p| p.dones.iter().copied()).collect(),
            returns: paths
                .iter()
                .flat_map(|p| discount_cumsum(&p.rewards, discount))
                .collect(),
            valids: vec![1.; total],
            lengths,
            env_infos: concat_tensor_dict_list(&env_infos)?,
            agent_infos: concat_tensor_dict_list(&agent_infos)?,
        })
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Recovers the individual paths using the recorded lengths.
    pub fn split(&self) -> Result<Vec<Path>> {
        let mut start = 0;
        self.lengths
            .iter()
            .map(|&len| {
                let end = start + len;
                let path = Path::new(
                    self.observations.narrow(0, start, len)?,
                    self.actions.narrow(0, start, len)?,
                    self.rewards[start..end].to_vec(),
                    self.dones[start..end].to_vec(),
                    self.env_infos.narrow(start, len)?,
                    self.agent_infos.narrow(start, len)?,
                );
                start = end;
                path
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{Device, Tensor};

    fn path(len: usize, reward: f32) -> Result<Path> {
        let device = Device::Cpu;
        Path::new(
            Tensor::ones((len, 3), candle_core::DType::F32, &device)?,
            Tensor::zeros((len, 2), candle_core::DType::F32, &device)?,
            vec![reward; len],
            vec![false; len],
            InfoMap::new(),
            InfoMap::new().with("prob", Tensor::ones((len, 2), candle_core::DType::F32, &device)?),
        )
    }

    #[test]
    fn rejects_mismatched_lengths() -> Result<()> {
        let device = Device::Cpu;
        let res = Path::new(
            Tensor::ones((4, 3), candle_core::DType::F32, &device)?,
            Tensor::zeros((3, 2), candle_core::DType::F32, &device)?,
            vec![1.; 4],
            vec![false; 4],
            InfoMap::new(),
            InfoMap::new(),
        );
        assert!(res.is_err());
        Ok(())
    }

    #[test]
    fn concatenate_then_split_keeps_lengths() -> Result<()> {
        let paths = vec![path(3, 1.)?, path(5, 2.)?, path(2, 3.)?];
        let concatenated = ConcatenatedPath::from_paths(&paths, 0.9)?;
        assert_eq!(concatenated.len(), 10);
        assert_eq!(concatenated.lengths, vec![3, 5, 2]);
        assert_eq!(concatenated.lengths.iter().sum::<usize>(), concatenated.len());
        let split = concatenated.split()?;
        let lengths: Vec<usize> = split.iter().map(Path::len).collect();
        assert_eq!(lengths, vec![3, 5, 2]);
        assert_eq!(split[1].rewards, vec![2.; 5]);
        assert_eq!(split[1].undiscounted_return(), 10.);
        assert!(!split[1].terminated());
        Ok(())
    }

    #[test]
    fn task_ids_are_unique() -> Result<()> {
        let mut tasks = TaskPaths::new();
        tasks.insert(0, vec![path(2, 1.)?])?;
        assert!(tasks.insert(0, vec![path(2, 1.)?]).is_err());
        assert!(tasks.insert(1, vec![]).is_err());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.get(0).map(<[Path]>::len), Some(1));
        assert!(tasks.get(1).is_none());
        tasks.insert(1, vec![path(3, 1.)?, path(1, 1.)?])?;
        assert_eq!(tasks.num_paths(), 3);
        assert_eq!(tasks.total_steps(), 6);
        Ok(())
    }
}
