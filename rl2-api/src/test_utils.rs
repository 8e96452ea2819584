use candle_core::{DType, Device, Result, Tensor, bail};
use rand::Rng;
use rl2_core::{
    env::{Env, EnvironmentDescription, SnapShot, Space, TaskEnv},
    path::{InfoMap, Path},
    rng::with_rng,
};

/// Multi armed bandit with one step episodes. A task is the vector of arm success probabilities,
/// so the best arm changes from task to task and has to be found by exploring.
pub struct BernoulliBandit {
    n_arms: usize,
    arm_probs: Vec<f32>,
    device: Device,
}

impl BernoulliBandit {
    pub fn new(n_arms: usize, device: Device) -> Self {
        Self {
            n_arms,
            arm_probs: vec![0.5; n_arms],
            device,
        }
    }

    fn observation(&self) -> Result<Tensor> {
        Tensor::ones(1, DType::F32, &self.device)
    }
}

impl Env for BernoulliBandit {
    fn reset(&mut self, _seed: u64) -> Result<Tensor> {
        self.observation()
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot> {
        let arm = action.flatten_all()?.argmax(0)?.to_scalar::<u32>()? as usize;
        let Some(prob) = self.arm_probs.get(arm) else {
            bail!("arm {arm} out of range for {} arms", self.n_arms);
        };
        let pulled = with_rng(|rng| rng.random::<f32>()) < *prob;
        let reward = if pulled { 1. } else { 0. };
        Ok(SnapShot {
            state: self.observation()?,
            reward,
            terminated: true,
            truncated: false,
            env_info: InfoMap::new().with("success", Tensor::new(reward, &self.device)?),
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(Space::Continuous { size: 1 }, Space::Discrete(self.n_arms))
    }
}

impl TaskEnv for BernoulliBandit {
    type Task = Vec<f32>;

    fn sample_tasks(&mut self, n_tasks: usize) -> Vec<Self::Task> {
        with_rng(|rng| {
            (0..n_tasks)
                .map(|_| (0..self.n_arms).map(|_| rng.random::<f32>()).collect())
                .collect()
        })
    }

    fn set_task(&mut self, task: &Self::Task) {
        self.arm_probs = task.clone();
    }
}

/// One step episodes on a line. A task is a goal position and the reward is the negative
/// squared distance between the action and the goal.
pub struct PointGoal {
    goal: f32,
    device: Device,
}

impl PointGoal {
    pub fn new(device: Device) -> Self {
        Self { goal: 0., device }
    }
}

impl Env for PointGoal {
    fn reset(&mut self, _seed: u64) -> Result<Tensor> {
        Tensor::zeros(1, DType::F32, &self.device)
    }

    fn step(&mut self, action: &Tensor) -> Result<SnapShot> {
        let position = action.flatten_all()?.get(0)?.to_scalar::<f32>()?;
        Ok(SnapShot {
            state: Tensor::new(&[position], &self.device)?,
            reward: -(position - self.goal).powi(2),
            terminated: true,
            truncated: false,
            env_info: InfoMap::new(),
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(Space::Continuous { size: 1 }, Space::Continuous { size: 1 })
    }
}

impl TaskEnv for PointGoal {
    type Task = f32;

    fn sample_tasks(&mut self, n_tasks: usize) -> Vec<Self::Task> {
        with_rng(|rng| (0..n_tasks).map(|_| rng.random_range(-1f32..1.)).collect())
    }

    fn set_task(&mut self, task: &Self::Task) {
        self.goal = *task;
    }
}

/// A path over a two dimensional observation and two actions, with a uniform `prob` agent info.
/// `success` adds a per-step success env info that is one only on the last step when set.
pub fn fixture_path(rewards: &[f32], success: Option<bool>) -> Result<Path> {
    let device = Device::Cpu;
    let len = rewards.len();
    let observations = Tensor::arange(0f32, (len * 2) as f32, &device)?.reshape((len, 2))?;
    let actions = Tensor::cat(
        &[
            Tensor::ones((len, 1), DType::F32, &device)?,
            Tensor::zeros((len, 1), DType::F32, &device)?,
        ],
        1,
    )?;
    let mut dones = vec![false; len];
    if let Some(last) = dones.last_mut() {
        *last = true;
    }
    let env_infos = match success {
        Some(success) => {
            let mut flags = vec![0f32; len];
            if let Some(last) = flags.last_mut() {
                *last = if success { 1. } else { 0. };
            }
            InfoMap::new().with("success", Tensor::from_vec(flags, len, &device)?)
        }
        None => InfoMap::new(),
    };
    let agent_infos = InfoMap::new().with("prob", Tensor::full(0.5f32, (len, 2), &device)?);
    Path::new(
        observations,
        actions,
        rewards.to_vec(),
        dones,
        env_infos,
        agent_infos,
    )
}
