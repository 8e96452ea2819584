use candle_core::{DType, Device, Result, Tensor, bail};
use rl2_api::{
    builders::{
        agent::{AgentBuilder, AgentType},
        policy::PolicyBuilder,
        rl2::{Rl2Builder, Rl2Experiment},
    },
    logging::init_tracing,
    test_utils::{BernoulliBandit, PointGoal},
};
use rl2_core::{
    algorithm::{InnerAlgorithm, Rl2Hooks, TrainPhase},
    env::{Env, EnvironmentDescription, SnapShot, Space, TaskEnv},
    policies::Policy,
    processor::ProcessedSamples,
    rng,
};

fn small_builder(policy_builder: PolicyBuilder, agent_type: AgentType) -> Rl2Builder {
    Rl2Builder {
        meta_batch_size: 4,
        episodes_per_task: 3,
        max_path_length: 2,
        n_epochs: 3,
        policy_builder,
        agent_builder: AgentBuilder {
            agent_type,
            update_epochs: 2,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn gru_ppo_on_bandits() -> Result<()> {
    init_tracing();
    rng::seed(42);
    let builder = small_builder(PolicyBuilder::default(), AgentType::PPO { clip_range: 0.2 });
    let mut experiment = builder.build(BernoulliBandit::new(3, Device::Cpu))?;
    let average_return = experiment.train()?.expect("at least one epoch ran");
    assert!(average_return.is_finite());
    assert!((0. ..=1.).contains(&average_return));
    assert_eq!(experiment.algo.phase(), TrainPhase::Idle);
    assert_eq!(experiment.algo.state().step_itr, 3);

    let history = experiment.trainer.history();
    assert_eq!(history.len(), 3);
    for (epoch, row) in history.iter().enumerate() {
        // every bandit episode is a single step
        assert_eq!(row["TotalEnvSteps"], ((epoch + 1) * 4 * 3) as f64);
        assert_eq!(row["Evaluation/Iteration"], epoch as f64);
        assert_eq!(row["Evaluation/NumTrajs"], 12.);
        assert!((row["Perplexity"] - row["Entropy"].exp()).abs() < 1e-9);
        assert!((0. ..=100.).contains(&row["SuccessRate"]));
        assert!(row.contains_key("Extras/EpisodeRewardMean"));
        assert!(row.contains_key("PPO/LossBefore"));
    }
    Ok(())
}

#[test]
fn mlp_vpg_on_bandits() -> Result<()> {
    rng::seed(7);
    let builder = small_builder(
        PolicyBuilder::Mlp {
            hidden_layers: vec![16, 16],
        },
        AgentType::VPG,
    );
    let mut experiment = builder.build(BernoulliBandit::new(2, Device::Cpu))?;
    let average_return = experiment.train()?.expect("at least one epoch ran");
    assert!(average_return.is_finite());
    let last = experiment.trainer.history().last().expect("a dumped row");
    assert!(last.contains_key("VPG/LossAfter"));
    assert!(last["Evaluation/TerminationRate"] == 1.);
    Ok(())
}

#[test]
fn gaussian_mlp_on_point_goals() -> Result<()> {
    rng::seed(3);
    let builder = small_builder(
        PolicyBuilder::GaussianMlp {
            hidden_layers: vec![16],
            init_std: 1.,
        },
        AgentType::PPO { clip_range: 0.2 },
    );
    let mut experiment = builder.build(PointGoal::new(Device::Cpu))?;
    assert!(!experiment.algo.policy().recurrent());
    let average_return = experiment.train()?.expect("at least one epoch ran");
    assert!(average_return.is_finite() && average_return <= 0.);
    let last = experiment.trainer.history().last().expect("a dumped row");
    assert!(!last.contains_key("SuccessRate"));
    assert!(last["Entropy"].is_finite());
    Ok(())
}

#[test]
fn gaussian_policy_needs_continuous_actions() {
    let builder = small_builder(
        PolicyBuilder::GaussianMlp {
            hidden_layers: vec![8],
            init_std: 1.,
        },
        AgentType::VPG,
    );
    assert!(builder.build(BernoulliBandit::new(2, Device::Cpu)).is_err());
}

struct StopAfterFirstEpoch;

impl Rl2Hooks for StopAfterFirstEpoch {
    fn init_hook(&mut self) -> bool {
        false
    }

    fn post_epoch_hook(&mut self, _epoch: usize, _samples: &ProcessedSamples) -> bool {
        true
    }
}

struct SkipTraining;

impl Rl2Hooks for SkipTraining {
    fn init_hook(&mut self) -> bool {
        true
    }

    fn post_epoch_hook(&mut self, _epoch: usize, _samples: &ProcessedSamples) -> bool {
        false
    }
}

#[test]
fn hooks_stop_training() -> Result<()> {
    let builder = small_builder(PolicyBuilder::default(), AgentType::VPG);

    let Rl2Experiment { algo, mut trainer } = builder.build(BernoulliBandit::new(2, Device::Cpu))?;
    let mut algo = algo.with_hooks(StopAfterFirstEpoch);
    assert!(algo.train(&mut trainer)?.is_some());
    assert_eq!(trainer.history().len(), 1);
    assert_eq!(algo.phase(), TrainPhase::Idle);

    let Rl2Experiment { algo, mut trainer } = builder.build(BernoulliBandit::new(2, Device::Cpu))?;
    let mut algo = algo.with_hooks(SkipTraining);
    assert!(algo.train(&mut trainer)?.is_none());
    assert!(trainer.history().is_empty());
    Ok(())
}

#[test]
fn rejects_zero_sized_experiments() {
    let builder = Rl2Builder {
        episodes_per_task: 0,
        ..Default::default()
    };
    assert!(builder.build(BernoulliBandit::new(2, Device::Cpu)).is_err());
}

#[test]
fn inner_algorithm_sees_whole_tasks() -> Result<()> {
    let builder = small_builder(PolicyBuilder::default(), AgentType::VPG);
    let experiment = builder.build(BernoulliBandit::new(2, Device::Cpu))?;
    let processor = experiment.algo.processor();
    assert_eq!(processor.max_path_length, 2);
    assert_eq!(processor.meta_max_path_length, 6);
    assert_eq!(experiment.algo.max_path_length(), 2);
    assert_eq!(experiment.algo.inner_algo().max_path_length(), 6);
    assert!(experiment.algo.policy().recurrent());
    Ok(())
}

struct BrokenEnv;

impl Env for BrokenEnv {
    fn reset(&mut self, _seed: u64) -> Result<Tensor> {
        Tensor::zeros(1, DType::F32, &Device::Cpu)
    }

    fn step(&mut self, _action: &Tensor) -> Result<SnapShot> {
        bail!("simulator crashed")
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(Space::Continuous { size: 1 }, Space::Discrete(2))
    }
}

impl TaskEnv for BrokenEnv {
    type Task = ();

    fn sample_tasks(&mut self, n_tasks: usize) -> Vec<Self::Task> {
        vec![(); n_tasks]
    }

    fn set_task(&mut self, _task: &Self::Task) {}
}

#[test]
fn sampler_failures_reach_the_caller() -> Result<()> {
    let builder = small_builder(PolicyBuilder::default(), AgentType::VPG);
    let mut experiment = builder.build(BrokenEnv)?;
    let err = experiment.train().expect_err("the env fails on every step");
    assert!(err.to_string().contains("simulator crashed"));
    assert!(experiment.trainer.history().is_empty());
    assert_eq!(experiment.algo.state().step_itr, 0);
    assert_eq!(experiment.algo.phase(), TrainPhase::Idle);
    Ok(())
}
