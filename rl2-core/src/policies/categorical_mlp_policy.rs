use super::{Policy, StateInfoSpec};
use crate::{
    distributions::{Distribution, DistributionKind, categorical_distribution::CategoricalDistribution},
    env::{EnvironmentDescription, Space},
    path::InfoMap,
    utils::build_sequential::build_sequential,
};
use candle_core::{D, Result, Tensor, bail};
use candle_nn::{Module, Sequential, VarBuilder, ops::softmax};

pub struct CategoricalMlpPolicy {
    prob_network: Sequential,
    distribution: DistributionKind,
}

impl CategoricalMlpPolicy {
    pub fn build(
        env_description: &EnvironmentDescription,
        hidden_layers: &[usize],
        vb: &VarBuilder,
    ) -> Result<Self> {
        if !matches!(env_description.action_space, Space::Discrete(_)) {
            bail!(
                "categorical policies need a discrete action space, got {:?}",
                env_description.action_space
            );
        }
        let action_size = env_description.action_size();
        let layers = hidden_layers
            .iter()
            .copied()
            .chain(std::iter::once(action_size))
            .collect::<Vec<_>>();
        let prob_network =
            build_sequential(env_description.observation_size(), &layers, vb, "prob")?;
        Ok(Self {
            prob_network,
            distribution: DistributionKind::Categorical(CategoricalDistribution::new(action_size)),
        })
    }

    fn prob(&self, observations: &Tensor) -> Result<Tensor> {
        softmax(&self.prob_network.forward(observations)?, D::Minus1)
    }
}

impl Policy for CategoricalMlpPolicy {
    fn distribution(&self) -> &DistributionKind {
        &self.distribution
    }

    fn recurrent(&self) -> bool {
        false
    }

    fn state_info_specs(&self) -> Vec<StateInfoSpec> {
        vec![]
    }

    fn reset(&mut self, _dones: &[bool]) -> Result<()> {
        Ok(())
    }

    fn get_actions(&mut self, observations: &Tensor) -> Result<(Tensor, InfoMap)> {
        let prob = self.prob(observations)?.detach();
        let agent_infos = InfoMap::new().with("prob", prob);
        let actions = self.distribution.sample(&agent_infos)?;
        Ok((actions, agent_infos))
    }

    fn dist_info(&self, observations: &Tensor, _state_infos: &InfoMap) -> Result<InfoMap> {
        Ok(InfoMap::new().with("prob", self.prob(observations)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn batched_and_sequence_shapes() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let env = EnvironmentDescription::new(Space::Continuous { size: 3 }, Space::Discrete(2));
        let mut policy = CategoricalMlpPolicy::build(&env, &[8, 8], &vb)?;
        assert!(!policy.recurrent());

        let (actions, infos) = policy.get_actions(&Tensor::ones((4, 3), DType::F32, &device)?)?;
        assert_eq!(actions.dims(), &[4, 2]);
        assert_eq!(infos["prob"].dims(), &[4, 2]);

        let (action, infos) = policy.get_action(&Tensor::ones(3, DType::F32, &device)?)?;
        assert_eq!(action.dims(), &[2]);
        assert_eq!(infos["prob"].dims(), &[2]);

        let dist_info = policy.dist_info(&Tensor::ones((2, 5, 3), DType::F32, &device)?, &InfoMap::new())?;
        assert_eq!(dist_info["prob"].dims(), &[2, 5, 2]);
        let total: f32 = dist_info["prob"].sum_all()?.to_scalar()?;
        assert!((total - 10.).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn rejects_continuous_actions() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let env = EnvironmentDescription::new(
            Space::Continuous { size: 3 },
            Space::Continuous { size: 2 },
        );
        assert!(CategoricalMlpPolicy::build(&env, &[8], &vb).is_err());
    }
}
