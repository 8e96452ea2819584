use super::{Policy, StateInfoSpec};
use crate::{
    distributions::{Distribution, DistributionKind, diagonal_distribution::DiagGaussianDistribution},
    env::{EnvironmentDescription, Space},
    path::InfoMap,
    utils::build_sequential::build_sequential,
};
use candle_core::{Result, Tensor, bail};
use candle_nn::{Init, Module, Sequential, VarBuilder};

/// MLP mean with a learned, state independent log standard deviation.
pub struct GaussianMlpPolicy {
    mean_network: Sequential,
    log_std: Tensor,
    distribution: DistributionKind,
}

impl GaussianMlpPolicy {
    pub fn build(
        env_description: &EnvironmentDescription,
        hidden_layers: &[usize],
        init_std: f32,
        vb: &VarBuilder,
    ) -> Result<Self> {
        if !matches!(env_description.action_space, Space::Continuous { .. }) {
            bail!(
                "gaussian policies need a continuous action space, got {:?}",
                env_description.action_space
            );
        }
        if init_std <= 0. {
            bail!("initial standard deviation has to be positive, got {init_std}");
        }
        let action_size = env_description.action_size();
        let layers = hidden_layers
            .iter()
            .copied()
            .chain(std::iter::once(action_size))
            .collect::<Vec<_>>();
        let mean_network =
            build_sequential(env_description.observation_size(), &layers, vb, "mean")?;
        let log_std = vb.get_with_hints(
            action_size,
            "log_std",
            Init::Const(init_std.ln() as f64),
        )?;
        Ok(Self {
            mean_network,
            log_std,
            distribution: DistributionKind::DiagGaussian(DiagGaussianDistribution::new(
                action_size,
            )),
        })
    }

    fn dist_params(&self, observations: &Tensor) -> Result<InfoMap> {
        let mean = self.mean_network.forward(observations)?;
        let log_std = self.log_std.broadcast_as(mean.shape())?.contiguous()?;
        Ok(InfoMap::new().with("mean", mean).with("log_std", log_std))
    }
}

impl Policy for GaussianMlpPolicy {
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
        let agent_infos = self
            .dist_params(observations)?
            .iter()
            .map(|(key, value)| (key.clone(), value.detach()))
            .collect::<InfoMap>();
        let actions = self.distribution.sample(&agent_infos)?;
        Ok((actions, agent_infos))
    }

    fn dist_info(&self, observations: &Tensor, _state_infos: &InfoMap) -> Result<InfoMap> {
        self.dist_params(observations)
    }
}
