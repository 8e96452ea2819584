pub mod categorical_gru_policy;
pub mod categorical_mlp_policy;
pub mod gaussian_mlp_policy;

use crate::{
    distributions::{DistributionKind, dist_info_value},
    path::InfoMap,
};
use candle_core::{Result, Tensor};
use categorical_gru_policy::CategoricalGruPolicy;
use categorical_mlp_policy::CategoricalMlpPolicy;
use enum_dispatch::enum_dispatch;
use gaussian_mlp_policy::GaussianMlpPolicy;

/// An extra per-step input a policy needs at training time, recorded in the agent infos while
/// sampling (e.g. the previous action of a recurrent policy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfoSpec {
    pub key: &'static str,
    pub shape: Vec<usize>,
}

#[enum_dispatch]
pub trait Policy {
    /// The distribution family whose parameters `dist_info` produces
    fn distribution(&self) -> &DistributionKind;

    fn recurrent(&self) -> bool;

    fn state_info_specs(&self) -> Vec<StateInfoSpec>;

    /// Resets the internal state of the rows flagged in `dones`. A batch size different from the
    /// previous one reallocates the state.
    fn reset(&mut self, dones: &[bool]) -> Result<()>;

    /// Samples actions for a `[B, obs_dim]` batch. Returns `[B, action_dim]` actions and the agent
    /// infos of the step.
    fn get_actions(&mut self, observations: &Tensor) -> Result<(Tensor, InfoMap)>;

    fn get_action(&mut self, observation: &Tensor) -> Result<(Tensor, InfoMap)> {
        let (actions, agent_infos) = self.get_actions(&observation.unsqueeze(0)?)?;
        let agent_infos = agent_infos
            .iter()
            .map(|(key, value)| Ok((key.clone(), value.squeeze(0)?)))
            .collect::<Result<InfoMap>>()?;
        Ok((actions.squeeze(0)?, agent_infos))
    }

    /// Differentiable distribution parameters for `[N, T, obs_dim]` observation sequences.
    fn dist_info(&self, observations: &Tensor, state_infos: &InfoMap) -> Result<InfoMap>;

    /// Picks the state infos this policy needs out of recorded agent infos.
    fn state_infos(&self, agent_infos: &InfoMap) -> Result<InfoMap> {
        self.state_info_specs()
            .iter()
            .map(|spec| {
                let value = dist_info_value(agent_infos, spec.key)?;
                Ok((spec.key.to_string(), value.clone()))
            })
            .collect()
    }
}

#[enum_dispatch(Policy)]
pub enum PolicyKind {
    CategoricalMlp(CategoricalMlpPolicy),
    GaussianMlp(GaussianMlpPolicy),
    CategoricalGru(CategoricalGruPolicy),
}
