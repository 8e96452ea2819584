pub mod baseline;
pub mod ppo;
pub mod vpg;

use crate::{ppo::PPO, vpg::VPG};
use candle_core::{Result, Tensor};
use rl2_core::{
    algorithm::InnerAlgorithm, policies::PolicyKind, processor::ProcessedSamples,
    tabular::Tabular,
};

pub enum AgentKind {
    PPO(PPO<PolicyKind>),
    VPG(VPG<PolicyKind>),
}

impl InnerAlgorithm for AgentKind {
    type Policy = PolicyKind;

    fn policy(&self) -> &Self::Policy {
        match self {
            Self::PPO(ppo) => ppo.policy(),
            Self::VPG(vpg) => vpg.policy(),
        }
    }

    fn policy_mut(&mut self) -> &mut Self::Policy {
        match self {
            Self::PPO(ppo) => ppo.policy_mut(),
            Self::VPG(vpg) => vpg.policy_mut(),
        }
    }

    fn discount(&self) -> f32 {
        match self {
            Self::PPO(ppo) => ppo.discount(),
            Self::VPG(vpg) => vpg.discount(),
        }
    }

    fn max_path_length(&self) -> usize {
        match self {
            Self::PPO(ppo) => ppo.max_path_length(),
            Self::VPG(vpg) => vpg.max_path_length(),
        }
    }

    fn optimize_policy(
        &mut self,
        itr: usize,
        samples: &ProcessedSamples,
        tabular: &mut dyn Tabular,
    ) -> Result<()> {
        match self {
            Self::PPO(ppo) => ppo.optimize_policy(itr, samples, tabular),
            Self::VPG(vpg) => vpg.optimize_policy(itr, samples, tabular),
        }
    }
}

/// Differentiable mean of `values` over valid steps.
pub(crate) fn masked_mean(values: &Tensor, valids: &Tensor) -> Result<Tensor> {
    values.mul(valids)?.sum_all()?.div(&valids.sum_all()?)
}

pub(crate) fn record_losses(tabular: &mut dyn Tabular, name: &str, before: f32, after: f32) {
    tabular.record(&format!("{name}/LossBefore"), before as f64);
    tabular.record(&format!("{name}/LossAfter"), after as f64);
    tabular.record(&format!("{name}/dLoss"), (before - after) as f64);
}
