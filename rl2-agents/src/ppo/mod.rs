use crate::{
    baseline::{Baseline, compute_advantages},
    masked_mean, record_losses,
};
use candle_core::{Result, Tensor};
use rl2_core::{
    algorithm::InnerAlgorithm,
    distributions::Distribution,
    path::InfoMap,
    policies::Policy,
    processor::{ProcessedSamples, StackedBatch},
    tabular::Tabular,
    utils::clip_grad::OptimizerWithMaxGrad,
};
use tracing::debug;

/// Inputs of the surrogate that stay fixed during one optimisation round.
struct SurrogateInputs<'a> {
    batch: &'a StackedBatch,
    advantages: Tensor,
    logp_old: Tensor,
    state_infos: InfoMap,
}

/// Clipped surrogate PPO over whole task sequences. The likelihoods of the sampling policy come
/// from the agent infos recorded at collection time.
pub struct PPO<P: Policy> {
    pub policy: P,
    pub optimizer: OptimizerWithMaxGrad,
    pub clip_range: f32,
    pub discount: f32,
    pub max_path_length: usize,
    pub baseline: Baseline,
    pub center_adv: bool,
    pub entropy_coeff: f32,
    pub update_epochs: usize,
}

impl<P: Policy> PPO<P> {
    fn loss(&self, inputs: &SurrogateInputs) -> Result<Tensor> {
        let batch = inputs.batch;
        let dist_info = self.policy.dist_info(&batch.observations, &inputs.state_infos)?;
        let distribution = self.policy.distribution();
        let logp = distribution.log_likelihood(&batch.actions, &dist_info)?;
        let ratio = logp.sub(&inputs.logp_old)?.exp()?;
        let clip_adv = ratio
            .clamp(1. - self.clip_range, 1. + self.clip_range)?
            .mul(&inputs.advantages)?;
        let surrogate = Tensor::minimum(&ratio.mul(&inputs.advantages)?, &clip_adv)?;
        let surrogate = masked_mean(&surrogate, &batch.valids)?;
        let entropy = masked_mean(&distribution.entropy(&dist_info)?, &batch.valids)?;
        surrogate
            .add(&entropy.affine(self.entropy_coeff as f64, 0.)?)?
            .neg()
    }
}

impl<P: Policy> InnerAlgorithm for PPO<P> {
    type Policy = P;

    fn policy(&self) -> &P {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    fn discount(&self) -> f32 {
        self.discount
    }

    fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    fn optimize_policy(
        &mut self,
        itr: usize,
        samples: &ProcessedSamples,
        tabular: &mut dyn Tabular,
    ) -> Result<()> {
        let batch = &samples.meta;
        let inputs = SurrogateInputs {
            batch,
            advantages: compute_advantages(batch, self.baseline, self.center_adv)?.detach(),
            logp_old: self
                .policy
                .distribution()
                .log_likelihood(&batch.actions, &batch.agent_infos)?
                .detach(),
            state_infos: self.policy.state_infos(&batch.agent_infos)?,
        };
        let mut loss = self.loss(&inputs)?;
        let loss_before = loss.to_scalar::<f32>()?;
        for epoch in 0..self.update_epochs {
            self.optimizer.backward_step(&loss)?;
            loss = self.loss(&inputs)?;
            debug!(itr, epoch, loss = loss.to_scalar::<f32>()?, "ppo update");
        }
        record_losses(tabular, "PPO", loss_before, loss.to_scalar::<f32>()?);
        Ok(())
    }
}
