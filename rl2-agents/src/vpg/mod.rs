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

/// Vanilla policy gradient over whole task sequences.
pub struct VPG<P: Policy> {
    pub policy: P,
    pub optimizer: OptimizerWithMaxGrad,
    pub discount: f32,
    pub max_path_length: usize,
    pub baseline: Baseline,
    pub center_adv: bool,
    pub entropy_coeff: f32,
    pub update_epochs: usize,
}

impl<P: Policy> VPG<P> {
    fn loss(&self, batch: &StackedBatch, advantages: &Tensor, state_infos: &InfoMap) -> Result<Tensor> {
        let dist_info = self.policy.dist_info(&batch.observations, state_infos)?;
        let distribution = self.policy.distribution();
        let logp = distribution.log_likelihood(&batch.actions, &dist_info)?;
        let surrogate = masked_mean(&logp.mul(advantages)?, &batch.valids)?;
        let entropy = masked_mean(&distribution.entropy(&dist_info)?, &batch.valids)?;
        surrogate
            .add(&entropy.affine(self.entropy_coeff as f64, 0.)?)?
            .neg()
    }
}

impl<P: Policy> InnerAlgorithm for VPG<P> {
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
        _itr: usize,
        samples: &ProcessedSamples,
        tabular: &mut dyn Tabular,
    ) -> Result<()> {
        let batch = &samples.meta;
        let advantages = compute_advantages(batch, self.baseline, self.center_adv)?.detach();
        let state_infos = self.policy.state_infos(&batch.agent_infos)?;
        let mut loss = self.loss(batch, &advantages, &state_infos)?;
        let loss_before = loss.to_scalar::<f32>()?;
        for _ in 0..self.update_epochs {
            self.optimizer.backward_step(&loss)?;
            loss = self.loss(batch, &advantages, &state_infos)?;
        }
        record_losses(tabular, "VPG", loss_before, loss.to_scalar::<f32>()?);
        Ok(())
    }
}
