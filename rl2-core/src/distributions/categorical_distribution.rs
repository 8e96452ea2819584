use super::{Distribution, TINY, dist_info_value};
use crate::{path::InfoMap, rng::with_rng};
use candle_core::{D, Error, Result, Tensor};
use rand::distr::Distribution as RandDistribution;
use rand::distr::weighted::WeightedIndex;

#[derive(Debug, Clone)]
pub struct CategoricalDistribution {
    action_size: usize,
}

impl CategoricalDistribution {
    pub fn new(action_size: usize) -> Self {
        Self { action_size }
    }
}

impl Distribution for CategoricalDistribution {
    fn entropy(&self, dist_info: &InfoMap) -> Result<Tensor> {
        let prob = dist_info_value(dist_info, "prob")?;
        prob.mul(&(prob + TINY)?.log()?)?.sum(D::Minus1)?.neg()
    }

    fn log_likelihood(&self, actions: &Tensor, dist_info: &InfoMap) -> Result<Tensor> {
        let prob = dist_info_value(dist_info, "prob")?;
        (actions.mul(prob)?.sum(D::Minus1)? + TINY)?.log()
    }

    fn sample(&self, dist_info: &InfoMap) -> Result<Tensor> {
        let prob = dist_info_value(dist_info, "prob")?;
        let probs: Vec<Vec<f32>> = prob.to_vec2()?;
        let mut actions = vec![0f32; probs.len() * self.action_size];
        for (row, p) in probs.iter().enumerate() {
            let weighted = WeightedIndex::new(p).map_err(Error::wrap)?;
            let action = with_rng(|rng| weighted.sample(rng));
            actions[row * self.action_size + action] = 1.;
        }
        Tensor::from_vec(actions, (probs.len(), self.action_size), prob.device())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;

    #[test]
    fn uniform_entropy() -> Result<()> {
        let dist = CategoricalDistribution::new(4);
        let prob = Tensor::full(0.25f32, (2, 4), &Device::Cpu)?;
        let entropy: Vec<f32> = dist.entropy(&InfoMap::new().with("prob", prob))?.to_vec1()?;
        for e in entropy {
            assert!((e - 4f32.ln()).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn padded_steps_have_finite_entropy() -> Result<()> {
        let dist = CategoricalDistribution::new(3);
        let prob = Tensor::zeros((1, 3), candle_core::DType::F32, &Device::Cpu)?;
        let entropy: Vec<f32> = dist.entropy(&InfoMap::new().with("prob", prob))?.to_vec1()?;
        assert_eq!(entropy, vec![0.]);
        Ok(())
    }

    #[test]
    fn samples_are_one_hot() -> Result<()> {
        let dist = CategoricalDistribution::new(3);
        let prob = Tensor::new(&[[0f32, 1., 0.], [1., 0., 0.]], &Device::Cpu)?;
        let info = InfoMap::new().with("prob", prob);
        let actions: Vec<Vec<f32>> = dist.sample(&info)?.to_vec2()?;
        assert_eq!(actions, vec![vec![0., 1., 0.], vec![1., 0., 0.]]);
        let logp: Vec<f32> = dist
            .log_likelihood(&Tensor::new(&[[0f32, 1., 0.], [1., 0., 0.]], &Device::Cpu)?, &info)?
            .to_vec1()?;
        assert!(logp.iter().all(|l| l.abs() < 1e-6));
        Ok(())
    }
}
