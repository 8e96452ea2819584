use super::{Distribution, dist_info_value};
use crate::path::InfoMap;
use candle_core::{D, Result, Tensor};
use std::f64::consts::{E, PI};

#[derive(Debug, Clone)]
pub struct DiagGaussianDistribution {
    dim: usize,
}

impl DiagGaussianDistribution {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Distribution for DiagGaussianDistribution {
    fn entropy(&self, dist_info: &InfoMap) -> Result<Tensor> {
        let log_std = dist_info_value(dist_info, "log_std")?;
        (log_std + (2. * PI * E).sqrt().ln())?.sum(D::Minus1)
    }

    fn log_likelihood(&self, actions: &Tensor, dist_info: &InfoMap) -> Result<Tensor> {
        let mean = dist_info_value(dist_info, "mean")?;
        let log_std = dist_info_value(dist_info, "log_std")?;
        let z = actions.sub(mean)?.div(&log_std.exp()?)?;
        let quad = (z.sqr()?.sum(D::Minus1)? * -0.5)?;
        let norm = log_std.sum(D::Minus1)?;
        quad.sub(&norm)? - 0.5 * self.dim as f64 * (2. * PI).ln()
    }

    fn sample(&self, dist_info: &InfoMap) -> Result<Tensor> {
        let mean = dist_info_value(dist_info, "mean")?;
        let log_std = dist_info_value(dist_info, "log_std")?;
        let noise = mean.randn_like(0., 1.)?;
        mean.add(&noise.mul(&log_std.exp()?)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn standard_normal_entropy_and_likelihood() -> Result<()> {
        let dist = DiagGaussianDistribution::new(2);
        let info = InfoMap::new()
            .with("mean", Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?)
            .with("log_std", Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?);
        let entropy: Vec<f32> = dist.entropy(&info)?.to_vec1()?;
        let expected = 2. * 0.5 * (2. * PI * E).ln() as f32;
        assert!((entropy[0] - expected).abs() < 1e-5);

        let actions = Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?;
        let logp: Vec<f32> = dist.log_likelihood(&actions, &info)?.to_vec1()?;
        assert!((logp[0] + (2. * PI).ln() as f32).abs() < 1e-5);
        Ok(())
    }
}
