use candle_core::{Result, Tensor};
use rl2_core::processor::StackedBatch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Baseline {
    Zero,
    /// Mean return of each time step over the rows that are still valid at that step
    #[default]
    TimeMean,
}

impl Baseline {
    pub fn predict(&self, returns: &Tensor, valids: &Tensor) -> Result<Tensor> {
        match self {
            Self::Zero => returns.zeros_like(),
            Self::TimeMean => {
                let sums = returns.mul(valids)?.sum_keepdim(0)?;
                let counts = valids.sum_keepdim(0)?.maximum(1f32)?;
                sums.div(&counts)?.broadcast_as(returns.shape())?.contiguous()
            }
        }
    }
}

/// `returns - baseline` on valid steps, zero on padding. With `center_adv` the advantages are
/// normalised to zero mean and unit variance over the valid steps.
pub fn compute_advantages(
    batch: &StackedBatch,
    baseline: Baseline,
    center_adv: bool,
) -> Result<Tensor> {
    let valids = &batch.valids;
    let advantages = batch
        .returns
        .sub(&baseline.predict(&batch.returns, valids)?)?
        .mul(valids)?;
    if !center_adv {
        return Ok(advantages);
    }
    let count = valids.sum_all()?;
    let mean = advantages.sum_all()?.div(&count)?;
    let centered = advantages.broadcast_sub(&mean)?.mul(valids)?;
    let std = (centered.sqr()?.sum_all()?.div(&count)?.sqrt()? + 1e-8)?;
    centered.broadcast_div(&std)
}

#[cfg(test)]
mod test {
    use super::Baseline;
    use candle_core::{Device, Result, Tensor};

    #[test]
    fn time_mean_skips_padding() -> Result<()> {
        let device = Device::Cpu;
        let returns = Tensor::new(&[[2f32, 4., 0.], [4., 0., 0.]], &device)?;
        let valids = Tensor::new(&[[1f32, 1., 0.], [1., 0., 0.]], &device)?;
        let baseline: Vec<Vec<f32>> = Baseline::TimeMean.predict(&returns, &valids)?.to_vec2()?;
        assert_eq!(baseline, vec![vec![3., 4., 0.], vec![3., 4., 0.]]);
        Ok(())
    }
}
