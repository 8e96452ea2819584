pub mod categorical_distribution;
pub mod diagonal_distribution;

use crate::path::InfoMap;
use candle_core::{Result, Tensor, bail};
use categorical_distribution::CategoricalDistribution;
use diagonal_distribution::DiagGaussianDistribution;
use enum_dispatch::enum_dispatch;

/// Keeps `log(0)` finite on zero padded steps.
pub const TINY: f64 = 1e-8;

/// A parameter free distribution family. The parameters of a concrete distribution are passed in
/// as dist infos (e.g. `prob` for categorical), which is what policies record as agent infos.
/// Reductions are over the last dimension, so `[N, T, dim]` infos give `[N, T]` results.
#[enum_dispatch]
pub trait Distribution {
    fn entropy(&self, dist_info: &InfoMap) -> Result<Tensor>;

    fn log_likelihood(&self, actions: &Tensor, dist_info: &InfoMap) -> Result<Tensor>;

    /// Samples one action per row of `[B, dim]` dist infos.
    fn sample(&self, dist_info: &InfoMap) -> Result<Tensor>;
}

#[enum_dispatch(Distribution)]
#[derive(Debug, Clone)]
pub enum DistributionKind {
    Categorical(CategoricalDistribution),
    DiagGaussian(DiagGaussianDistribution),
}

pub(crate) fn dist_info_value<'a>(dist_info: &'a InfoMap, key: &str) -> Result<&'a Tensor> {
    match dist_info.get(key) {
        Some(value) => Ok(value),
        None => bail!("dist info `{key}` is missing"),
    }
}
