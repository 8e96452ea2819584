use crate::{path::Path, tabular::Tabular, utils::tensor_utils::discount_cumsum};
use candle_core::{DType, Result, Tensor, bail};

/// Mean of `values` over the steps where `valids` is one.
pub fn masked_mean(values: &Tensor, valids: &Tensor) -> Result<f32> {
    let total = values.mul(valids)?.sum_all()?.to_scalar::<f32>()?;
    let count = valids.sum_all()?.to_scalar::<f32>()?;
    if count == 0. {
        bail!("masked mean over a batch without valid steps");
    }
    Ok(total / count)
}

/// Records return statistics of individual paths and returns their undiscounted returns.
pub fn log_performance(
    itr: usize,
    paths: &[&Path],
    discount: f32,
    tabular: &mut dyn Tabular,
) -> Vec<f32> {
    let undiscounted_returns: Vec<f32> = paths.iter().map(|p| p.undiscounted_return()).collect();
    let discounted_returns: Vec<f32> = paths
        .iter()
        .map(|p| {
            discount_cumsum(&p.rewards, discount)
                .first()
                .copied()
                .unwrap_or(0.)
        })
        .collect();
    let terminations = paths.iter().filter(|p| p.terminated()).count();

    let n = undiscounted_returns.len().max(1) as f64;
    let mean = undiscounted_returns.iter().map(|r| *r as f64).sum::<f64>() / n;
    let variance = undiscounted_returns
        .iter()
        .map(|r| (*r as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let max = undiscounted_returns
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let min = undiscounted_returns
        .iter()
        .copied()
        .fold(f32::INFINITY, f32::min);

    tabular.record("Iteration", itr as f64);
    tabular.record("NumTrajs", paths.len() as f64);
    tabular.record(
        "AverageDiscountedReturn",
        discounted_returns.iter().map(|r| *r as f64).sum::<f64>() / n,
    );
    tabular.record("AverageReturn", mean);
    tabular.record("StdReturn", variance.sqrt());
    tabular.record("MaxReturn", max as f64);
    tabular.record("MinReturn", min as f64);
    tabular.record("TerminationRate", terminations as f64 / n);
    undiscounted_returns
}

/// Percentage of paths whose last step reports `success`. `None` when the paths carry no
/// `success` env info; the first path decides, as stacking already enforces equal info keys.
pub fn success_rate<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Option<f64>> {
    let paths = paths.into_iter().collect::<Vec<_>>();
    let Some(first) = paths.first() else {
        return Ok(None);
    };
    if !first.env_infos.contains_key("success") {
        return Ok(None);
    }
    let mut successes = 0f64;
    for path in paths.iter() {
        let Some(success) = path.env_infos.get("success") else {
            bail!("path is missing the `success` env info");
        };
        let last = success
            .get(success.dim(0)? - 1)?
            .flatten_all()?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;
        successes += last.first().copied().unwrap_or(0.) as f64;
    }
    Ok(Some(successes * 100. / paths.len() as f64))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{path::InfoMap, tabular::TabularLog};
    use candle_core::Device;

    fn path_with_success(success: &[f32]) -> Result<Path> {
        let device = Device::Cpu;
        let len = success.len();
        Path::new(
            Tensor::zeros((len, 1), DType::F32, &device)?,
            Tensor::zeros((len, 1), DType::F32, &device)?,
            vec![1.; len],
            vec![false; len],
            InfoMap::new().with("success", Tensor::new(success, &device)?),
            InfoMap::new(),
        )
    }

    #[test]
    fn success_rate_uses_last_step() -> Result<()> {
        let paths = vec![
            path_with_success(&[0., 1.])?,
            path_with_success(&[1., 0.])?,
            path_with_success(&[0., 0., 1.])?,
        ];
        let rate = success_rate(paths.iter())?.expect("success info present");
        assert!((rate - 66.67).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn success_rate_absent_without_info() -> Result<()> {
        let device = Device::Cpu;
        let path = Path::new(
            Tensor::zeros((1, 1), DType::F32, &device)?,
            Tensor::zeros((1, 1), DType::F32, &device)?,
            vec![1.],
            vec![true],
            InfoMap::new(),
            InfoMap::new(),
        )?;
        assert_eq!(success_rate([&path])?, None);
        Ok(())
    }

    #[test]
    fn performance_statistics() -> Result<()> {
        let short = path_with_success(&[0., 0.])?;
        let long = path_with_success(&[0., 0., 0., 0.])?;
        let mut log = TabularLog::new();
        let returns = log_performance(3, &[&short, &long], 0.5, &mut log);
        assert_eq!(returns, vec![2., 4.]);
        assert_eq!(log.get("Iteration"), Some(3.));
        assert_eq!(log.get("NumTrajs"), Some(2.));
        assert_eq!(log.get("AverageReturn"), Some(3.));
        assert_eq!(log.get("StdReturn"), Some(1.));
        assert_eq!(log.get("MaxReturn"), Some(4.));
        assert_eq!(log.get("MinReturn"), Some(2.));
        assert_eq!(log.get("TerminationRate"), Some(0.));
        // (1 + 0.5) and (1 + 0.5 + 0.25 + 0.125)
        assert_eq!(log.get("AverageDiscountedReturn"), Some((1.5 + 1.875) / 2.));
        Ok(())
    }

    #[test]
    fn masked_mean_ignores_padding() -> Result<()> {
        let device = Device::Cpu;
        let values = Tensor::new(&[[1f32, 3., 100.], [2., 100., 100.]], &device)?;
        let valids = Tensor::new(&[[1f32, 1., 0.], [1., 0., 0.]], &device)?;
        assert_eq!(masked_mean(&values, &valids)?, 2.);
        Ok(())
    }
}
