use crate::path::InfoMap;
use candle_core::{Result, Tensor, bail};

/// Discounted cumulative sum, `ret[t] = x[t] + discount * ret[t + 1]`.
pub fn discount_cumsum(x: &[f32], discount: f32) -> Vec<f32> {
    let mut returns = vec![0.; x.len()];
    let mut running = 0f32;
    for (i, r) in x.iter().enumerate().rev() {
        running = r + discount * running;
        returns[i] = running;
    }
    returns
}

/// Zero pads `t` along the first dimension up to `max_len`.
pub fn pad_tensor(t: &Tensor, max_len: usize) -> Result<Tensor> {
    let len = t.dim(0)?;
    if len > max_len {
        bail!("cannot pad a tensor of length {len} to max length {max_len}");
    }
    t.pad_with_zeros(0, 0, max_len - len)
}

pub fn pad_tensor_n(xs: &[Tensor], max_len: usize) -> Result<Tensor> {
    let padded = xs
        .iter()
        .map(|x| pad_tensor(x, max_len))
        .collect::<Result<Vec<_>>>()?;
    Tensor::stack(&padded, 0)
}

fn check_same_keys<'a>(maps: impl IntoIterator<Item = &'a InfoMap>) -> Result<()> {
    let mut maps = maps.into_iter();
    let Some(first) = maps.next() else {
        return Ok(());
    };
    for other in maps {
        if !first.same_keys(other) {
            bail!(
                "info keys differ: {:?} vs {:?}",
                first.keys().collect::<Vec<_>>(),
                other.keys().collect::<Vec<_>>()
            );
        }
    }
    Ok(())
}

/// Concatenates info maps along the time axis.
pub fn concat_tensor_dict_list(maps: &[&InfoMap]) -> Result<InfoMap> {
    check_same_keys(maps.iter().copied())?;
    let Some(first) = maps.first() else {
        return Ok(InfoMap::new());
    };
    first
        .keys()
        .map(|key| {
            let values = maps.iter().map(|m| &m[key]).collect::<Vec<_>>();
            Ok((key.clone(), Tensor::cat(&values, 0)?))
        })
        .collect()
}

/// Stacks per-step info maps into a single map with a leading time axis.
pub fn stack_tensor_dict_list(maps: &[InfoMap]) -> Result<InfoMap> {
    check_same_keys(maps)?;
    let Some(first) = maps.first() else {
        return Ok(InfoMap::new());
    };
    first
        .keys()
        .map(|key| {
            let values = maps.iter().map(|m| &m[key]).collect::<Vec<_>>();
            Ok((key.clone(), Tensor::stack(&values, 0)?))
        })
        .collect()
}

/// Pads every value of every map to `max_len` and stacks them along a new leading dimension.
pub fn stack_and_pad_tensor_dict(maps: &[&InfoMap], max_len: usize) -> Result<InfoMap> {
    check_same_keys(maps.iter().copied())?;
    let Some(first) = maps.first() else {
        return Ok(InfoMap::new());
    };
    first
        .keys()
        .map(|key| {
            let values = maps.iter().map(|m| m[key].clone()).collect::<Vec<_>>();
            Ok((key.clone(), pad_tensor_n(&values, max_len)?))
        })
        .collect()
}
