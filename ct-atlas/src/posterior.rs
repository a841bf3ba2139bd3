//! 结构后验概率计算.

use crate::error::InvalidInputError;
use crate::volume::StructureSet;
use ndarray::{Array3, Zip};

/// 计算每个结构的后验概率 `likelihood * prior / normalization` (逐体素).
///
/// 三个集合必须具有相同的结构个数和体积形状, 且所有归一化体积处处非零,
/// 否则返回 `Err`, 并报告第一个为零的位置.
///
/// # 注意
///
/// 该函数不做任何平滑, 截断或重新归一化. 若输入不能构成合法概率,
/// 输出可能超出 `[0, 1]`, 结果按原样返回.
pub fn compute_posteriors<F: num::Float>(
    likelihoods: &StructureSet<F>,
    priors: &StructureSet<F>,
    normalization: &StructureSet<F>,
) -> Result<StructureSet<F>, InvalidInputError> {
    likelihoods.ensure_compatible(priors)?;
    likelihoods.ensure_compatible(normalization)?;

    for (structure, n) in normalization.iter().enumerate() {
        if let Some((index, _)) = n.indexed_iter().find(|(_, v)| v.is_zero()) {
            return Err(InvalidInputError::ZeroNormalization { structure, index });
        }
    }

    let posteriors = likelihoods
        .iter()
        .zip(priors)
        .zip(normalization)
        .map(|((l, p), n)| {
            let mut out = Array3::<F>::zeros(l.raw_dim());
            Zip::from(&mut out)
                .and(l)
                .and(p)
                .and(n)
                .for_each(|o, &l, &p, &n| *o = l * p / n);
            out
        })
        .collect();
    StructureSet::new(posteriors)
}
