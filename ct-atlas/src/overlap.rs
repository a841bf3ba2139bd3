//! 多结构标签冲突消解.
//!
//! 各结构独立分割, 同一体素可能被多个结构同时标记. 冲突体素只保留后验概率最大的结构.

use crate::consts::gray::{is_foreground, BACKGROUND, FOREGROUND};
use crate::error::InvalidInputError;
use crate::volume::{ensure_shape, LabelVolume, Volume};
use crate::Idx3d;

/// 检查标签与后验的结构个数, 形状一致, 返回共同形状.
fn check_inputs(labels: &[LabelVolume], posteriors: &[Volume]) -> Result<Idx3d, InvalidInputError> {
    let Some(first) = labels.first() else {
        return Err(InvalidInputError::EmptyStructureSet);
    };
    if labels.len() != posteriors.len() {
        return Err(InvalidInputError::LengthMismatch {
            expected: labels.len(),
            found: posteriors.len(),
        });
    }
    let shape = first.dim();
    for l in labels.iter().skip(1) {
        ensure_shape(shape, l.dim())?;
    }
    for p in posteriors {
        ensure_shape(shape, p.dim())?;
    }
    Ok(shape)
}

/// 第一个最大值的下标. 相等时取下标较小者.
#[inline]
fn first_argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (d, v) in values.enumerate() {
        if d == 0 || v > best.1 {
            best = (d, v);
        }
    }
    best.0
}

/// 原地消解标签冲突, 返回冲突体素个数.
///
/// 对被两个及以上结构标记的体素, 求**所有**结构在该处后验的第一个最大值下标 `winner`,
/// 清除除 `winner` 以外所有结构的标记. 若 `winner` 本身没有标记该体素,
/// 则该体素最终不属于任何结构.
///
/// 未冲突的体素保持不变. 完成后, 任一体素至多被一个结构标记.
pub fn resolve(labels: &mut [LabelVolume], posteriors: &[Volume]) -> Result<usize, InvalidInputError> {
    let shape = check_inputs(labels, posteriors)?;

    let mut conflicts = 0;
    for idx in ndarray::indices(shape) {
        let claims = labels.iter().filter(|l| is_foreground(l[idx])).count();
        if claims <= 1 {
            continue;
        }
        conflicts += 1;
        let winner = first_argmax(posteriors.iter().map(|p| p[idx]));
        labels
            .iter_mut()
            .enumerate()
            .filter(|&(d, _)| d != winner)
            .for_each(|(_, l)| l[idx] = BACKGROUND);
    }
    log::info!("冲突消解: {conflicts} 个体素被多个结构标记");
    Ok(conflicts)
}

/// 将消解后的各结构标签合并为单个标签图: 背景为 0, 第 `d` 个结构为 `d + 1`.
///
/// 若某体素仍被多个结构标记 (未经 [`resolve`]), 取下标最小的结构.
pub fn merge_labels(labels: &[LabelVolume]) -> Result<LabelVolume, InvalidInputError> {
    let Some(first) = labels.first() else {
        return Err(InvalidInputError::EmptyStructureSet);
    };
    if labels.len() >= u8::MAX as usize {
        return Err(InvalidInputError::TooManyStructures(labels.len()));
    }
    let shape = first.dim();
    for l in labels.iter().skip(1) {
        ensure_shape(shape, l.dim())?;
    }

    let mut out = LabelVolume::from_elem(shape, BACKGROUND);
    for (d, l) in labels.iter().enumerate().rev() {
        let value = d as u8 + FOREGROUND;
        ndarray::Zip::from(&mut out).and(l).for_each(|o, &v| {
            if is_foreground(v) {
                *o = value;
            }
        });
    }
    Ok(out)
}
