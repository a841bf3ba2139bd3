//! 基于左右肺概率图谱的肺部分割.
//!
//! 两种似然模型 (强度高斯模型, 强度-距离指数模型) 共用以下步骤:
//!
//! 1. 两个图谱相加得到肺部先验, 二值化后膨胀, 填充空洞, 得到感兴趣区域;
//! 2. 非肺部先验为 `1 - (左 + 右)`, 截断到 `[0, 100]`;
//! 3. 由似然和先验得到每个结构的归一化项, 其中的零值替换为极小正数;
//! 4. 感兴趣区域之外的结构似然置零, 然后以图谱为先验运行分割流程.

mod exponential;
mod gaussian;
mod likelihood;

pub use exponential::{segment_lung_with_atlas, segment_lung_with_atlas_using, ExpLungParams};
pub use gaussian::{
    segment_lung_with_atlas_gaussian, segment_lung_with_atlas_gaussian_using, GaussianLungParams,
};
pub use likelihood::{ExpFeatureDensity, Gaussian, LikelihoodModel};

use crate::consts::atlas::*;
use crate::error::{InvalidInputError, SegmentResult};
use crate::morph::{dilate, distance_to_mask, fill_holes_mask};
use crate::pipeline::{segment_chest_with_atlas_using, AtlasSegmentation};
use crate::segment::SliceSegmenter;
use crate::volume::{ensure_shape, LabelVolume, StructureSet, Volume};
use ndarray::{Array3, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 左肺在图谱集合中的下标.
pub const LEFT: usize = 0;

/// 右肺在图谱集合中的下标.
pub const RIGHT: usize = 1;

/// 图谱预处理参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LungAtlasParams {
    /// 肺部先验二值化门限.
    pub lung_threshold: f64,

    /// 二值化先验的膨胀次数.
    pub dilation_iterations: usize,

    /// 非肺部先验的截断上限.
    pub not_lung_cap: f64,

    /// 归一化项 (和距离图) 中零值的替代值.
    pub epsilon: f64,

    /// 计算距离图时图谱的二值化门限.
    pub distance_threshold: f64,
}

impl Default for LungAtlasParams {
    fn default() -> Self {
        Self {
            lung_threshold: LUNG_PRIOR_THRESHOLD,
            dilation_iterations: DILATION_ITERATIONS,
            not_lung_cap: NOT_LUNG_PRIOR_CAP,
            epsilon: EPSILON,
            distance_threshold: DISTANCE_THRESHOLD,
        }
    }
}

/// 左右肺分割结果.
#[derive(Debug, Clone, PartialEq)]
pub struct LungSegmentation(AtlasSegmentation);

impl LungSegmentation {
    /// 左肺标签.
    #[inline]
    pub fn left(&self) -> &LabelVolume {
        &self.0.labels[LEFT]
    }

    /// 右肺标签.
    #[inline]
    pub fn right(&self) -> &LabelVolume {
        &self.0.labels[RIGHT]
    }

    /// 冲突体素个数.
    #[inline]
    pub fn conflicts(&self) -> usize {
        self.0.conflicts
    }

    /// 合并标签图: 背景 0, 左肺 1, 右肺 2.
    #[inline]
    pub fn label_map(&self) -> LabelVolume {
        self.0.label_map()
    }

    /// 获得底层结果.
    #[inline]
    pub fn into_inner(self) -> AtlasSegmentation {
        self.0
    }
}

/// 检查图谱个数及其与图像的形状是否一致.
fn check_inputs(image: &Volume, atlases: &StructureSet<f64>) -> Result<(), InvalidInputError> {
    if atlases.len() != ATLAS_COUNT {
        return Err(InvalidInputError::AtlasCount(atlases.len()));
    }
    ensure_shape(atlases.shape(), image.dim())
}

/// 肺部先验: 两个图谱之和.
pub fn lung_prior(atlases: &StructureSet<f64>) -> Volume {
    atlases
        .iter()
        .skip(1)
        .fold(atlases[0].clone(), |acc, a| acc + a)
}

/// 不小于 `threshold` 的体素为 `true`.
#[inline]
pub fn binarize(v: &Volume, threshold: f64) -> Array3<bool> {
    v.mapv(|x| x >= threshold)
}

/// 感兴趣区域: 二值化肺部先验, 膨胀, 然后填充空洞.
pub fn region_of_interest(lung_prior: &Volume, params: &LungAtlasParams) -> Array3<bool> {
    let mut roi = dilate(
        &binarize(lung_prior, params.lung_threshold),
        params.dilation_iterations,
    );
    fill_holes_mask(&mut roi);
    roi
}

/// 非肺部先验 `1 - (左 + 右)`, 截断到 `[0, cap]`.
pub fn not_lung_prior(atlases: &StructureSet<f64>, cap: f64) -> Volume {
    lung_prior(atlases).mapv(|p| (1.0 - p).clamp(0.0, cap))
}

/// 将精确为零的体素替换为 `eps`. 返回替换个数.
pub fn substitute_epsilon(v: &mut Volume, eps: f64) -> usize {
    let mut cnt = 0;
    v.iter_mut().filter(|x| **x == 0.0).for_each(|x| {
        *x = eps;
        cnt += 1;
    });
    cnt
}

/// 将 `roi` 之外的体素置零.
pub fn mask_outside(v: &mut Volume, roi: &Array3<bool>) {
    Zip::from(v).and(roi).for_each(|x, &inside| {
        if !inside {
            *x = 0.0;
        }
    });
}

/// 每个体素到图谱 (以 `distance_threshold` 二值化) 的欧氏距离. 图谱内部的距离为 `epsilon`.
///
/// 二值化后的图谱为空时返回 `None`.
pub fn distance_to_atlas(atlas: &Volume, params: &LungAtlasParams) -> Option<Volume> {
    let mut d = distance_to_mask(&binarize(atlas, params.distance_threshold))?;
    substitute_epsilon(&mut d, params.epsilon);
    Some(d)
}

/// 两个肺共用的收尾步骤: 处理归一化项中的零值, 将感兴趣区域外的似然置零, 然后运行分割流程.
fn finish(
    [mut left, mut right]: [Volume; 2],
    [mut left_norm, mut right_norm]: [Volume; 2],
    roi: &Array3<bool>,
    atlases: &StructureSet<f64>,
    params: &LungAtlasParams,
    segmenter: &SliceSegmenter,
) -> SegmentResult<LungSegmentation> {
    for (d, n) in [&mut left_norm, &mut right_norm].into_iter().enumerate() {
        let cnt = substitute_epsilon(n, params.epsilon);
        if cnt > 0 {
            log::warn!("结构 {d}: 归一化项有 {cnt} 个零值, 已替换为 {}", params.epsilon);
        }
    }
    mask_outside(&mut left, roi);
    mask_outside(&mut right, roi);
    log::debug!(
        "感兴趣区域包含 {} 个体素",
        roi.iter().filter(|&&b| b).count()
    );

    let likelihoods = StructureSet::new(vec![left, right])?;
    let normalization = StructureSet::new(vec![left_norm, right_norm])?;
    segment_chest_with_atlas_using(&likelihoods, atlases, &normalization, segmenter)
        .map(LungSegmentation)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 安装日志, 便于观察流程输出. 多次调用时只有第一次生效.
    pub(crate) fn init_logger() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    /// 8x8xN 的合成胸部: 左肺占第 1, 2 列, 右肺占第 5, 6 列 (第 1..=6 行).
    pub(crate) fn phantom_atlases(slices: usize) -> StructureSet<f64> {
        let region = |cols: [usize; 2]| {
            Volume::from_shape_fn((8, 8, slices), move |(l, m, _)| {
                if (1..=6).contains(&l) && cols.contains(&m) {
                    0.9
                } else {
                    0.0
                }
            })
        };
        StructureSet::new(vec![region([1, 2]), region([5, 6])]).unwrap()
    }

    /// 与 [`phantom_atlases`] 对应的图像: 肺内为 `lung`, 其余为 `other`.
    pub(crate) fn phantom_image(slices: usize, lung: f64, other: f64) -> Volume {
        Volume::from_shape_fn((8, 8, slices), |(l, m, _)| {
            if (1..=6).contains(&l) && [1, 2, 5, 6].contains(&m) {
                lung
            } else {
                other
            }
        })
    }

    /// 检查分割结果与合成图谱一致.
    pub(crate) fn assert_matches_phantom(seg: &LungSegmentation, atlases: &StructureSet<f64>) {
        for (pos, &v) in seg.label_map().indexed_iter() {
            let expected = if atlases[LEFT][pos] > 0.5 {
                1
            } else if atlases[RIGHT][pos] > 0.5 {
                2
            } else {
                0
            };
            assert_eq!(v, expected, "{pos:?}");
        }
        assert_eq!(seg.conflicts(), 0);
    }

    fn pair(a: Volume, b: Volume) -> StructureSet<f64> {
        StructureSet::new(vec![a, b]).unwrap()
    }

    #[test]
    fn test_lung_prior_and_not_lung_prior() {
        let shape = (1, 4, 1);
        let a = Volume::from_shape_vec(shape, vec![0.2, 0.7, -150.0, 0.0]).unwrap();
        let b = Volume::from_shape_vec(shape, vec![0.3, 0.5, 0.0, 0.0]).unwrap();
        let atlases = pair(a, b);
        let p = lung_prior(&atlases);
        assert_eq!(p.iter().copied().collect::<Vec<_>>(), vec![0.5, 0.7 + 0.5, -150.0, 0.0]);

        let n = not_lung_prior(&atlases, NOT_LUNG_PRIOR_CAP);
        assert_eq!(n.iter().copied().collect::<Vec<_>>(), vec![0.5, 0.0, 100.0, 1.0]);
    }

    #[test]
    fn test_region_of_interest() {
        let mut prior = Volume::zeros((7, 7, 7));
        prior[(3, 3, 3)] = 0.35;
        prior[(0, 0, 0)] = 0.3499;
        let roi = region_of_interest(&prior, &LungAtlasParams::default());
        assert_eq!(roi.iter().filter(|&&b| b).count(), 25);
        assert!(!roi[(0, 0, 0)]);
        assert!(roi[(3, 3, 1)]);
    }

    #[test]
    fn test_region_of_interest_fills_holes() {
        // 5x5x5 空心壳, 不膨胀时中心被填充.
        let prior = Volume::from_shape_fn((5, 5, 5), |(l, m, n)| {
            let on_shell = |x: usize| x == 1 || x == 3;
            let inside = |x: usize| (1..=3).contains(&x);
            let shell = inside(l)
                && inside(m)
                && inside(n)
                && (on_shell(l) || on_shell(m) || on_shell(n));
            if shell {
                1.0
            } else {
                0.0
            }
        });
        let params = LungAtlasParams {
            dilation_iterations: 0,
            ..Default::default()
        };
        let roi = region_of_interest(&prior, &params);
        assert!(roi[(2, 2, 2)]);
        assert_eq!(roi.iter().filter(|&&b| b).count(), 27);
    }

    #[test]
    fn test_substitute_and_mask() {
        let mut v = Volume::from_shape_vec((1, 3, 1), vec![0.0, 2.0, 0.0]).unwrap();
        assert_eq!(substitute_epsilon(&mut v, EPSILON), 2);
        assert_eq!(v[(0, 0, 0)], EPSILON);
        assert_eq!(substitute_epsilon(&mut v, EPSILON), 0);

        let roi = Array3::from_shape_vec((1, 3, 1), vec![true, false, true]).unwrap();
        mask_outside(&mut v, &roi);
        assert_eq!(v.iter().copied().collect::<Vec<_>>(), vec![EPSILON, 0.0, EPSILON]);
    }

    #[test]
    fn test_distance_to_atlas() {
        let mut atlas = Volume::zeros((1, 5, 1));
        atlas[(0, 1, 0)] = 0.5;
        atlas[(0, 4, 0)] = 0.49;
        let params = LungAtlasParams::default();
        let d = distance_to_atlas(&atlas, &params).unwrap();
        assert_eq!(
            d.iter().copied().collect::<Vec<_>>(),
            vec![1.0, EPSILON, 1.0, 2.0, 3.0]
        );
        assert!(distance_to_atlas(&Volume::zeros((2, 2, 2)), &params).is_none());
    }
}
