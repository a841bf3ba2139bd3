//! 强度-距离指数似然模型的肺部分割.
//!
//! 每个肺的似然定义在 `(I, D)` 上, `I` 为强度, `D` 为到该肺图谱的距离.
//! 对同一个肺, 分别在 "体素属于左肺 / 右肺 / 非肺部" 三种条件下建模.

use super::likelihood::{ExpFeatureDensity, LikelihoodModel};
use super::{check_inputs, distance_to_atlas, finish, lung_prior, not_lung_prior};
use super::{region_of_interest, LungAtlasParams, LungSegmentation, LEFT, RIGHT};
use crate::error::{InvalidInputError, SegmentResult};
use crate::segment::SliceSegmenter;
use crate::volume::{StructureSet, Volume};
use ndarray::{ArrayView3, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 指数模型参数. 每组 `[a1, a2, a3]` 对应密度 `λ exp(-λ (a1 I + a2 D + a3)²)`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExpLungParams {
    /// 左肺特征, 体素属于左肺.
    pub left_given_left: [f64; 3],

    /// 左肺特征, 体素属于右肺.
    pub left_given_right: [f64; 3],

    /// 左肺特征, 体素属于非肺部.
    pub left_given_not: [f64; 3],

    /// 右肺特征, 体素属于右肺.
    pub right_given_right: [f64; 3],

    /// 右肺特征, 体素属于左肺.
    pub right_given_left: [f64; 3],

    /// 右肺特征, 体素属于非肺部.
    pub right_given_not: [f64; 3],

    /// 指数分布参数.
    pub lambda: f64,
}

impl ExpLungParams {
    /// 从 6 行参数创建, `λ = 1`. 行的顺序为
    /// `左|左, 左|右, 左|非肺, 右|右, 右|左, 右|非肺`.
    pub const fn from_rows(rows: [[f64; 3]; 6]) -> Self {
        Self {
            left_given_left: rows[0],
            left_given_right: rows[1],
            left_given_not: rows[2],
            right_given_right: rows[3],
            right_given_left: rows[4],
            right_given_not: rows[5],
            lambda: 1.0,
        }
    }

    #[inline]
    fn density(&self, alpha: [f64; 3]) -> ExpFeatureDensity {
        ExpFeatureDensity::from_alpha(alpha, self.lambda)
    }
}

/// `a * pa + b * pb + c * pc`.
fn normalization([a, b, c]: [&Volume; 3], [pa, pb, pc]: [ArrayView3<f64>; 3]) -> Volume {
    let mut out = Zip::from(a).and(pa).map_collect(|&a, &pa| a * pa);
    Zip::from(&mut out)
        .and(b)
        .and(pb)
        .and(c)
        .and(pc)
        .for_each(|o, &b, &pb, &c, &pc| *o += b * pb + c * pc);
    out
}

/// 以默认图谱参数和默认分割器运行. 见 [`segment_lung_with_atlas_using`].
pub fn segment_lung_with_atlas(
    image: &Volume,
    atlases: &StructureSet<f64>,
    params: &ExpLungParams,
) -> SegmentResult<LungSegmentation> {
    segment_lung_with_atlas_using(
        image,
        atlases,
        params,
        &LungAtlasParams::default(),
        &SliceSegmenter::default(),
    )
}

/// 以强度-距离指数模型分割左右肺. `atlases` 必须恰好包含左肺和右肺两个图谱.
///
/// 左肺归一化项为 `L(左|左) a0 + L(左|右) a1 + L(左|非肺) P_非肺`, 右肺同理.
/// 任一图谱二值化后为空时, 无法计算距离图, 返回错误.
pub fn segment_lung_with_atlas_using(
    image: &Volume,
    atlases: &StructureSet<f64>,
    params: &ExpLungParams,
    atlas_params: &LungAtlasParams,
    segmenter: &SliceSegmenter,
) -> SegmentResult<LungSegmentation> {
    check_inputs(image, atlases)?;

    let distance = |d: usize| {
        distance_to_atlas(&atlases[d], atlas_params)
            .ok_or(InvalidInputError::EmptyAtlas { structure: d })
    };
    let left_distance = distance(LEFT)?;
    let right_distance = distance(RIGHT)?;

    let prior = lung_prior(atlases);
    let roi = region_of_interest(&prior, atlas_params);
    let not_prior = not_lung_prior(atlases, atlas_params.not_lung_cap);

    let like = |alpha: [f64; 3], distance: &Volume| {
        params
            .density(alpha)
            .likelihood(image.view(), distance.view())
    };
    let left = like(params.left_given_left, &left_distance);
    let left_given_right = like(params.left_given_right, &left_distance);
    let left_given_not = like(params.left_given_not, &left_distance);
    let right = like(params.right_given_right, &right_distance);
    let right_given_left = like(params.right_given_left, &right_distance);
    let right_given_not = like(params.right_given_not, &right_distance);

    let priors = [atlases.view(LEFT), atlases.view(RIGHT), not_prior.view()];
    let left_norm = normalization([&left, &left_given_right, &left_given_not], priors);
    let right_norm = normalization([&right_given_left, &right, &right_given_not], priors);
    finish(
        [left, right],
        [left_norm, right_norm],
        &roi,
        atlases,
        atlas_params,
        segmenter,
    )
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::error::SegmentError;

    /// 肺内强度 0, 肺外强度 3. 属于本肺时密度约为 1, 属于非肺部时约为 `e^-9`.
    const PARAMS: ExpLungParams = ExpLungParams::from_rows([
        [1.0, 0.1, 0.0],
        [0.5, 0.0, 1.0],
        [1.0, 0.0, -3.0],
        [1.0, 0.1, 0.0],
        [0.5, 0.0, 1.0],
        [1.0, 0.0, -3.0],
    ]);

    #[test]
    fn test_from_rows() {
        let p = ExpLungParams::from_rows([
            [0.0; 3],
            [1.0; 3],
            [2.0; 3],
            [3.0; 3],
            [4.0; 3],
            [5.0; 3],
        ]);
        assert_eq!(p.left_given_right, [1.0; 3]);
        assert_eq!(p.right_given_right, [3.0; 3]);
        assert_eq!(p.right_given_left, [4.0; 3]);
        assert_eq!(p.lambda, 1.0);
    }

    #[test]
    fn test_phantom() {
        init_logger();
        let atlases = phantom_atlases(3);
        let image = phantom_image(3, 0.0, 3.0);
        let seg = segment_lung_with_atlas(&image, &atlases, &PARAMS).unwrap();
        assert_matches_phantom(&seg, &atlases);
        assert_eq!(seg.left().iter().filter(|&&v| v == 1).count(), 36);
    }

    #[test]
    fn test_empty_atlas() {
        let atlases = phantom_atlases(1);
        let weak = atlases[RIGHT].mapv(|p| p * 0.5);
        let atlases = StructureSet::new(vec![atlases[LEFT].clone(), weak]).unwrap();
        let image = phantom_image(1, 0.0, 3.0);
        assert_eq!(
            segment_lung_with_atlas(&image, &atlases, &PARAMS),
            Err(SegmentError::InvalidInput(InvalidInputError::EmptyAtlas {
                structure: RIGHT
            }))
        );
    }
}
