//! 强度高斯似然模型的肺部分割.

use super::likelihood::Gaussian;
use super::{check_inputs, finish, lung_prior, not_lung_prior, region_of_interest};
use super::{binarize, LungAtlasParams, LungSegmentation};
use crate::error::SegmentResult;
use crate::segment::SliceSegmenter;
use crate::volume::{StructureSet, Volume};
use ndarray::Zip;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 左肺, 非肺部, 右肺的强度分布.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaussianLungParams {
    /// 左肺.
    pub left: Gaussian,

    /// 非肺部.
    pub not_lung: Gaussian,

    /// 右肺.
    pub right: Gaussian,
}

impl GaussianLungParams {
    /// 从扁平数组创建, 布局为
    /// `[左肺均值, 左肺标准差, 非肺均值, 非肺标准差, 右肺均值, 右肺标准差]`.
    pub const fn from_flat(p: [f64; 6]) -> Self {
        Self {
            left: Gaussian::new(p[0], p[1]),
            not_lung: Gaussian::new(p[2], p[3]),
            right: Gaussian::new(p[4], p[5]),
        }
    }
}

/// `lik * lung + not_lik * not_prior`.
fn normalization(lik: &Volume, lung: &Volume, not_lik: &Volume, not_prior: &Volume) -> Volume {
    Zip::from(lik)
        .and(lung)
        .and(not_lik)
        .and(not_prior)
        .map_collect(|&l, &t, &n, &p| l * t + n * p)
}

/// 以默认图谱参数和默认分割器运行. 见 [`segment_lung_with_atlas_gaussian_using`].
pub fn segment_lung_with_atlas_gaussian(
    image: &Volume,
    atlases: &StructureSet<f64>,
    params: &GaussianLungParams,
) -> SegmentResult<LungSegmentation> {
    segment_lung_with_atlas_gaussian_using(
        image,
        atlases,
        params,
        &LungAtlasParams::default(),
        &SliceSegmenter::default(),
    )
}

/// 以强度高斯模型分割左右肺. `atlases` 必须恰好包含左肺和右肺两个图谱.
///
/// 每个肺的归一化项为 `L_肺 · T + L_非肺 · P_非肺`, 其中 `T` 是二值化 (未膨胀) 的肺部先验.
pub fn segment_lung_with_atlas_gaussian_using(
    image: &Volume,
    atlases: &StructureSet<f64>,
    params: &GaussianLungParams,
    atlas_params: &LungAtlasParams,
    segmenter: &SliceSegmenter,
) -> SegmentResult<LungSegmentation> {
    check_inputs(image, atlases)?;

    let prior = lung_prior(atlases);
    let roi = region_of_interest(&prior, atlas_params);
    let lung = binarize(&prior, atlas_params.lung_threshold).mapv(f64::from);
    let not_prior = not_lung_prior(atlases, atlas_params.not_lung_cap);

    let left = params.left.pdf_volume(image.view());
    let right = params.right.pdf_volume(image.view());
    let not_lik = params.not_lung.pdf_volume(image.view());

    let left_norm = normalization(&left, &lung, &not_lik, &not_prior);
    let right_norm = normalization(&right, &lung, &not_lik, &not_prior);
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
    use crate::consts::gray::BACKGROUND;
    use crate::error::{InvalidInputError, SegmentError};

    const PARAMS: GaussianLungParams =
        GaussianLungParams::from_flat([-850.0, 50.0, 40.0, 50.0, -850.0, 50.0]);

    #[test]
    fn test_from_flat() {
        let p = GaussianLungParams::from_flat([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(p.left, Gaussian::new(1.0, 2.0));
        assert_eq!(p.not_lung, Gaussian::new(3.0, 4.0));
        assert_eq!(p.right, Gaussian::new(5.0, 6.0));
    }

    #[test]
    fn test_phantom() {
        init_logger();
        let atlases = phantom_atlases(2);
        let image = phantom_image(2, -850.0, 40.0);
        let seg = segment_lung_with_atlas_gaussian(&image, &atlases, &PARAMS).unwrap();
        assert_matches_phantom(&seg, &atlases);
    }

    #[test]
    fn test_right_lung_uses_right_params() {
        let atlases = phantom_atlases(1);
        let image = phantom_image(1, -850.0, 40.0);
        let params = GaussianLungParams {
            right: Gaussian::new(500.0, 50.0),
            ..PARAMS
        };
        let seg = segment_lung_with_atlas_gaussian(&image, &atlases, &params).unwrap();
        assert!(seg.right().iter().all(|&v| v == BACKGROUND));
        assert_eq!(seg.left().iter().filter(|&&v| v != BACKGROUND).count(), 12);
    }

    /// 16x16xN 体模: 左肺第 2..=5 列, 右肺第 10..=13 列 (第 3..=12 行).
    /// 图谱向右偏移一列, 核心为 0.9, 外围一圈为 0.2.
    fn soft_shifted_phantom(slices: usize) -> (Volume, StructureSet<f64>) {
        let image = Volume::from_shape_fn((16, 16, slices), |(l, m, _)| {
            let lung = (2..=5).contains(&m) || (10..=13).contains(&m);
            if (3..=12).contains(&l) && lung {
                -850.0
            } else {
                40.0
            }
        });
        let region = |c0: usize| {
            Volume::from_shape_fn((16, 16, slices), move |(l, m, _)| {
                if (3..=12).contains(&l) && (c0..c0 + 4).contains(&m) {
                    0.9
                } else if (2..=13).contains(&l) && (c0 - 1..c0 + 5).contains(&m) {
                    0.2
                } else {
                    0.0
                }
            })
        };
        let atlases = StructureSet::new(vec![region(3), region(11)]).unwrap();
        (image, atlases)
    }

    #[test]
    fn test_soft_atlas_outside_binary_prior() {
        // 外围一圈低于二值化门限, 归一化项中没有肺部似然, 后验远大于 1.
        let (image, atlases) = soft_shifted_phantom(2);
        let seg = segment_lung_with_atlas_gaussian(&image, &atlases, &PARAMS).unwrap();
        for ((l, m, _), &v) in seg.label_map().indexed_iter() {
            let expected = match (3..=12).contains(&l) {
                true if (2..=5).contains(&m) => 1,
                true if (10..=13).contains(&m) => 2,
                _ => 0,
            };
            assert_eq!(v, expected, "({l}, {m})");
        }
        assert_eq!(seg.conflicts(), 0);
    }

    #[test]
    fn test_zero_normalization_substituted() {
        // 肺外强度远离两个分布, 密度下溢为 0.
        let atlases = phantom_atlases(1);
        let image = phantom_image(1, -850.0, 1e5);
        let seg = segment_lung_with_atlas_gaussian(&image, &atlases, &PARAMS).unwrap();
        assert_matches_phantom(&seg, &atlases);
    }

    #[test]
    fn test_invalid_atlases() {
        let atlases = phantom_atlases(1);
        let image = phantom_image(2, -850.0, 40.0);
        assert!(matches!(
            segment_lung_with_atlas_gaussian(&image, &atlases, &PARAMS),
            Err(SegmentError::InvalidInput(
                InvalidInputError::ShapeMismatch { .. }
            ))
        ));

        let three = StructureSet::new(vec![atlases[0].clone(); 3]).unwrap();
        let image = phantom_image(1, -850.0, 40.0);
        assert_eq!(
            segment_lung_with_atlas_gaussian(&image, &three, &PARAMS),
            Err(SegmentError::InvalidInput(InvalidInputError::AtlasCount(3)))
        );
    }
}
