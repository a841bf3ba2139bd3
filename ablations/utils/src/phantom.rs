//! 合成胸部体模. 提供图像, 左右肺概率图谱及真值标签.

use ct_atlas::consts::gray::{BACKGROUND, FOREGROUND};
use ct_atlas::{Idx3d, InvalidInputError, LabelVolume, StructureSet, Volume};
use std::env;

/// 肺实质强度 (HU).
pub const LUNG_HU: f64 = -850.0;

/// 胸壁, 纵隔等软组织强度 (HU).
pub const TISSUE_HU: f64 = 40.0;

/// 合成体模.
#[derive(Debug, Clone)]
pub struct ChestPhantom {
    /// 带噪声的图像.
    pub image: Volume,

    /// 左右肺概率图谱.
    pub atlases: StructureSet<f64>,

    /// 左右肺真值标签.
    pub truth: [LabelVolume; 2],
}

/// 确定性伪随机数, 输出 `[-1, 1)`.
struct Lcg(u64);

impl Lcg {
    fn next_signed(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }
}

/// 椭圆归一化半径. 小于 1 时位于椭圆内部.
#[inline]
fn ellipse_radius((l, m): (f64, f64), (cl, cm): (f64, f64), (rl, rm): (f64, f64)) -> f64 {
    (((l - cl) / rl).powi(2) + ((m - cm) / rm).powi(2)).sqrt()
}

impl ChestPhantom {
    /// 创建形状为 `shape` 的体模.
    ///
    /// 两个肺是沿切片方向延伸的椭圆柱. 图谱是中心偏移 `shift` 个体素的软化椭圆,
    /// 用于模拟配准误差; 图像强度叠加幅度为 `noise` 的均匀噪声.
    /// `shape` 为空时返回 `Err`.
    pub fn new(shape: Idx3d, shift: f64, noise: f64, seed: u64) -> Result<Self, InvalidInputError> {
        let (h, w, _) = shape;
        let (hf, wf) = (h as f64, w as f64);
        let radii = (hf * 0.35, wf * 0.16);
        let centers = [(hf * 0.5, wf * 0.28), (hf * 0.5, wf * 0.72)];

        let truth = centers.map(|c| {
            LabelVolume::from_shape_fn(shape, |(l, m, _)| {
                if ellipse_radius((l as f64, m as f64), c, radii) < 1.0 {
                    FOREGROUND
                } else {
                    BACKGROUND
                }
            })
        });
        let atlases = centers
            .map(|(cl, cm)| {
                Volume::from_shape_fn(shape, |(l, m, _)| {
                    let r = ellipse_radius((l as f64, m as f64), (cl + shift, cm + shift), radii);
                    1.0 / (1.0 + ((r - 1.0) * 8.0).exp())
                })
            })
            .to_vec();

        let mut rng = Lcg(seed);
        let image = Volume::from_shape_fn(shape, |pos| {
            let base = if truth.iter().any(|t| t[pos] == FOREGROUND) {
                LUNG_HU
            } else {
                TISSUE_HU
            };
            base + noise * rng.next_signed()
        });

        Ok(Self {
            image,
            atlases: StructureSet::new(atlases)?,
            truth,
        })
    }
}

/// 获取体模切片数.
///
/// 1. 若环境变量 `$PHANTOM_SLICES` 是合法的正整数, 则返回其值;
/// 2. 否则, 返回 `default`.
pub fn slices_from_env_or(default: usize) -> usize {
    env::var("PHANTOM_SLICES")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}
