//! 体素似然模型.

use crate::volume::Volume;
use ndarray::{ArrayView3, Zip};
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 似然模型: 根据图像强度和到图谱的距离, 计算每个体素的似然.
///
/// 实现必须是纯函数, 且输出形状与输入一致.
pub trait LikelihoodModel {
    /// 计算似然体积. `image` 与 `distance` 形状必须一致, 否则 panic.
    fn likelihood(&self, image: ArrayView3<f64>, distance: ArrayView3<f64>) -> Volume;
}

/// 一维正态分布. 只依赖强度, 忽略距离.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gaussian {
    /// 均值.
    pub mean: f64,

    /// 标准差. 必须为正.
    pub std: f64,
}

impl Gaussian {
    /// 直接初始化.
    #[inline]
    pub const fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// 概率密度.
    #[inline]
    pub fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.std;
        (-0.5 * z * z).exp() / (self.std * (2.0 * PI).sqrt())
    }

    /// 逐体素计算强度的概率密度.
    pub fn pdf_volume(&self, image: ArrayView3<f64>) -> Volume {
        image.mapv(|x| self.pdf(x))
    }
}

impl LikelihoodModel for Gaussian {
    fn likelihood(&self, image: ArrayView3<f64>, distance: ArrayView3<f64>) -> Volume {
        assert_eq!(image.dim(), distance.dim());
        self.pdf_volume(image)
    }
}

/// 二次多项式特征映射上的指数密度 `λ exp(-λ Σ w_k φ_k(I, D))`.
///
/// 特征 `φ = [1, I, D, I², I·D, D²]`, `I` 为强度, `D` 为到图谱的距离.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExpFeatureDensity {
    /// 每个特征项的权重.
    pub weights: [f64; 6],

    /// 指数分布参数.
    pub lambda: f64,
}

impl ExpFeatureDensity {
    /// 由 `(a1 I + a2 D + a3)²` 展开得到权重:
    /// `[a3², 2 a1 a3, 2 a2 a3, a1², 2 a1 a2, a2²]`.
    pub fn from_alpha([a1, a2, a3]: [f64; 3], lambda: f64) -> Self {
        Self {
            weights: [
                a3 * a3,
                2.0 * a1 * a3,
                2.0 * a2 * a3,
                a1 * a1,
                2.0 * a1 * a2,
                a2 * a2,
            ],
            lambda,
        }
    }

    /// 特征向量 `[1, I, D, I², I·D, D²]`.
    #[inline]
    pub fn features(i: f64, d: f64) -> [f64; 6] {
        [1.0, i, d, i * i, i * d, d * d]
    }

    /// 单点密度.
    #[inline]
    pub fn density(&self, i: f64, d: f64) -> f64 {
        let acc: f64 = self
            .weights
            .iter()
            .zip(Self::features(i, d))
            .map(|(w, f)| w * f)
            .sum();
        self.lambda * (-self.lambda * acc).exp()
    }
}

impl LikelihoodModel for ExpFeatureDensity {
    fn likelihood(&self, image: ArrayView3<f64>, distance: ArrayView3<f64>) -> Volume {
        Zip::from(image)
            .and(distance)
            .map_collect(|&i, &d| self.density(i, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_gaussian_pdf() {
        let g = Gaussian::new(-850.0, 50.0);
        assert!(f64_eq(g.pdf(-850.0), 1.0 / (50.0 * (2.0 * PI).sqrt())));
        assert!(f64_eq(g.pdf(-800.0), g.pdf(-900.0)));
        assert!(f64_eq(g.pdf(-800.0) / g.pdf(-850.0), (-0.5f64).exp()));
    }

    #[test]
    fn test_gaussian_ignores_distance() {
        let image = Volume::from_shape_fn((2, 3, 1), |(l, m, _)| (l * 3 + m) as f64);
        let g = Gaussian::new(2.0, 1.5);
        let a = g.likelihood(image.view(), Volume::zeros((2, 3, 1)).view());
        let b = g.likelihood(image.view(), Volume::ones((2, 3, 1)).view());
        assert_eq!(a, b);
        assert!(f64_eq(a[(0, 2, 0)], g.pdf(2.0)));
    }

    #[test]
    fn test_from_alpha_matches_square() {
        let alpha = [0.002149, -0.002069, 5.258745];
        let e = ExpFeatureDensity::from_alpha(alpha, 1.0);
        for (i, d) in [(-850.0, 1e-24), (-600.0, 3.0), (40.0, 12.5), (0.0, 0.0)] {
            let s = alpha[0] * i + alpha[1] * d + alpha[2];
            assert!(f64_eq(e.density(i, d), (-s * s).exp()), "({i}, {d})");
        }
    }

    #[test]
    fn test_lambda_scales_density() {
        let e = ExpFeatureDensity {
            weights: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            lambda: 2.0,
        };
        assert!(f64_eq(e.density(123.0, 4.0), 2.0 * (-2.0f64).exp()));
    }

    #[test]
    fn test_exp_volume() {
        let image = Volume::from_shape_fn((2, 2, 2), |(l, m, n)| (l + m + n) as f64);
        let dist = Volume::from_shape_fn((2, 2, 2), |(l, _, _)| l as f64);
        let e = ExpFeatureDensity::from_alpha([0.1, 0.2, 0.3], 1.0);
        let v = e.likelihood(image.view(), dist.view());
        for (pos, &x) in v.indexed_iter() {
            assert!(f64_eq(x, e.density(image[pos], dist[pos])));
        }
    }
}
