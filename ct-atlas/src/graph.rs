//! 单个 2D 切片上的 MRF 能量图构建.
//!
//! 节点按行优先编号: `id = row * width + col`. 边包括一阶 (4-相邻) 边和二阶
//! (沿行/列间隔一个像素) 边, 后者权重远小于前者, 以获得局部平滑但不过分僵硬的边界.

use crate::consts::energy::*;
use crate::error::InvalidInputError;
use itertools::iproduct;
use ndarray::{Array2, ArrayView2};
use num::ToPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 带权无向边 `(a, b, weight)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    /// 第一个节点.
    pub a: i32,

    /// 第二个节点.
    pub b: i32,

    /// 边权.
    pub weight: i32,
}

impl Edge {
    /// 直接初始化.
    #[inline]
    pub const fn new(a: i32, b: i32, weight: i32) -> Self {
        Self { a, b, weight }
    }
}

/// 边列表.
pub type EdgeList = Vec<Edge>;

/// 每个节点的 `(source 能量, sink 能量)`, 形状为 `(节点数, 2)`.
///
/// 第 0 列是节点取标签 0 的代价, 第 1 列是取标签 1 (属于结构) 的代价.
pub type EnergyPairs = Array2<i32>;

/// 一阶/二阶边的权重.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeWeights {
    /// 一阶边权重.
    pub first_order: i32,

    /// 二阶边权重.
    pub second_order: i32,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            first_order: FIRST_ORDER_WEIGHT,
            second_order: SECOND_ORDER_WEIGHT,
        }
    }
}

/// `height * width` 网格的一阶边数: `h * (w - 1) + w * (h - 1)`.
#[inline]
pub fn first_order_edge_count(height: usize, width: usize) -> usize {
    height * width.saturating_sub(1) + width * height.saturating_sub(1)
}

/// `height * width` 网格的二阶边数: `h * (w - 2) + w * (h - 2)`.
#[inline]
pub fn second_order_edge_count(height: usize, width: usize) -> usize {
    height * width.saturating_sub(2) + width * height.saturating_sub(2)
}

/// 以默认权重 (18 / 1) 构建 `height * width` 切片的边列表.
#[inline]
pub fn build_slice_graph(height: usize, width: usize) -> EdgeList {
    build_slice_graph_weighted(height, width, EdgeWeights::default())
}

/// 构建 `height * width` 切片的边列表.
///
/// 边的顺序依次为: 一阶水平边, 一阶垂直边, 二阶水平边, 二阶垂直边;
/// 每组内部按行优先排列.
pub fn build_slice_graph_weighted(height: usize, width: usize, weights: EdgeWeights) -> EdgeList {
    let mut edges = Vec::with_capacity(
        first_order_edge_count(height, width) + second_order_edge_count(height, width),
    );
    for (step, weight) in [(1, weights.first_order), (2, weights.second_order)] {
        push_skip_edges(&mut edges, height, width, step, weight);
    }
    debug_assert_eq!(
        edges.len(),
        first_order_edge_count(height, width) + second_order_edge_count(height, width)
    );
    edges
}

/// 添加所有水平, 垂直方向上距离为 `step` 的节点对.
fn push_skip_edges(edges: &mut EdgeList, height: usize, width: usize, step: usize, weight: i32) {
    let id = |h: usize, w: usize| (h * width + w) as i32;

    // 水平
    edges.extend(
        iproduct!(0..height, 0..width.saturating_sub(step))
            .map(|(h, w)| Edge::new(id(h, w), id(h, w + step), weight)),
    );
    // 垂直
    edges.extend(
        iproduct!(0..height.saturating_sub(step), 0..width)
            .map(|(h, w)| Edge::new(id(h, w), id(h + step, w), weight)),
    );
}

/// 以默认缩放倍数构建一元能量. 见 [`build_unary_energies_scaled`].
#[inline]
pub fn build_unary_energies(
    structure: ArrayView2<f64>,
    not_structure: ArrayView2<f64>,
) -> Result<EnergyPairs, InvalidInputError> {
    build_unary_energies_scaled(structure, not_structure, ENERGY_SCALE)
}

/// 根据切片后验构建每个节点的一元能量:
///
/// - `source = round(not_structure * scale)`;
/// - `sink = round((1 - structure) * scale)`.
///
/// 节点编号为行优先. 两个切片形状必须一致. 缩放后的值为 NaN 或无穷时返回 `Err`;
/// 有限值截断到 `i32` 的范围内 (后验本身不做截断, 可能远大于 1).
///
/// # 注意
///
/// 实际流程中 `structure` 和 `not_structure` 传入的是同一个后验通道.
pub fn build_unary_energies_scaled(
    structure: ArrayView2<f64>,
    not_structure: ArrayView2<f64>,
    scale: f64,
) -> Result<EnergyPairs, InvalidInputError> {
    let (h, w) = structure.dim();
    let (nh, nw) = not_structure.dim();
    if (h, w) != (nh, nw) {
        return Err(InvalidInputError::ShapeMismatch {
            expected: (h, w, 1),
            found: (nh, nw, 1),
        });
    }

    let mut energies = EnergyPairs::zeros((h * w, 2));
    // `indexed_iter` 总是行优先, 与节点编号一致 (切片视图本身可能不连续).
    for ((r, c), &s) in structure.indexed_iter() {
        let index = r * w + c;
        let n = not_structure[(r, c)];
        match (scaled(n, scale), scaled(1.0 - s, scale)) {
            (Ok(source), Ok(sink)) => {
                energies[(index, 0)] = source;
                energies[(index, 1)] = sink;
            }
            (Err(value), _) | (_, Err(value)) => {
                return Err(InvalidInputError::NonFiniteEnergy { index, value })
            }
        }
    }
    Ok(energies)
}

/// `round(v * scale)` 截断到 `i32` 范围. 非有限值返回 `Err(缩放后的值)`.
#[inline]
fn scaled(v: f64, scale: f64) -> Result<i32, f64> {
    let x = v * scale;
    if !x.is_finite() {
        return Err(x);
    }
    x.round()
        .clamp(i32::MIN as f64, i32::MAX as f64)
        .to_i32()
        .ok_or(x)
}

/// `labels` 个标签的 Potts 代价矩阵: 标签相同代价为 0, 否则为 1.
pub fn potts_cost(labels: usize) -> Array2<i32> {
    Array2::from_shape_fn((labels, labels), |(i, j)| i32::from(i != j))
}

/// 二标签 Potts 代价矩阵 `[[0, 1], [1, 0]]`.
#[inline]
pub fn binary_potts_cost() -> Array2<i32> {
    Array2::from_shape_fn((2, 2), |(i, j)| POTTS_COST[i][j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_edge_counts() {
        for h in 0..=6 {
            for w in 0..=6 {
                let edges = build_slice_graph(h, w);
                let first = edges.iter().filter(|e| e.weight == 18).count();
                let second = edges.iter().filter(|e| e.weight == 1).count();
                assert_eq!(first, first_order_edge_count(h, w));
                assert_eq!(second, second_order_edge_count(h, w));
            }
        }
        // 某一维小于 3 时, 该方向上没有二阶边
        assert_eq!(second_order_edge_count(2, 2), 0);
        assert_eq!(second_order_edge_count(1, 5), 3);
        assert_eq!(first_order_edge_count(4, 4), 24);
        assert_eq!(second_order_edge_count(4, 4), 16);
    }

    #[test]
    fn test_edge_layout() {
        // 0 1 2
        // 3 4 5
        let edges = build_slice_graph(2, 3);
        let expected = [
            Edge::new(0, 1, 18),
            Edge::new(1, 2, 18),
            Edge::new(3, 4, 18),
            Edge::new(4, 5, 18),
            Edge::new(0, 3, 18),
            Edge::new(1, 4, 18),
            Edge::new(2, 5, 18),
            Edge::new(0, 2, 1),
            Edge::new(3, 5, 1),
        ];
        assert_eq!(edges, expected);
    }

    #[test]
    fn test_unary_energies() {
        let s = Array2::from_shape_vec((1, 3), vec![0.0, 0.9, 1.0]).unwrap();
        let e = build_unary_energies(s.view(), s.view()).unwrap();
        assert_eq!(e.dim(), (3, 2));
        assert_eq!(e.row(0).to_vec(), vec![0, 4000]);
        assert_eq!(e.row(1).to_vec(), vec![3600, 400]);
        assert_eq!(e.row(2).to_vec(), vec![4000, 0]);
    }

    #[test]
    fn test_unary_energies_rounding() {
        // 0.00015 * 4000 = 0.6 -> 1
        let s = Array2::from_elem((1, 1), 0.00015);
        let e = build_unary_energies(s.view(), s.view()).unwrap();
        assert_eq!(e[(0, 0)], 1);
        assert_eq!(e[(0, 1)], 3999);
    }

    #[test]
    fn test_unary_energies_invalid() {
        let mut s = Array2::from_elem((2, 2), 0.5);
        s[(1, 0)] = f64::NAN;
        let e = build_unary_energies(s.view(), s.view()).unwrap_err();
        assert!(matches!(e, InvalidInputError::NonFiniteEnergy { index: 2, .. }));

        let inf = Array2::from_elem((1, 1), f64::INFINITY);
        assert!(build_unary_energies(inf.view(), inf.view()).is_err());

        let other = Array2::from_elem((1, 2), 0.5);
        assert!(build_unary_energies(s.view(), other.view()).is_err());
    }

    #[test]
    fn test_unary_energies_clamped() {
        // 超出 `i32` 范围的有限能量截断, 而不是报错.
        let s = Array2::from_shape_vec((1, 3), vec![1e12, -1e12, 1e7]).unwrap();
        let e = build_unary_energies(s.view(), s.view()).unwrap();
        assert_eq!(e.row(0).to_vec(), vec![i32::MAX, i32::MIN]);
        assert_eq!(e.row(1).to_vec(), vec![i32::MIN, i32::MAX]);
        assert_eq!(e.row(2).to_vec(), vec![i32::MAX, i32::MIN]);
    }

    #[test]
    fn test_potts() {
        assert_eq!(binary_potts_cost(), potts_cost(2));
        let p3 = potts_cost(3);
        assert_eq!(p3.diag().sum(), 0);
        assert_eq!(p3.sum(), 6);
    }
}
