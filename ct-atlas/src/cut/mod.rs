//! 图割求解 (能量最小化).
//!
//! 给定边列表, 每个节点的一元能量和成对代价矩阵, 求使
//! `Σ unary(node, label) + Σ weight * pairwise(label_a, label_b)` 最小的标签.
//! 分割流程只依赖 [`GraphCutSolver`] 接口; [`MaxFlowSolver`] 是默认实现.

mod maxflow;
mod moves;

use crate::consts::energy::CUT_ITERATIONS;
use crate::error::SolveError;
use crate::graph::Edge;
use ndarray::ArrayView2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 多标签图割的移动方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Algorithm {
    /// α-扩展. 要求成对代价是度量.
    #[default]
    Expansion,

    /// α-β 交换. 要求成对代价是半度量.
    Swap,
}

/// 图割参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CutParams {
    /// 移动方式.
    pub algorithm: Algorithm,

    /// 最多迭代轮数 (每轮遍历所有标签或标签对). 负数表示迭代至收敛.
    pub n_iter: i32,
}

impl Default for CutParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Expansion,
            n_iter: CUT_ITERATIONS,
        }
    }
}

/// 图割求解器.
///
/// 实现者必须可重入: 分割流程可能在多个线程上同时调用同一个求解器.
pub trait GraphCutSolver: Sync {
    /// 求解并返回每个节点的标签. 标签数为 `unary.ncols()`.
    ///
    /// - `edges`: 边列表, 节点编号为 `0..unary.nrows()`;
    /// - `unary`: 形状 `(节点数, 标签数)`, 第 `(p, l)` 项为节点 `p` 取标签 `l` 的代价;
    /// - `pairwise`: 形状 `(标签数, 标签数)` 的代价矩阵, 与边权相乘.
    fn cut_from_graph(
        &self,
        edges: &[Edge],
        unary: ArrayView2<i32>,
        pairwise: ArrayView2<i32>,
        params: &CutParams,
    ) -> Result<Vec<u8>, SolveError>;
}

/// 基于最大流/最小割的求解器.
///
/// 从全 0 标签出发, 逐轮执行 α-扩展 (或 α-β 交换) 移动, 每次移动都是一次精确的
/// s-t 最小割, 直到能量不再下降或达到迭代上限. 对于二标签的 Potts 代价,
/// 第一轮就能得到全局最优解.
#[derive(Copy, Clone, Debug, Default)]
pub struct MaxFlowSolver;

impl GraphCutSolver for MaxFlowSolver {
    fn cut_from_graph(
        &self,
        edges: &[Edge],
        unary: ArrayView2<i32>,
        pairwise: ArrayView2<i32>,
        params: &CutParams,
    ) -> Result<Vec<u8>, SolveError> {
        validate(edges, unary, pairwise, params.algorithm)?;
        let mut labels = vec![0u8; unary.nrows()];
        let mut energy = labeling_energy(edges, unary, pairwise, &labels);

        let mut round = 0;
        while params.n_iter < 0 || round < params.n_iter {
            let before = energy;
            energy = match params.algorithm {
                Algorithm::Expansion => {
                    moves::expansion_round(edges, unary, pairwise, &mut labels, energy)
                }
                Algorithm::Swap => moves::swap_round(edges, unary, pairwise, &mut labels, energy),
            };
            debug_assert!(energy <= before);
            if energy == before {
                break;
            }
            round += 1;
        }
        Ok(labels)
    }
}

/// 计算标签 `labels` 的总能量.
///
/// `labels` 的长度必须为节点数, 且所有标签都小于 `unary.ncols()`, 否则 panic.
pub fn labeling_energy(
    edges: &[Edge],
    unary: ArrayView2<i32>,
    pairwise: ArrayView2<i32>,
    labels: &[u8],
) -> i64 {
    let data: i64 = labels
        .iter()
        .enumerate()
        .map(|(p, &l)| unary[(p, l as usize)] as i64)
        .sum();
    let smooth: i64 = edges
        .iter()
        .map(|e| {
            let (la, lb) = (labels[e.a as usize] as usize, labels[e.b as usize] as usize);
            e.weight as i64 * pairwise[(la, lb)] as i64
        })
        .sum();
    data + smooth
}

/// 检查输入合法性.
fn validate(
    edges: &[Edge],
    unary: ArrayView2<i32>,
    pairwise: ArrayView2<i32>,
    algorithm: Algorithm,
) -> Result<(), SolveError> {
    let (nodes, labels) = unary.dim();
    if labels == 0 {
        return Err(SolveError::UnaryShape((nodes, labels)));
    }
    if !(2..=u8::MAX as usize).contains(&labels) {
        return Err(SolveError::LabelCount(labels));
    }
    if pairwise.dim() != (labels, labels) {
        return Err(SolveError::PairwiseShape {
            found: pairwise.dim(),
            labels,
        });
    }
    for (i, e) in edges.iter().enumerate() {
        let in_range = |v: i32| v >= 0 && (v as usize) < nodes;
        if !in_range(e.a) || !in_range(e.b) {
            return Err(SolveError::NodeOutOfRange { edge: i, nodes });
        }
        if e.weight < 0 {
            return Err(SolveError::NegativeWeight {
                edge: i,
                weight: e.weight,
            });
        }
    }

    // 半度量: V(a, a) = 0, V(a, b) = V(b, a) >= 0.
    let semi_metric = (0..labels).all(|a| {
        pairwise[(a, a)] == 0
            && (0..labels).all(|b| pairwise[(a, b)] >= 0 && pairwise[(a, b)] == pairwise[(b, a)])
    });
    // 度量: 额外满足三角不等式.
    let metric = || {
        (0..labels).all(|a| {
            (0..labels).all(|b| {
                (0..labels).all(|c| {
                    pairwise[(a, c)] as i64 <= pairwise[(a, b)] as i64 + pairwise[(b, c)] as i64
                })
            })
        })
    };
    match algorithm {
        Algorithm::Swap if semi_metric => Ok(()),
        Algorithm::Expansion if semi_metric && metric() => Ok(()),
        _ => Err(SolveError::NonMetricPairwise),
    }
}
