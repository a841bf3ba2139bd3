//! 逐切片的二值图割分割.
//!
//! 对一个结构的后验体积, 在每个 `(L, M)` 切片上构建 MRF 能量图并求解, 将结果拼回
//! 3D 标签体积, 最后进行空洞填充. 切片之间互不依赖, 启用 `rayon` 特性时并行求解.

use crate::consts::energy::{ENERGY_SCALE, FILL_PASSES};
use crate::consts::gray::FOREGROUND;
use crate::cut::{CutParams, GraphCutSolver, MaxFlowSolver};
use crate::error::{InvalidInputError, SegmentError, SegmentResult, SegmentationFailure};
use crate::graph::{binary_potts_cost, build_slice_graph_weighted, build_unary_energies_scaled};
use crate::graph::{Edge, EdgeWeights};
use crate::morph::fill_holes;
use crate::volume::{ensure_shape, slice_at, slice_shape_of, LabelVolume, Volume, SLICE_AXIS};
use ndarray::{Array2, ArrayViewMut2};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

static DEFAULT_SOLVER: MaxFlowSolver = MaxFlowSolver;

/// 分割参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentParams {
    /// 一阶/二阶边权重.
    pub weights: EdgeWeights,

    /// 后验到整数一元能量的缩放倍数.
    pub energy_scale: f64,

    /// 图割之后的空洞填充次数.
    pub fill_passes: usize,

    /// 图割参数.
    pub cut: CutParams,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            weights: EdgeWeights::default(),
            energy_scale: ENERGY_SCALE,
            fill_passes: FILL_PASSES,
            cut: CutParams::default(),
        }
    }
}

/// 取消令牌. 克隆得到的令牌共享同一个标志.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// 创建未取消的令牌.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消. 正在求解的切片会完成, 之后的切片不再开始.
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// 是否已请求取消?
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 单个结构的逐切片分割器.
#[derive(Clone)]
pub struct SliceSegmenter<'s> {
    params: SegmentParams,
    solver: &'s dyn GraphCutSolver,
    cancel: Option<CancelToken>,
}

impl Default for SliceSegmenter<'static> {
    fn default() -> Self {
        Self::new(SegmentParams::default())
    }
}

impl std::fmt::Debug for SliceSegmenter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceSegmenter")
            .field("params", &self.params)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl SliceSegmenter<'static> {
    /// 使用默认求解器 [`MaxFlowSolver`] 创建分割器.
    pub fn new(params: SegmentParams) -> Self {
        Self {
            params,
            solver: &DEFAULT_SOLVER,
            cancel: None,
        }
    }
}

impl<'s> SliceSegmenter<'s> {
    /// 替换图割求解器.
    pub fn with_solver<'t>(self, solver: &'t dyn GraphCutSolver) -> SliceSegmenter<'t> {
        SliceSegmenter {
            params: self.params,
            solver,
            cancel: self.cancel,
        }
    }

    /// 设置取消令牌. 每个切片开始求解前检查一次.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 分割参数.
    #[inline]
    pub fn params(&self) -> &SegmentParams {
        &self.params
    }

    /// 分割编号为 `structure` 的结构, 返回 `{0, 1}` 标签体积.
    ///
    /// `posterior` 与 `not_posterior` 形状必须一致. 任一切片图割失败时, 整个结构的结果作废,
    /// 返回 [`SegmentError::Failure`]. 并行模式下, 若有多个切片失败, 报告哪一个是不确定的.
    pub fn segment(
        &self,
        structure: usize,
        posterior: &Volume,
        not_posterior: &Volume,
    ) -> SegmentResult<LabelVolume> {
        let (h, w) = slice_shape_of(posterior);
        let edges = build_slice_graph_weighted(h, w, self.params.weights);
        self.segment_with_edges(structure, &edges, posterior, not_posterior)
    }

    /// 同 [`segment`](Self::segment), 但使用调用方提供的 (形状匹配的) 边列表.
    pub fn segment_with_edges(
        &self,
        structure: usize,
        edges: &[Edge],
        posterior: &Volume,
        not_posterior: &Volume,
    ) -> SegmentResult<LabelVolume> {
        if posterior.is_empty() {
            return Err(InvalidInputError::EmptyVolume.into());
        }
        ensure_shape(posterior.dim(), not_posterior.dim())?;

        let pairwise = binary_potts_cost();
        let mut out = LabelVolume::zeros(posterior.raw_dim());
        let solve = |s: usize, dst: ArrayViewMut2<u8>| {
            self.solve_slice(structure, s, edges, &pairwise, posterior, not_posterior, dst)
        };

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                out.axis_iter_mut(SLICE_AXIS)
                    .into_par_iter()
                    .enumerate()
                    .try_for_each(|(s, dst)| solve(s, dst))?;
            } else {
                out.axis_iter_mut(SLICE_AXIS)
                    .enumerate()
                    .try_for_each(|(s, dst)| solve(s, dst))?;
            }
        }

        for pass in 0..self.params.fill_passes {
            let filled = fill_holes(&mut out);
            log::debug!("结构 {structure}: 第 {pass} 次空洞填充, 填充 {filled} 个体素");
        }
        log::info!(
            "结构 {structure}: 分割完成, 共 {} 个前景体素",
            out.iter().filter(|&&v| v == FOREGROUND).count()
        );
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_slice(
        &self,
        structure: usize,
        s: usize,
        edges: &[Edge],
        pairwise: &Array2<i32>,
        posterior: &Volume,
        not_posterior: &Volume,
        mut dst: ArrayViewMut2<u8>,
    ) -> SegmentResult<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(SegmentError::Cancelled {
                structure,
                slice: s,
            });
        }

        let unary = build_unary_energies_scaled(
            slice_at(posterior, s),
            slice_at(not_posterior, s),
            self.params.energy_scale,
        )?;
        let labels = self
            .solver
            .cut_from_graph(edges, unary.view(), pairwise.view(), &self.params.cut)
            .map_err(|source| SegmentationFailure {
                structure,
                slice: s,
                source,
            })?;

        // 求解器按行优先返回每个节点的标签.
        let w = dst.ncols();
        debug_assert_eq!(labels.len(), dst.len());
        for ((r, c), v) in dst.indexed_iter_mut() {
            *v = labels[r * w + c];
        }
        log::debug!("结构 {structure}: 切片 {s} 求解完成");
        Ok(())
    }
}

/// 以默认参数和默认求解器分割单个结构.
#[inline]
pub fn segment_structure(posterior: &Volume, not_posterior: &Volume) -> SegmentResult<LabelVolume> {
    SliceSegmenter::default().segment(0, posterior, not_posterior)
}
