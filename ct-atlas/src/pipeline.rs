//! 基于图谱的多结构分割流程: 后验计算, 逐结构图割分割, 冲突消解.

use crate::error::SegmentResult;
use crate::graph::build_slice_graph_weighted;
use crate::overlap::{merge_labels, resolve};
use crate::posterior::compute_posteriors;
use crate::segment::SliceSegmenter;
use crate::volume::{slice_shape_of, LabelVolume, StructureSet, Volume};

pub use crate::segment::SegmentParams;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 多结构分割结果.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasSegmentation {
    /// 每个结构的 `{0, 1}` 标签体积, 已消解冲突.
    pub labels: StructureSet<u8>,

    /// 消解前被多个结构同时标记的体素个数.
    pub conflicts: usize,
}

impl AtlasSegmentation {
    /// 第 `d` 个结构的标签体积.
    #[inline]
    pub fn structure(&self, d: usize) -> Option<&LabelVolume> {
        self.labels.get(d)
    }

    /// 合并为单个标签图: 背景为 0, 第 `d` 个结构为 `d + 1`.
    pub fn label_map(&self) -> LabelVolume {
        // 构造时已保证非空且形状一致; 结构数超限时退化为只保留前 254 个.
        let labels = self.labels.as_slice();
        let n = labels.len().min(u8::MAX as usize - 1);
        merge_labels(&labels[..n]).unwrap_or_else(|_| LabelVolume::zeros(self.labels.shape()))
    }
}

/// 以默认参数运行分割流程. 见 [`segment_chest_with_atlas_using`].
pub fn segment_chest_with_atlas(
    likelihoods: &StructureSet<f64>,
    priors: &StructureSet<f64>,
    normalization: &StructureSet<f64>,
) -> SegmentResult<AtlasSegmentation> {
    segment_chest_with_atlas_using(likelihoods, priors, normalization, &SliceSegmenter::default())
}

/// 运行分割流程:
///
/// 1. 计算每个结构的后验 `likelihood * prior / normalization`;
/// 2. 用 `segmenter` 逐结构分割. 结构的后验同时作为 "属于" 和 "不属于" 两个输入;
/// 3. 消解多个结构之间的标签冲突.
///
/// 启用 `rayon` 特性时, 结构之间与切片之间都并行求解.
/// 任一结构分割失败时直接返回错误, 不会对部分结果做冲突消解.
pub fn segment_chest_with_atlas_using(
    likelihoods: &StructureSet<f64>,
    priors: &StructureSet<f64>,
    normalization: &StructureSet<f64>,
    segmenter: &SliceSegmenter,
) -> SegmentResult<AtlasSegmentation> {
    let posteriors = compute_posteriors(likelihoods, priors, normalization)?;
    log::info!(
        "开始分割 {} 个结构, 体积形状 {:?}",
        posteriors.len(),
        posteriors.shape()
    );

    // 所有切片形状相同, 边列表只需构建一次.
    let (h, w) = slice_shape_of(&posteriors[0]);
    let edges = build_slice_graph_weighted(h, w, segmenter.params().weights);
    let segment = |(d, p): (usize, &Volume)| segmenter.segment_with_edges(d, &edges, p, p);

    #[cfg(feature = "rayon")]
    let labels = posteriors
        .as_slice()
        .into_par_iter()
        .enumerate()
        .map(segment)
        .collect::<SegmentResult<Vec<_>>>()?;
    #[cfg(not(feature = "rayon"))]
    let labels = posteriors
        .iter()
        .enumerate()
        .map(segment)
        .collect::<SegmentResult<Vec<_>>>()?;

    let mut labels = StructureSet::new(labels)?;
    let conflicts = resolve(labels.as_mut_slice(), posteriors.as_slice())?;
    Ok(AtlasSegmentation { labels, conflicts })
}
