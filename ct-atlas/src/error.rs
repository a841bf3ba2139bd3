//! 运行时错误.

use crate::Idx3d;
use thiserror::Error;

/// 输入不满足前置条件. 出现该错误时不会产生任何 (部分正确的) 结果.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    /// 结构集合为空.
    #[error("结构集合为空")]
    EmptyStructureSet,

    /// 体积数据至少有一个维度为零.
    #[error("体积数据为空")]
    EmptyVolume,

    /// 结构集合长度不一致.
    #[error("结构个数不一致: 期望 {expected}, 实际 {found}")]
    LengthMismatch {
        /// 期望长度.
        expected: usize,
        /// 实际长度.
        found: usize,
    },

    /// 体积形状不一致.
    #[error("体积形状不一致: 期望 {expected:?}, 实际 {found:?}")]
    ShapeMismatch {
        /// 期望形状.
        expected: Idx3d,
        /// 实际形状.
        found: Idx3d,
    },

    /// 第 `structure` 个归一化体积在 `index` 处为零.
    #[error("第 {structure} 个归一化体积在 {index:?} 处为零")]
    ZeroNormalization {
        /// 结构索引.
        structure: usize,
        /// 体素索引.
        index: Idx3d,
    },

    /// 缩放后的一元能量不是有限值.
    #[error("节点 {index} 的缩放能量 {value} 不是有限值")]
    NonFiniteEnergy {
        /// 节点编号 (行优先).
        index: usize,
        /// 缩放后 (取整前) 的值.
        value: f64,
    },

    /// 概率图谱个数不是 2.
    #[error("需要恰好 2 个概率图谱 (左, 右), 实际 {0} 个")]
    AtlasCount(usize),

    /// 结构个数超出单个 `u8` 标签图能表示的范围.
    #[error("结构个数 {0} 超过 254, 无法合并为单个标签图")]
    TooManyStructures(usize),

    /// 第 `structure` 个图谱二值化后为空, 无法计算距离图.
    #[error("第 {structure} 个图谱二值化后为空")]
    EmptyAtlas {
        /// 结构索引.
        structure: usize,
    },
}

/// 图割求解器报告的错误.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// 边引用了不存在的节点.
    #[error("边 {edge} 引用了越界节点 (节点总数 {nodes})")]
    NodeOutOfRange {
        /// 边的序号.
        edge: usize,
        /// 节点总数.
        nodes: usize,
    },

    /// 边权为负.
    #[error("边 {edge} 的权重为负: {weight}")]
    NegativeWeight {
        /// 边的序号.
        edge: usize,
        /// 权重.
        weight: i32,
    },

    /// 一元能量矩阵形状非法.
    #[error("一元能量矩阵形状非法: {0:?}")]
    UnaryShape((usize, usize)),

    /// 成对代价矩阵形状与标签数不符.
    #[error("成对代价矩阵形状 {found:?} 与标签数 {labels} 不符")]
    PairwiseShape {
        /// 实际形状.
        found: (usize, usize),
        /// 标签数.
        labels: usize,
    },

    /// 成对代价不是度量, 扩展移动无法保证子模性.
    #[error("成对代价不满足度量条件")]
    NonMetricPairwise,

    /// 标签数不在 `2..=255` 范围内.
    #[error("标签数 {0} 不受支持")]
    LabelCount(usize),
}

/// 某结构在某切片上的图割失败.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("结构 {structure} 在切片 {slice} 上图割失败: {source}")]
pub struct SegmentationFailure {
    /// 结构索引.
    pub structure: usize,

    /// 切片索引.
    pub slice: usize,

    /// 求解器报告的原因.
    #[source]
    pub source: SolveError,
}

/// 分割流程的顶层错误.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// 前置条件不满足.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// 图割失败. 对应结构的整个标签体积作废.
    #[error(transparent)]
    Failure(#[from] SegmentationFailure),

    /// 在处理 `slice` 之前被取消.
    #[error("结构 {structure} 在切片 {slice} 处被取消")]
    Cancelled {
        /// 结构索引.
        structure: usize,
        /// 切片索引.
        slice: usize,
    },
}

/// 分割流程结果.
pub type SegmentResult<T> = Result<T, SegmentError>;
