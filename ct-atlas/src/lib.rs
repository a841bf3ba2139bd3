#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 基于概率图谱和图割的胸部 CT 结构 (左右肺) 分割.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 输入体积的形状为 `(L, M, N)`, 最后一维是切片方向. 本 crate 不负责图像读写,
//!   重采样和强度标准化, 调用方需提供已经预处理好的数据.
//! 2. 前置条件不满足时返回 [`InvalidInputError`], 不会产生部分正确的结果.
//!
//! # 流程
//!
//! ### 后验概率 ✅
//!
//! `likelihood * prior / normalization`, 逐结构, 逐体素.
//!
//! 实现位于 `ct-atlas/src/posterior.rs`.
//!
//! ### 切片能量图与图割 ✅
//!
//! 每个 `(L, M)` 切片是一个二值 MRF: 一阶 (4-相邻) 边权重 18, 二阶 (隔一个像素) 边权重 1,
//! 一元能量由后验缩放 4000 倍得到. 求解器接口为 [`GraphCutSolver`],
//! 默认实现基于最大流的 α-扩展.
//!
//! 实现位于 `ct-atlas/src/graph.rs` 和 `ct-atlas/src/cut`.
//!
//! ### 逐切片分割 & 空洞填充 ✅
//!
//! 启用 `rayon` 特性时切片并行求解, 支持按切片粒度取消.
//!
//! 实现位于 `ct-atlas/src/segment.rs` 和 `ct-atlas/src/morph.rs`.
//!
//! ### 冲突消解 ✅
//!
//! 被多个结构同时标记的体素只保留后验最大的结构.
//!
//! 实现位于 `ct-atlas/src/overlap.rs`.
//!
//! ### 左右肺图谱分割 ✅
//!
//! 强度高斯模型和强度-距离指数模型两种变体.
//!
//! 实现位于 `ct-atlas/src/lung`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;
pub mod cut;
pub mod error;
pub mod graph;
pub mod lung;
pub mod morph;
pub mod overlap;
pub mod pipeline;
pub mod posterior;
pub mod prelude;
pub mod segment;
pub mod volume;

pub use cut::{GraphCutSolver, MaxFlowSolver};
pub use error::{InvalidInputError, SegmentError, SegmentationFailure, SolveError};
pub use pipeline::{segment_chest_with_atlas, segment_chest_with_atlas_using};
pub use volume::{LabelVolume, StructureSet, Volume};
