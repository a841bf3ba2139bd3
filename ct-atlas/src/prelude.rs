//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::volume::{LabelVolume, StructureSet, Volume, SLICE_AXIS};

pub use crate::error::{
    InvalidInputError, SegmentError, SegmentResult, SegmentationFailure, SolveError,
};

pub use crate::consts::gray::{BACKGROUND, FOREGROUND};

pub use crate::cut::{Algorithm, CutParams, GraphCutSolver, MaxFlowSolver};
pub use crate::graph::EdgeWeights;
pub use crate::posterior::compute_posteriors;
pub use crate::segment::{segment_structure, CancelToken, SegmentParams, SliceSegmenter};
pub use crate::overlap::{merge_labels, resolve};
pub use crate::pipeline::{segment_chest_with_atlas, segment_chest_with_atlas_using, AtlasSegmentation};

pub use crate::lung::{
    segment_lung_with_atlas, segment_lung_with_atlas_gaussian, ExpLungParams,
    GaussianLungParams, LungAtlasParams, LungSegmentation,
};
