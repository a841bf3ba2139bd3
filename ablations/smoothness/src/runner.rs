//! 程序运行函数.

use crate::result::{AblationResult, Outcome};
use ct_atlas::graph::EdgeWeights;
use ct_atlas::lung::{segment_lung_with_atlas_gaussian_using, GaussianLungParams, LungAtlasParams};
use ct_atlas::segment::{SegmentParams, SliceSegmenter};
use std::thread;
use std::time::Instant;
use utils::phantom::{self, ChestPhantom, LUNG_HU, TISSUE_HU};

/// 参与对比的边权重设置.
const SETTINGS: [(&str, EdgeWeights); 4] = [
    (
        "default",
        EdgeWeights {
            first_order: 18,
            second_order: 1,
        },
    ),
    (
        "no-smoothing",
        EdgeWeights {
            first_order: 0,
            second_order: 0,
        },
    ),
    (
        "first-order-only",
        EdgeWeights {
            first_order: 18,
            second_order: 0,
        },
    ),
    (
        "strong",
        EdgeWeights {
            first_order: 300,
            second_order: 20,
        },
    ),
];

/// 噪声幅度 (HU).
const NOISE: f64 = 450.0;

/// 图谱中心偏移 (体素).
const SHIFT: f64 = 1.5;

/// 在 `phantom` 上以 `weights` 运行一次分割.
fn run_one(phantom: &ChestPhantom, weights: EdgeWeights) -> Outcome {
    let params = GaussianLungParams::from_flat([LUNG_HU, 150.0, TISSUE_HU, 150.0, LUNG_HU, 150.0]);
    let segmenter = SliceSegmenter::new(SegmentParams {
        weights,
        ..Default::default()
    });

    let start = Instant::now();
    let seg = segment_lung_with_atlas_gaussian_using(
        &phantom.image,
        &phantom.atlases,
        &params,
        &LungAtlasParams::default(),
        &segmenter,
    );
    let elapsed = start.elapsed();

    seg.map(|s| {
        let [left, right] = &phantom.truth;
        Outcome::Done {
            left_dice: utils::dice(s.left(), left),
            right_dice: utils::dice(s.right(), right),
            conflicts: s.conflicts(),
            elapsed,
        }
    })
    .map_err(|e| e.to_string())
    .into()
}

/// 实际运行.
pub fn run() -> AblationResult {
    let slices = phantom::slices_from_env_or(8);
    let phantom = ChestPhantom::new((64, 96, slices), SHIFT, NOISE, 2024)
        .unwrap_or_else(|e| panic!("Phantom generation error: {e}"));
    let p = &phantom;

    println!(
        "Running ablation studies on {} cpus, phantom shape {:?}...",
        utils::cpus(),
        p.image.dim()
    );
    thread::scope(|s| {
        let handles = SETTINGS.map(|(_, w)| s.spawn(move || run_one(p, w)));

        AblationResult::from_iter(
            SETTINGS.map(|(name, _)| name).into_iter().zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
