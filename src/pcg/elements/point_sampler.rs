//! Stochastic point sampling.
//!
//! Keeps each point independently with probability `ratio`. The draw for a
//! point depends only on the global seed and the point's own seed.

use rayon::prelude::*;

use crate::pcg::point::PcgPoint;
use crate::pcg::random::{compute_seed, RandomStream};

/// Inputs smaller than this are sampled on the calling thread even when
/// parallelism is requested.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// Configuration for the point sampler.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PointSamplerSettings {
    /// Probability of keeping a point, in [0, 1]
    pub ratio: f32,
    /// Global seed combined with each point's seed
    pub seed: u32,
    /// Keep rejected points with zero density instead of dropping them
    pub keep_zero_density_points: bool,
}

impl Default for PointSamplerSettings {
    fn default() -> Self {
        Self {
            ratio: 0.1,
            seed: 0,
            keep_zero_density_points: false,
        }
    }
}

impl PointSamplerSettings {
    pub fn new(ratio: f32, seed: u32) -> Self {
        Self {
            ratio,
            seed,
            ..Default::default()
        }
    }
}

/// Whether the per-point draw keeps `point`.
#[inline]
pub fn should_keep(point: &PcgPoint, seed: u32, ratio: f32) -> bool {
    RandomStream::new(compute_seed(seed, point.seed)).frand() < ratio
}

fn resolve(point: &PcgPoint, settings: &PointSamplerSettings) -> Option<PcgPoint> {
    if should_keep(point, settings.seed, settings.ratio) {
        Some(*point)
    } else if settings.keep_zero_density_points {
        Some(point.with_zero_density())
    } else {
        None
    }
}

enum FastPath {
    Reject,
    Accept,
}

fn fast_path(settings: &PointSamplerSettings) -> Option<FastPath> {
    // NaN falls through to the reject path
    if !(settings.ratio > 0.0) {
        log::debug!("Point sampler ratio {} <= 0, rejecting all points", settings.ratio);
        return Some(FastPath::Reject);
    }
    if settings.ratio >= 1.0 {
        log::debug!("Point sampler ratio {} >= 1, passing points through", settings.ratio);
        return Some(FastPath::Accept);
    }
    None
}

fn apply_fast_path(path: FastPath, points: &[PcgPoint], settings: &PointSamplerSettings) -> Vec<PcgPoint> {
    match path {
        FastPath::Accept => points.to_vec(),
        FastPath::Reject if settings.keep_zero_density_points => {
            points.iter().map(|p| p.with_zero_density()).collect()
        }
        FastPath::Reject => Vec::new(),
    }
}

/// Sample `points` on the calling thread. Output keeps input order.
pub fn sample_points(points: &[PcgPoint], settings: &PointSamplerSettings) -> Vec<PcgPoint> {
    if let Some(path) = fast_path(settings) {
        return apply_fast_path(path, points, settings);
    }

    let sampled: Vec<PcgPoint> = points.iter().filter_map(|p| resolve(p, settings)).collect();

    log::trace!("Point sampler kept {} of {} points", sampled.len(), points.len());
    sampled
}

/// Sample `points` across the rayon pool. Same output as `sample_points`.
pub fn sample_points_parallel(points: &[PcgPoint], settings: &PointSamplerSettings) -> Vec<PcgPoint> {
    if points.len() < PARALLEL_THRESHOLD {
        return sample_points(points, settings);
    }
    if let Some(path) = fast_path(settings) {
        return apply_fast_path(path, points, settings);
    }

    points.par_iter().filter_map(|p| resolve(p, settings)).collect()
}
