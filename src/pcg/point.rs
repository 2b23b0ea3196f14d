//! Point type consumed and produced by the point elements.

use crate::core::types::Vec3;
use crate::math::Aabb;

/// A single procedural point.
///
/// `extents` are half extents around `location`. Points are plain values;
/// order inside a point set only matters for tie-breaks.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PcgPoint {
    pub location: Vec3,
    pub extents: Vec3,
    pub density: f32,
    pub seed: u32,
}

impl Default for PcgPoint {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            extents: Vec3::splat(50.0),
            density: 1.0,
            seed: 0,
        }
    }
}

impl PcgPoint {
    pub fn new(location: Vec3, extents: Vec3, seed: u32) -> Self {
        Self {
            location,
            extents,
            density: 1.0,
            seed,
        }
    }

    /// World-space box around the point.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.location, self.extents)
    }

    /// Squared length of the half extents, used as the size key for pruning.
    pub fn size_key(&self) -> f32 {
        self.extents.length_squared()
    }

    /// Copy with density forced to zero.
    pub fn with_zero_density(mut self) -> Self {
        self.density = 0.0;
        self
    }
}
