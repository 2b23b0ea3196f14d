//! Data payloads flowing between point elements.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::core::{Error, Result};
use crate::core::types::Vec3;
use crate::math::Aabb;
use super::octree::PointOctree;
use super::point::PcgPoint;
use super::random::compute_seed3;

/// Ordered point set with a lazily built octree.
///
/// The octree is built on first request and never changes afterwards; a
/// different point set always means a new `PointData`.
#[derive(Default)]
pub struct PointData {
    points: Vec<PcgPoint>,
    octree: OnceLock<PointOctree>,
}

impl Clone for PointData {
    fn clone(&self) -> Self {
        Self::new(self.points.clone())
    }
}

impl std::fmt::Debug for PointData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointData")
            .field("points", &self.points.len())
            .field("octree_built", &self.octree.get().is_some())
            .finish()
    }
}

impl PointData {
    pub fn new(points: Vec<PcgPoint>) -> Self {
        Self {
            points,
            octree: OnceLock::new(),
        }
    }

    pub fn points(&self) -> &[PcgPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Octree over this point set, built on first call.
    pub fn octree(&self) -> &PointOctree {
        self.octree.get_or_init(|| PointOctree::build(&self.points))
    }

    /// Union of all point boxes.
    pub fn bounds(&self) -> Aabb {
        self.points
            .iter()
            .fold(Aabb::EMPTY, |acc, p| acc.merged(&p.bounds()))
    }
}

/// Upper bound on points produced by sampling one volume.
pub const MAX_SAMPLED_POINTS: usize = 1 << 26;

/// Box volume that can be sampled into points.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolumeData {
    pub bounds: Aabb,
    /// Edge length of a sampling cell
    pub voxel_size: Vec3,
}

impl VolumeData {
    pub fn new(bounds: Aabb, voxel_size: Vec3) -> Self {
        Self { bounds, voxel_size }
    }

    /// One point per cell center, extents of half a cell.
    pub fn to_point_data(&self) -> Result<PointData> {
        if !self.bounds.is_valid() {
            return Err(Error::InvalidInput(format!(
                "volume bounds are inverted: {:?}",
                self.bounds
            )));
        }
        if self.voxel_size.cmple(Vec3::ZERO).any() {
            return Err(Error::InvalidInput(format!(
                "voxel size must be positive, got {:?}",
                self.voxel_size
            )));
        }

        // Saturating casts, NaN becomes 0
        let cells = (self.bounds.size() / self.voxel_size).floor();
        let (nx, ny, nz) = (cells.x as usize, cells.y as usize, cells.z as usize);

        let count = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .filter(|&n| n <= MAX_SAMPLED_POINTS)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "volume of {}x{}x{} cells exceeds {} sampled points",
                    nx, ny, nz, MAX_SAMPLED_POINTS
                ))
            })?;

        let half = self.voxel_size * 0.5;
        let mut points = Vec::with_capacity(count);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let cell = Vec3::new(x as f32, y as f32, z as f32);
                    let location = self.bounds.min + cell * self.voxel_size + half;
                    let seed = compute_seed3(x as u32, y as u32, z as u32);
                    points.push(PcgPoint::new(location, half, seed));
                }
            }
        }
        Ok(PointData::new(points))
    }
}

/// Named non-spatial values.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttributeSet {
    pub values: BTreeMap<String, f64>,
}

/// Payload carried by a tagged data entry.
#[derive(Clone, Debug)]
pub enum PcgData {
    Points(PointData),
    Volume(VolumeData),
    Attributes(AttributeSet),
}

impl PcgData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PcgData::Points(_) => "points",
            PcgData::Volume(_) => "volume",
            PcgData::Attributes(_) => "attributes",
        }
    }

    pub fn is_spatial(&self) -> bool {
        !matches!(self, PcgData::Attributes(_))
    }

    /// Borrow existing point data or sample spatial data into points.
    pub fn to_point_data(&self) -> Result<std::borrow::Cow<'_, PointData>> {
        match self {
            PcgData::Points(points) => Ok(std::borrow::Cow::Borrowed(points)),
            PcgData::Volume(volume) => volume.to_point_data().map(std::borrow::Cow::Owned),
            PcgData::Attributes(_) => Err(Error::InvalidInput(
                "attribute set cannot be converted to point data".into(),
            )),
        }
    }
}

/// One entry of a batch: a payload and its tags.
#[derive(Clone, Debug)]
pub struct TaggedData {
    pub data: Arc<PcgData>,
    pub tags: BTreeSet<String>,
}

impl TaggedData {
    pub fn new(data: PcgData) -> Self {
        Self {
            data: Arc::new(data),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// New entry with a different payload and the same tags.
    pub fn replace_data(&self, data: PcgData) -> Self {
        Self {
            data: Arc::new(data),
            tags: self.tags.clone(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Ordered batch of tagged data.
#[derive(Clone, Debug, Default)]
pub struct DataCollection {
    pub tagged_data: Vec<TaggedData>,
}

impl DataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<PcgPoint>) -> Self {
        Self {
            tagged_data: vec![TaggedData::new(PcgData::Points(PointData::new(points)))],
        }
    }

    pub fn push(&mut self, entry: TaggedData) {
        self.tagged_data.push(entry);
    }

    pub fn len(&self) -> usize {
        self.tagged_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tagged_data.is_empty()
    }

    /// Entries carrying `tag`.
    pub fn tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TaggedData> + 'a {
        self.tagged_data.iter().filter(move |d| d.has_tag(tag))
    }

    /// Point payloads of all entries, skipping non-point entries.
    pub fn point_sets(&self) -> impl Iterator<Item = &PointData> {
        self.tagged_data.iter().filter_map(|d| match d.data.as_ref() {
            PcgData::Points(points) => Some(points),
            _ => None,
        })
    }
}
