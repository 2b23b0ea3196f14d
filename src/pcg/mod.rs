//! Procedural point filtering: sampling and self pruning over point sets.
//!
//! Point sets live in `PointData`, which carries a lazily built octree for
//! overlap queries. Elements run over `DataCollection` batches; see
//! [`elements::ElementSettings`].

pub mod random;
pub mod point;
pub mod octree;
pub mod data;
pub mod elements;

pub use random::{RandomStream, compute_seed, compute_seed3};
pub use point::PcgPoint;
pub use octree::{PointOctree, SpatialIndex, LinearIndex};
pub use data::{PointData, VolumeData, AttributeSet, PcgData, TaggedData, DataCollection};
pub use elements::{
    ElementSettings, ExecutionOptions,
    PointSamplerSettings, SelfPruningSettings, PruningType,
};
