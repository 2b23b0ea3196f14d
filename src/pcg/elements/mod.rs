//! Point elements and their batch execution.
//!
//! The set of element kinds is closed, so dispatch is a single match over
//! `ElementSettings`. Each tagged entry of a batch is processed on its own;
//! a failing entry is logged and dropped without failing the batch.

pub mod point_sampler;
pub mod self_pruning;

pub use point_sampler::{PointSamplerSettings, sample_points, sample_points_parallel};
pub use self_pruning::{PruningType, SelfPruningSettings, prune_indices, prune_points};

use rayon::prelude::*;

use crate::core::Result;
use super::data::{DataCollection, PcgData, PointData, TaggedData};

/// Settings of one element, tagged by kind.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "element")]
pub enum ElementSettings {
    /// Pass inputs through unchanged
    Trivial,
    PointSampler(PointSamplerSettings),
    SelfPruning(SelfPruningSettings),
}

/// Per-call execution options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutionOptions {
    /// Process tagged entries (and large point sets) on the rayon pool
    pub parallel: bool,
}

impl ElementSettings {
    pub fn name(&self) -> &'static str {
        match self {
            ElementSettings::Trivial => "Trivial",
            ElementSettings::PointSampler(_) => "PointSampler",
            ElementSettings::SelfPruning(_) => "SelfPruning",
        }
    }

    /// Run this element over every entry of `input`.
    ///
    /// Output entries keep their input tags and relative order. Entries that
    /// fail are logged and produce no output.
    pub fn execute(&self, input: &DataCollection, options: &ExecutionOptions) -> DataCollection {
        if let ElementSettings::Trivial = self {
            return input.clone();
        }

        let tagged_data: Vec<TaggedData> = if options.parallel {
            input
                .tagged_data
                .par_iter()
                .enumerate()
                .filter_map(|(i, entry)| self.execute_entry_logged(i, entry, options))
                .collect()
        } else {
            input
                .tagged_data
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| self.execute_entry_logged(i, entry, options))
                .collect()
        };

        DataCollection { tagged_data }
    }

    fn execute_entry_logged(&self, slot: usize, entry: &TaggedData, options: &ExecutionOptions) -> Option<TaggedData> {
        match self.execute_entry(entry, options) {
            Ok(output) => Some(output),
            Err(e) => {
                log::error!(
                    "{}: skipping input {} ({}): {}",
                    self.name(),
                    slot,
                    entry.data.kind_name(),
                    e
                );
                None
            }
        }
    }

    /// Run this element over a single entry.
    pub fn execute_entry(&self, entry: &TaggedData, options: &ExecutionOptions) -> Result<TaggedData> {
        let points = match self {
            ElementSettings::Trivial => return Ok(entry.clone()),
            ElementSettings::PointSampler(settings) => {
                let point_data = entry.data.to_point_data()?;
                if options.parallel {
                    sample_points_parallel(point_data.points(), settings)
                } else {
                    sample_points(point_data.points(), settings)
                }
            }
            ElementSettings::SelfPruning(settings) => {
                let point_data = entry.data.to_point_data()?;
                prune_points(point_data.points(), Some(point_data.octree()), settings)?
            }
        };

        Ok(entry.replace_data(PcgData::Points(PointData::new(points))))
    }
}
