//! Self pruning: removes points whose box overlaps an already accepted point.
//!
//! Points are visited in priority order (by size, or by seed, or input order).
//! Each visited point that has not been suppressed is accepted, and every
//! point overlapping its box that is not yet accepted gets suppressed. An
//! accepted point is never suppressed later. Sizes within the similarity band
//! are treated as equal and ordered by seed (randomized) or input order.

use std::cmp::Ordering;

use crate::core::{Error, Result};
use crate::pcg::octree::SpatialIndex;
use crate::pcg::point::PcgPoint;

/// Priority policy for self pruning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PruningType {
    /// Keep every point
    None,
    /// Larger points win
    #[default]
    LargeToSmall,
    /// Smaller points win
    SmallToLarge,
    /// Size is ignored
    AllEqual,
}

/// Configuration for self pruning.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SelfPruningSettings {
    pub pruning_type: PruningType,
    /// Relative radius difference under which two points count as the same size
    pub radius_similarity_factor: f32,
    /// Break equal-size ties by seed instead of input order
    pub randomized_pruning: bool,
}

impl Default for SelfPruningSettings {
    fn default() -> Self {
        Self {
            pruning_type: PruningType::LargeToSmall,
            radius_similarity_factor: 0.25,
            randomized_pruning: true,
        }
    }
}

impl SelfPruningSettings {
    pub fn new(pruning_type: PruningType, radius_similarity_factor: f32, randomized_pruning: bool) -> Self {
        Self {
            pruning_type,
            radius_similarity_factor,
            randomized_pruning,
        }
    }

    /// Squared multiplicative band for size comparisons.
    pub fn squared_radius_equality(&self) -> f32 {
        let radius_equality = 1.0 + self.radius_similarity_factor.max(0.0);
        radius_equality * radius_equality
    }
}

/// Order in which points get a chance to be accepted.
pub fn processing_order(points: &[PcgPoint], settings: &SelfPruningSettings) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();

    match settings.pruning_type {
        PruningType::None => {}
        PruningType::AllEqual => {
            if settings.randomized_pruning {
                order.sort_by_key(|&i| points[i].seed);
            }
        }
        PruningType::LargeToSmall | PruningType::SmallToLarge => {
            let descending = settings.pruning_type == PruningType::LargeToSmall;
            let key = |i: usize| points[i].size_key();

            order.sort_by(|&a, &b| {
                let ord = key(a).total_cmp(&key(b));
                if descending { ord.reverse() } else { ord }
            });

            let band = settings.squared_radius_equality();
            let mut start = 0;
            while start < order.len() {
                let head = key(order[start]);
                let mut end = start + 1;
                while end < order.len() && within_band(head, key(order[end]), band) {
                    end += 1;
                }

                let plateau = &mut order[start..end];
                if settings.randomized_pruning {
                    plateau.sort_by(|&a, &b| {
                        points[a].seed.cmp(&points[b].seed).then(a.cmp(&b))
                    });
                } else {
                    plateau.sort_unstable();
                }
                start = end;
            }
        }
    }

    order
}

/// True when neither size is more than `band` times the other.
#[inline]
fn within_band(a: f32, b: f32, band: f32) -> bool {
    let (small, large) = match a.total_cmp(&b) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    };
    large <= small * band
}

/// Indices of the points that survive pruning, in input order.
///
/// `index` must have been built over exactly `points`.
pub fn prune_indices(
    points: &[PcgPoint],
    index: Option<&dyn SpatialIndex>,
    settings: &SelfPruningSettings,
) -> Result<Vec<usize>> {
    if settings.pruning_type == PruningType::None {
        log::debug!("Self pruning type is None, passing {} points through", points.len());
        return Ok((0..points.len()).collect());
    }

    if points.is_empty() {
        return Ok(Vec::new());
    }

    let index = index.ok_or(Error::MissingSpatialIndex(points.len()))?;
    if index.element_count() != points.len() {
        return Err(Error::InvalidInput(format!(
            "spatial index holds {} elements but {} points were given",
            index.element_count(),
            points.len()
        )));
    }

    let order = processing_order(points, settings);

    let mut accepted = vec![false; points.len()];
    let mut suppressed = vec![false; points.len()];

    for &candidate in &order {
        if suppressed[candidate] {
            continue;
        }
        accepted[candidate] = true;

        let query = points[candidate].bounds();
        index.find_elements_with_bounds_test(&query, &mut |neighbor| {
            match accepted.get(neighbor) {
                Some(false) => suppressed[neighbor] = true,
                Some(true) => {}
                None => debug_assert!(false, "spatial index returned out of range element {}", neighbor),
            }
        });
    }

    let survivors: Vec<usize> = (0..points.len()).filter(|&i| accepted[i]).collect();
    log::trace!(
        "Self pruning ({:?}) kept {} of {} points",
        settings.pruning_type,
        survivors.len(),
        points.len()
    );
    Ok(survivors)
}

/// Surviving points, in input order.
pub fn prune_points(
    points: &[PcgPoint],
    index: Option<&dyn SpatialIndex>,
    settings: &SelfPruningSettings,
) -> Result<Vec<PcgPoint>> {
    let survivors = prune_indices(points, index, settings)?;
    Ok(survivors.into_iter().map(|i| points[i]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::core::types::Vec3;
    use crate::pcg::octree::{LinearIndex, PointOctree};
    use crate::pcg::random::RandomStream;

    fn point(x: f32, extent: f32, seed: u32) -> PcgPoint {
        PcgPoint::new(Vec3::new(x, 0.0, 0.0), Vec3::splat(extent), seed)
    }

    fn survivors(points: &[PcgPoint], settings: &SelfPruningSettings) -> HashSet<usize> {
        let octree = PointOctree::build(points);
        prune_indices(points, Some(&octree), settings)
            .unwrap()
            .into_iter()
            .collect()
    }

    fn random_points(count: usize, seed: u32) -> Vec<PcgPoint> {
        let mut rng = RandomStream::new(seed);
        (0..count)
            .map(|i| {
                let location = Vec3::new(
                    rng.frand_range(0.0, 200.0),
                    rng.frand_range(0.0, 200.0),
                    0.0,
                );
                PcgPoint::new(location, Vec3::splat(rng.frand_range(1.0, 10.0)), rng.next_u32() ^ i as u32)
            })
            .collect()
    }

    #[test]
    fn test_none_passes_through() {
        let points = vec![point(0.0, 5.0, 0), point(1.0, 5.0, 1), point(2.0, 5.0, 2)];
        let settings = SelfPruningSettings::new(PruningType::None, 0.0, false);
        let out = prune_points(&points, None, &settings).unwrap();
        assert_eq!(out, points);
    }

    #[test]
    fn test_all_equal_input_order() {
        let points = vec![point(0.0, 5.0, 30), point(1.0, 5.0, 20), point(2.0, 5.0, 10)];
        let settings = SelfPruningSettings::new(PruningType::AllEqual, 0.0, false);
        assert_eq!(survivors(&points, &settings), HashSet::from([0]));
    }

    #[test]
    fn test_all_equal_randomized_uses_seed() {
        let points = vec![point(0.0, 5.0, 30), point(1.0, 5.0, 20), point(2.0, 5.0, 10)];
        let settings = SelfPruningSettings::new(PruningType::AllEqual, 0.0, true);
        assert_eq!(survivors(&points, &settings), HashSet::from([2]));
    }

    #[test]
    fn test_large_to_small_keeps_container() {
        let points = vec![point(0.5, 1.0, 0), point(0.0, 10.0, 1)];
        let settings = SelfPruningSettings::new(PruningType::LargeToSmall, 0.0, false);
        assert_eq!(survivors(&points, &settings), HashSet::from([1]));
    }

    #[test]
    fn test_small_to_large_keeps_small() {
        let points = vec![point(0.0, 10.0, 0), point(0.5, 1.0, 1)];
        let settings = SelfPruningSettings::new(PruningType::SmallToLarge, 0.0, false);
        assert_eq!(survivors(&points, &settings), HashSet::from([1]));
    }

    #[test]
    fn test_chain_suppression() {
        // A overlaps B, B overlaps C, A does not overlap C
        let points = vec![point(0.0, 1.0, 0), point(1.5, 1.0, 1), point(3.0, 1.0, 2)];
        let settings = SelfPruningSettings::new(PruningType::AllEqual, 0.0, false);
        // A accepted, B suppressed, C never suppressed by an accepted point
        assert_eq!(survivors(&points, &settings), HashSet::from([0, 2]));
    }

    #[test]
    fn test_isolated_points_survive_every_policy() {
        let mut points = vec![point(0.0, 5.0, 0), point(2.0, 3.0, 1)];
        points.push(point(1000.0, 2.0, 2));
        points.push(point(-1000.0, 8.0, 3));

        for pruning_type in [PruningType::LargeToSmall, PruningType::SmallToLarge, PruningType::AllEqual] {
            for randomized in [false, true] {
                let settings = SelfPruningSettings::new(pruning_type, 0.25, randomized);
                let kept = survivors(&points, &settings);
                assert!(kept.contains(&2), "{:?}/{}", pruning_type, randomized);
                assert!(kept.contains(&3), "{:?}/{}", pruning_type, randomized);
                assert_eq!(kept.len(), 3);
            }
        }
    }

    #[test]
    fn test_band_tie_broken_by_seed() {
        // 10.0 and 10.5 are within a 0.25 similarity band
        let points = vec![point(0.0, 10.5, 50), point(1.0, 10.0, 5)];
        let settings = SelfPruningSettings::new(PruningType::LargeToSmall, 0.25, true);
        for _ in 0..5 {
            assert_eq!(survivors(&points, &settings), HashSet::from([1]));
        }

        // Without randomization the plateau keeps input order
        let settings = SelfPruningSettings::new(PruningType::LargeToSmall, 0.25, false);
        assert_eq!(survivors(&points, &settings), HashSet::from([0]));

        // Without a band the larger point wins
        let settings = SelfPruningSettings::new(PruningType::LargeToSmall, 0.0, true);
        assert_eq!(survivors(&points, &settings), HashSet::from([0]));
    }

    #[test]
    fn test_processing_order_plateaus() {
        let points = vec![
            point(0.0, 1.0, 4),
            point(0.0, 10.0, 3),
            point(0.0, 1.05, 2),
            point(0.0, 10.2, 1),
        ];
        let settings = SelfPruningSettings::new(PruningType::LargeToSmall, 0.1, true);
        assert_eq!(processing_order(&points, &settings), vec![3, 1, 2, 0]);

        let settings = SelfPruningSettings::new(PruningType::SmallToLarge, 0.1, false);
        assert_eq!(processing_order(&points, &settings), vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_output_is_subset_and_non_overlapping() {
        let points = random_points(1500, 9);
        for pruning_type in [PruningType::LargeToSmall, PruningType::SmallToLarge, PruningType::AllEqual] {
            let settings = SelfPruningSettings::new(pruning_type, 0.2, true);
            let kept: Vec<usize> = survivors(&points, &settings).into_iter().collect();
            assert!(!kept.is_empty());
            assert!(kept.len() < points.len());
            for (n, &a) in kept.iter().enumerate() {
                for &b in &kept[n + 1..] {
                    assert!(!points[a].bounds().intersects(&points[b].bounds()));
                }
            }
        }
    }

    #[test]
    fn test_octree_matches_linear_index() {
        let points = random_points(800, 21);
        let settings = SelfPruningSettings::new(PruningType::SmallToLarge, 0.1, true);
        let octree = PointOctree::build(&points);
        let linear = LinearIndex::new(&points);
        assert_eq!(
            prune_indices(&points, Some(&octree), &settings).unwrap(),
            prune_indices(&points, Some(&linear), &settings).unwrap()
        );
    }

    #[test]
    fn test_missing_index_fails() {
        let points = vec![point(0.0, 1.0, 0)];
        let settings = SelfPruningSettings::default();
        assert!(matches!(
            prune_indices(&points, None, &settings),
            Err(Error::MissingSpatialIndex(1))
        ));
    }

    #[test]
    fn test_mismatched_index_fails() {
        let points = vec![point(0.0, 1.0, 0), point(5.0, 1.0, 1)];
        let index = LinearIndex::new(&points[..1]);
        let settings = SelfPruningSettings::default();
        assert!(matches!(
            prune_indices(&points, Some(&index), &settings),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_points() {
        let settings = SelfPruningSettings::default();
        assert!(prune_points(&[], None, &settings).unwrap().is_empty());
    }

    #[test]
    fn test_negative_similarity_clamped() {
        let settings = SelfPruningSettings::new(PruningType::LargeToSmall, -3.0, false);
        assert_eq!(settings.squared_radius_equality(), 1.0);
    }
}
