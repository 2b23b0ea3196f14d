//! Significance scoring and count-limited culling.
//!
//! When an effect type caps how many instances may be active, instances not
//! already culled by distance or visibility are ranked by significance and
//! everything past the cap is culled. Instances culled by rules never enter
//! the ranking, and neither do instances whose rules have not run yet.

use std::collections::HashMap;

use super::config::ScalabilitySettings;
use super::state::ScalabilityState;

/// Identifies the system an instance belongs to, for per-system limits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SystemId(pub u32);

/// How significance is scored. Higher is more important.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SignificanceHandler {
    /// Closer to the nearest view is more significant
    #[default]
    Distance,
    /// Younger instances are more significant
    Age,
}

const MIN_DIVISOR: f32 = 1.0e-4;

impl SignificanceHandler {
    pub fn significance(self, distance: f32, age: f32) -> f32 {
        match self {
            SignificanceHandler::Distance => 1.0 / distance.max(MIN_DIVISOR),
            SignificanceHandler::Age => 1.0 / age.max(MIN_DIVISOR),
        }
    }
}

/// Ranking partition of a state.
///
/// 0: culled by rules and already applied, 1: culled by rules and dirty,
/// 2: not evaluated yet, 3: candidate for the significance ranking.
#[inline]
fn rank_group(state: &ScalabilityState) -> u8 {
    if state.culled_by_rules() {
        if state.is_dirty() { 1 } else { 0 }
    } else if !state.evaluated {
        2
    } else {
        3
    }
}

/// Outcome of one ranking pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankingStats {
    /// Culled by rules, already applied
    pub stale_culled: usize,
    /// Culled by rules, not yet applied
    pub dirty_culled: usize,
    /// Rules not run yet, left out of the ranking
    pub unevaluated: usize,
    /// Instances that went through the significance ranking
    pub ranked: usize,
    /// Ranked instances culled for exceeding a count limit
    pub culled_by_count: usize,
}

/// Apply `max_instances` / `max_system_instances` by significance.
///
/// `systems[i]` is the system of `states[i]`. Updates
/// `culled_by_instance_count` and `culled` on every state.
pub fn apply_instance_count_limits(
    states: &mut [ScalabilityState],
    systems: &[SystemId],
    settings: &ScalabilitySettings,
) -> RankingStats {
    debug_assert_eq!(states.len(), systems.len());

    let mut order: Vec<usize> = (0..states.len()).collect();
    order.sort_by_key(|&i| rank_group(&states[i]));

    let stale_end = order.partition_point(|&i| rank_group(&states[i]) == 0);
    let dirty_end = order.partition_point(|&i| rank_group(&states[i]) <= 1);
    let unevaluated_end = order.partition_point(|&i| rank_group(&states[i]) <= 2);

    for &i in &order[..unevaluated_end] {
        let state = &mut states[i];
        state.culled_by_instance_count = false;
        state.refresh();
    }

    let candidates = &mut order[unevaluated_end..];
    candidates.sort_by(|&a, &b| {
        states[b]
            .significance
            .total_cmp(&states[a].significance)
            .then(a.cmp(&b))
    });

    let max_total = settings.max_instances.unwrap_or(usize::MAX);
    let max_per_system = settings.max_system_instances.unwrap_or(usize::MAX);

    let mut active_total = 0usize;
    let mut active_per_system: HashMap<SystemId, usize> = HashMap::new();
    let mut culled_by_count = 0usize;

    for &i in candidates.iter() {
        let system_count = active_per_system.entry(systems[i]).or_insert(0);
        let over_budget = active_total >= max_total || *system_count >= max_per_system;

        let state = &mut states[i];
        state.culled_by_instance_count = over_budget;
        state.refresh();

        if over_budget {
            culled_by_count += 1;
        } else {
            active_total += 1;
            *system_count += 1;
        }
    }

    RankingStats {
        stale_culled: stale_end,
        dirty_culled: dirty_end - stale_end,
        unevaluated: unevaluated_end - dirty_end,
        ranked: candidates.len(),
        culled_by_count,
    }
}
