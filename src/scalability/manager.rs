//! Scalability manager for one effect type.
//!
//! Owns the registry of live instances and, each tick:
//! 1. picks a budgeted slice of instances to re-evaluate (time sliced so a
//!    full pass takes about one update period),
//! 2. re-evaluates distance and visibility culling for that slice,
//! 3. re-ranks by significance when the effect type has count limits,
//! 4. applies activate/deactivate reactions to every dirty instance.
//!
//! All mutation happens through `&mut self` on the owning thread.

use serde::Serialize;

use crate::core::types::Vec3;
use super::budget::{max_update_count, UpdateWorkList};
use super::config::{CullReaction, EffectType, ScalabilityConfig, ScalabilitySettings, UpdateFrequency};
use super::registry::{InstanceHandle, InstanceRegistry};
use super::significance::{apply_instance_count_limits, RankingStats, SignificanceHandler, SystemId};
use super::state::ScalabilityState;

/// An effect instance managed for scalability.
///
/// `activate`/`deactivate` are the cull reactions. After a non-resume
/// deactivation the manager releases the instance back to the caller.
pub trait ScalableInstance {
    /// False once the backing object is gone; the manager then drops the entry.
    fn is_alive(&self) -> bool {
        true
    }

    fn location(&self) -> Vec3;

    fn system_id(&self) -> SystemId {
        SystemId::default()
    }

    /// Seconds since the instance was spawned.
    fn age(&self) -> f32 {
        0.0
    }

    /// Seconds since the instance was last rendered, if known.
    fn time_since_rendered(&self) -> Option<f32> {
        None
    }

    fn activate(&mut self);

    fn deactivate(&mut self, immediate: bool);
}

/// Viewer positions used for distance culling and significance.
#[derive(Clone, Debug, Default)]
pub struct ViewContext {
    pub view_locations: Vec<Vec3>,
}

impl ViewContext {
    pub fn new(view_locations: Vec<Vec3>) -> Self {
        Self { view_locations }
    }

    pub fn single(location: Vec3) -> Self {
        Self { view_locations: vec![location] }
    }

    /// Distance to the closest view; 0 when there are no views.
    pub fn nearest_distance(&self, point: Vec3) -> f32 {
        self.view_locations
            .iter()
            .map(|v| v.distance_squared(point))
            .min_by(|a, b| a.total_cmp(b))
            .map(f32::sqrt)
            .unwrap_or(0.0)
    }
}

/// What one tick did.
#[derive(Debug)]
pub struct TickReport<T> {
    /// Instances whose cull rules were re-evaluated
    pub evaluated: usize,
    pub activated: usize,
    pub deactivated: usize,
    /// Instances removed from the registry after a non-resume deactivation
    pub released: Vec<T>,
    /// Dead instances dropped from the registry
    pub removed_dead: usize,
    /// Present when a significance ranking ran
    pub ranking: Option<RankingStats>,
}

impl<T> Default for TickReport<T> {
    fn default() -> Self {
        Self {
            evaluated: 0,
            activated: 0,
            deactivated: 0,
            released: Vec::new(),
            removed_dead: 0,
            ranking: None,
        }
    }
}

impl<T> TickReport<T> {
    /// Fold another manager's report into this one.
    pub fn merge(&mut self, other: TickReport<T>) {
        self.evaluated += other.evaluated;
        self.activated += other.activated;
        self.deactivated += other.deactivated;
        self.removed_dead += other.removed_dead;
        self.released.extend(other.released);

        self.ranking = match (self.ranking, other.ranking) {
            (Some(a), Some(b)) => Some(RankingStats {
                stale_culled: a.stale_culled + b.stale_culled,
                dirty_culled: a.dirty_culled + b.dirty_culled,
                unevaluated: a.unevaluated + b.unevaluated,
                ranked: a.ranked + b.ranked,
                culled_by_count: a.culled_by_count + b.culled_by_count,
            }),
            (a, b) => a.or(b),
        };
    }
}

/// Running totals over the manager's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub ticks: u64,
    pub evaluated: u64,
    pub activations: u64,
    pub deactivations: u64,
    pub released: u64,
    pub dead_removed: u64,
    pub passes_completed: u64,
    pub rankings: u64,
}

/// Per-effect-type scalability manager.
pub struct ScalabilityManager<T: ScalableInstance> {
    /// `None` puts the manager in cleanup-only mode
    effect_type: Option<EffectType>,
    max_updates_per_frame: usize,
    update_period: Option<f32>,
    registry: InstanceRegistry<T>,
    work_list: Option<UpdateWorkList>,
    new_instances: Vec<InstanceHandle>,
    significance_dirty: bool,
    stats: ManagerStats,
}

impl<T: ScalableInstance> ScalabilityManager<T> {
    pub fn new(effect_type: EffectType, config: &ScalabilityConfig) -> Self {
        Self::with_effect_type(Some(effect_type), config)
    }

    /// Manager that only drops dead instances and never culls.
    pub fn cleanup_only(config: &ScalabilityConfig) -> Self {
        Self::with_effect_type(None, config)
    }

    pub fn with_effect_type(effect_type: Option<EffectType>, config: &ScalabilityConfig) -> Self {
        let update_period = effect_type
            .as_ref()
            .and_then(|e| config.update_period(e.update_frequency));

        Self {
            effect_type,
            max_updates_per_frame: config.max_updates_per_frame,
            update_period,
            registry: InstanceRegistry::new(),
            work_list: None,
            new_instances: Vec::new(),
            significance_dirty: false,
            stats: ManagerStats::default(),
        }
    }

    pub fn effect_type(&self) -> Option<&EffectType> {
        self.effect_type.as_ref()
    }

    pub fn is_cleanup_only(&self) -> bool {
        self.effect_type.is_none()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn stats(&self) -> &ManagerStats {
        &self.stats
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.registry.contains(handle)
    }

    pub fn get(&self, handle: InstanceHandle) -> Option<&T> {
        self.registry.get(handle)
    }

    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut T> {
        self.registry.get_mut(handle)
    }

    pub fn state(&self, handle: InstanceHandle) -> Option<&ScalabilityState> {
        self.registry.state_of(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = InstanceHandle> + '_ {
        self.registry.handles()
    }

    /// Instances still waiting in the current evaluation pass.
    pub fn pending_updates(&self) -> usize {
        self.work_list.as_ref().map_or(0, |l| l.remaining())
    }

    /// Registry and work list consistency.
    pub fn check_invariants(&self) -> bool {
        let work_list_ok = self
            .work_list
            .as_ref()
            .is_none_or(|l| l.len() == self.registry.len());
        work_list_ok && self.registry.check_invariants()
    }

    /// Start managing `instance`.
    pub fn register(&mut self, instance: T) -> InstanceHandle {
        let (handle, index) = self.registry.register(instance);

        // Joins the pass already in progress
        if let Some(list) = &mut self.work_list {
            list.push(true);
        }
        self.new_instances.push(handle);
        self.significance_dirty = true;

        log::trace!("Registered instance {:?} at index {}", handle, index);
        handle
    }

    /// Stop managing an instance and hand it back.
    ///
    /// Unknown or stale handles (already released, or dropped by `shutdown`)
    /// return `None`.
    pub fn unregister(&mut self, handle: InstanceHandle) -> Option<T> {
        match self.registry.index_of(handle) {
            Some(index) => self.remove_at(index).map(|(_, instance)| instance),
            None => {
                log::debug!("Ignoring unregister of unknown instance {:?}", handle);
                None
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Option<(InstanceHandle, T)> {
        let (handle, instance, _) = self.registry.swap_remove(index)?;

        if let Some(list) = &mut self.work_list {
            list.swap_remove(index);
        }
        self.significance_dirty = true;

        // Only the entry moved into the hole changed its back-reference
        debug_assert!(
            index >= self.registry.len()
                || self.registry.index_of(self.registry.handle_at(index)) == Some(index)
        );
        debug_assert!(self.work_list.as_ref().is_none_or(|l| l.len() == self.registry.len()));

        Some((handle, instance))
    }

    /// Release every instance and reset all pass state.
    pub fn shutdown(&mut self) -> Vec<T> {
        self.work_list = None;
        self.new_instances.clear();
        self.significance_dirty = false;
        let drained = self.registry.drain();
        log::debug!("Scalability manager shut down, released {} instances", drained.len());
        drained
    }

    /// Advance one frame.
    pub fn tick(&mut self, delta_seconds: f32, view: &ViewContext) -> TickReport<T> {
        self.stats.ticks += 1;
        let mut report = TickReport::default();

        let rules = self
            .effect_type
            .as_ref()
            .map(|e| (e.settings, e.cull_reaction, e.significance_handler, e.update_frequency));
        let Some((settings, reaction, handler, frequency)) = rules else {
            report.removed_dead = self.remove_dead();
            self.work_list = None;
            self.new_instances.clear();
            self.record(&report);
            return report;
        };

        let selected = match (frequency, self.update_period) {
            (UpdateFrequency::SpawnOnly, _) | (_, None) => self.take_new_instances(),
            (_, Some(period)) => self.take_scheduled(delta_seconds, period),
        };

        report.evaluated = selected.len();
        let mut dead = Vec::new();
        for &index in &selected {
            if !self.evaluate(index, view, &settings) {
                dead.push(self.registry.handle_at(index));
            }
        }
        for handle in dead {
            if let Some(index) = self.registry.index_of(handle) {
                log::debug!("Dropping dead instance {:?} found during evaluation", handle);
                if self.remove_at(index).is_some() {
                    report.removed_dead += 1;
                }
            }
        }

        if settings.needs_significance() && (self.significance_dirty || !selected.is_empty()) {
            report.ranking = Some(self.rank(view, handler, &settings));
            self.significance_dirty = false;
        }

        self.apply(reaction, &mut report);

        log::trace!(
            "Scalability tick: evaluated {}, activated {}, deactivated {}, released {}, {} registered",
            report.evaluated,
            report.activated,
            report.deactivated,
            report.released.len(),
            self.registry.len()
        );

        self.record(&report);
        report
    }

    fn record(&mut self, report: &TickReport<T>) {
        self.stats.evaluated += report.evaluated as u64;
        self.stats.activations += report.activated as u64;
        self.stats.deactivations += report.deactivated as u64;
        self.stats.released += report.released.len() as u64;
        self.stats.dead_removed += report.removed_dead as u64;
        if report.ranking.is_some() {
            self.stats.rankings += 1;
        }
    }

    /// Newly registered instances, at most one frame's budget of them.
    fn take_new_instances(&mut self) -> Vec<usize> {
        let mut selected = Vec::new();
        let mut deferred = Vec::new();

        for handle in self.new_instances.drain(..) {
            let Some(index) = self.registry.index_of(handle) else {
                continue;
            };
            if selected.len() < self.max_updates_per_frame {
                selected.push(index);
            } else {
                deferred.push(handle);
            }
        }

        self.new_instances = deferred;
        selected
    }

    /// This tick's slice of the current pass, starting a new pass if needed.
    fn take_scheduled(&mut self, delta_seconds: f32, update_period: f32) -> Vec<usize> {
        // Timed passes pick up new instances on their own
        self.new_instances.clear();

        if self.work_list.as_ref().is_some_and(UpdateWorkList::is_complete) {
            self.work_list = None;
            self.stats.passes_completed += 1;
        }
        if self.registry.is_empty() {
            return Vec::new();
        }

        let len = self.registry.len();
        let list = self.work_list.get_or_insert_with(|| UpdateWorkList::new(len));

        let count = max_update_count(list.len(), delta_seconds, update_period, self.max_updates_per_frame)
            .min(list.remaining());
        list.take(count)
    }

    /// Re-run distance and visibility rules. Returns false for dead instances.
    fn evaluate(&mut self, index: usize, view: &ViewContext, settings: &ScalabilitySettings) -> bool {
        let (instance, state) = self.registry.split_at_index(index);
        if !instance.is_alive() {
            return false;
        }

        let distance = view.nearest_distance(instance.location());
        state.culled_by_distance = settings.max_distance.is_some_and(|max| distance > max);
        state.culled_by_visibility = match (settings.max_time_without_render, instance.time_since_rendered()) {
            (Some(max), Some(unrendered)) => unrendered > max,
            _ => false,
        };
        state.evaluated = true;
        state.refresh();
        true
    }

    fn rank(&mut self, view: &ViewContext, handler: SignificanceHandler, settings: &ScalabilitySettings) -> RankingStats {
        let mut systems = Vec::with_capacity(self.registry.len());
        for index in 0..self.registry.len() {
            let (instance, state) = self.registry.split_at_index(index);
            let distance = view.nearest_distance(instance.location());
            state.significance = handler.significance(distance, instance.age());
            systems.push(instance.system_id());
        }

        let stats = apply_instance_count_limits(self.registry.states_mut(), &systems, settings);
        log::trace!(
            "Significance ranking: {} ranked, {} culled by count, {} culled by rules",
            stats.ranked,
            stats.culled_by_count,
            stats.stale_culled + stats.dirty_culled
        );
        stats
    }

    /// Apply reactions to every dirty instance.
    ///
    /// The index only advances when the current slot keeps its entry, because a
    /// release swaps another instance into it.
    fn apply(&mut self, reaction: CullReaction, report: &mut TickReport<T>) {
        let mut index = 0;
        while index < self.registry.len() {
            if !self.registry.instance(index).is_alive() {
                let handle = self.registry.handle_at(index);
                log::debug!("Dropping dead instance {:?} during apply", handle);
                match self.remove_at(index) {
                    Some(_) => report.removed_dead += 1,
                    None => index += 1,
                }
                continue;
            }

            if !self.registry.state(index).is_dirty() {
                index += 1;
                continue;
            }

            let (instance, state) = self.registry.split_at_index(index);
            state.mark_applied();

            if !state.culled {
                instance.activate();
                report.activated += 1;
                index += 1;
                continue;
            }

            instance.deactivate(reaction.is_immediate());
            report.deactivated += 1;

            if reaction.resumes() {
                index += 1;
                continue;
            }

            match self.remove_at(index) {
                Some((_, released)) => report.released.push(released),
                None => index += 1,
            }
        }
    }

    fn remove_dead(&mut self) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.registry.len() {
            if self.registry.instance(index).is_alive() {
                index += 1;
            } else if self.remove_at(index).is_some() {
                removed += 1;
            } else {
                index += 1;
            }
        }
        if removed > 0 {
            log::debug!("Cleanup removed {} dead instances", removed);
        }
        removed
    }
}
