//! World-level owner of scalability managers.
//!
//! Instances are routed to the manager of their effect type. Managers are kept
//! in name order so a tick visits them deterministically.

use std::collections::BTreeMap;

use crate::core::{Error, Result};
use super::config::ScalabilityConfig;
use super::manager::{ScalableInstance, ScalabilityManager, TickReport, ViewContext};
use super::registry::InstanceHandle;

/// One manager per effect type, created on first registration.
pub struct ScalabilityWorld<T: ScalableInstance> {
    config: ScalabilityConfig,
    managers: BTreeMap<String, ScalabilityManager<T>>,
}

impl<T: ScalableInstance> ScalabilityWorld<T> {
    pub fn new(config: ScalabilityConfig) -> Self {
        log::info!(
            "Scalability world: {} effect types, {} updates per frame",
            config.effect_types.len(),
            config.max_updates_per_frame
        );
        Self {
            config,
            managers: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ScalabilityConfig {
        &self.config
    }

    /// Register `instance` with the manager for `effect_type`.
    ///
    /// An unknown effect type still gets a manager, but it only cleans up dead
    /// instances.
    pub fn register(&mut self, effect_type: &str, instance: T) -> InstanceHandle {
        let config = &self.config;
        let manager = self
            .managers
            .entry(effect_type.to_string())
            .or_insert_with(|| match config.effect_type(effect_type) {
                Some(effect) => ScalabilityManager::new(effect.clone(), config),
                None => {
                    log::error!(
                        "Effect type '{}' has no scalability config, instances will not be culled",
                        effect_type
                    );
                    ScalabilityManager::cleanup_only(config)
                }
            });
        manager.register(instance)
    }

    /// Unregister from the manager for `effect_type`.
    ///
    /// `Ok(None)` for stale handles; an error when no manager exists for the
    /// effect type.
    pub fn unregister(&mut self, effect_type: &str, handle: InstanceHandle) -> Result<Option<T>> {
        let manager = self
            .managers
            .get_mut(effect_type)
            .ok_or_else(|| Error::MissingEffectType(effect_type.to_string()))?;
        Ok(manager.unregister(handle))
    }

    pub fn manager(&self, effect_type: &str) -> Option<&ScalabilityManager<T>> {
        self.managers.get(effect_type)
    }

    pub fn manager_mut(&mut self, effect_type: &str) -> Option<&mut ScalabilityManager<T>> {
        self.managers.get_mut(effect_type)
    }

    pub fn effect_type_names(&self) -> impl Iterator<Item = &str> {
        self.managers.keys().map(String::as_str)
    }

    /// Total instances across every manager.
    pub fn len(&self) -> usize {
        self.managers.values().map(ScalabilityManager::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.values().all(ScalabilityManager::is_empty)
    }

    /// Tick every manager and merge their reports.
    pub fn tick(&mut self, delta_seconds: f32, view: &ViewContext) -> TickReport<T> {
        let mut report = TickReport::default();
        for manager in self.managers.values_mut() {
            report.merge(manager.tick(delta_seconds, view));
        }
        report
    }

    /// Release every instance of every manager.
    pub fn shutdown(&mut self) -> Vec<T> {
        let released: Vec<T> = self
            .managers
            .values_mut()
            .flat_map(ScalabilityManager::shutdown)
            .collect();
        log::info!("Scalability world shut down, released {} instances", released.len());
        released
    }
}
