//! Scalability configuration.
//!
//! Update periods and the per-frame evaluation ceiling are plain config values
//! passed to the manager, so budget decisions depend only on config, pending
//! work and frame time.

use std::path::Path;

use crate::core::Result;
use super::significance::SignificanceHandler;

/// How often a manager re-evaluates its instances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpdateFrequency {
    /// Only newly registered instances are evaluated
    SpawnOnly,
    Low,
    #[default]
    Medium,
    High,
    /// Every instance, every tick (still capped per frame)
    Continuous,
}

/// What happens to an instance when it becomes culled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CullReaction {
    /// Deactivate and release from the manager
    #[default]
    Deactivate,
    /// Deactivate immediately and release from the manager
    DeactivateImmediate,
    /// Deactivate but stay registered, reactivate when no longer culled
    DeactivateResume,
    /// Deactivate immediately but stay registered, reactivate when no longer culled
    DeactivateImmediateResume,
}

impl CullReaction {
    pub fn is_immediate(self) -> bool {
        matches!(self, CullReaction::DeactivateImmediate | CullReaction::DeactivateImmediateResume)
    }

    pub fn resumes(self) -> bool {
        matches!(self, CullReaction::DeactivateResume | CullReaction::DeactivateImmediateResume)
    }
}

/// Culling rules shared by every instance of an effect type.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScalabilitySettings {
    /// Cull instances further than this from the nearest view
    pub max_distance: Option<f32>,
    /// Cull instances not rendered for longer than this many seconds
    pub max_time_without_render: Option<f32>,
    /// Maximum active instances across the effect type
    pub max_instances: Option<usize>,
    /// Maximum active instances per system
    pub max_system_instances: Option<usize>,
}

impl ScalabilitySettings {
    /// True when a significance ranking is needed to enforce count limits.
    pub fn needs_significance(&self) -> bool {
        self.max_instances.is_some() || self.max_system_instances.is_some()
    }
}

/// Scalability configuration of one effect type.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EffectType {
    pub name: String,
    pub update_frequency: UpdateFrequency,
    pub cull_reaction: CullReaction,
    pub significance_handler: SignificanceHandler,
    pub settings: ScalabilitySettings,
}

impl Default for EffectType {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            update_frequency: UpdateFrequency::Medium,
            cull_reaction: CullReaction::Deactivate,
            significance_handler: SignificanceHandler::Distance,
            settings: ScalabilitySettings::default(),
        }
    }
}

impl EffectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Global scalability tunables plus the known effect types.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScalabilityConfig {
    /// Hard ceiling on instances evaluated per manager per tick
    pub max_updates_per_frame: usize,
    /// Seconds for a full pass at `UpdateFrequency::Low`
    pub low_update_period: f32,
    /// Seconds for a full pass at `UpdateFrequency::Medium`
    pub medium_update_period: f32,
    /// Seconds for a full pass at `UpdateFrequency::High`
    pub high_update_period: f32,
    pub effect_types: Vec<EffectType>,
}

impl Default for ScalabilityConfig {
    fn default() -> Self {
        Self {
            max_updates_per_frame: 50,
            low_update_period: 1.0,
            medium_update_period: 0.5,
            high_update_period: 0.25,
            effect_types: Vec::new(),
        }
    }
}

impl ScalabilityConfig {
    /// Seconds for one full pass over the registry, or `None` when the
    /// frequency is not time based.
    ///
    /// `Continuous` returns `Some(0.0)`: everything is due every tick.
    pub fn update_period(&self, frequency: UpdateFrequency) -> Option<f32> {
        match frequency {
            UpdateFrequency::SpawnOnly => None,
            UpdateFrequency::Low => Some(self.low_update_period),
            UpdateFrequency::Medium => Some(self.medium_update_period),
            UpdateFrequency::High => Some(self.high_update_period),
            UpdateFrequency::Continuous => Some(0.0),
        }
    }

    pub fn effect_type(&self, name: &str) -> Option<&EffectType> {
        self.effect_types.iter().find(|e| e.name == name)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::info!(
            "Loaded scalability config from {}: {} effect types",
            path.as_ref().display(),
            config.effect_types.len()
        );
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    #[test]
    fn test_default_periods() {
        let cfg = ScalabilityConfig::default();
        assert_eq!(cfg.update_period(UpdateFrequency::High), Some(0.25));
        assert_eq!(cfg.update_period(UpdateFrequency::Medium), Some(0.5));
        assert_eq!(cfg.update_period(UpdateFrequency::Low), Some(1.0));
        assert_eq!(cfg.update_period(UpdateFrequency::Continuous), Some(0.0));
        assert_eq!(cfg.update_period(UpdateFrequency::SpawnOnly), None);
        assert_eq!(cfg.max_updates_per_frame, 50);
    }

    #[test]
    fn test_cull_reaction_flags() {
        assert!(!CullReaction::Deactivate.resumes());
        assert!(CullReaction::DeactivateImmediate.is_immediate());
        assert!(CullReaction::DeactivateResume.resumes());
        assert!(!CullReaction::DeactivateResume.is_immediate());
        assert!(CullReaction::DeactivateImmediateResume.resumes());
    }

    #[test]
    fn test_needs_significance() {
        let mut settings = ScalabilitySettings::default();
        assert!(!settings.needs_significance());
        settings.max_system_instances = Some(3);
        assert!(settings.needs_significance());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = ScalabilityConfig::from_json(
            r#"{
                "max_updates_per_frame": 10,
                "effect_types": [
                    { "name": "Ambient", "update_frequency": "Low",
                      "settings": { "max_distance": 5000.0 } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.max_updates_per_frame, 10);
        assert_eq!(cfg.medium_update_period, 0.5);
        let ambient = cfg.effect_type("Ambient").unwrap();
        assert_eq!(ambient.update_frequency, UpdateFrequency::Low);
        assert_eq!(ambient.cull_reaction, CullReaction::Deactivate);
        assert_eq!(ambient.settings.max_distance, Some(5000.0));
        assert!(cfg.effect_type("Missing").is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(ScalabilityConfig::from_json("{ nope"), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalability.json");

        let mut cfg = ScalabilityConfig::default();
        let mut effect = EffectType::new("Explosions");
        effect.update_frequency = UpdateFrequency::High;
        effect.cull_reaction = CullReaction::DeactivateImmediateResume;
        effect.settings.max_instances = Some(8);
        cfg.effect_types.push(effect);

        cfg.save(&path).unwrap();
        let loaded = ScalabilityConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScalabilityConfig::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
