//! Per-instance cull state.

/// Cull state of one managed instance.
///
/// `previous_culled` is the last value the manager applied; the state is dirty
/// while `culled` differs from it. `evaluated` stays false until the distance
/// and visibility rules have run once.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScalabilityState {
    pub significance: f32,
    pub culled: bool,
    pub previous_culled: bool,
    pub culled_by_distance: bool,
    pub culled_by_instance_count: bool,
    pub culled_by_visibility: bool,
    pub evaluated: bool,
}

impl ScalabilityState {
    /// Culled by distance or visibility, ignoring count limits.
    pub fn culled_by_rules(&self) -> bool {
        self.culled_by_distance || self.culled_by_visibility
    }

    pub fn is_dirty(&self) -> bool {
        self.culled != self.previous_culled
    }

    /// Recompute `culled` from the individual reasons.
    pub fn refresh(&mut self) {
        self.culled = self.culled_by_rules() || self.culled_by_instance_count;
    }

    /// Record the current value as applied.
    pub fn mark_applied(&mut self) {
        self.previous_culled = self.culled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clean() {
        let state = ScalabilityState::default();
        assert!(!state.culled);
        assert!(!state.is_dirty());
        assert!(!state.evaluated);
    }

    #[test]
    fn test_dirty_until_applied() {
        let mut state = ScalabilityState::default();
        state.culled_by_distance = true;
        state.refresh();
        assert!(state.culled);
        assert!(state.is_dirty());

        state.mark_applied();
        assert!(!state.is_dirty());

        state.culled_by_distance = false;
        state.refresh();
        assert!(state.is_dirty());
    }

    #[test]
    fn test_instance_count_reason() {
        let mut state = ScalabilityState::default();
        state.culled_by_instance_count = true;
        state.refresh();
        assert!(state.culled);
        assert!(!state.culled_by_rules());
    }
}
