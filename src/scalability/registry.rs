//! Dense instance registry with stable handles.
//!
//! Instances and their states live in two parallel dense arrays so the tick
//! loops walk contiguous memory. Handles never move: each handle names a slot
//! that records the instance's current dense index. Removal swaps the last
//! entry into the hole and fixes up that one slot.

use super::state::ScalabilityState;

/// Stable identity of a registered instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle {
    slot: u32,
    generation: u32,
}

impl InstanceHandle {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    /// Current dense index, `None` while the slot is free
    dense: Option<u32>,
}

struct Entry<T> {
    handle: InstanceHandle,
    instance: T,
}

/// Instances plus their parallel cull states.
pub struct InstanceRegistry<T> {
    entries: Vec<Entry<T>>,
    states: Vec<ScalabilityState>,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
}

impl<T> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InstanceRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            states: Vec::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an instance with a default state. Returns its handle and dense index.
    pub fn register(&mut self, instance: T) -> (InstanceHandle, usize) {
        let dense = self.entries.len();

        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot as usize].dense = Some(dense as u32);
                slot
            }
            None => {
                self.slots.push(Slot { generation: 0, dense: Some(dense as u32) });
                (self.slots.len() - 1) as u32
            }
        };

        let handle = InstanceHandle {
            slot,
            generation: self.slots[slot as usize].generation,
        };
        self.entries.push(Entry { handle, instance });
        self.states.push(ScalabilityState::default());
        (handle, dense)
    }

    /// Current dense index of `handle`, or `None` if it is stale.
    pub fn index_of(&self, handle: InstanceHandle) -> Option<usize> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.dense.map(|d| d as usize)
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.index_of(handle).is_some()
    }

    pub fn get(&self, handle: InstanceHandle) -> Option<&T> {
        self.index_of(handle).map(|i| &self.entries[i].instance)
    }

    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut T> {
        let i = self.index_of(handle)?;
        Some(&mut self.entries[i].instance)
    }

    pub fn state_of(&self, handle: InstanceHandle) -> Option<&ScalabilityState> {
        self.index_of(handle).map(|i| &self.states[i])
    }

    pub fn handle_at(&self, index: usize) -> InstanceHandle {
        self.entries[index].handle
    }

    pub fn instance(&self, index: usize) -> &T {
        &self.entries[index].instance
    }

    pub fn instance_mut(&mut self, index: usize) -> &mut T {
        &mut self.entries[index].instance
    }

    pub fn state(&self, index: usize) -> &ScalabilityState {
        &self.states[index]
    }

    pub fn state_mut(&mut self, index: usize) -> &mut ScalabilityState {
        &mut self.states[index]
    }

    pub fn states(&self) -> &[ScalabilityState] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut [ScalabilityState] {
        &mut self.states
    }

    /// Instance and mutable state at `index` at the same time.
    pub fn split_at_index(&mut self, index: usize) -> (&mut T, &mut ScalabilityState) {
        (&mut self.entries[index].instance, &mut self.states[index])
    }

    pub fn instances(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.instance)
    }

    pub fn handles(&self) -> impl Iterator<Item = InstanceHandle> + '_ {
        self.entries.iter().map(|e| e.handle)
    }

    /// Swap-remove the entry at `index` from both arrays.
    ///
    /// Returns `None` (and logs) when `index` is out of range.
    pub fn swap_remove(&mut self, index: usize) -> Option<(InstanceHandle, T, ScalabilityState)> {
        if self.entries.len() != self.states.len() {
            log::error!(
                "Registry out of sync: {} instances vs {} states",
                self.entries.len(),
                self.states.len()
            );
            debug_assert!(false, "instance and state arrays out of sync");
            return None;
        }
        if index >= self.entries.len() {
            log::error!("Registry remove index {} out of range ({})", index, self.entries.len());
            debug_assert!(false, "registry remove index out of range");
            return None;
        }

        let entry = self.entries.swap_remove(index);
        let state = self.states.swap_remove(index);

        let slot = &mut self.slots[entry.handle.slot as usize];
        slot.dense = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(entry.handle.slot);

        // Fix the back-reference of whatever moved into the hole
        if let Some(moved) = self.entries.get(index) {
            self.slots[moved.handle.slot as usize].dense = Some(index as u32);
        }

        Some((entry.handle, entry.instance, state))
    }

    /// Remove by handle. Stale handles return `None`.
    pub fn remove(&mut self, handle: InstanceHandle) -> Option<(T, ScalabilityState)> {
        let index = self.index_of(handle)?;
        self.swap_remove(index).map(|(_, instance, state)| (instance, state))
    }

    /// Remove every instance, invalidating all handles.
    pub fn drain(&mut self) -> Vec<T> {
        for entry in &self.entries {
            let slot = &mut self.slots[entry.handle.slot as usize];
            slot.dense = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(entry.handle.slot);
        }
        self.states.clear();
        self.entries.drain(..).map(|e| e.instance).collect()
    }

    /// True when arrays are the same length and every back-reference matches.
    pub fn check_invariants(&self) -> bool {
        if self.entries.len() != self.states.len() {
            return false;
        }
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| self.index_of(e.handle) == Some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcg::random::RandomStream;

    #[test]
    fn test_register_sets_back_reference() {
        let mut registry = InstanceRegistry::new();
        let (a, ia) = registry.register("a");
        let (b, ib) = registry.register("b");
        assert_eq!((ia, ib), (0, 1));
        assert_eq!(registry.index_of(a), Some(0));
        assert_eq!(registry.index_of(b), Some(1));
        assert_eq!(registry.states().len(), 2);
        assert!(registry.check_invariants());
    }

    #[test]
    fn test_swap_remove_fixes_moved_entry() {
        let mut registry = InstanceRegistry::new();
        let (a, _) = registry.register("a");
        let (_b, _) = registry.register("b");
        let (c, _) = registry.register("c");

        let (instance, _) = registry.remove(a).unwrap();
        assert_eq!(instance, "a");
        assert_eq!(registry.index_of(c), Some(0));
        assert_eq!(*registry.instance(0), "c");
        assert!(!registry.contains(a));
        assert!(registry.check_invariants());
    }

    #[test]
    fn test_remove_last() {
        let mut registry = InstanceRegistry::new();
        let (a, _) = registry.register(1);
        let (b, _) = registry.register(2);
        registry.remove(b).unwrap();
        assert_eq!(registry.index_of(a), Some(0));
        assert_eq!(registry.len(), 1);
        assert!(registry.check_invariants());
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut registry = InstanceRegistry::new();
        let (a, _) = registry.register(1);
        registry.remove(a).unwrap();
        let (b, _) = registry.register(2);

        assert_eq!(a.slot(), b.slot());
        assert_ne!(a.generation(), b.generation());
        assert!(registry.get(a).is_none());
        assert!(registry.remove(a).is_none());
        assert_eq!(registry.get(b), Some(&2));
    }

    #[test]
    fn test_state_follows_instance() {
        let mut registry = InstanceRegistry::new();
        let (a, _) = registry.register('a');
        let (b, _) = registry.register('b');
        registry.state_mut(1).significance = 7.0;

        registry.remove(a).unwrap();
        assert_eq!(registry.state_of(b).unwrap().significance, 7.0);
    }

    #[test]
    fn test_drain_invalidates_handles() {
        let mut registry = InstanceRegistry::new();
        let handles: Vec<_> = (0..4).map(|i| registry.register(i).0).collect();
        let drained = registry.drain();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(registry.is_empty());
        assert!(handles.iter().all(|h| !registry.contains(*h)));
        assert!(registry.check_invariants());
    }

    #[test]
    fn test_random_operations_keep_invariants() {
        let mut registry = InstanceRegistry::new();
        let mut live = Vec::new();
        let mut rng = RandomStream::new(2024);

        for step in 0..2000u32 {
            if live.is_empty() || rng.frand() < 0.55 {
                let (handle, _) = registry.register(step);
                live.push((handle, step));
            } else {
                let pick = rng.rand_helper(live.len() as u32) as usize;
                let (handle, value) = live.swap_remove(pick);
                let (removed, _) = registry.remove(handle).unwrap();
                assert_eq!(removed, value);
            }

            assert_eq!(registry.len(), live.len());
            assert_eq!(registry.states().len(), live.len());
            assert!(registry.check_invariants());
        }

        for (handle, value) in &live {
            assert_eq!(registry.get(*handle), Some(value));
        }
    }
}
