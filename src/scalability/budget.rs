//! Per-frame evaluation budget for scalability updates.
//!
//! A full pass over the registry is spread across the frames of one update
//! period: each tick evaluates `ceil(pending * dt / period)` instances, capped
//! by a hard per-frame ceiling. The pass is tracked by a needs-update bitset
//! walked with a cursor.

/// Number of instances to evaluate this tick.
///
/// # Arguments
/// * `pending` - Size of the current pass
/// * `delta_seconds` - Frame time
/// * `update_period` - Seconds for one full pass; `<= 0` means everything is due now
/// * `max_per_frame` - Hard ceiling per tick
pub fn max_update_count(pending: usize, delta_seconds: f32, update_period: f32, max_per_frame: usize) -> usize {
    if pending == 0 {
        return 0;
    }

    let scaled = if update_period > 0.0 {
        let raw = (pending as f32 * delta_seconds.max(0.0) / update_period).ceil();
        // Saturating cast, NaN becomes 0
        raw as usize
    } else {
        pending
    };

    scaled.min(max_per_frame).min(pending)
}

/// One in-progress pass over the registry.
///
/// Bit `i` corresponds to dense registry index `i` and must be kept in step
/// with registry pushes and swap-removes.
#[derive(Clone, Debug)]
pub struct UpdateWorkList {
    needs_update: Vec<bool>,
    cursor: usize,
    remaining: usize,
}

impl UpdateWorkList {
    /// A pass over `len` instances, all pending.
    pub fn new(len: usize) -> Self {
        Self {
            needs_update: vec![true; len],
            cursor: 0,
            remaining: len,
        }
    }

    /// Instances still waiting in this pass.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    pub fn len(&self) -> usize {
        self.needs_update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needs_update.is_empty()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.needs_update.get(index).copied().unwrap_or(false)
    }

    /// Track a newly registered instance.
    pub fn push(&mut self, pending: bool) {
        self.needs_update.push(pending);
        if pending {
            self.remaining += 1;
        }
    }

    /// Mirror a registry swap-remove at `index`.
    pub fn swap_remove(&mut self, index: usize) {
        if index >= self.needs_update.len() {
            debug_assert!(false, "work list remove index {} out of range", index);
            return;
        }
        if self.needs_update.swap_remove(index) {
            self.remaining -= 1;
        }
        self.cursor = self.cursor.min(self.needs_update.len());
    }

    /// Take the next pending index, clearing its bit.
    ///
    /// Searches forward from the cursor and wraps once, so entries that a
    /// swap-remove moved behind the cursor are still visited.
    pub fn next_pending(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }

        let len = self.needs_update.len();
        let found = (self.cursor..len)
            .chain(0..self.cursor)
            .find(|&i| self.needs_update[i]);

        match found {
            Some(index) => {
                self.needs_update[index] = false;
                self.remaining -= 1;
                self.cursor = index + 1;
                Some(index)
            }
            None => {
                debug_assert!(false, "work list remaining count out of sync");
                self.remaining = 0;
                None
            }
        }
    }

    /// Take up to `count` pending indices.
    pub fn take(&mut self, count: usize) -> Vec<usize> {
        let mut taken = Vec::with_capacity(count.min(self.remaining));
        while taken.len() < count {
            match self.next_pending() {
                Some(index) => taken.push(index),
                None => break,
            }
        }
        taken
    }
}
