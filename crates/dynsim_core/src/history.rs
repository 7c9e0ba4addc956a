use crate::proxy::RhsProxy;
use std::ops::Index;

#[derive(Debug, Clone)]
struct Entry {
    state: Vec<f64>,
    rhs: Vec<f64>,
    rhs_valid: bool,
}

/// Fixed-capacity ring buffer of past states (the orbit).
///
/// Offsets count backwards in time: `0` is the most recent state, `1` (or
/// `history[-1]` through [`Index<isize>`]) the one before it. Each entry also
/// caches f(state), computed on first request, so multistep methods never
/// evaluate the vector field twice at the same point.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Entry>,
    head: usize,
    len: usize,
    dim: usize,
}

impl History {
    pub fn new(capacity: usize, dim: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        let entry = Entry {
            state: vec![0.0; dim],
            rhs: vec![0.0; dim],
            rhs_valid: false,
        };
        Self {
            entries: vec![entry; capacity],
            head: 0,
            len: 0,
            dim,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of states currently held (at most `capacity`).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discards everything and seeds the buffer with a single initial state.
    pub fn reset(&mut self, initial: &[f64]) {
        assert_eq!(initial.len(), self.dim, "initial state dimension mismatch");
        self.head = 0;
        self.len = 1;
        let entry = &mut self.entries[0];
        entry.state.copy_from_slice(initial);
        entry.rhs_valid = false;
    }

    /// Appends `state` as the new most recent entry, overwriting the oldest
    /// one once the buffer is full.
    pub fn push(&mut self, state: &[f64]) {
        assert_eq!(state.len(), self.dim, "state dimension mismatch");
        self.head = (self.head + 1) % self.entries.len();
        self.len = (self.len + 1).min(self.entries.len());
        let entry = &mut self.entries[self.head];
        entry.state.copy_from_slice(state);
        entry.rhs_valid = false;
    }

    /// Forgets every cached derivative, e.g. after the parameters were rebound.
    pub fn invalidate_derivatives(&mut self) {
        for entry in &mut self.entries {
            entry.rhs_valid = false;
        }
    }

    pub fn current(&self) -> &[f64] {
        self.state(0)
    }

    /// State `back` steps in the past. Panics if fewer states are held.
    pub fn state(&self, back: usize) -> &[f64] {
        &self.entries[self.slot(back)].state
    }

    /// Makes sure f(state(back)) is cached. Returns `false` if the vector field
    /// could not be evaluated there.
    pub fn ensure_rhs(&mut self, back: usize, proxy: &RhsProxy<'_>) -> bool {
        let slot = self.slot(back);
        let entry = &mut self.entries[slot];
        if entry.rhs_valid {
            return true;
        }
        if !proxy.call_system_function(&entry.state, &mut entry.rhs) {
            return false;
        }
        entry.rhs_valid = true;
        true
    }

    /// Cached derivative at `state(back)`; call [`ensure_rhs`](Self::ensure_rhs) first.
    pub fn rhs(&self, back: usize) -> &[f64] {
        let entry = &self.entries[self.slot(back)];
        debug_assert!(entry.rhs_valid, "derivative at offset {back} was not evaluated");
        &entry.rhs
    }

    fn slot(&self, back: usize) -> usize {
        assert!(
            back < self.len,
            "history offset {} out of range (holding {} states)",
            back,
            self.len
        );
        let cap = self.entries.len();
        (self.head + cap - back) % cap
    }
}

impl Index<isize> for History {
    type Output = [f64];

    /// `history[0]` is the most recent state, `history[-k]` the state k steps ago.
    fn index(&self, offset: isize) -> &[f64] {
        assert!(offset <= 0, "history offsets are zero or negative");
        self.state(offset.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::proxy::RhsProxy;
    use crate::traits::FnSystem;

    #[test]
    fn push_orders_by_recency_and_drops_oldest() {
        let mut history = History::new(3, 1);
        history.reset(&[0.0]);
        for value in 1..=4 {
            history.push(&[value as f64]);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], [4.0]);
        assert_eq!(history[-1], [3.0]);
        assert_eq!(history[-2], [2.0]);
    }

    #[test]
    fn reset_discards_previous_run() {
        let mut history = History::new(2, 2);
        history.reset(&[1.0, 2.0]);
        history.push(&[3.0, 4.0]);
        history.reset(&[5.0, 6.0]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), &[5.0, 6.0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn reading_beyond_filled_entries_panics() {
        let mut history = History::new(4, 1);
        history.reset(&[1.0]);
        let _ = history.state(1);
    }

    #[test]
    fn derivatives_are_cached_per_entry() {
        let system = FnSystem::new(1, |x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = -x[0];
            true
        });
        let proxy = RhsProxy::new(&system, &[]);
        let mut history = History::new(2, 1);
        history.reset(&[2.0]);

        assert!(history.ensure_rhs(0, &proxy));
        assert!(history.ensure_rhs(0, &proxy));
        assert_eq!(proxy.evaluations(), 1);
        assert_eq!(history.rhs(0), &[-2.0]);

        history.push(&[3.0]);
        assert!(history.ensure_rhs(0, &proxy));
        assert!(history.ensure_rhs(1, &proxy));
        assert_eq!(proxy.evaluations(), 2);
        assert_eq!(history.rhs(1), &[-2.0]);

        history.invalidate_derivatives();
        assert!(history.ensure_rhs(1, &proxy));
        assert_eq!(proxy.evaluations(), 3);
    }
}
