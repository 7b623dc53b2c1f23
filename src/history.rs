use std::collections::VecDeque;

/// Bounded undo/redo over whole-state snapshots.
///
/// The cursor points at the snapshot matching the live state. Pushing after
/// an undo discards the redo branch; past `limit` entries the oldest
/// snapshot is dropped.
#[derive(Clone, Debug)]
pub struct UndoHistory<T: Clone> {
    entries: VecDeque<T>,
    cursor: usize,
    limit: usize,
}

impl<T: Clone> UndoHistory<T> {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn new(initial: T) -> Self {
        Self::with_limit(initial, Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(initial: T, limit: usize) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            limit: limit.max(1),
        }
    }

    pub fn record(&mut self, value: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(value);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Overwrites the live snapshot in place, discarding any redo branch.
    pub fn replace_current(&mut self, value: T) {
        self.entries.truncate(self.cursor + 1);
        if let Some(slot) = self.entries.get_mut(self.cursor) {
            *slot = value;
        }
    }

    /// Snapshot matching the live state.
    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Forgets everything and starts over from `value`.
    pub fn reset(&mut self, value: T) {
        self.entries.clear();
        self.entries.push_back(value);
        self.cursor = 0;
    }
}
