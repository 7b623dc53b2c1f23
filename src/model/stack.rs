use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::structure::{LegacyAnnotation, Structure, StructureId};
use crate::geometry::Size;
use crate::transform::{Presentation, Rotation};

/// Stable identity of a slice, independent of its position in the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceId(pub u64);

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Slice {
    pub id: SliceId,
    /// URL or opaque handle the host resolves into pixels.
    pub source: String,
    pub annotations: Vec<LegacyAnnotation>,
}

/// An ordered series of slices sharing one coordinate space.
#[derive(Clone, Debug, PartialEq)]
pub struct Stack {
    pub(crate) slices: Vec<Slice>,
    pub(crate) structures: Vec<Structure>,
    natural_size: Option<Size>,
    presentation: Presentation,
    next_slice_id: u64,
    pub(crate) next_structure_id: u64,
    pub(crate) next_legacy_id: u64,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl Stack {
    pub fn new<S: Into<String>>(sources: impl IntoIterator<Item = S>) -> Self {
        let mut stack = Self {
            slices: Vec::new(),
            structures: Vec::new(),
            natural_size: None,
            presentation: Presentation::default(),
            next_slice_id: 1,
            next_structure_id: 1,
            next_legacy_id: 1,
        };
        for source in sources {
            stack.push_slice(source);
        }
        stack
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn slice(&self, index: usize) -> Option<&Slice> {
        self.slices.get(index)
    }

    pub fn slice_id(&self, index: usize) -> Option<SliceId> {
        self.slices.get(index).map(|slice| slice.id)
    }

    pub fn index_of(&self, id: SliceId) -> Option<usize> {
        self.slices.iter().position(|slice| slice.id == id)
    }

    pub(crate) fn slice_mut(&mut self, id: SliceId) -> Option<&mut Slice> {
        self.slices.iter_mut().find(|slice| slice.id == id)
    }

    pub fn slice_ids_in(&self, range: Range<usize>) -> Vec<SliceId> {
        let end = range.end.min(self.slices.len());
        let start = range.start.min(end);
        self.slices[start..end].iter().map(|slice| slice.id).collect()
    }

    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.slices.len().saturating_sub(1))
    }

    pub fn natural_size(&self) -> Option<Size> {
        self.natural_size
    }

    /// Records the shared pixel size; the first usable size wins.
    pub fn adopt_natural_size(&mut self, size: Size) -> bool {
        if self.natural_size.is_some() || !size.is_usable() {
            return false;
        }
        self.natural_size = Some(size);
        true
    }

    pub fn set_natural_size(&mut self, size: Option<Size>) {
        self.natural_size = size.filter(|size| size.is_usable());
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.presentation.rotation = rotation;
    }

    pub fn set_flip_horizontal(&mut self, flip: bool) {
        self.presentation.flip_horizontal = flip;
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.iter().find(|structure| structure.id == id)
    }

    pub(crate) fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures
            .iter_mut()
            .find(|structure| structure.id == id)
    }

    pub fn push_slice(&mut self, source: impl Into<String>) -> SliceId {
        let at = self.slices.len();
        self.insert_slice(at, source)
    }

    /// Inserts a slice at `at` (clamped). Structures are untouched: their
    /// locations follow slice identity, not position.
    pub fn insert_slice(&mut self, at: usize, source: impl Into<String>) -> SliceId {
        let id = SliceId(self.next_slice_id);
        self.next_slice_id += 1;
        let at = at.min(self.slices.len());
        self.slices.insert(
            at,
            Slice {
                id,
                source: source.into(),
                annotations: Vec::new(),
            },
        );
        id
    }

    /// Removes a slice with its legacy annotations and every structure
    /// location on it, pruning structures left without locations.
    pub fn remove_slice(&mut self, index: usize) -> Option<Slice> {
        if index >= self.slices.len() {
            return None;
        }
        let removed = self.slices.remove(index);
        for structure in &mut self.structures {
            structure.locations.remove(&removed.id);
        }
        self.prune_empty_structures();
        if self.slices.is_empty() {
            self.natural_size = None;
        }
        Some(removed)
    }

    pub fn reverse_slices(&mut self) {
        self.slices.reverse();
    }

    pub(crate) fn prune_empty_structures(&mut self) -> usize {
        let before = self.structures.len();
        self.structures.retain(|structure| !structure.is_empty());
        let pruned = before - self.structures.len();
        if pruned > 0 {
            log::debug!("pruned {pruned} structure(s) without locations");
        }
        pruned
    }

    pub(crate) fn reserve_ids(&mut self) {
        let max_structure = self.structures.iter().map(|s| s.id.0).max().unwrap_or(0);
        self.next_structure_id = self.next_structure_id.max(max_structure + 1);
        let max_legacy = self
            .slices
            .iter()
            .flat_map(|slice| slice.annotations.iter().map(|a| a.id.0))
            .max()
            .unwrap_or(0);
        self.next_legacy_id = self.next_legacy_id.max(max_legacy + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::model::{Category, PropagationRange, Shape};

    #[test]
    fn slice_ids_survive_reordering() {
        let mut stack = Stack::new(["a", "b", "c"]);
        let first = stack.slice_id(0).expect("slice");
        stack.reverse_slices();
        assert_eq!(stack.index_of(first), Some(2));
        assert_eq!(stack.slice(0).map(|s| s.source.as_str()), Some("c"));
    }

    #[test]
    fn inserting_a_slice_keeps_locations_on_their_images() {
        let mut stack = Stack::new(["a", "b", "c"]);
        let id = stack
            .create_structure(
                Shape::point(Point::new(0.5, 0.5)),
                Category::Bone,
                1,
                PropagationRange::Current,
            )
            .expect("created");
        stack.insert_slice(0, "new");

        let indices = stack.location_indices(id);
        assert_eq!(indices, vec![2]);
        assert_eq!(stack.slice(2).map(|s| s.source.as_str()), Some("b"));
    }

    #[test]
    fn removing_a_slice_prunes_its_only_structure() {
        let mut stack = Stack::new(["a", "b"]);
        stack
            .create_structure(
                Shape::point(Point::new(0.1, 0.1)),
                Category::Other,
                1,
                PropagationRange::Current,
            )
            .expect("created");
        stack.remove_slice(1).expect("removed");
        assert!(stack.structures().is_empty());
        assert!(stack.remove_slice(9).is_none());
    }

    #[test]
    fn natural_size_is_adopted_once() {
        let mut stack = Stack::new(["a"]);
        assert!(!stack.adopt_natural_size(Size::new(0.0, 10.0)));
        assert!(stack.adopt_natural_size(Size::new(512.0, 512.0)));
        assert!(!stack.adopt_natural_size(Size::new(256.0, 256.0)));
        assert_eq!(stack.natural_size(), Some(Size::new(512.0, 512.0)));
    }
}
