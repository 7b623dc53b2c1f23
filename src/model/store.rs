//! Annotation mutations and how far they propagate across the stack.

use super::propagation::{DeleteScope, PropagationRange, UpdateScope};
use super::shape::{Category, Shape, StructureKind};
use super::stack::{SliceId, Stack};
use super::structure::{
    AnnotationRef, AnnotationText, AnnotationUpdate, LegacyAnnotation, LegacyId, Structure,
    StructureId,
};

/// Borrowed view of one annotation drawn on a slice.
#[derive(Clone, Copy, Debug)]
pub struct SliceAnnotation<'a> {
    pub target: AnnotationRef,
    pub category: Category,
    pub shape: &'a Shape,
    pub text: &'a AnnotationText,
}

/// Everything undo/redo needs to restore annotation state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSnapshot {
    structures: Vec<Structure>,
    legacy: Vec<(SliceId, Vec<LegacyAnnotation>)>,
}

impl Stack {
    /// Creates a structure whose shape is copied onto every slice in
    /// `range`. Returns `None` for an empty stack or a non-finite shape.
    pub fn create_structure(
        &mut self,
        shape: Shape,
        category: Category,
        current: usize,
        range: PropagationRange,
    ) -> Option<StructureId> {
        if !shape.is_finite() {
            log::warn!("refusing to create a structure with non-finite coordinates");
            return None;
        }
        let targets = self.slice_ids_in(range.indices(current, self.len()));
        if targets.is_empty() {
            return None;
        }

        let id = StructureId(self.next_structure_id);
        self.next_structure_id += 1;
        let mut structure = Structure::new(id, shape.kind(), category);
        for slice in &targets {
            structure.locations.insert(*slice, shape.clone());
        }
        log::info!(
            "created {} structure {id} on {} slice(s)",
            shape.kind().as_str(),
            targets.len()
        );
        self.structures.push(structure);
        Some(id)
    }

    /// Applies `update` to a structure.
    ///
    /// Metadata changes land on the structure root once. A shape change is
    /// written to every slice in the scope that already carries this
    /// structure; slices without a location stay without one.
    pub fn update_structure(
        &mut self,
        id: StructureId,
        update: &AnnotationUpdate,
        current: usize,
        scope: UpdateScope,
    ) -> bool {
        let targets = self.slice_ids_in(scope.indices(current, self.len()));
        let Some(structure) = self.structure_mut(id) else {
            return false;
        };

        let mut changed = update.apply_metadata(&mut structure.category, &mut structure.text);
        if let Some(shape) = &update.shape {
            if shape.kind() != structure.kind() {
                log::warn!(
                    "ignoring {} payload for {} structure {id}",
                    shape.kind().as_str(),
                    structure.kind().as_str()
                );
            } else if !shape.is_finite() {
                log::warn!("ignoring non-finite payload for structure {id}");
            } else {
                let mut written = 0;
                for slice in targets {
                    if let Some(location) = structure.locations.get_mut(&slice) {
                        if location != shape {
                            *location = shape.clone();
                            written += 1;
                        }
                    }
                }
                log::trace!("structure {id}: rewrote {written} location(s)");
                changed |= written > 0;
            }
        }
        changed
    }

    /// Removes a structure's locations per `scope`; `All` drops the
    /// structure outright. Structures left without locations are pruned.
    pub fn delete_structure(&mut self, id: StructureId, scope: DeleteScope, current: usize) -> bool {
        let current = self.clamp_index(current);
        let changed = match scope {
            DeleteScope::All => {
                let before = self.structures.len();
                self.structures.retain(|structure| structure.id != id);
                before != self.structures.len()
            }
            DeleteScope::Current => {
                let slice = self.slice_id(current);
                match (slice, self.structure_mut(id)) {
                    (Some(slice), Some(structure)) => structure.locations.remove(&slice).is_some(),
                    _ => false,
                }
            }
            DeleteScope::Forward => {
                let doomed = self.slice_ids_in(current..self.len());
                match self.structure_mut(id) {
                    Some(structure) => {
                        let before = structure.locations.len();
                        structure.locations.retain(|slice, _| !doomed.contains(slice));
                        before != structure.locations.len()
                    }
                    None => false,
                }
            }
        };
        if changed {
            log::info!("deleted structure {id} ({scope:?})");
            self.prune_empty_structures();
        }
        changed
    }

    /// Positional indices of a structure's locations, ascending.
    pub fn location_indices(&self, id: StructureId) -> Vec<usize> {
        let Some(structure) = self.structure(id) else {
            return Vec::new();
        };
        let mut indices: Vec<usize> = structure
            .locations
            .keys()
            .filter_map(|slice| self.index_of(*slice))
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn create_legacy(
        &mut self,
        shape: Shape,
        category: Category,
        current: usize,
    ) -> Option<LegacyId> {
        if !shape.is_finite() {
            return None;
        }
        let slice = self.slice_id(self.clamp_index(current))?;
        let id = LegacyId(self.next_legacy_id);
        self.next_legacy_id += 1;
        self.slice_mut(slice)?.annotations.push(LegacyAnnotation {
            id,
            category,
            shape,
            text: AnnotationText::default(),
        });
        Some(id)
    }

    pub fn update_legacy(&mut self, slice: SliceId, id: LegacyId, update: &AnnotationUpdate) -> bool {
        let Some(annotation) = self
            .slice_mut(slice)
            .and_then(|slice| slice.annotations.iter_mut().find(|a| a.id == id))
        else {
            return false;
        };
        let mut changed = update.apply_metadata(&mut annotation.category, &mut annotation.text);
        if let Some(shape) = &update.shape {
            if shape.kind() == annotation.kind() && shape.is_finite() {
                changed |= annotation.shape != *shape;
                annotation.shape = shape.clone();
            } else {
                log::warn!("ignoring incompatible payload for legacy annotation {id}");
            }
        }
        changed
    }

    pub fn delete_legacy(&mut self, slice: SliceId, id: LegacyId) -> bool {
        let Some(slice) = self.slice_mut(slice) else {
            return false;
        };
        let before = slice.annotations.len();
        slice.annotations.retain(|annotation| annotation.id != id);
        before != slice.annotations.len()
    }

    /// Shape of `target` as drawn on slice `current`.
    pub fn shape_at(&self, target: AnnotationRef, current: usize) -> Option<&Shape> {
        match target {
            AnnotationRef::Structure(id) => {
                let slice = self.slice_id(current)?;
                self.structure(id)?.location(slice)
            }
            AnnotationRef::Legacy { slice, id } => self
                .slices
                .iter()
                .find(|s| s.id == slice)?
                .annotations
                .iter()
                .find(|a| a.id == id)
                .map(|a| &a.shape),
        }
    }

    pub fn contains(&self, target: AnnotationRef) -> bool {
        match target {
            AnnotationRef::Structure(id) => self.structure(id).is_some(),
            AnnotationRef::Legacy { slice, id } => self
                .slices
                .iter()
                .any(|s| s.id == slice && s.annotations.iter().any(|a| a.id == id)),
        }
    }

    /// Category, kind and text of an annotation, wherever it lives.
    pub fn annotation_meta(
        &self,
        target: AnnotationRef,
    ) -> Option<(Category, StructureKind, &AnnotationText)> {
        match target {
            AnnotationRef::Structure(id) => self
                .structure(id)
                .map(|structure| (structure.category, structure.kind(), &structure.text)),
            AnnotationRef::Legacy { slice, id } => self
                .slices
                .iter()
                .find(|s| s.id == slice)?
                .annotations
                .iter()
                .find(|a| a.id == id)
                .map(|annotation| (annotation.category, annotation.kind(), &annotation.text)),
        }
    }

    /// Legacy annotations ignore `scope`: they only ever live on one slice.
    pub fn update_annotation(
        &mut self,
        target: AnnotationRef,
        update: &AnnotationUpdate,
        current: usize,
        scope: UpdateScope,
    ) -> bool {
        match target {
            AnnotationRef::Structure(id) => self.update_structure(id, update, current, scope),
            AnnotationRef::Legacy { slice, id } => self.update_legacy(slice, id, update),
        }
    }

    pub fn delete_annotation(&mut self, target: AnnotationRef, scope: DeleteScope, current: usize) -> bool {
        match target {
            AnnotationRef::Structure(id) => self.delete_structure(id, scope, current),
            AnnotationRef::Legacy { slice, id } => self.delete_legacy(slice, id),
        }
    }

    /// Annotations drawn on slice `index`: structures first, then legacy
    /// annotations, each in creation order.
    pub fn annotations_on(&self, index: usize) -> Vec<SliceAnnotation<'_>> {
        let Some(slice) = self.slice(index) else {
            return Vec::new();
        };
        let structures = self.structures.iter().filter_map(|structure| {
            structure.location(slice.id).map(|shape| SliceAnnotation {
                target: AnnotationRef::Structure(structure.id),
                category: structure.category,
                shape,
                text: &structure.text,
            })
        });
        let legacy = slice.annotations.iter().map(|annotation| SliceAnnotation {
            target: AnnotationRef::Legacy {
                slice: slice.id,
                id: annotation.id,
            },
            category: annotation.category,
            shape: &annotation.shape,
            text: &annotation.text,
        });
        structures.chain(legacy).collect()
    }

    pub fn snapshot(&self) -> AnnotationSnapshot {
        AnnotationSnapshot {
            structures: self.structures.clone(),
            legacy: self
                .slices
                .iter()
                .map(|slice| (slice.id, slice.annotations.clone()))
                .collect(),
        }
    }

    /// Restores annotations from a snapshot. Slices that no longer exist are
    /// skipped and locations pointing at them are dropped.
    pub fn restore(&mut self, snapshot: &AnnotationSnapshot) {
        let live: Vec<SliceId> = self.slices.iter().map(|slice| slice.id).collect();
        self.structures = snapshot.structures.clone();
        for structure in &mut self.structures {
            structure.locations.retain(|slice, _| live.contains(slice));
        }
        self.prune_empty_structures();
        for (slice, annotations) in &snapshot.legacy {
            if let Some(target) = self.slice_mut(*slice) {
                target.annotations = annotations.clone();
            }
        }
        self.reserve_ids();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn stack(len: usize) -> Stack {
        Stack::new((0..len).map(|i| format!("slice-{i}")))
    }

    fn point(x: f64, y: f64) -> Shape {
        Shape::point(Point::new(x, y))
    }

    #[test]
    fn create_writes_the_resolved_range() {
        let mut s = stack(20);
        let ten = s
            .create_structure(point(0.5, 0.5), Category::Bone, 3, PropagationRange::Next10)
            .expect("created");
        assert_eq!(s.location_indices(ten), (3..13).collect::<Vec<_>>());

        let here = s
            .create_structure(point(0.5, 0.5), Category::Bone, 3, PropagationRange::Current)
            .expect("created");
        assert_eq!(s.location_indices(here), vec![3]);

        let all = s
            .create_structure(point(0.5, 0.5), Category::Bone, 3, PropagationRange::All)
            .expect("created");
        assert_eq!(s.location_indices(all), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn created_locations_do_not_alias() {
        let mut s = stack(3);
        let id = s
            .create_structure(
                Shape::polygon(vec![Point::new(0.1, 0.1), Point::new(0.2, 0.2)]),
                Category::Organ,
                0,
                PropagationRange::Forward,
            )
            .expect("created");
        s.update_structure(
            id,
            &AnnotationUpdate::shape(Shape::polygon(vec![Point::new(0.9, 0.9)])),
            1,
            UpdateScope::CurrentOnly,
        );
        assert_eq!(s.shape_at(AnnotationRef::Structure(id), 0).map(|s| s.vertices().len()), Some(2));
        assert_eq!(s.shape_at(AnnotationRef::Structure(id), 1).map(|s| s.vertices().len()), Some(1));
    }

    #[test]
    fn updates_never_create_locations() {
        for range in PropagationRange::ALL {
            let mut s = stack(10);
            let id = s
                .create_structure(point(0.2, 0.2), Category::Nerve, 2, PropagationRange::Current)
                .expect("created");
            let update = AnnotationUpdate::shape(point(0.7, 0.7));

            s.update_structure(id, &update, 5, UpdateScope::CurrentOnly);
            s.update_structure(id, &update, 5, UpdateScope::Propagate(range));
            assert_eq!(s.location_indices(id), vec![2], "{range:?}");
        }
    }

    #[test]
    fn propagated_update_rewrites_existing_locations_in_range() {
        let mut s = stack(10);
        let id = s
            .create_structure(point(0.2, 0.2), Category::Nerve, 0, PropagationRange::All)
            .expect("created");
        let moved = point(0.6, 0.4);
        assert!(s.update_structure(
            id,
            &AnnotationUpdate::shape(moved.clone()),
            4,
            UpdateScope::Propagate(PropagationRange::Forward)
        ));
        assert_eq!(s.shape_at(AnnotationRef::Structure(id), 3), Some(&point(0.2, 0.2)));
        assert_eq!(s.shape_at(AnnotationRef::Structure(id), 4), Some(&moved));
        assert_eq!(s.shape_at(AnnotationRef::Structure(id), 9), Some(&moved));
    }

    #[test]
    fn metadata_updates_touch_the_root_only() {
        let mut s = stack(4);
        let id = s
            .create_structure(point(0.2, 0.2), Category::Other, 0, PropagationRange::All)
            .expect("created");
        let update = AnnotationUpdate {
            label: Some("Femur".into()),
            label_en: Some("Femur".into()),
            category: Some(Category::Bone),
            ..AnnotationUpdate::default()
        };
        assert!(s.update_structure(id, &update, 2, UpdateScope::CurrentOnly));
        let structure = s.structure(id).expect("structure");
        assert_eq!(structure.text.label, "Femur");
        assert_eq!(structure.category, Category::Bone);
        assert_eq!(structure.locations.len(), 4);
        assert!(!s.update_structure(id, &update, 2, UpdateScope::CurrentOnly));
    }

    #[test]
    fn kind_never_changes() {
        let mut s = stack(2);
        let id = s
            .create_structure(point(0.2, 0.2), Category::Other, 0, PropagationRange::Current)
            .expect("created");
        let line = Shape::line(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        assert!(!s.update_structure(id, &AnnotationUpdate::shape(line), 0, UpdateScope::CurrentOnly));
        assert_eq!(s.structure(id).map(Structure::kind), Some(StructureKind::Point));
    }

    #[test]
    fn forward_delete_keeps_earlier_slices() {
        let mut s = stack(10);
        let id = s
            .create_structure(point(0.3, 0.3), Category::Vessel, 2, PropagationRange::Current)
            .expect("created");
        for index in [4, 6, 8] {
            let slice = s.slice_id(index).expect("slice");
            s.structure_mut(id)
                .expect("structure")
                .locations
                .insert(slice, point(0.3, 0.3));
        }

        assert!(s.delete_structure(id, DeleteScope::Forward, 5));
        assert_eq!(s.location_indices(id), vec![2, 4]);

        assert!(s.delete_structure(id, DeleteScope::Forward, 0));
        assert!(s.structure(id).is_none());
    }

    #[test]
    fn current_delete_prunes_last_location() {
        let mut s = stack(3);
        let id = s
            .create_structure(point(0.3, 0.3), Category::Vessel, 1, PropagationRange::Current)
            .expect("created");
        assert!(!s.delete_structure(id, DeleteScope::Current, 0));
        assert!(s.delete_structure(id, DeleteScope::Current, 1));
        assert!(s.structures().is_empty());
    }

    #[test]
    fn legacy_annotations_stay_on_their_slice() {
        let mut s = stack(3);
        let id = s.create_legacy(point(0.4, 0.4), Category::Lesion, 1).expect("created");
        let slice = s.slice_id(1).expect("slice");
        let target = AnnotationRef::Legacy { slice, id };

        assert!(s.update_annotation(
            target,
            &AnnotationUpdate::shape(point(0.5, 0.5)),
            1,
            UpdateScope::Propagate(PropagationRange::All)
        ));
        assert_eq!(s.annotations_on(0).len(), 0);
        assert_eq!(s.annotations_on(1).len(), 1);
        assert_eq!(s.shape_at(target, 1), Some(&point(0.5, 0.5)));
        assert_eq!(
            s.annotation_meta(target).map(|(category, kind, _)| (category, kind)),
            Some((Category::Lesion, StructureKind::Point))
        );

        assert!(s.delete_annotation(target, DeleteScope::All, 1));
        assert!(!s.contains(target));
    }

    #[test]
    fn restore_returns_to_snapshot() {
        let mut s = stack(3);
        let before = s.snapshot();
        let id = s
            .create_structure(point(0.3, 0.3), Category::Vessel, 0, PropagationRange::All)
            .expect("created");
        s.restore(&before);
        assert!(s.structure(id).is_none());

        let next = s
            .create_structure(point(0.3, 0.3), Category::Vessel, 0, PropagationRange::All)
            .expect("created");
        assert_ne!(next, id);
    }
}
