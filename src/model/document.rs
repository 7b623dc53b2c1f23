//! Persisted form of a stack and the patches emitted after edits.
//!
//! Documents key structure locations by slice position; the in-memory
//! [`Stack`] keys them by slice identity. Conversion happens here and
//! nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::shape::{Category, Shape, StructureKind};
use super::stack::Stack;
use super::structure::{AnnotationText, LegacyAnnotation, LegacyId, Structure, StructureId};
use crate::error::DocumentError;
use crate::geometry::Size;
use crate::transform::Rotation;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDocument {
    #[serde(default)]
    pub images: Vec<ImageDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_height: Option<f64>,
    #[serde(default)]
    pub rotate: Rotation,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub structures: Vec<StructureDocument>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDocument {
    pub url: String,
    #[serde(default)]
    pub annotations: Vec<LegacyDocument>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDocument {
    pub id: LegacyId,
    #[serde(default)]
    pub category: Category,
    #[serde(rename = "type")]
    pub kind: StructureKind,
    pub location: Shape,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_en: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub description_en: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDocument {
    pub id: StructureId,
    #[serde(default)]
    pub category: Category,
    #[serde(rename = "type")]
    pub kind: StructureKind,
    #[serde(default)]
    pub locations: BTreeMap<usize, Shape>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_en: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub description_en: String,
}

impl StructureDocument {
    pub fn text(&self) -> AnnotationText {
        AnnotationText {
            label: self.label.clone(),
            label_en: self.label_en.clone(),
            description: self.description.clone(),
            description_en: self.description_en.clone(),
        }
    }
}

impl LegacyDocument {
    pub fn text(&self) -> AnnotationText {
        AnnotationText {
            label: self.label.clone(),
            label_en: self.label_en.clone(),
            description: self.description.clone(),
            description_en: self.description_en.clone(),
        }
    }
}

/// Whole-field replacement emitted to the host after a committed edit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structures: Option<Vec<StructureDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<Rotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_horizontal: Option<bool>,
}

impl StackPatch {
    /// Structures plus images, since legacy annotations live on images.
    pub fn annotations(stack: &Stack) -> Self {
        Self {
            images: Some(images_of(stack)),
            structures: Some(structures_of(stack)),
            ..Self::default()
        }
    }

    pub fn presentation(stack: &Stack) -> Self {
        let presentation = stack.presentation();
        Self {
            rotate: Some(presentation.rotation),
            flip_horizontal: Some(presentation.flip_horizontal),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_none()
            && self.structures.is_none()
            && self.rotate.is_none()
            && self.flip_horizontal.is_none()
    }

    pub fn apply_to(&self, document: &mut StackDocument) {
        if let Some(images) = &self.images {
            document.images.clone_from(images);
        }
        if let Some(structures) = &self.structures {
            document.structures.clone_from(structures);
        }
        if let Some(rotate) = self.rotate {
            document.rotate = rotate;
        }
        if let Some(flip) = self.flip_horizontal {
            document.flip_horizontal = flip;
        }
    }
}

/// A positional change to a stack's image list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceRemap {
    /// A slice was inserted at this index.
    Insert(usize),
    /// The slice at this index was removed.
    Delete(usize),
    /// A stack of this length was reversed.
    Reverse(usize),
}

impl SliceRemap {
    /// New index for an old one, or `None` if that slice is gone.
    pub fn apply(self, index: usize) -> Option<usize> {
        match self {
            Self::Insert(at) if index >= at => Some(index + 1),
            Self::Insert(_) => Some(index),
            Self::Delete(at) if index == at => None,
            Self::Delete(at) if index > at => Some(index - 1),
            Self::Delete(_) => Some(index),
            Self::Reverse(len) if index < len => Some(len - 1 - index),
            Self::Reverse(_) => None,
        }
    }
}

pub fn reindex_locations<T: Clone>(
    locations: &BTreeMap<usize, T>,
    remap: SliceRemap,
) -> BTreeMap<usize, T> {
    locations
        .iter()
        .filter_map(|(index, value)| remap.apply(*index).map(|next| (next, value.clone())))
        .collect()
}

impl StackDocument {
    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn images_of(stack: &Stack) -> Vec<ImageDocument> {
    stack
        .slices()
        .iter()
        .map(|slice| ImageDocument {
            url: slice.source.clone(),
            annotations: slice
                .annotations
                .iter()
                .map(|annotation| LegacyDocument {
                    id: annotation.id,
                    category: annotation.category,
                    kind: annotation.kind(),
                    location: annotation.shape.clone(),
                    label: annotation.text.label.clone(),
                    label_en: annotation.text.label_en.clone(),
                    description: annotation.text.description.clone(),
                    description_en: annotation.text.description_en.clone(),
                })
                .collect(),
        })
        .collect()
}

fn structures_of(stack: &Stack) -> Vec<StructureDocument> {
    stack
        .structures()
        .iter()
        .map(|structure| StructureDocument {
            id: structure.id,
            category: structure.category,
            kind: structure.kind(),
            locations: structure
                .locations
                .iter()
                .filter_map(|(slice, shape)| stack.index_of(*slice).map(|i| (i, shape.clone())))
                .collect(),
            label: structure.text.label.clone(),
            label_en: structure.text.label_en.clone(),
            description: structure.text.description.clone(),
            description_en: structure.text.description_en.clone(),
        })
        .collect()
}

impl Stack {
    /// Builds a stack from its persisted form.
    ///
    /// Locations pointing past the last image are dropped with a warning;
    /// a payload whose shape disagrees with its structure type is an error.
    pub fn from_document(document: &StackDocument) -> Result<Self, DocumentError> {
        let mut stack = Stack::new(document.images.iter().map(|image| image.url.clone()));
        if let (Some(width), Some(height)) = (document.natural_width, document.natural_height) {
            stack.set_natural_size(Some(Size::new(width, height)));
        }
        stack.set_rotation(document.rotate);
        stack.set_flip_horizontal(document.flip_horizontal);

        for (index, (slice, image)) in stack.slices.iter_mut().zip(&document.images).enumerate() {
            for annotation in &image.annotations {
                if annotation.location.kind() != annotation.kind {
                    return Err(DocumentError::LegacyKindMismatch {
                        id: annotation.id.0,
                        slice: index,
                        expected: annotation.kind.as_str(),
                        found: annotation.location.kind().as_str(),
                    });
                }
                slice.annotations.push(LegacyAnnotation {
                    id: annotation.id,
                    category: annotation.category,
                    shape: annotation.location.clone(),
                    text: annotation.text(),
                });
            }
        }

        for entry in &document.structures {
            let mut structure = Structure::new(entry.id, entry.kind, entry.category);
            structure.text = entry.text();
            for (index, shape) in &entry.locations {
                if shape.kind() != entry.kind {
                    return Err(DocumentError::KindMismatch {
                        id: entry.id.0,
                        slice: *index,
                        expected: entry.kind.as_str(),
                        found: shape.kind().as_str(),
                    });
                }
                match stack.slice_id(*index) {
                    Some(slice) => {
                        structure.locations.insert(slice, shape.clone());
                    }
                    None => log::warn!(
                        "structure {} points at slice {index} of a {}-slice stack",
                        entry.id,
                        stack.len()
                    ),
                }
            }
            stack.structures.push(structure);
        }
        stack.prune_empty_structures();
        stack.reserve_ids();
        Ok(stack)
    }

    pub fn to_document(&self) -> StackDocument {
        let presentation = self.presentation();
        StackDocument {
            images: images_of(self),
            natural_width: self.natural_size().map(|size| size.width),
            natural_height: self.natural_size().map(|size| size.height),
            rotate: presentation.rotation,
            flip_horizontal: presentation.flip_horizontal,
            structures: structures_of(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use crate::geometry::Point;
    use crate::model::PropagationRange;
    use assert_matches::assert_matches;

    const DOCUMENT: &str = r#"{
        "images": [
            { "url": "a.png" },
            { "url": "b.png", "annotations": [
                { "id": 4, "type": "point", "location": { "x": 0.5, "y": 0.5 }, "label": "old" }
            ] },
            { "url": "c.png" }
        ],
        "rotate": 90,
        "flipHorizontal": true,
        "structures": [
            { "id": 7, "category": "vessel", "type": "line", "label": "Aorta",
              "locations": { "0": { "startX": 0.1, "startY": 0.1, "endX": 0.2, "endY": 0.2 },
                             "2": { "startX": 0.3, "startY": 0.3, "endX": 0.4, "endY": 0.4 },
                             "9": { "startX": 0.3, "startY": 0.3, "endX": 0.4, "endY": 0.4 } } }
        ]
    }"#;

    #[test]
    fn document_loads_into_stack() {
        let document = StackDocument::from_json(DOCUMENT).expect("parse");
        let stack = Stack::from_document(&document).expect("stack");

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.presentation().rotation, Rotation::Deg90);
        assert!(stack.presentation().flip_horizontal);
        assert_eq!(stack.location_indices(StructureId(7)), vec![0, 2]);
        assert_eq!(stack.annotations_on(1).len(), 1);
        assert_eq!(
            stack.structure(StructureId(7)).map(|s| s.text.label.as_str()),
            Some("Aorta")
        );
    }

    #[test]
    fn new_ids_do_not_collide_with_loaded_ones() {
        let document = StackDocument::from_json(DOCUMENT).expect("parse");
        let mut stack = Stack::from_document(&document).expect("stack");
        let id = stack
            .create_structure(
                Shape::point(Point::new(0.5, 0.5)),
                Category::Other,
                0,
                PropagationRange::Current,
            )
            .expect("created");
        assert!(id.0 > 7);
        let legacy = stack
            .create_legacy(Shape::point(Point::new(0.1, 0.1)), Category::Other, 0)
            .expect("created");
        assert!(legacy.0 > 4);
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let raw = r#"{ "images": [{ "url": "a" }], "structures": [
            { "id": 1, "type": "polygon", "locations": { "0": { "x": 0.1, "y": 0.1 } } } ] }"#;
        let document = StackDocument::from_json(raw).expect("parse");
        assert_matches!(
            Stack::from_document(&document),
            Err(DocumentError::KindMismatch { slice: 0, .. })
        );
    }

    #[test]
    fn mismatched_legacy_payload_is_rejected() {
        let raw = r#"{ "images": [{ "url": "a" }, { "url": "b", "annotations": [
            { "id": 3, "type": "line", "location": { "x": 0.1, "y": 0.1 } } ] }] }"#;
        let document = StackDocument::from_json(raw).expect("parse");
        assert_matches!(
            Stack::from_document(&document),
            Err(DocumentError::LegacyKindMismatch {
                id: 3,
                slice: 1,
                expected: "line",
                found: "point",
            })
        );
    }

    #[test]
    fn document_round_trips_through_the_stack() {
        let document = StackDocument::from_json(DOCUMENT).expect("parse");
        let stack = Stack::from_document(&document).expect("stack");
        let saved = stack.to_document();

        let json = serde_json::to_value(&saved).expect("serialize");
        assert_eq!(json["rotate"], 90);
        assert_eq!(json["structures"][0]["type"], "line");
        assert_eq!(json["structures"][0]["label"], "Aorta");
        assert!(json["structures"][0]["locations"]["2"].is_object());
        assert!(json["structures"][0]["locations"].get("9").is_none());
    }

    #[test]
    fn remap_covers_insert_delete_and_reverse() {
        let locations: BTreeMap<usize, char> = [(0, 'a'), (2, 'c'), (4, 'e')].into_iter().collect();

        let inserted = reindex_locations(&locations, SliceRemap::Insert(1));
        assert_eq!(inserted.keys().copied().collect::<Vec<_>>(), vec![0, 3, 5]);

        let deleted = reindex_locations(&locations, SliceRemap::Delete(2));
        assert_eq!(deleted, [(0, 'a'), (3, 'e')].into_iter().collect());

        let reversed = reindex_locations(&locations, SliceRemap::Reverse(5));
        assert_eq!(reversed, [(0, 'e'), (2, 'c'), (4, 'a')].into_iter().collect());
    }

    #[test]
    fn patch_only_carries_requested_fields() {
        let stack = Stack::new(["a"]);
        let json = serde_json::to_value(StackPatch::presentation(&stack)).expect("serialize");
        assert!(json.get("structures").is_none());
        assert_eq!(json["flipHorizontal"], false);

        let mut document = StackDocument::default();
        StackPatch::annotations(&stack).apply_to(&mut document);
        assert_eq!(document.images.len(), 1);
    }
}
