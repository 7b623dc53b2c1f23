use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::shape::{Category, Shape, StructureKind};
use super::stack::SliceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyId(pub u64);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Bilingual free text shared by structures and legacy annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotationText {
    pub label: String,
    pub label_en: String,
    pub description: String,
    pub description_en: String,
}

/// A stack-scoped annotation with one shape per slice it appears on.
///
/// `locations` is keyed by stable slice id, so reordering slices never
/// moves a shape onto the wrong image. An empty map means the structure is
/// gone and the stack prunes it.
#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
    pub id: StructureId,
    pub category: Category,
    kind: StructureKind,
    pub locations: BTreeMap<SliceId, Shape>,
    pub text: AnnotationText,
}

impl Structure {
    pub fn new(id: StructureId, kind: StructureKind, category: Category) -> Self {
        Self {
            id,
            category,
            kind,
            locations: BTreeMap::new(),
            text: AnnotationText::default(),
        }
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    pub fn location(&self, slice: SliceId) -> Option<&Shape> {
        self.locations.get(&slice)
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Pre-structure annotation attached to a single slice.
#[derive(Clone, Debug, PartialEq)]
pub struct LegacyAnnotation {
    pub id: LegacyId,
    pub category: Category,
    pub shape: Shape,
    pub text: AnnotationText,
}

impl LegacyAnnotation {
    pub fn kind(&self) -> StructureKind {
        self.shape.kind()
    }
}

/// Which annotation an edit targets, resolved once per operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationRef {
    Structure(StructureId),
    Legacy { slice: SliceId, id: LegacyId },
}

/// Partial edit. Only `shape` is spatial; the rest edits the annotation root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationUpdate {
    pub shape: Option<Shape>,
    pub category: Option<Category>,
    pub label: Option<String>,
    pub label_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
}

impl AnnotationUpdate {
    pub fn shape(shape: Shape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn is_spatial(&self) -> bool {
        self.shape.is_some()
    }

    pub fn has_metadata(&self) -> bool {
        self.category.is_some()
            || self.label.is_some()
            || self.label_en.is_some()
            || self.description.is_some()
            || self.description_en.is_some()
    }

    /// Applies the non-spatial fields; returns whether anything changed.
    pub(crate) fn apply_metadata(&self, category: &mut Category, text: &mut AnnotationText) -> bool {
        let mut changed = false;
        if let Some(next) = self.category {
            changed |= *category != next;
            *category = next;
        }
        for (value, slot) in [
            (&self.label, &mut text.label),
            (&self.label_en, &mut text.label_en),
            (&self.description, &mut text.description),
            (&self.description_en, &mut text.description_en),
        ] {
            if let Some(next) = value {
                changed |= *slot != *next;
                slot.clone_from(next);
            }
        }
        changed
    }
}
