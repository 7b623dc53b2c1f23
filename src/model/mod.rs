pub mod document;
pub mod propagation;
pub mod shape;
pub mod stack;
pub mod store;
pub mod structure;

pub use document::{
    reindex_locations, ImageDocument, LegacyDocument, SliceRemap, StackDocument, StackPatch,
    StructureDocument,
};
pub use propagation::{DeleteScope, PropagationRange, UpdateScope};
pub use shape::{Category, LineShape, PolygonShape, Shape, StructureKind};
pub use stack::{Slice, SliceId, Stack};
pub use store::{AnnotationSnapshot, SliceAnnotation};
pub use structure::{
    AnnotationRef, AnnotationText, AnnotationUpdate, LegacyAnnotation, LegacyId, Structure,
    StructureId,
};
