//! Viewport and spatial-annotation engine for stacked radiology images.
//!
//! The engine maps normalized annotation coordinates through rotation, flip,
//! zoom and pan into screen space, keeps per-slice structures that propagate
//! across a stack, and offers edge snapping and polygon editing helpers.
//! It never touches the network or the filesystem except for loading its
//! own configuration; hosts feed it rasters and receive stack patches.

pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod interaction;
pub mod model;
pub mod raster;
pub mod render;
pub mod snap;
pub mod transform;
pub mod viewer;

pub use config::ViewerConfig;
pub use error::{ConfigError, DocumentError, RasterError};
pub use geometry::{Point, Size};
pub use interaction::{Modifiers, PointerButton, PointerEvent, Tool, WheelEvent};
pub use model::{
    AnnotationRef, AnnotationUpdate, Category, DeleteScope, PropagationRange, Shape, Stack,
    StackDocument, StackPatch, StructureKind, UpdateScope,
};
pub use raster::{Raster, RasterStatus};
pub use viewer::Viewer;
