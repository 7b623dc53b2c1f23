use std::path::PathBuf;
use std::sync::Arc;

use slicemark::model::{
    AnnotationRef, Category, DeleteScope, PropagationRange, SliceId, StackDocument,
};
use slicemark::{Point, PointerEvent, Raster, Size, Tool, WheelEvent};

#[derive(Debug, Clone)]
pub enum Message {
    OpenImages,
    ImagesPicked(Vec<PathBuf>),
    SourcesResolved(Vec<String>),
    OpenDocument,
    /// `None` when the dialog was dismissed.
    DocumentLoaded(Option<Result<LoadedDocument, String>>),
    SaveDocument,
    DocumentSaved(Option<Result<PathBuf, String>>),
    SliceDecoded {
        generation: u64,
        slice: SliceId,
        result: Result<Arc<Raster>, String>,
    },
    Canvas(Size, CanvasEvent),
    SelectTool(Tool),
    SetPropagation(PropagationRange),
    SetDrawCategory(Category),
    SetMagnet(bool),
    SetPropagateDrags(bool),
    SetSlice(u32),
    ReverseSlices,
    RemoveCurrentSlice,
    RotateClockwise,
    RotateCounterClockwise,
    ToggleFlip,
    SetBrightness(f32),
    SetContrast(f32),
    ResetAdjustments,
    Undo,
    Redo,
    Select(AnnotationRef),
    Delete(DeleteScope),
    EditField(TextField, String),
    EditCategory(Category),
    SetCategoryVisible(Category, bool),
    Shortcut(Shortcut),
}

/// Pointer input from the viewport canvas, in canvas-local pixels.
#[derive(Debug, Clone, Copy)]
pub enum CanvasEvent {
    Pressed(PointerEvent),
    Moved(Point),
    Released,
    Wheel(WheelEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Label,
    LabelEn,
    Description,
    DescriptionEn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Cancel,
    DeleteSelection,
    FinishPolygon,
    NextSlice,
    PreviousSlice,
    Undo,
    Redo,
}

/// A stack document read from disk, with the directory its image URLs are
/// relative to.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub document: StackDocument,
}
