//! The engine facade a host embeds: one stack, one camera, one tool.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::ViewerConfig;
use crate::geometry::{Point, Size};
use crate::history::UndoHistory;
use crate::interaction::{DragState, Tool};
use crate::model::{
    AnnotationRef, AnnotationSnapshot, AnnotationUpdate, Category, DeleteScope, PropagationRange,
    Shape, SliceAnnotation, SliceId, SliceRemap, Stack, StackPatch, StructureId, UpdateScope,
};
use crate::raster::{Raster, RasterStatus, Tone};
use crate::snap::{snap_to_edge, SnapSettings};
use crate::transform::{pan_by_screen_delta, Camera, Rotation, Viewport};

pub type UpdateHook = Box<dyn FnMut(&StackPatch)>;
pub type SliceHook = Box<dyn FnMut(usize)>;

pub struct Viewer {
    pub(crate) stack: Stack,
    pub(crate) config: ViewerConfig,
    pub(crate) current: usize,
    pub(crate) camera: Camera,
    tone: Tone,
    container: Option<Size>,
    rasters: HashMap<SliceId, RasterStatus>,
    pub(crate) tool: Tool,
    pub(crate) drag: DragState,
    pub(crate) pending_line: Option<Point>,
    pub(crate) polygon_draft: Vec<Point>,
    pub(crate) cursor: Option<Point>,
    pub(crate) selection: Option<AnnotationRef>,
    propagation: PropagationRange,
    propagate_drags: bool,
    magnet: bool,
    draw_category: Category,
    hidden: BTreeSet<Category>,
    history: UndoHistory<AnnotationSnapshot>,
    text_edit: Option<TextEdit>,
    on_update: Option<UpdateHook>,
    on_slice_change: Option<SliceHook>,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(Stack::default(), ViewerConfig::default())
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("slices", &self.stack.len())
            .field("current", &self.current)
            .field("camera", &self.camera)
            .field("tool", &self.tool)
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}

impl Viewer {
    pub fn new(stack: Stack, config: ViewerConfig) -> Self {
        let config = config.validate();
        let history = UndoHistory::new(stack.snapshot());
        Self {
            magnet: config.magnet,
            stack,
            config,
            current: 0,
            camera: Camera::default(),
            tone: Tone::default(),
            container: None,
            rasters: HashMap::new(),
            tool: Tool::default(),
            drag: DragState::None,
            pending_line: None,
            polygon_draft: Vec::new(),
            cursor: None,
            selection: None,
            propagation: PropagationRange::default(),
            propagate_drags: false,
            draw_category: Category::default(),
            hidden: BTreeSet::new(),
            history,
            text_edit: None,
            on_update: None,
            on_slice_change: None,
        }
    }

    /// Called with every patch a committed change produces.
    pub fn set_on_update(&mut self, hook: impl FnMut(&StackPatch) + 'static) {
        self.on_update = Some(Box::new(hook));
    }

    /// Called with the new index whenever the current slice changes.
    pub fn set_on_slice_change(&mut self, hook: impl FnMut(usize) + 'static) {
        self.on_slice_change = Some(Box::new(hook));
    }

    /// Swaps in another stack, discarding every piece of per-stack session
    /// state (camera, rasters, drafts, history).
    pub fn replace_stack(&mut self, stack: Stack) {
        self.cancel_transient();
        self.stack = stack;
        self.camera = Camera::default();
        self.rasters.clear();
        self.selection = None;
        self.history.reset(self.stack.snapshot());
        self.current = 0;
        log::info!("viewer now shows {} slice(s)", self.stack.len());
        self.notify_slice();
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn current_slice(&self) -> usize {
        self.current
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn selection(&self) -> Option<AnnotationRef> {
        self.selection
    }

    pub fn pending_line(&self) -> Option<Point> {
        self.pending_line
    }

    pub fn polygon_draft(&self) -> &[Point] {
        &self.polygon_draft
    }

    /// Last pointer position in normalized space, if over the viewport.
    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn propagation(&self) -> PropagationRange {
        self.propagation
    }

    pub fn set_propagation(&mut self, range: PropagationRange) {
        self.propagation = range;
    }

    pub fn propagate_drags(&self) -> bool {
        self.propagate_drags
    }

    /// Opts drags into the ambient propagation range instead of the
    /// current slice only.
    pub fn set_propagate_drags(&mut self, enabled: bool) {
        self.propagate_drags = enabled;
    }

    pub fn magnet(&self) -> bool {
        self.magnet
    }

    pub fn set_magnet(&mut self, enabled: bool) {
        self.magnet = enabled;
    }

    pub fn draw_category(&self) -> Category {
        self.draw_category
    }

    pub fn set_draw_category(&mut self, category: Category) {
        self.draw_category = category;
    }

    // Slice navigation

    /// Moves to `index`, clamped into the stack. Any drawing or drag in
    /// progress is abandoned.
    pub fn set_current_slice(&mut self, index: usize) {
        let index = self.stack.clamp_index(index);
        if index == self.current {
            return;
        }
        self.cancel_transient();
        self.current = index;
        if let Some(AnnotationRef::Legacy { .. }) = self.selection {
            self.selection = None;
        }
        self.notify_slice();
    }

    pub fn step_slice(&mut self, delta: i64) {
        let target = (self.current as i64).saturating_add(delta).max(0) as usize;
        self.set_current_slice(target);
    }

    /// Reverses slice order. The current image stays current and every
    /// annotation stays on its image.
    pub fn reverse_slices(&mut self) {
        let len = self.stack.len();
        if len < 2 {
            return;
        }
        self.cancel_transient();
        self.stack.reverse_slices();
        self.current = SliceRemap::Reverse(len).apply(self.current).unwrap_or(0);
        log::info!("reversed {len} slices");
        self.emit(StackPatch::annotations(&self.stack));
        self.notify_slice();
    }

    /// Removes the slice at `index` with everything drawn on it. Structures
    /// left without locations are dropped.
    pub fn remove_slice(&mut self, index: usize) -> bool {
        self.cancel_transient();
        let Some(removed) = self.stack.remove_slice(index) else {
            return false;
        };
        self.rasters.remove(&removed.id);
        if let Some(target) = self.selection {
            if !self.stack.contains(target) {
                self.selection = None;
            }
        }
        let previous = self.current;
        let next = SliceRemap::Delete(index).apply(previous).unwrap_or(index);
        self.current = self.stack.clamp_index(next);
        log::info!("removed slice {index} ({})", removed.source);
        self.commit();
        if self.current != previous || index == previous {
            self.notify_slice();
        }
        true
    }

    fn notify_slice(&mut self) {
        let index = self.current;
        if let Some(hook) = self.on_slice_change.as_mut() {
            hook(index);
        }
    }

    // Camera

    /// Records the canvas size; unusable sizes leave the viewport unsized.
    pub fn set_container_size(&mut self, size: Size) {
        self.container = Some(size).filter(|size| size.is_usable());
    }

    pub fn container_size(&self) -> Option<Size> {
        self.container
    }

    /// The natural size shared by the stack, falling back to the current
    /// slice's raster while the stack has none recorded.
    pub fn natural_size(&self) -> Option<Size> {
        self.stack.natural_size().or_else(|| {
            self.current_raster()
                .map(|raster| raster.natural_size())
                .filter(|size| size.is_usable())
        })
    }

    /// Coordinate mapping for this frame, or `None` while anything is unsized.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport_in(self.container?)
    }

    /// Same mapping for a container the viewer has not been told about yet,
    /// as when a canvas draws at a new size before its next event.
    pub fn viewport_in(&self, container: Size) -> Option<Viewport> {
        Viewport::new(
            self.natural_size()?,
            container,
            &self.camera,
            self.stack.presentation(),
        )
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.camera = self
            .camera
            .zoomed(factor, self.config.min_scale, self.config.max_scale);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if let Some(viewport) = self.viewport() {
            self.camera = pan_by_screen_delta(&self.camera, dx, dy, &viewport);
        }
    }

    pub fn reset_view(&mut self) {
        self.camera = Camera::default();
    }

    // Adjustments

    pub fn rotate_clockwise(&mut self) {
        let next = self.stack.presentation().rotation.clockwise();
        self.set_rotation(next);
    }

    pub fn rotate_counter_clockwise(&mut self) {
        let next = self.stack.presentation().rotation.counter_clockwise();
        self.set_rotation(next);
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        if self.stack.presentation().rotation == rotation {
            return;
        }
        self.stack.set_rotation(rotation);
        log::debug!("rotation now {}°", rotation.degrees());
        self.emit(StackPatch::presentation(&self.stack));
    }

    pub fn toggle_flip(&mut self) {
        let flip = !self.stack.presentation().flip_horizontal;
        self.stack.set_flip_horizontal(flip);
        self.emit(StackPatch::presentation(&self.stack));
    }

    pub fn set_brightness(&mut self, brightness: f64) {
        self.tone = Tone {
            brightness,
            ..self.tone
        }
        .clamped();
    }

    pub fn set_contrast(&mut self, contrast: f64) {
        self.tone = Tone {
            contrast,
            ..self.tone
        }
        .clamped();
    }

    /// Restores neutral tone, unrotated and unflipped presentation, and the
    /// fitted camera.
    pub fn reset_adjustments(&mut self) {
        self.tone = Tone::default();
        self.camera = Camera::default();
        let presentation = self.stack.presentation();
        if presentation.rotation != Rotation::Deg0 || presentation.flip_horizontal {
            self.stack.set_rotation(Rotation::Deg0);
            self.stack.set_flip_horizontal(false);
            self.emit(StackPatch::presentation(&self.stack));
        }
    }

    // Rasters

    pub fn set_raster_pending(&mut self, index: usize) {
        if let Some(slice) = self.stack.slice_id(index) {
            self.rasters.insert(slice, RasterStatus::Pending);
        }
    }

    /// Stores a decoded raster; the first one sizes the stack.
    pub fn set_raster_ready(&mut self, index: usize, raster: Arc<Raster>) {
        let Some(slice) = self.stack.slice_id(index) else {
            log::warn!("raster for missing slice {index} dropped");
            return;
        };
        let size = raster.natural_size();
        if self.stack.adopt_natural_size(size) {
            log::info!("stack sized {}x{}", size.width, size.height);
        } else if self.stack.natural_size() != Some(size) {
            log::warn!(
                "slice {index} is {}x{}, stack assumes {:?}",
                size.width,
                size.height,
                self.stack.natural_size()
            );
        }
        self.rasters.insert(slice, RasterStatus::Ready(raster));
    }

    /// Records a decode failure; the slice stays unusable for snapping.
    pub fn set_raster_failed(&mut self, index: usize, reason: impl Into<String>) {
        if let Some(slice) = self.stack.slice_id(index) {
            let reason = reason.into();
            log::error!("slice {index} failed to decode: {reason}");
            self.rasters.insert(slice, RasterStatus::Failed(reason));
        }
    }

    pub fn raster_status(&self, index: usize) -> RasterStatus {
        self.stack
            .slice_id(index)
            .and_then(|slice| self.rasters.get(&slice).cloned())
            .unwrap_or_default()
    }

    pub fn current_raster(&self) -> Option<&Arc<Raster>> {
        let slice = self.stack.slice_id(self.current)?;
        self.rasters.get(&slice)?.ready()
    }

    /// Applies the magnet when it is on; otherwise the point is returned.
    pub fn snap(&self, point: Point) -> Point {
        if !self.magnet {
            return point;
        }
        snap_to_edge(
            self.current_raster().map(Arc::as_ref),
            point,
            SnapSettings::from(&self.config),
        )
    }

    // Annotations

    /// Draws a new structure on the current slice, fanned out over the
    /// selected propagation range, and selects it.
    pub fn create_structure(&mut self, shape: Shape) -> Option<StructureId> {
        let id = self.stack.create_structure(
            shape,
            self.draw_category,
            self.current,
            self.propagation,
        )?;
        self.selection = Some(AnnotationRef::Structure(id));
        self.commit();
        Some(id)
    }

    /// Explicit edit from a property panel: metadata lands on the root and
    /// shapes follow the ambient propagation range.
    pub fn update_annotation(&mut self, target: AnnotationRef, update: &AnnotationUpdate) -> bool {
        let scope = UpdateScope::Propagate(self.propagation);
        let changed = self
            .stack
            .update_annotation(target, update, self.current, scope);
        if changed {
            // Typing into the same text fields extends one history entry.
            let edit = TextEdit::of(target, update);
            if edit.is_some() && edit == self.text_edit {
                self.amend();
            } else {
                self.commit();
            }
            self.text_edit = edit;
        } else {
            log::debug!("update to {target:?} changed nothing");
        }
        changed
    }

    pub fn delete_annotation(&mut self, target: AnnotationRef, scope: DeleteScope) -> bool {
        let changed = self.stack.delete_annotation(target, scope, self.current);
        if changed {
            if !self.stack.contains(target) && self.selection == Some(target) {
                self.selection = None;
            }
            self.commit();
        }
        changed
    }

    pub fn delete_selection(&mut self, scope: DeleteScope) -> bool {
        match self.selection {
            Some(target) => self.delete_annotation(target, scope),
            None => false,
        }
    }

    pub fn select(&mut self, target: Option<AnnotationRef>) {
        self.selection = target.filter(|target| self.stack.contains(*target));
        if self.selection != self.text_edit.map(|edit| edit.target) {
            self.text_edit = None;
        }
    }

    /// Scope used for pointer drags.
    pub(crate) fn drag_scope(&self) -> UpdateScope {
        if self.propagate_drags {
            UpdateScope::Propagate(self.propagation)
        } else {
            UpdateScope::CurrentOnly
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.cancel_transient();
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_transient();
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, snapshot: &AnnotationSnapshot) {
        self.stack.restore(snapshot);
        if let Some(target) = self.selection {
            if !self.stack.contains(target) {
                self.selection = None;
            }
        }
        self.emit(StackPatch::annotations(&self.stack));
    }

    /// Records a history entry and tells the host about the new annotations.
    pub(crate) fn commit(&mut self) {
        self.text_edit = None;
        self.history.record(self.stack.snapshot());
        self.emit(StackPatch::annotations(&self.stack));
    }

    /// Folds the live state into the latest history entry.
    fn amend(&mut self) {
        self.history.replace_current(self.stack.snapshot());
        self.emit(StackPatch::annotations(&self.stack));
    }

    fn emit(&mut self, patch: StackPatch) {
        if patch.is_empty() {
            return;
        }
        if let Some(hook) = self.on_update.as_mut() {
            hook(&patch);
        }
    }

    /// Drops drafts and any uncommitted drag, rolling back live drag edits.
    pub fn cancel_transient(&mut self) {
        self.text_edit = None;
        let drag = std::mem::take(&mut self.drag);
        if let DragState::DraggingAnnotation { moved: true, .. } = drag {
            if let Some(committed) = self.history.current().cloned() {
                self.stack.restore(&committed);
            }
            log::debug!("drag abandoned");
        }
        self.pending_line = None;
        self.polygon_draft.clear();
    }

    // Visibility

    pub fn set_category_visible(&mut self, category: Category, visible: bool) {
        let changed = if visible {
            self.hidden.remove(&category)
        } else {
            self.hidden.insert(category)
        };
        if changed && !visible {
            if let Some(target) = self.selection {
                let hidden_now = self
                    .stack
                    .annotations_on(self.current)
                    .iter()
                    .any(|a| a.target == target && a.category == category);
                if hidden_now {
                    self.selection = None;
                }
            }
        }
    }

    pub fn is_category_visible(&self, category: Category) -> bool {
        !self.hidden.contains(&category)
    }

    /// Annotations on the current slice whose category is shown.
    pub fn visible_annotations(&self) -> Vec<SliceAnnotation<'_>> {
        self.stack
            .annotations_on(self.current)
            .into_iter()
            .filter(|annotation| !self.hidden.contains(&annotation.category))
            .collect()
    }
}

/// Which text fields a metadata-only edit touched, and on what.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TextEdit {
    target: AnnotationRef,
    fields: [bool; 4],
}

impl TextEdit {
    fn of(target: AnnotationRef, update: &AnnotationUpdate) -> Option<Self> {
        if update.is_spatial() || update.category.is_some() || !update.has_metadata() {
            return None;
        }
        Some(Self {
            target,
            fields: [
                update.label.is_some(),
                update.label_en.is_some(),
                update.description.is_some(),
                update.description_en.is_some(),
            ],
        })
    }
}
