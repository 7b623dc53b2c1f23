//! Pointer and wheel handling: the tool/drag state machine on top of
//! [`Viewer`].
//!
//! Handlers never fail. Events that arrive before the viewport is sized, or
//! that carry non-finite coordinates, are ignored so a live pointer stream
//! can't desynchronize the state machine.

use crate::geometry::{
    delete_polygon_vertex, distance_point_to_segment, insert_point_on_polygon, nearest_segment,
    nearest_vertex, polygon_contains, Point,
};
use crate::model::{AnnotationRef, AnnotationUpdate, Shape};
use crate::transform::Viewport;
use crate::viewer::Viewer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tool {
    #[default]
    Select,
    Pan,
    Point,
    Line,
    Polygon,
}

impl Tool {
    pub const ALL: [Tool; 5] = [Tool::Select, Tool::Pan, Tool::Point, Tool::Line, Tool::Polygon];

    pub fn label(self) -> &'static str {
        match self {
            Self::Select => "Select",
            Self::Pan => "Pan",
            Self::Point => "Point",
            Self::Line => "Line",
            Self::Polygon => "Polygon",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum DragState {
    #[default]
    None,
    /// `last` is in screen space.
    Panning { last: Point },
    /// `last` is in normalized space; `moved` is set once the stack changed.
    DraggingAnnotation {
        target: AnnotationRef,
        vertex: Option<usize>,
        last: Point,
        moved: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };

    /// Ctrl, or Cmd on macOS.
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }

    pub fn any(self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }
}

/// A button press, in container pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn primary(position: Point) -> Self {
        Self {
            position,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }
}

/// Scroll in notches; positive `delta_y` scrolls toward the next slice and
/// zooms out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelEvent {
    pub delta_y: f64,
    pub modifiers: Modifiers,
}

/// What sits under the pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub target: AnnotationRef,
    /// Set when the pointer is on a vertex handle.
    pub vertex: Option<usize>,
    /// Polygon edge (index of its first vertex) under the pointer.
    pub edge: Option<usize>,
}

impl Viewer {
    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool == tool {
            return;
        }
        self.cancel_transient();
        self.tool = tool;
    }

    /// Finds the annotation under a screen point on the current slice.
    ///
    /// Vertex handles win over bodies, and later-drawn annotations win over
    /// earlier ones. Hidden categories are never hit.
    pub fn hit_test(&self, screen: Point) -> Option<Hit> {
        let viewport = self.viewport()?;
        if !screen.is_finite() {
            return None;
        }
        let tolerance = self.config.hit_tolerance_px;
        let annotations = self.visible_annotations();

        let projected: Vec<(AnnotationRef, &Shape, Vec<Point>)> = annotations
            .iter()
            .rev()
            .map(|annotation| {
                let on_screen = annotation
                    .shape
                    .vertices()
                    .into_iter()
                    .map(|vertex| viewport.normalized_to_screen(vertex))
                    .collect();
                (annotation.target, annotation.shape, on_screen)
            })
            .collect();

        for (target, _, vertices) in &projected {
            if let Some((index, distance)) = nearest_vertex(screen, vertices) {
                if distance <= tolerance {
                    return Some(Hit {
                        target: *target,
                        vertex: Some(index),
                        edge: None,
                    });
                }
            }
        }

        projected.iter().find_map(|(target, shape, vertices)| {
            body_hit(shape, vertices, screen, tolerance).map(|edge| Hit {
                target: *target,
                vertex: None,
                edge,
            })
        })
    }

    pub fn pointer_down(&mut self, event: PointerEvent) {
        if !event.position.is_finite() {
            return;
        }
        if self.tool == Tool::Pan || event.button != PointerButton::Primary {
            self.drag = DragState::Panning {
                last: event.position,
            };
            return;
        }
        let Some(viewport) = self.viewport() else {
            return;
        };
        let Some(normalized) = viewport.screen_to_normalized(event.position) else {
            return;
        };
        self.cursor = Some(normalized);

        if event.modifiers.command() && self.edit_polygon_at(&viewport, event.position) {
            return;
        }

        match self.tool {
            Tool::Select => self.begin_drag(event.position, normalized),
            Tool::Point => {
                if !inside_image(normalized) {
                    return;
                }
                let at = self.snap(normalized).clamp_unit();
                if self.create_structure(Shape::point(at)).is_some() {
                    self.tool = Tool::Select;
                }
            }
            Tool::Line => {
                if !inside_image(normalized) {
                    return;
                }
                let at = self.snap(normalized).clamp_unit();
                match self.pending_line.take() {
                    None => self.pending_line = Some(at),
                    Some(start) => {
                        if self.create_structure(Shape::line(start, at)).is_some() {
                            self.tool = Tool::Select;
                        }
                    }
                }
            }
            Tool::Polygon => {
                if !inside_image(normalized) {
                    return;
                }
                let at = self.snap(normalized).clamp_unit();
                self.add_polygon_point(at);
            }
            Tool::Pan => {}
        }
    }

    pub fn pointer_move(&mut self, position: Point) {
        if !position.is_finite() {
            return;
        }
        self.cursor = self
            .viewport()
            .and_then(|viewport| viewport.screen_to_normalized(position));

        match self.drag.clone() {
            DragState::None => {}
            DragState::Panning { last } => {
                self.pan_by(position.x - last.x, position.y - last.y);
                self.drag = DragState::Panning { last: position };
            }
            DragState::DraggingAnnotation {
                target,
                vertex,
                last,
                moved,
            } => {
                let Some(now) = self.cursor else {
                    return;
                };
                let Some(shape) = self.stack.shape_at(target, self.current).cloned() else {
                    self.drag = DragState::None;
                    return;
                };
                // A body drag only advances its anchor by the delta that fit
                // inside the image, so the grab point stays under the cursor.
                let (next, anchor) = match vertex {
                    Some(index) => (shape.with_vertex(index, self.snap(now).clamp_unit()), now),
                    None => {
                        let (translated, applied) = translate_within_image(&shape, now - last);
                        (Some(translated), last + applied)
                    }
                };
                let changed = match next {
                    Some(next) => {
                        let scope = self.drag_scope();
                        self.stack.update_annotation(
                            target,
                            &AnnotationUpdate::shape(next),
                            self.current,
                            scope,
                        )
                    }
                    None => false,
                };
                log::trace!("drag {target:?} to ({:.4}, {:.4})", now.x, now.y);
                self.drag = DragState::DraggingAnnotation {
                    target,
                    vertex,
                    last: anchor,
                    moved: moved || changed,
                };
            }
        }
    }

    /// Ends a pan or drag. A drag that changed anything is committed once.
    pub fn pointer_up(&mut self) {
        if let DragState::DraggingAnnotation {
            target,
            moved: true,
            ..
        } = std::mem::take(&mut self.drag)
        {
            log::debug!("drag of {target:?} committed");
            self.commit();
        }
    }

    /// Modified wheel zooms; a plain wheel steps one slice.
    pub fn wheel(&mut self, event: WheelEvent) {
        if !event.delta_y.is_finite() || event.delta_y == 0.0 {
            return;
        }
        if event.modifiers.any() {
            let factor = self.config.wheel_zoom_step.powf(-event.delta_y);
            self.zoom_by(factor);
        } else if event.delta_y > 0.0 {
            self.step_slice(1);
        } else {
            self.step_slice(-1);
        }
    }

    /// Closes the polygon under construction if it has enough points.
    pub fn finish_polygon(&mut self) -> bool {
        if self.polygon_draft.len() < 3 {
            return false;
        }
        let points = std::mem::take(&mut self.polygon_draft);
        self.create_structure(Shape::polygon(points)).is_some()
    }

    fn add_polygon_point(&mut self, point: Point) {
        let closes = self.polygon_draft.len() >= 3
            && self
                .polygon_draft
                .first()
                .is_some_and(|first| first.distance(point) < self.config.polygon_close_threshold);
        if closes {
            self.finish_polygon();
        } else {
            self.polygon_draft.push(point);
        }
    }

    fn begin_drag(&mut self, screen: Point, normalized: Point) {
        match self.hit_test(screen) {
            Some(hit) => {
                self.selection = Some(hit.target);
                self.drag = DragState::DraggingAnnotation {
                    target: hit.target,
                    vertex: hit.vertex,
                    last: normalized,
                    moved: false,
                };
            }
            None => self.selection = None,
        }
    }

    /// Ctrl-click editing: a vertex is removed, an edge gains a vertex.
    /// Returns whether the click landed on a polygon.
    fn edit_polygon_at(&mut self, viewport: &Viewport, screen: Point) -> bool {
        let Some(hit) = self.hit_test(screen) else {
            return false;
        };
        let Some(points) = self
            .stack
            .shape_at(hit.target, self.current)
            .and_then(Shape::polygon_points)
            .map(<[Point]>::to_vec)
        else {
            return false;
        };

        let edited = match (hit.vertex, hit.edge) {
            (Some(index), _) => delete_polygon_vertex(&points, index),
            // Edges are measured in image pixels so non-square images pick
            // the same edge the hit test did.
            (None, Some(_)) => {
                let natural = viewport.natural;
                let to_pixels = |p: Point| Point::new(p.x * natural.width, p.y * natural.height);
                let to_unit = |p: Point| Point::new(p.x / natural.width, p.y / natural.height);
                let in_pixels: Vec<Point> = points.iter().copied().map(to_pixels).collect();
                let click = viewport.screen_to_image(screen);
                insert_point_on_polygon(&in_pixels, click, |projection| {
                    to_pixels(self.snap(to_unit(projection)).clamp_unit())
                })
                .and_then(|(at, placed)| {
                    let mut edited = points.clone();
                    edited.insert(at, to_unit(*placed.get(at)?));
                    Some(edited)
                })
            }
            (None, None) => None,
        };
        let Some(edited) = edited else {
            return false;
        };

        let scope = self.drag_scope();
        let changed = self.stack.update_annotation(
            hit.target,
            &AnnotationUpdate::shape(Shape::polygon(edited)),
            self.current,
            scope,
        );
        self.selection = Some(hit.target);
        if changed {
            self.commit();
        }
        true
    }
}

fn inside_image(point: Point) -> bool {
    (0.0..=1.0).contains(&point.x) && (0.0..=1.0).contains(&point.y)
}

/// Body hit for a shape already projected to screen. `Some(edge)` carries
/// the polygon edge under the pointer, if any.
fn body_hit(shape: &Shape, vertices: &[Point], screen: Point, tolerance: f64) -> Option<Option<usize>> {
    match shape {
        Shape::Point(_) => None,
        Shape::Line(_) => {
            let [a, b] = vertices else {
                return None;
            };
            (distance_point_to_segment(screen, *a, *b).distance <= tolerance).then_some(None)
        }
        Shape::Polygon(_) => {
            if let Some(edge) = nearest_segment(screen, vertices) {
                if edge.distance <= tolerance {
                    return Some(Some(edge.index));
                }
            }
            polygon_contains(vertices, screen).then_some(None)
        }
    }
}

/// Moves a whole shape, stopping at the image border instead of deforming.
/// Returns the moved shape and the part of `delta` that was applied.
fn translate_within_image(shape: &Shape, delta: Point) -> (Shape, Point) {
    let vertices = shape.vertices();
    let (mut min, mut max) = (Point::new(1.0, 1.0), Point::new(0.0, 0.0));
    for vertex in &vertices {
        min = Point::new(min.x.min(vertex.x), min.y.min(vertex.y));
        max = Point::new(max.x.max(vertex.x), max.y.max(vertex.y));
    }
    if vertices.is_empty() {
        return (shape.clone(), Point::new(0.0, 0.0));
    }
    let clamp = |value: f64, low: f64, high: f64| {
        if low > high {
            0.0
        } else {
            value.clamp(low, high)
        }
    };
    let delta = Point::new(
        clamp(delta.x, -min.x, 1.0 - max.x),
        clamp(delta.y, -min.y, 1.0 - max.y),
    );
    (shape.translated(delta), delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::geometry::Size;
    use crate::model::{PropagationRange, Stack, StructureKind};
    use crate::raster::Raster;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    /// 100x100 image in a 100x100 container: screen pixels equal image
    /// pixels, and normalized = screen / 100.
    fn viewer(len: usize) -> Viewer {
        let mut viewer = Viewer::new(
            Stack::new((0..len).map(|i| format!("slice-{i}"))),
            ViewerConfig::default(),
        );
        viewer.set_container_size(Size::new(100.0, 100.0));
        for index in 0..len {
            let raster = Raster::from_gray(100, 100, &[0; 100 * 100]).expect("raster");
            viewer.set_raster_ready(index, Arc::new(raster));
        }
        viewer
    }

    fn click(viewer: &mut Viewer, x: f64, y: f64) {
        viewer.pointer_down(PointerEvent::primary(Point::new(x, y)));
        viewer.pointer_up();
    }

    #[test]
    fn point_tool_creates_and_returns_to_select() {
        let mut viewer = viewer(1);
        viewer.set_tool(Tool::Point);
        click(&mut viewer, 25.0, 75.0);

        assert_eq!(viewer.tool(), Tool::Select);
        let structure = &viewer.stack().structures()[0];
        assert_eq!(structure.kind(), StructureKind::Point);
        let at = structure.locations.values().next().expect("location");
        assert!(at.vertices()[0].distance(Point::new(0.25, 0.75)) < 1e-9);
    }

    #[test]
    fn line_tool_needs_two_clicks() {
        let mut viewer = viewer(1);
        viewer.set_tool(Tool::Line);
        click(&mut viewer, 10.0, 10.0);
        assert!(viewer.stack().structures().is_empty());
        assert!(viewer.pending_line().is_some());

        click(&mut viewer, 90.0, 10.0);
        assert_eq!(viewer.stack().structures().len(), 1);
        assert_eq!(viewer.pending_line(), None);
    }

    #[test]
    fn polygon_closes_near_first_point() {
        let mut viewer = viewer(1);
        viewer.set_tool(Tool::Polygon);
        click(&mut viewer, 10.0, 10.0);
        click(&mut viewer, 11.0, 10.0);
        assert_eq!(viewer.polygon_draft().len(), 2, "too few points to close");

        click(&mut viewer, 50.0, 50.0);
        click(&mut viewer, 10.0, 50.0);
        click(&mut viewer, 11.0, 11.0);

        assert!(viewer.polygon_draft().is_empty());
        let structure = &viewer.stack().structures()[0];
        let shape = structure.locations.values().next().expect("location");
        assert_eq!(shape.polygon_points().map(<[Point]>::len), Some(4));
    }

    #[test]
    fn switching_tools_discards_drafts() {
        let mut viewer = viewer(2);
        viewer.set_tool(Tool::Polygon);
        click(&mut viewer, 10.0, 10.0);
        viewer.set_tool(Tool::Line);
        assert!(viewer.polygon_draft().is_empty());

        click(&mut viewer, 10.0, 10.0);
        viewer.set_current_slice(1);
        assert_eq!(viewer.pending_line(), None);
        assert!(viewer.stack().structures().is_empty());
    }

    #[test]
    fn dragging_a_vertex_touches_only_the_current_slice() {
        let mut viewer = viewer(5);
        viewer.set_propagation(PropagationRange::All);
        let id = viewer
            .create_structure(Shape::point(Point::new(0.5, 0.5)))
            .expect("created");
        viewer.set_current_slice(2);

        viewer.pointer_down(PointerEvent::primary(Point::new(50.0, 50.0)));
        assert_matches!(
            viewer.drag_state(),
            DragState::DraggingAnnotation { vertex: Some(0), .. }
        );
        viewer.pointer_move(Point::new(70.0, 40.0));
        viewer.pointer_up();

        let target = AnnotationRef::Structure(id);
        let moved = viewer.stack().shape_at(target, 2).expect("shape");
        assert!(moved.vertices()[0].distance(Point::new(0.7, 0.4)) < 1e-9);
        for index in [0, 1, 3, 4] {
            assert_eq!(
                viewer.stack().shape_at(target, index),
                Some(&Shape::point(Point::new(0.5, 0.5)))
            );
        }
        assert_eq!(viewer.drag_state(), &DragState::None);
    }

    #[test]
    fn body_drag_translates_and_stops_at_the_border() {
        let mut viewer = viewer(1);
        let id = viewer
            .create_structure(Shape::line(Point::new(0.2, 0.5), Point::new(0.6, 0.5)))
            .expect("created");
        viewer.pointer_down(PointerEvent::primary(Point::new(40.0, 50.0)));
        assert_matches!(viewer.drag_state(), DragState::DraggingAnnotation { vertex: None, .. });
        viewer.pointer_move(Point::new(90.0, 50.0));
        viewer.pointer_up();

        let shape = viewer
            .stack()
            .shape_at(AnnotationRef::Structure(id), 0)
            .expect("shape");
        let vertices = shape.vertices();
        assert!(vertices[0].distance(Point::new(0.6, 0.5)) < 1e-9);
        assert!(vertices[1].distance(Point::new(1.0, 0.5)) < 1e-9);
    }

    #[test]
    fn body_drag_keeps_the_grab_point_after_hitting_the_border() {
        let mut viewer = viewer(1);
        let id = viewer
            .create_structure(Shape::line(Point::new(0.2, 0.5), Point::new(0.6, 0.5)))
            .expect("created");
        viewer.pointer_down(PointerEvent::primary(Point::new(40.0, 50.0)));
        viewer.pointer_move(Point::new(90.0, 50.0));
        viewer.pointer_move(Point::new(40.0, 50.0));
        viewer.pointer_up();

        let shape = viewer
            .stack()
            .shape_at(AnnotationRef::Structure(id), 0)
            .expect("shape");
        let vertices = shape.vertices();
        assert!(vertices[0].distance(Point::new(0.2, 0.5)) < 1e-9);
        assert!(vertices[1].distance(Point::new(0.6, 0.5)) < 1e-9);
    }

    #[test]
    fn abandoned_drag_is_rolled_back() {
        let mut viewer = viewer(2);
        let id = viewer
            .create_structure(Shape::point(Point::new(0.5, 0.5)))
            .expect("created");
        viewer.pointer_down(PointerEvent::primary(Point::new(50.0, 50.0)));
        viewer.pointer_move(Point::new(20.0, 20.0));
        viewer.set_tool(Tool::Pan);

        assert_eq!(
            viewer.stack().shape_at(AnnotationRef::Structure(id), 0),
            Some(&Shape::point(Point::new(0.5, 0.5)))
        );
    }

    #[test]
    fn ctrl_click_inserts_then_deletes_a_vertex() {
        let mut viewer = viewer(1);
        let square = vec![
            Point::new(0.2, 0.2),
            Point::new(0.8, 0.2),
            Point::new(0.8, 0.8),
            Point::new(0.2, 0.8),
        ];
        let id = viewer
            .create_structure(Shape::polygon(square.clone()))
            .expect("created");
        let target = AnnotationRef::Structure(id);
        let ctrl = |x, y| PointerEvent {
            position: Point::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::CTRL,
        };

        viewer.pointer_down(ctrl(50.0, 21.0));
        viewer.pointer_up();
        let points = viewer
            .stack()
            .shape_at(target, 0)
            .and_then(Shape::polygon_points)
            .expect("polygon")
            .to_vec();
        assert_eq!(points.len(), 5);
        assert!(points[1].distance(Point::new(0.5, 0.2)) < 1e-9);

        viewer.pointer_down(ctrl(50.0, 20.0));
        viewer.pointer_up();
        assert_eq!(
            viewer.stack().shape_at(target, 0).and_then(Shape::polygon_points),
            Some(square.as_slice())
        );
    }

    #[test]
    fn ctrl_click_inserts_on_the_nearest_edge_of_a_wide_image() {
        let mut viewer = Viewer::new(Stack::new(["wide"]), ViewerConfig::default());
        viewer.set_container_size(Size::new(400.0, 100.0));
        let raster = Raster::from_gray(400, 100, &[0; 400 * 100]).expect("raster");
        viewer.set_raster_ready(0, Arc::new(raster));
        let id = viewer
            .create_structure(Shape::polygon(vec![
                Point::new(0.25, 0.2),
                Point::new(0.75, 0.2),
                Point::new(0.75, 0.8),
                Point::new(0.25, 0.8),
            ]))
            .expect("created");
        let target = AnnotationRef::Structure(id);

        // 3px below the top edge, 8px left of the right edge.
        let click = Point::new(292.0, 23.0);
        assert_matches!(viewer.hit_test(click), Some(Hit { edge: Some(0), .. }));
        viewer.pointer_down(PointerEvent {
            position: click,
            button: PointerButton::Primary,
            modifiers: Modifiers::CTRL,
        });
        viewer.pointer_up();

        let points = viewer
            .stack()
            .shape_at(target, 0)
            .and_then(Shape::polygon_points)
            .expect("polygon")
            .to_vec();
        let expected = [
            Point::new(0.25, 0.2),
            Point::new(0.73, 0.2),
            Point::new(0.75, 0.2),
            Point::new(0.75, 0.8),
            Point::new(0.25, 0.8),
        ];
        assert_eq!(points.len(), expected.len());
        for (point, expected) in points.iter().zip(expected) {
            assert!(point.distance(expected) < 1e-9, "{point:?} != {expected:?}");
        }
    }

    #[test]
    fn other_buttons_pan() {
        let mut viewer = viewer(1);
        viewer.set_tool(Tool::Point);
        viewer.pointer_down(PointerEvent {
            position: Point::new(50.0, 50.0),
            button: PointerButton::Middle,
            modifiers: Modifiers::NONE,
        });
        viewer.pointer_move(Point::new(60.0, 50.0));
        viewer.pointer_up();

        assert!(viewer.stack().structures().is_empty());
        let center = viewer.camera().center.expect("panned");
        assert!(center.distance(Point::new(40.0, 50.0)) < 1e-9);
    }

    #[test]
    fn wheel_steps_slices_or_zooms() {
        let mut viewer = viewer(3);
        let plain = |delta_y| WheelEvent {
            delta_y,
            modifiers: Modifiers::NONE,
        };
        viewer.wheel(plain(1.0));
        viewer.wheel(plain(1.0));
        viewer.wheel(plain(1.0));
        assert_eq!(viewer.current_slice(), 2);
        viewer.wheel(plain(-1.0));
        assert_eq!(viewer.current_slice(), 1);

        for _ in 0..200 {
            viewer.wheel(WheelEvent {
                delta_y: -1.0,
                modifiers: Modifiers::CTRL,
            });
        }
        assert_eq!(viewer.camera().scale, viewer.config().max_scale);
        assert_eq!(viewer.current_slice(), 1);
    }

    #[test]
    fn events_before_sizing_are_ignored() {
        let mut viewer = Viewer::new(Stack::new(["a"]), ViewerConfig::default());
        viewer.set_tool(Tool::Point);
        viewer.pointer_down(PointerEvent::primary(Point::new(10.0, 10.0)));
        viewer.pointer_move(Point::new(f64::NAN, 3.0));
        viewer.pointer_up();
        assert!(viewer.stack().structures().is_empty());
        assert_eq!(viewer.hit_test(Point::new(10.0, 10.0)), None);
    }
}
