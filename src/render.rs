//! Screen-space draw list for one frame.
//!
//! The scene is plain data so any 2D canvas can draw it: the host walks
//! `items` in order and paints each primitive in its category colour.

use crate::geometry::{Point, Size};
use crate::interaction::Tool;
use crate::model::{AnnotationRef, Category, Shape};
use crate::transform::Viewport;
use crate::viewer::Viewer;

/// Radius of a point marker, in screen pixels.
pub const MARKER_RADIUS: f64 = 5.0;

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Marker { center: Point, radius: f64 },
    Segment { from: Point, to: Point },
    /// Closed when it describes a finished polygon.
    Path { points: Vec<Point>, closed: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneItem {
    /// `None` for the drawing in progress.
    pub target: Option<AnnotationRef>,
    pub category: Category,
    pub label: String,
    pub selected: bool,
    pub primitive: Primitive,
    /// Vertex handles, only populated for the selection and drafts.
    pub handles: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Screen rectangle the image texture covers, as `(min, max)`.
    pub image_bounds: (Point, Point),
    pub items: Vec<SceneItem>,
}

/// Projects the current slice's visible annotations, then the draft under
/// construction, into screen space. `None` while the viewport is unsized.
pub fn build_scene(viewer: &Viewer) -> Option<Scene> {
    build_scene_in(viewer, viewer.container_size()?)
}

/// [`build_scene`] for an explicit container size.
pub fn build_scene_in(viewer: &Viewer, container: Size) -> Option<Scene> {
    let viewport = viewer.viewport_in(container)?;
    let selection = viewer.selection();

    let mut items: Vec<SceneItem> = viewer
        .visible_annotations()
        .into_iter()
        .map(|annotation| {
            let selected = selection == Some(annotation.target);
            let (primitive, vertices) = project(annotation.shape, &viewport);
            SceneItem {
                target: Some(annotation.target),
                category: annotation.category,
                label: annotation.text.label.clone(),
                selected,
                primitive,
                handles: if selected { vertices } else { Vec::new() },
            }
        })
        .collect();

    if let Some(draft) = draft_item(viewer, &viewport) {
        items.push(draft);
    }

    Some(Scene {
        image_bounds: viewport.image_bounds_on_screen(),
        items,
    })
}

fn project(shape: &Shape, viewport: &Viewport) -> (Primitive, Vec<Point>) {
    let vertices: Vec<Point> = shape
        .vertices()
        .into_iter()
        .map(|vertex| viewport.normalized_to_screen(vertex))
        .collect();
    let primitive = match shape {
        Shape::Point(_) => Primitive::Marker {
            center: vertices[0],
            radius: MARKER_RADIUS,
        },
        Shape::Line(_) => Primitive::Segment {
            from: vertices[0],
            to: vertices[1],
        },
        Shape::Polygon(_) => Primitive::Path {
            points: vertices.clone(),
            closed: true,
        },
    };
    (primitive, vertices)
}

/// The pending line start or open polygon, trailing to the cursor.
fn draft_item(viewer: &Viewer, viewport: &Viewport) -> Option<SceneItem> {
    let mut points: Vec<Point> = match viewer.tool() {
        Tool::Line => vec![viewer.pending_line()?],
        Tool::Polygon if !viewer.polygon_draft().is_empty() => viewer.polygon_draft().to_vec(),
        _ => return None,
    };
    let handles: Vec<Point> = points
        .iter()
        .map(|point| viewport.normalized_to_screen(*point))
        .collect();
    if let Some(cursor) = viewer.cursor() {
        points.push(cursor);
    }
    let points: Vec<Point> = points
        .into_iter()
        .map(|point| viewport.normalized_to_screen(point))
        .collect();

    Some(SceneItem {
        target: None,
        category: viewer.draw_category(),
        label: String::new(),
        selected: true,
        primitive: Primitive::Path {
            points,
            closed: false,
        },
        handles,
    })
}
