use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    Point,
    Line,
    Polygon,
}

impl StructureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        }
    }
}

/// Grouping tag that drives colour and visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bone,
    Muscle,
    Vessel,
    Nerve,
    Organ,
    Lesion,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Bone,
        Category::Muscle,
        Category::Vessel,
        Category::Nerve,
        Category::Organ,
        Category::Lesion,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Bone => "Bone",
            Self::Muscle => "Muscle",
            Self::Vessel => "Vessel",
            Self::Nerve => "Nerve",
            Self::Organ => "Organ",
            Self::Lesion => "Lesion",
            Self::Other => "Other",
        }
    }

    /// Display colour as RGB.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::Bone => [240, 230, 200],
            Self::Muscle => [229, 62, 62],
            Self::Vessel => [66, 133, 244],
            Self::Nerve => [250, 204, 21],
            Self::Organ => [52, 199, 89],
            Self::Lesion => [255, 120, 0],
            Self::Other => [190, 120, 255],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineShape {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl LineShape {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start_x: start.x,
            start_y: start.y,
            end_x: end.x,
            end_y: end.y,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.end_x, self.end_y)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    pub points: Vec<Point>,
}

/// One slice's payload, in normalized coordinates.
///
/// Serialized without a tag: the field names tell the variants apart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Shape {
    Line(LineShape),
    Polygon(PolygonShape),
    Point(Point),
}

impl Shape {
    pub fn point(at: Point) -> Self {
        Self::Point(at)
    }

    pub fn line(start: Point, end: Point) -> Self {
        Self::Line(LineShape::new(start, end))
    }

    pub fn polygon(points: Vec<Point>) -> Self {
        Self::Polygon(PolygonShape { points })
    }

    pub fn kind(&self) -> StructureKind {
        match self {
            Self::Point(_) => StructureKind::Point,
            Self::Line(_) => StructureKind::Line,
            Self::Polygon(_) => StructureKind::Polygon,
        }
    }

    pub fn vertices(&self) -> Vec<Point> {
        match self {
            Self::Point(point) => vec![*point],
            Self::Line(line) => vec![line.start(), line.end()],
            Self::Polygon(polygon) => polygon.points.clone(),
        }
    }

    pub fn polygon_points(&self) -> Option<&[Point]> {
        match self {
            Self::Polygon(polygon) => Some(&polygon.points),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.vertices().iter().all(|vertex| vertex.is_finite())
    }

    /// Copy with vertex `index` moved; `None` for an index the shape lacks.
    pub fn with_vertex(&self, index: usize, to: Point) -> Option<Self> {
        match self {
            Self::Point(_) if index == 0 => Some(Self::Point(to)),
            Self::Line(line) if index == 0 => Some(Self::line(to, line.end())),
            Self::Line(line) if index == 1 => Some(Self::line(line.start(), to)),
            Self::Polygon(polygon) if index < polygon.points.len() => {
                let mut points = polygon.points.clone();
                points[index] = to;
                Some(Self::polygon(points))
            }
            _ => None,
        }
    }

    pub fn translated(&self, delta: Point) -> Self {
        self.map_vertices(|vertex| vertex + delta)
    }

    fn map_vertices(&self, f: impl Fn(Point) -> Point) -> Self {
        match self {
            Self::Point(point) => Self::Point(f(*point)),
            Self::Line(line) => Self::line(f(line.start()), f(line.end())),
            Self::Polygon(polygon) => Self::polygon(polygon.points.iter().copied().map(f).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_deserialize_by_field_names() {
        let point: Shape = serde_json::from_str(r#"{"x":0.25,"y":0.5}"#).expect("point");
        assert_eq!(point, Shape::point(Point::new(0.25, 0.5)));

        let line: Shape =
            serde_json::from_str(r#"{"startX":0.1,"startY":0.2,"endX":0.3,"endY":0.4}"#)
                .expect("line");
        assert_eq!(line.kind(), StructureKind::Line);

        let polygon: Shape =
            serde_json::from_str(r#"{"points":[{"x":0.1,"y":0.1},{"x":0.2,"y":0.3}]}"#)
                .expect("polygon");
        assert_eq!(polygon.vertices().len(), 2);
    }

    #[test]
    fn line_serializes_with_camel_case_endpoints() {
        let json = serde_json::to_value(Shape::line(Point::new(0.0, 0.5), Point::new(1.0, 0.5)))
            .expect("serialize");
        assert_eq!(json["startY"], 0.5);
        assert_eq!(json["endX"], 1.0);
    }

    #[test]
    fn unknown_category_falls_back_to_other() {
        let category: Category = serde_json::from_str(r#""ligament""#).expect("category");
        assert_eq!(category, Category::Other);
    }

    #[test]
    fn vertex_edits_respect_shape_arity() {
        let line = Shape::line(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        assert_eq!(
            line.with_vertex(1, Point::new(0.5, 0.5)),
            Some(Shape::line(Point::new(0.0, 0.0), Point::new(0.5, 0.5)))
        );
        assert_eq!(line.with_vertex(2, Point::new(0.5, 0.5)), None);
        assert_eq!(Shape::point(Point::new(0.1, 0.1)).with_vertex(1, Point::default()), None);
    }

    #[test]
    fn translation_moves_every_vertex() {
        let polygon = Shape::polygon(vec![Point::new(0.5, 0.25), Point::new(0.75, 0.5)]);
        let moved = polygon.translated(Point::new(0.25, -0.25));
        assert_eq!(
            moved.vertices(),
            vec![Point::new(0.75, 0.0), Point::new(1.0, 0.25)]
        );
    }
}
