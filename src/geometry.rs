use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Clamps both coordinates into the normalized unit square.
    pub fn clamp_unit(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A size that can anchor a transform: finite and strictly positive.
    pub fn is_usable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn aspect(self) -> f64 {
        self.width / self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentProjection {
    pub distance: f64,
    /// Position of the projection along the segment, in `[0, 1]`.
    pub t: f64,
    pub projection: Point,
}

/// Projects `p` onto the segment `a`-`b`, clamping to the endpoints.
///
/// A zero-length segment projects everything onto `a`.
pub fn distance_point_to_segment(p: Point, a: Point, b: Point) -> SegmentProjection {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return SegmentProjection {
            distance: ap.length(),
            t: 0.0,
            projection: a,
        };
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    let projection = a + ab * t;
    SegmentProjection {
        distance: p.distance(projection),
        t,
        projection,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestSegment {
    /// Index of the segment's first vertex; the segment ends at `index + 1`
    /// or wraps to vertex 0.
    pub index: usize,
    pub projection: Point,
    pub distance: f64,
}

/// Closest edge of an implicitly closed polygon. Ties go to the lowest index.
pub fn nearest_segment(point: Point, polygon: &[Point]) -> Option<NearestSegment> {
    if polygon.len() < 2 || !point.is_finite() {
        return None;
    }

    let mut best: Option<NearestSegment> = None;
    for (index, &a) in polygon.iter().enumerate() {
        let b = polygon[(index + 1) % polygon.len()];
        let hit = distance_point_to_segment(point, a, b);
        if !hit.distance.is_finite() {
            continue;
        }
        if best.map_or(true, |current| hit.distance < current.distance) {
            best = Some(NearestSegment {
                index,
                projection: hit.projection,
                distance: hit.distance,
            });
        }
    }
    best
}

pub fn nearest_vertex(point: Point, vertices: &[Point]) -> Option<(usize, f64)> {
    if !point.is_finite() {
        return None;
    }
    vertices
        .iter()
        .enumerate()
        .map(|(index, vertex)| (index, point.distance(*vertex)))
        .filter(|(_, distance)| distance.is_finite())
        .fold(None, |best, candidate| match best {
            Some((_, best_distance)) if best_distance <= candidate.1 => best,
            _ => Some(candidate),
        })
}

/// Inserts a vertex on the edge nearest to `click`.
///
/// The projected point passes through `snap` before insertion. Returns the
/// index of the new vertex and the edited polygon, or `None` when the
/// polygon has no edge to insert on.
pub fn insert_point_on_polygon<F>(
    points: &[Point],
    click: Point,
    snap: F,
) -> Option<(usize, Vec<Point>)>
where
    F: FnOnce(Point) -> Point,
{
    let segment = nearest_segment(click, points)?;
    let inserted = snap(segment.projection);
    let inserted = if inserted.is_finite() {
        inserted
    } else {
        segment.projection
    };
    let at = segment.index + 1;
    let mut edited = points.to_vec();
    edited.insert(at, inserted);
    Some((at, edited))
}

/// Removes one vertex. Out-of-range indices leave the polygon untouched.
pub fn delete_polygon_vertex(points: &[Point], index: usize) -> Option<Vec<Point>> {
    if index >= points.len() {
        return None;
    }
    let mut edited = points.to_vec();
    edited.remove(index);
    Some(edited)
}

/// Even-odd containment test.
pub fn polygon_contains(polygon: &[Point], point: Point) -> bool {
    if polygon.len() < 3 || !point.is_finite() {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let cross_x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.2, 0.2),
            Point::new(0.8, 0.2),
            Point::new(0.8, 0.8),
            Point::new(0.2, 0.8),
        ]
    }

    #[test]
    fn projection_clamps_to_endpoints() {
        let hit = distance_point_to_segment(
            Point::new(-1.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert_eq!(hit.t, 0.0);
        assert_eq!(hit.projection, Point::new(0.0, 0.0));
        assert!((hit.distance - 2f64.sqrt()).abs() < 1e-12);

        let mid = distance_point_to_segment(
            Point::new(1.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert_eq!(mid.t, 0.5);
        assert_eq!(mid.distance, 3.0);
    }

    #[test]
    fn zero_length_segment_does_not_divide() {
        let a = Point::new(0.5, 0.5);
        let hit = distance_point_to_segment(Point::new(0.5, 0.9), a, a);
        assert_eq!(hit.projection, a);
        assert!((hit.distance - 0.4).abs() < 1e-12);
    }

    #[test]
    fn nearest_segment_wraps_closing_edge() {
        let hit = nearest_segment(Point::new(0.1, 0.5), &square()).expect("segment");
        assert_eq!(hit.index, 3);
        assert!((hit.projection.x - 0.2).abs() < 1e-12);
        assert!((hit.projection.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nearest_segment_ties_pick_lowest_index() {
        let polygon = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        // Equidistant from the top edge (0) and the right edge (1).
        let hit = nearest_segment(Point::new(3.0, -1.0), &polygon).expect("segment");
        assert_eq!(hit.index, 0);
    }

    #[test]
    fn nearest_segment_rejects_nan() {
        assert!(nearest_segment(Point::new(f64::NAN, 0.0), &square()).is_none());
    }

    #[test]
    fn insert_then_delete_restores_polygon() {
        let original = square();
        let (index, edited) =
            insert_point_on_polygon(&original, Point::new(0.5, 0.1), |p| p).expect("insert");
        assert_eq!(index, 1);
        assert_eq!(edited.len(), 5);
        assert!(edited[1].distance(Point::new(0.5, 0.2)) < 1e-12);

        let restored = delete_polygon_vertex(&edited, index).expect("delete");
        assert_eq!(restored, original);
    }

    #[test]
    fn insert_uses_snapped_point() {
        let (_, edited) =
            insert_point_on_polygon(&square(), Point::new(0.5, 0.1), |_| Point::new(0.5, 0.25))
                .expect("insert");
        assert_eq!(edited[1], Point::new(0.5, 0.25));
    }

    #[test]
    fn delete_allows_degenerate_results_and_ignores_bad_index() {
        let single = vec![Point::new(0.1, 0.1)];
        assert_eq!(delete_polygon_vertex(&single, 0), Some(Vec::new()));
        assert_eq!(delete_polygon_vertex(&single, 3), None);
    }

    #[test]
    fn containment_and_nearest_vertex() {
        assert!(polygon_contains(&square(), Point::new(0.5, 0.5)));
        assert!(!polygon_contains(&square(), Point::new(0.9, 0.5)));
        assert_eq!(
            nearest_vertex(Point::new(0.79, 0.81), &square()).map(|(index, _)| index),
            Some(2)
        );
    }
}
