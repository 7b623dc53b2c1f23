//! Coordinate spaces of the viewport.
//!
//! * normalized: `(0, 0)`..`(1, 1)` across a slice's natural size
//! * image: natural pixels, origin top-left
//! * presented: image space after the stack's flip and rotation about the
//!   image center; the view box lives here
//! * screen: container pixels
//!
//! Presentation applies the horizontal flip first and the rotation second,
//! so the inverse undoes rotation before flip.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Size};

/// Quarter-turn rotation, clockwise on a y-down screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes modulo 360 and rounds to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn clockwise(self) -> Self {
        Self::from_degrees(self.degrees() + 90)
    }

    pub fn counter_clockwise(self) -> Self {
        Self::from_degrees(self.degrees() - 90)
    }

    pub fn inverse(self) -> Self {
        Self::from_degrees(-self.degrees())
    }

    /// True when the rotation swaps width and height.
    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    fn sin_cos(self) -> (f64, f64) {
        match self {
            Self::Deg0 => (0.0, 1.0),
            Self::Deg90 => (1.0, 0.0),
            Self::Deg180 => (0.0, -1.0),
            Self::Deg270 => (-1.0, 0.0),
        }
    }

    pub fn rotate(self, v: Point) -> Point {
        let (sin, cos) = self.sin_cos();
        Point::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
    }
}

impl From<i32> for Rotation {
    fn from(degrees: i32) -> Self {
        Self::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// The persisted part of a stack's display adjustments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Presentation {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
}

impl Presentation {
    pub fn new(rotation: Rotation, flip_horizontal: bool) -> Self {
        Self {
            rotation,
            flip_horizontal,
        }
    }

    pub fn effective_size(self, natural: Size) -> Size {
        if self.rotation.is_sideways() {
            Size::new(natural.height, natural.width)
        } else {
            natural
        }
    }

    /// Maps an image-space vector (relative to the image center) into
    /// presented orientation.
    pub fn orient(self, v: Point) -> Point {
        let flipped = if self.flip_horizontal {
            Point::new(-v.x, v.y)
        } else {
            v
        };
        self.rotation.rotate(flipped)
    }

    pub fn unorient(self, v: Point) -> Point {
        let unrotated = self.rotation.inverse().rotate(v);
        if self.flip_horizontal {
            Point::new(-unrotated.x, unrotated.y)
        } else {
            unrotated
        }
    }

    pub fn to_presented(self, image: Point, natural: Size) -> Point {
        let center = natural.center();
        center + self.orient(image - center)
    }

    pub fn from_presented(self, presented: Point, natural: Size) -> Point {
        let center = natural.center();
        center + self.unorient(presented - center)
    }
}

/// Pan/zoom state in image-pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// `None` until the first image is sized; resolves to the image center.
    pub center: Option<Point>,
    /// 1.0 fits the (rotated) image inside the container.
    pub scale: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: None,
            scale: 1.0,
        }
    }
}

impl Camera {
    pub fn resolved_center(&self, natural: Size) -> Point {
        self.center
            .filter(|center| center.is_finite())
            .unwrap_or_else(|| natural.center())
    }

    /// Multiplies the scale by `factor`, clamped into `[min, max]`.
    pub fn zoomed(self, factor: f64, min: f64, max: f64) -> Self {
        if !(factor.is_finite() && factor > 0.0) {
            return self;
        }
        let current = if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        };
        Self {
            scale: (current * factor).clamp(min, max),
            ..self
        }
    }
}

/// Visible rectangle of presented space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    pub fn center(&self) -> Point {
        Point::new(
            self.min_x + self.width / 2.0,
            self.min_y + self.height / 2.0,
        )
    }
}

/// Computes the visible region for `camera`, or `None` while either the
/// image or the container is unsized.
pub fn compute_view_box(
    natural: Size,
    container: Size,
    camera: &Camera,
    presentation: Presentation,
) -> Option<ViewBox> {
    if !natural.is_usable() || !container.is_usable() {
        return None;
    }
    if !(camera.scale.is_finite() && camera.scale > 0.0) {
        return None;
    }

    let effective = presentation.effective_size(natural);
    let container_aspect = container.aspect();
    let (fit_width, fit_height) = if effective.aspect() > container_aspect {
        (effective.width, effective.width / container_aspect)
    } else {
        (effective.height * container_aspect, effective.height)
    };
    let width = fit_width / camera.scale;
    let height = fit_height / camera.scale;

    let focus = presentation.to_presented(camera.resolved_center(natural), natural);
    Some(ViewBox {
        min_x: focus.x - width / 2.0,
        min_y: focus.y - height / 2.0,
        width,
        height,
    })
}

/// Linear map from view-box units to container pixels.
pub fn view_box_to_screen(point: Point, view_box: &ViewBox, container: Size) -> Point {
    Point::new(
        (point.x - view_box.min_x) * container.width / view_box.width,
        (point.y - view_box.min_y) * container.height / view_box.height,
    )
}

pub fn screen_to_view_box(point: Point, view_box: &ViewBox, container: Size) -> Point {
    Point::new(
        view_box.min_x + point.x * view_box.width / container.width,
        view_box.min_y + point.y * view_box.height / container.height,
    )
}

/// Everything needed to move points between the four spaces for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub view_box: ViewBox,
    pub container: Size,
    pub natural: Size,
    pub presentation: Presentation,
}

impl Viewport {
    pub fn new(
        natural: Size,
        container: Size,
        camera: &Camera,
        presentation: Presentation,
    ) -> Option<Self> {
        let view_box = compute_view_box(natural, container, camera, presentation)?;
        Some(Self {
            view_box,
            container,
            natural,
            presentation,
        })
    }

    pub fn image_to_screen(&self, image: Point) -> Point {
        let presented = self.presentation.to_presented(image, self.natural);
        view_box_to_screen(presented, &self.view_box, self.container)
    }

    pub fn screen_to_image(&self, screen: Point) -> Point {
        let presented = screen_to_view_box(screen, &self.view_box, self.container);
        self.presentation.from_presented(presented, self.natural)
    }

    pub fn normalized_to_screen(&self, normalized: Point) -> Point {
        self.image_to_screen(Point::new(
            normalized.x * self.natural.width,
            normalized.y * self.natural.height,
        ))
    }

    /// `None` for non-finite input so pointer handlers can bail out.
    pub fn screen_to_normalized(&self, screen: Point) -> Option<Point> {
        if !screen.is_finite() {
            return None;
        }
        let image = self.screen_to_image(screen);
        let normalized = Point::new(image.x / self.natural.width, image.y / self.natural.height);
        normalized.is_finite().then_some(normalized)
    }

    /// Screen rectangle covered by the presented image, as `(min, max)`.
    pub fn image_bounds_on_screen(&self) -> (Point, Point) {
        let center = self.natural.center();
        let effective = self.presentation.effective_size(self.natural);
        let half = Point::new(effective.width / 2.0, effective.height / 2.0);
        (
            view_box_to_screen(center - half, &self.view_box, self.container),
            view_box_to_screen(center + half, &self.view_box, self.container),
        )
    }
}

/// Converts a pointer drag into a new camera so the image follows the pointer.
///
/// The delta is scaled into view-box units, rotated back by the stack
/// rotation and mirrored when flipped; the camera moves the opposite way.
pub fn pan_by_screen_delta(camera: &Camera, dx: f64, dy: f64, viewport: &Viewport) -> Camera {
    if !(dx.is_finite() && dy.is_finite()) {
        return *camera;
    }
    let scaled = Point::new(
        dx * viewport.view_box.width / viewport.container.width,
        dy * viewport.view_box.height / viewport.container.height,
    );
    let image_delta = viewport.presentation.unorient(scaled);
    let center = camera.resolved_center(viewport.natural);
    Camera {
        center: Some(center - image_delta),
        scale: camera.scale,
    }
}
