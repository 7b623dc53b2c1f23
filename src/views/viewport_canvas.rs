use crate::message::{CanvasEvent, Message};
use iced::keyboard;
use iced::mouse;
use iced::widget::canvas::{self, event, Canvas, Event, Frame, Path, Stroke, Text};
use iced::widget::image::Handle;
use iced::{Color, Element, Length, Rectangle, Renderer, Theme};
use slicemark::interaction::DragState;
use slicemark::render::{build_scene_in, Primitive, SceneItem};
use slicemark::{Modifiers, Point, PointerButton, PointerEvent, RasterStatus, Size, Tool, WheelEvent};

/// Pixels of smooth scrolling that count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 40.0;
const HANDLE_RADIUS: f32 = 4.0;

pub fn viewport_canvas<'a>(viewer: &'a slicemark::Viewer, texture: Option<&'a Handle>) -> Element<'a, Message> {
    Canvas::new(ViewportCanvas { viewer, texture })
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

struct ViewportCanvas<'a> {
    viewer: &'a slicemark::Viewer,
    texture: Option<&'a Handle>,
}

#[derive(Default)]
struct CanvasState {
    modifiers: keyboard::Modifiers,
}

impl canvas::Program<Message> for ViewportCanvas<'_> {
    type State = CanvasState;

    fn update(
        &self,
        state: &mut CanvasState,
        event: Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (event::Status, Option<Message>) {
        let size = Size::new(bounds.width as f64, bounds.height as f64);
        let mouse_event = match event {
            Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                state.modifiers = modifiers;
                return (event::Status::Ignored, None);
            }
            Event::Mouse(mouse_event) => mouse_event,
            _ => return (event::Status::Ignored, None),
        };

        let dragging = !matches!(self.viewer.drag_state(), DragState::None);
        let inside = cursor.position_in(bounds).map(to_point);
        // Drags keep tracking once the pointer leaves the canvas.
        let relative = cursor.position_from(bounds.position()).map(to_point);
        let modifiers = to_modifiers(state.modifiers);

        let canvas_event = match mouse_event {
            mouse::Event::ButtonPressed(button) => {
                let (Some(position), Some(button)) = (inside, to_button(button)) else {
                    return (event::Status::Ignored, None);
                };
                CanvasEvent::Pressed(PointerEvent {
                    position,
                    button,
                    modifiers,
                })
            }
            mouse::Event::CursorMoved { .. } => match (inside, relative) {
                (Some(position), _) => CanvasEvent::Moved(position),
                (None, Some(position)) if dragging => CanvasEvent::Moved(position),
                _ => return (event::Status::Ignored, None),
            },
            mouse::Event::ButtonReleased(_) if dragging || inside.is_some() => CanvasEvent::Released,
            mouse::Event::WheelScrolled { delta } if inside.is_some() => {
                let notches = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => -y,
                    mouse::ScrollDelta::Pixels { y, .. } => -y / PIXELS_PER_NOTCH,
                };
                CanvasEvent::Wheel(WheelEvent {
                    delta_y: notches as f64,
                    modifiers,
                })
            }
            _ => return (event::Status::Ignored, None),
        };

        (event::Status::Captured, Some(Message::Canvas(size, canvas_event)))
    }

    fn draw(
        &self,
        _state: &CanvasState,
        renderer: &Renderer,
        theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(iced::Point::ORIGIN, bounds.size(), Color::BLACK);

        let size = Size::new(bounds.width as f64, bounds.height as f64);
        let Some(scene) = build_scene_in(self.viewer, size) else {
            draw_status(&mut frame, theme, self.viewer);
            return vec![frame.into_geometry()];
        };

        match self.texture {
            Some(handle) => {
                let (min, max) = scene.image_bounds;
                let image_bounds = Rectangle::new(
                    to_iced(min),
                    iced::Size::new((max.x - min.x) as f32, (max.y - min.y) as f32),
                );
                frame.draw_image(image_bounds, canvas::Image::new(handle.clone()));
            }
            None => draw_status(&mut frame, theme, self.viewer),
        }

        for item in &scene.items {
            draw_item(&mut frame, item);
        }

        vec![frame.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        _state: &CanvasState,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if !cursor.is_over(bounds) {
            return mouse::Interaction::default();
        }
        match (self.viewer.drag_state(), self.viewer.tool()) {
            (DragState::Panning { .. } | DragState::DraggingAnnotation { .. }, _) => {
                mouse::Interaction::Grabbing
            }
            (_, Tool::Pan) => mouse::Interaction::Grab,
            (_, Tool::Point | Tool::Line | Tool::Polygon) => mouse::Interaction::Crosshair,
            (_, Tool::Select) => mouse::Interaction::Pointer,
        }
    }
}

fn draw_item(frame: &mut Frame, item: &SceneItem) {
    let [r, g, b] = item.category.rgb();
    let color = Color::from_rgb8(r, g, b);
    let stroke = Stroke::default()
        .with_color(color)
        .with_width(if item.selected { 3.0 } else { 2.0 });

    match &item.primitive {
        Primitive::Marker { center, radius } => {
            let path = Path::circle(to_iced(*center), *radius as f32);
            frame.fill(&path, color);
            frame.stroke(&path, stroke);
        }
        Primitive::Segment { from, to } => {
            frame.stroke(&Path::line(to_iced(*from), to_iced(*to)), stroke);
        }
        Primitive::Path { points, closed } => {
            if points.is_empty() {
                return;
            }
            let path = Path::new(|builder| {
                builder.move_to(to_iced(points[0]));
                for point in &points[1..] {
                    builder.line_to(to_iced(*point));
                }
                if *closed {
                    builder.close();
                }
            });
            if *closed {
                frame.fill(&path, Color { a: 0.2, ..color });
            }
            frame.stroke(&path, stroke);
        }
    }

    for handle in &item.handles {
        let dot = Path::circle(to_iced(*handle), HANDLE_RADIUS);
        frame.fill(&dot, Color::WHITE);
        frame.stroke(&dot, Stroke::default().with_color(color).with_width(1.5));
    }

    if !item.label.is_empty() {
        if let Some(anchor) = label_anchor(&item.primitive) {
            frame.fill_text(Text {
                content: item.label.clone(),
                position: iced::Point::new(anchor.x as f32 + 8.0, anchor.y as f32 - 8.0),
                color,
                size: iced::Pixels(13.0),
                ..Text::default()
            });
        }
    }
}

fn label_anchor(primitive: &Primitive) -> Option<Point> {
    match primitive {
        Primitive::Marker { center, .. } => Some(*center),
        Primitive::Segment { from, .. } => Some(*from),
        Primitive::Path { points, .. } => points.first().copied(),
    }
}

fn draw_status(frame: &mut Frame, theme: &Theme, viewer: &slicemark::Viewer) {
    let content = if viewer.stack().is_empty() {
        String::from("Open images or a stack document to begin")
    } else {
        match viewer.raster_status(viewer.current_slice()) {
            RasterStatus::Failed(reason) => format!("Slice could not be decoded: {reason}"),
            RasterStatus::Pending | RasterStatus::Ready(_) => String::from("Loading slice…"),
        }
    };
    frame.fill_text(Text {
        content,
        position: iced::Point::new(16.0, 16.0),
        color: theme.extended_palette().background.base.text,
        size: iced::Pixels(16.0),
        ..Text::default()
    });
}

fn to_point(point: iced::Point) -> Point {
    Point::new(point.x as f64, point.y as f64)
}

fn to_iced(point: Point) -> iced::Point {
    iced::Point::new(point.x as f32, point.y as f32)
}

fn to_button(button: mouse::Button) -> Option<PointerButton> {
    match button {
        mouse::Button::Left => Some(PointerButton::Primary),
        mouse::Button::Middle => Some(PointerButton::Middle),
        mouse::Button::Right => Some(PointerButton::Secondary),
        _ => None,
    }
}

fn to_modifiers(modifiers: keyboard::Modifiers) -> Modifiers {
    Modifiers {
        ctrl: modifiers.control(),
        shift: modifiers.shift(),
        alt: modifiers.alt(),
        meta: modifiers.logo(),
    }
}
