/// Polygon annotation surface
///
/// A plain 2D canvas: stored polygons are drawn each frame, and mouse
/// events turn into selection and drag messages for the app to apply.
/// Shapes live for the session only; there is no vertex editing and no
/// persistence.
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program, Stroke};
use iced::widget::{button, column, container, row, text, Canvas};
use iced::{Color, Element, Length, Point, Rectangle, Vector};

use crate::Message;

/// Drawing area size, matching the original annotation canvas
pub const CANVAS_WIDTH: f32 = 800.0;
pub const CANVAS_HEIGHT: f32 = 600.0;

/// Every new polygon starts as this square, then gets dragged into place
const DEFAULT_POLYGON: [(f32, f32); 4] = [(100.0, 100.0), (200.0, 100.0), (200.0, 200.0), (100.0, 200.0)];

/// A closed polygon on the annotation canvas
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    pub points: Vec<Point>,
}

impl PolygonShape {
    pub fn default_square() -> Self {
        PolygonShape {
            points: DEFAULT_POLYGON.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    /// Move every vertex by the same offset
    pub fn translate(&mut self, delta: Vector) {
        for point in &mut self.points {
            *point = *point + delta;
        }
    }

    /// Bounding-box hit test; good enough for grab-and-drag
    pub fn contains(&self, position: Point) -> bool {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return false;
        };
        let (mut min_x, mut max_x) = (first.x, first.x);
        let (mut min_y, mut max_y) = (first.y, first.y);
        for point in points {
            min_x = min_x.min(point.x);
            max_x = max_x.max(point.x);
            min_y = min_y.min(point.y);
            max_y = max_y.max(point.y);
        }
        position.x >= min_x && position.x <= max_x && position.y >= min_y && position.y <= max_y
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    /// Index of the shape being dragged, if any
    pub dragging: Option<usize>,
    pub last_position: Option<Point>,
}

/// Canvas program rendering the shapes and reporting pointer gestures
pub struct AnnotationCanvas<'a> {
    pub shapes: &'a [PolygonShape],
    pub selected: Option<usize>,
}

impl<'a> Program<Message> for AnnotationCanvas<'a> {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        frame.fill_rectangle(
            Point::ORIGIN,
            frame.size(),
            Color::from_rgb(0.94, 0.94, 0.94),
        );

        for (index, shape) in self.shapes.iter().enumerate() {
            let mut path_builder = canvas::path::Builder::new();
            let mut points = shape.points.iter();
            let Some(first) = points.next() else {
                continue;
            };
            path_builder.move_to(*first);
            for point in points {
                path_builder.line_to(*point);
            }
            path_builder.close();

            let path = path_builder.build();
            frame.fill(&path, Color::from_rgba(1.0, 0.0, 0.0, 0.3));

            let stroke_width = if self.selected == Some(index) { 3.0 } else { 2.0 };
            frame.stroke(
                &path,
                Stroke::default()
                    .with_color(Color::from_rgb(1.0, 0.0, 0.0))
                    .with_width(stroke_width),
            );
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(position) = cursor.position_in(bounds) {
                    // topmost shape wins, so later additions grab first
                    let hit = self
                        .shapes
                        .iter()
                        .enumerate()
                        .rev()
                        .find(|(_, shape)| shape.contains(position))
                        .map(|(index, _)| index);
                    state.dragging = hit;
                    state.last_position = Some(position);
                    return (canvas::event::Status::Captured, Some(Message::ShapeSelected(hit)));
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.dragging.take().is_some() {
                    state.last_position = None;
                    return (canvas::event::Status::Captured, None);
                }
                state.last_position = None;
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if let Some(index) = state.dragging {
                    if let (Some(position), Some(last)) = (cursor.position_in(bounds), state.last_position) {
                        let delta = position - last;
                        state.last_position = Some(position);
                        return (
                            canvas::event::Status::Captured,
                            Some(Message::ShapeDragged { index, delta }),
                        );
                    }
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }
}

/// The annotation page: heading, shape controls, and the canvas.
///
/// Until a batch has produced a segmentation, there is nothing to
/// annotate and the page says so instead of showing the canvas.
pub fn annotation_page<'a>(
    shapes: &'a [PolygonShape],
    selected: Option<usize>,
    target: Option<&'a str>,
) -> Element<'a, Message> {
    let heading = match target {
        Some(name) => text(format!("Image Annotation - {}", name)).size(24),
        None => text("Image Annotation").size(24),
    };

    let body: Element<'a, Message> = if target.is_some() {
        let canvas = Canvas::new(AnnotationCanvas { shapes, selected })
            .width(Length::Fixed(CANVAS_WIDTH))
            .height(Length::Fixed(CANVAS_HEIGHT));
        column![
            row![button("Add Polygon").on_press(Message::AddPolygon)].spacing(10),
            container(canvas).style(container::bordered_box),
        ]
        .spacing(15)
        .into()
    } else {
        text("Please upload an image from the home page to start annotation.")
            .size(16)
            .into()
    };

    column![heading, body].spacing(15).padding(20).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_square_vertices() {
        let shape = PolygonShape::default_square();
        assert_eq!(shape.points.len(), 4);
        assert_eq!(shape.points[0], Point::new(100.0, 100.0));
        assert_eq!(shape.points[2], Point::new(200.0, 200.0));
    }

    #[test]
    fn test_translate_moves_every_vertex() {
        let mut shape = PolygonShape::default_square();
        shape.translate(Vector::new(30.0, -10.0));
        assert_eq!(shape.points[0], Point::new(130.0, 90.0));
        assert_eq!(shape.points[3], Point::new(130.0, 190.0));
    }

    #[test]
    fn test_bounding_box_hit_test() {
        let shape = PolygonShape::default_square();
        assert!(shape.contains(Point::new(150.0, 150.0)));
        assert!(shape.contains(Point::new(100.0, 100.0)), "edges count as inside");
        assert!(!shape.contains(Point::new(99.0, 150.0)));
        assert!(!shape.contains(Point::new(150.0, 201.0)));
    }

    #[test]
    fn test_empty_polygon_contains_nothing() {
        let shape = PolygonShape { points: Vec::new() };
        assert!(!shape.contains(Point::new(0.0, 0.0)));
    }
}
