//! Shape kinds
//!
//! A sprite is one of five kinds - image, box, circle, line, text - sharing
//! position/transform/physics behavior but each with its own payload and
//! its own primary-surface computation. The kinds are a sum type and the
//! primary computation is a single match, so adding a kind means extending
//! one enum and one function.

use crate::color::NamedColor;
use crate::error::GameError;
use crate::sprite::fonts::{rasterize_text, FontStore};
use crate::sprite::surface::Surface;

/// Fallback canvas for image sprites constructed without a path.
const BLANK_IMAGE_SIZE: u32 = 32;

#[derive(Debug, Clone)]
pub struct ImageShape {
    /// `None` renders as a small transparent placeholder.
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BoxShape {
    pub width: f32,
    pub height: f32,
    pub color: NamedColor,
    pub border_color: NamedColor,
    pub border_width: f32,
}

#[derive(Debug, Clone)]
pub struct CircleShape {
    pub radius: f32,
    pub color: NamedColor,
    pub border_color: NamedColor,
    pub border_width: f32,
}

#[derive(Debug, Clone)]
pub struct LineShape {
    /// Endpoint in world coordinates. The sprite position is the start
    /// point; length and angle are always derived from the two points.
    pub x1: f32,
    pub y1: f32,
    pub thickness: f32,
    pub color: NamedColor,
}

#[derive(Debug, Clone)]
pub struct TextShape {
    pub words: String,
    pub font: Option<String>,
    pub font_size: f32,
    pub color: NamedColor,
}

#[derive(Debug, Clone)]
pub enum Shape {
    Image(ImageShape),
    Box(BoxShape),
    Circle(CircleShape),
    Line(LineShape),
    Text(TextShape),
}

impl Shape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Image(_) => "image",
            Shape::Box(_) => "box",
            Shape::Circle(_) => "circle",
            Shape::Line(_) => "line",
            Shape::Text(_) => "text",
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self, Shape::Line(_))
    }

    /// Compute the primary surface for this shape. `(x, y)` is the sprite
    /// position; only lines need it (their canvas spans start to endpoint).
    pub fn rasterize(
        &self,
        fonts: &mut FontStore,
        (x, y): (f32, f32),
    ) -> Result<Surface, GameError> {
        match self {
            Shape::Image(image) => rasterize_image(image),
            Shape::Box(b) => Ok(rasterize_box(b)),
            Shape::Circle(c) => Ok(rasterize_circle(c)),
            Shape::Line(line) => Ok(rasterize_line_placeholder(line, x, y)),
            Shape::Text(t) => {
                let font = fonts.get(t.font.as_deref());
                Ok(rasterize_text(&t.words, &font, t.font_size, t.color.rgb()))
            }
        }
    }
}

fn rasterize_image(image: &ImageShape) -> Result<Surface, GameError> {
    let Some(path) = &image.path else {
        return Ok(Surface::new(BLANK_IMAGE_SIZE, BLANK_IMAGE_SIZE));
    };
    let decoded = image::open(path)
        .map_err(|_| GameError::ImageNotFound(path.clone()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    let mut surface = Surface::from_rgba(width.max(1), height.max(1), decoded.into_raw());
    // Pure white is treated as transparent, so plain-background drawings
    // cut out cleanly (same color key the original starter images rely on).
    for px in surface.pixels.chunks_exact_mut(4) {
        if px[0] == 255 && px[1] == 255 && px[2] == 255 {
            px[3] = 0;
        }
    }
    Ok(surface)
}

fn rasterize_box(b: &BoxShape) -> Surface {
    let width = b.width.round().max(1.0) as u32;
    let height = b.height.round().max(1.0) as u32;
    let mut surface = Surface::new(width, height);
    let border = b.border_width.round() as i32;
    if border > 0 {
        surface.fill(b.border_color.rgb());
        surface.fill_rect(
            border,
            border,
            (width as i32 - 2 * border).max(0) as u32,
            (height as i32 - 2 * border).max(0) as u32,
            b.color.rgb(),
        );
    } else {
        surface.fill(b.color.rgb());
    }
    surface
}

fn rasterize_circle(c: &CircleShape) -> Surface {
    let radius = c.radius.round().max(0.0) as i32;
    let border = c.border_width.round().max(0.0) as i32;
    let diameter = ((radius + border) * 2).max(1) as u32;
    let center = radius + border;
    let mut surface = Surface::new(diameter, diameter);
    if border > 0 {
        surface.fill_circle(center, center, radius, c.border_color.rgb());
        surface.fill_circle(center, center, radius - border, c.color.rgb());
    } else {
        surface.fill_circle(center, center, radius, c.color.rgb());
    }
    surface
}

/// Lines are drawn directly from their logical endpoints every frame, so
/// the cached surface is just a transparent canvas of the right size (it
/// still participates in dirty tracking like every other kind).
fn rasterize_line_placeholder(line: &LineShape, x: f32, y: f32) -> Surface {
    let width = (line.x1 - x).abs().max(line.thickness).round() as u32;
    let height = (line.y1 - y).abs().max(line.thickness).round() as u32;
    Surface::new(width.max(1), height.max(1))
}

/// Endpoint of a line starting at `(x, y)` with the given length and angle
/// (degrees, counterclockwise from +x).
pub fn line_endpoint(x: f32, y: f32, length: f32, angle_degrees: f32) -> (f32, f32) {
    let radians = angle_degrees.to_radians();
    (x + length * radians.cos(), y + length * radians.sin())
}

/// Length and angle of the segment from `(x, y)` to `(x1, y1)`.
pub fn line_length_angle(x: f32, y: f32, x1: f32, y1: f32) -> (f32, f32) {
    let dx = x1 - x;
    let dy = y1 - y;
    (dx.hypot(dy), dy.atan2(dx).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> NamedColor {
        NamedColor::resolve(name).unwrap()
    }

    #[test]
    fn test_line_geometry_round_trip() {
        let (x1, y1) = line_endpoint(10.0, 20.0, 100.0, 30.0);
        let (length, angle) = line_length_angle(10.0, 20.0, x1, y1);
        assert!((length - 100.0).abs() < 1e-3);
        assert!((angle - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_line_angle_points_at_endpoint() {
        // Straight up should be +90 degrees, not the endpoint's own value
        let (length, angle) = line_length_angle(0.0, 0.0, 0.0, 50.0);
        assert!((length - 50.0).abs() < 1e-3);
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_box_raster_dimensions_and_border() {
        let b = BoxShape {
            width: 10.0,
            height: 6.0,
            color: named("black"),
            border_color: named("red"),
            border_width: 2.0,
        };
        let s = rasterize_box(&b);
        assert_eq!((s.width, s.height), (10, 6));
        // corner is border, center is fill
        assert_eq!(&s.pixels[0..4], &[255, 0, 0, 255]);
        let center = ((3 * s.width + 5) * 4) as usize;
        assert_eq!(&s.pixels[center..center + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_circle_raster_canvas_includes_border() {
        let c = CircleShape {
            radius: 10.0,
            color: named("black"),
            border_color: named("red"),
            border_width: 3.0,
        };
        let s = rasterize_circle(&c);
        assert_eq!((s.width, s.height), (26, 26));
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let shape = Shape::Image(ImageShape {
            path: Some("definitely-not-here.png".to_string()),
        });
        let mut fonts = FontStore::new();
        assert!(matches!(
            shape.rasterize(&mut fonts, (0.0, 0.0)),
            Err(GameError::ImageNotFound(_))
        ));
    }

    #[test]
    fn test_image_sprite_loads_from_disk_with_white_colorkey() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let shape = Shape::Image(ImageShape {
            path: Some(path.to_string_lossy().into_owned()),
        });
        let mut fonts = FontStore::new();
        let s = shape.rasterize(&mut fonts, (0.0, 0.0)).unwrap();
        assert_eq!((s.width, s.height), (2, 1));
        // pure white keys out as transparent, everything else survives
        assert_eq!(s.pixels[3], 0);
        assert_eq!(&s.pixels[4..8], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_blank_image_placeholder() {
        let shape = Shape::Image(ImageShape { path: None });
        let mut fonts = FontStore::new();
        let s = shape.rasterize(&mut fonts, (0.0, 0.0)).unwrap();
        assert_eq!((s.width, s.height), (32, 32));
    }

    #[test]
    fn test_line_placeholder_spans_endpoints() {
        let line = LineShape {
            x1: 50.0,
            y1: 3.0,
            thickness: 1.0,
            color: named("black"),
        };
        let s = rasterize_line_placeholder(&line, 0.0, 0.0);
        assert_eq!((s.width, s.height), (50, 3));
    }
}
