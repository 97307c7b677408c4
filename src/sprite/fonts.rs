//! Font loading and text rasterization
//!
//! Wraps fontdue behind a small path-keyed cache. A font file that cannot
//! be read or parsed is an advisory, not an error: the embedded default
//! face is substituted so text sprites always render something.

use std::collections::HashMap;
use std::rc::Rc;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::error::advisory;
use crate::sprite::surface::Surface;

static DEFAULT_FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Owns the default face and every font loaded from a path.
pub struct FontStore {
    default_font: Rc<fontdue::Font>,
    loaded: HashMap<String, Rc<fontdue::Font>>,
}

impl FontStore {
    pub fn new() -> Self {
        let default_font = fontdue::Font::from_bytes(
            DEFAULT_FONT_BYTES,
            fontdue::FontSettings::default(),
        )
        .expect("embedded default font parses");
        Self {
            default_font: Rc::new(default_font),
            loaded: HashMap::new(),
        }
    }

    /// The font for `path`, or the default face when `path` is `None` or
    /// the file cannot be loaded (with an advisory on first failure).
    pub fn get(&mut self, path: Option<&str>) -> Rc<fontdue::Font> {
        let Some(path) = path else {
            return self.default_font.clone();
        };
        if let Some(font) = self.loaded.get(path) {
            return font.clone();
        }

        let loaded = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
                    .map_err(|e| e.to_string())
            });
        let font = match loaded {
            Ok(font) => Rc::new(font),
            Err(_) => {
                advisory(&format!(
                    "We couldn't find or read the font file '{path}'. We'll use the \
                     default font instead for now.\n\
                     To fix this, either leave the font unset, or make sure a font \
                     file (usually called something like Arial.ttf) is in your \
                     project folder."
                ));
                self.default_font.clone()
            }
        };
        // Cache failures too, so the advisory prints once per path rather
        // than once per recompute.
        self.loaded.insert(path.to_string(), font.clone());
        font
    }
}

impl Default for FontStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Rasterize a single line of text into an RGBA surface.
pub fn rasterize_text(
    text: &str,
    font: &fontdue::Font,
    font_size: f32,
    (r, g, b): (u8, u8, u8),
) -> Surface {
    if text.is_empty() {
        return Surface::new(1, 1);
    }

    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings::default());
    let fonts = [font];
    layout.append(&fonts, &TextStyle::new(text, font_size.max(1.0), 0));

    // Bounding box over all glyph rectangles
    let mut min_x = 0.0f32;
    let mut min_y = 0.0f32;
    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    for glyph in layout.glyphs() {
        min_x = min_x.min(glyph.x);
        min_y = min_y.min(glyph.y);
        max_x = max_x.max(glyph.x + glyph.width as f32);
        max_y = max_y.max(glyph.y + glyph.height as f32);
    }

    let width = ((max_x - min_x).ceil().max(1.0)) as u32;
    let height = ((max_y - min_y).ceil().max(1.0)) as u32;
    let origin_x = (-min_x).round() as i32;
    let origin_y = (-min_y).round() as i32;

    let mut surface = Surface::new(width, height);
    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (metrics, bitmap) = font.rasterize_config(glyph.key);
        let start_x = glyph.x.round() as i32 + origin_x;
        let start_y = glyph.y.round() as i32 + origin_y;
        for row in 0..metrics.height {
            let dst_y = start_y + row as i32;
            if dst_y < 0 || dst_y >= height as i32 {
                continue;
            }
            for col in 0..metrics.width {
                let dst_x = start_x + col as i32;
                if dst_x < 0 || dst_x >= width as i32 {
                    continue;
                }
                let coverage = bitmap[row * metrics.width + col];
                if coverage == 0 {
                    continue;
                }
                let idx = ((dst_y as u32 * width + dst_x as u32) * 4) as usize;
                // Overlapping glyph boxes keep the stronger coverage
                if coverage > surface.pixels[idx + 3] {
                    surface.pixels[idx] = r;
                    surface.pixels[idx + 1] = g;
                    surface.pixels[idx + 2] = b;
                    surface.pixels[idx + 3] = coverage;
                }
            }
        }
    }
    surface
}
