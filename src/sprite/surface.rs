//! Surface cache
//!
//! Every non-line sprite is drawn from a cached raster. The *primary*
//! surface is the shape at its natural size (decoded image, filled box,
//! rendered text). The *secondary* surface is the primary with the view
//! transform applied - transparency, then scale, then rotation, in that
//! fixed order - and is what the render pass blits.
//!
//! Mutators never recompute surfaces inline; they set one of two dirty
//! flags and the frame loop refreshes the cache at a fixed point in the
//! tick. Recomputing the primary always recomputes the secondary, so the
//! secondary is derived from the latest primary by construction.

use image::imageops::FilterType;
use image::RgbaImage;
use macroquad::prelude::Texture2D;

/// An owned RGBA8 raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    /// RGBA, 4 bytes per pixel, row-major
    pub pixels: Vec<u8>,
}

impl Surface {
    /// A fully transparent surface. Zero dimensions are bumped to 1x1 so
    /// degenerate shapes never produce an empty buffer.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }

    #[inline]
    fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Fill the whole surface with an opaque color.
    pub fn fill(&mut self, (r, g, b): (u8, u8, u8)) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, (r, g, b): (u8, u8, u8)) {
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = ((x + w as i32).max(0) as u32).min(self.width);
        let y1 = ((y + h as i32).max(0) as u32).min(self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.set_pixel(px, py, [r, g, b, 255]);
            }
        }
    }

    /// Fill a circle with the bounding-box distance test.
    pub fn fill_circle(&mut self, cx: i32, cy: i32, radius: i32, (r, g, b): (u8, u8, u8)) {
        if radius <= 0 {
            return;
        }
        let r_sq = radius * radius;
        let y_lo = (cy - radius).max(0);
        let y_hi = (cy + radius).min(self.height as i32 - 1);
        let x_lo = (cx - radius).max(0);
        let x_hi = (cx + radius).min(self.width as i32 - 1);
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= r_sq {
                    self.set_pixel(x as u32, y as u32, [r, g, b, 255]);
                }
            }
        }
    }

    /// Multiply the alpha channel by `percent` / 100.
    pub fn apply_opacity(&mut self, percent: f32) {
        let factor = (percent / 100.0).clamp(0.0, 1.0);
        for px in self.pixels.chunks_exact_mut(4) {
            px[3] = (px[3] as f32 * factor).round() as u8;
        }
    }

    /// Resample to `size_percent` of the current dimensions.
    pub fn scaled(&self, size_percent: f32) -> Surface {
        let ratio = (size_percent / 100.0).max(0.0);
        let new_w = ((self.width as f32 * ratio).round() as u32).max(1);
        let new_h = ((self.height as f32 * ratio).round() as u32).max(1);
        if new_w == self.width && new_h == self.height {
            return self.clone();
        }
        // The 1x1 fallback keeps zero and negative scales from panicking
        // further down the pipeline.
        let Some(img) = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()) else {
            return Surface::new(new_w, new_h);
        };
        let resized = image::imageops::resize(&img, new_w, new_h, FilterType::Triangle);
        Surface::from_rgba(new_w, new_h, resized.into_raw())
    }

    /// Rotate counterclockwise by `degrees`, expanding the canvas to hold
    /// the rotated bounds. Uncovered corners stay transparent.
    pub fn rotated(&self, degrees: f32) -> Surface {
        if degrees.rem_euclid(360.0) == 0.0 {
            return self.clone();
        }
        let theta = degrees.to_radians();
        let (sin, cos) = theta.sin_cos();
        let (w, h) = (self.width as f32, self.height as f32);
        // The epsilon keeps quarter-turn float dust (cos 90 ~ -4e-8) from
        // ceiling the canvas a pixel too wide
        let new_w = ((w * cos.abs() + h * sin.abs() - 1e-4).ceil() as u32).max(1);
        let new_h = ((w * sin.abs() + h * cos.abs() - 1e-4).ceil() as u32).max(1);

        let mut out = Surface::new(new_w, new_h);
        let (scx, scy) = (w / 2.0, h / 2.0);
        let (dcx, dcy) = (new_w as f32 / 2.0, new_h as f32 / 2.0);

        // Inverse mapping: for each destination pixel, sample the source
        // pixel it came from. Pixel space is y-down, so a visually
        // counterclockwise rotation inverts the usual sign convention.
        for dy in 0..new_h {
            for dx in 0..new_w {
                let rx = dx as f32 + 0.5 - dcx;
                let ry = dy as f32 + 0.5 - dcy;
                let sx = rx * cos - ry * sin + scx;
                let sy = rx * sin + ry * cos + scy;
                if sx >= 0.0 && sx < w && sy >= 0.0 && sy < h {
                    out.set_pixel(dx, dy, self.get_pixel(sx as u32, sy as u32));
                }
            }
        }
        out
    }
}

/// The view-transform half of a sprite's state: everything the secondary
/// surface depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Scale percentage
    pub size: f32,
    /// Rotation in degrees, counterclockwise
    pub angle: f32,
    /// Opacity percentage
    pub transparency: f32,
}

/// Cached primary and secondary surfaces plus their dirty flags and the
/// lazily uploaded GPU texture of the secondary.
pub struct SurfaceCache {
    primary: Surface,
    secondary: Surface,
    needs_primary: bool,
    needs_secondary: bool,
    texture: Option<Texture2D>,
    texture_stale: bool,
    /// How many times the cache actually recomputed. Lets tests pin down
    /// that repeated reads without intervening writes do no work.
    pub(crate) recompute_count: u64,
}

impl SurfaceCache {
    /// A cache seeded with an already computed primary surface.
    pub fn new(primary: Surface) -> Self {
        Self {
            primary,
            secondary: Surface::new(1, 1),
            needs_primary: false,
            // The secondary has never been derived, so the first refresh
            // must run even for untransformed sprites.
            needs_secondary: true,
            texture: None,
            texture_stale: true,
            recompute_count: 0,
        }
    }

    /// Shape-defining attributes changed: redo everything.
    pub fn mark_primary_dirty(&mut self) {
        self.needs_primary = true;
        self.needs_secondary = true;
    }

    /// View-transform attributes changed: redo only the derived surface.
    pub fn mark_secondary_dirty(&mut self) {
        self.needs_secondary = true;
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_primary || self.needs_secondary
    }

    /// Recompute whatever is dirty. `recompute_primary` is invoked only
    /// when the primary is stale; `transparency_only` suppresses the
    /// scale/rotation stages (lines keep their placeholder geometry).
    pub fn refresh<F>(
        &mut self,
        view: ViewTransform,
        transparency_only: bool,
        recompute_primary: F,
    ) where
        F: FnOnce() -> Option<Surface>,
    {
        if self.needs_primary {
            // A failed recompute (image file vanished after construction)
            // keeps the previous primary; the caller has already advised.
            if let Some(surface) = recompute_primary() {
                self.primary = surface;
            }
            self.needs_primary = false;
            self.needs_secondary = true;
        }
        if !self.needs_secondary {
            return;
        }

        let mut surface = self.primary.clone();
        surface.apply_opacity(view.transparency);
        if !transparency_only {
            if view.size != 100.0 {
                surface = surface.scaled(view.size);
            }
            if view.angle != 0.0 {
                surface = surface.rotated(view.angle);
            }
        }
        self.secondary = surface;
        self.needs_secondary = false;
        self.texture_stale = true;
        self.recompute_count += 1;
    }

    pub fn secondary(&self) -> &Surface {
        &self.secondary
    }

    /// Upload (or re-upload) the secondary surface and return the texture.
    /// Only the render pass calls this; it needs a live GPU context.
    pub fn texture(&mut self) -> &Texture2D {
        if self.texture_stale {
            self.texture = None;
            self.texture_stale = false;
        }
        let secondary = &self.secondary;
        self.texture.get_or_insert_with(|| {
            Texture2D::from_rgba8(
                secondary.width as u16,
                secondary.height as u16,
                &secondary.pixels,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(width: u32, height: u32, rgb: (u8, u8, u8)) -> Surface {
        let mut s = Surface::new(width, height);
        s.fill(rgb);
        s
    }

    #[test]
    fn test_new_surface_is_transparent() {
        let s = Surface::new(4, 4);
        assert!(s.pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_degenerate_dimensions_are_bumped() {
        let s = Surface::new(0, 0);
        assert_eq!((s.width, s.height), (1, 1));
    }

    #[test]
    fn test_apply_opacity_scales_alpha() {
        let mut s = opaque(2, 2, (10, 20, 30));
        s.apply_opacity(50.0);
        assert_eq!(s.pixels[3], 128);
        // color channels untouched
        assert_eq!(&s.pixels[0..3], &[10, 20, 30]);
    }

    #[test]
    fn test_scaled_dimensions() {
        let s = opaque(10, 20, (0, 0, 0));
        let half = s.scaled(50.0);
        assert_eq!((half.width, half.height), (5, 10));
        let same = s.scaled(100.0);
        assert_eq!((same.width, same.height), (10, 20));
    }

    #[test]
    fn test_scaled_to_zero_does_not_panic() {
        let s = opaque(10, 10, (0, 0, 0));
        let tiny = s.scaled(0.0);
        assert_eq!((tiny.width, tiny.height), (1, 1));
    }

    #[test]
    fn test_rotated_quarter_turn_swaps_dimensions() {
        let s = opaque(10, 4, (200, 0, 0));
        let r = s.rotated(90.0);
        assert_eq!((r.width, r.height), (4, 10));
        // content survives: some pixel is still red
        assert!(r.pixels.chunks_exact(4).any(|p| p == [200, 0, 0, 255]));
    }

    #[test]
    fn test_rotated_expands_bounds() {
        let s = opaque(10, 10, (0, 0, 0));
        let r = s.rotated(45.0);
        assert!(r.width > 10 && r.height > 10);
    }

    #[test]
    fn test_rotated_full_turn_is_identity() {
        let s = opaque(6, 3, (1, 2, 3));
        let r = s.rotated(360.0);
        assert_eq!(r, s);
    }

    #[test]
    fn test_fill_circle_stays_inside_radius() {
        let mut s = Surface::new(21, 21);
        s.fill_circle(10, 10, 5, (255, 255, 255));
        assert_eq!(s.get_pixel(10, 10), [255, 255, 255, 255]);
        // corner well outside the radius stays transparent
        assert_eq!(s.get_pixel(0, 0), [0, 0, 0, 0]);
    }

    fn plain_view() -> ViewTransform {
        ViewTransform {
            size: 100.0,
            angle: 0.0,
            transparency: 100.0,
        }
    }

    #[test]
    fn test_refresh_is_idempotent_without_writes() {
        let mut cache = SurfaceCache::new(opaque(4, 4, (9, 9, 9)));
        cache.refresh(plain_view(), false, || None);
        assert_eq!(cache.recompute_count, 1);

        // repeated reads without intervening writes do no work
        cache.refresh(plain_view(), false, || None);
        cache.refresh(plain_view(), false, || None);
        assert_eq!(cache.recompute_count, 1);
    }

    #[test]
    fn test_each_dirtying_write_schedules_one_recompute() {
        let mut cache = SurfaceCache::new(opaque(4, 4, (9, 9, 9)));
        cache.refresh(plain_view(), false, || None);
        cache.mark_secondary_dirty();
        cache.mark_secondary_dirty(); // second write before refresh coalesces
        cache.refresh(plain_view(), false, || None);
        assert_eq!(cache.recompute_count, 2);
    }

    #[test]
    fn test_primary_recompute_forces_secondary() {
        let mut cache = SurfaceCache::new(opaque(4, 4, (9, 9, 9)));
        cache.refresh(plain_view(), false, || None);
        cache.mark_primary_dirty();
        cache.refresh(plain_view(), false, || Some(opaque(8, 8, (1, 1, 1))));
        assert_eq!(cache.secondary().width, 8);
    }

    #[test]
    fn test_failed_primary_recompute_keeps_previous_surface() {
        let mut cache = SurfaceCache::new(opaque(4, 4, (9, 9, 9)));
        cache.refresh(plain_view(), false, || None);
        cache.mark_primary_dirty();
        cache.refresh(plain_view(), false, || None);
        assert_eq!(cache.secondary().width, 4);
        assert_eq!(cache.secondary().pixels[0], 9);
    }

    #[test]
    fn test_transparency_only_skips_geometry() {
        let mut cache = SurfaceCache::new(opaque(10, 4, (9, 9, 9)));
        let view = ViewTransform {
            size: 50.0,
            angle: 90.0,
            transparency: 50.0,
        };
        cache.refresh(view, true, || None);
        assert_eq!((cache.secondary().width, cache.secondary().height), (10, 4));
        assert_eq!(cache.secondary().pixels[3], 128);
    }
}
