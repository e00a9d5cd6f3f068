use rayon::prelude::*;

use super::color::Rgba8;
use super::surface::Surface;

/// Strength of the soft halo drawn around glowing strokes.
const GLOW_ALPHA: f32 = 0.35;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A resolution-independent drawing instruction produced by a visual style.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba8,
        alpha: f32,
    },
    StrokePath {
        points: Vec<Point>,
        closed: bool,
        width: f32,
        color: Rgba8,
        alpha: f32,
        /// Halo radius in pixels; 0 disables the glow pass.
        glow: f32,
    },
    FillCircle {
        center: Point,
        radius: f32,
        color: Rgba8,
        alpha: f32,
    },
}

/// Software rasterizer over a [`Surface`].
///
/// Coverage is computed from the distance between each pixel center and the
/// shape, which gives one pixel of anti-aliasing on every edge.
pub struct Canvas<'a> {
    surface: &'a mut Surface,
}

impl<'a> Canvas<'a> {
    pub fn new(surface: &'a mut Surface) -> Self {
        Self { surface }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn clear(&mut self, color: Rgba8) {
        self.surface.fill(color);
    }

    pub fn execute_all(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            self.execute(command);
        }
    }

    pub fn execute(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::FillRect { x, y, width, height, color, alpha } => {
                self.fill_rect(*x, *y, *width, *height, *color, *alpha)
            }
            DrawCommand::StrokePath { points, closed, width, color, alpha, glow } => {
                self.stroke_path(points, *closed, *width, *color, *alpha, *glow)
            }
            DrawCommand::FillCircle { center, radius, color, alpha } => {
                self.fill_circle(*center, *radius, *color, *alpha)
            }
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba8, alpha: f32) {
        if width <= 0.0 || height <= 0.0 || alpha <= 0.0 || self.surface.is_empty() {
            return;
        }
        // A pixel is inside when its center is inside.
        let (sw, sh) = self.surface.dimensions();
        let x0 = pixel_floor(x, sw);
        let x1 = pixel_floor(x + width, sw);
        let y0 = pixel_floor(y, sh);
        let y1 = pixel_floor(y + height, sh);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let row_len = sw as usize;
        self.surface
            .pixels_mut()
            .par_chunks_mut(row_len)
            .skip(y0)
            .take(y1 - y0)
            .for_each(|row| {
                for px in &mut row[x0..x1] {
                    *px = color.blend_over(*px, alpha);
                }
            });
    }

    pub fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba8, alpha: f32) {
        if radius <= 0.0 || alpha <= 0.0 || self.surface.is_empty() {
            return;
        }
        let Some(bounds) = self.clip_bounds(center.x - radius - 1.0, center.y - radius - 1.0, center.x + radius + 1.0, center.y + radius + 1.0) else {
            return;
        };
        let width = self.surface.width() as usize;
        let pixels = self.surface.pixels_mut();
        for py in bounds.y0..bounds.y1 {
            let cy = py as f32 + 0.5;
            for px in bounds.x0..bounds.x1 {
                let cx = px as f32 + 0.5;
                let d = ((cx - center.x).powi(2) + (cy - center.y).powi(2)).sqrt();
                let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    let idx = py * width + px;
                    pixels[idx] = color.blend_over(pixels[idx], coverage * alpha);
                }
            }
        }
    }

    pub fn stroke_path(
        &mut self,
        points: &[Point],
        closed: bool,
        line_width: f32,
        color: Rgba8,
        alpha: f32,
        glow: f32,
    ) {
        if points.len() < 2 || line_width <= 0.0 || alpha <= 0.0 || self.surface.is_empty() {
            return;
        }
        let half = line_width * 0.5;
        let reach = half + glow.max(0.0) + 1.0;
        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(a, b, c, d), p| (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
        );
        let Some(bounds) = self.clip_bounds(min_x - reach, min_y - reach, max_x + reach, max_y + reach) else {
            return;
        };

        let mut core = CoverageMask::new(bounds);
        let mut halo = (glow > 0.0).then(|| CoverageMask::new(bounds));

        let segment_count = if closed { points.len() } else { points.len() - 1 };
        for i in 0..segment_count {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            rasterize_segment(a, b, reach, &bounds, |px, py, d| {
                core.accumulate(px, py, (half + 0.5 - d).clamp(0.0, 1.0));
                if let Some(halo) = halo.as_mut() {
                    let falloff = 1.0 - ((d - half).max(0.0) / glow);
                    halo.accumulate(px, py, falloff.clamp(0.0, 1.0) * GLOW_ALPHA);
                }
            });
        }

        if let Some(halo) = halo {
            halo.blend_into(self.surface, color, alpha);
        }
        core.blend_into(self.surface, color, alpha);
    }

    fn clip_bounds(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<PixelBounds> {
        let (w, h) = self.surface.dimensions();
        let bounds = PixelBounds {
            x0: x0.floor().clamp(0.0, w as f32) as usize,
            y0: y0.floor().clamp(0.0, h as f32) as usize,
            x1: x1.ceil().clamp(0.0, w as f32) as usize,
            y1: y1.ceil().clamp(0.0, h as f32) as usize,
        };
        (bounds.x0 < bounds.x1 && bounds.y0 < bounds.y1).then_some(bounds)
    }
}

/// Index of the first pixel whose center lies at or beyond `edge`.
fn pixel_floor(edge: f32, limit: u32) -> usize {
    (edge - 0.5).ceil().clamp(0.0, limit as f32) as usize
}

#[derive(Clone, Copy, Debug)]
struct PixelBounds {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

/// Per-path coverage so overlapping segments of one stroke blend once.
struct CoverageMask {
    bounds: PixelBounds,
    values: Vec<f32>,
}

impl CoverageMask {
    fn new(bounds: PixelBounds) -> Self {
        let len = (bounds.x1 - bounds.x0) * (bounds.y1 - bounds.y0);
        Self { bounds, values: vec![0.0; len] }
    }

    fn accumulate(&mut self, px: usize, py: usize, coverage: f32) {
        let stride = self.bounds.x1 - self.bounds.x0;
        let idx = (py - self.bounds.y0) * stride + (px - self.bounds.x0);
        if coverage > self.values[idx] {
            self.values[idx] = coverage;
        }
    }

    fn blend_into(&self, surface: &mut Surface, color: Rgba8, alpha: f32) {
        let stride = self.bounds.x1 - self.bounds.x0;
        let width = surface.width() as usize;
        let pixels = surface.pixels_mut();
        for (row, values) in self.values.chunks(stride).enumerate() {
            let base = (self.bounds.y0 + row) * width + self.bounds.x0;
            for (col, &coverage) in values.iter().enumerate() {
                if coverage > 0.0 {
                    let idx = base + col;
                    pixels[idx] = color.blend_over(pixels[idx], coverage * alpha);
                }
            }
        }
    }
}

/// Visits every pixel within `reach` of segment `a`-`b`, passing the distance
/// from the pixel center to the segment.
fn rasterize_segment(
    a: Point,
    b: Point,
    reach: f32,
    clip: &PixelBounds,
    mut visit: impl FnMut(usize, usize, f32),
) {
    let y_lo = ((a.y.min(b.y) - reach).floor().max(clip.y0 as f32)) as usize;
    let y_hi = ((a.y.max(b.y) + reach).ceil().min(clip.y1 as f32)) as usize;
    let seg_x0 = a.x.min(b.x) - reach;
    let seg_x1 = a.x.max(b.x) + reach;
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let len = len_sq.sqrt();

    for py in y_lo..y_hi {
        let cy = py as f32 + 0.5;
        // Narrow each row to the band around the centerline; near-horizontal
        // segments just use the segment's box.
        let (mut row_x0, mut row_x1) = (seg_x0, seg_x1);
        if dy.abs() > 1e-3 {
            let center_x = a.x + (cy - a.y) * dx / dy;
            let extent = reach * (len / dy.abs() + 1.0);
            row_x0 = row_x0.max(center_x - extent);
            row_x1 = row_x1.min(center_x + extent);
        }
        let x_lo = (row_x0.floor().max(clip.x0 as f32)) as usize;
        let x_hi = (row_x1.ceil().min(clip.x1 as f32)) as usize;
        for px in x_lo..x_hi {
            let cx = px as f32 + 0.5;
            let t = if len_sq > 0.0 {
                (((cx - a.x) * dx + (cy - a.y) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let nx = a.x + t * dx - cx;
            let ny = a.y + t * dy - cy;
            let d = (nx * nx + ny * ny).sqrt();
            if d < reach {
                visit(px, py, d);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: Rgba8 = Rgba8::opaque(0, 0, 0);
    const FG: Rgba8 = Rgba8::opaque(255, 0, 0);

    fn blank(w: u32, h: u32) -> Surface {
        let mut s = Surface::new(w, h);
        s.fill(BG);
        s
    }

    #[test]
    fn fill_rect_covers_pixel_centers_only() {
        let mut surface = blank(10, 10);
        Canvas::new(&mut surface).fill_rect(2.0, 3.0, 4.0, 5.0, FG, 1.0);
        assert_eq!(surface.pixel(2, 3), Some(FG));
        assert_eq!(surface.pixel(5, 7), Some(FG));
        assert_eq!(surface.pixel(6, 7), Some(BG));
        assert_eq!(surface.pixel(5, 8), Some(BG));
        assert_eq!(surface.pixel(1, 3), Some(BG));
    }

    #[test]
    fn fill_rect_clips_to_surface() {
        let mut surface = blank(4, 4);
        Canvas::new(&mut surface).fill_rect(-10.0, -10.0, 100.0, 100.0, FG, 1.0);
        assert!(surface.pixels().iter().all(|p| *p == FG));
    }

    #[test]
    fn circle_is_solid_at_center_and_absent_outside() {
        let mut surface = blank(20, 20);
        Canvas::new(&mut surface).fill_circle(Point::new(10.0, 10.0), 4.0, FG, 1.0);
        assert_eq!(surface.pixel(10, 10), Some(FG));
        assert_eq!(surface.pixel(0, 0), Some(BG));
        assert_eq!(surface.pixel(10, 16), Some(BG));
    }

    #[test]
    fn stroke_draws_along_the_segment() {
        let mut surface = blank(20, 10);
        let points = [Point::new(2.0, 5.0), Point::new(18.0, 5.0)];
        Canvas::new(&mut surface).stroke_path(&points, false, 2.0, FG, 1.0, 0.0);
        assert_eq!(surface.pixel(10, 4), Some(FG));
        assert_eq!(surface.pixel(10, 5), Some(FG));
        assert_eq!(surface.pixel(10, 8), Some(BG));
    }

    #[test]
    fn diagonal_stroke_reaches_both_ends() {
        let mut surface = blank(32, 32);
        let points = [Point::new(2.0, 2.0), Point::new(30.0, 30.0)];
        Canvas::new(&mut surface).stroke_path(&points, false, 3.0, FG, 1.0, 0.0);
        assert_eq!(surface.pixel(2, 2), Some(FG));
        assert_eq!(surface.pixel(16, 16), Some(FG));
        assert_eq!(surface.pixel(29, 29), Some(FG));
        assert_eq!(surface.pixel(30, 2), Some(BG));
    }

    #[test]
    fn glow_tints_pixels_beyond_the_core() {
        let mut plain = blank(20, 20);
        let mut glowing = blank(20, 20);
        let points = [Point::new(0.0, 10.0), Point::new(20.0, 10.0)];
        Canvas::new(&mut plain).stroke_path(&points, false, 1.0, FG, 1.0, 0.0);
        Canvas::new(&mut glowing).stroke_path(&points, false, 1.0, FG, 1.0, 5.0);
        assert_eq!(plain.pixel(10, 13), Some(BG));
        assert!(glowing.pixel(10, 13).unwrap().r > 0);
    }

    #[test]
    fn zero_alpha_draws_nothing() {
        let mut surface = blank(8, 8);
        let mut canvas = Canvas::new(&mut surface);
        canvas.fill_rect(0.0, 0.0, 8.0, 8.0, FG, 0.0);
        canvas.fill_circle(Point::new(4.0, 4.0), 3.0, FG, 0.0);
        assert!(surface.pixels().iter().all(|p| *p == BG));
    }
}
