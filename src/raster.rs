//! Offscreen raster surface and the brush that paints strokes onto it.

use image::{Rgba, RgbaImage};
use log::debug;

use crate::error::{PadError, PadResult, check_dims};
use crate::stroke::{Point, Stroke, StrokeModel};
use crate::transform::{Affine, CoordinateMapper, frame_transform};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

// segments per flattened corner curve
const CORNER_STEPS: usize = 8;

/// Round-capped, round-joined, antialiased pen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub width: f32,
    pub corner_radius: f32,
    /// Must be darker than `background` on every channel.
    pub ink: Rgba<u8>,
    pub background: Rgba<u8>,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            width: 20.0,
            corner_radius: 50.0,
            ink: BLACK,
            background: WHITE,
        }
    }
}

#[derive(Debug)]
pub struct Rasterizer {
    width: u32,
    height: u32,
    brush: Brush,
    surface: Option<RgbaImage>,
    drawn: usize,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32, brush: Brush) -> PadResult<Self> {
        check_dims("surface", width as f32, height as f32)?;
        Ok(Self {
            width,
            height,
            brush,
            surface: None,
            drawn: 0,
        })
    }

    /// Allocate a fresh blank surface, dropping any previous one.
    pub fn activate(&mut self) {
        self.surface = Some(RgbaImage::from_pixel(
            self.width,
            self.height,
            self.brush.background,
        ));
        self.drawn = 0;
        debug!("raster surface {}x{} created", self.width, self.height);
    }

    pub fn deactivate(&mut self) {
        if self.surface.take().is_some() {
            debug!("raster surface released");
        }
        self.drawn = 0;
    }

    /// Blank the surface. Without a surface only the bookkeeping is reset.
    pub fn reset(&mut self) {
        self.drawn = 0;
        if let Some(img) = self.surface.as_mut() {
            for px in img.pixels_mut() {
                *px = self.brush.background;
            }
        }
    }

    /// Strokes already baked into the surface.
    #[cfg(test)]
    pub fn drawn_strokes(&self) -> usize {
        self.drawn
    }

    /// Paint strokes `start..` of `model`; earlier strokes are assumed present.
    pub fn render_incremental(&mut self, model: &StrokeModel, start: usize) -> PadResult<usize> {
        if (model.width(), model.height()) != (self.width, self.height) {
            return Err(PadError::InvalidState("model and surface sizes differ"));
        }
        let brush = self.brush;
        let img = self.surface.as_mut().ok_or(PadError::SurfaceNotReady)?;

        let mut painted = 0;
        for stroke in model.strokes_from(start) {
            paint_stroke(img, &brush, stroke);
            painted += 1;
        }
        self.drawn = model.stroke_count();
        if painted > 0 {
            debug!("repainted strokes {start}..{}", self.drawn);
        }
        Ok(painted)
    }

    /// Repaint from the last baked stroke, which may still be growing.
    pub fn refresh(&mut self, model: &StrokeModel) -> PadResult<usize> {
        let start = self.drawn.saturating_sub(1);
        self.render_incremental(model, start)
    }

    pub fn current_pixels(&self) -> PadResult<&RgbaImage> {
        self.surface.as_ref().ok_or(PadError::SurfaceNotReady)
    }

    /// Blit the surface into a display buffer through the mapper's fit transform.
    /// Display pixels outside the fitted canvas are left as they are.
    pub fn composite(&self, mapper: &CoordinateMapper, display: &mut RgbaImage) -> PadResult<()> {
        mapper.ensure_usable()?;
        warp(self.current_pixels()?, mapper.inverse(), display);
        Ok(())
    }

    /// Copy of the surface turned by `rotation` degrees, filling the turned frame.
    pub fn rotated(&self, rotation: i32) -> PadResult<RgbaImage> {
        let img = self.current_pixels()?;
        let (w, h) = img.dimensions();
        let (out_w, out_h) = if (rotation.unsigned_abs() + 90) % 180 == 0 {
            (h, w)
        } else {
            (w, h)
        };
        let inv = frame_transform(w, h, out_w, out_h, rotation, true)?
            .invert()
            .ok_or(PadError::InvalidState("rotation is not invertible"))?;
        let mut out = RgbaImage::from_pixel(out_w, out_h, self.brush.background);
        warp(img, &inv, &mut out);
        Ok(out)
    }
}

/// Nearest-sample `src` into `dst`, `inverse` taking dst coordinates to src.
fn warp(src: &RgbaImage, inverse: &Affine, dst: &mut RgbaImage) {
    let (w, h) = (src.width() as f32, src.height() as f32);
    for (x, y, px) in dst.enumerate_pixels_mut() {
        let l = inverse.map(Point::new(x as f32 + 0.5, y as f32 + 0.5));
        if l.x < 0.0 || l.y < 0.0 || l.x >= w || l.y >= h {
            continue;
        }
        *px = *src.get_pixel(l.x as u32, l.y as u32);
    }
}

fn paint_stroke(img: &mut RgbaImage, brush: &Brush, stroke: &Stroke) {
    let path = smooth_corners(stroke.points(), brush.corner_radius);
    let (w, h) = img.dimensions();
    let mut coverage = vec![0.0f32; (w as usize) * (h as usize)];
    let half = brush.width / 2.0;

    if path.len() == 1 {
        cover_segment(&mut coverage, w, h, path[0], path[0], half);
    }
    for seg in path.windows(2) {
        cover_segment(&mut coverage, w, h, seg[0], seg[1], half);
    }

    for (i, &cov) in coverage.iter().enumerate() {
        if cov <= 0.0 {
            continue;
        }
        let x = (i % w as usize) as u32;
        let y = (i / w as usize) as u32;
        let px = img.get_pixel_mut(x, y);
        for c in 0..4 {
            let bg = brush.background.0[c] as f32;
            let ink = brush.ink.0[c] as f32;
            let target = (bg + (ink - bg) * cov).round() as u8;
            // darken only, so repainting a stroke is idempotent
            px.0[c] = px.0[c].min(target);
        }
    }
}

/// Coverage of a capsule of radius `half` around segment `p..q`, max-combined.
fn cover_segment(coverage: &mut [f32], w: u32, h: u32, p: Point, q: Point, half: f32) {
    let reach = half + 1.0;
    let x0 = (p.x.min(q.x) - reach).floor().max(0.0) as i64;
    let y0 = (p.y.min(q.y) - reach).floor().max(0.0) as i64;
    let x1 = ((p.x.max(q.x) + reach).ceil() as i64).min(w as i64 - 1);
    let y1 = ((p.y.max(q.y) + reach).ceil() as i64).min(h as i64 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let c = Point::new(x as f32 + 0.5, y as f32 + 0.5);
            let cov = (half + 0.5 - distance_to_segment(c, p, q)).clamp(0.0, 1.0);
            let idx = y as usize * w as usize + x as usize;
            if cov > coverage[idx] {
                coverage[idx] = cov;
            }
        }
    }
}

fn distance_to_segment(c: Point, p: Point, q: Point) -> f32 {
    let (vx, vy) = (q.x - p.x, q.y - p.y);
    let len2 = vx * vx + vy * vy;
    if len2 == 0.0 {
        return c.distance(p);
    }
    let t = (((c.x - p.x) * vx + (c.y - p.y) * vy) / len2).clamp(0.0, 1.0);
    c.distance(Point::new(p.x + vx * t, p.y + vy * t))
}

/// Replace each interior vertex by a quadratic curve whose ends sit at most
/// `radius` (and at most half a segment) away from the vertex.
pub fn smooth_corners(points: &[Point], radius: f32) -> Vec<Point> {
    if points.len() < 3 || radius <= 0.0 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len() * CORNER_STEPS);
    out.push(points[0]);

    for i in 1..points.len() - 1 {
        let (prev, v, next) = (points[i - 1], points[i], points[i + 1]);
        let a = toward(v, prev, radius.min(v.distance(prev) / 2.0));
        let b = toward(v, next, radius.min(v.distance(next) / 2.0));
        for s in 0..=CORNER_STEPS {
            let t = s as f32 / CORNER_STEPS as f32;
            let u = 1.0 - t;
            out.push(Point::new(
                u * u * a.x + 2.0 * u * t * v.x + t * t * b.x,
                u * u * a.y + 2.0 * u * t * v.y + t * t * b.y,
            ));
        }
    }
    out.push(points[points.len() - 1]);
    out
}

fn toward(from: Point, to: Point, dist: f32) -> Point {
    let len = from.distance(to);
    if len == 0.0 {
        return from;
    }
    let t = dist / len;
    Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}
