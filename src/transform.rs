//! Affine mapping between the physical display and logical canvas space.

use crate::error::{PadError, PadResult, check_dims};
use crate::stroke::Point;

/// Row-major 2x3 affine matrix: `x' = a*x + b*y + c`, `y' = d*x + e*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    pub fn post_scale(mut self, sx: f32, sy: f32) -> Self {
        self.a *= sx;
        self.b *= sx;
        self.c *= sx;
        self.d *= sy;
        self.e *= sy;
        self.f *= sy;
        self
    }

    pub fn post_translate(mut self, tx: f32, ty: f32) -> Self {
        self.c += tx;
        self.f += ty;
        self
    }

    /// Rotate about the origin; positive degrees turn +x toward +y.
    pub fn post_rotate(self, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos * self.a - sin * self.d,
            b: cos * self.b - sin * self.e,
            c: cos * self.c - sin * self.f,
            d: sin * self.a + cos * self.d,
            e: sin * self.b + cos * self.e,
            f: sin * self.c + cos * self.f,
        }
    }

    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Affine {
            a: self.e / det,
            b: -self.b / det,
            c: (self.b * self.f - self.c * self.e) / det,
            d: -self.d / det,
            e: self.a / det,
            f: (self.c * self.d - self.a * self.f) / det,
        })
    }

    pub fn map(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.b * p.y + self.c,
            y: self.d * p.x + self.e * p.y + self.f,
        }
    }
}

/// General source-to-destination frame transform.
///
/// A non-zero `rotation` (degrees) spins the source about its centre and the
/// result is re-centred on the destination. For odd multiples of 90 the
/// source width and height swap before the per-axis factors are computed.
/// With `maintain_aspect` the larger factor is applied to both axes, so the
/// destination is filled and overflow is cropped; otherwise each axis is
/// stretched independently.
pub fn frame_transform(
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    rotation: i32,
    maintain_aspect: bool,
) -> PadResult<Affine> {
    check_dims("source", src_w as f32, src_h as f32)?;
    check_dims("destination", dst_w as f32, dst_h as f32)?;

    let mut m = Affine::IDENTITY;
    if rotation != 0 {
        m = m
            .post_translate(-(src_w as f32) / 2.0, -(src_h as f32) / 2.0)
            .post_rotate(rotation as f32);
    }

    let transpose = (rotation.unsigned_abs() + 90) % 180 == 0;
    let (in_w, in_h) = if transpose { (src_h, src_w) } else { (src_w, src_h) };

    if in_w != dst_w || in_h != dst_h {
        let sx = dst_w as f32 / in_w as f32;
        let sy = dst_h as f32 / in_h as f32;
        m = if maintain_aspect {
            let s = sx.max(sy);
            m.post_scale(s, s)
        } else {
            m.post_scale(sx, sy)
        };
    }

    if rotation != 0 {
        m = m.post_translate(dst_w as f32 / 2.0, dst_h as f32 / 2.0);
    }
    Ok(m)
}

/// Cached centred "fit" transform between the display and the logical canvas.
///
/// A rejected `recompute` leaves the mapper unusable until a later one
/// succeeds; `ensure_usable` reports the rejected size meanwhile.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    forward: Affine,
    inverse: Affine,
    scale: f32,
    rejected: Option<(f32, f32)>,
}

impl CoordinateMapper {
    pub fn new(display_w: f32, display_h: f32, logical_w: f32, logical_h: f32) -> PadResult<Self> {
        let mut mapper = Self {
            forward: Affine::IDENTITY,
            inverse: Affine::IDENTITY,
            scale: 1.0,
            rejected: None,
        };
        mapper.recompute(display_w, display_h, logical_w, logical_h)?;
        Ok(mapper)
    }

    /// Uniform scale `min(dw/lw, dh/lh)`, then translate so the canvas is centred.
    pub fn recompute(
        &mut self,
        display_w: f32,
        display_h: f32,
        logical_w: f32,
        logical_h: f32,
    ) -> PadResult<()> {
        match fit(display_w, display_h, logical_w, logical_h) {
            Ok((forward, inverse, scale)) => {
                self.forward = forward;
                self.inverse = inverse;
                self.scale = scale;
                self.rejected = None;
                Ok(())
            }
            Err(e) => {
                self.rejected = Some((display_w, display_h));
                Err(e)
            }
        }
    }

    pub fn ensure_usable(&self) -> PadResult<()> {
        match self.rejected {
            Some((width, height)) => Err(PadError::InvalidDimension {
                what: "display",
                width,
                height,
            }),
            None => Ok(()),
        }
    }

    pub fn to_logical(&self, physical: Point) -> Point {
        self.inverse.map(physical)
    }

    pub fn to_physical(&self, logical: Point) -> Point {
        self.forward.map(logical)
    }

    pub fn inverse(&self) -> &Affine {
        &self.inverse
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

fn fit(
    display_w: f32,
    display_h: f32,
    logical_w: f32,
    logical_h: f32,
) -> PadResult<(Affine, Affine, f32)> {
    check_dims("display", display_w, display_h)?;
    check_dims("logical", logical_w, logical_h)?;

    let scale = (display_w / logical_w).min(display_h / logical_h);
    let dx = display_w / 2.0 - logical_w * scale / 2.0;
    let dy = display_h / 2.0 - logical_h * scale / 2.0;

    let forward = Affine::IDENTITY.post_scale(scale, scale).post_translate(dx, dy);
    let inverse = forward.invert().ok_or(PadError::InvalidDimension {
        what: "display",
        width: display_w,
        height: display_h,
    })?;
    Ok((forward, inverse, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point, eps: f32) -> bool {
        (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps
    }

    #[test]
    fn fit_is_centred_on_the_short_axis() {
        let m = CoordinateMapper::new(1080.0, 1920.0, 28.0, 28.0).unwrap();
        let scale = 1080.0 / 28.0;
        assert!((m.scale() - scale).abs() < 1e-4);
        let origin = m.to_physical(Point::new(0.0, 0.0));
        assert!(close(origin, Point::new(0.0, (1920.0 - 1080.0) / 2.0), 1e-3));
        let centre = m.to_logical(Point::new(540.0, 960.0));
        assert!(close(centre, Point::new(14.0, 14.0), 1e-4));
    }

    #[test]
    fn round_trip_holds_for_various_sizes() {
        let sizes = [
            (560.0, 560.0, 28.0, 28.0),
            (1080.0, 1920.0, 28.0, 28.0),
            (800.0, 333.0, 28.0, 40.0),
            (3.0, 7.0, 100.0, 50.0),
        ];
        for (dw, dh, lw, lh) in sizes {
            let m = CoordinateMapper::new(dw, dh, lw, lh).unwrap();
            for i in 0..=10 {
                for j in 0..=10 {
                    let p = Point::new(dw * i as f32 / 10.0, dh * j as f32 / 10.0);
                    let back = m.to_physical(m.to_logical(p));
                    assert!(close(p, back, 1e-3 * dw.max(dh)), "{p:?} -> {back:?}");
                }
            }
        }
    }

    #[test]
    fn rejected_size_leaves_mapper_unusable_until_corrected() {
        let mut m = CoordinateMapper::new(560.0, 560.0, 28.0, 28.0).unwrap();
        assert!(m.ensure_usable().is_ok());
        assert!(matches!(
            m.recompute(0.0, 560.0, 28.0, 28.0),
            Err(PadError::InvalidDimension { what: "display", .. })
        ));
        assert!(matches!(
            m.ensure_usable(),
            Err(PadError::InvalidDimension { width, .. }) if width == 0.0
        ));
        assert!(matches!(
            m.recompute(560.0, 560.0, 28.0, -1.0),
            Err(PadError::InvalidDimension { what: "logical", .. })
        ));
        assert!(m.ensure_usable().is_err());

        m.recompute(280.0, 280.0, 28.0, 28.0).unwrap();
        assert!(m.ensure_usable().is_ok());
        assert!((m.scale() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn frame_transform_without_rotation_stretches_per_axis() {
        let m = frame_transform(100, 50, 200, 200, 0, false).unwrap();
        let p = m.map(Point::new(100.0, 50.0));
        assert!(close(p, Point::new(200.0, 200.0), 1e-4));
    }

    #[test]
    fn frame_transform_keeps_aspect_by_filling() {
        let m = frame_transform(100, 50, 200, 200, 0, true).unwrap();
        // larger factor (4.0) on both axes
        let p = m.map(Point::new(100.0, 50.0));
        assert!(close(p, Point::new(400.0, 200.0), 1e-4));
    }

    #[test]
    fn frame_transform_identity_when_sizes_match() {
        let m = frame_transform(64, 48, 64, 48, 0, true).unwrap();
        assert_eq!(m, Affine::IDENTITY);
    }

    #[test]
    fn quarter_turn_swaps_axes_before_scaling() {
        // 100x50 turned 90 degrees is 50x100, which already matches the destination
        let m = frame_transform(100, 50, 50, 100, 90, false).unwrap();
        let centre = m.map(Point::new(50.0, 25.0));
        assert!(close(centre, Point::new(25.0, 50.0), 1e-4));
        let corner = m.map(Point::new(0.0, 0.0));
        assert!(close(corner, Point::new(50.0, 0.0), 1e-4));
    }

    #[test]
    fn half_turn_does_not_swap() {
        let m = frame_transform(100, 50, 200, 100, 180, false).unwrap();
        let corner = m.map(Point::new(0.0, 0.0));
        assert!(close(corner, Point::new(200.0, 100.0), 1e-3));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = Affine::IDENTITY.post_scale(0.0, 1.0);
        assert!(m.invert().is_none());
    }
}
