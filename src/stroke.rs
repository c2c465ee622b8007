//! Vector model of the strokes drawn in one attempt.

use log::debug;

use crate::error::{PadError, PadResult, check_dims};

/// A position in logical (model) space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One pointer-down..pointer-up gesture. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    fn starting_at(p: Point) -> Self {
        Self { points: vec![p] }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

#[derive(Debug, Clone)]
pub struct StrokeModel {
    width: u32,
    height: u32,
    closed: Vec<Stroke>,
    open: Option<Stroke>,
}

impl StrokeModel {
    pub fn new(width: u32, height: u32) -> PadResult<Self> {
        check_dims("logical", width as f32, height as f32)?;
        Ok(Self {
            width,
            height,
            closed: Vec::new(),
            open: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_drawing(&self) -> bool {
        self.open.is_some()
    }

    pub fn start_stroke(&mut self, p: Point) -> PadResult<()> {
        if self.open.is_some() {
            return Err(PadError::InvalidState("a stroke is already open"));
        }
        debug!("stroke #{} started at ({:.2}, {:.2})", self.closed.len(), p.x, p.y);
        self.open = Some(Stroke::starting_at(p));
        Ok(())
    }

    pub fn append_point(&mut self, p: Point) {
        if let Some(s) = self.open.as_mut() {
            s.points.push(p);
        }
    }

    pub fn end_stroke(&mut self) {
        if let Some(s) = self.open.take() {
            debug!("stroke #{} closed with {} points", self.closed.len(), s.len());
            self.closed.push(s);
        }
    }

    pub fn clear(&mut self) {
        self.closed.clear();
        self.open = None;
    }

    /// Closed strokes plus the open one, if any. The open stroke is always last.
    pub fn stroke_count(&self) -> usize {
        self.closed.len() + usize::from(self.open.is_some())
    }

    pub fn stroke(&self, i: usize) -> Option<&Stroke> {
        if i < self.closed.len() {
            self.closed.get(i)
        } else if i == self.closed.len() {
            self.open.as_ref()
        } else {
            None
        }
    }

    pub fn point_count_of_stroke(&self, i: usize) -> usize {
        self.stroke(i).map_or(0, Stroke::len)
    }

    pub fn strokes_from(&self, start: usize) -> impl Iterator<Item = &Stroke> {
        self.closed.iter().chain(self.open.iter()).skip(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> StrokeModel {
        StrokeModel::new(28, 28).unwrap()
    }

    #[test]
    fn completed_strokes_are_counted_once_and_keep_order() {
        let mut m = model();
        for n in 0..3 {
            m.start_stroke(Point::new(0.0, n as f32)).unwrap();
            for i in 1..=4 {
                m.append_point(Point::new(i as f32, n as f32));
            }
            m.end_stroke();
            assert_eq!(m.stroke_count(), n + 1);
        }
        let xs: Vec<f32> = m.stroke(1).unwrap().points().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.point_count_of_stroke(2), 5);
        assert_eq!(m.point_count_of_stroke(3), 0);
    }

    #[test]
    fn second_start_is_rejected() {
        let mut m = model();
        m.start_stroke(Point::new(1.0, 1.0)).unwrap();
        let err = m.start_stroke(Point::new(2.0, 2.0)).unwrap_err();
        assert!(matches!(err, PadError::InvalidState(_)));
        assert_eq!(m.stroke_count(), 1);
        assert_eq!(m.point_count_of_stroke(0), 1);
    }

    #[test]
    fn append_and_end_without_open_stroke_are_noops() {
        let mut m = model();
        m.append_point(Point::new(3.0, 3.0));
        m.end_stroke();
        assert_eq!(m.stroke_count(), 0);
    }

    #[test]
    fn clear_keeps_dimensions() {
        let mut m = model();
        m.start_stroke(Point::new(1.0, 1.0)).unwrap();
        m.end_stroke();
        m.start_stroke(Point::new(5.0, 5.0)).unwrap();
        m.clear();
        assert_eq!(m.stroke_count(), 0);
        assert!(!m.is_drawing());
        assert_eq!((m.width(), m.height()), (28, 28));
    }

    #[test]
    fn open_stroke_is_visible_last() {
        let mut m = model();
        m.start_stroke(Point::new(0.0, 0.0)).unwrap();
        m.end_stroke();
        m.start_stroke(Point::new(9.0, 9.0)).unwrap();
        let last = m.strokes_from(1).next().unwrap();
        assert_eq!(last.points()[0], Point::new(9.0, 9.0));
    }

    #[test]
    fn zero_sized_model_is_rejected() {
        assert!(matches!(
            StrokeModel::new(0, 28),
            Err(PadError::InvalidDimension { .. })
        ));
    }
}
