//! Pointer gestures to strokes, and strokes to a recognition verdict.

use image::RgbaImage;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{PadError, PadResult};
use crate::feedback::{FeedbackSink, Signal};
use crate::inference::InferencePort;
use crate::raster::{Brush, Rasterizer};
use crate::recognition::{AttemptState, Decision, Digit, RecognitionPolicy, Verdict};
use crate::stroke::{Point, StrokeModel};
use crate::tensor::{DEFAULT_INPUT_SIZE, Tensor, TensorExtractor};
use crate::transform::CoordinateMapper;

/// Raw single-pointer input in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Drawing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// Event not valid in the current phase.
    Ignored,
    Consumed,
    /// Pointer released and the drawing was classified.
    Judged(Verdict),
}

pub trait PointerSink {
    fn on_down(&mut self, x: f32, y: f32) -> PadResult<Response>;
    fn on_move(&mut self, x: f32, y: f32) -> PadResult<Response>;
    fn on_up(&mut self) -> PadResult<Response>;

    fn handle(&mut self, ev: PointerEvent) -> PadResult<Response> {
        match ev {
            PointerEvent::Down { x, y } => self.on_down(x, y),
            PointerEvent::Move { x, y } => self.on_move(x, y),
            PointerEvent::Up => self.on_up(),
        }
    }
}

pub trait Drawable {
    /// Bring the offscreen raster up to date and blit it onto `display`.
    fn paint(&mut self, display: &mut RgbaImage) -> PadResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub logical_width: u32,
    pub logical_height: u32,
    pub display_width: f32,
    pub display_height: f32,
    pub brush: Brush,
    pub input_size: u32,
    pub policy: RecognitionPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            logical_width: 28,
            logical_height: 28,
            display_width: 560.0,
            display_height: 560.0,
            brush: Brush::default(),
            input_size: DEFAULT_INPUT_SIZE,
            policy: RecognitionPolicy::default(),
        }
    }
}

pub struct GestureController<P, F> {
    phase: Phase,
    model: StrokeModel,
    raster: Rasterizer,
    mapper: CoordinateMapper,
    extractor: TensorExtractor,
    policy: RecognitionPolicy,
    attempt: AttemptState,
    target: Digit,
    port: P,
    feedback: F,
    redraw: bool,
}

impl<P: InferencePort, F: FeedbackSink> GestureController<P, F> {
    pub fn new(settings: ControllerSettings, target: Digit, port: P, feedback: F) -> PadResult<Self> {
        let model = StrokeModel::new(settings.logical_width, settings.logical_height)?;
        let raster = Rasterizer::new(
            settings.logical_width,
            settings.logical_height,
            settings.brush,
        )?;
        let mapper = CoordinateMapper::new(
            settings.display_width,
            settings.display_height,
            settings.logical_width as f32,
            settings.logical_height as f32,
        )?;
        Ok(Self {
            phase: Phase::Idle,
            model,
            raster,
            mapper,
            extractor: TensorExtractor::new(settings.input_size),
            policy: settings.policy,
            attempt: AttemptState::default(),
            target,
            port,
            feedback,
            redraw: false,
        })
    }

    /// View became visible: fresh blank surface.
    pub fn activate(&mut self) {
        self.raster.activate();
        // strokes from before a pause are baked in again on the next refresh
        self.redraw = true;
    }

    pub fn deactivate(&mut self) {
        self.raster.deactivate();
    }

    pub fn resize(&mut self, display_width: f32, display_height: f32) -> PadResult<()> {
        self.mapper.recompute(
            display_width,
            display_height,
            self.model.width() as f32,
            self.model.height() as f32,
        )?;
        self.redraw = true;
        Ok(())
    }

    /// Start drawing a new target from a clean canvas.
    pub fn begin_attempt(&mut self, target: Digit) {
        self.target = target;
        self.restart();
        self.feedback.signal(Signal::InstructionPrompt, target);
    }

    /// Forced back to idle with an empty canvas, whatever the phase.
    pub fn restart(&mut self) {
        self.phase = Phase::Idle;
        self.model.clear();
        self.raster.reset();
        self.attempt.reset();
        self.redraw = true;
        debug!("canvas restarted for target {}", self.target);
    }

    pub fn extract_tensor(&mut self) -> PadResult<Tensor> {
        self.bake();
        self.extractor.extract(self.raster.current_pixels().ok())
    }

    /// True once after anything visible changed.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target(&self) -> Digit {
        self.target
    }

    pub fn attempt(&self) -> AttemptState {
        self.attempt
    }

    pub fn model(&self) -> &StrokeModel {
        &self.model
    }

    #[cfg(test)]
    pub fn raster(&self) -> &Rasterizer {
        &self.raster
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    #[cfg(test)]
    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    fn bake(&mut self) {
        match self.raster.refresh(&self.model) {
            Ok(_) => {}
            Err(PadError::SurfaceNotReady) => trace!("render skipped, surface not ready"),
            Err(e) => debug!("render failed: {e}"),
        }
    }

    fn classify(&mut self) -> PadResult<Response> {
        let tensor = match self.extract_tensor() {
            Ok(t) => t,
            Err(PadError::SurfaceNotReady) => {
                debug!("pointer released before activation; nothing to classify");
                return Ok(Response::Consumed);
            }
            Err(e) => return Err(e),
        };

        self.port.feed(&tensor.values)?;
        self.port.run()?;
        let scores = self.port.fetch()?;

        let verdict = self.policy.judge(&scores, self.target, &mut self.attempt);
        match verdict.decision {
            Decision::Success => self.feedback.signal(Signal::Success, self.target),
            Decision::Retry { .. } => {}
            Decision::Failure => {
                self.model.clear();
                self.raster.reset();
                self.redraw = true;
                self.feedback.signal(Signal::Failure, self.target);
            }
        }
        Ok(Response::Judged(verdict))
    }
}

impl<P: InferencePort, F: FeedbackSink> PointerSink for GestureController<P, F> {
    fn on_down(&mut self, x: f32, y: f32) -> PadResult<Response> {
        if self.phase != Phase::Idle {
            trace!("down ignored while drawing");
            return Ok(Response::Ignored);
        }
        self.mapper.ensure_usable()?;
        let p = self.mapper.to_logical(Point::new(x, y));
        self.model.start_stroke(p)?;
        self.phase = Phase::Drawing;
        Ok(Response::Consumed)
    }

    fn on_move(&mut self, x: f32, y: f32) -> PadResult<Response> {
        if self.phase != Phase::Drawing {
            trace!("move ignored while idle");
            return Ok(Response::Ignored);
        }
        self.mapper.ensure_usable()?;
        let p = self.mapper.to_logical(Point::new(x, y));
        self.model.append_point(p);
        self.bake();
        self.redraw = true;
        Ok(Response::Consumed)
    }

    fn on_up(&mut self) -> PadResult<Response> {
        if self.phase != Phase::Drawing {
            trace!("up ignored while idle");
            return Ok(Response::Ignored);
        }
        self.model.end_stroke();
        self.phase = Phase::Idle;
        self.classify()
    }
}

impl<P: InferencePort, F: FeedbackSink> Drawable for GestureController<P, F> {
    fn paint(&mut self, display: &mut RgbaImage) -> PadResult<()> {
        self.bake();
        match self.raster.composite(&self.mapper, display) {
            Err(PadError::SurfaceNotReady) => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingFeedback;
    use crate::inference::ScriptedPort;
    use crate::raster::WHITE;

    type Ctl = GestureController<ScriptedPort, RecordingFeedback>;

    fn one_hot(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; 10];
        v[i] = 1.0;
        v
    }

    fn controller(target: u8, scripts: Vec<Vec<f32>>) -> Ctl {
        let mut c = GestureController::new(
            ControllerSettings::default(),
            Digit::new(target).unwrap(),
            ScriptedPort::new(scripts),
            RecordingFeedback::default(),
        )
        .unwrap();
        c.activate();
        c
    }

    fn scribble(c: &mut Ctl) -> Response {
        assert_eq!(c.on_down(100.0, 100.0).unwrap(), Response::Consumed);
        assert_eq!(c.on_move(300.0, 280.0).unwrap(), Response::Consumed);
        assert_eq!(c.on_move(420.0, 460.0).unwrap(), Response::Consumed);
        c.on_up().unwrap()
    }

    fn is_blank(c: &Ctl) -> bool {
        c.raster().current_pixels().unwrap().pixels().all(|p| *p == WHITE)
    }

    #[test]
    fn events_outside_drawing_are_ignored() {
        let mut c = controller(1, vec![]);
        assert_eq!(c.on_move(1.0, 1.0).unwrap(), Response::Ignored);
        assert_eq!(c.on_up().unwrap(), Response::Ignored);
        c.on_down(5.0, 5.0).unwrap();
        assert_eq!(c.on_down(6.0, 6.0).unwrap(), Response::Ignored);
        assert_eq!(c.model().stroke_count(), 1);
    }

    #[test]
    fn pointer_positions_land_in_logical_space() {
        let mut c = controller(1, vec![]);
        c.on_down(280.0, 280.0).unwrap();
        c.on_move(560.0, 0.0).unwrap();
        let pts = c.model().stroke(0).unwrap().points().to_vec();
        assert_eq!(pts.len(), 2);
        assert!(pts[0].distance(Point::new(14.0, 14.0)) < 1e-4);
        assert!(pts[1].distance(Point::new(28.0, 0.0)) < 1e-4);
        assert!(c.take_redraw());
        assert!(!c.take_redraw());
    }

    #[test]
    fn three_misses_fire_one_failure_and_clear_everything() {
        let mut c = controller(5, vec![one_hot(2), one_hot(2), one_hot(2)]);

        for n in 1..=2 {
            let r = scribble(&mut c);
            assert!(matches!(
                r,
                Response::Judged(Verdict { decision: Decision::Retry { failures }, .. }) if failures == n
            ));
            assert_eq!(c.feedback().count(Signal::Failure), 0);
            assert!(!is_blank(&c));
        }
        assert_eq!(c.model().stroke_count(), 2);

        let r = scribble(&mut c);
        assert!(matches!(
            r,
            Response::Judged(Verdict { decision: Decision::Failure, .. })
        ));
        assert_eq!(c.model().stroke_count(), 0);
        assert!(is_blank(&c));
        assert_eq!(c.attempt().failures, 0);
        assert_eq!(c.feedback().count(Signal::Failure), 1);
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn success_keeps_the_canvas() {
        let mut c = controller(7, vec![one_hot(7)]);
        let r = scribble(&mut c);
        match r {
            Response::Judged(v) => {
                assert_eq!(v.decision, Decision::Success);
                assert_eq!(v.recognized, Some(Digit::new(7).unwrap()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.feedback().signals, vec![(Signal::Success, Digit::new(7).unwrap())]);
        assert_eq!(c.model().stroke_count(), 1);
        assert!(!is_blank(&c));
        assert_eq!(c.attempt().failures, 0);
    }

    #[test]
    fn miss_after_a_success_starts_a_fresh_count() {
        let mut c = controller(7, vec![one_hot(2), one_hot(2), one_hot(7), one_hot(2)]);
        scribble(&mut c);
        scribble(&mut c);
        assert_eq!(c.attempt().failures, 2);
        assert!(matches!(
            scribble(&mut c),
            Response::Judged(Verdict { decision: Decision::Success, .. })
        ));
        assert_eq!(c.attempt().failures, 0);
        assert!(matches!(
            scribble(&mut c),
            Response::Judged(Verdict { decision: Decision::Retry { failures: 1 }, .. })
        ));
        assert_eq!(c.feedback().count(Signal::Failure), 0);
    }

    #[test]
    fn classifier_sees_a_full_ink_tensor() {
        let mut c = controller(3, vec![one_hot(3)]);
        scribble(&mut c);
        let fed = &c.port().fed()[0];
        assert_eq!(fed.len(), 28 * 28);
        assert!(fed.iter().any(|v| *v == 255.0));
        assert!(fed.iter().all(|v| (0.0..=255.0).contains(v)));
    }

    #[test]
    fn restart_clears_mid_stroke() {
        let mut c = controller(4, vec![one_hot(2)]);
        scribble(&mut c);
        assert_eq!(c.attempt().failures, 1);
        c.on_down(10.0, 10.0).unwrap();
        c.on_move(200.0, 200.0).unwrap();
        c.restart();
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.model().stroke_count(), 0);
        assert!(is_blank(&c));
        assert_eq!(c.attempt().failures, 0);
        assert_eq!(c.on_up().unwrap(), Response::Ignored);
    }

    #[test]
    fn deactivate_then_activate_gives_a_blank_surface() {
        let mut c = controller(1, vec![one_hot(2)]);
        scribble(&mut c);
        assert!(!is_blank(&c));
        c.deactivate();
        assert!(c.raster().current_pixels().is_err());
        c.activate();
        assert!(is_blank(&c));
        assert_eq!(c.raster().current_pixels().unwrap().dimensions(), (28, 28));
    }

    #[test]
    fn release_before_activation_is_a_quiet_noop() {
        let mut c = GestureController::new(
            ControllerSettings::default(),
            Digit::new(1).unwrap(),
            ScriptedPort::default(),
            RecordingFeedback::default(),
        )
        .unwrap();
        c.on_down(10.0, 10.0).unwrap();
        assert_eq!(c.on_up().unwrap(), Response::Consumed);
        assert_eq!(c.port().fed().len(), 0);
    }

    #[test]
    fn exhausted_classifier_surfaces_as_unavailable() {
        let mut c = controller(1, vec![]);
        c.on_down(10.0, 10.0).unwrap();
        assert!(matches!(c.on_up(), Err(PadError::InferenceUnavailable(_))));
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn begin_attempt_prompts_and_clears() {
        let mut c = controller(1, vec![one_hot(1)]);
        scribble(&mut c);
        c.begin_attempt(Digit::new(8).unwrap());
        assert_eq!(c.target(), Digit::new(8).unwrap());
        assert!(is_blank(&c));
        assert_eq!(
            c.feedback().signals.last(),
            Some(&(Signal::InstructionPrompt, Digit::new(8).unwrap()))
        );
    }

    #[test]
    fn paint_fills_the_fitted_display_rect() {
        let mut c = controller(1, vec![]);
        c.resize(560.0, 1120.0).unwrap();
        c.on_down(280.0, 560.0).unwrap();
        c.on_move(281.0, 561.0).unwrap();
        let mut display = RgbaImage::from_pixel(560, 1120, image::Rgba([9, 9, 9, 255]));
        c.paint(&mut display).unwrap();
        assert_eq!(display.get_pixel(280, 560).0[2], 0);
        assert_eq!(*display.get_pixel(10, 10), image::Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn bad_resize_blocks_drawing_until_corrected() {
        let mut c = controller(1, vec![]);
        assert!(matches!(
            c.resize(0.0, 100.0),
            Err(PadError::InvalidDimension { .. })
        ));
        assert!(matches!(
            c.on_down(10.0, 10.0),
            Err(PadError::InvalidDimension { .. })
        ));
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.model().stroke_count(), 0);

        c.resize(280.0, 280.0).unwrap();
        assert_eq!(c.on_down(10.0, 10.0).unwrap(), Response::Consumed);
    }

    #[test]
    fn pointer_events_deserialize_from_tagged_json() {
        let ev: PointerEvent = serde_json::from_str(r#"{"kind":"move","x":1.5,"y":2}"#).unwrap();
        assert_eq!(ev, PointerEvent::Move { x: 1.5, y: 2.0 });
        let up: PointerEvent = serde_json::from_str(r#"{"kind":"up"}"#).unwrap();
        assert_eq!(up, PointerEvent::Up);
    }
}
