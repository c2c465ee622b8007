//! Recorded pointer scripts: drive the pipeline without a touchscreen.

use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::check_display_size;
use crate::error::PadResult;
use crate::feedback::{RecordingFeedback, Signal};
use crate::gestures::{ControllerSettings, GestureController, PointerSink, Response};
use crate::inference::InferencePort;
use crate::raster::Rasterizer;
use crate::recognition::{AttemptState, Digit, Verdict};
use crate::stroke::{Point, StrokeModel};
use crate::transform::CoordinateMapper;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    /// Tap on the target label: blank canvas, counters cleared.
    Restart,
    Resize { width: f32, height: f32 },
    Pause,
    Resume,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recording {
    /// Display size the coordinates were captured at; profile size otherwise.
    pub display_width: Option<f32>,
    pub display_height: Option<f32>,
    pub target: Option<i64>,
    pub steps: Vec<Step>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let rec: Recording = serde_json::from_str(&txt)
            .map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        rec.validate()
            .map_err(|e| anyhow!("{}: {e}", path.display()))?;
        Ok(rec)
    }

    /// Recorded display sizes obey the same bounds as a profile's.
    pub fn validate(&self) -> Result<()> {
        match (self.display_width, self.display_height) {
            (Some(w), Some(h)) => check_display_size(w, h),
            (None, None) => Ok(()),
            _ => Err(anyhow!("display_width and display_height go together")),
        }
    }

    pub fn apply_display(&self, settings: &mut ControllerSettings) {
        if let (Some(w), Some(h)) = (self.display_width, self.display_height) {
            settings.display_width = w;
            settings.display_height = h;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalRecord {
    pub signal: Signal,
    pub target: Digit,
}

/// A stroke left on the canvas, endpoints in display coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct StrokeSummary {
    pub points: usize,
    pub from: [f32; 2],
    pub to: [f32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub target: Digit,
    pub verdicts: Vec<Verdict>,
    pub signals: Vec<SignalRecord>,
    pub strokes_on_canvas: usize,
    pub strokes: Vec<StrokeSummary>,
    pub attempt: AttemptState,
}

fn summarize(model: &StrokeModel, mapper: &CoordinateMapper) -> Vec<StrokeSummary> {
    (0..model.stroke_count())
        .filter_map(|i| {
            let pts = model.stroke(i)?.points();
            let from = mapper.to_physical(*pts.first()?);
            let to = mapper.to_physical(*pts.last()?);
            Some(StrokeSummary {
                points: model.point_count_of_stroke(i),
                from: [from.x, from.y],
                to: [to.x, to.y],
            })
        })
        .collect()
}

/// Run every step through a full controller, classifying on each release.
pub fn replay<P: InferencePort>(
    rec: &Recording,
    settings: ControllerSettings,
    target: Digit,
    port: P,
) -> PadResult<(ReplayReport, GestureController<P, RecordingFeedback>)> {
    let mut ctl = GestureController::new(settings, target, port, RecordingFeedback::default())?;
    ctl.activate();

    let mut verdicts = Vec::new();
    for (i, step) in rec.steps.iter().enumerate() {
        let resp = match *step {
            Step::Down { x, y } => ctl.on_down(x, y)?,
            Step::Move { x, y } => ctl.on_move(x, y)?,
            Step::Up => ctl.on_up()?,
            Step::Restart => {
                ctl.restart();
                Response::Consumed
            }
            Step::Resize { width, height } => {
                ctl.resize(width, height)?;
                Response::Consumed
            }
            Step::Pause => {
                ctl.deactivate();
                Response::Consumed
            }
            Step::Resume => {
                ctl.activate();
                Response::Consumed
            }
        };
        match resp {
            Response::Judged(v) => verdicts.push(v),
            Response::Ignored => debug!("step {i} ignored: {step:?}"),
            Response::Consumed => {}
        }
    }

    let report = ReplayReport {
        target: ctl.target(),
        verdicts,
        signals: ctl
            .feedback()
            .signals
            .iter()
            .map(|(signal, target)| SignalRecord {
                signal: *signal,
                target: *target,
            })
            .collect(),
        strokes_on_canvas: ctl.model().stroke_count(),
        strokes: summarize(ctl.model(), ctl.mapper()),
        attempt: ctl.attempt(),
    };
    Ok((report, ctl))
}

/// Strokes only, no classification: model, baked raster and the mapper used.
pub fn replay_strokes(
    rec: &Recording,
    settings: &ControllerSettings,
) -> PadResult<(StrokeModel, Rasterizer, CoordinateMapper)> {
    let mut model = StrokeModel::new(settings.logical_width, settings.logical_height)?;
    let mut raster = Rasterizer::new(settings.logical_width, settings.logical_height, settings.brush)?;
    let mut mapper = CoordinateMapper::new(
        settings.display_width,
        settings.display_height,
        settings.logical_width as f32,
        settings.logical_height as f32,
    )?;
    raster.activate();

    for step in &rec.steps {
        match *step {
            Step::Down { x, y } => {
                if model.is_drawing() {
                    continue;
                }
                mapper.ensure_usable()?;
                model.start_stroke(mapper.to_logical(Point::new(x, y)))?;
            }
            Step::Move { x, y } => {
                mapper.ensure_usable()?;
                model.append_point(mapper.to_logical(Point::new(x, y)));
            }
            Step::Up => model.end_stroke(),
            Step::Restart => {
                model.clear();
                raster.reset();
            }
            Step::Resize { width, height } => mapper.recompute(
                width,
                height,
                settings.logical_width as f32,
                settings.logical_height as f32,
            )?,
            Step::Pause | Step::Resume => warn!("{step:?} has no effect on a stroke-only replay"),
        }
    }
    raster.refresh(&model)?;
    Ok((model, raster, mapper))
}
