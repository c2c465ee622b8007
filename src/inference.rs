//! Classifier boundary: feed a tensor, run, fetch class scores.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{PadError, PadResult};

pub const CLASSES: usize = 10;

/// Synchronous, blocking classifier. Implementations own model loading.
pub trait InferencePort {
    fn feed(&mut self, input: &[f32]) -> PadResult<()>;
    fn run(&mut self) -> PadResult<()>;
    fn fetch(&mut self) -> PadResult<Vec<f32>>;
}

impl<P: InferencePort + ?Sized> InferencePort for Box<P> {
    fn feed(&mut self, input: &[f32]) -> PadResult<()> {
        (**self).feed(input)
    }
    fn run(&mut self) -> PadResult<()> {
        (**self).run()
    }
    fn fetch(&mut self) -> PadResult<Vec<f32>> {
        (**self).fetch()
    }
}

fn unavailable(msg: impl Into<String>) -> PadError {
    PadError::InferenceUnavailable(msg.into())
}

#[derive(Debug, Clone, Deserialize)]
struct LinearArtifact {
    input_size: u32,
    #[serde(default = "default_classes")]
    classes: usize,
    #[serde(default = "default_input_scale")]
    input_scale: f32,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

fn default_classes() -> usize {
    CLASSES
}

fn default_input_scale() -> f32 {
    1.0 / 255.0
}

/// Single dense layer stored as JSON: `scores = W * (x * input_scale) + b`.
#[derive(Debug, Clone)]
pub struct LinearModel {
    input_len: usize,
    input_scale: f32,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    input: Option<Vec<f32>>,
    output: Option<Vec<f32>>,
}

impl LinearModel {
    pub fn load(path: &Path) -> PadResult<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| unavailable(format!("failed to read {}: {e}", path.display())))?;
        let model = Self::from_json(&txt)
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
        info!(
            "loaded linear model {} ({} inputs, {} classes)",
            path.display(),
            model.input_len,
            model.bias.len()
        );
        Ok(model)
    }

    pub fn from_json(txt: &str) -> PadResult<Self> {
        let art: LinearArtifact =
            serde_json::from_str(txt).map_err(|e| unavailable(format!("bad model artifact: {e}")))?;
        let input_len = (art.input_size as usize) * (art.input_size as usize);
        if input_len == 0 {
            return Err(unavailable("input_size must be positive"));
        }
        if art.weights.len() != art.classes || art.bias.len() != art.classes {
            return Err(unavailable(format!(
                "expected {} weight rows and biases, got {} and {}",
                art.classes,
                art.weights.len(),
                art.bias.len()
            )));
        }
        if let Some(row) = art.weights.iter().position(|r| r.len() != input_len) {
            return Err(unavailable(format!(
                "weight row {row} has {} entries, expected {input_len}",
                art.weights[row].len()
            )));
        }
        Ok(Self {
            input_len,
            input_scale: art.input_scale,
            weights: art.weights,
            bias: art.bias,
            input: None,
            output: None,
        })
    }
}

impl InferencePort for LinearModel {
    fn feed(&mut self, input: &[f32]) -> PadResult<()> {
        if input.len() != self.input_len {
            return Err(unavailable(format!(
                "input has {} values, model expects {}",
                input.len(),
                self.input_len
            )));
        }
        self.input = Some(input.iter().map(|v| v * self.input_scale).collect());
        self.output = None;
        Ok(())
    }

    fn run(&mut self) -> PadResult<()> {
        let x = self.input.as_ref().ok_or_else(|| unavailable("run before feed"))?;
        let scores = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + b)
            .collect();
        self.output = Some(scores);
        Ok(())
    }

    fn fetch(&mut self) -> PadResult<Vec<f32>> {
        self.output.clone().ok_or_else(|| unavailable("fetch before run"))
    }
}

/// Replays canned score vectors in order.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPort {
    queue: VecDeque<Vec<f32>>,
    fed: Vec<Vec<f32>>,
    current: Option<Vec<f32>>,
}

impl ScriptedPort {
    pub fn new<I>(scripts: I) -> Self
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        Self {
            queue: scripts.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Reads a JSON array of score arrays.
    pub fn load(path: &Path) -> PadResult<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| unavailable(format!("failed to read {}: {e}", path.display())))?;
        let scripts: Vec<Vec<f32>> = serde_json::from_str(&txt)
            .map_err(|e| unavailable(format!("bad score script {}: {e}", path.display())))?;
        Ok(Self::new(scripts))
    }

    /// Inputs received so far, one per `feed`.
    #[cfg(test)]
    pub fn fed(&self) -> &[Vec<f32>] {
        &self.fed
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl InferencePort for ScriptedPort {
    fn feed(&mut self, input: &[f32]) -> PadResult<()> {
        self.fed.push(input.to_vec());
        Ok(())
    }

    fn run(&mut self) -> PadResult<()> {
        let next = self
            .queue
            .pop_front()
            .ok_or_else(|| unavailable("score script exhausted"))?;
        debug!("scripted scores {next:?}");
        self.current = Some(next);
        Ok(())
    }

    fn fetch(&mut self) -> PadResult<Vec<f32>> {
        self.current.take().ok_or_else(|| unavailable("fetch before run"))
    }
}
