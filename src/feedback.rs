//! Semantic cues handed to whatever plays audio or shows feedback.

use log::info;
use serde::Serialize;

use crate::recognition::Digit;
use crate::rng::XorShift32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Success,
    Failure,
    InstructionPrompt,
}

pub trait FeedbackSink {
    fn signal(&mut self, signal: Signal, target: Digit);
}

const INSTRUCTIONS: &[&str] = &[
    "can_you_draw_the_number",
    "draw_the_number",
    "now_try_to_draw_the_number",
    "use_your_finger_to_draw_the_number",
];

const PRAISE: &[&str] = &[
    "amazing",
    "fantastic",
    "great",
    "great_job",
    "nice",
    "well_done",
];

const FAILED: &[&str] = &["try_again"];

/// Picks a cue clip name per signal and logs it.
#[derive(Debug)]
pub struct LogFeedback {
    rng: XorShift32,
}

impl LogFeedback {
    pub fn new(rng: XorShift32) -> Self {
        Self { rng }
    }

    /// Clip names to play, in order.
    pub fn cues(&mut self, signal: Signal, target: Digit) -> Vec<String> {
        let pool = match signal {
            Signal::Success => PRAISE,
            Signal::Failure => FAILED,
            Signal::InstructionPrompt => INSTRUCTIONS,
        };
        let mut out: Vec<String> = self.rng.pick(pool).map(|s| s.to_string()).into_iter().collect();
        if signal == Signal::InstructionPrompt {
            out.push(format!("digit_{target}"));
        }
        out
    }
}

impl FeedbackSink for LogFeedback {
    fn signal(&mut self, signal: Signal, target: Digit) {
        let cues = self.cues(signal, target);
        info!("feedback {signal:?} for {target}: {}", cues.join(" -> "));
    }
}

/// Keeps every signal; used for reports and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingFeedback {
    pub signals: Vec<(Signal, Digit)>,
}

impl RecordingFeedback {
    #[cfg(test)]
    pub fn count(&self, signal: Signal) -> usize {
        self.signals.iter().filter(|(s, _)| *s == signal).count()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn signal(&mut self, signal: Signal, target: Digit) {
        self.signals.push((signal, target));
    }
}

impl<F: FeedbackSink + ?Sized> FeedbackSink for Box<F> {
    fn signal(&mut self, signal: Signal, target: Digit) {
        (**self).signal(signal, target)
    }
}
