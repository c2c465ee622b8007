//! Interpretation of classifier scores and the bounded retry policy.

use std::fmt;

use log::info;
use serde::Serialize;

use crate::error::PadError;

pub const DEFAULT_THRESHOLD: f32 = 1.0;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// A single decimal digit, 0 through 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub struct Digit(u8);

impl Digit {
    pub fn new(v: u8) -> Result<Self, PadError> {
        Self::try_from(i64::from(v))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Digit {
    type Error = PadError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        if (0..=9).contains(&v) {
            Ok(Self(v as u8))
        } else {
            Err(PadError::InvalidDigit(v))
        }
    }
}

impl From<Digit> for u8 {
    fn from(d: Digit) -> u8 {
        d.0
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The highest index whose score reaches `threshold`, scanning upward.
///
/// This is deliberately not arg-max: with two qualifying scores the later
/// index wins even if the earlier one is larger.
pub fn recognize(scores: &[f32], threshold: f32) -> Option<Digit> {
    let mut found = None;
    for (i, s) in scores.iter().enumerate() {
        if *s >= threshold {
            found = Some(i);
        }
    }
    found.and_then(|i| Digit::try_from(i as i64).ok())
}

/// Consecutive misses for the current target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttemptState {
    pub failures: u32,
}

impl AttemptState {
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Drawing matched the target.
    Success,
    /// Mismatch within the retry budget; the canvas stays.
    Retry { failures: u32 },
    /// Retry budget exhausted; the canvas must be cleared.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub target: Digit,
    pub recognized: Option<Digit>,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionPolicy {
    pub threshold: f32,
    pub max_retries: u32,
}

impl Default for RecognitionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RecognitionPolicy {
    /// Classify `scores` and advance `state`. Success zeroes the counter; the
    /// miss that pushes it past `max_retries` returns `Failure` and zeroes it.
    pub fn judge(&self, scores: &[f32], target: Digit, state: &mut AttemptState) -> Verdict {
        let recognized = recognize(scores, self.threshold);
        let decision = if recognized == Some(target) {
            state.reset();
            Decision::Success
        } else {
            state.failures += 1;
            if state.failures > self.max_retries {
                state.reset();
                Decision::Failure
            } else {
                Decision::Retry {
                    failures: state.failures,
                }
            }
        };

        info!(
            "target {target}, recognized {}, {decision:?}",
            recognized.map_or_else(|| "none".to_string(), |d| d.to_string())
        );
        Verdict {
            target,
            recognized,
            decision,
        }
    }
}
