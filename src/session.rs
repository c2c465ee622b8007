//! Lesson sequencing: which digit to ask for next and when to stop.

use log::info;

use crate::recognition::Digit;
use crate::rng::XorShift32;

#[derive(Debug)]
pub struct Session {
    unlocked: Vec<Digit>,
    lessons: u32,
    completed: u32,
    rng: XorShift32,
}

impl Session {
    pub fn new(unlocked: Vec<Digit>, lessons: u32, rng: XorShift32) -> Self {
        Self {
            unlocked,
            lessons,
            completed: 0,
            rng,
        }
    }

    /// Random unlocked digit, or `None` when nothing is unlocked.
    pub fn next_target(&mut self) -> Option<Digit> {
        let d = self.rng.pick(&self.unlocked).copied();
        if let Some(d) = d {
            info!("lesson {}/{}: draw {d}", self.completed + 1, self.lessons);
        }
        d
    }

    pub fn complete_lesson(&mut self) {
        self.completed += 1;
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.lessons
    }
}
