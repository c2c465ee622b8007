//! Single-pointer tracking on top of raw touch events.
//!
//! Follows one contact at a time: the first slot that gets a tracking id is
//! followed until it lifts; other fingers are ignored meanwhile. Positions are
//! normalised with the device axis range and scaled to the drawing area.

use crate::gestures::PointerEvent;
use crate::input::AxisRanges;

const MAX_SLOTS: usize = 10;

// last raw position seen in a slot; the kernel only resends changed axes
#[derive(Debug, Clone, Copy, Default)]
struct SlotPos {
    x: Option<i32>,
    y: Option<i32>,
}

#[derive(Debug)]
pub struct TouchTracker {
    ranges: AxisRanges,
    display: (f32, f32),
    slots: Vec<SlotPos>,
    cur_slot: i32,
    followed: Option<i32>,
    touching: bool,
    pending_down: bool,
    pending_up: bool,
    moved: bool,
}

impl TouchTracker {
    pub fn new(ranges: AxisRanges, display_width: f32, display_height: f32) -> Self {
        let mut t = Self {
            ranges: AxisRanges::default(),
            display: (display_width, display_height),
            slots: vec![SlotPos::default(); MAX_SLOTS],
            cur_slot: 0,
            followed: None,
            touching: false,
            pending_down: false,
            pending_up: false,
            moved: false,
        };
        t.set_ranges(ranges);
        t
    }

    pub fn set_ranges(&mut self, r: AxisRanges) {
        self.ranges = AxisRanges {
            x: (r.x.0, r.x.1.max(r.x.0 + 1)),
            y: (r.y.0, r.y.1.max(r.y.0 + 1)),
        };
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        if tracking_id >= 0 {
            if self.followed.is_none() {
                self.followed = Some(self.cur_slot);
                self.pending_down = true;
            }
        } else if self.followed == Some(self.cur_slot) {
            self.followed = None;
            self.pending_up = true;
        }
    }

    /// BTN_TOUCH on single-touch devices, treated as slot 0.
    pub fn on_touch_key(&mut self, pressed: bool) {
        self.cur_slot = 0;
        self.on_tracking_id(if pressed { 0 } else { -1 });
    }

    fn current(&mut self) -> Option<&mut SlotPos> {
        let i = usize::try_from(self.cur_slot).ok()?;
        self.slots.get_mut(i)
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let followed = self.followed == Some(self.cur_slot);
        if let Some(slot) = self.current() {
            let changed = slot.x != Some(raw);
            slot.x = Some(raw);
            self.moved |= followed && changed;
        }
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let followed = self.followed == Some(self.cur_slot);
        if let Some(slot) = self.current() {
            let changed = slot.y != Some(raw);
            slot.y = Some(raw);
            self.moved |= followed && changed;
        }
    }

    fn position(&self) -> Option<(f32, f32)> {
        let slot = self.slots.get(usize::try_from(self.followed?).ok()?)?;
        let (x, y) = (slot.x?, slot.y?);
        let norm = |v: i32, (lo, hi): (i32, i32)| ((v - lo) as f32 / (hi - lo) as f32).clamp(0.0, 1.0);
        Some((
            norm(x, self.ranges.x) * self.display.0,
            norm(y, self.ranges.y) * self.display.1,
        ))
    }

    /// Close the current frame and emit the pointer events it implies.
    pub fn on_syn_report(&mut self) -> Vec<PointerEvent> {
        let mut out = Vec::new();

        if self.pending_up {
            self.pending_up = false;
            self.pending_down = false;
            if self.touching {
                self.touching = false;
                out.push(PointerEvent::Up);
            }
        }

        if self.pending_down {
            if let Some((x, y)) = self.position() {
                self.pending_down = false;
                self.touching = true;
                self.moved = false;
                out.push(PointerEvent::Down { x, y });
            }
        } else if self.touching && self.moved {
            self.moved = false;
            if let Some((x, y)) = self.position() {
                out.push(PointerEvent::Move { x, y });
            }
        }

        out
    }
}
