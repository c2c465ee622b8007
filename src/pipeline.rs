use anyhow::{Result, anyhow};
use image::RgbaImage;
use log::{error, info, warn};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use evdev::{AbsoluteAxisCode, Device, EventType, KeyCode, SynchronizationCode};
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};

use crate::config::Profile;
use crate::error::PadError;
use crate::feedback::{FeedbackSink, LogFeedback};
use crate::gestures::{Drawable, GestureController, PointerSink, Response};
use crate::inference::InferencePort;
use crate::input;
use crate::raster::WHITE;
use crate::recognition::{Decision, Digit};
use crate::rng::XorShift32;
use crate::session::Session;
use crate::tracker::TouchTracker;

#[derive(Debug, Default)]
pub struct DrawOptions {
    pub device: Option<String>,
    /// Fixed first target instead of a random one.
    pub target: Option<Digit>,
    pub snapshot: Option<PathBuf>,
}

fn rng_for(profile: &Profile) -> XorShift32 {
    profile
        .session
        .seed
        .map_or_else(XorShift32::from_clock, XorShift32::from_seed)
}

/// Clear the canvas if a restart was requested since the last call.
fn take_restart<P: InferencePort, F: FeedbackSink>(
    flag: &AtomicBool,
    ctl: &mut GestureController<P, F>,
) -> bool {
    if !flag.swap(false, Ordering::Relaxed) {
        return false;
    }
    ctl.restart();
    true
}

/// Live lesson loop on a touchscreen until the session ends or SIGINT/SIGTERM.
/// SIGUSR1 clears the canvas and the retry count for the current target.
pub fn run_draw<P: InferencePort>(profile: &Profile, port: P, opts: DrawOptions) -> Result<()> {
    let path = match opts.device.clone() {
        Some(p) => p,
        None => input::discover_touch()
            .into_iter()
            .next()
            .map(|d| d.path)
            .ok_or_else(|| anyhow!("no touch devices detected; pass --device"))?,
    };
    let mut dev = Device::open(&path).map_err(|e| anyhow!("failed to open {path}: {e}"))?;
    dev.set_nonblocking(true)?;
    let multitouch = dev
        .supported_absolute_axes()
        .is_some_and(|a| a.contains(AbsoluteAxisCode::ABS_MT_SLOT));
    info!(
        "drawing from {} ({path}, {})",
        dev.name().unwrap_or("unknown"),
        if multitouch { "multitouch" } else { "single touch" }
    );

    let settings = profile.controller_settings();
    let mut tracker = TouchTracker::new(
        input::axis_ranges(&dev, multitouch),
        settings.display_width,
        settings.display_height,
    );

    let mut session = Session::new(profile.unlocked_digits()?, profile.session.lessons, rng_for(profile));
    let first = match opts.target {
        Some(d) => d,
        None => session
            .next_target()
            .ok_or_else(|| anyhow!("no unlocked digits"))?,
    };

    let mut ctl = GestureController::new(settings, first, port, LogFeedback::new(rng_for(profile)))?;
    ctl.activate();
    ctl.begin_attempt(first);

    let mut display = RgbaImage::from_pixel(
        settings.display_width.round() as u32,
        settings.display_height.round() as u32,
        WHITE,
    );

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&stop))?;
    let restart = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGUSR1, Arc::clone(&restart))?;

    while !stop.load(Ordering::Relaxed) && !session.is_finished() {
        if take_restart(&restart, &mut ctl) {
            if tracker.is_touching() {
                info!("canvas restarted; the current contact is ignored until it lifts");
            } else {
                info!("canvas restarted");
            }
        }

        let mut pointer_events = Vec::new();
        let mut any_event = false;

        if let Ok(events) = dev.fetch_events() {
            for ev in events {
                any_event = true;
                match ev.event_type() {
                    EventType::ABSOLUTE => match ev.code() {
                        c if multitouch && c == AbsoluteAxisCode::ABS_MT_SLOT.0 => {
                            tracker.on_slot(ev.value())
                        }
                        c if multitouch && c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            tracker.on_tracking_id(ev.value())
                        }
                        c if multitouch && c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            tracker.on_pos_x(ev.value())
                        }
                        c if multitouch && c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            tracker.on_pos_y(ev.value())
                        }
                        c if !multitouch && c == AbsoluteAxisCode::ABS_X.0 => {
                            tracker.on_pos_x(ev.value())
                        }
                        c if !multitouch && c == AbsoluteAxisCode::ABS_Y.0 => {
                            tracker.on_pos_y(ev.value())
                        }
                        _ => {}
                    },
                    EventType::KEY if !multitouch && ev.code() == KeyCode::BTN_TOUCH.0 => {
                        tracker.on_touch_key(ev.value() != 0)
                    }
                    EventType::SYNCHRONIZATION
                        if ev.code() == SynchronizationCode::SYN_REPORT.0 =>
                    {
                        pointer_events.extend(tracker.on_syn_report())
                    }
                    _ => {}
                }
            }
        }

        for pe in pointer_events {
            let verdict = match ctl.handle(pe) {
                Ok(Response::Judged(v)) => v,
                Ok(_) => continue,
                Err(e @ PadError::InferenceUnavailable(_)) => return Err(e.into()),
                Err(e) => {
                    error!("pointer event {pe:?} failed: {e}");
                    continue;
                }
            };
            if verdict.decision == Decision::Success {
                session.complete_lesson();
                if session.is_finished() {
                    info!("session complete after {} lessons", session.completed());
                    break;
                }
                if let Some(next) = session.next_target() {
                    ctl.begin_attempt(next);
                }
            }
        }

        if ctl.take_redraw() {
            if let Err(e) = ctl.paint(&mut display) {
                warn!("paint failed: {e}");
            }
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    if let Some(out) = &opts.snapshot {
        ctl.paint(&mut display)?;
        display.save(out)?;
        info!("saved canvas snapshot to {}", out.display());
    }
    ctl.deactivate();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingFeedback;
    use crate::gestures::{ControllerSettings, Phase};
    use crate::inference::ScriptedPort;

    #[test]
    fn restart_request_clears_the_canvas_once() {
        let mut ctl = GestureController::new(
            ControllerSettings::default(),
            Digit::new(3).unwrap(),
            ScriptedPort::new(vec![vec![0.0; 10]]),
            RecordingFeedback::default(),
        )
        .unwrap();
        ctl.activate();
        ctl.on_down(100.0, 100.0).unwrap();
        ctl.on_move(400.0, 400.0).unwrap();
        ctl.on_up().unwrap();
        ctl.on_down(50.0, 50.0).unwrap();
        assert_eq!(ctl.attempt().failures, 1);

        let flag = AtomicBool::new(false);
        assert!(!take_restart(&flag, &mut ctl));
        assert_eq!(ctl.model().stroke_count(), 2);

        flag.store(true, Ordering::Relaxed);
        assert!(take_restart(&flag, &mut ctl));
        assert_eq!(ctl.model().stroke_count(), 0);
        assert_eq!(ctl.attempt().failures, 0);
        assert_eq!(ctl.phase(), Phase::Idle);
        assert!(!flag.load(Ordering::Relaxed));
        assert!(!take_restart(&flag, &mut ctl));
    }
}
