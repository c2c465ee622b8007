//! Touch device discovery (evdev 0.13)

use evdev::{AbsoluteAxisCode, Device, EventType};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub multitouch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRanges {
    pub x: (i32, i32),
    pub y: (i32, i32),
}

impl Default for AxisRanges {
    fn default() -> Self {
        Self {
            x: (0, 4096),
            y: (0, 4096),
        }
    }
}

fn has_mt(dev: &Device) -> bool {
    dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    })
}

fn has_xy(dev: &Device) -> bool {
    dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_X) && a.contains(AbsoluteAxisCode::ABS_Y)
    })
}

/// Every event device reporting absolute X/Y, single- or multi-touch.
pub fn discover_touch() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            let is_event = p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"));
            if !is_event {
                continue;
            }
            if let Ok(dev) = Device::open(&p) {
                if !dev.supported_events().contains(EventType::ABSOLUTE) {
                    continue;
                }
                let multitouch = has_mt(&dev);
                if multitouch || has_xy(&dev) {
                    out.push(DeviceInfo {
                        path: p.display().to_string(),
                        name: dev.name().unwrap_or("unknown").to_string(),
                        multitouch,
                    });
                }
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// Position axis limits as reported by the kernel, or the defaults if unreadable.
pub fn axis_ranges(dev: &Device, multitouch: bool) -> AxisRanges {
    let (xc, yc) = if multitouch {
        (AbsoluteAxisCode::ABS_MT_POSITION_X, AbsoluteAxisCode::ABS_MT_POSITION_Y)
    } else {
        (AbsoluteAxisCode::ABS_X, AbsoluteAxisCode::ABS_Y)
    };
    match dev.get_abs_state() {
        Ok(state) => {
            let x = &state[xc.0 as usize];
            let y = &state[yc.0 as usize];
            AxisRanges {
                x: (x.minimum, x.maximum),
                y: (y.minimum, y.maximum),
            }
        }
        Err(_) => AxisRanges::default(),
    }
}
