use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::gestures::ControllerSettings;
use crate::input;
use crate::raster::Brush;
use crate::recognition::{Digit, RecognitionPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Canvas {
    pub logical_width: u32,
    pub logical_height: u32,
    pub display_width: f32,
    pub display_height: f32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            logical_width: 28,
            logical_height: 28,
            display_width: 560.0,
            display_height: 560.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub width: f32,
    pub corner_radius: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        let b = Brush::default();
        Self {
            width: b.width,
            corner_radius: b.corner_radius,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Recognition {
    pub input_size: u32,
    pub threshold: f32,
    pub max_retries: u32,
}

impl Default for Recognition {
    fn default() -> Self {
        let p = RecognitionPolicy::default();
        Self {
            input_size: 28,
            threshold: p.threshold,
            max_retries: p.max_retries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub lessons: u32,
    pub unlocked: Vec<i64>,
    /// Fixed RNG seed; clock-seeded when absent.
    pub seed: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lessons: 5,
            unlocked: (0..=9).collect(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub canvas: Canvas,
    #[serde(default)]
    pub brush: BrushConfig,
    #[serde(default)]
    pub recognition: Recognition,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub model: ModelConfig,
    // directory relative model paths resolve against
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Profile {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let mut profile = Self::from_toml_str(&txt)
            .map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        profile.base_dir = path.parent().map(Path::to_path_buf);
        Ok(profile)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            logical_width: self.canvas.logical_width,
            logical_height: self.canvas.logical_height,
            display_width: self.canvas.display_width,
            display_height: self.canvas.display_height,
            brush: Brush {
                width: self.brush.width,
                corner_radius: self.brush.corner_radius,
                ..Brush::default()
            },
            input_size: self.recognition.input_size,
            policy: RecognitionPolicy {
                threshold: self.recognition.threshold,
                max_retries: self.recognition.max_retries,
            },
        }
    }

    pub fn unlocked_digits(&self) -> Result<Vec<Digit>> {
        self.session
            .unlocked
            .iter()
            .map(|d| Digit::try_from(*d).map_err(|e| anyhow!("session.unlocked: {e}")))
            .collect()
    }

    pub fn model_path(&self) -> Option<PathBuf> {
        let p = self.model.path.as_ref()?;
        match &self.base_dir {
            Some(base) if p.is_relative() => Some(base.join(p)),
            _ => Some(p.clone()),
        }
    }
}

/// Largest display side accepted; display buffers are allocated at this size.
pub const MAX_DISPLAY_SIDE: f32 = 16384.0;
pub const MAX_LOGICAL_SIDE: u32 = 4096;
pub const MAX_INPUT_SIZE: u32 = 1024;

/// Positive and no larger than `MAX_DISPLAY_SIDE` on both axes.
pub fn check_display_size(width: f32, height: f32) -> Result<()> {
    if !(width > 0.0 && height > 0.0) {
        return Err(anyhow!("display size must be positive, got {width}x{height}"));
    }
    if !(width <= MAX_DISPLAY_SIDE && height <= MAX_DISPLAY_SIDE) {
        return Err(anyhow!(
            "display size {width}x{height} exceeds {MAX_DISPLAY_SIDE} per side"
        ));
    }
    Ok(())
}

fn validate_profile(p: &Profile) -> Result<()> {
    let c = &p.canvas;
    if c.logical_width == 0 || c.logical_height == 0 {
        return Err(anyhow!("canvas logical size must be positive"));
    }
    if c.logical_width > MAX_LOGICAL_SIDE || c.logical_height > MAX_LOGICAL_SIDE {
        return Err(anyhow!("canvas logical size exceeds {MAX_LOGICAL_SIDE} per side"));
    }
    check_display_size(c.display_width, c.display_height)
        .map_err(|e| anyhow!("canvas: {e}"))?;
    if !(p.brush.width > 0.0) {
        return Err(anyhow!("brush.width must be positive"));
    }
    if !(p.brush.corner_radius >= 0.0) {
        return Err(anyhow!("brush.corner_radius must not be negative"));
    }
    if p.recognition.input_size == 0 || p.recognition.input_size > MAX_INPUT_SIZE {
        return Err(anyhow!("recognition.input_size must be in 1..={MAX_INPUT_SIZE}"));
    }
    if !p.recognition.threshold.is_finite() {
        return Err(anyhow!("recognition.threshold must be a finite number"));
    }
    if p.session.lessons == 0 {
        return Err(anyhow!("session.lessons must be at least 1"));
    }
    if p.session.unlocked.is_empty() {
        return Err(anyhow!("session.unlocked must list at least one digit"));
    }
    p.unlocked_digits()?;
    Ok(())
}

// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("digitpad"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Profile::from_file(&profdir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        // parse first so a broken profile never becomes active
        let profile = Profile::from_file(&p)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = input::discover_touch()
            .into_iter()
            .map(|d| {
                let kind = if d.multitouch { "multitouch" } else { "single touch" };
                format!("{} ({}, {kind})", d.name, d.path)
            })
            .collect();
        let model = self.profile.model_path();
        serde_json::json!({
            "input_dir_readable": fs::read_dir("/dev/input").is_ok(),
            "input_group_member": check_in_input_group(),
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profile_name": self.profile.meta.name,
            "model": model,
            "model_present": model.as_ref().is_some_and(|p| p.exists()),
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_profile_parses() {
        let p = Profile::from_toml_str(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        let s = p.controller_settings();
        assert_eq!((s.logical_width, s.logical_height), (28, 28));
        assert_eq!(s.brush.width, 20.0);
        assert_eq!(s.brush.corner_radius, 50.0);
        assert_eq!(s.policy.threshold, 1.0);
        assert_eq!(s.policy.max_retries, 2);
        assert_eq!(p.unlocked_digits().unwrap().len(), 10);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let p = Profile::from_toml_str("[brush]\nwidth = 3.0\n").unwrap();
        assert_eq!(p.brush.width, 3.0);
        assert_eq!(p.brush.corner_radius, 50.0);
        assert_eq!(p.canvas.display_width, 560.0);
        assert_eq!(p.session.lessons, 5);
        assert!(p.model_path().is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        for bad in [
            "[canvas]\nlogical_width = 0\n",
            "[canvas]\ndisplay_height = -5.0\n",
            "[canvas]\ndisplay_width = 1e9\n",
            "[canvas]\nlogical_height = 100000\n",
            "[recognition]\ninput_size = 5000\n",
            "[brush]\nwidth = 0.0\n",
            "[brush]\ncorner_radius = -1.0\n",
            "[recognition]\ninput_size = 0\n",
            "[session]\nlessons = 0\n",
            "[session]\nunlocked = []\n",
            "[session]\nunlocked = [3, 12]\n",
        ] {
            assert!(Profile::from_toml_str(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn display_size_bounds() {
        assert!(check_display_size(560.0, 560.0).is_ok());
        assert!(check_display_size(MAX_DISPLAY_SIDE, 1.0).is_ok());
        assert!(check_display_size(MAX_DISPLAY_SIDE + 1.0, 1.0).is_err());
        assert!(check_display_size(f32::NAN, 10.0).is_err());
        assert!(check_display_size(10.0, 0.0).is_err());
    }

    #[test]
    fn relative_model_path_resolves_next_to_profile() {
        let dir = std::env::temp_dir().join(format!("digitpad-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("p.toml");
        fs::write(&file, "[model]\npath = \"m.json\"\n").unwrap();
        let p = Profile::from_file(&file).unwrap();
        assert_eq!(p.model_path(), Some(dir.join("m.json")));
        fs::remove_dir_all(&dir).unwrap();
    }
}
