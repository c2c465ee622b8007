use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{env, path::PathBuf};

use image::RgbaImage;

use crate::config::{ConfigState, Profile};
use crate::inference::{LinearModel, ScriptedPort};
use crate::pipeline::{self, DrawOptions};
use crate::raster::WHITE;
use crate::recognition::Digit;
use crate::replay::{self, Recording};
use crate::rng::XorShift32;
use crate::session::Session;
use crate::tensor::TensorExtractor;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("draw") => {
            let device: Option<String> = pargs.opt_value_from_str("--device")?;
            let profile_path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let target = parse_target(&mut pargs)?;
            let snapshot: Option<PathBuf> = pargs.opt_value_from_str("--snapshot")?;

            let profile = load_profile(profile_path, true)?;
            let model_path = profile
                .model_path()
                .ok_or_else(|| anyhow!("profile has no [model] path; draw needs a classifier"))?;
            let model = LinearModel::load(&model_path)?;
            pipeline::run_draw(
                &profile,
                model,
                DrawOptions {
                    device,
                    target,
                    snapshot,
                },
            )
        }

        Some("replay") => {
            let profile_path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let scores: Option<PathBuf> = pargs.opt_value_from_str("--scores")?;
            let target = parse_target(&mut pargs)?;
            let file: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: digitpad replay <file.json> [--scores FILE]"))?;

            let profile = load_profile(profile_path, false)?;
            let rec = Recording::load(&file)?;
            let target = resolve_target(target, &rec, &profile)?;
            let mut settings = profile.controller_settings();
            rec.apply_display(&mut settings);

            let report = match scores {
                Some(p) => replay::replay(&rec, settings, target, ScriptedPort::load(&p)?)?.0,
                None => {
                    let model_path = profile
                        .model_path()
                        .ok_or_else(|| anyhow!("no model configured; pass --scores FILE"))?;
                    replay::replay(&rec, settings, target, LinearModel::load(&model_path)?)?.0
                }
            };
            print_response(&serde_json::to_value(&report)?);
            Ok(())
        }

        Some("render") => {
            let profile_path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let out: PathBuf = pargs
                .value_from_str("--out")
                .map_err(|_| anyhow!("usage: digitpad render <file.json> --out <image.png>"))?;
            let display = pargs.contains("--display");
            let rotate: i32 = pargs.opt_value_from_str("--rotate")?.unwrap_or(0);
            let file: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: digitpad render <file.json> --out <image.png>"))?;

            let profile = load_profile(profile_path, false)?;
            let rec = Recording::load(&file)?;
            let mut settings = profile.controller_settings();
            rec.apply_display(&mut settings);

            let (model, raster, mapper) = replay::replay_strokes(&rec, &settings)?;
            if display {
                let mut img = RgbaImage::from_pixel(
                    settings.display_width.round() as u32,
                    settings.display_height.round() as u32,
                    WHITE,
                );
                raster.composite(&mapper, &mut img)?;
                img.save(&out)?;
            } else {
                raster.rotated(rotate)?.save(&out)?;
            }
            println!(
                "ok: rendered {} strokes to {}",
                model.stroke_count(),
                out.display()
            );
            Ok(())
        }

        Some("tensor") => {
            let profile_path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let file: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: digitpad tensor <file.json>"))?;

            let profile = load_profile(profile_path, false)?;
            let rec = Recording::load(&file)?;
            let mut settings = profile.controller_settings();
            rec.apply_display(&mut settings);

            let (_, raster, _) = replay::replay_strokes(&rec, &settings)?;
            let tensor =
                TensorExtractor::new(settings.input_size).extract(raster.current_pixels().ok())?;
            print!("{}", tensor.to_ascii());
            if tensor.is_blank() {
                eprintln!("note: no ink reached the {0}x{0} input", tensor.size);
            }
            Ok(())
        }

        Some("profiles") => {
            let st = ConfigState::load_or_install_default()?;
            for name in st.list_profiles() {
                let mark = if name == st.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: digitpad use <profile_name>"))?;
            let mut st = ConfigState::load_or_install_default()?;
            st.set_active(&name)?;
            println!("ok: active profile is now {name}");
            Ok(())
        }

        Some("doctor") => {
            let st = ConfigState::load_or_install_default()?;
            print_response(&st.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn parse_target(pargs: &mut Arguments) -> Result<Option<Digit>> {
    let raw: Option<i64> = pargs.opt_value_from_str("--target")?;
    Ok(raw.map(Digit::try_from).transpose()?)
}

/// Explicit file, else the active profile. Offline commands fall back to
/// built-in defaults when no profile can be installed.
fn load_profile(path: Option<PathBuf>, strict: bool) -> Result<Profile> {
    if let Some(p) = path {
        return Profile::from_file(&p);
    }
    match ConfigState::load_or_install_default() {
        Ok(st) => Ok(st.profile),
        Err(e) if !strict => {
            warn!("using built-in profile: {e}");
            Ok(Profile::default())
        }
        Err(e) => Err(e),
    }
}

fn resolve_target(flag: Option<Digit>, rec: &Recording, profile: &Profile) -> Result<Digit> {
    if let Some(d) = flag {
        return Ok(d);
    }
    if let Some(raw) = rec.target {
        return Ok(Digit::try_from(raw)?);
    }
    let rng = profile
        .session
        .seed
        .map_or_else(XorShift32::from_clock, XorShift32::from_seed);
    Session::new(profile.unlocked_digits()?, profile.session.lessons, rng)
        .next_target()
        .ok_or_else(|| anyhow!("no unlocked digits"))
}

fn print_help() {
    println!(
        r#"digitpad: handwritten digit lessons on a touchscreen

USAGE:
  digitpad help [command]                     Show general or command-specific help
  digitpad draw [--device PATH] [--target D]  Run a lesson session on a touchscreen
  digitpad replay <file.json> [--scores FILE] Replay a pointer recording, print verdicts
  digitpad render <file.json> --out PNG       Render a recording's strokes to PNG
  digitpad tensor <file.json>                 Print the classifier input as ASCII
  digitpad profiles                           List profiles
  digitpad use <name>                         Switch active profile
  digitpad doctor                             Diagnose permissions/devices/model

TIPS:
  - Profiles: ~/.config/digitpad/profiles
  - Active profile pointer: ~/.config/digitpad/active
  - Log level: DIGITPAD_LOG=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "draw" => println!(
            "usage: digitpad draw [--device PATH] [--profile FILE] [--target D] [--snapshot PNG]\nReads the touchscreen, classifies each stroke release and runs the lesson session.\nCtrl-C ends the session; --snapshot saves the last canvas.\nSIGUSR1 (kill -USR1 <pid>) clears the canvas and the retry count."
        ),
        "replay" => println!(
            "usage: digitpad replay <file.json> [--profile FILE] [--scores FILE] [--target D]\nFeeds recorded pointer steps through the pipeline and prints a JSON report.\n--scores takes a JSON array of score vectors used instead of the model."
        ),
        "render" => println!(
            "usage: digitpad render <file.json> --out <image.png> [--display] [--rotate DEG] [--profile FILE]\nWrites the logical raster, turned by --rotate degrees, or the display composite with --display."
        ),
        "tensor" => println!(
            "usage: digitpad tensor <file.json> [--profile FILE]\nPrints the downsampled classifier input, one character per cell."
        ),
        "profiles" => {
            println!("usage: digitpad profiles\nLists available profiles; marks active with '*'.")
        }
        "use" => println!("usage: digitpad use <name>\nSwitches the active profile."),
        "doctor" => println!(
            "usage: digitpad doctor\nChecks permissions, lists touch devices and the configured model."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
