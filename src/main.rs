use clap::{Parser, Subcommand};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use diffscope::camera::{
    self, CameraCapture, CameraSettings, ReadFailurePolicy, Resolution,
};
use diffscope::config::Config;
use diffscope::control::{ControlCommand, ControlSurface};
use diffscope::diff::{absdiff, to_grayscale, GrayFrame};
use diffscope::fps::FpsCounter;
use diffscope::hotkeys::HotkeyManager;
use diffscope::overlay::{draw_text, line_height, OVERLAY_COLOR};
use diffscope::recorder::Recorder;
use diffscope::sink::{session_paths, PixelLayout, RawVideoSink, SinkError};

/// Parse and validate resolution (WIDTHxHEIGHT format)
fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid resolution format '{}'. Use WIDTHxHEIGHT (e.g., 1280x720)",
            s
        ));
    }
    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width '{}' in resolution", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height '{}' in resolution", parts[1]))?;
    if width == 0 || height == 0 {
        return Err("Resolution width and height must be greater than 0".to_string());
    }
    if width > 7680 || height > 4320 {
        return Err("Resolution exceeds maximum supported (7680x4320)".to_string());
    }
    Ok(Resolution { width, height })
}

/// Parse and validate framerate (1-120 fps)
fn parse_framerate(s: &str) -> Result<u32, String> {
    let fps: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid framerate", s))?;
    if !(1..=120).contains(&fps) {
        return Err(format!(
            "Framerate must be between 1 and 120 fps, got {}",
            fps
        ));
    }
    Ok(fps)
}

/// diffscope: Live camera viewer with frame differencing
#[derive(Parser)]
#[command(name = "diffscope")]
#[command(version, about = "Live camera viewer with frame differencing")]
#[command(long_about = "Shows a live camera feed next to a grayscale motion image \
    (per-pixel absolute difference between consecutive frames), with an FPS \
    readout stamped into the picture. Can record both streams to timestamped \
    video files and push exposure/gain settings to the device at runtime.")]
#[command(after_help = "EXAMPLES:
    # View the default webcam
    diffscope start

    # Record from startup, mirrored, into ~/captures
    diffscope start --record --mirror --output-dir ~/captures

    # Industrial camera: dropped frames are skipped, exposure shown on screen
    diffscope start --industrial --device 1

    # List available devices
    diffscope list-devices

HOTKEYS (while running):
    r       Toggle recording
    q       Quit
    Ctrl+C  Quit

COMMANDS (typed on stdin while running):
    record on|off      Toggle recording
    exposure <value>   Set exposure (microseconds)
    gain <value>       Set gain
    trigger on|off     Hardware trigger mode
    load <file>        Load a vendor settings file
    quit               Exit")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available camera devices
    ListDevices,

    /// Start the viewer (two preview windows, optional recording)
    Start {
        /// Camera device index (see list-devices)
        #[arg(long, short = 'd')]
        device: Option<u32>,

        /// Treat the device as an industrial camera: a failed frame read is
        /// logged and skipped instead of stopping capture, and the overlay
        /// shows resolution and exposure
        #[arg(long, short = 'i')]
        industrial: bool,

        /// Mirror (horizontally flip) the camera image
        #[arg(long)]
        mirror: bool,

        /// Start with recording enabled (skips the startup prompt)
        #[arg(long, short = 'R')]
        record: bool,

        /// Never record this session (skips the startup prompt)
        #[arg(long, conflicts_with = "record")]
        no_record: bool,

        /// Disable the preview windows (useful for headless recording)
        #[arg(long)]
        no_preview: bool,

        /// Directory for recorded video files (default: current directory)
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,

        /// Capture resolution (WIDTHxHEIGHT, e.g., 1280x720)
        #[arg(long, short = 'r', value_parser = parse_resolution)]
        resolution: Option<Resolution>,

        /// Capture framerate (1-120 fps, default: 30)
        #[arg(long, short = 'f', value_parser = parse_framerate)]
        framerate: Option<u32>,

        /// Custom config file path (default: ~/.config/diffscope/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

// Ctrl+C handling

static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
    })
}

fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Everything `start` needs after config merging.
struct StartOptions {
    settings: CameraSettings,
    industrial: bool,
    output_dir: PathBuf,
    /// Recording enabled from the first frame
    record: bool,
    no_preview: bool,
    show_fps: bool,
    overlay_scale: u32,
}

/// Ask on stdin whether this session should record from the start.
fn prompt_record_session() -> bool {
    print!("Record this session? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Open the encoder pair for one recording session.
///
/// Both files share the session timestamp; nothing is created on disk until
/// this is called, so a session that never records leaves no files behind.
fn open_recorder(
    dir: &Path,
    resolution: Resolution,
    fps: u32,
) -> Result<Recorder<RawVideoSink>, SinkError> {
    std::fs::create_dir_all(dir)?;
    let (video_path, diff_path) = session_paths(dir);
    let video = RawVideoSink::encoder(
        &video_path,
        resolution.width,
        resolution.height,
        fps,
        PixelLayout::Rgb24,
    )?;
    let diff = RawVideoSink::encoder(
        &diff_path,
        resolution.width,
        resolution.height,
        fps,
        PixelLayout::Gray8,
    )?;
    println!("Recording to: {}", video_path.display());
    println!("          and {}", diff_path.display());
    Ok(Recorder::new(video, diff, true))
}

/// Finish an encoder and surface its stderr if it failed.
fn finish_encoder(mut sink: RawVideoSink) {
    match sink.finish() {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let stderr = sink.take_stderr_output();
            eprintln!(
                "Warning: encoder exited with code {:?}\n{}",
                status.code(),
                stderr.join("\n")
            );
        }
        Err(e) => eprintln!("Warning: failed to finish encoder: {}", e),
    }
}

/// Run the viewer loop.
fn run_start(opts: StartOptions) -> Result<(), String> {
    if let Err(e) = setup_ctrlc_handler() {
        eprintln!("Warning: Could not set up Ctrl+C handler: {}", e);
    }

    // Open the camera before anything touches the filesystem: a device
    // failure must not leave empty output files behind.
    let mut capture = CameraCapture::open(opts.settings.clone()).map_err(|e| e.to_string())?;
    capture.start().map_err(|e| e.to_string())?;

    let resolution = capture
        .actual_resolution()
        .unwrap_or(opts.settings.resolution);
    let fps_rate = capture.actual_fps().unwrap_or(opts.settings.fps);
    println!("Capturing at {} @ {} fps", resolution, fps_rate);

    let mut video_preview = None;
    let mut diff_preview = None;
    if !opts.no_preview {
        match RawVideoSink::preview(
            "Webcam",
            resolution.width,
            resolution.height,
            fps_rate,
            PixelLayout::Rgb24,
        )
        .and_then(|v| {
            RawVideoSink::preview(
                "Frame Difference",
                resolution.width,
                resolution.height,
                fps_rate,
                PixelLayout::Gray8,
            )
            .map(|d| (v, d))
        }) {
            Ok((v, d)) => {
                video_preview = Some(v);
                diff_preview = Some(d);
            }
            Err(e) => {
                capture.stop();
                return Err(e.to_string());
            }
        }
    }

    let mut hotkey_manager = HotkeyManager::new(opts.record);
    if hotkey_manager.start().is_err() {
        eprintln!("Warning: Could not start hotkey listener. The 'r'/'q' hotkeys will not work.");
        eprintln!("On macOS, ensure Accessibility permission is granted.\n");
    }
    let (_control, control_rx) = ControlSurface::spawn_listener();

    let mut fps_counter = FpsCounter::new();
    let mut recorder: Option<Recorder<RawVideoSink>> = None;
    let mut prev_gray: Option<GrayFrame> = None;
    let mut last_timestamp = None;
    let mut fatal: Option<String> = None;

    'main: loop {
        if ctrlc_received() || hotkey_manager.quit_requested() {
            println!("\nShutting down...");
            break;
        }

        // Apply pending control commands (non-blocking)
        while let Ok(cmd) = control_rx.try_recv() {
            match cmd {
                ControlCommand::SetRecording(on) => hotkey_manager.set_recording(on),
                ControlCommand::SetExposure(value) => capture.set_exposure(value),
                ControlCommand::SetGain(value) => capture.set_gain(value),
                ControlCommand::SetTrigger(mode) => capture.set_trigger_mode(mode),
                ControlCommand::LoadSettings(path) => capture.load_settings(path),
                ControlCommand::Quit => break 'main,
            }
        }

        // Bounded wait for a fresh frame. Under the industrial policy a
        // dropped read just means the wait times out and we try again.
        let mut frame = match capture.wait_for_frame(last_timestamp, Duration::from_millis(1000)) {
            Some(f) => f,
            None => {
                if let Some(e) = capture.take_error() {
                    fatal = Some(e.to_string());
                    break;
                }
                if !capture.is_running() {
                    fatal = Some("camera capture stopped unexpectedly".to_string());
                    break;
                }
                log::warn!("no frame within 1000 ms, retrying");
                continue;
            }
        };
        last_timestamp = Some(frame.timestamp);

        let gray = to_grayscale(&frame);
        // First frame differences against itself, giving an all-black image.
        // A dimension change mid-stream resyncs the same way.
        let diff = prev_gray
            .as_ref()
            .and_then(|prev| absdiff(prev, &gray).ok())
            .unwrap_or_else(|| GrayFrame {
                data: vec![0; gray.data.len()],
                width: gray.width,
                height: gray.height,
            });
        prev_gray = Some(gray);

        fps_counter.tick();

        if opts.show_fps {
            draw_text(
                &mut frame,
                &fps_counter.label(),
                10,
                10,
                OVERLAY_COLOR,
                opts.overlay_scale,
            );
        }
        if opts.industrial {
            let readout = capture.tuning_readout();
            let status = match readout.exposure_us {
                Some(exp) => format!("{} EXP: {}US", resolution, exp),
                None => resolution.to_string(),
            };
            draw_text(
                &mut frame,
                &status,
                10,
                10 + line_height(opts.overlay_scale) + 4,
                OVERLAY_COLOR,
                opts.overlay_scale,
            );
        }

        // A write failure means the preview child is gone (window closed),
        // which ends the session.
        if let Some(preview) = video_preview.as_mut() {
            if preview.write_frame(&frame.data).is_err() {
                println!("\nPreview window closed.");
                break;
            }
        }
        if let Some(preview) = diff_preview.as_mut() {
            if preview.write_frame(&diff.data).is_err() {
                println!("\nPreview window closed.");
                break;
            }
        }

        // Recording gate: sinks are opened lazily on the first enable so a
        // session that never records creates no files.
        let want_record = hotkey_manager.recording();
        if want_record && recorder.is_none() {
            match open_recorder(&opts.output_dir, resolution, fps_rate) {
                Ok(r) => recorder = Some(r),
                Err(e) => {
                    eprintln!("Error: could not start recording: {}", e);
                    hotkey_manager.set_recording(false);
                }
            }
        }
        if let Some(r) = recorder.as_mut() {
            r.set_enabled(want_record);
            if let Err(e) = r.write(&frame.data, &diff.data) {
                fatal = Some(format!("recording failed: {}", e));
                break;
            }
        }
    }

    // Shutdown: stop the camera first, then close the sinks so ffmpeg can
    // finalize the files.
    capture.stop();
    hotkey_manager.stop();

    if let Some(r) = recorder.take() {
        let (video, diff) = r.into_parts();
        finish_encoder(video);
        finish_encoder(diff);
    }
    if let Some(mut preview) = video_preview.take() {
        let _ = preview.finish();
    }
    if let Some(mut preview) = diff_preview.take() {
        let _ = preview.finish();
    }

    if let Some(msg) = fatal {
        return Err(msg);
    }
    println!("Capture stopped.");
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListDevices) => match camera::list_devices() {
            Ok(devices) => camera::print_devices(&devices),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Start {
            device,
            industrial,
            mirror,
            record,
            no_record,
            no_preview,
            output_dir,
            resolution,
            framerate,
            config: config_path,
        }) => {
            // Load config file
            // If --config is specified, require the file to exist
            // Otherwise, fall back to defaults if default config not found
            let cfg = if let Some(ref path) = config_path {
                if !path.exists() {
                    eprintln!("Error: config file '{}' not found", path.display());
                    std::process::exit(1);
                }
                match Config::load(Some(path)) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                match Config::load(None) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("Warning: Failed to load config file: {}", e);
                        eprintln!("Using default settings.\n");
                        Config::default()
                    }
                }
            };

            // Merge settings: CLI args > config file > built-in defaults
            let device = device.unwrap_or(cfg.camera.device);
            let mirror = mirror || cfg.camera.mirror;
            let industrial = industrial || cfg.camera.industrial;

            let resolution = match resolution {
                Some(r) => r,
                None => match cfg.camera.resolution.as_deref().map(parse_resolution) {
                    Some(Ok(r)) => r,
                    Some(Err(e)) => {
                        eprintln!("Error in config file: {}", e);
                        std::process::exit(1);
                    }
                    None => Resolution::default(),
                },
            };
            let framerate = framerate.or(cfg.camera.fps).unwrap_or(30);

            let output_dir = output_dir
                .or(cfg.output.directory)
                .unwrap_or_else(|| PathBuf::from("."));

            // Recording: explicit flags skip the prompt
            let record = if record {
                true
            } else if no_record {
                false
            } else {
                prompt_record_session()
            };

            let settings = CameraSettings {
                device_index: device,
                resolution,
                fps: framerate,
                mirror,
                read_failure: if industrial {
                    ReadFailurePolicy::Skip
                } else {
                    ReadFailurePolicy::Fatal
                },
            };

            let opts = StartOptions {
                settings,
                industrial,
                output_dir,
                record,
                no_preview,
                show_fps: cfg.overlay.show_fps,
                overlay_scale: cfg.overlay.scale,
            };

            if let Err(e) = run_start(opts) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            // Show brief help when no command is provided
            println!("diffscope {}", env!("CARGO_PKG_VERSION"));
            println!("Live camera viewer with frame differencing\n");
            println!("USAGE:");
            println!("    diffscope <COMMAND>\n");
            println!("COMMANDS:");
            println!("    start         Start the viewer (two preview windows, optional recording)");
            println!("    list-devices  List available camera devices");
            println!("    help          Print this message or the help of a subcommand\n");
            println!("Run 'diffscope --help' for more details and examples.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Resolution parsing tests

    #[test]
    fn test_parse_resolution_valid() {
        assert_eq!(
            parse_resolution("1920x1080").unwrap(),
            Resolution {
                width: 1920,
                height: 1080
            }
        );
        assert_eq!(
            parse_resolution("640x480").unwrap(),
            Resolution {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn test_parse_resolution_invalid_format() {
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("1920:1080").is_err());
        assert!(parse_resolution("1920-1080").is_err());
        assert!(parse_resolution("widthxheight").is_err());
    }

    #[test]
    fn test_parse_resolution_zero_values() {
        assert!(parse_resolution("0x1080").is_err());
        assert!(parse_resolution("1920x0").is_err());
    }

    #[test]
    fn test_parse_resolution_too_large() {
        assert!(parse_resolution("10000x10000").is_err());
    }

    // Framerate parsing tests

    #[test]
    fn test_parse_framerate_valid() {
        assert_eq!(parse_framerate("30").unwrap(), 30);
        assert_eq!(parse_framerate("60").unwrap(), 60);
        assert_eq!(parse_framerate("1").unwrap(), 1);
        assert_eq!(parse_framerate("120").unwrap(), 120);
    }

    #[test]
    fn test_parse_framerate_invalid() {
        assert!(parse_framerate("0").is_err());
        assert!(parse_framerate("121").is_err());
        assert!(parse_framerate("-1").is_err());
        assert!(parse_framerate("abc").is_err());
    }

    // Read-failure policy merge logic

    #[test]
    fn test_industrial_flag_selects_skip_policy() {
        // Mirrors the logic in main(): --industrial flips the policy
        let industrial = true;
        let policy = if industrial {
            ReadFailurePolicy::Skip
        } else {
            ReadFailurePolicy::Fatal
        };
        assert_eq!(policy, ReadFailurePolicy::Skip);

        let industrial = false;
        let policy = if industrial {
            ReadFailurePolicy::Skip
        } else {
            ReadFailurePolicy::Fatal
        };
        assert_eq!(policy, ReadFailurePolicy::Fatal);
    }

    // Recording decision logic

    #[test]
    fn test_record_flags_skip_prompt() {
        // Mirrors the logic in main(): explicit flags decide without prompting
        let record_flag = true;
        let no_record = false;
        let decided = if record_flag {
            Some(true)
        } else if no_record {
            Some(false)
        } else {
            None // would prompt
        };
        assert_eq!(decided, Some(true));

        let record_flag = false;
        let no_record = true;
        let decided = if record_flag {
            Some(true)
        } else if no_record {
            Some(false)
        } else {
            None
        };
        assert_eq!(decided, Some(false));

        let no_record = false;
        let decided = if record_flag {
            Some(true)
        } else if no_record {
            Some(false)
        } else {
            None
        };
        assert_eq!(decided, None);
    }

    #[test]
    fn test_cli_parses_start_flags() {
        let cli = Cli::try_parse_from([
            "diffscope",
            "start",
            "--device",
            "1",
            "--industrial",
            "--mirror",
            "--no-record",
            "--resolution",
            "1280x720",
            "--framerate",
            "60",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Start {
                device,
                industrial,
                mirror,
                record,
                no_record,
                resolution,
                framerate,
                ..
            }) => {
                assert_eq!(device, Some(1));
                assert!(industrial);
                assert!(mirror);
                assert!(!record);
                assert!(no_record);
                assert_eq!(
                    resolution,
                    Some(Resolution {
                        width: 1280,
                        height: 720
                    })
                );
                assert_eq!(framerate, Some(60));
            }
            _ => panic!("expected start subcommand"),
        }
    }

    #[test]
    fn test_cli_rejects_record_with_no_record() {
        assert!(Cli::try_parse_from(["diffscope", "start", "--record", "--no-record"]).is_err());
    }

    #[test]
    fn test_cli_parses_list_devices() {
        let cli = Cli::try_parse_from(["diffscope", "list-devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ListDevices)));
    }
}
