//! Background capture thread implementation.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::frame_utils::{convert_to_rgb, mirror_horizontal};
use super::types::{CameraError, CameraSettings, Frame, ReadFailurePolicy, Resolution};
use crate::tuning::{CameraTuning, TriggerMode};

/// Commands sent to the capture thread.
///
/// Tuning commands are dispatched here because the camera handle lives on
/// the capture thread; control surfaces never touch the device directly.
pub enum CaptureCommand {
    Stop,
    SetExposure(i64),
    SetGain(i64),
    SetTrigger(TriggerMode),
    LoadSettings(PathBuf),
}

/// Last-known tuning values, published by the capture thread for overlays.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuningReadout {
    pub exposure_us: Option<i64>,
    pub gain: Option<i64>,
}

/// Run the capture loop in a background thread.
#[allow(clippy::too_many_arguments)]
pub fn run_capture_loop(
    settings: CameraSettings,
    buffer: Arc<Mutex<Option<Frame>>>,
    readout: Arc<Mutex<TuningReadout>>,
    last_error: Arc<Mutex<Option<CameraError>>>,
    stop: Arc<AtomicBool>,
    rx: Receiver<CaptureCommand>,
    info_tx: Sender<Result<(Resolution, u32), CameraError>>,
) {
    let index = CameraIndex::Index(settings.device_index);

    let mut camera = match open_camera_with_fallback(&index, &settings) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(CameraError::StreamFailed(e.to_string())));
        return;
    }

    // Send back the actual resolution and fps
    let res = camera.resolution();
    let actual_res = Resolution {
        width: res.width(),
        height: res.height(),
    };
    let actual_fps = camera.frame_rate();
    let _ = info_tx.send(Ok((actual_res, actual_fps)));

    publish_initial_readout(&camera, &readout);

    // Capture loop
    while !stop.load(Ordering::Relaxed) {
        // Drain pending commands (non-blocking)
        let mut stop_requested = false;
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                CaptureCommand::Stop => {
                    stop_requested = true;
                    break;
                }
                other => apply_tuning_command(&mut camera, other, &readout),
            }
        }
        if stop_requested {
            break;
        }

        match camera.frame() {
            Ok(raw_frame) => {
                // Convert to RGB Frame (handles MJPEG, YUYV, and other formats)
                if let Some(mut frame) = convert_to_rgb(&raw_frame) {
                    if settings.mirror {
                        mirror_horizontal(&mut frame);
                    }

                    if let Ok(mut buf) = buffer.lock() {
                        *buf = Some(frame);
                    }
                }
                // If conversion fails, silently skip this frame and try the next one
            }
            Err(e) => match settings.read_failure {
                // The consumer path stops on a failed read while the
                // industrial path shrugs it off; both behaviors are
                // inherited and intentionally not unified.
                ReadFailurePolicy::Fatal => {
                    log::error!("frame read failed, stopping capture: {}", e);
                    if let Ok(mut err) = last_error.lock() {
                        *err = Some(CameraError::ReadFailed(e.to_string()));
                    }
                    break;
                }
                ReadFailurePolicy::Skip => {
                    log::warn!("frame read failed, skipping: {}", e);
                }
            },
        }

        // Small sleep to allow checking stop signal
        thread::sleep(Duration::from_millis(1));
    }

    // Clean up
    let _ = camera.stop_stream();
}

/// Publish the camera's current exposure/gain for the info overlay.
/// Missing controls simply stay `None`.
fn publish_initial_readout(camera: &Camera, readout: &Arc<Mutex<TuningReadout>>) {
    let exposure = camera.exposure_us().ok();
    let gain = CameraTuning::gain(camera).ok();
    if let Ok(mut r) = readout.lock() {
        r.exposure_us = exposure;
        r.gain = gain;
    }
}

/// Apply a tuning command on the capture thread.
///
/// Failures are reported and the command is dropped; the loop keeps running.
fn apply_tuning_command(
    camera: &mut Camera,
    cmd: CaptureCommand,
    readout: &Arc<Mutex<TuningReadout>>,
) {
    match cmd {
        CaptureCommand::SetExposure(value) => match camera.set_exposure_us(value) {
            Ok(()) => {
                let applied = camera.exposure_us().unwrap_or(value);
                if let Ok(mut r) = readout.lock() {
                    r.exposure_us = Some(applied);
                }
                log::info!("exposure set to {}", applied);
            }
            Err(e) => log::warn!("exposure update failed: {}", e),
        },
        CaptureCommand::SetGain(value) => match camera.set_gain(value) {
            Ok(()) => {
                let applied = CameraTuning::gain(camera).unwrap_or(value);
                if let Ok(mut r) = readout.lock() {
                    r.gain = Some(applied);
                }
                log::info!("gain set to {}", applied);
            }
            Err(e) => log::warn!("gain update failed: {}", e),
        },
        CaptureCommand::SetTrigger(mode) => match camera.set_trigger_mode(mode) {
            Ok(()) => log::info!("trigger mode set to {}", mode),
            Err(e) => log::warn!("trigger mode update failed: {}", e),
        },
        CaptureCommand::LoadSettings(path) => match camera.load_settings_file(&path) {
            Ok(()) => log::info!("settings loaded from {}", path.display()),
            Err(e) => log::warn!("settings load failed: {}", e),
        },
        CaptureCommand::Stop => unreachable!("Stop is handled by the caller"),
    }
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(
    index: &CameraIndex,
    settings: &CameraSettings,
) -> Result<Camera, CameraError> {
    // Try multiple format strategies in order of preference:
    // 1. Closest match with NV12 (common on macOS)
    // 2. Closest match with MJPEG (widely supported)
    // 3. Highest resolution available (let camera decide format)
    let format_attempts: Vec<RequestedFormat> = vec![
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            nokhwa::utils::Resolution::new(settings.resolution.width, settings.resolution.height),
            NokhwaFrameFormat::NV12,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            nokhwa::utils::Resolution::new(settings.resolution.width, settings.resolution.height),
            NokhwaFrameFormat::MJPEG,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;

    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    let e = last_error.unwrap();
    let msg = e.to_string().to_lowercase();
    if msg.contains("permission")
        || msg.contains("denied")
        || msg.contains("authorization")
        || msg.contains("access")
    {
        Err(CameraError::PermissionDenied)
    } else {
        Err(CameraError::OpenFailed(e.to_string()))
    }
}
