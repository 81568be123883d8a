//! Camera capture handle and public API.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::capture_loop::{run_capture_loop, CaptureCommand, TuningReadout};
use super::device::list_devices;
use super::types::{CameraError, CameraSettings, Frame, Resolution};
use crate::tuning::TriggerMode;

/// Camera capture handle.
///
/// Wraps a nokhwa Camera and provides methods for capture operations.
/// Use `open()` to create a new instance with specified settings.
///
/// The camera runs a background thread that continuously captures frames
/// and stores the latest frame in a shared buffer. Call `start()` to begin
/// capturing; `get_frame()` returns the latest frame and `wait_for_frame()`
/// blocks with a bounded wait for a fresh one. Tuning commands are routed
/// to the thread that owns the device handle.
pub struct CameraCapture {
    /// Latest captured frame (shared with capture thread)
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    /// Last-known tuning values (published by capture thread)
    readout: Arc<Mutex<TuningReadout>>,
    /// Terminal capture error, if the thread stopped on its own
    last_error: Arc<Mutex<Option<CameraError>>>,
    /// Capture thread handle
    capture_thread: Option<JoinHandle<()>>,
    /// Channel to send commands to capture thread
    command_tx: Option<Sender<CaptureCommand>>,
    /// Signal to stop capture thread
    stop_signal: Arc<AtomicBool>,
    /// Current settings
    settings: CameraSettings,
    /// Actual resolution (set after camera opens)
    actual_resolution: Option<Resolution>,
    /// Actual FPS (set after camera opens)
    actual_fps: Option<u32>,
}

impl std::fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCapture")
            .field("settings", &self.settings)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CameraCapture {
    /// Open a camera with the specified settings.
    ///
    /// This validates that the camera exists but doesn't actually open
    /// the camera stream until `start()` is called. The camera is opened
    /// inside the background thread to avoid thread-safety issues.
    ///
    /// # Errors
    /// * `CameraError::DeviceNotFound` - If the device index doesn't exist
    pub fn open(settings: CameraSettings) -> Result<Self, CameraError> {
        let devices = list_devices()?;
        if !devices.iter().any(|d| d.index == settings.device_index) {
            return Err(CameraError::DeviceNotFound(settings.device_index));
        }

        Ok(Self {
            frame_buffer: Arc::new(Mutex::new(None)),
            readout: Arc::new(Mutex::new(TuningReadout::default())),
            last_error: Arc::new(Mutex::new(None)),
            capture_thread: None,
            command_tx: None,
            stop_signal: Arc::new(AtomicBool::new(false)),
            settings,
            actual_resolution: None,
            actual_fps: None,
        })
    }

    /// Get the current camera settings.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Get the actual resolution the camera is using.
    ///
    /// Returns `None` if the camera hasn't been started yet.
    /// This may differ from the requested resolution if the camera
    /// doesn't support it exactly.
    pub fn actual_resolution(&self) -> Option<Resolution> {
        self.actual_resolution
    }

    /// Get the actual frame rate the camera is using.
    pub fn actual_fps(&self) -> Option<u32> {
        self.actual_fps
    }

    /// Start capturing frames in a background thread.
    ///
    /// # Errors
    /// * `CameraError::AlreadyRunning` - If capture is already running
    /// * `CameraError::StreamFailed` - If the camera stream fails to start
    /// * `CameraError::PermissionDenied` - If camera access is denied (macOS)
    /// * `CameraError::OpenFailed` - If camera fails to open for other reasons
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.is_running() {
            return Err(CameraError::AlreadyRunning);
        }

        self.stop_signal.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel();
        self.command_tx = Some(tx);

        let buffer = Arc::clone(&self.frame_buffer);
        let readout = Arc::clone(&self.readout);
        let last_error = Arc::clone(&self.last_error);
        let stop = Arc::clone(&self.stop_signal);
        let settings = self.settings.clone();

        // Channel to receive actual resolution/fps from thread
        let (info_tx, info_rx) = mpsc::channel::<Result<(Resolution, u32), CameraError>>();

        let handle = std::thread::spawn(move || {
            run_capture_loop(settings, buffer, readout, last_error, stop, rx, info_tx);
        });

        self.capture_thread = Some(handle);

        // Wait for the thread to report success or failure
        match info_rx.recv() {
            Ok(Ok((res, fps))) => {
                self.actual_resolution = Some(res);
                self.actual_fps = Some(fps);
                Ok(())
            }
            Ok(Err(e)) => {
                self.stop_signal.store(true, Ordering::SeqCst);
                if let Some(h) = self.capture_thread.take() {
                    let _ = h.join();
                }
                Err(e)
            }
            Err(_) => {
                self.stop_signal.store(true, Ordering::SeqCst);
                if let Some(h) = self.capture_thread.take() {
                    let _ = h.join();
                }
                Err(CameraError::StreamFailed(
                    "Capture thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }

    /// Stop the capture thread.
    ///
    /// This will signal the background thread to stop and wait for it to finish.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        // Also send stop command via channel (in case thread is blocked)
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }

        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }

    /// Get the latest captured frame.
    ///
    /// Returns `None` if no frame has been captured yet or if capturing
    /// is not running.
    pub fn get_frame(&self) -> Option<Frame> {
        let buffer = self.frame_buffer.lock().ok()?;
        buffer.clone()
    }

    /// Wait for a frame newer than `after`, with a bounded wait.
    ///
    /// Polls the shared buffer until a frame with a later capture timestamp
    /// shows up or `timeout` expires. Returns `None` on timeout or when the
    /// capture thread has stopped.
    pub fn wait_for_frame(&self, after: Option<Instant>, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.get_frame() {
                let fresh = match after {
                    Some(ts) => frame.timestamp > ts,
                    None => true,
                };
                if fresh {
                    return Some(frame);
                }
            }
            if !self.is_running() || Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Take the terminal error left behind by the capture thread, if any.
    pub fn take_error(&self) -> Option<CameraError> {
        self.last_error.lock().ok().and_then(|mut e| e.take())
    }

    /// Last-known exposure/gain values for the info overlay.
    pub fn tuning_readout(&self) -> TuningReadout {
        self.readout
            .lock()
            .map(|r| *r)
            .unwrap_or_default()
    }

    /// Request an exposure change on the capture thread.
    pub fn set_exposure(&self, value: i64) {
        self.send_command(CaptureCommand::SetExposure(value));
    }

    /// Request a gain change on the capture thread.
    pub fn set_gain(&self, value: i64) {
        self.send_command(CaptureCommand::SetGain(value));
    }

    /// Request a trigger mode change on the capture thread.
    pub fn set_trigger_mode(&self, mode: TriggerMode) {
        self.send_command(CaptureCommand::SetTrigger(mode));
    }

    /// Request a settings-file load on the capture thread.
    pub fn load_settings(&self, path: PathBuf) {
        self.send_command(CaptureCommand::LoadSettings(path));
    }

    fn send_command(&self, cmd: CaptureCommand) {
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(cmd);
        }
    }

    /// Check if the capture thread is currently running.
    pub fn is_running(&self) -> bool {
        self.capture_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
