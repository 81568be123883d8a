//! Global hotkey handling for diffscope.
//!
//! This module provides global keyboard capture for the viewer hotkeys.
//! Uses rdev for cross-platform global key listening.

use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Represents a hotkey event that occurred
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotkeyEvent {
    /// Toggle recording on/off ('r')
    ToggleRecording,
    /// Quit the viewer ('q')
    Quit,
}

/// Manages global hotkey listening and the recording/quit flags
pub struct HotkeyManager {
    /// Current recording flag
    recording: Arc<AtomicBool>,
    /// Flag indicating the recording state changed since last check
    recording_changed: Arc<AtomicBool>,
    /// Flag set when the quit hotkey fires
    quit_requested: Arc<AtomicBool>,
    /// Flag to stop the listener thread
    stop_flag: Arc<AtomicBool>,
    /// Handle to the listener thread
    listener_thread: Option<JoinHandle<()>>,
}

impl HotkeyManager {
    /// Create a new HotkeyManager with the given initial recording state.
    pub fn new(recording: bool) -> Self {
        HotkeyManager {
            recording: Arc::new(AtomicBool::new(recording)),
            recording_changed: Arc::new(AtomicBool::new(false)),
            quit_requested: Arc::new(AtomicBool::new(false)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            listener_thread: None,
        }
    }

    /// Start listening for global hotkeys.
    ///
    /// This spawns a background thread that captures global keyboard events.
    /// Returns an error if the listener is already running.
    pub fn start(&mut self) -> Result<(), String> {
        if self.listener_thread.is_some() {
            return Err("Hotkey listener already running".to_string());
        }

        let recording = self.recording.clone();
        let recording_changed = self.recording_changed.clone();
        let quit_requested = self.quit_requested.clone();
        let stop_flag = self.stop_flag.clone();

        let handle = thread::spawn(move || {
            let callback = move |event: Event| {
                // Check stop flag periodically
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }

                if let EventType::KeyPress(key) = event.event_type {
                    match key {
                        Key::KeyR => {
                            let was = recording.fetch_xor(true, Ordering::SeqCst);
                            recording_changed.store(true, Ordering::SeqCst);
                            eprintln!(
                                "[hotkey] Recording: {}",
                                if was { "off" } else { "on" }
                            );
                        }
                        Key::KeyQ => {
                            quit_requested.store(true, Ordering::SeqCst);
                        }
                        _ => {}
                    }
                }
            };

            // Start the global listener (blocks until error or stopped)
            // Note: On macOS, this requires Accessibility permissions
            if let Err(e) = listen(callback) {
                eprintln!("[hotkey] Listener error: {:?}", e);
            }
        });

        self.listener_thread = Some(handle);
        Ok(())
    }

    /// Stop the hotkey listener.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        // Note: rdev's listen() doesn't have a clean way to stop,
        // so the thread will continue until the process exits.
        // The stop_flag prevents processing new events.
        self.listener_thread = None;
    }

    /// Get the current recording flag.
    pub fn recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Overwrite the recording flag (used when a control command toggles it).
    pub fn set_recording(&self, on: bool) {
        if self.recording.swap(on, Ordering::SeqCst) != on {
            self.recording_changed.store(true, Ordering::SeqCst);
        }
    }

    /// Check if the recording flag changed since last check, and reset the flag.
    pub fn take_recording_changed(&self) -> bool {
        self.recording_changed.swap(false, Ordering::SeqCst)
    }

    /// Whether the quit hotkey has fired.
    pub fn quit_requested(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.stop();
    }
}
