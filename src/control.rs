//! Runtime control surface on stdin.
//!
//! Listens for line commands while the capture loop runs and parses them
//! into [`ControlCommand`] values delivered over a channel. The loop applies
//! commands on its next iteration; nothing here touches shared state
//! directly.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use crate::tuning::TriggerMode;

/// Commands that can be sent through the control channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Enable or disable recording.
    SetRecording(bool),
    /// Push a new exposure value to the device.
    SetExposure(i64),
    /// Push a new gain value to the device.
    SetGain(i64),
    /// Switch the acquisition trigger mode.
    SetTrigger(TriggerMode),
    /// Load a vendor settings file through the device backend.
    LoadSettings(PathBuf),
    /// Stop the capture loop and exit.
    Quit,
}

/// stdin control listener.
///
/// `record on|off` toggles the recording gate, `exposure`/`gain` push
/// device settings, `trigger on|off` switches trigger mode, `load <path>`
/// loads a settings file, and `quit` (or `q`) exits.
pub struct ControlSurface {
    tx: mpsc::Sender<ControlCommand>,
}

impl ControlSurface {
    /// Start listening for commands on stdin.
    ///
    /// Spawns a background thread that reads lines from stdin and sends
    /// parsed commands through the returned channel. Invalid input prints a
    /// usage hint and is dropped.
    pub fn spawn_listener() -> (Self, mpsc::Receiver<ControlCommand>) {
        let (tx, rx) = mpsc::channel();
        let tx_clone = tx.clone();

        thread::spawn(move || {
            let stdin = io::stdin();
            let handle = stdin.lock();

            Self::print_prompt();

            for line in handle.lines() {
                match line {
                    Ok(input) => {
                        if let Some(cmd) = Self::parse_input(&input) {
                            if tx_clone.send(cmd).is_err() {
                                break; // Channel closed
                            }
                        }
                        Self::print_prompt();
                    }
                    Err(_) => break, // EOF or read error
                }
            }
        });

        (Self { tx }, rx)
    }

    /// Parse a line of input into a ControlCommand.
    ///
    /// Returns `None` for empty or invalid input (a usage hint is printed
    /// for the latter).
    pub fn parse_input(input: &str) -> Option<ControlCommand> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        match parts[0].to_lowercase().as_str() {
            "record" => match parts.get(1).map(|s| s.to_lowercase()) {
                Some(ref s) if s == "on" => Some(ControlCommand::SetRecording(true)),
                Some(ref s) if s == "off" => Some(ControlCommand::SetRecording(false)),
                _ => {
                    Self::print_status("Usage: record on|off");
                    None
                }
            },
            "exposure" => Self::parse_value(parts.get(1), "Usage: exposure <value>")
                .map(ControlCommand::SetExposure),
            "gain" => {
                Self::parse_value(parts.get(1), "Usage: gain <value>").map(ControlCommand::SetGain)
            }
            "trigger" => match parts.get(1).map(|s| s.to_lowercase()) {
                Some(ref s) if s == "on" => {
                    Some(ControlCommand::SetTrigger(TriggerMode::Hardware))
                }
                Some(ref s) if s == "off" => {
                    Some(ControlCommand::SetTrigger(TriggerMode::Continuous))
                }
                _ => {
                    Self::print_status("Usage: trigger on|off");
                    None
                }
            },
            "load" => {
                if parts.len() < 2 {
                    Self::print_status("Usage: load <settings-file>");
                    return None;
                }
                // Paths may contain spaces; take everything after the verb.
                let path = trimmed["load".len()..].trim();
                Some(ControlCommand::LoadSettings(PathBuf::from(path)))
            }
            "q" | "quit" | "exit" => Some(ControlCommand::Quit),
            other => {
                Self::print_status(&format!("Unknown command: {}", other));
                Self::print_status(
                    "Available commands: record on|off, exposure <value>, gain <value>, trigger on|off, load <file>, quit",
                );
                None
            }
        }
    }

    fn parse_value(arg: Option<&&str>, usage: &str) -> Option<i64> {
        match arg {
            Some(raw) => match raw.parse::<i64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    Self::print_status(&format!("Invalid value '{}'. {}", raw, usage));
                    None
                }
            },
            None => {
                Self::print_status(usage);
                None
            }
        }
    }

    /// Send a command programmatically (for testing or automation).
    pub fn send(&self, command: ControlCommand) -> Result<(), mpsc::SendError<ControlCommand>> {
        self.tx.send(command)
    }

    fn print_prompt() {
        print!("> ");
        let _ = io::stdout().flush();
    }

    fn print_status(message: &str) {
        println!("{}", message);
    }
}
