//! Device tuning behind a narrow capability interface.
//!
//! Industrial cameras expose exposure/gain/trigger control through closed
//! vendor SDKs. That surface is represented here as the [`CameraTuning`]
//! trait so the capture loop never talks to a driver directly. The consumer
//! backend maps the trait onto UVC camera controls via nokhwa and reports
//! `Unsupported` for capabilities only a vendor SDK provides (hardware
//! trigger, vendor settings files).

use std::fmt;
use std::path::Path;

use nokhwa::utils::{ControlValueSetter, KnownCameraControl};
use nokhwa::Camera;
use thiserror::Error;

/// Camera acquisition trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Free-running continuous acquisition.
    Continuous,
    /// Capture initiated by an external hardware signal.
    Hardware,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Continuous => write!(f, "continuous"),
            TriggerMode::Hardware => write!(f, "hardware"),
        }
    }
}

/// Errors reported by the tuning interface.
#[derive(Debug, Error)]
pub enum TuningError {
    /// The backend has no implementation for this capability.
    #[error("{0} is not supported by this device")]
    Unsupported(&'static str),
    /// The device rejected the requested value.
    #[error("device rejected {what}: {reason}")]
    Rejected { what: &'static str, reason: String },
    /// Reading a control back from the device failed.
    #[error("failed to read {what}: {reason}")]
    ReadBackFailed { what: &'static str, reason: String },
}

/// Capability interface over opaque device control.
///
/// Exposure is passed through in the device's native exposure units;
/// no conversion is attempted on this side of the boundary.
pub trait CameraTuning {
    fn exposure_us(&self) -> Result<i64, TuningError>;
    fn set_exposure_us(&mut self, value: i64) -> Result<(), TuningError>;
    fn gain(&self) -> Result<i64, TuningError>;
    fn set_gain(&mut self, value: i64) -> Result<(), TuningError>;
    fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<(), TuningError>;
    fn load_settings_file(&mut self, path: &Path) -> Result<(), TuningError>;
}

fn read_integer_control(
    camera: &Camera,
    id: KnownCameraControl,
    what: &'static str,
) -> Result<i64, TuningError> {
    let control = camera
        .camera_control(id)
        .map_err(|e| TuningError::ReadBackFailed {
            what,
            reason: e.to_string(),
        })?;
    match control.value() {
        ControlValueSetter::Integer(v) => Ok(v),
        other => Err(TuningError::ReadBackFailed {
            what,
            reason: format!("unexpected control value {:?}", other),
        }),
    }
}

impl CameraTuning for Camera {
    fn exposure_us(&self) -> Result<i64, TuningError> {
        read_integer_control(self, KnownCameraControl::Exposure, "exposure")
    }

    fn set_exposure_us(&mut self, value: i64) -> Result<(), TuningError> {
        self.set_camera_control(
            KnownCameraControl::Exposure,
            ControlValueSetter::Integer(value),
        )
        .map_err(|e| TuningError::Rejected {
            what: "exposure",
            reason: e.to_string(),
        })
    }

    fn gain(&self) -> Result<i64, TuningError> {
        read_integer_control(self, KnownCameraControl::Gain, "gain")
    }

    fn set_gain(&mut self, value: i64) -> Result<(), TuningError> {
        self.set_camera_control(KnownCameraControl::Gain, ControlValueSetter::Integer(value))
            .map_err(|e| TuningError::Rejected {
                what: "gain",
                reason: e.to_string(),
            })
    }

    fn set_trigger_mode(&mut self, _mode: TriggerMode) -> Result<(), TuningError> {
        // Trigger wiring only exists behind vendor SDKs.
        Err(TuningError::Unsupported("trigger mode"))
    }

    fn load_settings_file(&mut self, _path: &Path) -> Result<(), TuningError> {
        // Settings files are a vendor-defined format loaded opaquely by the
        // SDK; there is nothing to parse on this side.
        Err(TuningError::Unsupported("settings file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory tuning backend used to exercise the trait seam.
    pub struct FakeTuning {
        pub exposure: i64,
        pub gain: i64,
        pub trigger: TriggerMode,
        pub reject_exposure: bool,
    }

    impl CameraTuning for FakeTuning {
        fn exposure_us(&self) -> Result<i64, TuningError> {
            Ok(self.exposure)
        }

        fn set_exposure_us(&mut self, value: i64) -> Result<(), TuningError> {
            if self.reject_exposure {
                return Err(TuningError::Rejected {
                    what: "exposure",
                    reason: "out of range".to_string(),
                });
            }
            self.exposure = value;
            Ok(())
        }

        fn gain(&self) -> Result<i64, TuningError> {
            Ok(self.gain)
        }

        fn set_gain(&mut self, value: i64) -> Result<(), TuningError> {
            self.gain = value;
            Ok(())
        }

        fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<(), TuningError> {
            self.trigger = mode;
            Ok(())
        }

        fn load_settings_file(&mut self, _path: &Path) -> Result<(), TuningError> {
            Err(TuningError::Unsupported("settings file"))
        }
    }

    fn fake() -> FakeTuning {
        FakeTuning {
            exposure: 10_000,
            gain: 1,
            trigger: TriggerMode::Continuous,
            reject_exposure: false,
        }
    }

    #[test]
    fn test_set_and_read_exposure() {
        let mut tuning = fake();
        tuning.set_exposure_us(20_000).unwrap();
        assert_eq!(tuning.exposure_us().unwrap(), 20_000);
    }

    #[test]
    fn test_rejected_exposure_leaves_value_unchanged() {
        let mut tuning = fake();
        tuning.reject_exposure = true;
        let err = tuning.set_exposure_us(1).unwrap_err();
        assert!(err.to_string().contains("rejected"));
        assert_eq!(tuning.exposure_us().unwrap(), 10_000);
    }

    #[test]
    fn test_trigger_mode_display() {
        assert_eq!(format!("{}", TriggerMode::Continuous), "continuous");
        assert_eq!(format!("{}", TriggerMode::Hardware), "hardware");
    }

    #[test]
    fn test_unsupported_error_message() {
        let err = TuningError::Unsupported("trigger mode");
        assert_eq!(
            err.to_string(),
            "trigger mode is not supported by this device"
        );
    }
}
