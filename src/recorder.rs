//! Recording gate in front of the output video sinks.

use crate::sink::{RawVideoSink, SinkError};

/// Anything that accepts raw frame bytes. Lets the gate be exercised
/// without spawning encoder processes.
pub trait FrameWrite {
    fn write_frame(&mut self, data: &[u8]) -> Result<(), SinkError>;
}

impl FrameWrite for RawVideoSink {
    fn write_frame(&mut self, data: &[u8]) -> Result<(), SinkError> {
        RawVideoSink::write_frame(self, data)
    }
}

/// Gates writes to the raw-frame and difference-frame sinks on the
/// recording flag.
///
/// Both sinks are opened once at session start and stay open until
/// shutdown; the flag only decides whether a given iteration's frames
/// are appended. Frames captured while the flag is off are never written.
pub struct Recorder<W: FrameWrite> {
    enabled: bool,
    video: W,
    diff: W,
}

impl<W: FrameWrite> Recorder<W> {
    pub fn new(video: W, diff: W, enabled: bool) -> Self {
        Self {
            enabled,
            video,
            diff,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            log::info!(
                "recording {}",
                if enabled { "started" } else { "paused" }
            );
        }
        self.enabled = enabled;
    }

    /// Append the current frame pair if recording is enabled.
    ///
    /// Returns `true` when the frames were written, `false` when the gate
    /// was closed.
    pub fn write(&mut self, frame: &[u8], diff: &[u8]) -> Result<bool, SinkError> {
        if !self.enabled {
            return Ok(false);
        }
        self.video.write_frame(frame)?;
        self.diff.write_frame(diff)?;
        Ok(true)
    }

    /// Hand the sinks back for shutdown.
    pub fn into_parts(self) -> (W, W) {
        (self.video, self.diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects written frames in memory.
    #[derive(Default)]
    struct MemorySink {
        frames: Vec<Vec<u8>>,
    }

    impl FrameWrite for MemorySink {
        fn write_frame(&mut self, data: &[u8]) -> Result<(), SinkError> {
            self.frames.push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_disabled_recorder_writes_nothing() {
        let mut recorder = Recorder::new(MemorySink::default(), MemorySink::default(), false);
        assert!(!recorder.write(&[1, 2, 3], &[4]).unwrap());
        let (video, diff) = recorder.into_parts();
        assert!(video.frames.is_empty());
        assert!(diff.frames.is_empty());
    }

    #[test]
    fn test_only_frames_after_enable_are_written() {
        let mut recorder = Recorder::new(MemorySink::default(), MemorySink::default(), false);

        // Captured before the toggle: dropped
        recorder.write(&[1], &[10]).unwrap();
        recorder.write(&[2], &[20]).unwrap();

        recorder.set_enabled(true);
        assert!(recorder.write(&[3], &[30]).unwrap());
        assert!(recorder.write(&[4], &[40]).unwrap());

        let (video, diff) = recorder.into_parts();
        assert_eq!(video.frames, vec![vec![3], vec![4]]);
        assert_eq!(diff.frames, vec![vec![30], vec![40]]);
    }

    #[test]
    fn test_disable_stops_writes() {
        let mut recorder = Recorder::new(MemorySink::default(), MemorySink::default(), true);
        recorder.write(&[1], &[10]).unwrap();
        recorder.set_enabled(false);
        recorder.write(&[2], &[20]).unwrap();

        let (video, diff) = recorder.into_parts();
        assert_eq!(video.frames, vec![vec![1]]);
        assert_eq!(diff.frames, vec![vec![10]]);
    }

    #[test]
    fn test_frame_and_diff_streams_stay_paired() {
        let mut recorder = Recorder::new(MemorySink::default(), MemorySink::default(), true);
        for i in 0..5u8 {
            recorder.write(&[i], &[i + 100]).unwrap();
        }
        let (video, diff) = recorder.into_parts();
        assert_eq!(video.frames.len(), diff.frames.len());
    }
}
