//! Child-process video sinks.
//!
//! Encoding and windowing are delegated to external tools, the same way the
//! rest of the pipeline treats them: an `ffmpeg` child encodes raw frames
//! piped to its stdin into a video file, and an `mpv` child presents raw
//! frames in an on-screen window. Both are driven through [`RawVideoSink`],
//! which owns the child process and relays its stderr.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use thiserror::Error;

/// Pixel layout of the raw frames fed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 bytes per pixel, RGB order
    Rgb24,
    /// 1 byte per pixel, luminance only
    Gray8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb24 => 3,
            PixelLayout::Gray8 => 1,
        }
    }

    /// ffmpeg `-pix_fmt` name for rawvideo input.
    pub fn ffmpeg_pix_fmt(self) -> &'static str {
        match self {
            PixelLayout::Rgb24 => "rgb24",
            PixelLayout::Gray8 => "gray",
        }
    }

    /// mpv rawvideo demuxer format name.
    pub fn mpv_format(self) -> &'static str {
        match self {
            PixelLayout::Rgb24 => "rgb24",
            PixelLayout::Gray8 => "y8",
        }
    }
}

/// Errors that can occur during sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("FFmpeg not found. Please install ffmpeg and make sure it is on PATH")]
    FfmpegNotFound,
    #[error("mpv not found. Please install mpv and make sure it is on PATH")]
    MpvNotFound,
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: &'static str,
        source: std::io::Error,
    },
    #[error("{label} exited with code {exit_code:?}\n{stderr}")]
    ProcessFailed {
        label: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("frame has {got} bytes, sink expects {expected}")]
    FrameSizeMismatch { expected: usize, got: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build ffmpeg arguments for encoding rawvideo-on-stdin to a file.
pub fn encoder_args(
    path: &Path,
    width: u32,
    height: u32,
    fps: u32,
    layout: PixelLayout,
) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        layout.ffmpeg_pix_fmt().to_string(),
        "-video_size".to_string(),
        format!("{}x{}", width, height),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-y".to_string(),
        path.to_string_lossy().into_owned(),
    ]
}

/// Build mpv arguments for presenting rawvideo-on-stdin in a window.
pub fn preview_args(title: &str, width: u32, height: u32, fps: u32, layout: PixelLayout) -> Vec<String> {
    vec![
        "--no-cache".to_string(),
        "--untimed".to_string(),
        "--no-terminal".to_string(),
        "--force-seekable=no".to_string(),
        format!("--title={}", title),
        "--demuxer=rawvideo".to_string(),
        format!("--demuxer-rawvideo-w={}", width),
        format!("--demuxer-rawvideo-h={}", height),
        format!("--demuxer-rawvideo-fps={}", fps),
        format!("--demuxer-rawvideo-mp-format={}", layout.mpv_format()),
        "-".to_string(),
    ]
}

/// Build the pair of sibling output paths for one recording session.
///
/// Naming follows the `video_<stamp>` / `frame_diff_<stamp>` convention with
/// a shared `YYYY-MM-DD_HH-MM-SS` timestamp.
pub fn session_paths_at(dir: &Path, stamp: NaiveDateTime) -> (PathBuf, PathBuf) {
    let stamp = stamp.format("%Y-%m-%d_%H-%M-%S");
    (
        dir.join(format!("video_{}.mp4", stamp)),
        dir.join(format!("frame_diff_{}.mp4", stamp)),
    )
}

/// `session_paths_at` with the current local time.
pub fn session_paths(dir: &Path) -> (PathBuf, PathBuf) {
    session_paths_at(dir, chrono::Local::now().naive_local())
}

/// A child process consuming raw video frames on stdin.
pub struct RawVideoSink {
    label: &'static str,
    child: Child,
    stdin: Option<ChildStdin>,
    /// Handle for the stderr reader thread (ffmpeg only)
    stderr_thread: Option<JoinHandle<Vec<String>>>,
    /// Expected bytes per frame
    frame_len: usize,
}

impl RawVideoSink {
    /// Spawn an ffmpeg encoder writing to `path`.
    pub fn encoder(
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        layout: PixelLayout,
    ) -> Result<Self, SinkError> {
        let args = encoder_args(path, width, height, fps, layout);
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SinkError::FfmpegNotFound
                } else {
                    SinkError::SpawnFailed {
                        program: "ffmpeg",
                        source: e,
                    }
                }
            })?;

        let stdin = child.stdin.take();
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                let mut lines = Vec::new();
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            log::debug!("[ffmpeg] {}", l);
                            lines.push(l);
                        }
                        Err(_) => break,
                    }
                }
                lines
            })
        });

        Ok(Self {
            label: "ffmpeg",
            child,
            stdin,
            stderr_thread,
            frame_len: (width as usize) * (height as usize) * layout.bytes_per_pixel(),
        })
    }

    /// Spawn an mpv preview window titled `title`.
    pub fn preview(
        title: &str,
        width: u32,
        height: u32,
        fps: u32,
        layout: PixelLayout,
    ) -> Result<Self, SinkError> {
        let args = preview_args(title, width, height, fps, layout);
        let mut child = Command::new("mpv")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SinkError::MpvNotFound
                } else {
                    SinkError::SpawnFailed {
                        program: "mpv",
                        source: e,
                    }
                }
            })?;

        let stdin = child.stdin.take();

        Ok(Self {
            label: "mpv",
            child,
            stdin,
            stderr_thread: None,
            frame_len: (width as usize) * (height as usize) * layout.bytes_per_pixel(),
        })
    }

    /// Append one frame. Blocks until the child has accepted the bytes;
    /// there is no buffering, so a stalled child stalls the caller.
    pub fn write_frame(&mut self, data: &[u8]) -> Result<(), SinkError> {
        if data.len() != self.frame_len {
            return Err(SinkError::FrameSizeMismatch {
                expected: self.frame_len,
                got: data.len(),
            });
        }
        match self.stdin.as_mut() {
            Some(stdin) => {
                stdin.write_all(data)?;
                Ok(())
            }
            None => Err(SinkError::ProcessFailed {
                label: self.label,
                exit_code: None,
                stderr: "sink already closed".to_string(),
            }),
        }
    }

    /// Check if the child process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Close stdin and wait for the child to exit.
    ///
    /// Closing the pipe lets ffmpeg finalize the container. If the child
    /// hasn't exited after a grace period, it gets SIGINT and finally a
    /// hard kill.
    pub fn finish(&mut self) -> Result<ExitStatus, SinkError> {
        drop(self.stdin.take());

        if let Some(status) = self.wait_with_timeout(Duration::from_secs(2))? {
            return Ok(status);
        }

        #[cfg(unix)]
        {
            unsafe {
                let pid = self.child.id() as i32;
                libc::kill(pid, libc::SIGINT);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }

        if let Some(status) = self.wait_with_timeout(Duration::from_secs(2))? {
            return Ok(status);
        }

        let _ = self.child.kill();
        self.child.wait().map_err(SinkError::Io)
    }

    fn wait_with_timeout(&mut self, timeout: Duration) -> Result<Option<ExitStatus>, SinkError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(SinkError::Io(e)),
            }
        }
    }

    /// Get the collected stderr output after the process has finished.
    pub fn take_stderr_output(&mut self) -> Vec<String> {
        self.stderr_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for RawVideoSink {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.finish();
        }
    }
}
