//! End-to-end tests for the frame-processing pipeline on synthetic frames.
//!
//! These tests run the same per-frame path as the viewer loop (grayscale,
//! difference, FPS overlay, recording gate) without hardware or child
//! processes.

use diffscope::camera::{Frame, FrameFormat};
use diffscope::diff::{absdiff, to_grayscale, GrayFrame};
use diffscope::fps::FpsCounter;
use diffscope::overlay::{draw_text, OVERLAY_COLOR, OVERLAY_SCALE};
use diffscope::recorder::{FrameWrite, Recorder};
use diffscope::sink::SinkError;
use std::time::{Duration, Instant};

/// Build a gray RGB frame with a white square at (x, y).
fn frame_with_square(width: u32, height: u32, x: u32, y: u32, size: u32) -> Frame {
    let mut data = vec![64u8; (width * height * 3) as usize];
    for dy in 0..size {
        for dx in 0..size {
            let px = x + dx;
            let py = y + dy;
            if px < width && py < height {
                let offset = ((py * width + px) as usize) * 3;
                data[offset..offset + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
    }
    Frame {
        data,
        width,
        height,
        format: FrameFormat::Rgb,
        timestamp: Instant::now(),
    }
}

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
fn test_static_scene_gives_black_difference() {
    let a = frame_with_square(32, 24, 4, 4, 8);
    let b = frame_with_square(32, 24, 4, 4, 8);

    let diff = absdiff(&to_grayscale(&a), &to_grayscale(&b)).unwrap();
    assert!(
        diff.data.iter().all(|&v| v == 0),
        "identical frames must produce an all-zero difference image"
    );
}

#[test]
fn test_moving_square_lights_up_only_changed_pixels() {
    let a = frame_with_square(32, 24, 4, 4, 8);
    let b = frame_with_square(32, 24, 12, 4, 8);

    let gray_a = to_grayscale(&a);
    let gray_b = to_grayscale(&b);
    let diff = absdiff(&gray_a, &gray_b).unwrap();

    let changed = diff.data.iter().filter(|&&v| v > 0).count();
    // The square vacated one 8x8 region and occupied another
    assert_eq!(changed, 2 * 8 * 8);

    // Background pixel far from both squares stays zero
    let background = (20 * 32 + 28) as usize;
    assert_eq!(diff.data[background], 0);

    // A vacated pixel carries the white-vs-gray luminance gap
    let vacated = (4 * 32 + 4) as usize;
    assert_eq!(diff.data[vacated], 255 - 64);
}

#[test]
fn test_difference_is_symmetric() {
    let a = to_grayscale(&frame_with_square(16, 16, 0, 0, 4));
    let b = to_grayscale(&frame_with_square(16, 16, 8, 8, 4));
    assert_eq!(absdiff(&a, &b).unwrap(), absdiff(&b, &a).unwrap());
}

#[test]
fn test_fps_overlay_stamped_after_one_second() {
    // Drive the counter to a known value with injected timestamps
    let start = Instant::now();
    let mut counter = FpsCounter::starting_at(start);
    for i in 1..=29 {
        counter.tick_at(start + Duration::from_millis(i * 33));
    }
    counter.tick_at(start + Duration::from_secs(1));
    assert_eq!(counter.label(), "FPS: 30.00");

    // Stamp it into a frame the way the viewer loop does
    let mut frame = frame_with_square(160, 60, 100, 40, 8);
    let before = frame.data.clone();
    draw_text(&mut frame, &counter.label(), 10, 10, OVERLAY_COLOR, OVERLAY_SCALE);

    assert_ne!(frame.data, before, "overlay must modify the frame");
    let green = frame
        .data
        .chunks_exact(3)
        .filter(|px| px == &OVERLAY_COLOR)
        .count();
    assert!(green > 0, "overlay pixels must carry the overlay color");

    // The square in the bottom-right corner is untouched
    let offset = ((45 * 160 + 103) as usize) * 3;
    assert_eq!(&frame.data[offset..offset + 3], &[255, 255, 255]);
}

#[test]
fn test_recording_gate_across_a_session() {
    // 10 frames; recording toggled on at frame 3 and off at frame 7,
    // mirroring an 'r' keypress mid-session
    let mut recorder = Recorder::new(MemorySink::default(), MemorySink::default(), false);
    let mut prev: Option<GrayFrame> = None;

    for i in 0..10u32 {
        let frame = frame_with_square(32, 24, i * 2, 4, 6);
        let gray = to_grayscale(&frame);
        let diff = prev
            .as_ref()
            .and_then(|p| absdiff(p, &gray).ok())
            .unwrap_or_else(|| GrayFrame {
                data: vec![0; gray.data.len()],
                width: gray.width,
                height: gray.height,
            });
        prev = Some(gray);

        if i == 3 {
            recorder.set_enabled(true);
        }
        if i == 7 {
            recorder.set_enabled(false);
        }
        recorder.write(&frame.data, &diff.data).unwrap();
    }

    let (video, diff) = recorder.into_parts();
    assert_eq!(video.frames.len(), 4, "frames 3..=6 should be recorded");
    assert_eq!(
        video.frames.len(),
        diff.frames.len(),
        "both streams must stay in lockstep"
    );

    // Recorded color frames are full RGB size, diff frames single-channel
    assert_eq!(video.frames[0].len(), 32 * 24 * 3);
    assert_eq!(diff.frames[0].len(), 32 * 24);
}

#[test]
fn test_first_frame_self_difference_is_black() {
    // The viewer seeds the previous frame with the first capture, so the
    // very first difference image is all zeros
    let frame = frame_with_square(32, 24, 4, 4, 8);
    let gray = to_grayscale(&frame);
    let prev: Option<GrayFrame> = None;

    let diff = prev
        .as_ref()
        .and_then(|p| absdiff(p, &gray).ok())
        .unwrap_or_else(|| GrayFrame {
            data: vec![0; gray.data.len()],
            width: gray.width,
            height: gray.height,
        });

    assert!(diff.data.iter().all(|&v| v == 0));
}
