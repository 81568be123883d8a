//! diffscope library crate.
//!
//! This module exposes the internal components for integration testing.

pub mod camera;
pub mod config;
pub mod control;
pub mod diff;
pub mod fps;
pub mod hotkeys;
pub mod overlay;
pub mod recorder;
pub mod sink;
pub mod tuning;
