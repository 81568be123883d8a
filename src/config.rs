//! Configuration file handling for diffscope.
//!
//! Loads configuration from `~/.config/diffscope/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file structure for diffscope.
/// Loaded from ~/.config/diffscope/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraConfig {
    #[serde(default)]
    pub device: u32,
    #[serde(default)]
    pub mirror: bool,
    /// Capture resolution as "WIDTHxHEIGHT", e.g. "1280x720".
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub fps: Option<u32>,
    /// Treat the device as an industrial camera (skip dropped reads
    /// instead of exiting, show exposure in the overlay).
    #[serde(default)]
    pub industrial: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory the recorded video files are written into.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_true")]
    pub show_fps: bool,
    #[serde(default = "default_scale")]
    pub scale: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            show_fps: true,
            scale: default_scale(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_scale() -> u32 {
    crate::overlay::OVERLAY_SCALE
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("diffscope/config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/diffscope/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.camera.device, 0);
        assert!(!config.camera.mirror);
        assert!(config.camera.resolution.is_none());
        assert!(config.overlay.show_fps);
    }

    #[test]
    fn test_full_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[camera]
device = 2
mirror = true
resolution = "1280x720"
fps = 60
industrial = true

[output]
directory = "/tmp/captures"

[overlay]
show_fps = false
scale = 3
"#
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.camera.device, 2);
        assert!(config.camera.mirror);
        assert_eq!(config.camera.resolution.as_deref(), Some("1280x720"));
        assert_eq!(config.camera.fps, Some(60));
        assert!(config.camera.industrial);
        assert_eq!(
            config.output.directory.as_deref(),
            Some(Path::new("/tmp/captures"))
        );
        assert!(!config.overlay.show_fps);
        assert_eq!(config.overlay.scale, 3);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[camera]\ndevice = 1\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.camera.device, 1);
        assert!(!config.camera.mirror);
        assert!(config.output.directory.is_none());
        assert!(config.overlay.show_fps);
        assert_eq!(config.overlay.scale, crate::overlay::OVERLAY_SCALE);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[camera\ndevice = ").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_path_ends_with_expected_suffix() {
        let path = default_path();
        assert!(path.ends_with("diffscope/config.toml"));
    }
}
