//! Configuration management for mirror-core

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diff::Granularity;
use crate::error::RelayError;

/// Capture backend selection for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Push backend delivering compressed frame bytes.
    #[default]
    Stream,
    /// File-polling snapshot backend (PNG screenshots).
    Png,
    /// Push backend delivering raw pixel buffers.
    Pixel,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Stream => "stream",
            CaptureMode::Png => "png",
            CaptureMode::Pixel => "pixel",
        }
    }

    /// Parse a mode name as accepted on the command line.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "stream" => Some(CaptureMode::Stream),
            "png" => Some(CaptureMode::Png),
            "pixel" => Some(CaptureMode::Pixel),
            _ => None,
        }
    }
}

/// Dirty-region differencing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Differencing granularity.
    #[serde(default)]
    pub granularity: Granularity,

    /// Block edge length in pixels for block granularity.
    #[serde(default = "default_block_size")]
    pub block_size: u32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            block_size: default_block_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target frames-per-second ceiling for accepted frames.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Which capture backend the session uses.
    #[serde(default)]
    pub capture_mode: CaptureMode,

    /// Disable differencing: every frame is a full-canvas update.
    #[serde(default)]
    pub full_frames_only: bool,

    /// Differencing configuration.
    #[serde(default)]
    pub diff: DiffConfig,

    /// Bounded wait per event-loop iteration, in milliseconds.
    #[serde(default = "default_io_wait_ms")]
    pub io_wait_ms: u64,

    /// Grace delay after capture stop, letting queued capture callbacks
    /// drain before buffers are released. Milliseconds.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Authentication credentials registered with the protocol server;
    /// empty list disables authentication.
    #[serde(default)]
    pub credentials: Vec<String>,

    /// Verbose (debug-level) logging.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            capture_mode: CaptureMode::default(),
            full_frames_only: false,
            diff: DiffConfig::default(),
            io_wait_ms: default_io_wait_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            credentials: Vec::new(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; a missing file yields the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::FatalInit(format!("read config {path:?}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| RelayError::FatalInit(format!("parse config {path:?}: {e}")))
    }

    /// Validate configuration before a session is built.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.fps == 0 {
            return Err(RelayError::FatalInit("fps must be positive".into()));
        }
        if self.diff.block_size == 0 {
            return Err(RelayError::FatalInit("diff block_size must be positive".into()));
        }
        if self.io_wait_ms == 0 {
            return Err(RelayError::FatalInit("io_wait_ms must be positive".into()));
        }
        if self.credentials.iter().any(|c| c.is_empty()) {
            return Err(RelayError::FatalInit("empty credential entry".into()));
        }
        Ok(())
    }
}

fn default_fps() -> u32 {
    30
}

fn default_block_size() -> u32 {
    16
}

fn default_io_wait_ms() -> u64 {
    100
}

fn default_stop_grace_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_fps_is_rejected() {
        let mut cfg = Config::default();
        cfg.fps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let mut cfg = Config::default();
        cfg.diff.block_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn capture_mode_parses_known_names() {
        assert_eq!(CaptureMode::parse("png"), Some(CaptureMode::Png));
        assert_eq!(CaptureMode::parse("STREAM"), Some(CaptureMode::Stream));
        assert_eq!(CaptureMode::parse("x11"), None);
    }

    #[test]
    fn toml_roundtrip() {
        let text = r#"
            fps = 15
            capture_mode = "pixel"
            full_frames_only = true

            [diff]
            granularity = "block"
            block_size = 32
        "#;
        let cfg: Config = toml::from_str(text).unwrap();
        assert_eq!(cfg.fps, 15);
        assert_eq!(cfg.capture_mode, CaptureMode::Pixel);
        assert!(cfg.full_frames_only);
        assert_eq!(cfg.diff.granularity, Granularity::Block);
        assert_eq!(cfg.diff.block_size, 32);
        // unset fields keep their defaults
        assert_eq!(cfg.stop_grace_ms, 2000);
    }
}
