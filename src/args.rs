use clap::Parser;
use std::path::PathBuf;

use crate::config::{CaptureMode, Config};
use crate::error::RelayError;

/// Startup options recognized by the session entry point.
///
/// Parsed from the argument list the embedder hands to init, not from the
/// process command line.
#[derive(Parser, Debug, Default)]
#[command(name = "mirror-core")]
#[command(about = "Screen mirroring relay core", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target frame rate ceiling
    #[arg(long)]
    pub fps: Option<u32>,

    /// Capture mode (stream, png or pixel)
    #[arg(long)]
    pub capture_mode: Option<String>,

    /// Disable diffing; every frame becomes a full-canvas update
    #[arg(long, action)]
    pub no_diff: bool,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    /// Parse startup options from an argument list. The first element is
    /// the conventional program name and is skipped by clap.
    pub fn try_from_argv<I, S>(argv: I) -> Result<Self, RelayError>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        Args::try_parse_from(argv).map_err(|e| RelayError::FatalInit(format!("bad arguments: {e}")))
    }

    /// Resolve the effective configuration: file (when given), then
    /// command-line overrides, then validation.
    pub fn into_config(self) -> Result<Config, RelayError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(ref mode) = self.capture_mode {
            config.capture_mode = CaptureMode::parse(mode)
                .ok_or_else(|| RelayError::FatalInit(format!("unknown capture mode: {mode}")))?;
        }
        if self.no_diff {
            config.full_frames_only = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_from_argv([
            "agent",
            "--fps",
            "15",
            "--capture-mode",
            "png",
            "--no-diff",
            "--verbose",
        ])
        .unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.fps, 15);
        assert_eq!(config.capture_mode, CaptureMode::Png);
        assert!(config.full_frames_only);
        assert!(config.verbose);
    }

    #[test]
    fn no_flags_yields_defaults() {
        let config = Args::try_from_argv(["agent"]).unwrap().into_config().unwrap();
        assert_eq!(config.fps, 30);
        assert_eq!(config.capture_mode, CaptureMode::Stream);
        assert!(!config.full_frames_only);
    }

    #[test]
    fn unknown_capture_mode_fails_init() {
        let args = Args::try_from_argv(["agent", "--capture-mode", "dxgi"]).unwrap();
        assert!(matches!(args.into_config(), Err(RelayError::FatalInit(_))));
    }

    #[test]
    fn invalid_fps_fails_validation() {
        let args = Args::try_from_argv(["agent", "--fps", "0"]).unwrap();
        assert!(matches!(args.into_config(), Err(RelayError::FatalInit(_))));
    }
}
