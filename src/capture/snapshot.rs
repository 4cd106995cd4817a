//! File-based snapshot capture source
//!
//! Poll backend that drives an external capture-to-file primitive: ask the
//! OS to write one screenshot into a known path, read the file back, hand
//! the compressed bytes to the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::capture::{FramePayload, PollCapture};
use crate::error::CaptureError;

/// External primitive that writes one screenshot into `path`.
pub type SnapshotTrigger = Box<dyn FnMut(&Path) -> Result<(), CaptureError> + Send>;

/// Optional one-time setup hook run before the first snapshot.
pub type SnapshotPrepare = Box<dyn FnMut() -> Result<(), CaptureError> + Send>;

/// Poll source backed by a capture-to-file primitive.
pub struct SnapshotFileSource {
    path: PathBuf,
    trigger: SnapshotTrigger,
    prepare: Option<SnapshotPrepare>,
}

impl SnapshotFileSource {
    /// Create a source that captures into `path` via `trigger`.
    pub fn new(path: impl Into<PathBuf>, trigger: SnapshotTrigger) -> Self {
        Self {
            path: path.into(),
            trigger,
            prepare: None,
        }
    }

    /// Attach a one-time setup hook, run before the first frame.
    pub fn with_prepare(mut self, prepare: SnapshotPrepare) -> Self {
        self.prepare = Some(prepare);
        self
    }
}

impl PollCapture for SnapshotFileSource {
    fn prepare(&mut self) -> Result<(), CaptureError> {
        if let Some(prepare) = self.prepare.as_mut() {
            prepare()?;
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<FramePayload, CaptureError> {
        (self.trigger)(&self.path)?;
        let bytes = fs::read(&self.path)?;
        // A capture that produced no image leaves the file empty or with a
        // couple of header bytes at most.
        if bytes.len() <= 2 {
            return Err(CaptureError::EmptySnapshot);
        }
        debug!("read snapshot: {} bytes", bytes.len());
        Ok(FramePayload::Encoded(bytes))
    }
}
