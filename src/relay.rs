//! Producer-side frame pipeline
//!
//! One logical pipeline per capture session: pacing gate, decode, diff,
//! back-buffer write, publish, dirty-region notification. Exactly one
//! producer frame is in flight at a time; the session wraps the pipeline
//! in a mutex and feeds it from the capture context.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};

use crate::canvas::{FrameBuffers, Rect};
use crate::capture::FramePayload;
use crate::config::Config;
use crate::decode::{self, Decoder};
use crate::diff::{DiffEngine, DiffOutcome};
use crate::pacing::PacingGovernor;
use crate::ports::DisplayServer;

/// Frame accounting over one capture session.
#[derive(Debug, Default, Clone)]
pub struct RelayStats {
    /// Frames handed over by the capture backend.
    pub frames_seen: u64,

    /// Frames dropped by the pacing governor.
    pub frames_paced_out: u64,

    /// Frames dropped because decoding failed.
    pub frames_decode_failed: u64,

    /// Frames identical to the previous one (publish skipped).
    pub frames_unchanged: u64,

    /// Frames published to the canvas.
    pub frames_published: u64,
}

/// The capture-to-canvas pipeline.
pub struct RelayPipeline {
    pacing: PacingGovernor,
    decoder: Decoder,
    diff: DiffEngine,
    buffers: Arc<FrameBuffers>,
    server: Arc<dyn DisplayServer>,
    stats: RelayStats,
}

impl RelayPipeline {
    /// Build the pipeline for one session.
    pub fn new(
        config: &Config,
        buffers: Arc<FrameBuffers>,
        server: Arc<dyn DisplayServer>,
    ) -> Self {
        Self {
            pacing: PacingGovernor::new(config.fps),
            decoder: Decoder::new(),
            diff: DiffEngine::new(
                config.diff.granularity,
                config.diff.block_size,
                config.full_frames_only,
            ),
            buffers,
            server,
            stats: RelayStats::default(),
        }
    }

    /// Reset transient per-session state (pacing baseline, retained frame).
    pub fn reset(&mut self) {
        self.pacing.reset();
        self.diff.reset();
        self.stats = RelayStats::default();
    }

    /// Frame accounting so far.
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Run one captured frame through the pipeline.
    ///
    /// Pacing is checked before decode so dropped frames cost no decode
    /// work. Decode failures drop the frame and leave the retained diff
    /// state untouched.
    pub fn submit(&mut self, payload: FramePayload, now: Instant) {
        self.stats.frames_seen += 1;

        if !self.pacing.should_accept(now) {
            self.stats.frames_paced_out += 1;
            return;
        }

        let frame = match self.decoder.decode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("frame dropped: {e}");
                self.stats.frames_decode_failed += 1;
                return;
            }
        };

        let width = self.buffers.width();
        let height = self.buffers.height();
        let dirty = match self.diff.diff(&frame) {
            DiffOutcome::Unchanged => {
                self.stats.frames_unchanged += 1;
                return;
            }
            // A full update must also refresh canvas padding, so the
            // dirty region is the whole canvas, not just the source rect.
            DiffOutcome::Full => Rect::full(width, height),
            DiffOutcome::Changed(rect) => {
                let clamped = rect.clamp_to(width, height);
                if clamped.is_empty() {
                    // Changed pixels lie entirely in the clipped-off area.
                    self.stats.frames_unchanged += 1;
                    return;
                }
                clamped
            }
        };

        let mut back = self.buffers.acquire_back();
        decode::write_to_canvas(&frame, back.bytes_mut(), width, height);
        back.publish(dirty);
        self.server.mark_dirty(dirty);
        self.stats.frames_published += 1;
        debug!(
            "published frame {}x{}: dirty {}x{}+{}+{}",
            frame.width,
            frame.height,
            dirty.width(),
            dirty.height(),
            dirty.x1,
            dirty.y1
        );
    }
}
