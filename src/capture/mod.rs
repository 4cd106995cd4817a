//! Capture backend abstraction
//!
//! Unifies the OS capture mechanisms behind one frame-source interface
//! with two delivery models: push (the backend invokes a sink whenever a
//! frame is ready, from a thread it owns) and poll (the session runs a
//! dedicated thread calling a blocking next-frame primitive).

pub mod frame;
mod snapshot;

pub use frame::{DecodedFrame, FramePayload};
pub use snapshot::{SnapshotFileSource, SnapshotPrepare, SnapshotTrigger};

use crate::error::CaptureError;

/// Sink handed to a push backend; invoked once per ready frame.
pub type FrameSink = Box<dyn FnMut(FramePayload) + Send>;

/// Push-model capture backend: delivers frames to a sink from a context
/// the backend owns.
pub trait PushCapture: Send {
    /// Begin delivering frames to `sink`.
    fn start(&mut self, sink: FrameSink) -> Result<(), CaptureError>;

    /// Stop delivering frames. Idempotent; a second stop is a no-op.
    fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Poll-model capture backend: produces one frame per blocking call.
pub trait PollCapture: Send {
    /// One-time setup before the first frame is requested.
    fn prepare(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Block until the next frame snapshot is available.
    fn next_frame(&mut self) -> Result<FramePayload, CaptureError>;
}

/// A capture backend selected for a session, in either delivery model.
pub enum FrameSource {
    /// Backend pushes frames into a sink.
    Push(Box<dyn PushCapture>),

    /// Session polls the backend from a dedicated thread.
    Poll(Box<dyn PollCapture>),
}

/// The capture capabilities an embedder can provide; the configured
/// capture mode selects which one a session actually uses.
#[derive(Default)]
pub struct CaptureBackends {
    /// Push backend delivering compressed frame bytes.
    pub stream: Option<Box<dyn PushCapture>>,

    /// Push backend delivering raw pixel buffers.
    pub pixel: Option<Box<dyn PushCapture>>,

    /// Poll backend producing one snapshot per call.
    pub snapshot: Option<Box<dyn PollCapture>>,
}
