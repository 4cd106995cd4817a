//! Error types for the relay pipeline
//!
//! Every fallible seam gets its own typed error; `RelayError` is the
//! crate-level error returned by the session entry points.

use thiserror::Error;

/// Crate-level error returned by `Session::init`, `run` and `cleanup`.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Startup failed before the session became runnable. Nothing built
    /// before the failure survives the return.
    #[error("startup failed: {0}")]
    FatalInit(String),

    /// A single frame failed to decode. Contained per-frame inside the
    /// pipeline; only surfaces here when decoding is exercised directly.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The capture backend failed to start or stop.
    #[error("capture backend: {0}")]
    Capture(#[from] CaptureError),

    /// The protocol server reported a failure during construction or its
    /// event-processing pass.
    #[error("protocol server: {0}")]
    Server(#[from] ServerError),

    /// A lifecycle operation was invoked out of order.
    #[error("lifecycle precondition violated: {0}")]
    Precondition(&'static str),

    /// Input relay into the device failed.
    #[error(transparent)]
    Injection(#[from] InjectionError),
}

/// A compressed or raw frame could not be turned into a pixel plane.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The compressed stream was rejected by the codec (corrupt header,
    /// truncated data, wrong format).
    #[error("image decode: {0}")]
    Malformed(#[from] image::ImageError),

    /// A raw payload's byte length does not match its declared geometry.
    #[error("raw frame size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A frame declared zero width or height.
    #[error("empty frame dimensions")]
    EmptyFrame,

    /// Component counts other than RGB/RGBA are not representable.
    #[error("unsupported component count: {0}")]
    UnsupportedComponents(u8),
}

/// Capture backend failures.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The configured capture mode has no backend in the port table.
    #[error("no backend provided for capture mode {0}")]
    MissingBackend(&'static str),

    /// A snapshot file could not be read back.
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot primitive produced an empty or garbage file.
    #[error("snapshot file empty or truncated")]
    EmptySnapshot,

    /// Backend-specific start/stop/next-frame failure.
    #[error("{0}")]
    Backend(String),
}

/// Protocol-server failures reported through the `DisplayServer` port.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Canvas construction failed.
    #[error("canvas construction failed: {0}")]
    Canvas(String),

    /// The bounded event-processing pass failed.
    #[error("event processing failed: {0}")]
    EventLoop(String),
}

/// Input injection failures. Logged by the session, never propagated back
/// to the protocol server.
#[derive(Debug, Error)]
#[error("injection failed: {0}")]
pub struct InjectionError(pub String);

/// Device metrics query failure; always fatal at startup.
#[derive(Debug, Error)]
#[error("device metrics: {0}")]
pub struct MetricsError(pub String);
