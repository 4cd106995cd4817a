//! mirror-core - screen mirroring relay core
//!
//! Relays a device's screen to remote viewers through an external
//! remote-display protocol server and routes pointer input back into the
//! device. The embedder supplies the OS collaborators (capture backend,
//! protocol server, input injection, device metrics) as a capability
//! table; this crate owns the frame pipeline in between: double-buffered
//! canvas, dirty-region diffing, frame pacing, input translation and the
//! session lifecycle.
//!
//! ```no_run
//! use mirror_core::{Args, Session, SessionPorts};
//! # fn collaborators() -> SessionPorts { unimplemented!() }
//!
//! fn main() -> Result<(), mirror_core::RelayError> {
//!     let args = Args::try_from_argv(std::env::args())?;
//!     let mut session = Session::init(collaborators(), args.into_config()?)?;
//!     session.run()?;
//!     session.cleanup()
//! }
//! ```

pub mod args;
pub mod canvas;
pub mod capture;
pub mod config;
pub mod decode;
pub mod diff;
pub mod error;
pub mod input;
pub mod pacing;
pub mod ports;
pub mod relay;
pub mod session;

// Re-exports
pub use args::Args;
pub use canvas::{FrameBuffers, Rect};
pub use capture::{CaptureBackends, FramePayload, FrameSource, PollCapture, PushCapture};
pub use config::{CaptureMode, Config};
pub use diff::{DiffEngine, DiffOutcome, Granularity};
pub use error::RelayError;
pub use input::{TouchAction, TouchCommand};
pub use ports::{DisplayServer, InputPort, ScreenMetrics, ServerEvent, SessionPorts};
pub use session::{Session, SessionHandle};
