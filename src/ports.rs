//! External collaborator ports
//!
//! The session is wired from a table of capabilities supplied by the
//! embedder: the remote-display protocol server, the OS input-injection
//! API, the device metrics queries, and the capture backends. Everything
//! behind these traits is out of scope for this crate; nothing here
//! reimplements a wire format or an OS mechanism.

use std::sync::Arc;
use std::time::Duration;

use crate::canvas::Rect;
use crate::capture::CaptureBackends;
use crate::error::{InjectionError, MetricsError, ServerError};
use crate::input::TouchCommand;

/// Pixel layout declared to the protocol server at canvas construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    /// Bits per color sample.
    pub bits_per_sample: u8,
    /// Color samples per pixel.
    pub samples_per_pixel: u8,
    /// Bytes per pixel in the framebuffer.
    pub bytes_per_pixel: u8,
}

impl PixelLayout {
    /// 8-bit RGB samples stored in 4-byte pixels (RGBA canvas).
    pub const RGBA8888: Self = Self {
        bits_per_sample: 8,
        samples_per_pixel: 3,
        bytes_per_pixel: 4,
    };
}

/// Event drained from the protocol server's bounded processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// Pointer state sample: button bitmask plus coordinates.
    Pointer {
        /// Button bitmask (bit 0 primary, bits 3/4 scroll).
        mask: u8,
        /// Pointer x in canvas coordinates.
        x: i32,
        /// Pointer y in canvas coordinates.
        y: i32,
    },
    /// Keyboard key transition.
    Key {
        /// Key symbol as reported by the protocol.
        keysym: u32,
        /// True on press, false on release.
        down: bool,
    },
    /// A viewer attached.
    ClientConnected,
    /// A viewer detached.
    ClientDisconnected,
}

/// The remote-display protocol server (external library).
///
/// Methods take `&self`; implementations synchronize internally, the same
/// way a protocol library shares one server handle across its client
/// threads.
pub trait DisplayServer: Send + Sync {
    /// Construct the canvas the server exposes to viewers.
    fn open_canvas(&self, width: u32, height: u32, layout: PixelLayout)
        -> Result<(), ServerError>;

    /// Register the accepted authentication credentials.
    fn set_credentials(&self, credentials: &[String]) -> Result<(), ServerError>;

    /// Number of currently attached viewers.
    fn client_count(&self) -> usize;

    /// Mark a canvas region as modified for retransmission.
    fn mark_dirty(&self, rect: Rect);

    /// One bounded event-processing pass.
    ///
    /// `front` is a borrowed view of the front buffer, present only while
    /// a viewer is attached, valid strictly for the duration of this call.
    /// Returns the input events that arrived during the pass.
    fn process_io(
        &self,
        front: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Vec<ServerEvent>, ServerError>;

    /// Release server resources. Called once, after the event loop exits.
    fn shutdown(&self);
}

/// OS input-injection API.
pub trait InputPort: Send + Sync {
    /// Inject one discrete pointer action.
    fn touch(&self, command: TouchCommand) -> Result<(), InjectionError>;
}

/// Device display metrics, queried once at startup.
pub trait ScreenMetrics: Send {
    /// Reported screen size in pixels.
    fn screen_size(&self) -> Result<(u32, u32), MetricsError>;

    /// Human-readable display name, for logging.
    fn display_name(&self) -> String;
}

/// The full capability table handed to `Session::init`.
pub struct SessionPorts {
    /// Device metrics queries.
    pub metrics: Box<dyn ScreenMetrics>,

    /// Remote-display protocol server.
    pub server: Arc<dyn DisplayServer>,

    /// Input-injection API.
    pub injector: Arc<dyn InputPort>,

    /// Available capture backends.
    pub capture: CaptureBackends,
}
