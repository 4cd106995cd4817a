//! Canvas surface shared with the protocol server
//!
//! Double-buffered pixel storage plus the dirty-rectangle type used to
//! describe minimal update regions.

pub mod buffers;
pub mod rect;

pub use buffers::{BackBuffer, FrameBuffers, FrontView};
pub use rect::Rect;

/// Bytes per canvas pixel (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// Fill color for canvas area not covered by the source frame, opaque.
pub const PAD_COLOR: [u8; 4] = [0x80, 0x80, 0x80, 0xFF];
