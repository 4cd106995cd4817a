//! Frame data structures
//!
//! Payloads as delivered by a capture backend, and the normalized decoded
//! form the rest of the pipeline operates on.

use std::fmt;

/// A frame as handed over by a capture backend.
#[derive(Clone)]
pub enum FramePayload {
    /// Compressed image bytes (PNG or JPEG), decoded by the adapter.
    Encoded(Vec<u8>),

    /// Already-decoded row-major pixels, tightly packed.
    Raw {
        /// Pixel bytes, `width * height * components` long.
        data: Vec<u8>,
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
        /// Components per pixel: 3 (RGB) or 4 (RGBA).
        components: u8,
    },
}

impl fmt::Debug for FramePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePayload::Encoded(bytes) => write!(f, "Encoded({} bytes)", bytes.len()),
            FramePayload::Raw {
                width,
                height,
                components,
                data,
            } => write!(
                f,
                "Raw({}x{}x{}, {} bytes)",
                width,
                height,
                components,
                data.len()
            ),
        }
    }
}

/// A decoded frame: row-major, tightly packed (stride = width * components).
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Components per pixel: 3 (RGB) or 4 (RGBA).
    pub components: u8,

    /// Pixel bytes.
    pub data: Vec<u8>,
}

impl DecodedFrame {
    /// Bytes in one row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.components as usize
    }
}
