//! Frame decoding and canvas writing
//!
//! Normalizes capture payloads into tightly packed pixel planes and maps
//! them onto the fixed-size RGBA canvas (pad when the source is smaller,
//! clip when it is larger).

use log::trace;

use crate::canvas::{BYTES_PER_PIXEL, PAD_COLOR};
use crate::capture::{DecodedFrame, FramePayload};
use crate::error::DecodeError;

/// Decoder adapter over the compressed-image codec plus the raw
/// pass-through path.
#[derive(Default)]
pub struct Decoder;

impl Decoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Turn a capture payload into a tightly packed pixel plane.
    ///
    /// Compressed payloads go through the image codec; its native scanline
    /// buffer is staged and copied into a plane with stride
    /// `width * components`. Raw payloads are length-validated and passed
    /// through unchanged.
    pub fn decode(&mut self, payload: FramePayload) -> Result<DecodedFrame, DecodeError> {
        match payload {
            FramePayload::Raw {
                data,
                width,
                height,
                components,
            } => {
                if components != 3 && components != 4 {
                    return Err(DecodeError::UnsupportedComponents(components));
                }
                if width == 0 || height == 0 {
                    return Err(DecodeError::EmptyFrame);
                }
                let expected = width as usize * height as usize * components as usize;
                if data.len() != expected {
                    return Err(DecodeError::SizeMismatch {
                        expected,
                        actual: data.len(),
                    });
                }
                Ok(DecodedFrame {
                    width,
                    height,
                    components,
                    data,
                })
            }
            FramePayload::Encoded(bytes) => {
                let image = image::load_from_memory(&bytes)?;
                let (width, height) = (image.width(), image.height());
                trace!("decoded frame: {}x{} from {} bytes", width, height, bytes.len());
                let (components, data) = match image {
                    image::DynamicImage::ImageRgb8(plane) => (3u8, plane.into_raw()),
                    image::DynamicImage::ImageRgba8(plane) => (4u8, plane.into_raw()),
                    other => (4u8, other.into_rgba8().into_raw()),
                };
                Ok(DecodedFrame {
                    width,
                    height,
                    components,
                    data,
                })
            }
        }
    }
}

/// Write a decoded frame onto a `canvas_width x canvas_height` RGBA canvas.
///
/// The overlap region is pixel-converted (RGB promoted to RGBA with alpha
/// forced opaque); canvas area beyond the source extent is filled with the
/// neutral pad color; source area beyond the canvas is clipped. The whole
/// canvas is rewritten so a back buffer never keeps pixels from an older
/// frame outside the current dirty region.
pub fn write_to_canvas(
    frame: &DecodedFrame,
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
) {
    debug_assert_eq!(
        canvas.len(),
        canvas_width as usize * canvas_height as usize * BYTES_PER_PIXEL
    );

    let overlap_w = frame.width.min(canvas_width) as usize;
    let overlap_h = frame.height.min(canvas_height) as usize;
    let components = frame.components as usize;
    let src_stride = frame.stride();
    let dst_stride = canvas_width as usize * BYTES_PER_PIXEL;

    for (y, dst_row) in canvas.chunks_exact_mut(dst_stride).enumerate() {
        if y < overlap_h {
            let src_row = &frame.data[y * src_stride..y * src_stride + overlap_w * components];
            if components == BYTES_PER_PIXEL {
                dst_row[..overlap_w * BYTES_PER_PIXEL].copy_from_slice(src_row);
            } else {
                for (dst_px, src_px) in dst_row[..overlap_w * BYTES_PER_PIXEL]
                    .chunks_exact_mut(BYTES_PER_PIXEL)
                    .zip(src_row.chunks_exact(components))
                {
                    dst_px[..3].copy_from_slice(src_px);
                    dst_px[3] = 0xFF;
                }
            }
            for dst_px in dst_row[overlap_w * BYTES_PER_PIXEL..].chunks_exact_mut(BYTES_PER_PIXEL) {
                dst_px.copy_from_slice(&PAD_COLOR);
            }
        } else {
            for dst_px in dst_row.chunks_exact_mut(BYTES_PER_PIXEL) {
                dst_px.copy_from_slice(&PAD_COLOR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageOutputFormat;
    use std::io::Cursor;

    fn raw_rgb(width: u32, height: u32, fill: [u8; 3]) -> FramePayload {
        let mut data = Vec::new();
        for _ in 0..width * height {
            data.extend_from_slice(&fill);
        }
        FramePayload::Raw {
            data,
            width,
            height,
            components: 3,
        }
    }

    #[test]
    fn raw_passthrough_keeps_geometry() {
        let mut decoder = Decoder::new();
        let frame = decoder.decode(raw_rgb(3, 2, [9, 8, 7])).unwrap();
        assert_eq!((frame.width, frame.height, frame.components), (3, 2, 3));
        assert_eq!(frame.data.len(), 18);
    }

    #[test]
    fn raw_size_mismatch_is_rejected() {
        let mut decoder = Decoder::new();
        let result = decoder.decode(FramePayload::Raw {
            data: vec![0; 10],
            width: 4,
            height: 4,
            components: 3,
        });
        assert!(matches!(result, Err(DecodeError::SizeMismatch { .. })));
    }

    #[test]
    fn zero_dimension_raw_frame_is_rejected() {
        let mut decoder = Decoder::new();
        let result = decoder.decode(FramePayload::Raw {
            data: Vec::new(),
            width: 0,
            height: 4,
            components: 3,
        });
        assert!(matches!(result, Err(DecodeError::EmptyFrame)));
    }

    #[test]
    fn png_roundtrip_decodes_to_rgb() {
        let img = image::RgbImage::from_fn(5, 4, |x, y| image::Rgb([x as u8, y as u8, 42]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();

        let mut decoder = Decoder::new();
        let frame = decoder.decode(FramePayload::Encoded(bytes)).unwrap();
        assert_eq!((frame.width, frame.height, frame.components), (5, 4, 3));
        assert_eq!(&frame.data[0..3], &[0, 0, 42]);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let mut decoder = Decoder::new();
        let result = decoder.decode(FramePayload::Encoded(b"definitely not an image".to_vec()));
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn smaller_source_pads_margins_with_fill() {
        let mut decoder = Decoder::new();
        let frame = decoder.decode(raw_rgb(2, 2, [1, 2, 3])).unwrap();
        let mut canvas = vec![0u8; 4 * 4 * BYTES_PER_PIXEL];
        write_to_canvas(&frame, &mut canvas, 4, 4);

        // overlap pixel, alpha forced opaque
        assert_eq!(&canvas[0..4], &[1, 2, 3, 0xFF]);
        // right margin of an overlap row
        assert_eq!(&canvas[2 * 4..2 * 4 + 4], &PAD_COLOR);
        // bottom margin row
        let last_row = 3 * 4 * BYTES_PER_PIXEL;
        assert_eq!(&canvas[last_row..last_row + 4], &PAD_COLOR);
    }

    #[test]
    fn larger_source_is_clipped() {
        let mut data = Vec::new();
        for i in 0..16u8 {
            data.extend_from_slice(&[i, i, i, 0xAA]);
        }
        let frame = DecodedFrame {
            width: 4,
            height: 4,
            components: 4,
            data,
        };
        let mut canvas = vec![0u8; 2 * 2 * BYTES_PER_PIXEL];
        write_to_canvas(&frame, &mut canvas, 2, 2);

        // top-left 2x2 of the source, alpha preserved for RGBA sources
        assert_eq!(&canvas[0..4], &[0, 0, 0, 0xAA]);
        assert_eq!(&canvas[4..8], &[1, 1, 1, 0xAA]);
        assert_eq!(&canvas[8..12], &[4, 4, 4, 0xAA]);
    }
}
