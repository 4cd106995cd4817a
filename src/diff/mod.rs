//! Dirty-region computation
//!
//! Compares each decoded frame against the retained previous frame and
//! produces the minimal rectangle worth retransmitting. Two granularities:
//! pixel-exact bounds, or square blocks compared by xxh64 with the dirty
//! blocks' bounding box as the result.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::Xxh64;

use crate::canvas::Rect;
use crate::capture::DecodedFrame;

/// Hash seed for block fingerprints.
const BLOCK_HASH_SEED: u64 = 0;

/// Differencing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Scan every pixel; exact min/max bounds of changed pixels.
    #[default]
    Pixel,
    /// Compare fixed-size square blocks; coarser, cheaper per frame.
    Block,
}

/// Result of one diff pass, in source coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// No pixel differs; the caller must skip publish entirely.
    Unchanged,
    /// Changed pixels are bounded by (pixel mode) or covered by (block
    /// mode) this rectangle.
    Changed(Rect),
    /// The whole frame must be treated as changed: first frame, geometry
    /// change, or no-diff mode.
    Full,
}

struct Retained {
    width: u32,
    height: u32,
    components: u8,
    data: Vec<u8>,
    block_hashes: Vec<u64>,
}

/// Stateful diff engine holding the retained previous frame.
pub struct DiffEngine {
    granularity: Granularity,
    block_size: u32,
    force_full: bool,
    retained: Option<Retained>,
}

impl DiffEngine {
    /// Create an engine. `force_full` disables differencing entirely
    /// (every frame reports [`DiffOutcome::Full`]).
    pub fn new(granularity: Granularity, block_size: u32, force_full: bool) -> Self {
        Self {
            granularity,
            block_size: block_size.max(1),
            force_full,
            retained: None,
        }
    }

    /// Forget the retained frame; the next diff is a full update.
    pub fn reset(&mut self) {
        self.retained = None;
    }

    /// Diff `frame` against the retained frame.
    ///
    /// The retained frame is updated to `frame`'s contents after every
    /// call, whether or not the canvas write that follows succeeds.
    pub fn diff(&mut self, frame: &DecodedFrame) -> DiffOutcome {
        let geometry_changed = match &self.retained {
            Some(r) => {
                r.width != frame.width
                    || r.height != frame.height
                    || r.components != frame.components
            }
            None => true,
        };

        if self.force_full || geometry_changed {
            self.retain_full(frame);
            return DiffOutcome::Full;
        }

        // Geometry matched, so a retained frame exists; take it out for
        // the scan and put it back updated.
        let Some(mut retained) = self.retained.take() else {
            self.retain_full(frame);
            return DiffOutcome::Full;
        };
        let outcome = match self.granularity {
            Granularity::Pixel => diff_pixel(&mut retained, frame),
            Granularity::Block => diff_block(&mut retained, self.block_size, frame),
        };
        self.retained = Some(retained);
        outcome
    }

    /// Replace the retained frame, reallocating when geometry changed.
    fn retain_full(&mut self, frame: &DecodedFrame) {
        let block_hashes = match self.granularity {
            Granularity::Block => block_hashes(frame, self.block_size),
            Granularity::Pixel => Vec::new(),
        };
        self.retained = Some(Retained {
            width: frame.width,
            height: frame.height,
            components: frame.components,
            data: frame.data.clone(),
            block_hashes,
        });
    }
}

fn diff_pixel(retained: &mut Retained, frame: &DecodedFrame) -> DiffOutcome {
    let stride = frame.stride();
    let components = frame.components as usize;
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    let rows = frame
        .data
        .chunks_exact(stride)
        .zip(retained.data.chunks_exact(stride));
    for (y, (cur, prev)) in rows.enumerate() {
        if cur == prev {
            continue;
        }
        // Row differs; narrow down to the changed pixel span.
        let first = cur
            .iter()
            .zip(prev.iter())
            .position(|(a, b)| a != b)
            .map(|i| (i / components) as u32);
        let last = cur
            .iter()
            .zip(prev.iter())
            .rposition(|(a, b)| a != b)
            .map(|i| (i / components) as u32);
        let (Some(first), Some(last)) = (first, last) else {
            continue;
        };
        bounds = Some(match bounds {
            None => (first, y as u32, last, y as u32),
            Some((min_x, min_y, max_x, _)) => (min_x.min(first), min_y, max_x.max(last), y as u32),
        });
    }

    match bounds {
        None => DiffOutcome::Unchanged,
        Some((min_x, min_y, max_x, max_y)) => {
            retained.data.copy_from_slice(&frame.data);
            DiffOutcome::Changed(
                Rect {
                    x1: min_x,
                    y1: min_y,
                    x2: max_x + 1,
                    y2: max_y + 1,
                }
                .clamp_to(frame.width, frame.height),
            )
        }
    }
}

fn diff_block(retained: &mut Retained, block: u32, frame: &DecodedFrame) -> DiffOutcome {
    let blocks_x = frame.width.div_ceil(block);
    let hashes = block_hashes(frame, block);

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, (cur, prev)) in hashes.iter().zip(retained.block_hashes.iter()).enumerate() {
        if cur == prev {
            continue;
        }
        let bx = i as u32 % blocks_x;
        let by = i as u32 / blocks_x;
        bounds = Some(match bounds {
            None => (bx, by, bx, by),
            Some((min_bx, min_by, max_bx, max_by)) => {
                (min_bx.min(bx), min_by.min(by), max_bx.max(bx), max_by.max(by))
            }
        });
    }

    match bounds {
        None => DiffOutcome::Unchanged,
        Some((min_bx, min_by, max_bx, max_by)) => {
            retained.block_hashes = hashes;
            retained.data.copy_from_slice(&frame.data);
            DiffOutcome::Changed(
                Rect {
                    x1: min_bx * block,
                    y1: min_by * block,
                    x2: (max_bx + 1) * block,
                    y2: (max_by + 1) * block,
                }
                .clamp_to(frame.width, frame.height),
            )
        }
    }
}

/// xxh64 fingerprint per `block x block` tile, row-major over tiles.
fn block_hashes(frame: &DecodedFrame, block: u32) -> Vec<u64> {
    let components = frame.components as usize;
    let stride = frame.stride();
    let blocks_x = frame.width.div_ceil(block);
    let blocks_y = frame.height.div_ceil(block);
    let mut hashes = Vec::with_capacity((blocks_x * blocks_y) as usize);

    for by in 0..blocks_y {
        let y0 = by * block;
        let y1 = (y0 + block).min(frame.height);
        for bx in 0..blocks_x {
            let x0 = (bx * block) as usize * components;
            let x1 = ((bx * block + block).min(frame.width)) as usize * components;
            let mut hasher = Xxh64::new(BLOCK_HASH_SEED);
            for y in y0..y1 {
                let row = y as usize * stride;
                hasher.update(&frame.data[row + x0..row + x1]);
            }
            hashes.push(hasher.digest());
        }
    }

    hashes
}
