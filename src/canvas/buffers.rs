//! Double-buffered framebuffer manager
//!
//! Owns the front and back canvas buffers and the locking protocol that
//! lets the protocol server read the front buffer while the capture
//! pipeline writes the back buffer. The swap is an index flip, never a
//! byte copy.
//!
//! Locking discipline:
//! - `front` (rwlock) guards which slot is front plus the last published
//!   dirty rect. Readers hold it across one read pass; publish takes it
//!   for the O(1) swap.
//! - one mutex per slot serializes raw access to that slot's bytes.
//! - `writer` (mutex) is held for the whole acquire-to-publish window, so
//!   back writers never interleave and acquire/publish always pair up.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use crate::canvas::rect::Rect;
use crate::canvas::BYTES_PER_PIXEL;
use crate::error::RelayError;

struct FrontState {
    index: usize,
    dirty: Option<Rect>,
}

/// Owner of the two canvas-sized pixel buffers.
pub struct FrameBuffers {
    width: u32,
    height: u32,
    front: RwLock<FrontState>,
    slots: [Mutex<Box<[u8]>>; 2],
    writer: Mutex<()>,
}

impl FrameBuffers {
    /// Allocate both buffers for a `width x height` RGBA canvas.
    ///
    /// Allocation failure is reported as a construction error; the manager
    /// is never usable half-initialized.
    pub fn new(width: u32, height: u32) -> Result<Self, RelayError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| RelayError::FatalInit(format!("canvas {width}x{height} overflows")))?;
        if len == 0 {
            return Err(RelayError::FatalInit("canvas dimensions must be non-zero".into()));
        }

        let alloc = || -> Result<Box<[u8]>, RelayError> {
            let mut buf = Vec::new();
            buf.try_reserve_exact(len)
                .map_err(|e| RelayError::FatalInit(format!("canvas buffer allocation: {e}")))?;
            buf.resize(len, 0);
            Ok(buf.into_boxed_slice())
        };

        Ok(Self {
            width,
            height,
            front: RwLock::new(FrontState { index: 0, dirty: None }),
            slots: [Mutex::new(alloc()?), Mutex::new(alloc()?)],
            writer: Mutex::new(()),
        })
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte length of one buffer.
    pub fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Block until exclusive write access to the back buffer is granted.
    ///
    /// The returned guard must be consumed by [`BackBuffer::publish`] to
    /// make the frame visible; dropping it abandons the frame and the
    /// front buffer stays as it was.
    pub fn acquire_back(&self) -> BackBuffer<'_> {
        let gate = self.writer.lock();
        // The front index cannot flip while the writer gate is held.
        let index = 1 - self.front.read().index;
        let slot = self.slots[index].lock();
        BackBuffer {
            mgr: self,
            _gate: gate,
            slot,
            index,
        }
    }

    /// Scoped read-only view of the current front buffer.
    ///
    /// Holding the view blocks a publish from completing its swap, so a
    /// reader never observes a half-written buffer.
    pub fn front(&self) -> FrontView<'_> {
        let state = self.front.read();
        let index = state.index;
        let slot = self.slots[index].lock();
        FrontView { _state: state, slot }
    }

    /// Dirty rect recorded by the most recent publish, if any.
    pub fn last_dirty(&self) -> Option<Rect> {
        self.front.read().dirty
    }
}

/// Exclusive write handle to the back buffer.
pub struct BackBuffer<'a> {
    mgr: &'a FrameBuffers,
    _gate: MutexGuard<'a, ()>,
    slot: MutexGuard<'a, Box<[u8]>>,
    index: usize,
}

impl BackBuffer<'_> {
    /// Writable pixel bytes of the back buffer.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.slot
    }

    /// Atomically exchange front and back, recording `dirty` as the region
    /// the protocol server must retransmit.
    ///
    /// Callers with a no-change frame must skip publish entirely; an empty
    /// rectangle is a caller bug.
    pub fn publish(self, dirty: Rect) {
        debug_assert!(!dirty.is_empty(), "publishing an empty dirty rect");
        let mut front = self.mgr.front.write();
        front.index = self.index;
        front.dirty = Some(dirty);
    }
}

/// Read-only borrowed view of the front buffer, valid for one read pass.
pub struct FrontView<'a> {
    _state: RwLockReadGuard<'a, FrontState>,
    slot: MutexGuard<'a, Box<[u8]>>,
}

impl FrontView<'_> {
    /// Pixel bytes of the front buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.slot
    }
}
