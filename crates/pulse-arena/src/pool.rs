//! Shared page pool with frame stamping and recycling.

use std::sync::Mutex;

use pulse_core::FrameId;

/// Size in bytes of a scratch page.
pub const PAGE_SIZE: usize = 2 * 1024;

/// A scratch page handed out by the [`PagePool`].
///
/// The holder owns the buffer exclusively until the page is sealed into a
/// frame slot's name store or released back to the pool. `serial` is
/// unique per handout for the lifetime of the pool, so a [`NameRef`]
/// carrying it can never alias bytes from a recycled buffer.
///
/// [`NameRef`]: pulse_core::NameRef
#[derive(Debug)]
pub struct Page {
    serial: u32,
    stamp: FrameId,
    buf: Box<[u8]>,
}

impl Page {
    /// Pool-unique handout serial.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// The frame this page was requested for.
    pub fn stamp(&self) -> FrameId {
        self.stamp
    }

    /// Immutable view of the page bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable view of the page bytes. Only the exclusive holder can call
    /// this; sealed pages are read-only.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

struct PoolInner {
    free: Vec<Box<[u8]>>,
    next_serial: u32,
    pages_created: usize,
}

/// Thread-safe pool of scratch pages.
///
/// Contention on the internal mutex occurs only when a producer exhausts
/// its current page or a frame slot is evicted, never per string.
pub struct PagePool {
    inner: Mutex<PoolInner>,
}

impl PagePool {
    /// Create an empty pool. Pages are allocated lazily on first handout.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                free: Vec::new(),
                // Serial 0 is reserved for NameRef::EMPTY.
                next_serial: 1,
                pages_created: 0,
            }),
        }
    }

    /// Hand out a page stamped with the requesting frame.
    ///
    /// Reuses a free buffer when available, otherwise allocates a new one.
    pub fn acquire(&self, stamp: FrameId) -> Page {
        let mut inner = self.inner.lock().expect("page pool poisoned");
        let buf = match inner.free.pop() {
            Some(buf) => buf,
            None => {
                inner.pages_created += 1;
                vec![0u8; PAGE_SIZE].into_boxed_slice()
            }
        };
        let serial = inner.next_serial;
        inner.next_serial = inner.next_serial.wrapping_add(1).max(1);
        Page { serial, stamp, buf }
    }

    /// Return a page's buffer to the free list.
    ///
    /// Called when a frame slot is evicted from the ring buffer (its pages
    /// can no longer be referenced) or when a producer discards a page
    /// whose frame was already evicted before it could be sealed.
    pub fn release(&self, page: Page) {
        let mut inner = self.inner.lock().expect("page pool poisoned");
        inner.free.push(page.buf);
    }

    /// Number of distinct buffers ever allocated by this pool.
    pub fn pages_created(&self) -> usize {
        self.inner.lock().expect("page pool poisoned").pages_created
    }

    /// Number of buffers currently sitting in the free list.
    pub fn pages_free(&self) -> usize {
        self.inner.lock().expect("page pool poisoned").free.len()
    }
}

impl Default for PagePool {
    fn default() -> Self {
        Self::new()
    }
}
