//! Per-frame name storage and per-producer name writers.

use std::str;

use pulse_core::{FrameId, NameRef};

use crate::pool::{Page, PagePool, PAGE_SIZE};

/// Clip a string to `max` bytes on a char boundary.
fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Name storage owned by one frame slot.
///
/// Holds every page whose strings are referenced by the slot's events: a
/// bump page written directly by the slot's single producer (CPU tracks),
/// plus pages sealed in by external writers (GPU list recorders hand their
/// pages over at submission). Readers resolve [`NameRef`]s against all of
/// them. `reset` releases every page back to the pool; the engine calls it
/// only when the slot's previous frame falls out of the ring buffer.
pub struct NameStore {
    frame: FrameId,
    bump: Option<Page>,
    cursor: usize,
    sealed: Vec<Page>,
}

impl NameStore {
    /// Create an empty store for the given frame.
    pub fn new(frame: FrameId) -> Self {
        Self {
            frame,
            bump: None,
            cursor: 0,
            sealed: Vec::new(),
        }
    }

    /// The frame whose names this store currently holds.
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Copy `name` into the store's bump page and return a reference to it.
    ///
    /// Acquires a fresh page from the pool when the current one cannot fit
    /// the string; that handout is the only point of pool contention.
    /// Names longer than a page are clipped.
    pub fn push(&mut self, pool: &PagePool, name: &str) -> NameRef {
        let name = clip(name, PAGE_SIZE);
        if name.is_empty() {
            return NameRef::EMPTY;
        }
        let needs_page = match &self.bump {
            Some(page) => self.cursor + name.len() > page.bytes().len(),
            None => true,
        };
        if needs_page {
            if let Some(full) = self.bump.take() {
                self.sealed.push(full);
            }
            self.bump = Some(pool.acquire(self.frame));
            self.cursor = 0;
        }
        let page = self.bump.as_mut().expect("bump page just ensured");
        let offset = self.cursor;
        page.bytes_mut()[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        self.cursor += name.len();
        NameRef {
            serial: page.serial(),
            offset: offset as u32,
            len: name.len() as u32,
        }
    }

    /// Take ownership of a page filled by an external writer.
    ///
    /// Pages stamped for a different frame are rejected and returned to
    /// the caller; sealing them here would let a stale reference resolve
    /// against the wrong frame's events.
    pub fn seal(&mut self, pool: &PagePool, page: Page) {
        if page.stamp() == self.frame {
            self.sealed.push(page);
        } else {
            pool.release(page);
        }
    }

    /// Resolve a name reference against the pages this store owns.
    ///
    /// Returns `None` for references into pages this store never saw
    /// (e.g. a reference that outlived its frame).
    pub fn resolve(&self, name: NameRef) -> Option<&str> {
        if name.len == 0 {
            return Some("");
        }
        let page = self
            .bump
            .iter()
            .chain(self.sealed.iter())
            .find(|p| p.serial() == name.serial)?;
        let start = name.offset as usize;
        let end = start + name.len as usize;
        let bytes = page.bytes().get(start..end)?;
        str::from_utf8(bytes).ok()
    }

    /// Release every page to the pool and rebind the store to a new frame.
    pub fn reset(&mut self, pool: &PagePool, frame: FrameId) {
        if let Some(page) = self.bump.take() {
            pool.release(page);
        }
        for page in self.sealed.drain(..) {
            pool.release(page);
        }
        self.cursor = 0;
        self.frame = frame;
    }

    /// Number of pages currently owned (bump + sealed).
    pub fn page_count(&self) -> usize {
        self.sealed.len() + usize::from(self.bump.is_some())
    }
}

/// Bump writer owned by one producer (a GPU command-list recorder).
///
/// Writes go into a page the writer holds exclusively; no lock is taken
/// per string. Filled pages accumulate until [`take_pages`] hands them to
/// the frame slot's [`NameStore`] at submission time.
///
/// [`take_pages`]: NameWriter::take_pages
pub struct NameWriter {
    page: Option<Page>,
    cursor: usize,
    full: Vec<Page>,
}

impl NameWriter {
    /// Create a writer with no page; one is acquired on first push.
    pub fn new() -> Self {
        Self {
            page: None,
            cursor: 0,
            full: Vec::new(),
        }
    }

    /// Copy `name` into the writer's page for `frame`.
    ///
    /// A held page stamped for an earlier frame is retired to the full
    /// list (its strings belong to that frame's events) before a fresh
    /// page is acquired.
    pub fn push(&mut self, pool: &PagePool, frame: FrameId, name: &str) -> NameRef {
        let name = clip(name, PAGE_SIZE);
        if name.is_empty() {
            return NameRef::EMPTY;
        }
        let needs_page = match &self.page {
            Some(page) => {
                page.stamp() != frame || self.cursor + name.len() > page.bytes().len()
            }
            None => true,
        };
        if needs_page {
            if let Some(old) = self.page.take() {
                self.full.push(old);
            }
            self.page = Some(pool.acquire(frame));
            self.cursor = 0;
        }
        let page = self.page.as_mut().expect("page just ensured");
        let offset = self.cursor;
        page.bytes_mut()[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        self.cursor += name.len();
        NameRef {
            serial: page.serial(),
            offset: offset as u32,
            len: name.len() as u32,
        }
    }

    /// Drain every page the writer holds, leaving it empty.
    pub fn take_pages(&mut self) -> Vec<Page> {
        let mut pages = std::mem::take(&mut self.full);
        if let Some(page) = self.page.take() {
            pages.push(page);
        }
        self.cursor = 0;
        pages
    }
}

impl Default for NameWriter {
    fn default() -> Self {
        Self::new()
    }
}
