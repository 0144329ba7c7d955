use crate::common::PageAddress;

use super::NodeRef;

/// A cached page: its buffer plus the pin and dirty bookkeeping.
#[derive(Debug)]
pub struct Frame {
    /// The page held in this frame
    address: PageAddress,
    /// The page contents
    data: Box<[u8]>,
    /// Number of outstanding fetches not yet released
    pin_count: u32,
    /// Whether the page has been modified since it was last written out
    is_dirty: bool,
    /// Position in the eviction list; present exactly when unpinned
    eviction_node: Option<NodeRef>,
}

impl Frame {
    /// Wraps a freshly loaded buffer. The frame starts pinned once.
    pub fn new(address: PageAddress, data: Box<[u8]>) -> Self {
        Self {
            address,
            data,
            pin_count: 1,
            is_dirty: false,
            eviction_node: None,
        }
    }

    pub fn address(&self) -> PageAddress {
        self.address
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&mut self) -> Option<u32> {
        self.pin_count = self.pin_count.checked_sub(1)?;
        Some(self.pin_count)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// ORs `dirty` into the flag; only a write-out clears it.
    pub fn mark_dirty(&mut self, dirty: bool) {
        self.is_dirty |= dirty;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.is_dirty = false;
    }

    pub fn eviction_node(&self) -> Option<NodeRef> {
        self.eviction_node
    }

    pub(crate) fn set_eviction_node(&mut self, node: Option<NodeRef>) {
        self.eviction_node = node;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zeroes the buffer and hands it back for reuse.
    pub fn into_buffer(self) -> Box<[u8]> {
        let mut data = self.data;
        data.fill(0);
        data
    }
}
