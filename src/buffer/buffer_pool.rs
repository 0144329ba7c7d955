use log::{debug, trace, warn};

use crate::common::{DbConfig, PageAddress, ReplacementPolicy, Result, StorageError};
use crate::storage::disk::DiskSpaceManager;

use super::{EvictionList, Frame, FrameIndex};

/// Snapshot of buffer pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured number of frames
    pub buffer_count: usize,
    /// Frames currently holding a page
    pub cached_frames: usize,
    /// Buffers waiting in the free pool
    pub free_buffers: usize,
    /// Cached frames with a pin count of zero
    pub evictable_frames: usize,
}

/// BufferPool caches pages in a fixed number of page-sized buffers.
///
/// A page is pinned by [`fetch`](Self::fetch) and unpinned by
/// [`release`](Self::release); only pages with no outstanding pins sit in
/// the eviction list and can be reclaimed when the pool runs out of free
/// buffers. Which one goes is decided by the configured policy.
pub struct BufferPool {
    /// Page store, the only component that performs I/O
    disk: DiskSpaceManager,
    /// Number of buffers the pool was created with
    buffer_count: usize,
    /// Cached frames keyed by page address
    frames: FrameIndex,
    /// Unpinned frames, in the order they became unpinned
    eviction_list: EvictionList,
    /// Buffers not holding any page
    free_buffers: Vec<Box<[u8]>>,
    /// Replacement policy name, parsed when an eviction happens
    policy: String,
}

impl BufferPool {
    /// Creates a pool of `bm_buffer_count` zeroed buffers over `disk`.
    pub fn new(disk: DiskSpaceManager, config: &DbConfig) -> Self {
        let buffer_count = config.bm_buffer_count;
        let page_size = disk.page_size();
        let free_buffers = (0..buffer_count)
            .map(|_| vec![0u8; page_size].into_boxed_slice())
            .collect();

        Self {
            disk,
            buffer_count,
            frames: FrameIndex::new(),
            eviction_list: EvictionList::with_capacity(buffer_count),
            free_buffers,
            policy: config.bm_policy.clone(),
        }
    }

    /// Pins `address` and returns its buffer, reading it from disk on a miss.
    ///
    /// The caller must hand the pin back with [`release`](Self::release).
    pub fn fetch(&mut self, address: PageAddress) -> Result<&mut [u8]> {
        if self.frames.contains(&address) {
            let frame = self
                .frames
                .search_mut(&address)
                .ok_or(StorageError::PageNotCached(address))?;
            if let Some(node) = frame.eviction_node() {
                self.eviction_list.remove(node);
                frame.set_eviction_node(None);
            }
            let pins = frame.pin();
            trace!("fetch {} hit, pin count {}", address, pins);
            return Ok(frame.data_mut());
        }

        if self.free_buffers.is_empty() {
            self.evict()?;
        }
        let mut buffer = self.free_buffers.pop().ok_or(StorageError::BufferPoolFull)?;

        if let Err(e) = self.disk.read(address, &mut buffer) {
            buffer.fill(0);
            self.free_buffers.push(buffer);
            return Err(e);
        }

        trace!("fetch {} miss, loaded from disk", address);
        self.frames.insert(Frame::new(address, buffer));
        let frame = self
            .frames
            .search_mut(&address)
            .ok_or(StorageError::PageNotCached(address))?;
        Ok(frame.data_mut())
    }

    /// Drops one pin on `address`, recording whether the caller modified it.
    /// The dirty flag is sticky: releasing clean never clears it.
    pub fn release(&mut self, address: PageAddress, dirty: bool) -> Result<()> {
        let frame = self
            .frames
            .search_mut(&address)
            .ok_or(StorageError::PageNotCached(address))?;

        let remaining = frame.unpin().ok_or(StorageError::PageNotPinned(address))?;
        frame.mark_dirty(dirty);

        if remaining == 0 {
            let node = self.eviction_list.push_back(address);
            frame.set_eviction_node(Some(node));
        }
        trace!("release {} (dirty={}), pin count {}", address, dirty, remaining);
        Ok(())
    }

    /// Writes `address` to disk if it is cached and dirty.
    /// Returns false if the page is not in the pool.
    pub fn flush_page(&mut self, address: PageAddress) -> Result<bool> {
        let Some(frame) = self.frames.search_mut(&address) else {
            return Ok(false);
        };
        if frame.is_dirty() {
            self.disk.write(address, frame.data())?;
            frame.clear_dirty();
        }
        Ok(true)
    }

    /// Writes every dirty page, then empties the cache and returns all
    /// buffers to the free pool.
    pub fn flush_all(&mut self) -> Result<()> {
        let disk = &mut self.disk;
        let mut written = 0;
        self.frames.try_for_each_mut(|frame| {
            if frame.pin_count() > 0 {
                warn!(
                    "flushing {} while it still has {} pin(s)",
                    frame.address(),
                    frame.pin_count()
                );
            }
            if frame.is_dirty() {
                disk.write(frame.address(), frame.data())?;
                frame.clear_dirty();
                written += 1;
            }
            Ok(())
        })?;

        let frames = self.frames.drain();
        let dropped = frames.len();
        self.free_buffers
            .extend(frames.into_iter().map(Frame::into_buffer));
        self.eviction_list.clear();

        debug!("flush_all wrote {} page(s), dropped {} frame(s)", written, dropped);
        Ok(())
    }

    /// Reclaims one buffer from an unpinned frame chosen by the policy.
    fn evict(&mut self) -> Result<()> {
        let policy: ReplacementPolicy = self.policy.parse()?;
        let victim = match policy {
            ReplacementPolicy::Lru => self.eviction_list.front(),
            ReplacementPolicy::Mru => self.eviction_list.back(),
        };
        let (node, address) = victim.ok_or(StorageError::BufferPoolFull)?;

        let frame = self
            .frames
            .search(&address)
            .ok_or(StorageError::PageNotCached(address))?;
        let dirty = frame.is_dirty();
        if dirty {
            self.disk.write(address, frame.data())?;
        }

        self.eviction_list.remove(node);
        let frame = self
            .frames
            .delete(&address)
            .ok_or(StorageError::PageNotCached(address))?;
        self.free_buffers.push(frame.into_buffer());

        debug!("evicted {} ({}, dirty={})", address, policy, dirty);
        Ok(())
    }

    /// Changes the replacement policy. The name is checked on the next eviction.
    pub fn set_policy(&mut self, policy: impl Into<String>) {
        self.policy = policy.into();
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Returns the pin count of a cached page.
    pub fn pin_count(&self, address: PageAddress) -> Option<u32> {
        self.frames.search(&address).map(Frame::pin_count)
    }

    /// Returns the dirty flag of a cached page.
    pub fn is_dirty(&self, address: PageAddress) -> Option<bool> {
        self.frames.search(&address).map(Frame::is_dirty)
    }

    /// Returns true if `address` is waiting in the eviction list.
    pub fn is_evictable(&self, address: PageAddress) -> bool {
        self.frames
            .search(&address)
            .is_some_and(|f| f.eviction_node().is_some())
    }

    /// Addresses in eviction order under LRU (oldest unpinned first).
    pub fn eviction_order(&self) -> Vec<PageAddress> {
        self.eviction_list.iter().collect()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            buffer_count: self.buffer_count,
            cached_frames: self.frames.len(),
            free_buffers: self.free_buffers.len(),
            evictable_frames: self.eviction_list.len(),
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    pub fn page_size(&self) -> usize {
        self.disk.page_size()
    }

    pub fn disk(&self) -> &DiskSpaceManager {
        &self.disk
    }

    pub fn disk_mut(&mut self) -> &mut DiskSpaceManager {
        &mut self.disk
    }
}
