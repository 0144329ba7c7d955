use crate::common::{PageAddress, Result, StorageError};

use super::{get_i32, put_i32};

/// Directory page layout:
///
/// | Field              | Offset              | Size    |
/// |--------------------|---------------------|---------|
/// | entry_count        | 0                   | 4       |
/// | entries            | 4                   | 12 each |
/// | next_file_index    | page_size - 8       | 4       |
/// | next_page_index    | page_size - 4       | 4       |
///
/// Each entry is `(file_index, page_index, free_bytes)` for one data page.
/// A `next_page_index` of -1 ends the chain.
const ENTRY_COUNT_OFFSET: usize = 0;

/// Offset of the first entry
const ENTRIES_OFFSET: usize = 4;

/// Size of each entry in bytes
pub const DIRECTORY_ENTRY_SIZE: usize = 12;

/// Size of the chain pointer at the end of the page
const NEXT_POINTER_SIZE: usize = 8;

/// A data page as recorded in its table's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub page: PageAddress,
    pub free_bytes: i32,
}

/// Number of entries a directory page of `page_size` bytes holds.
pub fn directory_capacity(page_size: usize) -> usize {
    page_size.saturating_sub(ENTRIES_OFFSET + NEXT_POINTER_SIZE) / DIRECTORY_ENTRY_SIZE
}

/// Mutable view of a directory page.
pub struct DirectoryPage<'a> {
    data: &'a mut [u8],
}

impl<'a> DirectoryPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Formats an empty directory page with no successor.
    pub fn init(&mut self) {
        self.data.fill(0);
        self.set_entry_count(0);
        self.set_next(PageAddress::NONE);
    }

    pub fn view(&self) -> DirectoryPageRef<'_> {
        DirectoryPageRef::new(&*self.data)
    }

    fn set_entry_count(&mut self, count: usize) {
        put_i32(self.data, ENTRY_COUNT_OFFSET, count as i32);
    }

    /// Points this page at the next directory page in the chain.
    pub fn set_next(&mut self, next: PageAddress) {
        let offset = self.data.len() - NEXT_POINTER_SIZE;
        put_i32(self.data, offset, next.file_index);
        put_i32(self.data, offset + 4, next.page_index);
    }

    /// Appends an entry. Returns false if the page is already full.
    pub fn push_entry(&mut self, entry: DirectoryEntry) -> bool {
        let count = self.view().entry_count();
        if count >= directory_capacity(self.data.len()) {
            return false;
        }
        self.write_entry(count, entry);
        self.set_entry_count(count + 1);
        true
    }

    /// Updates the recorded free space of entry `index`.
    pub fn set_free_bytes(&mut self, index: usize, free_bytes: i32) -> bool {
        if index >= self.view().entry_count() {
            return false;
        }
        let offset = ENTRIES_OFFSET + index * DIRECTORY_ENTRY_SIZE;
        put_i32(self.data, offset + 8, free_bytes);
        true
    }

    fn write_entry(&mut self, index: usize, entry: DirectoryEntry) {
        let offset = ENTRIES_OFFSET + index * DIRECTORY_ENTRY_SIZE;
        put_i32(self.data, offset, entry.page.file_index);
        put_i32(self.data, offset + 4, entry.page.page_index);
        put_i32(self.data, offset + 8, entry.free_bytes);
    }
}

/// Read-only view of a directory page.
pub struct DirectoryPageRef<'a> {
    data: &'a [u8],
}

impl<'a> DirectoryPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of valid entries on this page.
    pub fn entry_count(&self) -> usize {
        get_i32(self.data, ENTRY_COUNT_OFFSET).max(0) as usize
    }

    pub fn capacity(&self) -> usize {
        directory_capacity(self.data.len())
    }

    pub fn is_full(&self) -> bool {
        self.entry_count() >= self.capacity()
    }

    pub fn entry(&self, index: usize) -> Option<DirectoryEntry> {
        if index >= self.entry_count().min(self.capacity()) {
            return None;
        }
        let offset = ENTRIES_OFFSET + index * DIRECTORY_ENTRY_SIZE;
        Some(DirectoryEntry {
            page: PageAddress::new(get_i32(self.data, offset), get_i32(self.data, offset + 4)),
            free_bytes: get_i32(self.data, offset + 8),
        })
    }

    pub fn entries(&self) -> Vec<DirectoryEntry> {
        (0..self.entry_count().min(self.capacity()))
            .filter_map(|i| self.entry(i))
            .collect()
    }

    /// The next directory page, or None at the end of the chain.
    pub fn next(&self) -> Option<PageAddress> {
        let offset = self.data.len() - NEXT_POINTER_SIZE;
        let next = PageAddress::new(get_i32(self.data, offset), get_i32(self.data, offset + 4));
        (!next.is_none()).then_some(next)
    }

    /// Rejects pages whose header cannot belong to a directory page.
    pub fn check(&self, address: PageAddress) -> Result<()> {
        let count = get_i32(self.data, ENTRY_COUNT_OFFSET);
        if count < 0 || count as usize > self.capacity() {
            return Err(StorageError::CorruptPage {
                address,
                reason: format!(
                    "directory entry count {} outside 0..={}",
                    count,
                    self.capacity()
                ),
            });
        }
        Ok(())
    }
}
