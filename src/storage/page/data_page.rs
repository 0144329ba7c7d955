use crate::common::{PageAddress, Result, SlotId, StorageError};
use crate::tuple::{read_record_from_buffer, write_record_to_buffer, Record, Schema};

use super::{get_i32, put_i32};

/// Slotted data page layout:
///
/// ```text
/// +------------------+  offset 0
/// | Record Data      |  (grows forward)
/// | [record 0]       |
/// | [record 1]       |
/// | ...              |
/// +------------------+  free_space_offset
/// |                  |
/// | Free Space       |
/// |                  |
/// +------------------+
/// | ...              |
/// | [slot 1]         |
/// | [slot 0]         |  (grows backward)
/// +------------------+  page_size - 8
/// | slot_count       |  page_size - 8
/// | free_space_off   |  page_size - 4
/// +------------------+
/// ```
///
/// Each slot entry holds `(offset: i32, length: i32)` of one record.
/// A length of 0 marks a deleted record.
const TRAILER_SIZE: usize = 8;

/// Size of each slot entry in bytes
pub const SLOT_SIZE: usize = 8;

/// Free bytes of a freshly initialised data page.
pub fn data_page_capacity(page_size: usize) -> usize {
    page_size.saturating_sub(TRAILER_SIZE)
}

/// Represents a slot entry in the slot directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// Offset from start of page to record data
    pub offset: i32,
    /// Length of the record (0 = deleted)
    pub length: i32,
}

impl SlotEntry {
    pub fn is_empty(&self) -> bool {
        self.length <= 0
    }
}

/// Mutable view of a slotted data page.
pub struct DataPage<'a> {
    data: &'a mut [u8],
}

impl<'a> DataPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Initializes an empty data page.
    pub fn init(&mut self) {
        self.data.fill(0);
        self.set_slot_count(0);
        self.set_free_space_offset(0);
    }

    pub fn view(&self) -> DataPageRef<'_> {
        DataPageRef::new(&*self.data)
    }

    fn set_slot_count(&mut self, count: usize) {
        let offset = self.data.len() - TRAILER_SIZE;
        put_i32(self.data, offset, count as i32);
    }

    fn set_free_space_offset(&mut self, offset: usize) {
        let at = self.data.len() - 4;
        put_i32(self.data, at, offset as i32);
    }

    fn write_slot(&mut self, slot: usize, entry: SlotEntry) -> Result<()> {
        let offset = slot_position(self.data.len(), slot).ok_or_else(|| overrun(slot))?;
        put_i32(self.data, offset, entry.offset);
        put_i32(self.data, offset + 4, entry.length);
        Ok(())
    }

    /// Encodes `record` at the free space offset and appends a slot for it.
    pub fn insert_record(&mut self, schema: &Schema, record: &Record) -> Result<SlotId> {
        let size = record.encoded_size(schema);
        let free = self.view().free_space();
        if size + SLOT_SIZE > free {
            return Err(StorageError::RecordTooLarge {
                size,
                capacity: free.saturating_sub(SLOT_SIZE),
            });
        }

        let slot = self.view().slot_count();
        let offset = self.view().free_space_offset();
        if slot_position(self.data.len(), slot).is_none() {
            return Err(overrun(slot));
        }
        let written = write_record_to_buffer(schema, record, self.data, offset)?;

        self.write_slot(
            slot,
            SlotEntry {
                offset: offset as i32,
                length: written as i32,
            },
        )?;
        self.set_slot_count(slot + 1);
        self.set_free_space_offset(offset + written);

        Ok(SlotId::new(slot as u32))
    }

    /// Marks a slot as deleted. The record bytes are left in place.
    pub fn delete_record(&mut self, slot_id: SlotId) -> Result<()> {
        let mut entry = self.view().slot(slot_id)?;
        if entry.is_empty() {
            return Err(StorageError::EmptySlot(slot_id));
        }
        entry.length = 0;
        self.write_slot(slot_id.as_usize(), entry)
    }
}

/// Read-only view of a slotted data page.
pub struct DataPageRef<'a> {
    data: &'a [u8],
}

impl<'a> DataPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn slot_count(&self) -> usize {
        get_i32(self.data, self.data.len() - TRAILER_SIZE).max(0) as usize
    }

    /// End of the last written record.
    pub fn free_space_offset(&self) -> usize {
        get_i32(self.data, self.data.len() - 4).max(0) as usize
    }

    /// Start of the slot directory.
    fn slot_directory_start(&self) -> usize {
        (self.data.len() - TRAILER_SIZE).saturating_sub(self.slot_count() * SLOT_SIZE)
    }

    /// Bytes between the record area and the slot directory.
    pub fn free_space(&self) -> usize {
        self.slot_directory_start()
            .saturating_sub(self.free_space_offset())
    }

    pub fn slot(&self, slot_id: SlotId) -> Result<SlotEntry> {
        let slot = slot_id.as_usize();
        if slot >= self.slot_count() {
            return Err(StorageError::InvalidSlot(slot_id));
        }
        let offset = slot_position(self.data.len(), slot).ok_or_else(|| overrun(slot))?;
        Ok(SlotEntry {
            offset: get_i32(self.data, offset),
            length: get_i32(self.data, offset + 4),
        })
    }

    /// Number of slots still holding a record.
    pub fn live_count(&self) -> Result<usize> {
        let mut live = 0;
        for slot in 0..self.slot_count() {
            if !self.slot(SlotId::new(slot as u32))?.is_empty() {
                live += 1;
            }
        }
        Ok(live)
    }

    /// Decodes the record in `slot_id`.
    pub fn read_record(&self, schema: &Schema, slot_id: SlotId) -> Result<Record> {
        let entry = self.slot(slot_id)?;
        if entry.is_empty() {
            return Err(StorageError::EmptySlot(slot_id));
        }
        read_record_from_buffer(schema, self.record_area(entry)?, 0)
    }

    /// Decodes every live record, walking slots from the page end backward.
    pub fn records(&self, schema: &Schema) -> Result<Vec<(SlotId, Record)>> {
        let mut records = Vec::new();
        for slot in 0..self.slot_count() {
            let slot_id = SlotId::new(slot as u32);
            let entry = self.slot(slot_id)?;
            if entry.is_empty() {
                continue;
            }
            let record = read_record_from_buffer(schema, self.record_area(entry)?, 0)?;
            records.push((slot_id, record));
        }
        Ok(records)
    }

    fn record_area(&self, entry: SlotEntry) -> Result<&'a [u8]> {
        let start = usize::try_from(entry.offset).unwrap_or(usize::MAX);
        let len = usize::try_from(entry.length).unwrap_or(usize::MAX);
        match start.checked_add(len) {
            Some(end) if end <= self.free_space_offset().min(self.data.len()) => Ok(&self.data[start..end]),
            _ => Err(StorageError::CorruptRecord(format!(
                "slot points at {}+{} past the record area",
                entry.offset, entry.length
            ))),
        }
    }

    /// Rejects pages whose trailer cannot belong to a data page.
    pub fn check(&self, address: PageAddress) -> Result<()> {
        let len = self.data.len();
        let count = get_i32(self.data, len - TRAILER_SIZE);
        let free_offset = get_i32(self.data, len - 4);
        let corrupt = |reason: String| StorageError::CorruptPage { address, reason };

        if count < 0 || count as usize > (len - TRAILER_SIZE) / SLOT_SIZE {
            return Err(corrupt(format!("slot count {} out of range", count)));
        }
        if free_offset < 0 || free_offset as usize > self.slot_directory_start() {
            return Err(corrupt(format!(
                "free space offset {} overlaps the slot directory",
                free_offset
            )));
        }
        Ok(())
    }
}

/// Byte offset of slot `slot`, or None if it would fall before the page start.
fn slot_position(page_size: usize, slot: usize) -> Option<usize> {
    (slot + 1)
        .checked_mul(SLOT_SIZE)
        .and_then(|n| n.checked_add(TRAILER_SIZE))
        .and_then(|n| page_size.checked_sub(n))
}

fn overrun(slot: usize) -> StorageError {
    StorageError::CorruptRecord(format!("slot {} lies outside the page", slot))
}
