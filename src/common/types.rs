use std::fmt;

/// Identifies one page across the whole store: the backing file and the
/// page's position inside that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageAddress {
    pub file_index: i32,
    pub page_index: i32,
}

impl PageAddress {
    /// Marker stored in chain pointers that lead nowhere.
    pub const NONE: PageAddress = PageAddress {
        file_index: -1,
        page_index: -1,
    };

    pub fn new(file_index: i32, page_index: i32) -> Self {
        Self {
            file_index,
            page_index,
        }
    }

    /// Returns true if this is a chain terminator rather than a real page.
    pub fn is_none(&self) -> bool {
        self.page_index == -1
    }
}

impl fmt::Display for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}, {})", self.file_index, self.page_index)
    }
}

/// Slot identifier within a data page's slot directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Record identifier - the slot index plus the data page holding it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub slot_id: SlotId,
    pub page: PageAddress,
}

impl RecordId {
    pub fn new(slot_id: SlotId, page: PageAddress) -> Self {
        Self { slot_id, page }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.slot_id.0, self.page)
    }
}
