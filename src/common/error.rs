use std::path::PathBuf;

use thiserror::Error;

use super::types::{PageAddress, SlotId};
use crate::tuple::DataType;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short read on {address}: got {read} of {expected} bytes")]
    ShortRead {
        address: PageAddress,
        read: usize,
        expected: usize,
    },

    #[error("Short write on {address}: wrote {written} of {expected} bytes")]
    ShortWrite {
        address: PageAddress,
        written: usize,
        expected: usize,
    },

    #[error("Buffer must be {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid page address: {0}")]
    InvalidAddress(PageAddress),

    #[error("Page {0} is already on the free list")]
    DoubleFree(PageAddress),

    #[error("Data directory {0} is already open in this process")]
    AlreadyOpen(PathBuf),

    #[error("Allocation state file {0} is missing or empty")]
    MissingState(PathBuf),

    #[error("Allocation state corrupted: {0}")]
    CorruptState(String),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Page {0} is not in the buffer pool")]
    PageNotCached(PageAddress),

    #[error("Page {0} is not pinned")]
    PageNotPinned(PageAddress),

    #[error("Unsupported replacement policy: {0}")]
    UnsupportedPolicy(String),

    #[error("Page {address} corrupted: {reason}")]
    CorruptPage {
        address: PageAddress,
        reason: String,
    },

    #[error("Record of {size} bytes does not fit in an empty page ({capacity} bytes available)")]
    RecordTooLarge { size: usize, capacity: usize },

    #[error("Invalid slot ID: {0:?}")]
    InvalidSlot(SlotId),

    #[error("Slot {0:?} is empty")]
    EmptySlot(SlotId),

    #[error("Expected {expected} values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Column {column} expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        found: &'static str,
    },

    #[error("Column {column} holds at most {max} characters, got {len}")]
    ValueTooLong {
        column: String,
        max: usize,
        len: usize,
    },

    #[error("Malformed record: {0}")]
    CorruptRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
