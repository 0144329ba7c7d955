//! slotdb - the storage core of a disk-based relational engine
//!
//! Pages live in a set of bounded files on disk and are cached in a small
//! pool of page-sized buffers. Tables are built on top as chains of directory
//! pages pointing at slotted data pages holding typed records.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page files and on-page formats
//!   - `DiskSpaceManager`: allocates, frees, reads and writes whole pages
//!   - `DirectoryPage`: a table's list of data pages and their free space
//!   - `DataPage`: slotted page of variable-length records
//!
//! - **Buffer Pool** (`buffer`): caching of pages in memory
//!   - `BufferPool`: pin/unpin protocol, dirty tracking, LRU/MRU eviction
//!   - `FrameIndex`: balanced tree of cached frames keyed by page address
//!   - `EvictionList`: unpinned frames in the order they became unpinned
//!
//! - **Records** (`tuple`): schemas, typed values and the record codec
//!
//! - **Tables** (`table`): `Relation`, insertion and scans over a table
//!
//! # Example
//!
//! ```rust,no_run
//! use slotdb::common::DbConfig;
//! use slotdb::engine::StorageEngine;
//! use slotdb::tuple::{DataType, Record, Schema, Value};
//!
//! let mut engine = StorageEngine::open(DbConfig::new("demo_db")).unwrap();
//!
//! let schema = Schema::builder()
//!     .column("id", DataType::Int)
//!     .column("name", DataType::VarChar(20))
//!     .build();
//! let people = engine.create_table("people", schema.clone()).unwrap();
//!
//! let alice = Record::new(&schema, vec![Value::Int(1), Value::from("alice")]).unwrap();
//! people.insert_record(engine.pool_mut(), &alice).unwrap();
//!
//! for record in people.get_all_records(engine.pool_mut()).unwrap() {
//!     println!("{:?}", record);
//! }
//!
//! engine.shutdown().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod engine;
pub mod storage;
pub mod table;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{DbConfig, PageAddress, RecordId, Result, SlotId, StorageError};
pub use engine::StorageEngine;
pub use table::Relation;
