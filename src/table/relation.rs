use log::debug;

use crate::buffer::BufferPool;
use crate::common::{PageAddress, RecordId, Result, StorageError};
use crate::storage::page::{
    data_page_capacity, DataPage, DataPageRef, DirectoryEntry, DirectoryPage, DirectoryPageRef,
    SLOT_SIZE,
};
use crate::tuple::{Record, Schema};

/// Position of one data page's entry inside the directory chain.
#[derive(Debug, Clone, Copy)]
struct EntryLocation {
    directory: PageAddress,
    index: usize,
    entry: DirectoryEntry,
}

/// A table stored as a chain of directory pages, each listing data pages and
/// the free bytes left on them.
///
/// The relation holds no pages itself. Every operation pins what it needs
/// through the buffer pool and releases it before returning.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    schema: Schema,
    header_page: PageAddress,
}

impl Relation {
    /// Allocates and formats the header directory page of a new, empty table.
    pub fn create(pool: &mut BufferPool, name: impl Into<String>, schema: Schema) -> Result<Self> {
        let header_page = pool.disk_mut().allocate()?;
        write_page(pool, header_page, |data| {
            DirectoryPage::new(data).init();
            Ok(())
        })?;

        let name = name.into();
        debug!("created relation {} with header {}", name, header_page);
        Ok(Self {
            name,
            schema,
            header_page,
        })
    }

    /// Attaches to a table whose header directory page already exists.
    pub fn open(name: impl Into<String>, schema: Schema, header_page: PageAddress) -> Self {
        Self {
            name: name.into(),
            schema,
            header_page,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn header_page(&self) -> PageAddress {
        self.header_page
    }

    /// Allocates an empty data page and registers it in the directory.
    pub fn append_data_page(&self, pool: &mut BufferPool) -> Result<PageAddress> {
        Ok(self.append_entry(pool)?.entry.page)
    }

    /// Every data page of the table, in directory order.
    pub fn list_data_pages(&self, pool: &mut BufferPool) -> Result<Vec<PageAddress>> {
        Ok(self
            .directory_entries(pool)?
            .into_iter()
            .map(|loc| loc.entry.page)
            .collect())
    }

    /// Data pages with room for at least one more byte and its slot.
    pub fn list_free_data_pages(&self, pool: &mut BufferPool) -> Result<Vec<PageAddress>> {
        Ok(self
            .directory_entries(pool)?
            .into_iter()
            .filter(|loc| loc.entry.free_bytes > SLOT_SIZE as i32)
            .map(|loc| loc.entry.page)
            .collect())
    }

    /// Stores `record` on the first data page with enough room, appending a
    /// new page when none has.
    pub fn insert_record(&self, pool: &mut BufferPool, record: &Record) -> Result<RecordId> {
        let size = record.encoded_size(&self.schema);
        let needed = size + SLOT_SIZE;
        let capacity = data_page_capacity(pool.page_size());
        if needed > capacity {
            return Err(StorageError::RecordTooLarge {
                size,
                capacity: capacity.saturating_sub(SLOT_SIZE),
            });
        }

        let existing = self
            .directory_entries(pool)?
            .into_iter()
            .find(|loc| loc.entry.free_bytes >= needed as i32);
        let location = match existing {
            Some(location) => location,
            None => self.append_entry(pool)?,
        };

        let page = location.entry.page;
        let schema = &self.schema;
        let (slot_id, free_bytes) = write_page(pool, page, |data| {
            DataPageRef::new(data).check(page)?;
            let mut data_page = DataPage::new(data);
            let slot_id = data_page.insert_record(schema, record)?;
            Ok((slot_id, data_page.view().free_space()))
        })?;

        write_page(pool, location.directory, |data| {
            if DirectoryPage::new(data).set_free_bytes(location.index, free_bytes as i32) {
                Ok(())
            } else {
                Err(StorageError::CorruptPage {
                    address: location.directory,
                    reason: format!("entry {} vanished", location.index),
                })
            }
        })?;

        Ok(RecordId::new(slot_id, page))
    }

    /// Every record of the table, page by page in insertion order.
    pub fn get_all_records(&self, pool: &mut BufferPool) -> Result<Vec<Record>> {
        Ok(self
            .scan(pool)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Every record of the table together with its id.
    pub fn scan(&self, pool: &mut BufferPool) -> Result<Vec<(RecordId, Record)>> {
        let mut out = Vec::new();
        for page in self.list_data_pages(pool)? {
            let records = read_page(pool, page, |data| {
                let view = DataPageRef::new(data);
                view.check(page)?;
                view.records(&self.schema)
            })?;
            out.extend(
                records
                    .into_iter()
                    .map(|(slot_id, record)| (RecordId::new(slot_id, page), record)),
            );
        }
        Ok(out)
    }

    pub fn read_record(&self, pool: &mut BufferPool, rid: RecordId) -> Result<Record> {
        read_page(pool, rid.page, |data| {
            let view = DataPageRef::new(data);
            view.check(rid.page)?;
            view.read_record(&self.schema, rid.slot_id)
        })
    }

    /// Empties the slot of `rid`. The space is not reclaimed.
    pub fn delete_record(&self, pool: &mut BufferPool, rid: RecordId) -> Result<()> {
        write_page(pool, rid.page, |data| {
            DataPageRef::new(data).check(rid.page)?;
            DataPage::new(data).delete_record(rid.slot_id)
        })
    }

    pub fn record_count(&self, pool: &mut BufferPool) -> Result<usize> {
        let mut count = 0;
        for page in self.list_data_pages(pool)? {
            count += read_page(pool, page, |data| {
                let view = DataPageRef::new(data);
                view.check(page)?;
                view.live_count()
            })?;
        }
        Ok(count)
    }

    /// Addresses of the directory pages, header first.
    fn directory_chain(&self, pool: &mut BufferPool) -> Result<Vec<PageAddress>> {
        let limit = pool.disk().allocated_page_count() as usize;
        let mut chain = Vec::new();
        let mut current = Some(self.header_page);

        while let Some(address) = current {
            if chain.len() > limit {
                return Err(StorageError::CorruptPage {
                    address,
                    reason: "directory chain does not terminate".to_string(),
                });
            }
            current = read_page(pool, address, |data| {
                let view = DirectoryPageRef::new(data);
                view.check(address)?;
                Ok(view.next())
            })?;
            chain.push(address);
        }
        Ok(chain)
    }

    fn directory_entries(&self, pool: &mut BufferPool) -> Result<Vec<EntryLocation>> {
        let mut locations = Vec::new();
        for directory in self.directory_chain(pool)? {
            let entries = read_page(pool, directory, |data| {
                Ok(DirectoryPageRef::new(data).entries())
            })?;
            locations.extend(
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(index, entry)| EntryLocation {
                        directory,
                        index,
                        entry,
                    }),
            );
        }
        Ok(locations)
    }

    fn append_entry(&self, pool: &mut BufferPool) -> Result<EntryLocation> {
        let page_size = pool.page_size();
        let page = pool.disk_mut().allocate()?;
        write_page(pool, page, |data| {
            DataPage::new(data).init();
            Ok(())
        })?;

        let entry = DirectoryEntry {
            page,
            free_bytes: data_page_capacity(page_size) as i32,
        };

        let last = self
            .directory_chain(pool)?
            .pop()
            .unwrap_or(self.header_page);
        let (is_full, count) = read_page(pool, last, |data| {
            let view = DirectoryPageRef::new(data);
            Ok((view.is_full(), view.entry_count()))
        })?;

        let (directory, index) = if is_full {
            let next = pool.disk_mut().allocate()?;
            write_page(pool, next, |data| {
                let mut directory = DirectoryPage::new(data);
                directory.init();
                directory.push_entry(entry);
                Ok(())
            })?;
            write_page(pool, last, |data| {
                DirectoryPage::new(data).set_next(next);
                Ok(())
            })?;
            debug!("{}: chained directory page {} after {}", self.name, next, last);
            (next, 0)
        } else {
            write_page(pool, last, |data| {
                DirectoryPage::new(data).push_entry(entry);
                Ok(())
            })?;
            (last, count)
        };

        debug!("{}: appended data page {}", self.name, page);
        Ok(EntryLocation {
            directory,
            index,
            entry,
        })
    }
}

/// Runs `f` over a pinned page and releases it clean.
fn read_page<T>(
    pool: &mut BufferPool,
    address: PageAddress,
    f: impl FnOnce(&[u8]) -> Result<T>,
) -> Result<T> {
    let data = pool.fetch(address)?;
    let result = f(&*data);
    pool.release(address, false)?;
    result
}

/// Runs `f` over a pinned page and releases it, dirty if `f` succeeded.
fn write_page<T>(
    pool: &mut BufferPool,
    address: PageAddress,
    f: impl FnOnce(&mut [u8]) -> Result<T>,
) -> Result<T> {
    let data = pool.fetch(address)?;
    let result = f(data);
    pool.release(address, result.is_ok())?;
    result
}
