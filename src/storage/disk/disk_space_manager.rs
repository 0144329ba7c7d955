use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use log::{debug, info};
use parking_lot::{const_mutex, Mutex};

use crate::common::{DbConfig, PageAddress, Result, StorageError};

/// Name of the allocation-state sidecar inside the data directory.
pub const STATE_FILE_NAME: &str = "dm.save";

/// Extension of the page files `F<index>.rsdb`.
pub const PAGE_FILE_EXTENSION: &str = "rsdb";

/// Data directories with a live DiskSpaceManager in this process.
static OPEN_DIRS: Mutex<Vec<PathBuf>> = const_mutex(Vec::new());

/// DiskSpaceManager hands out page addresses over a growing set of bounded
/// backing files and performs whole-page reads and writes against them.
///
/// Pages are laid out linearly: the n-th page ever allocated lives in file
/// `n / pages_per_file` at index `n % pages_per_file`. Freed addresses go on a
/// LIFO free list and are handed out again before the high-water mark moves.
///
/// Only one manager may be open per data directory at a time.
pub struct DiskSpaceManager {
    /// Canonical data directory, also the registry key
    data_dir: PathBuf,
    /// Bytes per page
    page_size: usize,
    /// Pages per backing file
    pages_per_file: u64,
    /// Bytes of pages currently handed out
    total_allocated: u64,
    /// Freed addresses, most recently freed at the back
    free_list: Vec<PageAddress>,
    /// Open handles to the backing files
    files: HashMap<i32, File>,
    /// Number of page reads performed
    num_reads: u64,
    /// Number of page writes performed
    num_writes: u64,
}

impl DiskSpaceManager {
    /// Opens the manager for the configured data directory, creating the
    /// directory if needed. Allocation state starts empty; call
    /// [`load_state`](Self::load_state) to restore a saved one.
    pub fn open(config: &DbConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.db_path)?;
        let data_dir = fs::canonicalize(&config.db_path)?;

        {
            let mut open_dirs = OPEN_DIRS.lock();
            if open_dirs.contains(&data_dir) {
                return Err(StorageError::AlreadyOpen(data_dir));
            }
            open_dirs.push(data_dir.clone());
        }

        info!(
            "opened page store at {} (pagesize={}, {} pages/file)",
            data_dir.display(),
            config.page_size,
            config.pages_per_file()
        );

        Ok(Self {
            data_dir,
            page_size: config.page_size,
            pages_per_file: config.pages_per_file(),
            total_allocated: 0,
            free_list: Vec::new(),
            files: HashMap::new(),
            num_reads: 0,
            num_writes: 0,
        })
    }

    /// Allocates a page, preferring the most recently freed address.
    /// A never-used address is zero-filled on disk before it is returned.
    pub fn allocate(&mut self) -> Result<PageAddress> {
        if let Some(address) = self.free_list.pop() {
            self.total_allocated += self.page_size as u64;
            debug!("allocate {} (reused)", address);
            return Ok(address);
        }

        let linear = self.total_allocated / self.page_size as u64;
        let address = self.address_of(linear)?;

        let zeros = vec![0u8; self.page_size];
        self.write(address, &zeros)?;
        self.total_allocated += self.page_size as u64;

        debug!("allocate {} (new)", address);
        Ok(address)
    }

    /// Returns a page to the free list. No I/O is performed.
    pub fn deallocate(&mut self, address: PageAddress) -> Result<()> {
        self.check_allocated_range(address)?;
        if self.free_list.contains(&address) {
            return Err(StorageError::DoubleFree(address));
        }

        self.free_list.push(address);
        self.total_allocated -= self.page_size as u64;
        debug!("deallocate {}", address);
        Ok(())
    }

    /// Reads exactly one page into `data`, which must be `page_size` bytes.
    pub fn read(&mut self, address: PageAddress, data: &mut [u8]) -> Result<()> {
        self.check_buffer(data.len())?;
        self.check_geometry(address)?;

        let offset = self.file_offset(address);
        let file = self.file(address.file_index, false)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut read = 0;
        while read < data.len() {
            match file.read(&mut data[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if read < data.len() {
            return Err(StorageError::ShortRead {
                address,
                read,
                expected: data.len(),
            });
        }

        self.num_reads += 1;
        Ok(())
    }

    /// Writes exactly one page from `data`, which must be `page_size` bytes.
    pub fn write(&mut self, address: PageAddress, data: &[u8]) -> Result<()> {
        self.check_buffer(data.len())?;
        self.check_geometry(address)?;

        let offset = self.file_offset(address);
        let file = self.file(address.file_index, true)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut written = 0;
        while written < data.len() {
            match file.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if written < data.len() {
            return Err(StorageError::ShortWrite {
                address,
                written,
                expected: data.len(),
            });
        }
        file.flush()?;

        self.num_writes += 1;
        Ok(())
    }

    /// Persists the allocated byte count and the free list to the sidecar.
    ///
    /// Layout: `total_allocated: u64` followed by one `(file_index: i32,
    /// page_index: i32)` pair per free page, all big-endian, no count prefix.
    pub fn save_state(&self) -> Result<()> {
        let mut buf = BytesMut::with_capacity(8 + 8 * self.free_list.len());
        buf.put_u64(self.total_allocated);
        for address in &self.free_list {
            buf.put_i32(address.file_index);
            buf.put_i32(address.page_index);
        }

        fs::write(self.state_path(), &buf)?;
        debug!(
            "saved allocation state: {} bytes allocated, {} free pages",
            self.total_allocated,
            self.free_list.len()
        );
        Ok(())
    }

    /// Restores the state written by [`save_state`](Self::save_state).
    /// Fails if the sidecar is absent or empty.
    pub fn load_state(&mut self) -> Result<()> {
        let path = self.state_path();
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::MissingState(path))
            }
            Err(e) => return Err(e.into()),
        };
        if raw.is_empty() {
            return Err(StorageError::MissingState(path));
        }
        if raw.len() < 8 || (raw.len() - 8) % 8 != 0 {
            return Err(StorageError::CorruptState(format!(
                "{} has unexpected length {}",
                path.display(),
                raw.len()
            )));
        }

        let mut buf = &raw[..];
        let total_allocated = buf.get_u64();
        if total_allocated % self.page_size as u64 != 0 {
            return Err(StorageError::CorruptState(format!(
                "allocated byte count {} is not a multiple of pagesize {}",
                total_allocated, self.page_size
            )));
        }

        let mut free_list = Vec::with_capacity(buf.remaining() / 8);
        while buf.has_remaining() {
            let file_index = buf.get_i32();
            let page_index = buf.get_i32();
            free_list.push(PageAddress::new(file_index, page_index));
        }

        self.total_allocated = total_allocated;
        self.free_list = free_list;
        debug!(
            "loaded allocation state: {} bytes allocated, {} free pages",
            self.total_allocated,
            self.free_list.len()
        );
        Ok(())
    }

    /// Returns true if a saved state exists for this data directory.
    pub fn has_saved_state(&self) -> bool {
        fs::metadata(self.state_path())
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    /// Flushes every open backing file to stable storage.
    pub fn sync(&self) -> Result<()> {
        for file in self.files.values() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages one backing file holds.
    pub fn pages_per_file(&self) -> u64 {
        self.pages_per_file
    }

    /// Returns the number of bytes of pages currently handed out.
    pub fn total_allocated(&self) -> u64 {
        self.total_allocated
    }

    /// Returns the number of pages currently handed out.
    pub fn allocated_page_count(&self) -> u64 {
        self.total_allocated / self.page_size as u64
    }

    /// Returns the number of addresses waiting on the free list.
    pub fn free_page_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u64 {
        self.num_reads
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the path of the backing file holding `file_index`.
    pub fn page_file_path(&self, file_index: i32) -> PathBuf {
        self.data_dir
            .join(format!("F{}.{}", file_index, PAGE_FILE_EXTENSION))
    }

    /// Location of the allocation-state sidecar.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE_NAME)
    }

    /// Returns true if any `F<index>.rsdb` page file exists in the data
    /// directory.
    pub fn has_page_files(&self) -> Result<bool> {
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            let is_page_file = path.extension().is_some_and(|ext| ext == PAGE_FILE_EXTENSION)
                && path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.strip_prefix('F'))
                    .is_some_and(|index| index.parse::<i32>().is_ok());
            if is_page_file {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Pages ever handed out: live ones plus the ones on the free list.
    fn high_water_mark(&self) -> u64 {
        self.allocated_page_count() + self.free_list.len() as u64
    }

    fn address_of(&self, linear: u64) -> Result<PageAddress> {
        let file_index = linear / self.pages_per_file;
        if file_index > i32::MAX as u64 {
            return Err(StorageError::Config("page store exhausted".to_string()));
        }
        Ok(PageAddress::new(
            file_index as i32,
            (linear % self.pages_per_file) as i32,
        ))
    }

    fn check_geometry(&self, address: PageAddress) -> Result<()> {
        if address.file_index < 0
            || address.page_index < 0
            || address.page_index as u64 >= self.pages_per_file
        {
            return Err(StorageError::InvalidAddress(address));
        }
        Ok(())
    }

    fn check_allocated_range(&self, address: PageAddress) -> Result<()> {
        self.check_geometry(address)?;
        let linear =
            address.file_index as u64 * self.pages_per_file + address.page_index as u64;
        if linear >= self.high_water_mark() {
            return Err(StorageError::InvalidAddress(address));
        }
        Ok(())
    }

    fn check_buffer(&self, len: usize) -> Result<()> {
        if len != self.page_size {
            return Err(StorageError::BufferSizeMismatch {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }

    fn file_offset(&self, address: PageAddress) -> u64 {
        address.page_index as u64 * self.page_size as u64
    }

    /// Returns the handle for a backing file, opening it on first use.
    /// Reads never create files: a missing file is an I/O error.
    fn file(&mut self, file_index: i32, create: bool) -> Result<&mut File> {
        if !self.files.contains_key(&file_index) {
            let path = self.page_file_path(file_index);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(create)
                .truncate(false)
                .open(&path)?;
            self.files.insert(file_index, file);
        }
        self.files
            .get_mut(&file_index)
            .ok_or(StorageError::InvalidAddress(PageAddress::new(file_index, 0)))
    }
}

impl Drop for DiskSpaceManager {
    fn drop(&mut self) {
        for file in self.files.values() {
            let _ = file.sync_all();
        }
        OPEN_DIRS.lock().retain(|dir| dir != &self.data_dir);
    }
}
