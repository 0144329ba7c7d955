use log::info;

use crate::buffer::BufferPool;
use crate::common::{DbConfig, PageAddress, Result, StorageError};
use crate::storage::disk::DiskSpaceManager;
use crate::table::Relation;
use crate::tuple::Schema;

/// Owns the page store of one data directory and the buffer pool over it.
///
/// Dropping an engine without [`shutdown`](Self::shutdown) loses every dirty
/// page still cached and the allocation state of this session.
pub struct StorageEngine {
    config: DbConfig,
    pool: BufferPool,
}

impl StorageEngine {
    /// Opens the data directory named by `config`, restoring its allocation
    /// state if a previous session saved one. A directory holding page files
    /// but no saved state is rejected with `MissingState`.
    pub fn open(config: DbConfig) -> Result<Self> {
        let mut disk = DiskSpaceManager::open(&config)?;
        if disk.has_saved_state() {
            disk.load_state()?;
        } else if disk.has_page_files()? {
            // Starting from zero would hand out addresses of live pages
            return Err(StorageError::MissingState(disk.state_path()));
        }
        info!(
            "opened {} (pagesize {}, {} pages allocated, {} buffers, policy {})",
            disk.data_dir().display(),
            disk.page_size(),
            disk.allocated_page_count(),
            config.bm_buffer_count,
            config.bm_policy
        );

        let pool = BufferPool::new(disk, &config);
        Ok(Self { config, pool })
    }

    /// Creates an empty table. Keep its [`header_page`](Relation::header_page)
    /// to reopen it in a later session.
    pub fn create_table(&mut self, name: impl Into<String>, schema: Schema) -> Result<Relation> {
        Relation::create(&mut self.pool, name, schema)
    }

    pub fn open_table(
        &self,
        name: impl Into<String>,
        schema: Schema,
        header_page: PageAddress,
    ) -> Relation {
        Relation::open(name, schema, header_page)
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut BufferPool {
        &mut self.pool
    }

    /// Writes every dirty page, saves the allocation state and syncs the
    /// backing files.
    pub fn shutdown(mut self) -> Result<()> {
        self.pool.flush_all()?;
        let disk = self.pool.disk();
        disk.save_state()?;
        disk.sync()?;
        info!(
            "shut down {} ({} reads, {} writes)",
            disk.data_dir().display(),
            disk.num_reads(),
            disk.num_writes()
        );
        Ok(())
    }
}
