use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::{Result, StorageError};

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default maximum size of one backing file (1024 pages)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * DEFAULT_PAGE_SIZE as u64;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_COUNT: usize = 10;

/// Default replacement policy name
pub const DEFAULT_POLICY: &str = "LRU";

/// Default data directory
pub const DEFAULT_DB_PATH: &str = "db";

/// Which end of the eviction list a full pool reclaims from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Evict the page that became unpinned longest ago.
    Lru,
    /// Evict the page that became unpinned most recently.
    Mru,
}

impl FromStr for ReplacementPolicy {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "LRU" => Ok(ReplacementPolicy::Lru),
            "MRU" => Ok(ReplacementPolicy::Mru),
            other => Err(StorageError::UnsupportedPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementPolicy::Lru => write!(f, "LRU"),
            ReplacementPolicy::Mru => write!(f, "MRU"),
        }
    }
}

/// Settings consumed by the storage core.
///
/// The text form is one `key = value` pair per line; blank lines and lines
/// starting with `#` are ignored:
///
/// ```text
/// dbpath = ./data
/// pagesize = 4096
/// dm_maxfilesize = 4194304
/// bm_buffercount = 64
/// bm_policy = LRU
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Root directory for page files and the allocation sidecar
    pub db_path: PathBuf,
    /// Bytes per page, fixed for the database's lifetime
    pub page_size: usize,
    /// Maximum bytes per backing file, a multiple of `page_size`
    pub dm_max_file_size: u64,
    /// Number of frames in the buffer pool
    pub bm_buffer_count: usize,
    /// Replacement policy name; only checked when an eviction happens
    pub bm_policy: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            dm_max_file_size: DEFAULT_MAX_FILE_SIZE,
            bm_buffer_count: DEFAULT_BUFFER_COUNT,
            bm_policy: DEFAULT_POLICY.to_string(),
        }
    }
}

impl DbConfig {
    /// Creates a default configuration rooted at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// Reads and parses a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.dm_max_file_size = max_file_size;
        self
    }

    pub fn with_buffer_count(mut self, buffer_count: usize) -> Self {
        self.bm_buffer_count = buffer_count;
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.bm_policy = policy.into();
        self
    }

    /// Number of pages one backing file holds.
    pub fn pages_per_file(&self) -> u64 {
        self.dm_max_file_size / self.page_size as u64
    }

    /// Checks the page geometry. The policy name is not checked here.
    pub fn validate(&self) -> Result<()> {
        // Directory pages need room for their header, trailer and one entry.
        if self.page_size < 24 {
            return Err(StorageError::Config(format!(
                "pagesize {} is too small",
                self.page_size
            )));
        }
        if self.page_size > i32::MAX as usize {
            return Err(StorageError::Config(format!(
                "pagesize {} does not fit in a page offset",
                self.page_size
            )));
        }
        if self.dm_max_file_size == 0 || self.dm_max_file_size % self.page_size as u64 != 0 {
            return Err(StorageError::Config(format!(
                "dm_maxfilesize {} must be a positive multiple of pagesize {}",
                self.dm_max_file_size, self.page_size
            )));
        }
        if self.pages_per_file() > i32::MAX as u64 {
            return Err(StorageError::Config(format!(
                "dm_maxfilesize {} holds too many pages",
                self.dm_max_file_size
            )));
        }
        if self.bm_buffer_count == 0 {
            return Err(StorageError::Config(
                "bm_buffercount must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for DbConfig {
    type Err = StorageError;

    fn from_str(text: &str) -> Result<Self> {
        let mut config = DbConfig::default();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                StorageError::Config(format!("line {}: expected key = value", line_no + 1))
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "dbpath" => config.db_path = PathBuf::from(value),
                "pagesize" => config.page_size = parse_number(key, value)?,
                "dm_maxfilesize" => config.dm_max_file_size = parse_number(key, value)?,
                "bm_buffercount" => config.bm_buffer_count = parse_number(key, value)?,
                "bm_policy" => config.bm_policy = value.to_string(),
                _ => {
                    return Err(StorageError::Config(format!(
                        "line {}: unknown key {}",
                        line_no + 1,
                        key
                    )))
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| StorageError::Config(format!("{} expects a number, got {:?}", key, value)))
}
