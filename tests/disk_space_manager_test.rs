//! Integration tests for the disk space manager

use std::fs;

use slotdb::common::{DbConfig, PageAddress, StorageError};
use slotdb::storage::disk::{DiskSpaceManager, STATE_FILE_NAME};
use tempfile::TempDir;

fn config(dir: &TempDir, page_size: usize, pages_per_file: u64) -> DbConfig {
    DbConfig::new(dir.path())
        .with_page_size(page_size)
        .with_max_file_size(page_size as u64 * pages_per_file)
}

#[test]
fn test_allocate_spans_files() {
    let dir = TempDir::new().unwrap();
    let config = DbConfig::new(dir.path())
        .with_page_size(250)
        .with_max_file_size(500);
    let mut dm = DiskSpaceManager::open(&config).unwrap();

    let addresses: Vec<PageAddress> = (0..5).map(|_| dm.allocate().unwrap()).collect();
    assert_eq!(
        addresses,
        vec![
            PageAddress::new(0, 0),
            PageAddress::new(0, 1),
            PageAddress::new(1, 0),
            PageAddress::new(1, 1),
            PageAddress::new(2, 0),
        ]
    );

    let len = |i: i32| fs::metadata(dm.page_file_path(i)).unwrap().len();
    assert_eq!(len(0), 500);
    assert_eq!(len(1), 500);
    assert_eq!(len(2), 250);
    assert_eq!(dm.allocated_page_count(), 5);
}

#[test]
fn test_freed_pages_reused_lifo() {
    let dir = TempDir::new().unwrap();
    let mut dm = DiskSpaceManager::open(&config(&dir, 128, 8)).unwrap();

    let a = dm.allocate().unwrap();
    let b = dm.allocate().unwrap();
    let c = dm.allocate().unwrap();

    dm.deallocate(a).unwrap();
    dm.deallocate(b).unwrap();
    assert_eq!(dm.free_page_count(), 2);

    assert_eq!(dm.allocate().unwrap(), b);
    assert_eq!(dm.allocate().unwrap(), a);

    // Free list exhausted: the high-water mark moves on past c
    let d = dm.allocate().unwrap();
    assert!(d > c);
    assert_eq!(dm.allocated_page_count(), 4);
}

#[test]
fn test_read_write_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut dm = DiskSpaceManager::open(&config(&dir, 128, 2)).unwrap();

    let pages: Vec<PageAddress> = (0..5).map(|_| dm.allocate().unwrap()).collect();
    for (i, &page) in pages.iter().enumerate() {
        let data = vec![i as u8 + 1; 128];
        dm.write(page, &data).unwrap();
    }

    let mut buf = vec![0u8; 128];
    for (i, &page) in pages.iter().enumerate().rev() {
        dm.read(page, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == i as u8 + 1), "page {}", page);
    }
    assert_eq!(dm.num_reads(), 5);
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 128, 4);

    let freed;
    let kept;
    {
        let mut dm = DiskSpaceManager::open(&config).unwrap();
        let pages: Vec<PageAddress> = (0..6).map(|_| dm.allocate().unwrap()).collect();
        freed = pages[2];
        kept = pages[4];
        dm.write(kept, &[0x5a; 128]).unwrap();
        dm.deallocate(freed).unwrap();
        dm.save_state().unwrap();
    }

    let raw = fs::read(dir.path().join(STATE_FILE_NAME)).unwrap();
    assert_eq!(raw.len(), 8 + 8);
    assert_eq!(&raw[..8], &(5u64 * 128).to_be_bytes());

    let mut dm = DiskSpaceManager::open(&config).unwrap();
    assert!(dm.has_saved_state());
    dm.load_state().unwrap();
    assert_eq!(dm.allocated_page_count(), 5);
    assert_eq!(dm.free_page_count(), 1);

    let mut buf = vec![0u8; 128];
    dm.read(kept, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0x5a));

    assert_eq!(dm.allocate().unwrap(), freed);
    assert_eq!(dm.allocate().unwrap(), PageAddress::new(1, 2));
}

#[test]
fn test_load_without_sidecar() {
    let dir = TempDir::new().unwrap();
    let mut dm = DiskSpaceManager::open(&config(&dir, 128, 4)).unwrap();
    assert!(!dm.has_saved_state());
    assert!(matches!(
        dm.load_state(),
        Err(StorageError::MissingState(_))
    ));
}

#[test]
fn test_invalid_configuration_rejected() {
    let dir = TempDir::new().unwrap();
    let config = DbConfig::new(dir.path())
        .with_page_size(128)
        .with_max_file_size(200);
    assert!(matches!(
        DiskSpaceManager::open(&config),
        Err(StorageError::Config(_))
    ));
}
