//! Integration tests for the buffer pool

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotdb::buffer::BufferPool;
use slotdb::common::{DbConfig, PageAddress, StorageError};
use slotdb::storage::disk::DiskSpaceManager;
use tempfile::TempDir;

const PAGE_SIZE: usize = 128;

fn create_pool(buffer_count: usize, policy: &str) -> (BufferPool, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = DbConfig::new(dir.path())
        .with_page_size(PAGE_SIZE)
        .with_max_file_size(PAGE_SIZE as u64 * 8)
        .with_buffer_count(buffer_count)
        .with_policy(policy);
    let disk = DiskSpaceManager::open(&config).unwrap();
    (BufferPool::new(disk, &config), dir)
}

fn allocate(pool: &mut BufferPool, n: usize) -> Vec<PageAddress> {
    (0..n).map(|_| pool.disk_mut().allocate().unwrap()).collect()
}

fn assert_pool_invariant(pool: &BufferPool) {
    let stats = pool.stats();
    assert_eq!(stats.cached_frames + stats.free_buffers, stats.buffer_count);
    assert!(stats.evictable_frames <= stats.cached_frames);
}

/// Fetches and releases each page in turn, leaving all of them unpinned.
fn touch_all(pool: &mut BufferPool, pages: &[PageAddress]) {
    for &page in pages {
        pool.fetch(page).unwrap();
        pool.release(page, false).unwrap();
    }
}

#[test]
fn test_lru_evicts_least_recently_released() {
    let (mut pool, _dir) = create_pool(3, "LRU");
    let pages = allocate(&mut pool, 4);
    let (a, b, c, d) = (pages[0], pages[1], pages[2], pages[3]);

    touch_all(&mut pool, &[a, b, c]);
    assert_eq!(pool.eviction_order(), vec![a, b, c]);

    pool.fetch(d).unwrap();
    assert_eq!(pool.pin_count(a), None);
    assert_eq!(pool.pin_count(b), Some(0));
    assert_eq!(pool.pin_count(c), Some(0));
    assert_eq!(pool.pin_count(d), Some(1));
    assert_pool_invariant(&pool);
}

#[test]
fn test_mru_evicts_most_recently_released() {
    let (mut pool, _dir) = create_pool(3, "MRU");
    let pages = allocate(&mut pool, 4);
    let (a, b, c, d) = (pages[0], pages[1], pages[2], pages[3]);

    touch_all(&mut pool, &[a, b, c]);
    pool.fetch(d).unwrap();

    assert_eq!(pool.pin_count(c), None);
    assert_eq!(pool.pin_count(a), Some(0));
    assert_eq!(pool.pin_count(b), Some(0));
    assert_pool_invariant(&pool);
}

#[test]
fn test_refetch_moves_page_to_back() {
    let (mut pool, _dir) = create_pool(3, "LRU");
    let pages = allocate(&mut pool, 4);

    touch_all(&mut pool, &pages[..3]);
    touch_all(&mut pool, &pages[..1]);
    assert_eq!(pool.eviction_order(), vec![pages[1], pages[2], pages[0]]);

    pool.fetch(pages[3]).unwrap();
    assert_eq!(pool.pin_count(pages[1]), None);
    assert_eq!(pool.pin_count(pages[0]), Some(0));
}

#[test]
fn test_pin_counting() {
    let (mut pool, _dir) = create_pool(2, "LRU");
    let pages = allocate(&mut pool, 1);
    let page = pages[0];

    pool.fetch(page).unwrap();
    pool.fetch(page).unwrap();
    assert_eq!(pool.pin_count(page), Some(2));
    assert!(!pool.is_evictable(page));

    pool.release(page, false).unwrap();
    assert_eq!(pool.pin_count(page), Some(1));
    assert!(!pool.is_evictable(page));

    pool.release(page, false).unwrap();
    assert_eq!(pool.pin_count(page), Some(0));
    assert!(pool.is_evictable(page));

    assert!(matches!(
        pool.release(page, false),
        Err(StorageError::PageNotPinned(_))
    ));
    assert!(matches!(
        pool.release(PageAddress::new(0, 5), false),
        Err(StorageError::PageNotCached(_))
    ));
    assert_pool_invariant(&pool);
}

#[test]
fn test_pool_full_when_everything_pinned() {
    let (mut pool, _dir) = create_pool(2, "LRU");
    let pages = allocate(&mut pool, 3);

    pool.fetch(pages[0]).unwrap();
    pool.fetch(pages[1]).unwrap();
    assert!(matches!(
        pool.fetch(pages[2]),
        Err(StorageError::BufferPoolFull)
    ));
    assert_eq!(pool.pin_count(pages[2]), None);
    assert_pool_invariant(&pool);

    pool.release(pages[1], false).unwrap();
    pool.fetch(pages[2]).unwrap();
    assert_eq!(pool.pin_count(pages[1]), None);
}

#[test]
fn test_dirty_page_written_on_eviction() {
    let (mut pool, _dir) = create_pool(1, "LRU");
    let pages = allocate(&mut pool, 2);

    pool.fetch(pages[0]).unwrap()[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    pool.release(pages[0], true).unwrap();
    let writes = pool.disk().num_writes();

    pool.fetch(pages[1]).unwrap();
    assert_eq!(pool.disk().num_writes(), writes + 1);
    pool.release(pages[1], false).unwrap();

    let data = pool.fetch(pages[0]).unwrap();
    assert_eq!(&data[..4], &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(pool.is_dirty(pages[0]), Some(false));
}

#[test]
fn test_clean_release_keeps_dirty_flag() {
    let (mut pool, _dir) = create_pool(2, "LRU");
    let page = allocate(&mut pool, 1)[0];

    pool.fetch(page).unwrap();
    pool.fetch(page).unwrap();
    pool.release(page, true).unwrap();
    pool.release(page, false).unwrap();
    assert_eq!(pool.is_dirty(page), Some(true));

    assert!(pool.flush_page(page).unwrap());
    assert_eq!(pool.is_dirty(page), Some(false));
    assert!(!pool.flush_page(PageAddress::new(0, 7)).unwrap());
}

#[test]
fn test_unsupported_policy_reported_on_eviction() {
    let (mut pool, _dir) = create_pool(1, "CLOCK");
    let pages = allocate(&mut pool, 2);

    // No eviction needed yet, so the policy is never consulted
    touch_all(&mut pool, &pages[..1]);
    assert!(matches!(
        pool.fetch(pages[1]),
        Err(StorageError::UnsupportedPolicy(_))
    ));

    pool.set_policy("MRU");
    pool.fetch(pages[1]).unwrap();
    assert_eq!(pool.pin_count(pages[0]), None);
}

#[test]
fn test_flush_all_empties_pool() {
    let (mut pool, _dir) = create_pool(4, "LRU");
    let pages = allocate(&mut pool, 3);

    for (i, &page) in pages.iter().enumerate() {
        pool.fetch(page).unwrap().fill(i as u8 + 1);
        pool.release(page, true).unwrap();
    }
    pool.flush_all().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.cached_frames, 0);
    assert_eq!(stats.free_buffers, 4);
    assert_eq!(stats.evictable_frames, 0);
    assert!(pool.eviction_order().is_empty());

    let mut buf = vec![0u8; PAGE_SIZE];
    for (i, &page) in pages.iter().enumerate() {
        pool.disk_mut().read(page, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == i as u8 + 1));
    }
}

#[test]
fn test_random_workload_keeps_invariants() {
    let (mut pool, _dir) = create_pool(4, "LRU");
    let pages = allocate(&mut pool, 12);
    let mut pins = vec![0u32; pages.len()];
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..2000 {
        let i = rng.gen_range(0..pages.len());
        let page = pages[i];
        if pins[i] > 0 && rng.gen_bool(0.6) {
            pool.release(page, rng.gen_bool(0.3)).unwrap();
            pins[i] -= 1;
        } else {
            match pool.fetch(page) {
                Ok(data) => {
                    data[0] = data[0].wrapping_add(1);
                    pins[i] += 1;
                }
                Err(StorageError::BufferPoolFull) => {
                    assert!(pins.iter().filter(|&&p| p > 0).count() >= 4);
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        for (j, &p) in pages.iter().enumerate() {
            if pins[j] > 0 {
                assert_eq!(pool.pin_count(p), Some(pins[j]));
                assert!(!pool.is_evictable(p));
            } else if let Some(count) = pool.pin_count(p) {
                assert_eq!(count, 0);
                assert!(pool.is_evictable(p));
            }
        }
        assert_pool_invariant(&pool);
    }
}

#[test]
fn test_flush_all_drops_pinned_frames() {
    let (mut pool, _dir) = create_pool(2, "LRU");
    let pages = allocate(&mut pool, 2);

    pool.fetch(pages[0]).unwrap().fill(0x77);
    pool.release(pages[0], true).unwrap();
    pool.fetch(pages[0]).unwrap();
    pool.fetch(pages[1]).unwrap();
    assert_eq!(pool.pin_count(pages[0]), Some(1));

    pool.flush_all().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.cached_frames, 0);
    assert_eq!(stats.free_buffers, 2);
    assert_eq!(pool.pin_count(pages[0]), None);
    assert!(matches!(
        pool.release(pages[0], false),
        Err(StorageError::PageNotCached(_))
    ));

    // The dirty pinned page still reached disk
    let mut buf = vec![0u8; PAGE_SIZE];
    pool.disk_mut().read(pages[0], &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0x77));
}
