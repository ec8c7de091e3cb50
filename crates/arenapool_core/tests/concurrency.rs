//! Integration tests for concurrent use of one pool.

use arenapool_core::{PoolAllocator, PoolError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_alloc_free_keeps_blocks_private() {
    let pool = PoolAllocator::new(64 * 1024);
    let num_threads = 8;
    let iterations = 500;
    let failures = AtomicUsize::new(0);

    thread::scope(|scope| {
        for t in 0..num_threads {
            let pool = &pool;
            let failures = &failures;
            scope.spawn(move || {
                let tag = u8::try_from(t + 1).unwrap();
                let mut held = Vec::new();

                for i in 0..iterations {
                    let size = 16 + (i * 7 + t * 13) % 240;
                    match pool.allocate(size) {
                        Ok(h) => {
                            pool.with_block_mut(h, |bytes| bytes.fill(tag)).unwrap();
                            held.push(h);
                        }
                        Err(PoolError::OutOfMemory { .. }) => {
                            failures.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => panic!("unexpected error: {e}"),
                    }

                    // Keep a small working set so threads interleave frees.
                    if held.len() > 4 {
                        let h = held.remove(0);
                        let intact = pool.with_block(h, |bytes| bytes.iter().all(|&b| b == tag)).unwrap();
                        assert!(intact, "block at {} was overwritten", h.offset());
                        pool.free(h).unwrap();
                    }
                }

                for h in held {
                    let intact = pool.with_block(h, |bytes| bytes.iter().all(|&b| b == tag)).unwrap();
                    assert!(intact, "block at {} was overwritten", h.offset());
                    pool.free(h).unwrap();
                }
            });
        }
    });

    pool.check_invariants().unwrap();
    let stats = pool.stats();
    assert_eq!(stats.live_blocks(), 0);
    assert_eq!(stats.block_count, 1);
    assert_eq!(stats.diagnostics, 0);
    assert_eq!(stats.allocations, stats.frees);
    assert_eq!(
        stats.allocations + failures.load(Ordering::Relaxed) as u64,
        (num_threads * iterations) as u64
    );
}

#[test]
fn test_last_block_goes_to_exactly_one_thread() {
    let pool = Arc::new(PoolAllocator::new(128));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                if pool.allocate(100).is_ok() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(pool.stats().failed_allocations, 15);
    pool.check_invariants().unwrap();
}

#[test]
fn test_concurrent_resize() {
    let pool = PoolAllocator::new(32 * 1024);

    thread::scope(|scope| {
        for t in 0..4u8 {
            let pool = &pool;
            scope.spawn(move || {
                let mut h = pool.allocate(8).unwrap();
                pool.write(h, 0, &[t; 8]).unwrap();

                for size in [16, 64, 32, 256, 512] {
                    h = pool.resize(h, size).unwrap().unwrap();
                    let mut prefix = [0u8; 8];
                    pool.read(h, 0, &mut prefix).unwrap();
                    assert_eq!(prefix, [t; 8]);
                }

                assert_eq!(pool.resize(h, 0).unwrap(), None);
            });
        }
    });

    pool.check_invariants().unwrap();
    assert_eq!(pool.stats().live_blocks(), 0);
}
