//! Pessimistic Lock Tests
//!
//! - Mutual exclusion under concurrent write attempts
//! - Reader bound never exceeded
//! - Read lock refused while write-locked, granted after unlock

use crate::create_test_stm;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Barrier;
use std::thread;
use stmcore::prelude::*;
use stmcore::MAX_READERS;

// =============================================================================
// Exclusion
// =============================================================================

/// At most one thread is ever inside the write-locked section
#[test]
fn test_write_lock_mutual_exclusion() {
    let stm = create_test_stm(8);
    let lock: LockVersion = LockVersion::new();
    let inside = AtomicBool::new(false);
    let acquired = AtomicU64::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                let worker = stm.register().unwrap();
                for _ in 0..2_000 {
                    if lock.try_lock_write().is_locked() {
                        assert!(!inside.swap(true, Ordering::AcqRel), "two writers inside");
                        acquired.fetch_add(1, Ordering::Relaxed);
                        inside.store(false, Ordering::Release);
                        lock.unlock_write(&worker);
                    }
                }
            });
        }
    });

    let acquired = acquired.load(Ordering::Relaxed);
    assert!(acquired > 0);
    assert_eq!(lock.load().version(), acquired);
    assert!(!lock.is_locked());
}

/// Writers and readers never overlap; reader count stays within bounds
#[test]
fn test_readers_and_writers_exclusive() {
    let stm = create_test_stm(8);
    let lock: LockVersion = LockVersion::new();

    thread::scope(|s| {
        for i in 0..8 {
            let lock = &lock;
            let stm = &stm;
            s.spawn(move || {
                let worker = stm.register().unwrap();
                for _ in 0..2_000 {
                    if i % 2 == 0 {
                        if lock.try_lock_write().is_locked() {
                            assert_eq!(lock.reader_count(), 0);
                            lock.unlock_write(&worker);
                        }
                    } else if lock.try_lock_read().0.is_locked() {
                        let w = lock.load();
                        assert!(!w.is_locked());
                        assert!(w.reader_count() >= 1 && w.reader_count() <= MAX_READERS);
                        lock.unlock_read(&worker);
                    }
                }
            });
        }
    });

    assert_eq!(lock.reader_count(), 0);
    assert!(!lock.is_locked());
}

/// More concurrent readers than the cap: the surplus is told to go optimistic
#[test]
fn test_reader_bound_under_concurrency() {
    let threads = 24;
    let lock: LockVersion = LockVersion::new();
    let barrier = Barrier::new(threads);
    let locked = AtomicU64::new(0);
    let optimistic = AtomicU64::new(0);

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                match lock.try_lock_read().0 {
                    LockResponse::Locked => locked.fetch_add(1, Ordering::Relaxed),
                    LockResponse::Optimistic => optimistic.fetch_add(1, Ordering::Relaxed),
                    other => panic!("unexpected response {other}"),
                };
                assert!(lock.reader_count() <= MAX_READERS);
                barrier.wait();
            });
        }
    });

    assert_eq!(locked.load(Ordering::Relaxed), MAX_READERS);
    assert_eq!(optimistic.load(Ordering::Relaxed), threads as u64 - MAX_READERS);
    assert_eq!(lock.reader_count(), MAX_READERS);
}

// =============================================================================
// Scenarios
// =============================================================================

/// A holds the write lock, B's read attempt spins; after A unlocks B succeeds
#[test]
fn test_read_spins_until_writer_unlocks() {
    let stm = create_test_stm(2);
    let lock: LockVersion = LockVersion::new();
    let locked = Barrier::new(2);
    let refused = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            let a = stm.register().unwrap();
            assert!(lock.try_lock_write().is_locked());
            locked.wait();
            refused.wait();
            lock.unlock_write(&a);
        });
        s.spawn(|| {
            let b = stm.register().unwrap();
            locked.wait();
            assert_eq!(lock.try_lock_read().0, LockResponse::Spin);
            refused.wait();

            while !lock.try_lock_read().0.is_locked() {
                std::hint::spin_loop();
            }
            assert_eq!(lock.reader_count(), 1);
            lock.unlock_read(&b);
        });
    });

    assert_eq!(lock.load().version(), 1);
}

/// Write lock refused while a read lock is held
#[test]
fn test_write_refused_while_read_locked() {
    let stm = create_test_stm(2);
    let worker = stm.register().unwrap();
    let lock: LockVersion = LockVersion::new();

    let mut reader: TransItem = TransItem::new();
    assert!(lock.observe_read(&mut reader, &worker, true));
    assert_eq!(lock.try_lock_write(), LockResponse::Spin);
    assert!(!lock.try_lock_for_commit(worker.id()));

    lock.unlock_after_commit(&mut reader, &worker);
    assert!(lock.try_lock_for_commit(worker.id()));
}

/// Adaptive locks let readers skip the read lock once the hint is set
#[test]
fn test_adaptive_hint_skips_read_lock() {
    let stm = Stm::builder().max_threads(2).unlock_opt_chance(100).build().unwrap();
    let worker = stm.register().unwrap();
    let lock: LockVersion<Adaptive> = LockVersion::new();

    assert!(lock.try_lock_write().is_locked());
    lock.unlock_write(&worker);
    assert!(lock.hint_optimistic());

    let mut item: TransItem = TransItem::new();
    assert!(lock.observe_read(&mut item, &worker, true));
    assert!(item.has_read());
    assert!(!item.needs_unlock());
    assert_eq!(lock.reader_count(), 0);
    assert!(lock.check_version(&item, &worker));
}
