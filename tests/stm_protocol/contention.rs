//! Contention Manager Tests
//!
//! - start() resets per-attempt state; restarts keep the abort count
//! - Priority timestamps are unique and increase across threads
//! - Rollback waits stay below abort_count * multiplier and the bound grows
//! - A victim flagged by another thread restarts clean

use crate::create_test_stm;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;
use stmcore::prelude::*;
use stmcore::{Backoff, ContentionManager};

/// Records every wait instead of spinning
#[derive(Default)]
struct RecordingBackoff {
    waits: Mutex<Vec<u64>>,
    relaxes: AtomicU64,
}

impl Backoff for RecordingBackoff {
    fn relax(&self) {
        self.relaxes.fetch_add(1, Ordering::Relaxed);
    }

    fn wait_cycles(&self, cycles: u64) {
        self.waits.lock().unwrap().push(cycles);
    }
}

fn config(ts_threshold: u64, succ_aborts_max: u32, multiplier: u64) -> ContentionConfig {
    ContentionConfig {
        ts_threshold,
        succ_aborts_max,
        wait_cycles_multiplier: multiplier,
        ..ContentionConfig::default()
    }
}

// =============================================================================
// Reset law
// =============================================================================

#[test]
fn test_restart_keeps_abort_count_renew_clears_it() {
    let stm = create_test_stm(2);
    let worker = stm.register().unwrap();
    let cm = stm.contention();
    let mut txn = TxnDescriptor::new(worker.id());

    cm.start(&txn);
    for _ in 0..3 {
        cm.on_write(&txn);
        cm.on_rollback(&txn);
        txn.restart();
        cm.start(&txn);
        assert_eq!(cm.write_set_size(worker.id()), 0);
        assert!(!cm.is_aborted(worker.id()));
    }
    assert_eq!(cm.abort_count(worker.id()), 3);

    txn.renew();
    cm.start(&txn);
    assert_eq!(cm.abort_count(worker.id()), 0);
    assert_eq!(cm.priority(worker.id()), None);
}

#[test]
fn test_start_clears_abort_flag_and_timestamp() {
    let cm = ContentionManager::new(2, config(1, 10, 8));
    let txn = TxnDescriptor::new(ThreadId::new(1).unwrap());

    cm.start(&txn);
    cm.on_write(&txn);
    assert!(cm.priority(txn.thread_id()).is_some());
    cm.mark_aborted(txn.thread_id());
    assert!(cm.is_aborted(txn.thread_id()));

    cm.start(&txn);
    assert!(!cm.is_aborted(txn.thread_id()));
    assert_eq!(cm.priority(txn.thread_id()), None);
}

// =============================================================================
// Timestamps
// =============================================================================

/// Every thread crossing the threshold gets a distinct timestamp, and the
/// clock ends exactly at the number handed out
#[test]
fn test_timestamps_unique_across_threads() {
    let threads = 8;
    let rounds = 200;
    let stm = Stm::builder()
        .max_threads(threads)
        .ts_threshold(2)
        .build()
        .unwrap();
    let seen = Mutex::new(Vec::new());

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                let worker = stm.register().unwrap();
                let cm = stm.contention();
                let mut txn = TxnDescriptor::new(worker.id());
                let mut mine = Vec::with_capacity(rounds);
                for _ in 0..rounds {
                    cm.start(&txn);
                    cm.on_write(&txn);
                    assert_eq!(cm.priority(worker.id()), None);
                    cm.on_write(&txn);
                    cm.on_write(&txn);
                    let ts = cm.priority(worker.id()).expect("threshold reached");
                    mine.push(ts);
                    txn.renew();
                }
                assert!(mine.windows(2).all(|w| w[0] < w[1]));
                seen.lock().unwrap().extend(mine);
            });
        }
    });

    let seen = seen.into_inner().unwrap();
    let unique: HashSet<u64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), threads * rounds);
    assert_eq!(stm.contention().clock(), (threads * rounds) as u64);
}

#[test]
fn test_zero_threshold_never_assigns_priority() {
    let cm = ContentionManager::new(1, config(0, 10, 8));
    let txn = TxnDescriptor::new(ThreadId::new(0).unwrap());
    cm.start(&txn);
    for _ in 0..50 {
        cm.on_write(&txn);
    }
    assert_eq!(cm.priority(txn.thread_id()), None);
    assert_eq!(cm.clock(), 0);
}

// =============================================================================
// Backoff
// =============================================================================

#[test]
fn test_rollback_wait_bounded_by_abort_count() {
    let recorder = RecordingBackoff::default();
    let cm = ContentionManager::with_backoff(1, config(4, 5, 100), &recorder);
    let mut txn = TxnDescriptor::new(ThreadId::new(0).unwrap());

    cm.start(&txn);
    for attempt in 1..=20u64 {
        let waited = cm.on_rollback(&txn);
        let aborts = attempt.min(5);
        assert!(waited < aborts * 100, "attempt {attempt} waited {waited}");
        txn.restart();
        cm.start(&txn);
    }
    assert_eq!(cm.abort_count(txn.thread_id()), 5);

    let waits = recorder.waits.lock().unwrap();
    assert_eq!(waits.len(), 20);
    assert!(waits.iter().all(|&c| c < 500));
}

/// Saturated aborts draw from a range five times wider than a first abort,
/// so their average wait is visibly larger
#[test]
fn test_backoff_grows_with_abort_count() {
    let recorder = RecordingBackoff::default();
    let cm = ContentionManager::with_backoff(2, config(4, 5, 1000), &recorder);
    let first = TxnDescriptor::new(ThreadId::new(0).unwrap());
    let mut repeat = TxnDescriptor::new(ThreadId::new(1).unwrap());

    let samples = 400u64;
    let mut fresh_total = 0;
    for _ in 0..samples {
        cm.start(&first);
        fresh_total += cm.on_rollback(&first);
    }

    cm.start(&repeat);
    for _ in 0..5 {
        cm.on_rollback(&repeat);
        repeat.restart();
        cm.start(&repeat);
    }
    let mut saturated_total = 0;
    for _ in 0..samples {
        saturated_total += cm.on_rollback(&repeat);
        cm.start(&repeat);
    }

    assert!(fresh_total / samples < 1000);
    assert!(saturated_total / samples > fresh_total / samples);
}

// =============================================================================
// Arbitration
// =============================================================================

/// The winner marks the loser; the loser notices and restarts clean
#[test]
fn test_mark_aborted_seen_by_victim_thread() {
    let stm = create_test_stm(2);
    let victim_id = ThreadId::new(1).unwrap();
    let started = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            let _victim = stm.register_as(1).unwrap();
            let mut txn = TxnDescriptor::new(victim_id);
            stm.contention().start(&txn);
            started.wait();
            while !stm.contention().is_aborted(victim_id) {
                std::hint::spin_loop();
            }
            stm.contention().on_rollback(&txn);
            txn.restart();
            stm.contention().start(&txn);
            assert!(!stm.contention().is_aborted(victim_id));
            assert_eq!(stm.contention().abort_count(victim_id), 1);
        });
        s.spawn(|| {
            let _winner = stm.register_as(0).unwrap();
            started.wait();
            stm.contention().mark_aborted(victim_id);
        });
    });
}
