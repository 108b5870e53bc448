//! Commit Cycle Tests
//!
//! Drives the full execute → lock → validate → publish → unlock sequence
//! through [`CommitProtocol`] from many threads, with both lock variants:
//! - Transfers between accounts conserve the total
//! - Audits that validate always see a consistent total
//! - Versions advance by exactly the number of committed writes
//! - Aborted attempts publish nothing

use crate::create_test_stm;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use stmcore::prelude::*;

const INITIAL_BALANCE: i64 = 1_000;

struct Account<L> {
    lock: L,
    balance: AtomicI64,
}

impl<L: Default> Account<L> {
    fn bank(n: usize) -> Vec<Self> {
        (0..n)
            .map(|_| Account {
                lock: L::default(),
                balance: AtomicI64::new(INITIAL_BALANCE),
            })
            .collect()
    }
}

fn release<L: CommitProtocol>(
    accounts: &[Account<L>],
    items: &mut [(usize, TransItem<i64>)],
    worker: &Worker<'_>,
) {
    for (idx, item) in items.iter_mut() {
        if item.needs_unlock() {
            accounts[*idx].lock.unlock_after_commit(item, worker);
        }
    }
}

/// One attempt at moving `amount` from `from` to `to`. On success the items
/// still hold their locks; the caller releases them either way.
fn attempt_transfer<L: CommitProtocol>(
    stm: &Stm,
    worker: &Worker<'_>,
    txn: &TxnDescriptor,
    accounts: &[Account<L>],
    items: &mut [(usize, TransItem<i64>)],
    amount: i64,
) -> bool {
    let cm = stm.contention();

    // execute
    let mut balances = [0i64; 2];
    for (slot, (idx, item)) in items.iter_mut().enumerate() {
        if !accounts[*idx].lock.observe_read(item, worker, true) {
            return false;
        }
        balances[slot] = accounts[*idx].balance.load(Ordering::Acquire);
    }
    let updated = [balances[0] - amount, balances[1] + amount];
    for ((idx, item), value) in items.iter_mut().zip(updated) {
        if !accounts[*idx].lock.acquire_write_with(item, worker, value) {
            return false;
        }
        cm.on_write(txn);
    }

    // lock
    for (idx, item) in items.iter_mut() {
        if !accounts[*idx].lock.lock_for_commit(item, worker) {
            return false;
        }
    }

    // validate
    if !items
        .iter()
        .all(|(idx, item)| accounts[*idx].lock.check_version(item, worker))
    {
        return false;
    }

    // publish
    for (idx, item) in items.iter_mut() {
        if let Some(value) = item.take_write_value() {
            accounts[*idx].balance.store(value, Ordering::Relaxed);
        }
    }
    true
}

/// Retry a transfer until it commits. Returns the number of aborts.
fn transfer<L: CommitProtocol>(
    stm: &Stm,
    worker: &Worker<'_>,
    accounts: &[Account<L>],
    from: usize,
    to: usize,
    amount: i64,
) -> u64 {
    let mut txn = TxnDescriptor::new(worker.id());
    let mut aborts = 0;
    loop {
        stm.contention().start(&txn);
        let mut items = [(from, TransItem::new()), (to, TransItem::new())];
        let committed = attempt_transfer(stm, worker, &txn, accounts, &mut items, amount);
        release(accounts, &mut items, worker);
        if committed {
            return aborts;
        }
        aborts += 1;
        stm.contention().on_rollback(&txn);
        txn.restart();
    }
}

/// Read-only pass over every account. `Some(total)` only if every read validated.
fn audit<L: CommitProtocol>(worker: &Worker<'_>, accounts: &[Account<L>]) -> Option<i64> {
    let mut items: Vec<(usize, TransItem<i64>)> =
        (0..accounts.len()).map(|i| (i, TransItem::new())).collect();
    let mut total = 0;
    let mut consistent = true;
    for (idx, item) in items.iter_mut() {
        if !accounts[*idx].lock.observe_read(item, worker, true) {
            consistent = false;
            break;
        }
        total += accounts[*idx].balance.load(Ordering::Acquire);
    }
    consistent = consistent
        && items
            .iter()
            .all(|(idx, item)| accounts[*idx].lock.check_version(item, worker));
    release(accounts, &mut items, worker);
    consistent.then_some(total)
}

fn run_bank<L: CommitProtocol + Default + Sync>(threads: usize, transfers: usize, audits: usize) {
    let n_accounts = 6;
    let stm = create_test_stm(threads + 1);
    let accounts: Vec<Account<L>> = Account::bank(n_accounts);

    thread::scope(|s| {
        for t in 0..threads {
            let stm = &stm;
            let accounts = &accounts;
            s.spawn(move || {
                let worker = stm.register().unwrap();
                for i in 0..transfers {
                    let from = (t + i) % n_accounts;
                    let to = (from + 1 + i % (n_accounts - 1)) % n_accounts;
                    transfer(stm, &worker, accounts, from, to, (i % 7) as i64 + 1);
                }
            });
        }
        s.spawn(|| {
            let worker = stm.register().unwrap();
            for _ in 0..audits {
                if let Some(total) = audit(&worker, &accounts) {
                    assert_eq!(total, INITIAL_BALANCE * n_accounts as i64);
                }
            }
        });
    });

    let total: i64 = accounts.iter().map(|a| a.balance.load(Ordering::Relaxed)).sum();
    assert_eq!(total, INITIAL_BALANCE * n_accounts as i64);

    let worker = stm.register().unwrap();
    assert_eq!(audit(&worker, &accounts), Some(total));
}

// =============================================================================
// Bank transfers
// =============================================================================

#[test]
fn test_bank_optimistic_conserves_total() {
    run_bank::<SwissVersion<NonOpaque>>(4, 500, 500);
}

#[test]
fn test_bank_opaque_conserves_total() {
    run_bank::<SwissVersion<Opaque>>(4, 500, 500);
}

#[test]
fn test_bank_pessimistic_conserves_total() {
    run_bank::<LockVersion<Plain>>(4, 500, 500);
}

#[test]
fn test_bank_adaptive_conserves_total() {
    run_bank::<LockVersion<Adaptive>>(4, 500, 500);
}

// =============================================================================
// Version accounting
// =============================================================================

/// Every committed transfer touches two accounts, so the sum of version
/// advances is exactly twice the number of transfers
#[test]
fn test_versions_count_commits() {
    let threads = 4;
    let transfers = 300;
    let stm = create_test_stm(threads);
    let accounts: Vec<Account<SwissVersion>> = Account::bank(3);

    thread::scope(|s| {
        for t in 0..threads {
            let stm = &stm;
            let accounts = &accounts;
            s.spawn(move || {
                let worker = stm.register().unwrap();
                for i in 0..transfers {
                    let from = (t + i) % 3;
                    transfer(stm, &worker, accounts, from, (from + 1) % 3, 1);
                }
            });
        }
    });

    let versions: u64 = accounts.iter().map(|a| a.lock.version()).sum();
    assert_eq!(versions, 2 * (threads * transfers) as u64);
    assert!(accounts.iter().all(|a| !a.lock.is_locked()));
}

/// Pessimistic write unlocks bump even on abort, so commits are a lower bound
#[test]
fn test_pessimistic_versions_count_commits() {
    let threads = 4;
    let transfers = 300;
    let stm = create_test_stm(threads);
    let accounts: Vec<Account<LockVersion>> = Account::bank(3);

    thread::scope(|s| {
        for t in 0..threads {
            let stm = &stm;
            let accounts = &accounts;
            s.spawn(move || {
                let worker = stm.register().unwrap();
                for i in 0..transfers {
                    let from = (t + i) % 3;
                    transfer(stm, &worker, accounts, from, (from + 1) % 3, 1);
                }
            });
        }
    });

    let versions: u64 = accounts.iter().map(|a| a.lock.load().version()).sum();
    assert!(versions >= 2 * (threads * transfers) as u64);
    assert!(accounts.iter().all(|a| a.lock.reader_count() == 0 && !a.lock.is_locked()));
}

// =============================================================================
// Abort path
// =============================================================================

/// A transaction whose read goes stale fails validation, releases its locks
/// and leaves both value and version untouched
#[test]
fn test_stale_read_aborts_without_publishing() {
    let stm = create_test_stm(2);
    let a = stm.register().unwrap();
    let b = stm.register().unwrap();
    let accounts: Vec<Account<SwissVersion>> = Account::bank(2);

    // a reads account 1 and writes account 0
    let txn = TxnDescriptor::new(a.id());
    stm.contention().start(&txn);
    let mut read_item: TransItem<i64> = TransItem::new();
    let mut write_item: TransItem<i64> = TransItem::new();
    assert!(accounts[1].lock.observe_read(&mut read_item, &a, true));
    assert!(accounts[0].lock.acquire_write_with(&mut write_item, &a, 0));

    // b commits to account 1 in between
    let mut foreign: TransItem<i64> = TransItem::new();
    assert!(accounts[1].lock.acquire_write_with(&mut foreign, &b, 7));
    assert!(accounts[1].lock.lock_for_commit(&mut foreign, &b));
    accounts[1].balance.store(7, Ordering::Relaxed);
    accounts[1].lock.unlock_after_commit(&mut foreign, &b);
    assert_eq!(accounts[1].lock.version(), 1);

    assert!(accounts[0].lock.lock_for_commit(&mut write_item, &a));
    assert!(!accounts[1].lock.check_version(&read_item, &a));
    accounts[0].lock.unlock_after_commit(&mut write_item, &a);
    stm.contention().on_rollback(&txn);

    assert_eq!(accounts[0].lock.version(), 0, "abort must not advance the version");
    assert_eq!(accounts[0].balance.load(Ordering::Relaxed), INITIAL_BALANCE);
    assert!(!accounts[0].lock.is_locked());
    assert_eq!(stm.contention().abort_count(a.id()), 1);
}
