use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Exclusive in-process lock over matching runs.
///
/// Every successful acquisition is issued the next run id. A second trigger
/// while a run holds the lock is refused, never queued.
#[derive(Debug, Default)]
pub struct RunLock {
    gate: Mutex<()>,
    next_id: AtomicU64,
    active: AtomicU64,
}

/// Held for the duration of one run
#[derive(Debug)]
pub struct RunGuard<'a> {
    lock: &'a RunLock,
    run_id: u64,
    _permit: MutexGuard<'a, ()>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock without waiting. On refusal returns the id of the run
    /// currently holding it.
    pub fn try_acquire(&self) -> Result<RunGuard<'_>, u64> {
        match self.gate.try_lock() {
            Ok(permit) => {
                let run_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                self.active.store(run_id, Ordering::SeqCst);
                Ok(RunGuard {
                    lock: self,
                    run_id,
                    _permit: permit,
                })
            }
            Err(_) => Err(self.active.load(Ordering::SeqCst)),
        }
    }

    /// Id of the run holding the lock, if any
    pub fn active_run(&self) -> Option<u64> {
        match self.active.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    /// Id issued to the most recent run, 0 before the first
    pub fn last_issued(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }
}

impl RunGuard<'_> {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        // cleared before the permit field is dropped
        self.lock.active.store(0, Ordering::SeqCst);
    }
}
