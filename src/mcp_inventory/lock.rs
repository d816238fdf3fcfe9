//! # Path-Keyed Locking
//!
//! [`PathLock`] hands out one mutual-exclusion token per file path so that
//! concurrent load/save calls against the same inventory file serialize into
//! a strict sequence, while operations on different paths proceed in
//! parallel.
//!
//! ## Limitations
//!
//! - Locks are **in-process only**. Nothing here stops another process from
//!   touching the file; callers needing cross-process coordination must layer
//!   an OS-level mechanism on top.
//! - Acquisition order is not fair: a thread that started waiting later may
//!   win the token over an earlier waiter.
//! - Locking is not re-entrant. A thread that re-locks a path it already
//!   holds blocks until its own timeout fires.

use crate::error::{InventoryError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

/// Timeout used by [`PathLock::lock`] when the caller does not supply one.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// One binary-semaphore slot: `held` is the token, `freed` wakes waiters.
#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    freed: Condvar,
}

impl Slot {
    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        self.freed.notify_one();
    }
}

/// Manages one exclusion token per path.
pub struct PathLock {
    slots: Mutex<HashMap<PathBuf, Arc<Slot>>>,
    timeout: Duration,
}

impl PathLock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn slot(&self, path: &Path) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(path.to_path_buf()).or_default())
    }

    /// Block until the path's token can be claimed or the default timeout
    /// elapses.
    pub fn lock(&self, path: &Path) -> Result<LockHandle> {
        self.lock_timeout(path, self.timeout)
    }

    /// Block until the path's token can be claimed or `timeout` elapses.
    pub fn lock_timeout(&self, path: &Path, timeout: Duration) -> Result<LockHandle> {
        let slot = self.slot(path);
        let deadline = Instant::now() + timeout;

        let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            let now = Instant::now();
            if now >= deadline {
                return Err(InventoryError::LockTimeout {
                    path: path.to_path_buf(),
                    timeout,
                });
            }
            let (guard, _) = slot
                .freed
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
        }
        *held = true;
        drop(held);

        trace!(path = %path.display(), "lock acquired");
        Ok(LockHandle {
            path: path.to_path_buf(),
            slot: Some(slot),
        })
    }

    /// Claim the path's token without blocking.
    pub fn try_lock(&self, path: &Path) -> Result<LockHandle> {
        let slot = self.slot(path);
        let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
        if *held {
            return Err(InventoryError::AlreadyLocked(path.to_path_buf()));
        }
        *held = true;
        drop(held);

        Ok(LockHandle {
            path: path.to_path_buf(),
            slot: Some(slot),
        })
    }

    /// Whether the path's token is currently claimed. Does not mutate lock
    /// state.
    pub fn is_locked(&self, path: &Path) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(path) {
            Some(slot) => *slot.held.lock().unwrap_or_else(PoisonError::into_inner),
            None => false,
        }
    }

    /// Discard tokens for paths that are currently free, bounding the map's
    /// growth. Slots that are held, or that a waiter still references, are
    /// kept.
    pub fn cleanup(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|path, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let held = *slot.held.lock().unwrap_or_else(PoisonError::into_inner);
            if !held {
                trace!(path = %path.display(), "discarding unused lock token");
            }
            held
        });
    }

    /// Number of paths with a live token entry. Mostly useful to observe
    /// [`Self::cleanup`].
    pub fn tracked_paths(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for PathLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// An acquired lock. Dropping the handle releases the token, so every exit
/// path of a locked section pairs its acquire with exactly one release;
/// [`LockHandle::unlock`] releases explicitly and reports double release.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    slot: Option<Arc<Slot>>,
}

impl LockHandle {
    /// Release the token. Calling this twice is an error.
    pub fn unlock(&mut self) -> Result<()> {
        let slot = self.slot.take().ok_or(InventoryError::LockReleased)?;
        slot.release();
        trace!(path = %self.path.display(), "lock released");
        Ok(())
    }

    /// Whether this handle still holds its token.
    pub fn is_valid(&self) -> bool {
        self.slot.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.release();
        }
    }
}
