//! # Counting Semaphores
//!
//! A semaphore is a single signed counter with no owner. A non-negative
//! value is the number of available resources; a negative value `-n` means
//! `n` threads are blocked on it.
//!
//! Conventions: a mutex starts at 1, a resource counter at 0 or N.
//!
//! ## Wake order
//!
//! [`Scheduler::signal`] wakes the first blocked waiter found walking the
//! thread ring forward from the signaling thread. This is ring-position
//! order, not arrival order: callers must not assume FIFO fairness.

use crate::config::{MAX_FIFOS, MAX_SEMAPHORES};
use crate::scheduler::Scheduler;

/// Handle to a semaphore in the kernel's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SemaphoreId(pub(crate) u8);

impl SemaphoreId {
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Outcome of [`Scheduler::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The resource was available; the caller proceeds.
    Acquired,
    /// The caller is now blocked; a context switch has been requested.
    Blocked,
}

/// Fixed arena of semaphore counters.
///
/// The first `2 * MAX_FIFOS` entries belong to the FIFO channels (an
/// availability count and a mutex each); the rest are handed out by
/// [`SemaphorePool::create`].
pub struct SemaphorePool {
    values: [i32; MAX_SEMAPHORES],
    allocated: usize,
}

impl SemaphorePool {
    pub const fn new() -> Self {
        Self {
            values: [0; MAX_SEMAPHORES],
            allocated: 2 * MAX_FIFOS,
        }
    }

    /// Reserved availability semaphore of FIFO channel `index`.
    pub const fn fifo_available(index: usize) -> SemaphoreId {
        SemaphoreId((2 * index) as u8)
    }

    /// Reserved mutex semaphore of FIFO channel `index`.
    pub const fn fifo_mutex(index: usize) -> SemaphoreId {
        SemaphoreId((2 * index + 1) as u8)
    }

    /// Allocate a fresh semaphore with the given initial value.
    pub fn create(&mut self, value: i32) -> Option<SemaphoreId> {
        if self.allocated >= MAX_SEMAPHORES {
            return None;
        }
        let id = SemaphoreId(self.allocated as u8);
        self.allocated += 1;
        self.values[id.index()] = value;
        Some(id)
    }

    #[inline]
    pub fn init(&mut self, id: SemaphoreId, value: i32) {
        self.values[id.index()] = value;
    }

    #[inline]
    pub fn value(&self, id: SemaphoreId) -> i32 {
        self.values[id.index()]
    }

    #[inline]
    fn decrement(&mut self, id: SemaphoreId) -> i32 {
        let value = &mut self.values[id.index()];
        *value -= 1;
        *value
    }

    #[inline]
    fn increment(&mut self, id: SemaphoreId) -> i32 {
        let value = &mut self.values[id.index()];
        *value += 1;
        *value
    }
}

impl Default for SemaphorePool {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Decrement `sem`; if the result is negative, block the running thread
    /// on it and request a reschedule.
    ///
    /// There is no retry loop: the caller resumes only after a
    /// [`Scheduler::signal`] has cleared its blocked marker, which is the
    /// grant itself.
    ///
    /// # Panics
    /// Panics if the call would block while no thread is running.
    pub fn wait(&mut self, sem: SemaphoreId) -> WaitOutcome {
        if self.semaphores.decrement(sem) >= 0 {
            return WaitOutcome::Acquired;
        }
        let slot = self.current_slot();
        self.threads.get_mut(slot).blocked_on = Some(sem);
        self.needs_reschedule = true;
        WaitOutcome::Blocked
    }

    /// Increment `sem`; if waiters remain, wake the first one found after
    /// the signaling thread in ring order.
    ///
    /// Never blocks and never requests a reschedule; the woken thread
    /// competes at the next scheduler pass.
    ///
    /// # Panics
    /// Panics if the counter says a waiter exists but none is blocked on
    /// `sem`. That means the counter and the ring disagree.
    pub fn signal(&mut self, sem: SemaphoreId) {
        if self.semaphores.increment(sem) > 0 {
            return;
        }
        let start = self.current.or_else(|| self.threads.first_live());
        let woken = start.and_then(|start| {
            self.threads
                .walk_after(start)
                .find(|&slot| self.threads.get(slot).blocked_on == Some(sem))
        });
        match woken {
            Some(slot) => self.threads.get_mut(slot).blocked_on = None,
            None => panic!("semaphore {} signalled with no blocked waiter", sem.0),
        }
    }

    /// Allocate a semaphore from the user part of the arena.
    pub fn create_semaphore(&mut self, value: i32) -> crate::error::Result<SemaphoreId> {
        self.semaphores
            .create(value)
            .ok_or(crate::error::KernelError::SemaphoreLimitReached)
    }

    /// Reset a semaphore's counter.
    pub fn init_semaphore(&mut self, sem: SemaphoreId, value: i32) {
        self.semaphores.init(sem, value);
    }

    /// Current counter value of `sem`.
    pub fn semaphore_value(&self, sem: SemaphoreId) -> i32 {
        self.semaphores.value(sem)
    }

    /// Remove a killed waiter from `sem`'s accounting without waking anyone.
    pub(crate) fn withdraw_waiter(&mut self, sem: SemaphoreId) {
        self.semaphores.increment(sem);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
