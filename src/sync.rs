//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. Every piece of shared
//! kernel state (thread ring, periodic ring, semaphore counters, FIFO
//! cursors) is mutated only inside a critical section, and semaphores are
//! built on top of this module, so nothing here may itself block.
//!
//! Each acquisition keeps its own saved interrupt state in the returned
//! [`CriticalSectionGuard`], which lives on the caller's stack. Nested
//! sections therefore restore correctly: only the outermost exit re-enables
//! interrupts.

use core::cell::{RefCell, RefMut};

use critical_section::{CriticalSection, Mutex, RestoreState};

/// Proof that interrupts are disabled, holding the state to restore.
///
/// Dropping the guard restores the interrupt state captured by [`enter`].
#[must_use = "dropping the guard immediately ends the critical section"]
pub struct CriticalSectionGuard {
    state: RestoreState,
}

impl CriticalSectionGuard {
    /// Token for accessing [`critical_section::Mutex`]-protected data.
    #[inline]
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: interrupts stay disabled for as long as `self` is alive,
        // and the token cannot outlive the borrow of `self`.
        unsafe { CriticalSection::new() }
    }

    /// Leave the critical section, restoring the prior interrupt state.
    #[inline]
    pub fn exit(self) {
        drop(self);
    }
}

impl Drop for CriticalSectionGuard {
    fn drop(&mut self) {
        // SAFETY: `state` came from the matching `acquire` in `enter`, whose
        // caller guarantees guards drop in reverse order of creation.
        unsafe { critical_section::release(self.state) }
    }
}

/// Disable interrupts and return a guard holding the prior state.
///
/// Prefer [`critical_section`], which enforces nesting by construction.
///
/// # Safety
/// Nested guards must be dropped in the reverse order they were created,
/// and a guard must not be forgotten. Dropping an outer guard first ends
/// the critical section while the inner guard can still hand out tokens.
#[inline]
pub unsafe fn enter() -> CriticalSectionGuard {
    // SAFETY: the matching release happens when the guard drops; ordering
    // is the caller's obligation.
    let state = unsafe { critical_section::acquire() };
    CriticalSectionGuard { state }
}

/// Execute a closure within a critical section (interrupts disabled).
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     // Access shared state safely
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// A critical-section protected [`RefCell`].
///
/// Used for the one scheduler-context value. Borrowing it twice from the
/// same call chain is a kernel bug and panics.
pub struct KernelCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> KernelCell<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(inner)),
        }
    }

    /// Mutably borrow the contents inside a fresh critical section.
    pub fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(RefMut<'_, T>) -> R,
    {
        critical_section(|cs| self.with_mut_cs(cs, f))
    }

    /// Mutably borrow the contents inside an already-entered critical section.
    pub fn with_mut_cs<F, R>(&self, cs: CriticalSection<'_>, f: F) -> R
    where
        F: FnOnce(RefMut<'_, T>) -> R,
    {
        f(self.inner.borrow(cs).borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_guards_release_in_order() {
        // SAFETY: the inner guard exits before the outer one.
        let outer = unsafe { enter() };
        {
            // SAFETY: exits within this scope.
            let inner = unsafe { enter() };
            let _ = inner.token();
            inner.exit();
        }
        // The outer section is still usable after the inner one ended
        let cell = KernelCell::new(7u32);
        let value = cell.with_mut_cs(outer.token(), |v| *v);
        assert_eq!(value, 7);
        outer.exit();
    }

    #[test]
    fn test_guard_excludes_other_contexts_until_exit() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        // SAFETY: single guard, exited below.
        let guard = unsafe { enter() };
        let entered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&entered);
        let other = std::thread::spawn(move || {
            critical_section(|_cs| flag.store(true, Ordering::SeqCst));
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        guard.exit();

        other.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_kernel_cell_mutation() {
        let cell = KernelCell::new(0u32);
        cell.with_mut(|mut v| *v += 3);
        cell.with_mut(|mut v| *v *= 2);
        assert_eq!(cell.with_mut(|v| *v), 6);
    }

    #[test]
    fn test_critical_section_returns_value() {
        assert_eq!(critical_section(|_cs| 42), 42);
    }
}
