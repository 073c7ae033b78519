//! # Scheduler
//!
//! The one scheduler-context value. It owns every kernel arena (threads,
//! periodic events, aperiodic bindings, semaphores, FIFO channels), the
//! system time, and the index of the running thread.
//!
//! ## Tick
//!
//! At each SysTick interrupt:
//! 1. **Advance time**: increment the system tick counter
//! 2. **Wake sleepers**: clear `asleep` on threads whose wake tick arrived
//! 3. **Collect periodic events**: due handlers are returned to the caller,
//!    which runs them once the scheduler is no longer borrowed
//! 4. **Request a reschedule**: the switch itself happens in PendSV
//!
//! ## Selection
//!
//! A pass walks the ring once, starting after the running thread, and picks
//! the most urgent (lowest value) thread that is neither sleeping nor
//! blocked. Ties go to the first one found, which rotates equal-priority
//! threads round-robin. If nothing qualifies the running thread keeps the
//! CPU, so applications should always add an idle thread at
//! [`IDLE_PRIORITY`](crate::config::IDLE_PRIORITY).

use crate::aperiodic::AperiodicTable;
use crate::arch::ExecutionContext;
use crate::config::MAX_FIFOS;
use crate::error::{KernelError, Result};
use crate::fifo::{fifo_pool, FifoChannel};
use crate::periodic::{DueHandlers, PeriodicHandler, PeriodicRing};
use crate::semaphore::SemaphorePool;
use crate::thread::{Priority, ThreadId, ThreadRing, ThreadState};

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// All kernel state, reached through a single
/// [`KernelCell`](crate::sync::KernelCell).
pub struct Scheduler {
    pub(crate) threads: ThreadRing,
    pub(crate) periodic: PeriodicRing,
    pub(crate) aperiodic: AperiodicTable,
    pub(crate) semaphores: SemaphorePool,
    pub(crate) fifos: [FifoChannel; MAX_FIFOS],

    /// Slot of the running thread; `None` until the first pass.
    pub(crate) current: Option<usize>,

    /// Monotonic tick counter.
    pub(crate) system_time: u64,

    /// Set when a context switch should be pended.
    pub(crate) needs_reschedule: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            threads: ThreadRing::new(),
            periodic: PeriodicRing::new(),
            aperiodic: AperiodicTable::new(),
            semaphores: SemaphorePool::new(),
            fifos: fifo_pool(),
            current: None,
            system_time: 0,
            needs_reschedule: false,
        }
    }

    /// Register a new thread.
    ///
    /// `prime` receives the pool slot and returns the thread's initial
    /// execution context.
    pub fn add_thread<F>(&mut self, priority: Priority, name: &str, prime: F) -> Result<ThreadId>
    where
        F: FnOnce(usize) -> ExecutionContext,
    {
        let slot = self
            .threads
            .insert(priority, name)
            .ok_or(KernelError::ThreadLimitReached)?;
        let tcb = self.threads.get_mut(slot);
        tcb.context = prime(slot);
        Ok(tcb.id)
    }

    /// Register a periodic event first due at `first_execute_tick`.
    pub fn add_periodic_event(
        &mut self,
        handler: PeriodicHandler,
        period: u32,
        first_execute_tick: u64,
    ) -> Result<()> {
        self.periodic
            .push(handler, period, first_execute_tick)
            .map(|_| ())
            .ok_or(KernelError::ThreadLimitReached)
    }

    /// Advance time by one tick.
    ///
    /// Returns the periodic handlers that came due; the caller invokes them
    /// after releasing the scheduler so they may signal semaphores or write
    /// FIFOs.
    pub fn tick(&mut self) -> DueHandlers {
        self.system_time += 1;
        let now = self.system_time;
        self.threads.wake_due(now);
        let due = self.periodic.collect_due(now);
        self.needs_reschedule = true;
        due
    }

    /// Run one scheduler pass and return the slot that should run.
    ///
    /// Returns `None` only when no thread has ever been added.
    pub fn schedule(&mut self) -> Option<usize> {
        let start = self.current.or_else(|| self.threads.first_live())?;

        let mut best: Option<(usize, Priority)> = None;
        for slot in self.threads.walk_after(start) {
            let tcb = self.threads.get(slot);
            if !tcb.is_runnable() {
                continue;
            }
            if best.map_or(true, |(_, priority)| tcb.priority < priority) {
                best = Some((slot, tcb.priority));
            }
        }

        let current_live = self.current.is_some_and(|slot| self.threads.get(slot).alive);
        if let Some((slot, _)) = best {
            self.current = Some(slot);
        } else if !current_live {
            self.current = self.threads.live_entry(start);
        }
        self.needs_reschedule = false;
        self.current
    }

    /// Store the outgoing thread's context, pick the next thread, and
    /// return its context. This is the body of the switch trap.
    pub fn switch_context(&mut self, outgoing: ExecutionContext) -> ExecutionContext {
        if let Some(slot) = self.current {
            self.threads.get_mut(slot).context = outgoing;
        }
        match self.schedule() {
            Some(slot) => self.threads.get(slot).context,
            None => outgoing,
        }
    }

    /// Put the running thread to sleep for `duration` ticks.
    pub fn sleep(&mut self, duration: u32) {
        let now = self.system_time;
        let slot = self.current_slot();
        let tcb = self.threads.get_mut(slot);
        tcb.wake_tick = now + u64::from(duration);
        tcb.asleep = true;
        self.needs_reschedule = true;
    }

    /// Kill the thread carrying `id`.
    pub fn kill_thread(&mut self, id: ThreadId) -> Result<()> {
        if self.threads.live_count() <= 1 {
            return Err(KernelError::CannotKillLastThread);
        }
        let slot = self.threads.find(id).ok_or(KernelError::ThreadDoesNotExist)?;
        self.remove(slot);
        Ok(())
    }

    /// Kill the running thread and request a reschedule.
    pub fn kill_self(&mut self) -> Result<()> {
        if self.threads.live_count() <= 1 {
            return Err(KernelError::CannotKillLastThread);
        }
        let slot = self.current_slot();
        self.remove(slot);
        Ok(())
    }

    fn remove(&mut self, slot: usize) {
        if let Some(sem) = self.threads.get(slot).blocked_on {
            self.withdraw_waiter(sem);
        }
        self.threads.unlink(slot);
        if self.current == Some(slot) {
            self.needs_reschedule = true;
        }
    }

    /// Return and clear the pending-reschedule flag.
    #[inline]
    pub fn take_reschedule(&mut self) -> bool {
        core::mem::take(&mut self.needs_reschedule)
    }

    /// Slot of the running thread.
    ///
    /// # Panics
    /// Panics when called before the first scheduler pass; thread-context
    /// operations are meaningless then.
    pub(crate) fn current_slot(&self) -> usize {
        match self.current {
            Some(slot) => slot,
            None => panic!("no running thread"),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// ID of the running thread.
    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.current.map(|slot| self.threads.get(slot).id)
    }

    /// Number of live threads.
    pub fn thread_count(&self) -> usize {
        self.threads.live_count()
    }

    /// Ticks since the kernel started.
    pub fn system_time(&self) -> u64 {
        self.system_time
    }

    /// State of the thread carrying `id`; `Dead` if no live thread has it.
    pub fn thread_state(&self, id: ThreadId) -> ThreadState {
        self.threads
            .find(id)
            .map_or(ThreadState::Dead, |slot| self.threads.get(slot).state())
    }

    /// Name of the live thread carrying `id`.
    pub fn thread_name(&self, id: ThreadId) -> Option<&str> {
        self.threads
            .find(id)
            .map(|slot| self.threads.get(slot).name.as_str())
    }

    /// Priority of the live thread carrying `id`.
    pub fn thread_priority(&self, id: ThreadId) -> Option<Priority> {
        self.threads.find(id).map(|slot| self.threads.get(slot).priority)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_THREADS;

    fn add(s: &mut Scheduler, priority: Priority, name: &str) -> ThreadId {
        s.add_thread(priority, name, |slot| ExecutionContext::new(0x100 * (slot + 1)))
            .unwrap()
    }

    fn running(s: &Scheduler) -> ThreadId {
        s.current_thread_id().unwrap()
    }

    #[test]
    fn test_thread_limit() {
        let mut s = Scheduler::new();
        for _ in 0..MAX_THREADS {
            add(&mut s, 1, "t");
        }
        assert_eq!(
            s.add_thread(1, "extra", |_| ExecutionContext::default()),
            Err(KernelError::ThreadLimitReached)
        );
        assert_eq!(s.thread_count(), MAX_THREADS);
    }

    #[test]
    fn test_priority_selection_is_stable() {
        let mut s = Scheduler::new();
        add(&mut s, 10, "a");
        add(&mut s, 20, "b");
        let urgent = add(&mut s, 5, "c");
        for _ in 0..10 {
            s.schedule();
            assert_eq!(running(&s), urgent);
        }
    }

    #[test]
    fn test_equal_priorities_rotate() {
        let mut s = Scheduler::new();
        let a = add(&mut s, 3, "a");
        let b = add(&mut s, 3, "b");
        let c = add(&mut s, 3, "c");
        let mut order = std::vec::Vec::new();
        for _ in 0..6 {
            s.schedule();
            order.push(running(&s));
        }
        assert_eq!(order, [b, c, a, b, c, a]);
    }

    #[test]
    fn test_no_runnable_thread_keeps_current() {
        let mut s = Scheduler::new();
        let only = add(&mut s, 1, "only");
        s.schedule();
        s.sleep(10);
        assert_eq!(s.schedule(), Some(0));
        assert_eq!(running(&s), only);
    }

    #[test]
    fn test_schedule_before_any_thread() {
        let mut s = Scheduler::new();
        assert_eq!(s.schedule(), None);
        let ctx = ExecutionContext::new(0xAB);
        assert_eq!(s.switch_context(ctx), ctx);
    }

    #[test]
    fn test_sleep_window() {
        let mut s = Scheduler::new();
        let sleeper = add(&mut s, 1, "sleeper");
        let idle = add(&mut s, 255, "idle");
        s.schedule();
        assert_eq!(running(&s), sleeper);

        let t = s.system_time();
        s.sleep(50);
        assert!(s.take_reschedule());
        assert_eq!(s.thread_state(sleeper), ThreadState::Sleeping);
        s.schedule();
        assert_eq!(running(&s), idle);

        while s.system_time() < t + 49 {
            s.tick();
            s.schedule();
            assert_eq!(running(&s), idle, "selected at tick {}", s.system_time());
        }
        s.tick();
        assert_eq!(s.system_time(), t + 50);
        s.schedule();
        assert_eq!(running(&s), sleeper);
    }

    #[test]
    fn test_tick_requests_reschedule() {
        let mut s = Scheduler::new();
        add(&mut s, 1, "t");
        s.schedule();
        assert!(!s.take_reschedule());
        s.tick();
        assert!(s.take_reschedule());
    }

    #[test]
    fn test_cannot_kill_last_thread() {
        let mut s = Scheduler::new();
        let only = add(&mut s, 1, "only");
        s.schedule();
        assert_eq!(s.kill_thread(only), Err(KernelError::CannotKillLastThread));
        assert_eq!(s.kill_self(), Err(KernelError::CannotKillLastThread));
        assert_eq!(s.thread_count(), 1);
        assert_eq!(s.thread_state(only), ThreadState::Runnable);
        let slot = s.current.unwrap();
        assert_eq!(s.threads.get(slot).next, slot);
    }

    #[test]
    fn test_kill_unknown_thread() {
        let mut s = Scheduler::new();
        add(&mut s, 1, "a");
        add(&mut s, 2, "b");
        assert_eq!(
            s.kill_thread(ThreadId(999)),
            Err(KernelError::ThreadDoesNotExist)
        );
        assert_eq!(s.thread_count(), 2);
    }

    #[test]
    fn test_kill_other_thread_does_not_reschedule() {
        let mut s = Scheduler::new();
        add(&mut s, 1, "a");
        let b = add(&mut s, 2, "b");
        s.schedule();
        s.kill_thread(b).unwrap();
        assert!(!s.take_reschedule());
        assert_eq!(s.thread_count(), 1);
        assert_eq!(s.thread_state(b), ThreadState::Dead);
        assert_eq!(s.thread_name(b), None);
    }

    #[test]
    fn test_kill_self_moves_on() {
        let mut s = Scheduler::new();
        let a = add(&mut s, 1, "a");
        let b = add(&mut s, 2, "b");
        let c = add(&mut s, 3, "c");
        s.schedule();
        assert_eq!(running(&s), a);

        s.kill_self().unwrap();
        assert!(s.take_reschedule());
        s.schedule();
        assert_eq!(running(&s), b);

        // Killing the running thread by ID behaves the same way
        s.kill_thread(b).unwrap();
        assert!(s.take_reschedule());
        s.schedule();
        assert_eq!(running(&s), c);
        assert_eq!(s.thread_count(), 1);
    }

    #[test]
    fn test_killed_thread_never_resumed() {
        let mut s = Scheduler::new();
        let a = add(&mut s, 1, "a");
        let b = add(&mut s, 2, "b");
        let idle = add(&mut s, 255, "idle");
        s.schedule();
        assert_eq!(running(&s), a);

        s.kill_self().unwrap();
        // An interrupt kills `b` before the pended switch runs
        s.kill_thread(b).unwrap();
        s.schedule();
        assert_eq!(running(&s), idle);
        assert_eq!(s.thread_state(a), ThreadState::Dead);
    }

    #[test]
    fn test_killed_thread_not_kept_when_nothing_runnable() {
        let mut s = Scheduler::new();
        add(&mut s, 1, "a");
        let sleeper = add(&mut s, 2, "sleeper");
        s.schedule();
        s.threads.get_mut(1).asleep = true;
        s.kill_self().unwrap();
        s.schedule();
        assert_eq!(running(&s), sleeper);
    }

    #[test]
    fn test_switch_context_saves_and_restores() {
        let mut s = Scheduler::new();
        add(&mut s, 2, "low");
        add(&mut s, 1, "high");
        // First switch: nothing running yet, so nothing is saved
        let first = s.switch_context(ExecutionContext::default());
        assert_eq!(first, ExecutionContext::new(0x200));

        s.sleep(5);
        let next = s.switch_context(ExecutionContext::new(0x1F0));
        assert_eq!(next, ExecutionContext::new(0x100));
        assert_eq!(s.threads.get(1).context, ExecutionContext::new(0x1F0));
    }

    #[test]
    fn test_periodic_firing_schedule() {
        use core::sync::atomic::{AtomicU32, Ordering};
        static FIRED: AtomicU32 = AtomicU32::new(0);
        fn sample() {
            FIRED.fetch_add(1, Ordering::Relaxed);
        }

        let mut s = Scheduler::new();
        s.add_periodic_event(sample, 50, 10).unwrap();
        let mut fired_at = std::vec::Vec::new();
        for _ in 0..120 {
            for handler in s.tick() {
                handler();
                fired_at.push(s.system_time());
            }
        }
        assert_eq!(fired_at, [10, 60, 110]);
        assert_eq!(FIRED.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_periodic_limit() {
        fn noop() {}
        let mut s = Scheduler::new();
        for _ in 0..crate::config::MAX_PERIODIC_EVENTS {
            s.add_periodic_event(noop, 1, 1).unwrap();
        }
        assert_eq!(
            s.add_periodic_event(noop, 1, 1),
            Err(KernelError::ThreadLimitReached)
        );
    }

    #[test]
    fn test_sleeping_preempted_by_priority_on_wake() {
        // A(5) and B(10): A sleeps 50, B runs, A preempts B afterwards
        let mut s = Scheduler::new();
        let a = add(&mut s, 5, "A");
        let b = add(&mut s, 10, "B");
        s.schedule();
        assert_eq!(running(&s), a);

        s.sleep(50);
        s.schedule();
        assert_eq!(running(&s), b);

        for _ in 0..49 {
            s.tick();
            s.schedule();
            assert_eq!(running(&s), b);
        }
        s.tick();
        assert_eq!(s.thread_state(a), ThreadState::Runnable);
        s.schedule();
        assert_eq!(running(&s), a);
    }

    #[test]
    fn test_queries() {
        let mut s = Scheduler::new();
        assert_eq!(s.current_thread_id(), None);
        let id = add(&mut s, 42, "sensor-sampling-thread");
        assert_eq!(s.thread_priority(id), Some(42));
        assert_eq!(s.thread_name(id), Some("sensor-sampling"));
        s.schedule();
        assert_eq!(s.current_thread_id(), Some(id));
        assert_eq!(s.system_time(), 0);
    }
}
