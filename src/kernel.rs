//! # Kernel
//!
//! The public face of Ringtide. [`Kernel`] pairs the scheduler context,
//! held in a critical-section protected cell, with the processor [`Port`]
//! and turns the scheduler's state transitions into real suspensions:
//! whenever an operation leaves the reschedule flag set, the kernel pends
//! the switch trap before returning.
//!
//! On the target a single static instance backs the free functions at the
//! bottom of this module; host tests build their own instance around a
//! recording port.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::create_semaphore() / kernel::fifo_init()
//!         ├─► kernel::add_thread()          ← idle thread + workers
//!         ├─► kernel::add_periodic_event()
//!         ├─► kernel::add_aperiodic_event()
//!         └─► kernel::launch()              ← never returns
//!               ├─► Configure SysTick
//!               ├─► SysTick + PendSV to the lowest priority
//!               └─► Start the most urgent thread
//! ```

use crate::aperiodic::AperiodicHandler;
use crate::arch::{ExecutionContext, Port};
use crate::error::Result;
use crate::log::{debug, info, warn};
use crate::periodic::PeriodicHandler;
use crate::scheduler::Scheduler;
use crate::semaphore::SemaphoreId;
use crate::sync::KernelCell;
use crate::thread::{truncate_name, Priority, ThreadEntry, ThreadId, ThreadName, ThreadState};

/// Scheduler context paired with the processor port that realizes it.
pub struct Kernel<P: Port> {
    scheduler: KernelCell<Scheduler>,
    port: P,
}

impl<P: Port> Kernel<P> {
    pub const fn new(port: P) -> Self {
        Self {
            scheduler: KernelCell::new(Scheduler::new()),
            port,
        }
    }

    /// Run `f` on the scheduler inside a critical section, then pend the
    /// switch trap if `f` asked for a reschedule.
    fn with_scheduler<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scheduler) -> R,
    {
        let (result, reschedule) = self.scheduler.with_mut(|mut s| {
            let result = f(&mut *s);
            (result, s.take_reschedule())
        });
        if reschedule {
            self.port.request_context_switch();
        }
        result
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a thread. The most urgent thread runs at the next pass.
    pub fn add_thread(&self, entry: ThreadEntry, priority: Priority, name: &str) -> Result<ThreadId> {
        let result = self.with_scheduler(|s| {
            s.add_thread(priority, name, |slot| self.port.prime_context(slot, entry))
        });
        match result {
            Ok(id) => info!("thread {} added at priority {}", id.0, priority),
            Err(e) => warn!("add_thread rejected: {}", e),
        }
        result
    }

    /// Register a periodic event, first due at `first_execute_tick`.
    pub fn add_periodic_event(
        &self,
        handler: PeriodicHandler,
        period: u32,
        first_execute_tick: u64,
    ) -> Result<()> {
        let result =
            self.with_scheduler(|s| s.add_periodic_event(handler, period, first_execute_tick));
        if let Err(e) = result {
            warn!("add_periodic_event rejected: {}", e);
        }
        result
    }

    /// Bind `handler` to interrupt line `irq` at hardware `priority`
    /// (1 = most urgent, 6 = least) and enable the line.
    pub fn add_aperiodic_event(
        &self,
        handler: AperiodicHandler,
        priority: u8,
        irq: u16,
    ) -> Result<()> {
        let result = self.with_scheduler(|s| s.aperiodic.bind(handler, priority, irq));
        match result {
            Ok(()) => {
                self.port.bind_interrupt(irq, priority);
                debug!("irq {} bound at priority {}", irq, priority);
            }
            Err(e) => warn!("add_aperiodic_event rejected: {}", e),
        }
        result
    }

    /// Allocate a semaphore with an initial value.
    pub fn create_semaphore(&self, value: i32) -> Result<SemaphoreId> {
        self.with_scheduler(|s| s.create_semaphore(value))
    }

    // -----------------------------------------------------------------------
    // Semaphores
    // -----------------------------------------------------------------------

    pub fn init_semaphore(&self, sem: SemaphoreId, value: i32) {
        self.with_scheduler(|s| s.init_semaphore(sem, value));
    }

    /// Acquire `sem`, suspending the calling thread until it is granted.
    pub fn wait(&self, sem: SemaphoreId) {
        // The pended switch is taken as soon as the critical section ends,
        // so by the time this returns a signal has granted the semaphore.
        self.with_scheduler(|s| s.wait(sem));
    }

    /// Release `sem`, unblocking one waiter if there is any. Callable from
    /// interrupt context.
    pub fn signal(&self, sem: SemaphoreId) {
        self.with_scheduler(|s| s.signal(sem));
    }

    pub fn semaphore_value(&self, sem: SemaphoreId) -> i32 {
        self.with_scheduler(|s| s.semaphore_value(sem))
    }

    // -----------------------------------------------------------------------
    // FIFO channels
    // -----------------------------------------------------------------------

    pub fn fifo_init(&self, index: usize) -> Result<()> {
        self.with_scheduler(|s| s.fifo_init(index))
    }

    /// Read one word from channel `index`, suspending while it is empty.
    pub fn fifo_read(&self, index: usize) -> Result<u32> {
        let (available, mutex) = self.with_scheduler(|s| s.fifo_semaphores(index))?;
        self.wait(available);
        self.wait(mutex);
        let value = self.with_scheduler(|s| s.fifo_pop(index));
        self.signal(mutex);
        value
    }

    /// Write one word to channel `index` without blocking. Callable from
    /// interrupt and periodic context.
    pub fn fifo_write(&self, index: usize, value: u32) -> Result<()> {
        self.with_scheduler(|s| s.fifo_write(index, value))
    }

    pub fn fifo_lost_count(&self, index: usize) -> Result<u32> {
        self.with_scheduler(|s| s.fifo_lost_count(index))
    }

    pub fn fifo_len(&self, index: usize) -> Result<usize> {
        self.with_scheduler(|s| s.fifo_len(index))
    }

    // -----------------------------------------------------------------------
    // Thread control
    // -----------------------------------------------------------------------

    /// Suspend the calling thread for `duration` ticks.
    pub fn sleep(&self, duration: u32) {
        self.with_scheduler(|s| s.sleep(duration));
    }

    /// Kill the calling thread. On the target this only returns on error.
    pub fn kill_self(&self) -> Result<()> {
        let result = self.with_scheduler(|s| {
            let id = s.current_thread_id();
            s.kill_self().map(|()| id)
        });
        match result {
            Ok(Some(id)) => debug!("thread {} killed itself", id.0),
            Ok(None) => {}
            Err(e) => warn!("kill_self rejected: {}", e),
        }
        result.map(|_| ())
    }

    pub fn kill_thread(&self, id: ThreadId) -> Result<()> {
        let result = self.with_scheduler(|s| s.kill_thread(id));
        match result {
            Ok(()) => debug!("thread {} killed", id.0),
            Err(e) => warn!("kill_thread {} rejected: {}", id.0, e),
        }
        result
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.with_scheduler(|s| s.current_thread_id())
    }

    pub fn thread_count(&self) -> usize {
        self.with_scheduler(|s| s.thread_count())
    }

    pub fn thread_state(&self, id: ThreadId) -> ThreadState {
        self.with_scheduler(|s| s.thread_state(id))
    }

    /// Name of the live thread carrying `id`, copied out of the kernel.
    pub fn thread_name(&self, id: ThreadId) -> Option<ThreadName> {
        self.with_scheduler(|s| s.thread_name(id).map(truncate_name))
    }

    pub fn system_time(&self) -> u64 {
        self.with_scheduler(|s| s.system_time())
    }

    // -----------------------------------------------------------------------
    // Interrupt entry points
    // -----------------------------------------------------------------------

    /// Tick handler body: advance time, wake sleepers, run due periodic
    /// events, pend a reschedule.
    pub fn tick(&self) {
        // The switch is requested below, so the flag must not linger
        let due = self.scheduler.with_mut(|mut s| {
            let due = s.tick();
            s.take_reschedule();
            due
        });
        for handler in due {
            handler();
        }
        self.port.request_context_switch();
    }

    /// Switch trap body: save `outgoing`, return the context to resume.
    pub fn switch_context(&self, outgoing: ExecutionContext) -> ExecutionContext {
        self.scheduler.with_mut(|mut s| s.switch_context(outgoing))
    }

    /// Run the handler bound to `irq`, if any, outside the critical section.
    pub fn dispatch_aperiodic(&self, irq: u16) -> bool {
        let handler = self.scheduler.with_mut(|s| s.aperiodic.handler(irq));
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Pick the first thread to run and return its context.
    pub fn first_context(&self) -> Option<ExecutionContext> {
        self.scheduler.with_mut(|mut s| {
            let slot = s.schedule()?;
            Some(s.threads.get(slot).context)
        })
    }
}

// ---------------------------------------------------------------------------
// Global kernel instance (target only)
// ---------------------------------------------------------------------------

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        mod global;
        pub use global::*;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
