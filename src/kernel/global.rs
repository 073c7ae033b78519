//! The kernel instance the firmware runs on, and the free-function API
//! that threads, drivers, and interrupt handlers call.

use crate::aperiodic::AperiodicHandler;
use crate::arch::cortex_m4::{self, CortexM4};
use crate::error::Result;
use crate::periodic::PeriodicHandler;
use crate::semaphore::SemaphoreId;
use crate::thread::{Priority, ThreadEntry, ThreadId, ThreadName, ThreadState};

use super::Kernel;

/// Global kernel instance.
///
/// Reached from thread context through the functions below and from the
/// SysTick, PendSV, and default handlers in the Cortex-M4 port.
pub static KERNEL: Kernel<CortexM4> = Kernel::new(CortexM4);

pub fn add_thread(entry: ThreadEntry, priority: Priority, name: &str) -> Result<ThreadId> {
    KERNEL.add_thread(entry, priority, name)
}

pub fn add_periodic_event(handler: PeriodicHandler, period: u32, first_execute_tick: u64) -> Result<()> {
    KERNEL.add_periodic_event(handler, period, first_execute_tick)
}

pub fn add_aperiodic_event(handler: AperiodicHandler, priority: u8, irq: u16) -> Result<()> {
    KERNEL.add_aperiodic_event(handler, priority, irq)
}

pub fn create_semaphore(value: i32) -> Result<SemaphoreId> {
    KERNEL.create_semaphore(value)
}

pub fn init_semaphore(sem: SemaphoreId, value: i32) {
    KERNEL.init_semaphore(sem, value)
}

pub fn wait(sem: SemaphoreId) {
    KERNEL.wait(sem)
}

pub fn signal(sem: SemaphoreId) {
    KERNEL.signal(sem)
}

pub fn fifo_init(index: usize) -> Result<()> {
    KERNEL.fifo_init(index)
}

pub fn fifo_read(index: usize) -> Result<u32> {
    KERNEL.fifo_read(index)
}

pub fn fifo_write(index: usize, value: u32) -> Result<()> {
    KERNEL.fifo_write(index, value)
}

pub fn fifo_lost_count(index: usize) -> Result<u32> {
    KERNEL.fifo_lost_count(index)
}

pub fn sleep(duration: u32) {
    KERNEL.sleep(duration)
}

pub fn kill_self() -> Result<()> {
    KERNEL.kill_self()
}

pub fn kill_thread(id: ThreadId) -> Result<()> {
    KERNEL.kill_thread(id)
}

pub fn thread_id() -> Option<ThreadId> {
    KERNEL.thread_id()
}

pub fn thread_count() -> usize {
    KERNEL.thread_count()
}

pub fn thread_state(id: ThreadId) -> ThreadState {
    KERNEL.thread_state(id)
}

pub fn thread_name(id: ThreadId) -> Option<ThreadName> {
    KERNEL.thread_name(id)
}

pub fn system_time() -> u64 {
    KERNEL.system_time()
}

/// Start the kernel. **Does not return.**
///
/// Configures SysTick, drops SysTick and PendSV to the lowest priority,
/// and switches into the most urgent thread.
///
/// # Panics
/// Panics if no thread has been added.
pub fn launch(mut core_peripherals: cortex_m::Peripherals) -> ! {
    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_kernel_priorities(&mut core_peripherals.SCB);

    let first = match KERNEL.first_context() {
        Some(context) => context,
        None => panic!("launch with no threads"),
    };
    crate::log::info!("launching, {} threads", KERNEL.thread_count());

    // SAFETY: called once, with a context primed by `prime_context`.
    unsafe { cortex_m4::start_first_thread(first) }
}
