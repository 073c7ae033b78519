//! # Ringtide Configuration
//!
//! Compile-time constants governing the kernel pools and hardware setup.
//! All limits are fixed at compile time; nothing is allocated dynamically.

/// Maximum number of live threads. Bounds the TCB pool and the static
/// stack pool in the Cortex-M4 port.
pub const MAX_THREADS: usize = 6;

/// Maximum number of periodic events. Periodic events are never removed.
pub const MAX_PERIODIC_EVENTS: usize = 6;

/// Per-thread stack size in 32-bit words. Must hold the deepest call chain
/// plus the hardware exception frame (8 words) and the software-saved
/// context (8 words for R4–R11).
pub const STACK_WORDS: usize = 512;

/// Thread names are truncated to `MAX_NAME_LENGTH - 1` bytes.
pub const MAX_NAME_LENGTH: usize = 16;

/// Number of FIFO channels in the static pool.
pub const MAX_FIFOS: usize = 4;

/// Capacity of each FIFO channel, in words.
pub const FIFO_SIZE: usize = 16;

/// Semaphores available to `create_semaphore`, on top of the two every
/// FIFO channel reserves for itself.
pub const MAX_USER_SEMAPHORES: usize = 16;

/// Total semaphore arena size.
pub const MAX_SEMAPHORES: usize = 2 * MAX_FIFOS + MAX_USER_SEMAPHORES;

/// Number of external interrupt lines an aperiodic event can bind to
/// (TM4C123: IRQ 0–138, rounded up to the NVIC register bank).
pub const NUM_INTERRUPTS: usize = 140;

/// Most urgent priority an aperiodic event may request. Level 0 is left to
/// faults and anything the board code must never have delayed.
pub const MIN_APERIODIC_PRIORITY: u8 = 1;

/// Least urgent priority an aperiodic event may request. Must stay above
/// the kernel's own level so events always preempt the tick.
pub const MAX_APERIODIC_PRIORITY: u8 = 6;

/// Implemented NVIC priority bits on the TM4C123.
pub const NVIC_PRIO_BITS: u8 = 3;

/// Hardware priority for SysTick and PendSV: the lowest level (7 << 5).
pub const KERNEL_HW_PRIORITY: u8 = 0xE0;

/// SysTick frequency in Hz. One tick is one millisecond.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (PLL at 80 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 80_000_000;

/// Conventional priority of the always-runnable idle thread.
pub const IDLE_PRIORITY: u8 = 255;
