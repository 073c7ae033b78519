//! # Ringtide
//!
//! A small preemptive real-time kernel for single-core ARM Cortex-M4
//! microcontrollers (TM4C123 class).
//!
//! ## Overview
//!
//! Threads live on a circular doubly-linked ring. Every SysTick the kernel
//! advances system time, wakes sleepers whose deadline has passed, runs due
//! periodic events, and pends a context switch. The switch picks the most
//! urgent runnable thread, scanning the ring from the one after the current
//! thread so that equal priorities share the processor round-robin.
//!
//! - **Priorities**: numerically lower is more urgent; 255 is idle
//! - **Semaphores**: counting, with blocked threads parked on the ring
//! - **FIFOs**: fixed word queues guarded by two semaphores each
//! - **Periodic events**: handlers run from the tick at a fixed period
//! - **Aperiodic events**: handlers bound to external interrupt lines
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  Application Threads                   │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                 │
//! │   add_thread · wait · signal · fifo_read · sleep · …   │
//! ├──────────────┬──────────────┬──────────────────────────┤
//! │  Scheduler   │  Semaphores  │  FIFOs                   │
//! │ scheduler.rs │ semaphore.rs │  fifo.rs                 │
//! │  ─ tick()    │  ─ wait()    │  ─ fifo_write()          │
//! │  ─ schedule()│  ─ signal()  │  ─ fifo_pop()            │
//! ├──────────────┴──────────────┴──────────────────────────┤
//! │ Thread ring (thread.rs) · periodic.rs · aperiodic.rs   │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)               │
//! │    PendSV · SysTick · Stack priming · NVIC binding     │
//! ├────────────────────────────────────────────────────────┤
//! │          ARM Cortex-M4 Hardware (Thumb-2)              │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: All state is statically allocated
//! - **Fixed pools**: threads, periodic events, semaphores, FIFOs
//! - **Per-thread stack**: one static stack per TCB slot
//! - **Critical sections**: the `critical-section` crate, backed by PRIMASK
//!   on the target
//!
//! The portable core builds on the host, where the unit tests drive it
//! through a recording [`arch::Port`].

#![cfg_attr(not(test), no_std)]

pub mod aperiodic;
pub mod arch;
pub mod config;
pub mod error;
pub mod fifo;
pub mod kernel;
mod log;
pub mod periodic;
pub mod scheduler;
pub mod semaphore;
pub mod sync;
pub mod thread;

pub use error::{KernelError, Result};
pub use kernel::Kernel;
pub use semaphore::SemaphoreId;
pub use thread::{Priority, ThreadEntry, ThreadId, ThreadState};
