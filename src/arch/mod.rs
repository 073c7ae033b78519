//! # Architecture Abstraction Layer
//!
//! The portable kernel never touches registers. Everything it needs from
//! the processor goes through [`Port`]: priming a new thread's saved
//! context, pending the context switch, and enabling an interrupt line.
//! The Cortex-M4 port is selected for bare-metal ARM targets; host builds
//! use a recording stand-in for tests.

use crate::thread::ThreadEntry;

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        pub mod cortex_m4;
    }
}

#[cfg(test)]
pub(crate) mod sim;

/// Saved execution state of a thread that is not running.
///
/// Opaque to the kernel: on Cortex-M it is the process stack pointer
/// below the stacked register file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    stack_pointer: usize,
}

impl ExecutionContext {
    pub const fn new(stack_pointer: usize) -> Self {
        Self { stack_pointer }
    }

    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer
    }
}

/// Processor services the kernel depends on.
pub trait Port {
    /// Build the initial context for a thread in pool slot `slot`, so that
    /// the first switch into it starts executing `entry`.
    fn prime_context(&self, slot: usize, entry: ThreadEntry) -> ExecutionContext;

    /// Pend the low-priority switch trap. The switch happens once no other
    /// interrupt is active.
    fn request_context_switch(&self);

    /// Set `irq`'s hardware priority and enable it. Arguments are already
    /// validated.
    fn bind_interrupt(&self, irq: u16, priority: u8);
}
