//! Recording port for host tests.

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use super::{ExecutionContext, Port};
use crate::thread::ThreadEntry;

/// Fake stack base; slot `n` gets `SIM_STACK_BASE + n * 0x1000`.
pub const SIM_STACK_BASE: usize = 0x2000_0000;

#[derive(Default)]
pub struct SimPort {
    pub switch_requests: Cell<u32>,
    pub bound: RefCell<Vec<(u16, u8)>>,
}

impl SimPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of switch requests since the last call.
    pub fn take_switch_requests(&self) -> u32 {
        self.switch_requests.replace(0)
    }
}

impl Port for SimPort {
    fn prime_context(&self, slot: usize, _entry: ThreadEntry) -> ExecutionContext {
        ExecutionContext::new(SIM_STACK_BASE + slot * 0x1000)
    }

    fn request_context_switch(&self) {
        self.switch_requests.set(self.switch_requests.get() + 1);
    }

    fn bind_interrupt(&self, irq: u16, priority: u8) {
        self.bound.borrow_mut().push((irq, priority));
    }
}
