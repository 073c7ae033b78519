//! # Aperiodic Events
//!
//! Binds external interrupt lines to handlers that run at hardware
//! priority, above the tick and the context switch. Handlers should clear
//! their interrupt source and defer real work to a thread with `signal`.
//!
//! The table is only the portable half: validation and lookup. Enabling the
//! line and setting its priority is the [`Port`](crate::arch::Port)'s job,
//! and on Cortex-M the default exception handler dispatches through
//! [`AperiodicTable::handler`].

use crate::config::{MAX_APERIODIC_PRIORITY, MIN_APERIODIC_PRIORITY, NUM_INTERRUPTS};
use crate::error::{KernelError, Result};

/// Aperiodic callback, invoked in interrupt context.
pub type AperiodicHandler = fn();

pub struct AperiodicTable {
    handlers: [Option<AperiodicHandler>; NUM_INTERRUPTS],
}

impl AperiodicTable {
    pub const fn new() -> Self {
        Self {
            handlers: [None; NUM_INTERRUPTS],
        }
    }

    /// Check an interrupt number and priority pair.
    ///
    /// The interrupt number is checked first, so an entirely bogus request
    /// reports [`KernelError::InvalidInterruptNumber`].
    pub fn validate(irq: u16, priority: u8) -> Result<()> {
        if usize::from(irq) >= NUM_INTERRUPTS {
            return Err(KernelError::InvalidInterruptNumber);
        }
        if !(MIN_APERIODIC_PRIORITY..=MAX_APERIODIC_PRIORITY).contains(&priority) {
            return Err(KernelError::InvalidHardwarePriority);
        }
        Ok(())
    }

    /// Record `handler` for `irq`, replacing any earlier binding.
    pub fn bind(&mut self, handler: AperiodicHandler, priority: u8, irq: u16) -> Result<()> {
        Self::validate(irq, priority)?;
        self.handlers[usize::from(irq)] = Some(handler);
        Ok(())
    }

    /// Handler bound to `irq`, if any.
    pub fn handler(&self, irq: u16) -> Option<AperiodicHandler> {
        self.handlers.get(usize::from(irq)).copied().flatten()
    }
}

impl Default for AperiodicTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button() {}

    #[test]
    fn test_rejects_out_of_range_interrupt() {
        let mut table = AperiodicTable::new();
        assert_eq!(
            table.bind(button, 4, NUM_INTERRUPTS as u16),
            Err(KernelError::InvalidInterruptNumber)
        );
        // Interrupt number is reported before priority
        assert_eq!(
            AperiodicTable::validate(u16::MAX, 0),
            Err(KernelError::InvalidInterruptNumber)
        );
    }

    #[test]
    fn test_rejects_out_of_range_priority() {
        let mut table = AperiodicTable::new();
        assert_eq!(table.bind(button, 0, 4), Err(KernelError::InvalidHardwarePriority));
        assert_eq!(table.bind(button, 7, 4), Err(KernelError::InvalidHardwarePriority));
        assert!(table.handler(4).is_none());
    }

    #[test]
    fn test_bind_and_lookup() {
        let mut table = AperiodicTable::new();
        table.bind(button, 1, 0).unwrap();
        table.bind(button, 6, (NUM_INTERRUPTS - 1) as u16).unwrap();
        assert!(table.handler(0).is_some());
        assert!(table.handler((NUM_INTERRUPTS - 1) as u16).is_some());
        assert!(table.handler(1).is_none());
        assert!(table.handler(u16::MAX).is_none());
    }
}
