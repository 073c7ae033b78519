//! # Periodic Task Ring
//!
//! Periodic events are short callbacks invoked from tick context at a fixed
//! interval. They live in their own fixed pool, linked into a ring in
//! registration order, and are never removed.

use heapless::Vec;

use crate::config::MAX_PERIODIC_EVENTS;

/// Periodic callback. Runs inside the tick; must not block.
pub type PeriodicHandler = fn();

/// Periodic Task Block.
#[derive(Clone, Copy)]
pub struct PeriodicTaskBlock {
    pub handler: PeriodicHandler,
    pub period: u32,
    pub next_execute_tick: u64,
    pub next: usize,
    pub previous: usize,
}

/// Handlers that came due on one tick, in ring order.
pub type DueHandlers = Vec<PeriodicHandler, MAX_PERIODIC_EVENTS>;

/// Fixed pool of periodic events, kept in registration order.
pub struct PeriodicRing {
    blocks: [Option<PeriodicTaskBlock>; MAX_PERIODIC_EVENTS],
    count: usize,
}

impl PeriodicRing {
    pub const fn new() -> Self {
        Self {
            blocks: [None; MAX_PERIODIC_EVENTS],
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append a block at the tail of the ring (just before slot 0).
    ///
    /// Returns `None` when the pool is full.
    pub fn push(
        &mut self,
        handler: PeriodicHandler,
        period: u32,
        first_execute_tick: u64,
    ) -> Option<usize> {
        if self.count >= MAX_PERIODIC_EVENTS {
            return None;
        }
        let slot = self.count;
        let (next, previous) = if slot == 0 {
            (0, 0)
        } else {
            let tail = slot - 1;
            if let Some(block) = self.blocks[tail].as_mut() {
                block.next = slot;
            }
            if let Some(head) = self.blocks[0].as_mut() {
                head.previous = slot;
            }
            (0, tail)
        };
        self.blocks[slot] = Some(PeriodicTaskBlock {
            handler,
            period,
            next_execute_tick: first_execute_tick,
            next,
            previous,
        });
        self.count += 1;
        Some(slot)
    }

    pub fn get(&self, slot: usize) -> Option<&PeriodicTaskBlock> {
        self.blocks.get(slot).and_then(Option::as_ref)
    }

    /// Walk the ring once and collect every handler due at `now`,
    /// advancing each fired block by exactly one period.
    pub fn collect_due(&mut self, now: u64) -> DueHandlers {
        let mut due = DueHandlers::new();
        if self.count == 0 {
            return due;
        }
        let mut cursor = 0;
        for _ in 0..self.count {
            let Some(block) = self.blocks[cursor].as_mut() else {
                break;
            };
            if block.next_execute_tick <= now {
                block.next_execute_tick += u64::from(block.period);
                // Capacity equals the pool size, so this cannot overflow
                let _ = due.push(block.handler);
            }
            cursor = block.next;
        }
        due
    }
}

impl Default for PeriodicRing {
    fn default() -> Self {
        Self::new()
    }
}
