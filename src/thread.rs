//! # Thread Control Block & Thread Ring
//!
//! Every live thread owns one slot of a fixed TCB pool. Live slots are
//! linked into a single circular doubly-linked ring through `next` /
//! `previous` slot indices; the scheduler walks that ring both for priority
//! selection and for semaphore wake-up.
//!
//! ```text
//!   slot:   0        1        2        3
//!         ┌────┐   ┌────┐   ┌────┐   ┌────┐
//!         │ A  │──►│dead│   │ B  │──►│ C  │──┐
//!         └────┘   └────┘   └────┘   └────┘  │
//!           ▲ └───────────────►▲             │
//!           └────────────────────────────────┘
//! ```
//!
//! Killing a thread unlinks its slot but leaves the slot's own links
//! untouched, so a scheduler pass started from a thread that just killed
//! itself still finds its way back into the ring.

use heapless::String;

use crate::arch::ExecutionContext;
use crate::config::{MAX_NAME_LENGTH, MAX_THREADS};
use crate::semaphore::SemaphoreId;

/// Thread entry point. Threads never return; see [`crate::kernel`].
pub type ThreadEntry = extern "C" fn() -> !;

/// Scheduling priority. Smaller values are more urgent.
pub type Priority = u8;

/// Bounded thread name.
pub type ThreadName = String<MAX_NAME_LENGTH>;

/// Process-lifetime unique thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreadId(pub u32);

/// Scheduling state derived from a TCB's flags.
///
/// ```text
///            sleep()              tick ≥ wake_tick
///   Runnable ───────► Sleeping ─────────────────► Runnable
///   Runnable ───────► Blocked  ─────────────────► Runnable
///            wait() < 0          signal() picks it
///   any ──── kill ──► Dead
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThreadState {
    Runnable,
    Sleeping,
    Blocked,
    Dead,
}

/// Thread Control Block.
pub struct ThreadControlBlock {
    pub id: ThreadId,
    pub priority: Priority,
    pub alive: bool,
    pub asleep: bool,
    /// Absolute tick at which sleeping ends.
    pub wake_tick: u64,
    pub blocked_on: Option<SemaphoreId>,
    /// Saved register/stack state; written only by the context switch.
    pub context: ExecutionContext,
    pub name: ThreadName,
    pub next: usize,
    pub previous: usize,
}

impl ThreadControlBlock {
    /// Create an empty (dead) TCB. Used to initialize the static pool.
    pub const fn empty() -> Self {
        Self {
            id: ThreadId(0),
            priority: 0,
            alive: false,
            asleep: false,
            wake_tick: 0,
            blocked_on: None,
            context: ExecutionContext::new(0),
            name: String::new(),
            next: 0,
            previous: 0,
        }
    }

    /// Current scheduling state. Blocking takes precedence over sleeping.
    pub fn state(&self) -> ThreadState {
        if !self.alive {
            ThreadState::Dead
        } else if self.blocked_on.is_some() {
            ThreadState::Blocked
        } else if self.asleep {
            ThreadState::Sleeping
        } else {
            ThreadState::Runnable
        }
    }

    /// Neither sleeping nor blocked.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.state() == ThreadState::Runnable
    }
}

/// Copy `name` into a bounded string, keeping at most
/// `MAX_NAME_LENGTH - 1` bytes and never splitting a character.
pub fn truncate_name(name: &str) -> ThreadName {
    let mut out = ThreadName::new();
    for c in name.chars() {
        if out.len() + c.len_utf8() > MAX_NAME_LENGTH - 1 || out.push(c).is_err() {
            break;
        }
    }
    out
}

/// The fixed TCB pool plus ring bookkeeping.
pub struct ThreadRing {
    tcbs: [ThreadControlBlock; MAX_THREADS],
    live: usize,
    next_id: u32,
}

impl ThreadRing {
    pub const fn new() -> Self {
        Self {
            tcbs: [const { ThreadControlBlock::empty() }; MAX_THREADS],
            live: 0,
            next_id: 0,
        }
    }

    /// Number of live threads.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn get(&self, slot: usize) -> &ThreadControlBlock {
        &self.tcbs[slot]
    }

    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> &mut ThreadControlBlock {
        &mut self.tcbs[slot]
    }

    /// First live slot in pool order; the ring entry point before any
    /// thread has run.
    pub fn first_live(&self) -> Option<usize> {
        self.tcbs.iter().position(|t| t.alive)
    }

    /// Slot of the live thread carrying `id`.
    pub fn find(&self, id: ThreadId) -> Option<usize> {
        self.tcbs.iter().position(|t| t.alive && t.id == id)
    }

    /// Claim the first dead slot, splice it into the ring after the nearest
    /// preceding live slot, and mark it alive and runnable.
    ///
    /// Returns the slot, or `None` when the pool is full.
    pub fn insert(&mut self, priority: Priority, name: &str) -> Option<usize> {
        if self.live >= MAX_THREADS {
            return None;
        }
        let slot = self.tcbs.iter().position(|t| !t.alive)?;

        if self.live == 0 {
            self.tcbs[slot].next = slot;
            self.tcbs[slot].previous = slot;
        } else {
            let mut before = (slot + MAX_THREADS - 1) % MAX_THREADS;
            while !self.tcbs[before].alive {
                before = (before + MAX_THREADS - 1) % MAX_THREADS;
            }
            let after = self.tcbs[before].next;
            self.tcbs[slot].next = after;
            self.tcbs[slot].previous = before;
            self.tcbs[after].previous = slot;
            self.tcbs[before].next = slot;
        }

        let id = ThreadId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let tcb = &mut self.tcbs[slot];
        tcb.id = id;
        tcb.priority = priority;
        tcb.alive = true;
        tcb.asleep = false;
        tcb.wake_tick = 0;
        tcb.blocked_on = None;
        tcb.name = truncate_name(name);

        self.live += 1;
        Some(slot)
    }

    /// Unlink a live slot from the ring and mark it dead.
    ///
    /// The slot keeps its own `next`/`previous` so a walk that starts from
    /// it still reaches live threads.
    pub fn unlink(&mut self, slot: usize) {
        assert!(self.tcbs[slot].alive, "unlinking dead thread slot {}", slot);
        let previous = self.tcbs[slot].previous;
        let next = self.tcbs[slot].next;
        self.tcbs[previous].next = next;
        self.tcbs[next].previous = previous;
        let tcb = &mut self.tcbs[slot];
        tcb.alive = false;
        tcb.asleep = false;
        tcb.blocked_on = None;
        self.live -= 1;
    }

    /// Clear `asleep` on every live thread whose wake tick has been reached.
    pub fn wake_due(&mut self, now: u64) {
        for tcb in self.tcbs.iter_mut().filter(|t| t.alive && t.asleep) {
            if tcb.wake_tick <= now {
                tcb.asleep = false;
            }
        }
    }

    /// Live slot standing in for `from`: `from` itself when live, else the
    /// first live slot reached through the stale `next` links, else the
    /// first live slot in pool order.
    pub fn live_entry(&self, from: usize) -> Option<usize> {
        let mut cursor = from;
        for _ in 0..MAX_THREADS {
            if self.tcbs[cursor].alive {
                return Some(cursor);
            }
            cursor = self.tcbs[cursor].next;
        }
        self.first_live()
    }

    /// Walk the ring once, starting with the slot after `from`.
    ///
    /// Yields every live slot exactly once. When `from` is live it is the
    /// last slot yielded; when it is dead the walk starts at its
    /// [`live_entry`](Self::live_entry).
    pub fn walk_after(&self, from: usize) -> RingWalk<'_> {
        let cursor = if self.tcbs[from].alive {
            from
        } else {
            self.live_entry(from)
                .map_or(from, |entry| self.tcbs[entry].previous)
        };
        RingWalk {
            ring: self,
            cursor,
            remaining: self.live,
        }
    }
}

impl Default for ThreadRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over ring slots produced by [`ThreadRing::walk_after`].
pub struct RingWalk<'a> {
    ring: &'a ThreadRing,
    cursor: usize,
    remaining: usize,
}

impl Iterator for RingWalk<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.cursor = self.ring.tcbs[self.cursor].next;
        Some(self.cursor)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Walking `next` N times from every live slot must return to it, and
    /// the `previous` walk must visit the same slots in reverse.
    fn assert_ring_integrity(ring: &ThreadRing) {
        let n = ring.live_count();
        for start in (0..MAX_THREADS).filter(|&s| ring.get(s).alive) {
            let mut forward = std::vec::Vec::new();
            let mut cursor = start;
            for _ in 0..n {
                cursor = ring.get(cursor).next;
                assert!(ring.get(cursor).alive);
                forward.push(cursor);
            }
            assert_eq!(cursor, start);

            let mut backward = std::vec::Vec::new();
            cursor = start;
            for _ in 0..n {
                backward.push(cursor);
                cursor = ring.get(cursor).previous;
            }
            assert_eq!(cursor, start);
            backward.reverse();
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn test_single_thread_links_to_itself() {
        let mut ring = ThreadRing::new();
        let slot = ring.insert(5, "solo").unwrap();
        assert_eq!(ring.get(slot).next, slot);
        assert_eq!(ring.get(slot).previous, slot);
        assert_eq!(ring.live_count(), 1);
        assert_ring_integrity(&ring);
    }

    #[test]
    fn test_insert_until_full() {
        let mut ring = ThreadRing::new();
        for i in 0..MAX_THREADS {
            assert_eq!(ring.insert(i as u8, "t"), Some(i));
            assert_ring_integrity(&ring);
        }
        assert_eq!(ring.insert(0, "extra"), None);
        assert_eq!(ring.live_count(), MAX_THREADS);
    }

    #[test]
    fn test_reused_slot_spliced_after_preceding_live_slot() {
        let mut ring = ThreadRing::new();
        for _ in 0..4 {
            ring.insert(1, "t").unwrap();
        }
        ring.unlink(1);
        ring.unlink(2);
        assert_ring_integrity(&ring);
        assert_eq!(ring.get(0).next, 3);

        // First dead slot is 1; nearest preceding live slot is 0
        let slot = ring.insert(1, "new").unwrap();
        assert_eq!(slot, 1);
        assert_eq!(ring.get(0).next, 1);
        assert_eq!(ring.get(1).next, 3);
        assert_ring_integrity(&ring);
    }

    #[test]
    fn test_reused_slot_zero_wraps_backwards() {
        let mut ring = ThreadRing::new();
        for _ in 0..3 {
            ring.insert(1, "t").unwrap();
        }
        ring.unlink(0);
        let slot = ring.insert(1, "again").unwrap();
        assert_eq!(slot, 0);
        // Preceding live slot wraps around to 2
        assert_eq!(ring.get(2).next, 0);
        assert_eq!(ring.get(0).next, 1);
        assert_ring_integrity(&ring);
    }

    #[test]
    fn test_ids_are_monotonic_across_reuse() {
        let mut ring = ThreadRing::new();
        let a = ring.insert(1, "a").unwrap();
        let b = ring.insert(1, "b").unwrap();
        let id_b = ring.get(b).id;
        ring.unlink(a);
        let c = ring.insert(1, "c").unwrap();
        assert_eq!(c, a);
        assert!(ring.get(c).id > id_b);
        assert_eq!(ring.find(ring.get(c).id), Some(c));
    }

    #[test]
    fn test_mixed_add_kill_sequence_keeps_integrity() {
        let mut ring = ThreadRing::new();
        for _ in 0..MAX_THREADS {
            ring.insert(1, "t").unwrap();
        }
        for slot in [4, 0, 2] {
            ring.unlink(slot);
            assert_ring_integrity(&ring);
        }
        ring.insert(1, "x").unwrap();
        assert_ring_integrity(&ring);
        ring.unlink(5);
        ring.insert(1, "y").unwrap();
        ring.insert(1, "z").unwrap();
        assert_ring_integrity(&ring);
        assert_eq!(ring.live_count(), 5);
    }

    #[test]
    fn test_unlinked_slot_still_walks_into_ring() {
        let mut ring = ThreadRing::new();
        for _ in 0..3 {
            ring.insert(1, "t").unwrap();
        }
        ring.unlink(1);
        let visited: std::vec::Vec<usize> = ring.walk_after(1).collect();
        assert_eq!(visited, [2, 0]);
    }

    #[test]
    fn test_walk_from_dead_slot_skips_chain_of_dead_slots() {
        let mut ring = ThreadRing::new();
        for _ in 0..4 {
            ring.insert(1, "t").unwrap();
        }
        // Slot 0's stale `next` points at slot 1, which dies afterwards
        ring.unlink(0);
        ring.unlink(1);
        assert_eq!(ring.live_entry(0), Some(2));
        let visited: std::vec::Vec<usize> = ring.walk_after(0).collect();
        assert_eq!(visited, [2, 3]);
    }

    #[test]
    fn test_name_truncation() {
        let name = truncate_name("a-very-long-thread-name");
        assert_eq!(name.len(), MAX_NAME_LENGTH - 1);
        assert_eq!(name.as_str(), "a-very-long-thr");
        assert_eq!(truncate_name("idle").as_str(), "idle");
    }

    #[test]
    fn test_state_precedence() {
        let mut ring = ThreadRing::new();
        let slot = ring.insert(3, "t").unwrap();
        assert_eq!(ring.get(slot).state(), ThreadState::Runnable);
        ring.get_mut(slot).asleep = true;
        assert_eq!(ring.get(slot).state(), ThreadState::Sleeping);
        ring.get_mut(slot).blocked_on = Some(SemaphoreId(0));
        assert_eq!(ring.get(slot).state(), ThreadState::Blocked);
        ring.unlink(slot);
        assert_eq!(ring.get(slot).state(), ThreadState::Dead);
    }
}
