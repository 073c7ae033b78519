//! # FIFO Channels
//!
//! Fixed-capacity circular buffers of 32-bit words used to hand sampled
//! values from interrupts and periodic events to threads.
//!
//! Each channel is backed by two semaphores from the kernel arena:
//!
//! - **available** counts unread words; readers block on it when empty
//! - **mutex** serializes the dequeue itself
//!
//! Readers wait for an item first and take the mutex only around the pop,
//! so several readers can be granted items while dequeues stay one at a
//! time. Writers never block: a full channel drops the new word and bumps
//! the channel's persistent loss counter. There is no write-side lock, so
//! each channel must have a single producer.

use crate::config::{FIFO_SIZE, MAX_FIFOS};
use crate::error::{KernelError, Result};
use crate::log::trace;
use crate::scheduler::Scheduler;
use crate::semaphore::{SemaphoreId, SemaphorePool};

/// Fixed-capacity word queue and the two semaphores that guard it.
pub struct FifoChannel {
    buffer: [u32; FIFO_SIZE],
    head: usize,
    tail: usize,
    /// Occupied slots. Decides full/empty so a granted-but-unpopped word
    /// is never overwritten.
    len: usize,
    lost_count: u32,
    available: SemaphoreId,
    mutex: SemaphoreId,
}

impl FifoChannel {
    pub const fn new(index: usize) -> Self {
        Self {
            buffer: [0; FIFO_SIZE],
            head: 0,
            tail: 0,
            len: 0,
            lost_count: 0,
            available: SemaphorePool::fifo_available(index),
            mutex: SemaphorePool::fifo_mutex(index),
        }
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn lost_count(&self) -> u32 {
        self.lost_count
    }
}

/// Build the channel pool; each channel gets its reserved semaphores.
pub const fn fifo_pool() -> [FifoChannel; MAX_FIFOS] {
    let mut pool = [const { FifoChannel::new(0) }; MAX_FIFOS];
    let mut i = 0;
    while i < MAX_FIFOS {
        pool[i] = FifoChannel::new(i);
        i += 1;
    }
    pool
}

impl Scheduler {
    fn fifo(&self, index: usize) -> Result<&FifoChannel> {
        self.fifos.get(index).ok_or(KernelError::IndexInvalid)
    }

    fn fifo_mut(&mut self, index: usize) -> Result<&mut FifoChannel> {
        self.fifos.get_mut(index).ok_or(KernelError::IndexInvalid)
    }

    /// Reset channel `index`: cursors to the buffer origin, no lost words,
    /// availability 0, mutex 1.
    pub fn fifo_init(&mut self, index: usize) -> Result<()> {
        let fifo = self.fifo_mut(index)?;
        fifo.head = 0;
        fifo.tail = 0;
        fifo.len = 0;
        fifo.lost_count = 0;
        let (available, mutex) = (fifo.available, fifo.mutex);
        self.semaphores.init(available, 0);
        self.semaphores.init(mutex, 1);
        Ok(())
    }

    /// The (available, mutex) semaphore pair a reader must acquire.
    pub fn fifo_semaphores(&self, index: usize) -> Result<(SemaphoreId, SemaphoreId)> {
        let fifo = self.fifo(index)?;
        Ok((fifo.available, fifo.mutex))
    }

    /// Append `value` without blocking.
    ///
    /// A full channel rejects the word, counts it as lost, and returns
    /// [`KernelError::DataLost`].
    pub fn fifo_write(&mut self, index: usize, value: u32) -> Result<()> {
        let fifo = self.fifo_mut(index)?;
        if fifo.len >= FIFO_SIZE {
            fifo.lost_count = fifo.lost_count.wrapping_add(1);
            trace!("fifo {} full, {} lost", index, fifo.lost_count);
            return Err(KernelError::DataLost);
        }
        fifo.buffer[fifo.tail] = value;
        fifo.tail = (fifo.tail + 1) % FIFO_SIZE;
        fifo.len += 1;
        let available = fifo.available;
        self.signal(available);
        Ok(())
    }

    /// Remove the word at `head`. The caller must already hold both the
    /// availability grant and the channel mutex.
    ///
    /// # Panics
    /// Panics if the channel is empty, which means a reader popped without
    /// an availability grant.
    pub fn fifo_pop(&mut self, index: usize) -> Result<u32> {
        let fifo = self.fifo_mut(index)?;
        assert!(fifo.len > 0, "fifo {} popped while empty", index);
        let value = fifo.buffer[fifo.head];
        fifo.head = (fifo.head + 1) % FIFO_SIZE;
        fifo.len -= 1;
        Ok(value)
    }

    /// Words dropped because channel `index` was full.
    pub fn fifo_lost_count(&self, index: usize) -> Result<u32> {
        Ok(self.fifo(index)?.lost_count)
    }

    /// Unread words in channel `index`.
    pub fn fifo_len(&self, index: usize) -> Result<usize> {
        Ok(self.fifo(index)?.len)
    }

    pub fn fifo_channel(&self, index: usize) -> Result<&FifoChannel> {
        self.fifo(index)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
