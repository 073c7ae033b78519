//! Kernel result codes.

use core::fmt;

/// Errors returned by kernel operations.
///
/// Every operation reports failure through one of these values instead of
/// faulting; success is `Ok`. Internal invariant violations are not
/// represented here, they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KernelError {
    /// The thread or periodic event pool is full
    ThreadLimitReached,
    /// Aperiodic trigger outside `0..NUM_INTERRUPTS`
    InvalidInterruptNumber,
    /// Aperiodic priority outside the allowed hardware range
    InvalidHardwarePriority,
    /// Only one live thread remains
    CannotKillLastThread,
    /// No live thread carries the given ID
    ThreadDoesNotExist,
    /// FIFO channel index outside the pool
    IndexInvalid,
    /// FIFO was full; the written word was dropped
    DataLost,
    /// The semaphore arena is exhausted
    SemaphoreLimitReached,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadLimitReached => write!(f, "thread limit reached"),
            Self::InvalidInterruptNumber => write!(f, "invalid interrupt number"),
            Self::InvalidHardwarePriority => write!(f, "invalid hardware priority"),
            Self::CannotKillLastThread => write!(f, "cannot kill last thread"),
            Self::ThreadDoesNotExist => write!(f, "thread does not exist"),
            Self::IndexInvalid => write!(f, "fifo index invalid"),
            Self::DataLost => write!(f, "fifo full, data lost"),
            Self::SemaphoreLimitReached => write!(f, "semaphore limit reached"),
        }
    }
}

/// Convenience alias used throughout the kernel.
pub type Result<T> = core::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(KernelError::DataLost.to_string(), "fifo full, data lost");
        assert_eq!(
            KernelError::CannotKillLastThread.to_string(),
            "cannot kill last thread"
        );
    }
}
