//! Library configuration.
//!
//! Everything here is fixed once `init_with` succeeds.

use crate::error::{ThreadError, ThreadResult};

/// Default size of each spawned thread's private stack.
pub const STACK_SIZE: usize = 64 * 1024;

/// Smallest stack a spawned thread may be given.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Default quantum length in microseconds.
pub const DEFAULT_QUANTUM_USECS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Length of a scheduling quantum in microseconds of virtual (user CPU) time.
    pub quantum_usecs: i64,
    /// Stack size for every spawned thread. The main thread keeps the stack
    /// it was started on.
    pub stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM_USECS)
    }
}

impl Config {
    pub const fn new(quantum_usecs: i64) -> Self {
        Self {
            quantum_usecs,
            stack_size: STACK_SIZE,
        }
    }

    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn validate(&self) -> ThreadResult<()> {
        if self.quantum_usecs <= 0 {
            return Err(ThreadError::InvalidQuantum);
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ThreadError::InvalidStackSize);
        }
        Ok(())
    }

    /// Quantum as an unsigned count; only meaningful after `validate`.
    pub(crate) fn quantum(&self) -> u64 {
        self.quantum_usecs.max(0) as u64
    }
}
