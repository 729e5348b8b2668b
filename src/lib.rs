//! User-level threads multiplexed onto one native thread.
//!
//! A virtual-time interval timer preempts the running thread every quantum;
//! [`block`], [`sync`] and [`terminate`] give up the CPU voluntarily. Ready
//! threads run in strict FIFO order.
//!
//! ```no_run
//! fn worker() {
//!     loop {}
//! }
//!
//! uthreads::init(10_000).unwrap();
//! let tid = uthreads::spawn(worker).unwrap();
//! uthreads::terminate(tid).unwrap();
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[cfg(not(all(target_os = "linux", any(target_arch = "x86_64", target_arch = "aarch64"))))]
compile_error!("uthreads supports Linux on x86_64 and aarch64 only");

pub mod arch;
pub mod config;
pub mod context;
mod diag;
pub mod error;
mod preemption;
pub mod runtime;
pub mod scheduler;
pub mod signal_safe;
pub mod sync;
pub mod thread;

pub use config::{Config, MIN_STACK_SIZE, STACK_SIZE};
pub use diag::{SYSTEM_PREFIX, USAGE_PREFIX};
pub use error::{SystemError, ThreadError, ThreadResult};
pub use runtime::{
    current_thread_id, init, init_with, quanta_of, spawn, state_of, terminate, total_quanta,
};
pub use scheduler::{NextState, Scheduler, MAX_THREADS};
pub use sync::{block, resume, sync};
pub use thread::{Thread, ThreadId, ThreadState, MAIN_THREAD};
